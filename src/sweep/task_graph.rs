//! Task graph of one direction group on one rank.
//!
//! Tasks are indexed by cell local id. Stages (SPLS) are produced by level
//! batching over *local* dependencies only: stage `k` holds every task whose
//! local dependency count drops to zero once stages `< k` have run, in
//! ascending local id. Remote dependencies are resolved by messages at run
//! time and do not affect stage assignment.

use crate::debug_invariants::{DebugInvariants, ensure};
use crate::sweep_error::SweepError;

/// One cell's unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Local index of the cell this task sweeps.
    pub reference_id: usize,
    /// Local plus remote upwind dependencies.
    pub num_dependencies: usize,
    /// Upwind dependencies on local tasks.
    pub num_local_dependencies: usize,
    /// Local downwind tasks; a task appears once per face it feeds.
    pub successors: Vec<usize>,
}

impl Task {
    pub fn new(reference_id: usize) -> Self {
        Self {
            reference_id,
            num_dependencies: 0,
            num_local_dependencies: 0,
            successors: Vec::new(),
        }
    }

    /// Dependencies resolved by messages from other ranks.
    #[inline]
    pub fn num_remote_dependencies(&self) -> usize {
        self.num_dependencies - self.num_local_dependencies
    }
}

/// One stage: tasks that are mutually independent within the rank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spls {
    pub tasks: Vec<usize>,
}

/// All tasks of one direction group plus their stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    stages: Vec<Spls>,
    stage_of: Vec<usize>,
}

impl TaskGraph {
    /// Batch `tasks` into stages.
    ///
    /// On a local cycle returns the (ascending) task ids that could not be
    /// scheduled.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self, Vec<usize>> {
        let n = tasks.len();
        let mut remaining: Vec<usize> = tasks.iter().map(|t| t.num_local_dependencies).collect();
        let mut stage_of = vec![usize::MAX; n];
        let mut stages = Vec::new();

        let mut current: Vec<usize> = (0..n).filter(|&t| remaining[t] == 0).collect();
        let mut scheduled = 0;
        while !current.is_empty() {
            let mut next = Vec::new();
            for &t in &current {
                stage_of[t] = stages.len();
                for &s in &tasks[t].successors {
                    remaining[s] -= 1;
                    if remaining[s] == 0 {
                        next.push(s);
                    }
                }
            }
            scheduled += current.len();
            stages.push(Spls { tasks: current });
            next.sort_unstable();
            current = next;
        }

        if scheduled < n {
            return Err((0..n).filter(|&t| stage_of[t] == usize::MAX).collect());
        }
        let graph = Self {
            tasks,
            stages,
            stage_of,
        };
        crate::debug_invariants!(graph.validate_invariants(), "TaskGraph::from_tasks");
        Ok(graph)
    }

    #[inline]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[inline]
    pub fn task(&self, id: usize) -> &Task {
        &self.tasks[id]
    }

    #[inline]
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn stages(&self) -> &[Spls] {
        &self.stages
    }

    #[inline]
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Stage index of task `id`.
    #[inline]
    pub fn stage_of(&self, id: usize) -> usize {
        self.stage_of[id]
    }

    /// Tasks in execution order (stage-major, ascending id within a stage).
    pub fn topological_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.stages.iter().flat_map(|s| s.tasks.iter().copied())
    }
}

impl DebugInvariants for TaskGraph {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "TaskGraph");
    }

    fn validate_invariants(&self) -> Result<(), SweepError> {
        let n = self.tasks.len();
        let mut seen = vec![0usize; n];
        for stage in &self.stages {
            ensure(!stage.tasks.is_empty(), || "empty stage".into())?;
            ensure(stage.tasks.windows(2).all(|w| w[0] < w[1]), || {
                format!("stage tasks not ascending: {:?}", stage.tasks)
            })?;
            for &t in &stage.tasks {
                ensure(t < n, || format!("stage references task {t} of {n}"))?;
                seen[t] += 1;
            }
        }
        ensure(seen.iter().all(|&c| c == 1), || {
            "every task must appear in exactly one stage".into()
        })?;

        let mut local_in = vec![0usize; n];
        for (id, task) in self.tasks.iter().enumerate() {
            ensure(task.reference_id == id, || {
                format!("task {id} references cell {}", task.reference_id)
            })?;
            ensure(task.num_local_dependencies <= task.num_dependencies, || {
                format!("task {id} has more local than total dependencies")
            })?;
            for &s in &task.successors {
                ensure(s < n, || format!("task {id} has successor {s} of {n}"))?;
                ensure(self.stage_of[id] < self.stage_of[s], || {
                    format!("edge {id} -> {s} does not go to a later stage")
                })?;
                local_in[s] += 1;
            }
        }
        for (id, task) in self.tasks.iter().enumerate() {
            ensure(local_in[id] == task.num_local_dependencies, || {
                format!(
                    "task {id}: {} local dependencies but {} local feeders",
                    task.num_local_dependencies, local_in[id]
                )
            })?;
        }
        Ok(())
    }
}
