//! Sweep scheduler: owns the angle sets of one rank and drives them all to
//! completion for every sweep.
//!
//! Each pass advances every unfinished set once, in admission order: a set
//! reading a reflecting boundary comes after the sets holding its mirror
//! directions, ties broken by id. The order is derived from the quadrature
//! and the boundary normals only, so every rank computes the same one. With
//! `max_active_angle_sets > 0` only the first unfinished sets in that order
//! may execute; the others keep receiving. The earliest set unfinished on
//! any rank is therefore admitted on every rank.

use crate::algs::communicator::Communicator;
use crate::algs::location_deps::{GlobalDependencies, communicate_location_dependencies};
use crate::context::SweepContext;
use crate::mesh::grid::LocalGrid;
use crate::quadrature::AngularQuadrature;
use crate::sweep::aggregation::{check_consistency, direction_groups, group_subsets, layouts};
use crate::sweep::angle_set::{AngleSet, AngleSetCounters};
use crate::sweep::boundary::BoundarySet;
use crate::sweep::fluds::PsiStore;
use crate::sweep::kernel::SweepKernel;
use crate::sweep::ordering::OrderingReport;
use crate::sweep::spds::Spds;
use crate::sweep_error::SweepError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Activity of one call to [`SweepScheduler::execute_sweep`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Passes over the angle sets.
    pub passes: usize,
    /// Passes in which no angle set made progress.
    pub idle_passes: usize,
    pub tasks_executed: usize,
    pub messages_sent: usize,
    pub messages_received: usize,
}

pub struct SweepScheduler<'a, C: Communicator> {
    ctx: SweepContext<'a, C>,
    angle_sets: Vec<AngleSet<C>>,
    dependencies: Vec<GlobalDependencies>,
}

#[cfg(feature = "rayon")]
fn build_spds(
    grid: &LocalGrid,
    quadrature: &AngularQuadrature,
    groups: &[Vec<usize>],
) -> Result<Vec<Spds>, SweepError> {
    use rayon::prelude::*;
    groups
        .par_iter()
        .map(|g| Spds::build(grid, quadrature.omega(g[0])))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn build_spds(
    grid: &LocalGrid,
    quadrature: &AngularQuadrature,
    groups: &[Vec<usize>],
) -> Result<Vec<Spds>, SweepError> {
    groups
        .iter()
        .map(|g| Spds::build(grid, quadrature.omega(g[0])))
        .collect()
}

fn sum_counters<C: Communicator>(sets: &[AngleSet<C>]) -> AngleSetCounters {
    sets.iter().fold(AngleSetCounters::default(), |mut acc, s| {
        let c = s.counters();
        acc.tasks_executed += c.tasks_executed;
        acc.messages_sent += c.messages_sent;
        acc.messages_received += c.messages_received;
        acc
    })
}

impl<'a, C: Communicator> SweepScheduler<'a, C> {
    /// Scheduler over prebuilt angle sets.
    pub fn new(ctx: SweepContext<'a, C>, angle_sets: Vec<AngleSet<C>>) -> Self {
        Self {
            ctx,
            angle_sets,
            dependencies: Vec::new(),
        }
    }

    /// Aggregate the quadrature into angle sets, build one SPDS per direction
    /// group and exchange cross-rank dependencies.
    ///
    /// Collective: every rank must call this with the same quadrature,
    /// group count and configuration.
    pub fn from_quadrature(ctx: SweepContext<'a, C>) -> Result<Self, SweepError> {
        let (grid, quadrature) = (ctx.grid, ctx.quadrature);
        let groups = direction_groups(quadrature, &ctx.config);
        let subsets = group_subsets(ctx.num_groups, ctx.config.num_group_subsets)?;
        let layouts = layouts(&groups, &subsets);
        let tags = ctx.tags();
        let too_many = SweepError::TooManyAngleSets {
            count: layouts.len(),
            base: ctx.config.tag_base,
        };

        for g in &groups {
            check_consistency(grid, quadrature, g)?;
        }
        let spds: Vec<Arc<Spds>> = build_spds(grid, quadrature, &groups)?
            .into_iter()
            .map(Arc::new)
            .collect();

        let mut dependencies = Vec::with_capacity(spds.len());
        for s in &spds {
            dependencies.push(communicate_location_dependencies(ctx.comm, grid, s, tags, &ctx.log)?);
        }

        let mut angle_sets = Vec::with_capacity(layouts.len());
        for l in layouts {
            let tag = tags.angle_sets.offset(l.id).ok_or_else(|| too_many.clone())?;
            angle_sets.push(AngleSet::new(
                l.id,
                tag,
                Arc::clone(&spds[l.direction_group]),
                l.angles,
                quadrature,
                l.groups,
            ));
        }

        ctx.log.debug(format_args!(
            "{} angle set(s) over {} direction group(s) and {} group subset(s); {} local cell(s), max {} stage(s)",
            angle_sets.len(),
            groups.len(),
            subsets.len(),
            grid.num_local_cells(),
            spds.iter().map(|s| s.task_graph().num_stages()).max().unwrap_or(0)
        ));

        let scheduler = Self {
            ctx,
            angle_sets,
            dependencies,
        };
        if scheduler.ctx.config.log_ordering {
            scheduler
                .ctx
                .log
                .debug(format_args!("sweep ordering\n{}", scheduler.ordering_report()));
        }
        Ok(scheduler)
    }

    #[inline]
    pub fn context(&self) -> &SweepContext<'a, C> {
        &self.ctx
    }

    #[inline]
    pub fn angle_sets(&self) -> &[AngleSet<C>] {
        &self.angle_sets
    }

    /// Rank-level dependency tables, one per direction group.
    #[inline]
    pub fn global_dependencies(&self) -> &[GlobalDependencies] {
        &self.dependencies
    }

    pub fn ordering_report(&self) -> OrderingReport {
        OrderingReport::new(self.ctx.grid, &self.angle_sets)
    }

    fn check_storage(&self, boundaries: &BoundarySet, psi: &PsiStore) -> Result<(), SweepError> {
        let ctx = &self.ctx;
        if psi.num_angles() != ctx.quadrature.num_angles()
            || psi.num_groups() != ctx.num_groups
            || psi.num_nodes() != ctx.grid.num_nodes()
        {
            return Err(SweepError::InvalidConfig(format!(
                "psi store is {} angles x {} nodes x {} groups, expected {} x {} x {}",
                psi.num_angles(),
                psi.num_nodes(),
                psi.num_groups(),
                ctx.quadrature.num_angles(),
                ctx.grid.num_nodes(),
                ctx.num_groups
            )));
        }
        if boundaries.num_groups() != ctx.num_groups {
            return Err(SweepError::InvalidConfig(format!(
                "boundary set has {} groups, expected {}",
                boundaries.num_groups(),
                ctx.num_groups
            )));
        }
        Ok(())
    }

    /// Angle set ids in the order the throttle admits them.
    pub fn admission_order(&self, boundaries: &BoundarySet) -> Vec<usize> {
        self.admission_positions(boundaries)
            .into_iter()
            .map(|i| self.angle_sets[i].id())
            .collect()
    }

    fn admission_positions(&self, boundaries: &BoundarySet) -> Vec<usize> {
        let sets = &self.angle_sets;
        let mut successors = vec![Vec::new(); sets.len()];
        let mut pending = vec![0usize; sets.len()];
        for (i, reader) in sets.iter().enumerate() {
            let sources = boundaries.mirror_sources(reader.angles());
            if sources.is_empty() {
                continue;
            }
            let groups = reader.groups();
            for (j, source) in sets.iter().enumerate() {
                let shared = source.groups().start < groups.end && groups.start < source.groups().end;
                if j != i && shared && source.angles().iter().any(|a| sources.binary_search(a).is_ok()) {
                    successors[j].push(i);
                    pending[i] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..sets.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(sets.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &s in &successors[i] {
                pending[s] -= 1;
                if pending[s] == 0 {
                    ready.insert(s);
                }
            }
        }
        if order.len() < sets.len() {
            // sets waiting on each other through reflections; they keep id order
            self.ctx.log.warn(format_args!(
                "{} angle set(s) in a reflection cycle",
                sets.len() - order.len()
            ));
            order.extend((0..sets.len()).filter(|&i| pending[i] > 0));
        }
        order
    }

    /// Run one full sweep: every angle set executes every task once.
    ///
    /// # Errors
    /// Any error of [`AngleSet::advance`]; [`SweepError::SweepStalled`] when
    /// a single-rank pass makes no progress.
    pub fn execute_sweep<K: SweepKernel + ?Sized>(
        &mut self,
        boundaries: &mut BoundarySet,
        psi: &mut PsiStore,
        kernel: &mut K,
    ) -> Result<SweepStats, SweepError> {
        self.check_storage(boundaries, psi)?;
        boundaries.begin_sweep();
        for set in &mut self.angle_sets {
            set.reset();
        }

        let start = sum_counters(&self.angle_sets);
        let max_active = self.ctx.config.max_active_angle_sets;
        let order = self.admission_positions(boundaries);
        let mut stats = SweepStats::default();

        while self.angle_sets.iter().any(|s| !s.is_finished()) {
            stats.passes += 1;
            let mut progress = false;
            let mut active = 0;
            for &i in &order {
                let set = &mut self.angle_sets[i];
                if set.is_finished() {
                    continue;
                }
                let admitted = max_active == 0 || active < max_active;
                if admitted {
                    active += 1;
                }
                let before = (set.status(), set.counters());
                let status = set.advance(&self.ctx, boundaries, psi, kernel, admitted)?;
                progress |= (status, set.counters()) != before;
            }
            if !progress {
                stats.idle_passes += 1;
                if self.ctx.comm.size() == 1 {
                    let unfinished = self.angle_sets.iter().filter(|s| !s.is_finished()).count();
                    return Err(SweepError::SweepStalled {
                        rank: self.ctx.rank(),
                        unfinished,
                    });
                }
                std::thread::yield_now();
            }
        }

        let end = sum_counters(&self.angle_sets);
        stats.tasks_executed = end.tasks_executed - start.tasks_executed;
        stats.messages_sent = end.messages_sent - start.messages_sent;
        stats.messages_received = end.messages_received - start.messages_received;
        self.ctx.log.debug(format_args!(
            "sweep done: {} pass(es), {} idle, {} task(s), {} message(s) sent, {} received",
            stats.passes,
            stats.idle_passes,
            stats.tasks_executed,
            stats.messages_sent,
            stats.messages_received
        ));
        Ok(stats)
    }
}
