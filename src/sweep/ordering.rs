//! Human-readable dump of the sweep ordering of every angle set.

use crate::algs::communicator::Communicator;
use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::sweep::angle_set::AngleSet;
use itertools::Itertools;
use std::fmt;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    id: usize,
    angles: Vec<usize>,
    groups: Range<usize>,
    omega: Vec3,
    upstream: Vec<usize>,
    downstream: Vec<usize>,
    /// Global cell ids per stage.
    stages: Vec<Vec<u64>>,
}

/// Sweep ordering of one rank; see the `Display` impl for the format.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderingReport {
    rank: usize,
    entries: Vec<Entry>,
}

impl OrderingReport {
    pub fn new<C: Communicator>(grid: &LocalGrid, angle_sets: &[AngleSet<C>]) -> Self {
        let entries = angle_sets
            .iter()
            .map(|set| {
                let spds = set.spds();
                Entry {
                    id: set.id(),
                    angles: set.angles().to_vec(),
                    groups: set.groups(),
                    omega: spds.omega(),
                    upstream: spds.location_dependencies(),
                    downstream: spds.location_successors(),
                    stages: spds
                        .task_graph()
                        .stages()
                        .iter()
                        .map(|s| s.tasks.iter().map(|&t| grid.cell(t).global_id).collect())
                        .collect(),
                }
            })
            .collect();
        Self {
            rank: grid.rank(),
            entries,
        }
    }

    /// Global cell ids per stage of angle set `id`.
    pub fn stages(&self, id: usize) -> Option<&[Vec<u64>]> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.stages.as_slice())
    }
}

impl fmt::Display for OrderingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rank {}: {} angle set(s)", self.rank, self.entries.len())?;
        for e in &self.entries {
            writeln!(
                f,
                "angle set {} directions [{}] groups {}..{} omega {}",
                e.id,
                e.angles.iter().join(", "),
                e.groups.start,
                e.groups.end,
                e.omega
            )?;
            writeln!(
                f,
                "  upstream ranks [{}] downstream ranks [{}]",
                e.upstream.iter().join(", "),
                e.downstream.iter().join(", ")
            )?;
            for (k, cells) in e.stages.iter().enumerate() {
                writeln!(f, "  stage {k}: {}", cells.iter().join(" "))?;
            }
        }
        Ok(())
    }
}
