//! Cross-rank dependency exchange for one direction group.
//!
//! Two phases, both collective over the communicator:
//! 1. pairwise: every rank sends each neighbour rank the crossings it sends to
//!    and expects from it, and checks the neighbour's view is the mirror image;
//! 2. global: every rank all-gathers its upstream rank list, giving each rank
//!    the full rank-level dependency graph.
//!
//! Rank-level cycles are legal (face-level messaging keeps them live), they
//! only prevent a finite sweep depth.

use crate::algs::collective::all_gather_u64s;
use crate::algs::communicator::{Communicator, SweepCommTags, Wait};
use crate::algs::wire::{decode_crossing_lists, encode_crossing_lists};
use crate::context::SweepLog;
use crate::mesh::grid::LocalGrid;
use crate::sweep::spds::{FaceCrossing, Spds};
use crate::sweep_error::SweepError;

/// Rank-level dependency table of one direction group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalDependencies {
    /// `upstream[r]`: ranks rank `r` receives from, ascending.
    pub upstream: Vec<Vec<usize>>,
    /// Longest upstream chain; `None` when the rank graph has a cycle.
    pub depth: Option<usize>,
}

impl GlobalDependencies {
    pub fn from_upstream(upstream: Vec<Vec<usize>>) -> Self {
        let depth = rank_depth(&upstream);
        Self { upstream, depth }
    }

    #[inline]
    pub fn has_cycle(&self) -> bool {
        self.depth.is_none()
    }
}

/// Longest upstream chain (in edges) of the rank graph, `None` on a cycle.
fn rank_depth(upstream: &[Vec<usize>]) -> Option<usize> {
    let n = upstream.len();
    let mut downstream = vec![Vec::new(); n];
    let mut pending: Vec<usize> = upstream.iter().map(Vec::len).collect();
    for (r, ups) in upstream.iter().enumerate() {
        for &u in ups {
            downstream.get_mut(u)?.push(r);
        }
    }
    let mut level = vec![0usize; n];
    let mut queue: Vec<usize> = (0..n).filter(|&r| pending[r] == 0).collect();
    let mut visited = 0;
    while let Some(r) = queue.pop() {
        visited += 1;
        for &d in &downstream[r] {
            level[d] = level[d].max(level[r] + 1);
            pending[d] -= 1;
            if pending[d] == 0 {
                queue.push(d);
            }
        }
    }
    (visited == n).then(|| level.into_iter().max().unwrap_or(0))
}

fn describe_mismatch(mine: &[FaceCrossing], theirs: &[FaceCrossing]) -> String {
    let missing: Vec<_> = mine.iter().filter(|c| !theirs.contains(c)).take(4).collect();
    let extra: Vec<_> = theirs.iter().filter(|c| !mine.contains(c)).take(4).collect();
    format!("only here: {missing:?}, only there: {extra:?}")
}

/// Exchange and verify cross-rank dependencies of `spds`, then gather the
/// rank-level table.
///
/// # Errors
/// [`SweepError::DependencyAsymmetry`] when a neighbour disagrees about the
/// crossings between the two ranks; [`SweepError::ProtocolViolation`] or
/// [`SweepError::Wire`] on a malformed exchange.
pub fn communicate_location_dependencies<C: Communicator>(
    comm: &C,
    grid: &LocalGrid,
    spds: &Spds,
    tags: SweepCommTags,
    log: &SweepLog,
) -> Result<GlobalDependencies, SweepError> {
    let me = comm.rank();
    let tag = tags.location_deps.as_u16();
    let neighbors = grid.neighbor_ranks();

    let messages = neighbors
        .iter()
        .map(|&p| {
            let (out, inc) = spds.crossings_with(p);
            Ok((p, encode_crossing_lists(&out, &inc)?))
        })
        .collect::<Result<Vec<_>, SweepError>>()?;

    // post all receives, then all sends
    let recvs: Vec<(usize, C::RecvHandle)> =
        neighbors.iter().map(|&p| (p, comm.irecv(p, tag))).collect();
    let sends: Vec<C::SendHandle> = messages
        .iter()
        .map(|(p, bytes)| comm.isend(*p, tag, bytes))
        .collect();

    // drain everything before reporting the first error
    let mut first_err = None;
    for (peer, h) in recvs {
        let checked = match h.wait() {
            None => Err(SweepError::ProtocolViolation {
                rank: me,
                peer,
                tag,
                reason: "location dependency receive completed without a matching send".into(),
            }),
            Some(bytes) => decode_crossing_lists(&bytes).and_then(|(their_out, their_in)| {
                let (my_out, my_in) = spds.crossings_with(peer);
                if my_in != their_out {
                    return Err(SweepError::DependencyAsymmetry {
                        rank: me,
                        neighbor: peer,
                        detail: format!(
                            "incoming crossings disagree; {}",
                            describe_mismatch(&my_in, &their_out)
                        ),
                    });
                }
                if my_out != their_in {
                    return Err(SweepError::DependencyAsymmetry {
                        rank: me,
                        neighbor: peer,
                        detail: format!(
                            "outgoing crossings disagree; {}",
                            describe_mismatch(&my_out, &their_in)
                        ),
                    });
                }
                Ok(())
            }),
        };
        if let Err(e) = checked {
            first_err.get_or_insert(e);
        }
    }
    for s in sends {
        let _ = s.wait();
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let mine: Vec<u64> = spds.location_dependencies().iter().map(|&r| r as u64).collect();
    let gathered = all_gather_u64s(comm, tags.global_deps, &mine)?;
    let upstream = gathered
        .into_iter()
        .map(|v| v.into_iter().map(|r| r as usize).collect())
        .collect();
    let global = GlobalDependencies::from_upstream(upstream);

    match global.depth {
        Some(depth) => log.debug(format_args!(
            "direction {}: upstream ranks {:?}, downstream ranks {:?}, sweep depth {}",
            spds.omega(),
            spds.location_dependencies(),
            spds.location_successors(),
            depth
        )),
        None => log.warn(format_args!(
            "direction {}: rank-level dependency cycle; relying on face-level messaging",
            spds.omega()
        )),
    }
    Ok(global)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_of_chain_and_cycle() {
        let chain = GlobalDependencies::from_upstream(vec![vec![], vec![0], vec![1]]);
        assert_eq!(chain.depth, Some(2));
        let cycle = GlobalDependencies::from_upstream(vec![vec![1], vec![0]]);
        assert!(cycle.has_cycle());
        let single = GlobalDependencies::from_upstream(vec![vec![]]);
        assert_eq!(single.depth, Some(0));
    }
}
