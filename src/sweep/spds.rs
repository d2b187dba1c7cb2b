//! Sweep plane data structure (SPDS): everything static about sweeping one
//! direction group over one rank's partition.
//!
//! Built once per (direction group, partition) and shared by every angle set
//! of that direction group. For each local face it records the orientation
//! and where incoming data comes from / outgoing data goes to; for each
//! neighbour rank the face crossings exchanged with it; and the task graph.

use crate::mesh::cell::canonical_node_order;
use crate::mesh::grid::{LocalGrid, Locality};
use crate::mesh::vector::Vec3;
use crate::sweep::orientation::FaceOrientation;
use crate::sweep::task_graph::{Task, TaskGraph};
use crate::sweep_error::SweepError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-rank face id: `(upwind global cell id, downwind global cell id)`.
///
/// Both ranks sharing the face compute the same value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceCrossing {
    pub upwind: u64,
    pub downwind: u64,
}

/// Local upwind source of an incoming face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpwindFace {
    /// Upwind cell local index.
    pub cell: usize,
    /// Face index within the upwind cell.
    pub face: usize,
    /// `node_map[k]` is the upwind face node holding downwind face node `k`.
    pub node_map: Vec<usize>,
    /// First node of this face in the local face-flux buffer.
    pub slot: usize,
}

/// A face shared with another rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFace {
    pub crossing: FaceCrossing,
    /// Local cell index on this rank.
    pub cell: usize,
    pub face: usize,
    /// `canonical[k]` is the face node at canonical position `k`.
    pub canonical: Vec<usize>,
}

/// Where an incoming face reads its data from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upwind {
    Local(UpwindFace),
    /// Index into `incoming_remote()[rank]`.
    Remote { rank: usize, index: usize },
    Boundary(u64),
}

/// Where a face writes its outgoing data to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Downwind {
    /// Face-flux buffer slot read by a local downwind cell.
    Local { slot: usize },
    /// Index into `outgoing_remote()[rank]`.
    Remote { rank: usize, index: usize },
    Boundary(u64),
}

/// Static data of one face for one direction group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacePlan {
    pub orientation: FaceOrientation,
    pub upwind: Option<Upwind>,
    pub downwind: Option<Downwind>,
}

/// Static sweep structure of one direction group on one rank.
#[derive(Clone, Debug)]
pub struct Spds {
    rank: usize,
    omega: Vec3,
    faces: Vec<Vec<FacePlan>>,
    incoming_remote: BTreeMap<usize, Vec<RemoteFace>>,
    outgoing_remote: BTreeMap<usize, Vec<RemoteFace>>,
    num_slot_nodes: usize,
    task_graph: TaskGraph,
}

/// Build only the task graph of `grid` for direction `omega`.
pub fn build_task_graph(grid: &LocalGrid, omega: Vec3) -> Result<TaskGraph, SweepError> {
    Spds::build(grid, omega).map(|spds| spds.task_graph)
}

impl Spds {
    /// Classify every face, wire up local and remote dependencies and batch
    /// the tasks into stages.
    ///
    /// # Errors
    /// - [`SweepError::FaceMismatch`] if a local neighbour has no matching
    ///   back-face or the vertex sets differ, or two faces share a crossing.
    /// - [`SweepError::CyclicDependency`] if the local graph has a cycle.
    pub fn build(grid: &LocalGrid, omega: Vec3) -> Result<Self, SweepError> {
        let rank = grid.rank();
        let n = grid.num_local_cells();

        let mut faces: Vec<Vec<FacePlan>> = grid
            .cells()
            .iter()
            .map(|cell| {
                cell.faces
                    .iter()
                    .map(|f| FacePlan {
                        orientation: FaceOrientation::classify(omega, f.normal),
                        upwind: None,
                        downwind: None,
                    })
                    .collect()
            })
            .collect();

        let mut tasks: Vec<Task> = (0..n).map(Task::new).collect();
        let mut incoming_remote: BTreeMap<usize, Vec<RemoteFace>> = BTreeMap::new();
        let mut outgoing_remote: BTreeMap<usize, Vec<RemoteFace>> = BTreeMap::new();
        let mut num_slot_nodes = 0;

        for cell in grid.cells() {
            let c = cell.local_id;
            for (f, face) in cell.faces.iter().enumerate() {
                let orientation = faces[c][f].orientation;
                match grid.locality(face) {
                    Locality::Boundary(bid) => match orientation {
                        FaceOrientation::Incoming => faces[c][f].upwind = Some(Upwind::Boundary(bid)),
                        FaceOrientation::Outgoing => {
                            faces[c][f].downwind = Some(Downwind::Boundary(bid))
                        }
                        FaceOrientation::Parallel => {}
                    },
                    Locality::Local(u) => {
                        if !orientation.is_incoming() {
                            continue;
                        }
                        let upwind = grid.cell(u);
                        let uf = upwind
                            .faces
                            .iter()
                            .position(|bf| bf.has_neighbor && bf.neighbor_id == cell.global_id)
                            .ok_or_else(|| SweepError::FaceMismatch {
                                rank,
                                cell: cell.global_id,
                                face: f,
                                detail: format!("neighbour {} has no face back to this cell", upwind.global_id),
                            })?;
                        let node_map = match_nodes(&face.vertex_ids, &upwind.faces[uf].vertex_ids)
                            .ok_or_else(|| SweepError::FaceMismatch {
                                rank,
                                cell: cell.global_id,
                                face: f,
                                detail: format!(
                                    "vertices {:?} do not match neighbour {} face {uf} vertices {:?}",
                                    face.vertex_ids, upwind.global_id, upwind.faces[uf].vertex_ids
                                ),
                            })?;
                        let slot = num_slot_nodes;
                        num_slot_nodes += face.num_nodes();
                        faces[c][f].upwind = Some(Upwind::Local(UpwindFace {
                            cell: u,
                            face: uf,
                            node_map,
                            slot,
                        }));
                        faces[u][uf].downwind = Some(Downwind::Local { slot });
                        tasks[c].num_dependencies += 1;
                        tasks[c].num_local_dependencies += 1;
                        tasks[u].successors.push(c);
                    }
                    Locality::Remote { rank: peer, global_id } => {
                        let canonical = canonical_node_order(&face.vertex_ids);
                        match orientation {
                            FaceOrientation::Incoming => {
                                tasks[c].num_dependencies += 1;
                                incoming_remote.entry(peer).or_default().push(RemoteFace {
                                    crossing: FaceCrossing {
                                        upwind: global_id,
                                        downwind: cell.global_id,
                                    },
                                    cell: c,
                                    face: f,
                                    canonical,
                                });
                            }
                            FaceOrientation::Outgoing => {
                                outgoing_remote.entry(peer).or_default().push(RemoteFace {
                                    crossing: FaceCrossing {
                                        upwind: cell.global_id,
                                        downwind: global_id,
                                    },
                                    cell: c,
                                    face: f,
                                    canonical,
                                });
                            }
                            FaceOrientation::Parallel => {}
                        }
                    }
                }
            }
        }

        for (&peer, list) in incoming_remote.iter_mut() {
            sort_crossings(rank, list)?;
            for (index, rf) in list.iter().enumerate() {
                faces[rf.cell][rf.face].upwind = Some(Upwind::Remote { rank: peer, index });
            }
        }
        for (&peer, list) in outgoing_remote.iter_mut() {
            sort_crossings(rank, list)?;
            for (index, rf) in list.iter().enumerate() {
                faces[rf.cell][rf.face].downwind = Some(Downwind::Remote { rank: peer, index });
            }
        }

        let task_graph = TaskGraph::from_tasks(tasks).map_err(|unscheduled| {
            SweepError::CyclicDependency {
                rank,
                omega,
                remaining: unscheduled.len(),
                cells: unscheduled.iter().take(8).map(|&t| grid.cell(t).global_id).collect(),
            }
        })?;

        Ok(Self {
            rank,
            omega,
            faces,
            incoming_remote,
            outgoing_remote,
            num_slot_nodes,
            task_graph,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Direction the graph was built for.
    #[inline]
    pub fn omega(&self) -> Vec3 {
        self.omega
    }

    #[inline]
    pub fn task_graph(&self) -> &TaskGraph {
        &self.task_graph
    }

    #[inline]
    pub fn face_plan(&self, cell: usize, face: usize) -> &FacePlan {
        &self.faces[cell][face]
    }

    #[inline]
    pub fn face_plans(&self, cell: usize) -> &[FacePlan] {
        &self.faces[cell]
    }

    #[inline]
    pub fn orientation(&self, cell: usize, face: usize) -> FaceOrientation {
        self.faces[cell][face].orientation
    }

    /// Local upwind face feeding `(cell, face)`, if any.
    pub fn upwind_local(&self, cell: usize, face: usize) -> Option<&UpwindFace> {
        match &self.faces[cell][face].upwind {
            Some(Upwind::Local(u)) => Some(u),
            _ => None,
        }
    }

    /// Incoming cross-rank faces per upstream rank, sorted by crossing.
    #[inline]
    pub fn incoming_remote(&self) -> &BTreeMap<usize, Vec<RemoteFace>> {
        &self.incoming_remote
    }

    /// Outgoing cross-rank faces per downstream rank, sorted by crossing.
    #[inline]
    pub fn outgoing_remote(&self) -> &BTreeMap<usize, Vec<RemoteFace>> {
        &self.outgoing_remote
    }

    /// Face nodes in the local face-flux buffer.
    #[inline]
    pub fn num_slot_nodes(&self) -> usize {
        self.num_slot_nodes
    }

    /// Ranks this rank depends on, ascending.
    pub fn location_dependencies(&self) -> Vec<usize> {
        self.incoming_remote.keys().copied().collect()
    }

    /// Ranks depending on this rank, ascending.
    pub fn location_successors(&self) -> Vec<usize> {
        self.outgoing_remote.keys().copied().collect()
    }

    /// Crossings `(outgoing to peer, incoming from peer)`.
    pub fn crossings_with(&self, peer: usize) -> (Vec<FaceCrossing>, Vec<FaceCrossing>) {
        let list = |m: &BTreeMap<usize, Vec<RemoteFace>>| {
            m.get(&peer)
                .map(|v| v.iter().map(|rf| rf.crossing).collect())
                .unwrap_or_default()
        };
        (list(&self.outgoing_remote), list(&self.incoming_remote))
    }
}

/// For each node of `down`, the index of the same vertex in `up`.
fn match_nodes(down: &[u64], up: &[u64]) -> Option<Vec<usize>> {
    if down.len() != up.len() {
        return None;
    }
    down.iter().map(|v| up.iter().position(|u| u == v)).collect()
}

fn sort_crossings(rank: usize, list: &mut [RemoteFace]) -> Result<(), SweepError> {
    list.sort_by_key(|rf| rf.crossing);
    if let Some(w) = list.windows(2).find(|w| w[0].crossing == w[1].crossing) {
        return Err(SweepError::FaceMismatch {
            rank,
            cell: w[1].crossing.downwind,
            face: w[1].face,
            detail: format!("crossing {:?} appears on more than one face", w[1].crossing),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::structured::{quad_grid_2d, slab_1d};

    #[test]
    fn slab_chain_left_to_right() {
        let grid = slab_1d(3, 3.0, 0, |_| 0).unwrap();
        let spds = Spds::build(&grid, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let g = spds.task_graph();
        assert_eq!(g.num_stages(), 3);
        assert_eq!(g.task(0).num_dependencies, 0);
        assert_eq!(g.task(0).successors, vec![1]);
        assert_eq!(spds.num_slot_nodes(), 2);
        assert!(matches!(spds.face_plan(0, 0).upwind, Some(Upwind::Boundary(_))));
        assert_eq!(spds.face_plan(0, 1).downwind, Some(Downwind::Local { slot: 0 }));
        assert_eq!(spds.upwind_local(1, 0).map(|u| u.cell), Some(0));
    }

    #[test]
    fn quad_grid_diagonal_stages() {
        let grid = quad_grid_2d(3, 3, 1.0, 1.0, 0, |_| 0).unwrap();
        let spds = Spds::build(&grid, Vec3::new(0.6, 0.8, 0.0)).unwrap();
        let g = spds.task_graph();
        // anti-diagonals i + j = const
        assert_eq!(g.num_stages(), 5);
        assert_eq!(g.stages()[1].tasks, vec![1, 3]);
        // node map pairs equal vertices
        let up = spds.upwind_local(4, 0).unwrap();
        let down = &grid.cell(4).faces[0].vertex_ids;
        let upf = &grid.cell(up.cell).faces[up.face].vertex_ids;
        for (k, &m) in up.node_map.iter().enumerate() {
            assert_eq!(down[k], upf[m]);
        }
    }

    #[test]
    fn remote_faces_recorded_per_rank() {
        let owner = |g: u64| if g < 2 { 0 } else { 1 };
        let g1 = slab_1d(4, 4.0, 1, owner).unwrap();
        let spds = Spds::build(&g1, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(spds.location_dependencies(), vec![0]);
        assert!(spds.location_successors().is_empty());
        let (out, inc) = spds.crossings_with(0);
        assert!(out.is_empty());
        assert_eq!(inc, vec![FaceCrossing { upwind: 1, downwind: 2 }]);
        assert_eq!(spds.task_graph().task(0).num_dependencies, 1);
        assert_eq!(spds.task_graph().task(0).num_local_dependencies, 0);
    }

    #[test]
    fn parallel_faces_create_no_dependency() {
        let grid = quad_grid_2d(2, 1, 2.0, 1.0, 0, |_| 0).unwrap();
        let spds = Spds::build(&grid, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert_eq!(spds.orientation(1, 0), FaceOrientation::Parallel);
        assert_eq!(spds.task_graph().num_stages(), 1);
        assert_eq!(spds.task_graph().task(1).num_dependencies, 0);
    }
}
