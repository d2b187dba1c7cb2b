//! `LocalGrid`: one rank's view of a partitioned mesh.
//!
//! The grid is owned by the caller and is immutable for the duration of a
//! sweep; the sweep structures refer to cells by local index only.

use crate::mesh::cell::{Cell, Face};
use crate::mesh::vector::Vec3;
use crate::sweep_error::SweepError;
use std::collections::{BTreeSet, HashMap};

/// Where the data across a face comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Locality {
    /// Domain boundary with the given boundary id.
    Boundary(u64),
    /// Neighbour is a local cell (local index).
    Local(usize),
    /// Neighbour lives on another rank.
    Remote { rank: usize, global_id: u64 },
}

/// Local partition of a mesh.
#[derive(Clone, Debug)]
pub struct LocalGrid {
    rank: usize,
    cells: Vec<Cell>,
    vertices: HashMap<u64, Vec3>,
    global_to_local: HashMap<u64, usize>,
    ghost_owner: HashMap<u64, usize>,
}

impl LocalGrid {
    /// Assemble and validate a partition view.
    ///
    /// `ghost_owner` maps the global id of every off-rank neighbour to the
    /// rank that owns it.
    ///
    /// # Errors
    /// - [`SweepError::IndexOutOfRange`] if `cells[i].local_id != i`.
    /// - [`SweepError::UnknownNeighbor`] if a face references a cell that is
    ///   neither local nor listed in `ghost_owner`.
    pub fn new(
        rank: usize,
        cells: Vec<Cell>,
        vertices: HashMap<u64, Vec3>,
        ghost_owner: HashMap<u64, usize>,
    ) -> Result<Self, SweepError> {
        let mut global_to_local = HashMap::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            if cell.local_id != i {
                return Err(SweepError::IndexOutOfRange {
                    what: "cell local_id",
                    index: cell.local_id,
                    len: cells.len(),
                });
            }
            global_to_local.insert(cell.global_id, i);
        }
        for cell in &cells {
            for (f, face) in cell.faces.iter().enumerate() {
                if face.has_neighbor
                    && !global_to_local.contains_key(&face.neighbor_id)
                    && !ghost_owner.contains_key(&face.neighbor_id)
                {
                    return Err(SweepError::UnknownNeighbor {
                        rank,
                        cell: cell.global_id,
                        face: f,
                        neighbor: face.neighbor_id,
                    });
                }
            }
        }
        Ok(Self {
            rank,
            cells,
            vertices,
            global_to_local,
            ghost_owner,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn num_local_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell(&self, local_id: usize) -> &Cell {
        &self.cells[local_id]
    }

    pub fn local_id_of(&self, global_id: u64) -> Option<usize> {
        self.global_to_local.get(&global_id).copied()
    }

    pub fn vertex(&self, id: u64) -> Option<Vec3> {
        self.vertices.get(&id).copied()
    }

    /// Classify the data source across `face`.
    pub fn locality(&self, face: &Face) -> Locality {
        if !face.has_neighbor {
            return Locality::Boundary(face.neighbor_id);
        }
        match self.global_to_local.get(&face.neighbor_id) {
            Some(&local) => Locality::Local(local),
            // LocalGrid::new guarantees the ghost entry exists.
            None => Locality::Remote {
                rank: self.ghost_owner.get(&face.neighbor_id).copied().unwrap_or(self.rank),
                global_id: face.neighbor_id,
            },
        }
    }

    /// Ranks that own at least one neighbour of a local cell, ascending.
    pub fn neighbor_ranks(&self) -> Vec<usize> {
        let mut ranks = BTreeSet::new();
        for cell in &self.cells {
            for face in &cell.faces {
                if let Locality::Remote { rank, .. } = self.locality(face) {
                    ranks.insert(rank);
                }
            }
        }
        ranks.into_iter().collect()
    }

    /// Total number of angular-flux nodes (one per cell vertex).
    pub fn num_nodes(&self) -> usize {
        self.cells.iter().map(Cell::num_nodes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(local_id: usize, global_id: u64, faces: Vec<Face>) -> Cell {
        Cell {
            local_id,
            global_id,
            material_id: 0,
            vertex_ids: vec![global_id, global_id + 1],
            centroid: Vec3::default(),
            faces,
        }
    }

    #[test]
    fn unknown_neighbour_is_rejected() {
        let faces = vec![Face::interior(vec![2], Vec3::new(1.0, 0.0, 0.0), Vec3::default(), 42)];
        let err = LocalGrid::new(0, vec![cell(0, 1, faces)], HashMap::new(), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, SweepError::UnknownNeighbor { neighbor: 42, .. }));
    }

    #[test]
    fn locality_classifies_faces() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let c0 = cell(
            0,
            10,
            vec![
                Face::boundary(vec![10], -x, Vec3::default(), 7),
                Face::interior(vec![11], x, Vec3::default(), 11),
            ],
        );
        let c1 = cell(
            1,
            11,
            vec![
                Face::interior(vec![11], -x, Vec3::default(), 10),
                Face::interior(vec![12], x, Vec3::default(), 12),
            ],
        );
        let grid = LocalGrid::new(0, vec![c0, c1], HashMap::new(), HashMap::from([(12, 3)]))
            .unwrap();
        assert_eq!(grid.locality(&grid.cell(0).faces[0]), Locality::Boundary(7));
        assert_eq!(grid.locality(&grid.cell(0).faces[1]), Locality::Local(1));
        assert_eq!(
            grid.locality(&grid.cell(1).faces[1]),
            Locality::Remote { rank: 3, global_id: 12 }
        );
        assert_eq!(grid.neighbor_ranks(), vec![3]);
    }
}
