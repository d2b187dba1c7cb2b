//! Cells and faces of a partitioned mesh, as seen by one rank.

use crate::mesh::vector::Vec3;
use serde::{Deserialize, Serialize};

/// One face of a [`Cell`].
///
/// `neighbor_id` is the neighbouring cell's **global** id when
/// `has_neighbor` is true, otherwise the boundary id of the face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Global vertex ids, in the face's own winding.
    pub vertex_ids: Vec<u64>,
    /// Outward unit normal.
    pub normal: Vec3,
    pub centroid: Vec3,
    pub has_neighbor: bool,
    pub neighbor_id: u64,
}

impl Face {
    pub fn interior(vertex_ids: Vec<u64>, normal: Vec3, centroid: Vec3, neighbor: u64) -> Self {
        Self {
            vertex_ids,
            normal,
            centroid,
            has_neighbor: true,
            neighbor_id: neighbor,
        }
    }

    pub fn boundary(vertex_ids: Vec<u64>, normal: Vec3, centroid: Vec3, boundary_id: u64) -> Self {
        Self {
            vertex_ids,
            normal,
            centroid,
            has_neighbor: false,
            neighbor_id: boundary_id,
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.vertex_ids.len()
    }

    /// Boundary id, when this face lies on the domain boundary.
    #[inline]
    pub fn boundary_id(&self) -> Option<u64> {
        (!self.has_neighbor).then_some(self.neighbor_id)
    }
}

/// A local cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub local_id: usize,
    pub global_id: u64,
    pub material_id: i32,
    /// Global vertex ids; one angular-flux node per vertex.
    pub vertex_ids: Vec<u64>,
    pub centroid: Vec3,
    pub faces: Vec<Face>,
}

impl Cell {
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.vertex_ids.len()
    }

    /// True when at least one face lies on the domain boundary.
    pub fn on_boundary(&self) -> bool {
        self.faces.iter().any(|f| !f.has_neighbor)
    }
}

/// Permutation that sorts `vertex_ids` ascending: `order[k]` is the face node
/// holding the k-th smallest vertex id.
///
/// Both sides of a partition face agree on this order, so cross-rank face data
/// travels in it.
pub fn canonical_node_order(vertex_ids: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..vertex_ids.len()).collect();
    order.sort_by_key(|&i| vertex_ids[i]);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_sorts_by_vertex_id() {
        assert_eq!(canonical_node_order(&[7, 3, 5]), vec![1, 2, 0]);
        assert!(canonical_node_order(&[]).is_empty());
    }

    #[test]
    fn boundary_id_only_on_boundary_faces() {
        let b = Face::boundary(vec![1], Vec3::new(-1.0, 0.0, 0.0), Vec3::default(), 4);
        let i = Face::interior(vec![1], Vec3::new(1.0, 0.0, 0.0), Vec3::default(), 9);
        assert_eq!(b.boundary_id(), Some(4));
        assert_eq!(i.boundary_id(), None);
    }
}
