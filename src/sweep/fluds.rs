//! Flux storage.
//!
//! [`Fluds`] holds the face flux flowing between local cells of one angle
//! set. [`PsiStore`] holds the angular flux of the whole rank, laid out
//! `[direction][cell node][group]` so that angle sets covering disjoint
//! (direction, group) pairs write disjoint offsets.

use crate::mesh::grid::LocalGrid;
use crate::sweep_error::SweepError;

/// Local face-flux buffer of one angle set.
///
/// Indexed by slot node (see [`crate::sweep::spds::UpwindFace::slot`]); each
/// node holds `num_angles * num_groups` values, angle-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Fluds {
    values: Vec<f64>,
    stride: usize,
}

impl Fluds {
    pub fn new(num_slot_nodes: usize, num_angles: usize, num_groups: usize) -> Self {
        let stride = num_angles * num_groups;
        Self {
            values: vec![0.0; num_slot_nodes * stride],
            stride,
        }
    }

    /// Values per face node.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Values of `num_nodes` face nodes starting at slot node `slot`.
    #[inline]
    pub fn face(&self, slot: usize, num_nodes: usize) -> &[f64] {
        &self.values[slot * self.stride..(slot + num_nodes) * self.stride]
    }

    #[inline]
    pub fn face_mut(&mut self, slot: usize, num_nodes: usize) -> &mut [f64] {
        &mut self.values[slot * self.stride..(slot + num_nodes) * self.stride]
    }

    pub fn clear(&mut self) {
        self.values.fill(0.0);
    }
}

/// Angular flux of every local node, direction and group.
#[derive(Clone, Debug, PartialEq)]
pub struct PsiStore {
    num_angles: usize,
    num_groups: usize,
    num_nodes: usize,
    cell_offsets: Vec<usize>,
    values: Vec<f64>,
}

impl PsiStore {
    pub fn new(grid: &LocalGrid, num_angles: usize, num_groups: usize) -> Self {
        let mut cell_offsets = Vec::with_capacity(grid.num_local_cells() + 1);
        let mut acc = 0;
        for cell in grid.cells() {
            cell_offsets.push(acc);
            acc += cell.num_nodes();
        }
        cell_offsets.push(acc);
        Self {
            num_angles,
            num_groups,
            num_nodes: acc,
            cell_offsets,
            values: vec![0.0; num_angles * acc * num_groups],
        }
    }

    #[inline]
    pub fn num_angles(&self) -> usize {
        self.num_angles
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Nodes over all local cells.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// First node of local cell `cell`.
    #[inline]
    pub fn cell_offset(&self, cell: usize) -> usize {
        self.cell_offsets[cell]
    }

    /// Flat offset of `(direction, cell, node, group)`.
    #[inline]
    pub fn map_dof(&self, direction: usize, cell: usize, node: usize, group: usize) -> usize {
        (direction * self.num_nodes + self.cell_offsets[cell] + node) * self.num_groups + group
    }

    #[inline]
    pub fn get(&self, direction: usize, cell: usize, node: usize, group: usize) -> f64 {
        self.values[self.map_dof(direction, cell, node, group)]
    }

    #[inline]
    pub fn set(&mut self, direction: usize, cell: usize, node: usize, group: usize, value: f64) {
        let i = self.map_dof(direction, cell, node, group);
        self.values[i] = value;
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// Weighted sum over directions, laid out `[node][group]`.
    pub fn scalar_flux(&self, weights: &[f64]) -> Result<Vec<f64>, SweepError> {
        if weights.len() != self.num_angles {
            return Err(SweepError::QuadratureMismatch(format!(
                "{} weights for {} directions",
                weights.len(),
                self.num_angles
            )));
        }
        let block = self.num_nodes * self.num_groups;
        let mut phi = vec![0.0; block];
        for (n, &w) in weights.iter().enumerate() {
            let psi = &self.values[n * block..(n + 1) * block];
            for (p, v) in phi.iter_mut().zip(psi) {
                *p += w * v;
            }
        }
        Ok(phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::structured::slab_1d;
    use std::collections::HashSet;

    #[test]
    fn map_dof_is_a_bijection() {
        let grid = slab_1d(3, 1.0, 0, |_| 0).unwrap();
        let psi = PsiStore::new(&grid, 2, 3);
        let mut seen = HashSet::new();
        for n in 0..2 {
            for c in 0..3 {
                for i in 0..2 {
                    for g in 0..3 {
                        assert!(seen.insert(psi.map_dof(n, c, i, g)));
                    }
                }
            }
        }
        assert_eq!(seen.len(), psi.values().len());
        assert!(seen.iter().all(|&o| o < psi.values().len()));
    }

    #[test]
    fn scalar_flux_weights_directions() {
        let grid = slab_1d(1, 1.0, 0, |_| 0).unwrap();
        let mut psi = PsiStore::new(&grid, 2, 1);
        psi.set(0, 0, 1, 0, 2.0);
        psi.set(1, 0, 1, 0, 4.0);
        let phi = psi.scalar_flux(&[0.5, 0.25]).unwrap();
        assert_eq!(phi, vec![0.0, 2.0]);
        assert!(psi.scalar_flux(&[1.0]).is_err());
    }

    #[test]
    fn fluds_faces_do_not_overlap() {
        let mut f = Fluds::new(3, 2, 2);
        f.face_mut(0, 1).fill(1.0);
        f.face_mut(1, 2).fill(2.0);
        assert_eq!(f.face(0, 1), &[1.0; 4]);
        assert_eq!(f.face(1, 2), &[2.0; 8]);
        f.clear();
        assert!(f.face(0, 3).iter().all(|&v| v == 0.0));
    }
}
