//! Injected per-cell sweep kernel and the data view it works on.
//!
//! Angle and group indices handed to the kernel are local to the angle set:
//! `a` in `0..num_angles()`, `g` in `0..num_groups()`. [`CellSweep::angle`]
//! and [`CellSweep::group`] map them to quadrature / global group indices.

use crate::mesh::cell::Cell;
use crate::mesh::vector::Vec3;
use crate::sweep::fluds::PsiStore;
use crate::sweep::orientation::FaceOrientation;
use crate::sweep::spds::Spds;
use crate::sweep_error::SweepError;
use std::ops::Range;

/// Solves one cell for every direction and group of an angle set.
///
/// The kernel reads upwind data with [`CellSweep::incoming_psi`], writes
/// cell unknowns with [`CellSweep::set_psi`] and downwind face values with
/// [`CellSweep::set_outgoing_psi`] for every outgoing face.
pub trait SweepKernel {
    fn sweep_cell(&mut self, cell: &mut CellSweep<'_>) -> Result<(), SweepError>;
}

impl<F> SweepKernel for F
where
    F: FnMut(&mut CellSweep<'_>) -> Result<(), SweepError>,
{
    fn sweep_cell(&mut self, cell: &mut CellSweep<'_>) -> Result<(), SweepError> {
        self(cell)
    }
}

/// Kernel's view of one cell during one angle set's execution.
///
/// Face values are indexed `(node * A + a) * G + g` in the face's own node
/// order.
pub struct CellSweep<'a> {
    pub(crate) cell: &'a Cell,
    pub(crate) spds: &'a Spds,
    pub(crate) angles: &'a [usize],
    pub(crate) omegas: &'a [Vec3],
    pub(crate) groups: Range<usize>,
    pub(crate) incoming: &'a [Vec<f64>],
    pub(crate) outgoing: &'a mut [Vec<f64>],
    pub(crate) psi: &'a mut PsiStore,
}

impl<'a> CellSweep<'a> {
    #[inline]
    pub fn cell(&self) -> &Cell {
        self.cell
    }

    #[inline]
    pub fn num_angles(&self) -> usize {
        self.angles.len()
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Quadrature index of set-local angle `a`.
    #[inline]
    pub fn angle(&self, a: usize) -> usize {
        self.angles[a]
    }

    #[inline]
    pub fn omega(&self, a: usize) -> Vec3 {
        self.omegas[a]
    }

    /// Global group index of set-local group `g`.
    #[inline]
    pub fn group(&self, g: usize) -> usize {
        self.groups.start + g
    }

    #[inline]
    pub fn orientation(&self, face: usize) -> FaceOrientation {
        self.spds.orientation(self.cell.local_id, face)
    }

    #[inline]
    fn face_index(&self, node: usize, a: usize, g: usize) -> usize {
        (node * self.angles.len() + a) * self.groups.len() + g
    }

    /// Upwind value on `face`; zero for faces that are not incoming.
    #[inline]
    pub fn incoming_psi(&self, face: usize, node: usize, a: usize, g: usize) -> f64 {
        self.incoming[face][self.face_index(node, a, g)]
    }

    /// Downwind value on `face`.
    #[inline]
    pub fn set_outgoing_psi(&mut self, face: usize, node: usize, a: usize, g: usize, value: f64) {
        let i = self.face_index(node, a, g);
        self.outgoing[face][i] = value;
    }

    #[inline]
    pub fn outgoing_psi(&self, face: usize, node: usize, a: usize, g: usize) -> f64 {
        self.outgoing[face][self.face_index(node, a, g)]
    }

    /// Cell unknown at `node`.
    #[inline]
    pub fn psi(&self, node: usize, a: usize, g: usize) -> f64 {
        self.psi.get(self.angles[a], self.cell.local_id, node, self.groups.start + g)
    }

    #[inline]
    pub fn set_psi(&mut self, node: usize, a: usize, g: usize, value: f64) {
        self.psi.set(self.angles[a], self.cell.local_id, node, self.groups.start + g, value);
    }
}
