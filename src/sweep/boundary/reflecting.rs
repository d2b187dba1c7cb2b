//! Specular reflecting boundary.
//!
//! Outgoing flux of direction `n` is stored on the boundary face nodes; the
//! incoming flux of direction `n` is the stored flux of its mirror direction
//! `reflected[n]`. An angle set reading a reflecting boundary waits until the
//! mirror directions finished on this rank. When another reflecting boundary
//! faces this one (anti-parallel normals) waiting could deadlock, so such
//! "opposing" boundaries read the values of the previous sweep instead.

use super::{FaceNodeTable, angle_block, angle_block_mut};
use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::quadrature::AngularQuadrature;
use crate::sweep::orientation::PARALLEL_TOLERANCE;
use crate::sweep_error::SweepError;
use std::ops::Range;

/// Normal and direction matching tolerance.
const MATCH_TOLERANCE: f64 = 1.0e-8;

#[derive(Clone, Debug, PartialEq)]
pub struct ReflectingBoundary {
    normal: Vec3,
    reflected: Vec<usize>,
    /// Directions entering the domain through this boundary.
    incoming: Vec<bool>,
    current: FaceNodeTable,
    lagged: Option<FaceNodeTable>,
    /// `[angle * num_groups + group]`: outgoing flux written this sweep.
    ready: Vec<bool>,
    set_up: bool,
}

impl ReflectingBoundary {
    pub fn new(normal: Vec3) -> Self {
        Self {
            normal: normal.normalized(),
            reflected: Vec::new(),
            incoming: Vec::new(),
            current: FaceNodeTable::default(),
            lagged: None,
            ready: Vec::new(),
            set_up: false,
        }
    }

    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Mirror direction of every quadrature direction.
    #[inline]
    pub fn reflected_angles(&self) -> &[usize] {
        &self.reflected
    }

    #[inline]
    pub fn is_opposing(&self) -> bool {
        self.lagged.is_some()
    }

    /// True when this rank owns faces on the boundary.
    #[inline]
    pub fn has_local_faces(&self) -> bool {
        !self.current.is_empty()
    }

    pub(crate) fn setup(
        &mut self,
        boundary_id: u64,
        num_groups: usize,
        grid: &LocalGrid,
        quadrature: &AngularQuadrature,
    ) -> Result<(), SweepError> {
        let num_angles = quadrature.num_angles();
        let mut table = FaceNodeTable::new(num_angles * num_groups);
        for cell in grid.cells() {
            for (f, face) in cell.faces.iter().enumerate() {
                if face.boundary_id() != Some(boundary_id) {
                    continue;
                }
                if !face.normal.normalized().approx_eq(self.normal, MATCH_TOLERANCE) {
                    return Err(SweepError::NonPlanarReflectingBoundary {
                        boundary_id,
                        cell: cell.global_id,
                        face: f,
                    });
                }
                table.insert(
                    cell.local_id,
                    f,
                    vec![vec![0.0; num_angles * num_groups]; face.num_nodes()],
                )?;
            }
        }

        let mut reflected = Vec::with_capacity(num_angles);
        for (n, &omega) in quadrature.omegas().iter().enumerate() {
            let mirror = omega.reflect(self.normal);
            let m = quadrature
                .find_direction(mirror, MATCH_TOLERANCE)
                .ok_or(SweepError::ReflectedDirectionMissing { boundary_id, angle: n })?;
            reflected.push(m);
        }

        self.incoming = quadrature
            .omegas()
            .iter()
            .map(|w| w.dot(self.normal) < -PARALLEL_TOLERANCE)
            .collect();
        self.reflected = reflected;
        self.current = table;
        if self.lagged.is_some() {
            self.lagged = Some(self.current.clone());
        }
        self.ready = vec![false; num_angles * num_groups];
        self.set_up = true;
        Ok(())
    }

    pub(crate) fn set_opposing(&mut self, opposing: bool) {
        self.lagged = opposing.then(|| self.current.clone());
    }

    /// Clear readiness and move this sweep's outgoing values to the lagged copy.
    pub(crate) fn begin_sweep(&mut self) {
        self.ready.fill(false);
        if let Some(lagged) = &mut self.lagged {
            lagged.clone_from(&self.current);
        }
    }

    pub(crate) fn psi_incoming(
        &self,
        boundary_id: u64,
        num_groups: usize,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&[f64], SweepError> {
        if !self.set_up {
            return Err(SweepError::BoundaryNotSetUp { boundary_id });
        }
        let mirror = *self.reflected.get(angle).ok_or(SweepError::IndexOutOfRange {
            what: "reflecting boundary angle",
            index: angle,
            len: self.reflected.len(),
        })?;
        let table = self.lagged.as_ref().unwrap_or(&self.current);
        let values = table.get(cell, face, node).ok_or(SweepError::MissingBoundaryData {
            boundary_id,
            cell,
            face,
            node,
        })?;
        angle_block(values, mirror, num_groups)
    }

    pub(crate) fn psi_outgoing_mut(
        &mut self,
        boundary_id: u64,
        num_groups: usize,
        cell: usize,
        face: usize,
        node: usize,
        angle: usize,
    ) -> Result<&mut [f64], SweepError> {
        if !self.set_up {
            return Err(SweepError::BoundaryNotSetUp { boundary_id });
        }
        let values = self
            .current
            .get_mut(cell, face, node)
            .ok_or(SweepError::MissingBoundaryData {
                boundary_id,
                cell,
                face,
                node,
            })?;
        angle_block_mut(values, angle, num_groups)
    }

    pub(crate) fn is_ready(&self, angles: &[usize], groups: &Range<usize>, num_groups: usize) -> bool {
        if !self.set_up || self.is_opposing() || !self.has_local_faces() {
            return true;
        }
        angles
            .iter()
            .filter(|&&n| self.incoming.get(n).copied().unwrap_or(false))
            .all(|&n| {
                let m = self.reflected[n];
                groups.clone().all(|g| self.ready[m * num_groups + g])
            })
    }

    /// Mirror directions that `angles` wait for at this boundary. Depends on
    /// the quadrature and the normal only, never on which faces this rank owns.
    pub(crate) fn mirror_sources<'s>(&'s self, angles: &'s [usize]) -> impl Iterator<Item = usize> + 's {
        let waits = self.set_up && !self.is_opposing();
        angles
            .iter()
            .filter(move |&&n| waits && self.incoming.get(n).copied().unwrap_or(false))
            .map(move |&n| self.reflected[n])
    }

    pub(crate) fn mark_finished(&mut self, angles: &[usize], groups: &Range<usize>, num_groups: usize) {
        if !self.set_up {
            return;
        }
        for &n in angles {
            for g in groups.clone() {
                if let Some(flag) = self.ready.get_mut(n * num_groups + g) {
                    *flag = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::structured::{XMIN, slab_1d};
    use crate::mesh::vector::Vec3;
    use crate::quadrature::AngularQuadrature;
    use crate::sweep::boundary::{BoundaryKind, BoundarySet, SweepBoundary};
    use crate::sweep_error::SweepError;

    fn xmin_set() -> (BoundarySet, AngularQuadrature) {
        let grid = slab_1d(2, 2.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let mut set = BoundarySet::new(1)
            .with(SweepBoundary::reflecting(XMIN, 1, Vec3::new(-1.0, 0.0, 0.0)))
            .unwrap();
        set.setup(&grid, &q).unwrap();
        (set, q)
    }

    #[test]
    fn query_before_setup_fails() {
        let b = SweepBoundary::reflecting(0, 1, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            b.psi_incoming(0, 0, 0, 0).unwrap_err(),
            SweepError::BoundaryNotSetUp { boundary_id: 0 }
        );
    }

    #[test]
    fn incoming_reads_mirror_slot() {
        let (mut set, q) = xmin_set();
        // direction 1 is (-mu, +mu, +mu); its mirror about x is direction 0
        let mirror = q.find_direction(q.omega(1).reflect(Vec3::new(1.0, 0.0, 0.0)), 1e-12).unwrap();
        assert_eq!(mirror, 0);
        set.psi_outgoing_mut(XMIN, 0, 0, 0, 1).unwrap()[0] = 7.0;
        assert_eq!(set.psi_incoming(XMIN, 0, 0, 0, 0).unwrap(), &[7.0]);
        assert_eq!(set.psi_incoming(XMIN, 0, 0, 0, 1).unwrap(), &[0.0]);
    }

    #[test]
    fn readiness_follows_mirror_completion() {
        let (mut set, q) = xmin_set();
        let inward: Vec<usize> = (0..8).filter(|&n| q.omega(n).x > 0.0).collect();
        let outward: Vec<usize> = (0..8).filter(|&n| q.omega(n).x < 0.0).collect();
        assert!(!set.incoming_ready(&inward, &(0..1)));
        assert!(set.incoming_ready(&outward, &(0..1)));
        set.mark_finished(&outward, &(0..1));
        assert!(set.incoming_ready(&inward, &(0..1)));
        set.begin_sweep();
        assert!(!set.incoming_ready(&inward, &(0..1)));
    }

    #[test]
    fn mirror_sources_ignore_face_ownership() {
        let q = AngularQuadrature::s2_octants();
        // rank 1 owns no XMIN face but must wait on the same mirrors as rank 0
        let remote = slab_1d(2, 2.0, 1, |g| g as usize).unwrap();
        let mut set = BoundarySet::new(1)
            .with(SweepBoundary::reflecting(XMIN, 1, Vec3::new(-1.0, 0.0, 0.0)))
            .unwrap();
        set.setup(&remote, &q).unwrap();
        let (local, _) = xmin_set();

        let all: Vec<usize> = (0..8).collect();
        let mut expected: Vec<usize> = (0..8)
            .filter(|&n| q.omega(n).x > 0.0)
            .map(|n| q.find_direction(q.omega(n).reflect(Vec3::new(1.0, 0.0, 0.0)), 1e-12).unwrap())
            .collect();
        expected.sort_unstable();
        assert_eq!(set.mirror_sources(&all), expected);
        assert_eq!(local.mirror_sources(&all), expected);
        assert!(set.incoming_ready(&all, &(0..1)));
    }

    #[test]
    fn misaligned_face_rejected() {
        let grid = slab_1d(1, 1.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let mut b = SweepBoundary::reflecting(XMIN, 1, Vec3::new(0.0, 1.0, 0.0));
        assert!(matches!(
            b.setup(&grid, &q),
            Err(SweepError::NonPlanarReflectingBoundary { boundary_id: XMIN, .. })
        ));
        assert!(matches!(b.kind(), BoundaryKind::Reflecting(_)));
    }
}
