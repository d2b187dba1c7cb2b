//! Boundary whose incoming flux is computed by a user function.
//!
//! The function is evaluated once per boundary face node during setup and the
//! results are cached; sweeps only read the cache.

use super::{FaceNodeTable, angle_block};
use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::quadrature::{Abscissa, AngularQuadrature};
use crate::sweep_error::SweepError;
use std::fmt;

/// Everything an arbitrary boundary function may depend on, for one face node.
#[derive(Clone, Debug)]
pub struct BoundaryQuery<'a> {
    pub cell_global_id: u64,
    pub material_id: i32,
    pub face: usize,
    pub face_node: usize,
    pub position: Vec3,
    pub normal: Vec3,
    pub angles: &'a [usize],
    pub omegas: &'a [Vec3],
    pub abscissae: &'a [Abscissa],
    pub groups: &'a [usize],
    pub time: f64,
}

/// Computes incoming flux for one face node.
///
/// Must return `angles.len() * groups.len()` values, angle-major.
pub trait BoundaryFunction: Send + Sync {
    fn evaluate(&self, query: &BoundaryQuery<'_>) -> Vec<f64>;
}

impl<F> BoundaryFunction for F
where
    F: Fn(&BoundaryQuery<'_>) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, query: &BoundaryQuery<'_>) -> Vec<f64> {
        self(query)
    }
}

pub struct ArbitraryBoundary {
    function: Box<dyn BoundaryFunction>,
    cache: Option<FaceNodeTable>,
}

impl fmt::Debug for ArbitraryBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbitraryBoundary")
            .field("cached_faces", &self.cache.as_ref().map(FaceNodeTable::len))
            .finish_non_exhaustive()
    }
}

impl ArbitraryBoundary {
    pub fn new(function: Box<dyn BoundaryFunction>) -> Self {
        Self {
            function,
            cache: None,
        }
    }

    #[inline]
    pub fn is_set_up(&self) -> bool {
        self.cache.is_some()
    }

    pub(crate) fn setup(
        &mut self,
        boundary_id: u64,
        num_groups: usize,
        time: f64,
        grid: &LocalGrid,
        quadrature: &AngularQuadrature,
    ) -> Result<(), SweepError> {
        let angles: Vec<usize> = (0..quadrature.num_angles()).collect();
        let groups: Vec<usize> = (0..num_groups).collect();
        let expected = angles.len() * groups.len();
        let mut table = FaceNodeTable::new(expected);

        for cell in grid.cells() {
            for (f, face) in cell.faces.iter().enumerate() {
                if face.boundary_id() != Some(boundary_id) {
                    continue;
                }
                let mut nodes = Vec::with_capacity(face.num_nodes());
                for (k, &vid) in face.vertex_ids.iter().enumerate() {
                    let position = grid.vertex(vid).ok_or_else(|| SweepError::FaceMismatch {
                        rank: grid.rank(),
                        cell: cell.global_id,
                        face: f,
                        detail: format!("vertex {vid} has no position"),
                    })?;
                    let values = self.function.evaluate(&BoundaryQuery {
                        cell_global_id: cell.global_id,
                        material_id: cell.material_id,
                        face: f,
                        face_node: k,
                        position,
                        normal: face.normal,
                        angles: &angles,
                        omegas: quadrature.omegas(),
                        abscissae: quadrature.abscissae(),
                        groups: &groups,
                        time,
                    });
                    if values.len() != expected {
                        return Err(SweepError::BoundaryFunctionLength {
                            boundary_id,
                            expected,
                            got: values.len(),
                        });
                    }
                    nodes.push(values);
                }
                table.insert(cell.local_id, f, nodes)?;
            }
        }
        self.cache = Some(table);
        Ok(())
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
        let cache = self
            .cache
            .as_ref()
            .ok_or(SweepError::BoundaryNotSetUp { boundary_id })?;
        let values = cache.get(cell, face, node).ok_or(SweepError::MissingBoundaryData {
            boundary_id,
            cell,
            face,
            node,
        })?;
        angle_block(values, angle, num_groups)
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::structured::{XMIN, slab_1d};
    use crate::quadrature::AngularQuadrature;
    use crate::sweep::boundary::{BoundaryQuery, SweepBoundary};
    use crate::sweep_error::SweepError;

    #[test]
    fn query_before_setup_is_an_error() {
        let b = SweepBoundary::arbitrary(XMIN, 1, |_: &BoundaryQuery<'_>| vec![1.0; 8]);
        assert_eq!(
            b.psi_incoming(0, 0, 0, 0).unwrap_err(),
            SweepError::BoundaryNotSetUp { boundary_id: XMIN }
        );
    }

    #[test]
    fn evaluates_per_angle_and_group() {
        let grid = slab_1d(2, 2.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let f = |query: &BoundaryQuery<'_>| {
            let mut out = Vec::new();
            for &n in query.angles {
                for &g in query.groups {
                    out.push(n as f64 * 10.0 + g as f64 + query.time);
                }
            }
            out
        };
        let mut b = SweepBoundary::arbitrary(XMIN, 2, f);
        b.set_evaluation_time(0.5);
        b.setup(&grid, &q).unwrap();
        assert_eq!(b.psi_incoming(0, 0, 0, 3).unwrap(), &[30.5, 31.5]);
        // the xmax face is not on this boundary
        assert!(matches!(
            b.psi_incoming(1, 1, 0, 0),
            Err(SweepError::MissingBoundaryData { .. })
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        let grid = slab_1d(1, 1.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::s2_octants();
        let mut b = SweepBoundary::arbitrary(XMIN, 1, |_: &BoundaryQuery<'_>| vec![0.0; 3]);
        assert_eq!(
            b.setup(&grid, &q).unwrap_err(),
            SweepError::BoundaryFunctionLength {
                boundary_id: XMIN,
                expected: 8,
                got: 3
            }
        );
    }
}
