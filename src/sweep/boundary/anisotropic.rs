//! Incident anisotropic heterogeneous boundary: caller-supplied values per
//! face node, direction and group.

use super::{FaceNodeTable, angle_block};
use crate::quadrature::AngularQuadrature;
use crate::sweep_error::SweepError;

#[derive(Clone, Debug, PartialEq)]
pub struct AnisotropicBoundary {
    table: FaceNodeTable,
}

impl AnisotropicBoundary {
    pub fn new(table: FaceNodeTable) -> Self {
        Self { table }
    }

    #[inline]
    pub fn table(&self) -> &FaceNodeTable {
        &self.table
    }

    pub(crate) fn setup(
        &mut self,
        boundary_id: u64,
        num_groups: usize,
        quadrature: &AngularQuadrature,
    ) -> Result<(), SweepError> {
        let expected = quadrature.num_angles() * num_groups;
        if self.table.num_values() != expected {
            return Err(SweepError::BoundaryFunctionLength {
                boundary_id,
                expected,
                got: self.table.num_values(),
            });
        }
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
        let values = self
            .table
            .get(cell, face, node)
            .ok_or(SweepError::MissingBoundaryData {
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
    use crate::sweep::boundary::{FaceNodeTable, SweepBoundary};
    use crate::sweep_error::SweepError;

    #[test]
    fn lookup_and_missing_entry() {
        // two angles, two groups
        let mut table = FaceNodeTable::new(4);
        table.insert(0, 0, vec![vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
        let b = SweepBoundary::anisotropic(5, 2, table);
        assert_eq!(b.psi_incoming(0, 0, 0, 1).unwrap(), &[3.0, 4.0]);
        assert!(matches!(
            b.psi_incoming(0, 1, 0, 0),
            Err(SweepError::MissingBoundaryData { boundary_id: 5, face: 1, .. })
        ));
        assert!(matches!(
            b.psi_incoming(0, 0, 0, 2),
            Err(SweepError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn wrong_width_rejected() {
        let mut table = FaceNodeTable::new(2);
        assert!(table.insert(0, 0, vec![vec![1.0]]).is_err());
    }
}
