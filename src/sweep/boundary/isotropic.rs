//! Incident isotropic boundary: one value per group, independent of angle and face.

/// Group-wise constant incoming flux.
#[derive(Clone, Debug, PartialEq)]
pub struct IsotropicBoundary {
    values: Vec<f64>,
}

impl IsotropicBoundary {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use crate::sweep::boundary::SweepBoundary;

    #[test]
    fn same_values_everywhere() {
        let b = SweepBoundary::isotropic(3, vec![1.5, 0.5]);
        for angle in 0..4 {
            assert_eq!(b.psi_incoming(angle % 2, 1, 0, angle).unwrap(), &[1.5, 0.5]);
        }
    }
}
