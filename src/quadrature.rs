//! Angular quadrature view: directions, abscissae and weights.
//!
//! Quadrature generation is outside this crate; callers hand in either
//! `(phi, theta)` abscissae or direction vectors together with weights.

use crate::mesh::vector::Vec3;
use crate::sweep_error::SweepError;
use serde::{Deserialize, Serialize};

/// Azimuthal (`phi`) and polar (`theta`) angle of a direction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Abscissa {
    pub phi: f64,
    pub theta: f64,
}

impl Abscissa {
    /// Unit direction `(sin t cos p, sin t sin p, cos t)`.
    pub fn omega(self) -> Vec3 {
        let (st, ct) = self.theta.sin_cos();
        let (sp, cp) = self.phi.sin_cos();
        Vec3::new(st * cp, st * sp, ct)
    }
}

/// Ordered set of directions with weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngularQuadrature {
    abscissae: Vec<Abscissa>,
    omegas: Vec<Vec3>,
    weights: Vec<f64>,
}

impl AngularQuadrature {
    /// Build from abscissae; directions are derived from the angles.
    pub fn new(abscissae: Vec<Abscissa>, weights: Vec<f64>) -> Result<Self, SweepError> {
        if abscissae.len() != weights.len() {
            return Err(SweepError::QuadratureMismatch(format!(
                "{} abscissae but {} weights",
                abscissae.len(),
                weights.len()
            )));
        }
        let omegas = abscissae.iter().map(|a| a.omega()).collect();
        Ok(Self {
            abscissae,
            omegas,
            weights,
        })
    }

    /// Build from direction vectors (normalised here); abscissae are derived.
    pub fn from_directions(directions: Vec<Vec3>, weights: Vec<f64>) -> Result<Self, SweepError> {
        if directions.len() != weights.len() {
            return Err(SweepError::QuadratureMismatch(format!(
                "{} directions but {} weights",
                directions.len(),
                weights.len()
            )));
        }
        let mut omegas = Vec::with_capacity(directions.len());
        let mut abscissae = Vec::with_capacity(directions.len());
        for (n, d) in directions.into_iter().enumerate() {
            let w = d.normalized();
            if w.norm() == 0.0 {
                return Err(SweepError::QuadratureMismatch(format!("direction {n} is zero")));
            }
            abscissae.push(Abscissa {
                phi: w.y.atan2(w.x),
                theta: w.z.clamp(-1.0, 1.0).acos(),
            });
            omegas.push(w);
        }
        Ok(Self {
            abscissae,
            omegas,
            weights,
        })
    }

    /// The eight `(+-mu, +-mu, +-mu)` directions, `mu = 1/sqrt(3)`, equal weights summing to 4 pi.
    pub fn s2_octants() -> Self {
        let mu = 1.0 / 3f64.sqrt();
        let mut dirs = Vec::with_capacity(8);
        for sz in [1.0, -1.0] {
            for sy in [1.0, -1.0] {
                for sx in [1.0, -1.0] {
                    dirs.push(Vec3::new(sx * mu, sy * mu, sz * mu));
                }
            }
        }
        let abscissae = dirs
            .iter()
            .map(|w| Abscissa {
                phi: w.y.atan2(w.x),
                theta: w.z.acos(),
            })
            .collect();
        Self {
            abscissae,
            omegas: dirs,
            weights: vec![4.0 * std::f64::consts::PI / 8.0; 8],
        }
    }

    #[inline]
    pub fn num_angles(&self) -> usize {
        self.omegas.len()
    }

    #[inline]
    pub fn omega(&self, n: usize) -> Vec3 {
        self.omegas[n]
    }

    #[inline]
    pub fn omegas(&self) -> &[Vec3] {
        &self.omegas
    }

    #[inline]
    pub fn abscissae(&self) -> &[Abscissa] {
        &self.abscissae
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Index of the direction equal to `omega` within `tol`, if any.
    pub fn find_direction(&self, omega: Vec3, tol: f64) -> Option<usize> {
        self.omegas.iter().position(|w| w.approx_eq(omega, tol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abscissa_round_trip() {
        let q = AngularQuadrature::from_directions(vec![Vec3::new(0.3, -0.4, 0.5)], vec![1.0])
            .unwrap();
        let back = q.abscissae()[0].omega();
        assert!(back.approx_eq(q.omega(0), 1e-12));
    }

    #[test]
    fn s2_has_mirror_pairs() {
        let q = AngularQuadrature::s2_octants();
        assert_eq!(q.num_angles(), 8);
        let total: f64 = q.weights().iter().sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-12);
        for n in 0..8 {
            let mirror = q.omega(n).reflect(Vec3::new(1.0, 0.0, 0.0));
            assert!(q.find_direction(mirror, 1e-12).is_some());
        }
    }

    #[test]
    fn weight_count_must_match() {
        let err = AngularQuadrature::new(vec![Abscissa { phi: 0.0, theta: 0.5 }], vec![]);
        assert!(matches!(err, Err(SweepError::QuadratureMismatch(_))));
    }
}
