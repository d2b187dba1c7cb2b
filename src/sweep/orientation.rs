//! Face orientation relative to a sweep direction.

use crate::mesh::vector::Vec3;

/// `|omega . n|` below this is treated as grazing.
pub const PARALLEL_TOLERANCE: f64 = 1.0e-12;

/// How a face is seen from a direction.
///
/// `Parallel` faces neither create a dependency nor carry flux.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaceOrientation {
    Incoming,
    Outgoing,
    Parallel,
}

impl FaceOrientation {
    /// Classify an outward face normal against a direction.
    #[inline]
    pub fn classify(omega: Vec3, normal: Vec3) -> Self {
        let mu = omega.dot(normal);
        if mu.abs() < PARALLEL_TOLERANCE {
            FaceOrientation::Parallel
        } else if mu < 0.0 {
            FaceOrientation::Incoming
        } else {
            FaceOrientation::Outgoing
        }
    }

    #[inline]
    pub fn is_incoming(self) -> bool {
        self == FaceOrientation::Incoming
    }

    #[inline]
    pub fn is_outgoing(self) -> bool {
        self == FaceOrientation::Outgoing
    }
}
