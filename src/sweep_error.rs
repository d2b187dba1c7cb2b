//! SweepError: Unified error type for transport-sweep public APIs
//!
//! Every fallible operation in the crate returns `Result<_, SweepError>`.
//! Variants fall in two classes:
//! - structural errors (cyclic graphs, asymmetric cross-rank dependencies,
//!   messaging protocol violations, boundary misuse) which indicate an
//!   invalid configuration; callers are expected to abort the run on them;
//! - configuration/usage errors detected while building the sweep structures.
//!
//! Outer-iteration non-convergence is *not* an error; see
//! [`crate::iteration::IterationOutcome`].

use crate::mesh::vector::Vec3;
use thiserror::Error;

/// Unified error type for transport-sweep operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SweepError {
    /// The local dependency graph for a direction contains a cycle.
    #[error(
        "rank {rank}: cyclic dependency for direction {omega}: {remaining} cell(s) could not be \
         scheduled, e.g. global ids {cells:?}"
    )]
    CyclicDependency {
        rank: usize,
        omega: Vec3,
        remaining: usize,
        cells: Vec<u64>,
    },

    /// Two ranks disagree about the face crossings between them.
    #[error("rank {rank}: dependency asymmetry with rank {neighbor}: {detail}")]
    DependencyAsymmetry {
        rank: usize,
        neighbor: usize,
        detail: String,
    },

    /// A boundary that needs `setup` was queried before it.
    #[error("boundary {boundary_id}: queried before setup")]
    BoundaryNotSetUp { boundary_id: u64 },

    /// Messaging protocol violation (missing send, unexpected or duplicate data).
    #[error("rank {rank}: protocol violation with rank {peer} (tag {tag}): {reason}")]
    ProtocolViolation {
        rank: usize,
        peer: usize,
        tag: u16,
        reason: String,
    },

    /// A face references a neighbour that is neither local nor a known ghost.
    #[error("rank {rank}: cell {cell} face {face} references unknown neighbour {neighbor}")]
    UnknownNeighbor {
        rank: usize,
        cell: u64,
        face: usize,
        neighbor: u64,
    },

    /// The two sides of an interior face do not match.
    #[error("rank {rank}: cell {cell} face {face}: {detail}")]
    FaceMismatch {
        rank: usize,
        cell: u64,
        face: usize,
        detail: String,
    },

    /// A direction of an angle set classifies a face differently than the set's representative.
    #[error(
        "rank {rank}: angle {angle} orients cell {cell} face {face} differently than \
         representative angle {representative}"
    )]
    InconsistentAngleSet {
        rank: usize,
        angle: usize,
        representative: usize,
        cell: u64,
        face: usize,
    },

    /// No quadrature direction matches the mirror of `angle` on a reflecting boundary.
    #[error("boundary {boundary_id}: no reflected direction for angle {angle}")]
    ReflectedDirectionMissing { boundary_id: u64, angle: usize },

    /// A reflecting boundary face is not aligned with the boundary normal.
    #[error("boundary {boundary_id}: cell {cell} face {face} is not aligned with the reflecting normal")]
    NonPlanarReflectingBoundary {
        boundary_id: u64,
        cell: u64,
        face: usize,
    },

    /// Precomputed boundary data is missing for a queried face node.
    #[error("boundary {boundary_id}: no data for cell {cell} face {face} node {node}")]
    MissingBoundaryData {
        boundary_id: u64,
        cell: usize,
        face: usize,
        node: usize,
    },

    /// A boundary function returned the wrong number of values.
    #[error("boundary {boundary_id}: boundary function returned {got} values, expected {expected}")]
    BoundaryFunctionLength {
        boundary_id: u64,
        expected: usize,
        got: usize,
    },

    /// Outgoing flux was written to a boundary that does not store it.
    #[error("boundary {boundary_id}: {kind} boundary has no outgoing storage")]
    NoOutgoingStorage { boundary_id: u64, kind: &'static str },

    /// An index was outside its valid range.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Quadrature construction received inconsistent inputs.
    #[error("quadrature mismatch: {0}")]
    QuadratureMismatch(String),

    /// More angle sets than message tags available.
    #[error("{count} angle sets do not fit in the tag space starting at {base:#x}")]
    TooManyAngleSets { count: usize, base: u16 },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed wire payload.
    #[error("wire format error: {0}")]
    Wire(String),

    /// A structure failed its internal consistency check.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A single-rank sweep made no progress during a full pass.
    #[error("rank {rank}: sweep stalled with {unfinished} unfinished angle set(s)")]
    SweepStalled { rank: usize, unfinished: usize },
}
