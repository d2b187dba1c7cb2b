#![cfg_attr(docsrs, feature(doc_cfg))]
//! # transport-sweep
//!
//! transport-sweep schedules the transport sweep of discrete-ordinates
//! neutral-particle transport over a mesh distributed across many ranks. For
//! every direction, cell unknowns are resolved in upwind-to-downwind order;
//! dependencies crossing a partition boundary are satisfied by non-blocking
//! messages.
//!
//! ## Features
//! - Per-direction dependency graphs (SPDS) batched into stages, with cycle
//!   detection and a cross-rank symmetry check
//! - Angle sets advanced by an explicit status state machine and a throttled
//!   cooperative scheduler
//! - Vacuum, isotropic, anisotropic, reflecting and function-defined boundaries
//! - Pluggable communication backends: serial, in-process threads, MPI
//! - Source iteration around the sweep
//!
//! The per-cell discretization is injected as a [`SweepKernel`]; the crate
//! never assumes a particular spatial scheme.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! transport-sweep = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ## Determinism
//!
//! Graph construction, stage order, angle set ids and message tags depend only
//! on the grid, quadrature and configuration, so every rank derives the same
//! layout and repeated builds are identical.
//!
//! ## Logging
//!
//! Records go through the `log` facade under the `transport_sweep` target
//! (see [`context::SweepLog`]); install any `log` backend to see them.

pub mod algs;
pub mod config;
pub mod context;
pub mod debug_invariants;
pub mod iteration;
pub mod mesh;
pub mod quadrature;
pub mod sweep;
pub mod sweep_error;

pub use debug_invariants::DebugInvariants;
pub use sweep::kernel::SweepKernel;
pub use sweep_error::SweepError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::config::{AngleAggregation, IterationConfig, SweepConfig};
    pub use crate::context::{SweepContext, SweepLog};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::iteration::{IterationOutcome, SourceUpdate, source_iterate};
    pub use crate::mesh::{Cell, Face, LocalGrid, Locality, Vec3};
    pub use crate::quadrature::{Abscissa, AngularQuadrature};
    pub use crate::sweep::boundary::{BoundaryFunction, BoundaryQuery};
    pub use crate::sweep::{
        AngleSet, AngleSetStatus, BoundaryKind, BoundarySet, CellSweep, FaceCrossing,
        FaceNodeTable, FaceOrientation, OrderingReport, PsiStore, Spds, SweepBoundary,
        SweepKernel, SweepScheduler, SweepStats, TaskGraph, build_task_graph,
    };
    pub use crate::sweep_error::SweepError;
}
