//! The parallel sweep: dependency graphs, angle sets, boundaries and the
//! scheduler that drives them.

pub mod aggregation;
pub mod angle_set;
pub mod boundary;
pub mod fluds;
pub mod kernel;
pub mod ordering;
pub mod orientation;
pub mod scheduler;
pub mod spds;
pub mod status;
pub mod task_graph;

pub use angle_set::{AngleSet, AngleSetCounters};
pub use boundary::{BoundaryKind, BoundarySet, FaceNodeTable, SweepBoundary};
pub use fluds::{Fluds, PsiStore};
pub use kernel::{CellSweep, SweepKernel};
pub use ordering::OrderingReport;
pub use orientation::{FaceOrientation, PARALLEL_TOLERANCE};
pub use scheduler::{SweepScheduler, SweepStats};
pub use spds::{FaceCrossing, Spds, build_task_graph};
pub use status::{AngleSetStatus, PollSummary, next_status};
pub use task_graph::{Spls, Task, TaskGraph};
