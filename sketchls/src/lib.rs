#![doc = include_str!("../README.md")]

pub use lm_faer::{EngineError, Options, Stats, Status};

pub use crate::conflict::{ConflictEntry, ConflictReport};
pub use crate::constraints::Constraint;
pub use crate::error::Error;
pub use crate::id::{ArcId, CircleId, ConstraintId, LineId, PointId, ShapeId};
pub use crate::shapes::{Arc, Circle, Line, Shape};
pub use crate::sketch::Sketch;

/// Lowering of the constraint list into a sparse system.
mod compiler;
/// Conflict report types.
mod conflict;
/// Each kind of constraint we support.
mod constraints;
mod error;
/// IDs of points, shapes and constraints.
mod id;
/// Geometric data (lines, circles, arcs).
mod shapes;
/// The sketch controller.
mod sketch;
