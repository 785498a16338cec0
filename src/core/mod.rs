//! Core lattice primitives.
//!
//! Pure value types with no dependencies on the rest of the crate.
//! Every predicate is exact integer arithmetic.

pub mod geometry;

// Re-export core types
pub use geometry::{Point, IntVec, LineSegment, dot, cross, ccw};
