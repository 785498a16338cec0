//! Course and Collision
//!
//! Static course data and the collision predicate the orchestrator uses
//! to judge each proposed move.
//!
//! ## Module Structure
//!
//! - `course`: Match parameters, obstacle grid, course document, vision window
//! - `collision`: Segment-vs-grid collision test
//! - `state`: Per-car position and velocity

pub mod course;
pub mod collision;
pub mod state;

// Re-export key types
pub use course::{Course, CourseError, ObstacleGrid};
pub use state::RacerState;
