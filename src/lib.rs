//! # Race Judge
//!
//! Referee engine for turn-based two-player races between external AI
//! programs on a grid course.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RACE JUDGE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Exact lattice primitives                  │
//! │  └── geometry.rs - Point, vector, segment predicates         │
//! │                                                              │
//! │  game/           - Course rules (pure, synchronous)          │
//! │  ├── course.rs   - Parameters, obstacle grid, document       │
//! │  ├── collision.rs- Move-vs-obstacle test                     │
//! │  └── state.rs    - Position and velocity                     │
//! │                                                              │
//! │  player/         - Child processes (async)                   │
//! │  ├── protocol.rs - Wire messages and failures                │
//! │  ├── channel.rs  - Deadline-bounded reply reader             │
//! │  ├── relay.rs    - Stderr relay into the diagnostic log      │
//! │  ├── hooks.rs    - AI command, pause/resume hooks            │
//! │  └── session.rs  - Handshake and per-turn exchange           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exactness
//!
//! The `core/` and `game/` modules use integer arithmetic only. Collision
//! and intersection predicates widen coordinate differences to `i64` and
//! products to `i128`, so every verdict is exact for any `i32` coordinates.
//! Moving a point (`Point + IntVec`) is plain `i32` addition; keeping
//! positions in range is the caller's job.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod player;

// Re-export commonly used types
pub use crate::core::geometry::{IntVec, LineSegment, Point};
pub use game::course::{Course, CourseError, ObstacleGrid};
pub use game::state::RacerState;
pub use player::hooks::AiCommand;
pub use player::protocol::{PlayerStatus, ProtocolFailure};
pub use player::relay::DiagnosticSink;
pub use player::session::{PlayerSession, SessionOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Required value of a course document's `filetype` field.
pub const COURSE_FILE_TYPE: &str = "race course";

/// Default byte budget for a child's stderr in the diagnostic log.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 1 << 15;

/// Largest magnitude allowed on each acceleration axis.
pub const ACCELERATION_LIMIT: i32 = 1;
