//! External AI Players
//!
//! Everything that touches a child process: the wire protocol, the
//! deadline-bounded reply channel, the stderr relay and the session that
//! ties them together.
//!
//! ## Module Structure
//!
//! - `protocol`: Status, failure taxonomy, message encoding, reply validation
//! - `channel`: Cancellable reply reader with deadlines
//! - `relay`: Diagnostic sink and stderr relay task
//! - `hooks`: AI command line and pause/resume hooks
//! - `session`: One player's process for the length of a match

pub mod protocol;
pub mod channel;
pub mod relay;
pub mod hooks;
pub mod session;

// Re-export key types
pub use protocol::{PlayerStatus, ProtocolFailure};
pub use channel::{KillSwitch, ReadOutcome};
pub use relay::{DiagnosticRelay, DiagnosticSink};
pub use hooks::AiCommand;
pub use session::{PlayerSession, SessionOptions};
