//! Child-Process Wire Protocol
//!
//! Plain text, decimal integers separated by spaces and newlines.
//!
//! ```text
//! handshake  judge -> AI   thinkTime\n stepLimit\n width length\n vision\n
//!            AI -> judge   0
//! turn       judge -> AI   turn\n timeLeft\n
//!                          selfX selfY\n selfVX selfVY\n
//!                          oppX oppY\n oppVX oppVY\n
//!                          (2*vision+1) rows of `width` cells
//!            AI -> judge   ax ay          (each in -1..=1)
//! ```

use std::fmt::{self, Write as _};
use std::num::IntErrorKind;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::geometry::IntVec;
use crate::game::course::Course;
use crate::game::state::RacerState;
use crate::ACCELERATION_LIMIT;

/// Offending tokens are quoted up to this many characters.
const CLIP_LEN: usize = 100;

// =============================================================================
// STATUS AND FAILURES
// =============================================================================

/// Protocol standing of a player. Anything but `Valid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    /// Still playing.
    Valid,
    /// Sent a malformed or out-of-range reply.
    Invalid,
    /// Ran out of think time.
    Timeout,
    /// Process exited (or never started).
    Died,
}

impl PlayerStatus {
    /// Can the player still take turns?
    pub fn is_valid(self) -> bool {
        self == PlayerStatus::Valid
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayerStatus::Valid => "VALID",
            PlayerStatus::Invalid => "INVALID",
            PlayerStatus::Timeout => "TIMEOUT",
            PlayerStatus::Died => "DIED",
        })
    }
}

/// Why a player left the match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFailure {
    /// Think-time budget exhausted before a reply arrived.
    #[error("has been timed out")]
    Timeout,

    /// The process exited before or instead of replying.
    #[error("has died ({})", describe_exit(.exit_code))]
    ProcessTerminated {
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
    },

    /// The process could not be started at all.
    #[error("could not be started: {0}")]
    SpawnFailed(String),

    /// Reply was not a decimal integer, or the stream closed mid-reply.
    #[error("sent a malformed reply: {0}")]
    MalformedReply(String),

    /// Non-zero handshake response.
    #[error("answered the handshake with non-zero code {code}")]
    HandshakeRejected {
        /// The code received.
        code: i32,
    },

    /// Acceleration component outside `-1..=1`.
    #[error("requested acceleration {requested}, each axis must be within -1..=1")]
    AccelerationOutOfRange {
        /// The acceleration received.
        requested: IntVec,
    },
}

impl ProtocolFailure {
    /// Terminal status this failure puts a player in.
    pub fn status(&self) -> PlayerStatus {
        match self {
            ProtocolFailure::Timeout => PlayerStatus::Timeout,
            ProtocolFailure::ProcessTerminated { .. } | ProtocolFailure::SpawnFailed(_) => {
                PlayerStatus::Died
            }
            ProtocolFailure::MalformedReply(_)
            | ProtocolFailure::HandshakeRejected { .. }
            | ProtocolFailure::AccelerationOutOfRange { .. } => PlayerStatus::Invalid,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by a signal".to_string(),
    }
}

// =============================================================================
// JUDGE -> AI
// =============================================================================

/// The five-value preamble sent once at startup.
pub fn handshake_message(course: &Course) -> String {
    format!(
        "{}\n{}\n{} {}\n{}\n",
        course.think_time, course.step_limit, course.width, course.length, course.vision
    )
}

/// Everything a player is told at the start of a turn.
pub fn turn_message(
    turn: i32,
    time_left: i64,
    me: &RacerState,
    opponent: &RacerState,
    course: &Course,
) -> String {
    let mut msg = String::new();
    // Writing into a String cannot fail.
    let _ = write_turn(&mut msg, turn, time_left, me, opponent, course);
    msg
}

fn write_turn(
    out: &mut String,
    turn: i32,
    time_left: i64,
    me: &RacerState,
    opponent: &RacerState,
    course: &Course,
) -> fmt::Result {
    writeln!(out, "{turn}")?;
    writeln!(out, "{time_left}")?;
    for racer in [me, opponent] {
        writeln!(out, "{} {}", racer.position.x, racer.position.y)?;
        writeln!(out, "{} {}", racer.velocity.x, racer.velocity.y)?;
    }
    for row in course.vision_window(me.position.y) {
        let cells: Vec<String> = row.iter().map(u8::to_string).collect();
        writeln!(out, "{}", cells.join(" "))?;
    }
    Ok(())
}

// =============================================================================
// AI -> JUDGE
// =============================================================================

/// Parse one reply token as a decimal integer.
///
/// The error text quotes the token (clipped) for the operator and the
/// diagnostic log.
pub fn parse_int(token: &str) -> Result<i32, String> {
    token.parse::<i32>().map_err(|e| {
        let what = match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                "input out of int range value from AI"
            }
            _ => "input invalid argument from AI",
        };
        format!("{what} : {}", clip(token))
    })
}

fn clip(token: &str) -> String {
    match token.char_indices().nth(CLIP_LEN) {
        Some((cut, _)) => format!("\"{}...\"(clipped)", &token[..cut]),
        None => format!("\"{token}\""),
    }
}

/// Check the handshake response code.
pub fn validate_handshake(code: i32) -> Result<(), ProtocolFailure> {
    if code == 0 {
        Ok(())
    } else {
        Err(ProtocolFailure::HandshakeRejected { code })
    }
}

/// Check a requested acceleration.
pub fn validate_acceleration(ax: i32, ay: i32) -> Result<IntVec, ProtocolFailure> {
    let requested = IntVec::new(ax, ay);
    if requested.within(ACCELERATION_LIMIT) {
        Ok(requested)
    } else {
        Err(ProtocolFailure::AccelerationOutOfRange { requested })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Point;
    use crate::game::course::ObstacleGrid;

    fn small_course() -> Course {
        let grid = ObstacleGrid::new(3, 3).with_blocked([Point::new(2, 2)]);
        let mut course = Course::new(grid);
        course.vision = 1;
        course.think_time = 1500;
        course.step_limit = 40;
        course
    }

    #[test]
    fn test_handshake_message() {
        assert_eq!(handshake_message(&small_course()), "1500\n40\n3 3\n1\n");
    }

    #[test]
    fn test_turn_message_layout() {
        let course = small_course();
        let me = RacerState {
            position: Point::new(1, 1),
            velocity: IntVec::new(0, 1),
        };
        let opponent = RacerState {
            position: Point::new(2, 0),
            velocity: IntVec::new(-1, 0),
        };
        let msg = turn_message(7, 1234, &me, &opponent, &course);
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(&lines[..6], &["7", "1234", "1 1", "0 1", "2 0", "-1 0"]);

        let rows = &lines[6..];
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row.split_whitespace().count(), 3);
        }
        assert_eq!(rows, &["0 0 0", "0 0 0", "0 0 1"]);
        assert!(msg.ends_with('\n'));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0"), Ok(0));
        assert_eq!(parse_int("-1"), Ok(-1));
        assert_eq!(parse_int("+1"), Ok(1));

        let err = parse_int("abc").unwrap_err();
        assert_eq!(err, "input invalid argument from AI : \"abc\"");

        let err = parse_int("99999999999").unwrap_err();
        assert!(err.starts_with("input out of int range value from AI"));
    }

    #[test]
    fn test_long_token_is_clipped() {
        let token = "x".repeat(150);
        let err = parse_int(&token).unwrap_err();
        assert!(err.ends_with("...\"(clipped)"));
        assert!(err.contains(&"x".repeat(100)));
        assert!(!err.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_validate_acceleration() {
        assert_eq!(validate_acceleration(1, -1), Ok(IntVec::new(1, -1)));
        assert_eq!(
            validate_acceleration(2, 0),
            Err(ProtocolFailure::AccelerationOutOfRange {
                requested: IntVec::new(2, 0)
            })
        );
        assert_eq!(validate_acceleration(2, 0).unwrap_err().status(), PlayerStatus::Invalid);
    }

    #[test]
    fn test_validate_handshake() {
        assert!(validate_handshake(0).is_ok());
        assert_eq!(
            validate_handshake(1),
            Err(ProtocolFailure::HandshakeRejected { code: 1 })
        );
    }

    #[test]
    fn test_failure_status_mapping() {
        assert_eq!(ProtocolFailure::Timeout.status(), PlayerStatus::Timeout);
        assert_eq!(
            ProtocolFailure::ProcessTerminated { exit_code: Some(3) }.status(),
            PlayerStatus::Died
        );
        assert_eq!(
            ProtocolFailure::MalformedReply("x".into()).status(),
            PlayerStatus::Invalid
        );
        assert_eq!(
            ProtocolFailure::ProcessTerminated { exit_code: Some(3) }.to_string(),
            "has died (exit code 3)"
        );
    }
}
