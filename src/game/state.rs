//! Racer State
//!
//! The kinematic snapshot of one car: what a player is told about
//! itself and about its opponent every turn.

use serde::{Serialize, Deserialize};

use crate::core::geometry::{IntVec, LineSegment, Point};

/// Position and velocity of one car.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RacerState {
    /// Current cell
    pub position: Point,
    /// Cells moved per turn
    pub velocity: IntVec,
}

impl RacerState {
    /// A car at rest on the start line at column `x`.
    pub const fn at_start(x: i32) -> Self {
        Self {
            position: Point::new(x, 0),
            velocity: IntVec::ZERO,
        }
    }

    /// Apply an acceleration and return the resulting movement segment.
    ///
    /// The caller decides, via [`Course::collides`](crate::game::course::Course::collides),
    /// whether the move stands.
    pub fn advance(&mut self, acceleration: IntVec) -> LineSegment {
        let from = self.position;
        self.velocity = self.velocity + acceleration;
        self.position = self.position + self.velocity;
        LineSegment::new(from, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates_velocity() {
        let mut racer = RacerState::at_start(2);
        let m = racer.advance(IntVec::new(1, 1));
        assert_eq!(m, LineSegment::new(Point::new(2, 0), Point::new(3, 1)));

        let m = racer.advance(IntVec::new(0, 1));
        assert_eq!(racer.velocity, IntVec::new(1, 2));
        assert_eq!(m.p2, Point::new(4, 3));
    }
}
