//! Collision Detection
//!
//! Decides whether a one-tick straight move crosses an obstacle.
//!
//! Obstacles are lattice points. A move collides when it lands on one, or
//! when it crosses the "wall" joining two adjacent obstacles (including
//! diagonal neighbours). The diagonal case matters: a path can thread the
//! pinch point between two corner-touching obstacles without entering
//! either cell, and that must still count as a crash.
//!
//! Cost is O(|dx| * |dy|) for diagonal moves. Velocity is not bounded
//! across turns, so neither is this.

use crate::core::geometry::{LineSegment, Point};
use crate::game::course::Course;

impl Course {
    /// Does the movement segment `m` hit an obstacle?
    pub fn collides(&self, m: &LineSegment) -> bool {
        let Point { x: x1, y: y1 } = m.p1;
        let Point { x: x2, y: y2 } = m.p2;

        if self.is_blocked(m.p2) {
            return true;
        }

        let x_step = if x2 > x1 { 1 } else { -1 };
        let y_step = if y2 > y1 { 1 } else { -1 };

        if y1 == y2 {
            return walk(x1, x2, x_step).any(|x| self.is_blocked(Point::new(x, y1)));
        }
        if x1 == x2 {
            return walk(y1, y2, y_step).any(|y| self.is_blocked(Point::new(x1, y)));
        }

        walk(x1, x2, x_step).any(|x| {
            walk(y1, y2, y_step).any(|y| self.wall_crossed(m, x, y, x + x_step, y + y_step))
        })
    }

    /// Check the walls inside the 2x2 block spanned by (x, y) and (nx, ny).
    fn wall_crossed(&self, m: &LineSegment, x: i32, y: i32, nx: i32, ny: i32) -> bool {
        let walls = [
            (Point::new(x, y), Point::new(nx, ny)),
            (Point::new(x, ny), Point::new(nx, ny)),
            (Point::new(nx, y), Point::new(nx, ny)),
            (Point::new(x, ny), Point::new(nx, y)),
        ];
        walls.iter().any(|&(a, b)| {
            self.is_blocked(a) && self.is_blocked(b) && LineSegment::new(a, b).intersects(m)
        })
    }
}

/// Values from `from` towards `to`, excluding `to`.
///
/// Every value lies between the two ends, so the span may be the whole
/// `i32` range.
fn walk(
    from: i32,
    to: i32,
    step: i32,
) -> impl DoubleEndedIterator<Item = i32> + ExactSizeIterator + Clone {
    let count = (i64::from(to) - i64::from(from)).unsigned_abs();
    let start = i64::from(from);
    let step = i64::from(step);
    // count <= u32::MAX, and start + step * i stays within [from, to)
    (0..count as u32).map(move |i| (start + step * i64::from(i)) as i32)
}
