//! Integer Lattice Geometry
//!
//! Points, velocity vectors and line segments on the course lattice.
//! All predicates use exact integer arithmetic (differences in i64,
//! products in i128), so no epsilon handling is ever needed and any pair
//! of `i32` points is handled without overflow.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

/// A lattice point on the course.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Column (0 = leftmost)
    pub x: i32,
    /// Row (0 = start line)
    pub y: i32,
}

impl Point {
    /// The origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An integer vector (velocity or acceleration).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntVec {
    /// X component
    pub x: i32,
    /// Y component
    pub y: i32,
}

impl IntVec {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True if both components lie in `[-limit, limit]`.
    #[inline]
    pub fn within(self, limit: i32) -> bool {
        (-limit..=limit).contains(&self.x) && (-limit..=limit).contains(&self.y)
    }
}

impl fmt::Debug for IntVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.x, self.y)
    }
}

impl fmt::Display for IntVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for IntVec {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Neg for IntVec {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Add<IntVec> for Point {
    type Output = Point;
    #[inline]
    fn add(self, v: IntVec) -> Point {
        Point::new(self.x + v.x, self.y + v.y)
    }
}

impl Sub for Point {
    type Output = IntVec;
    #[inline]
    fn sub(self, other: Point) -> IntVec {
        IntVec::new(self.x - other.x, self.y - other.y)
    }
}

/// Dot product of two vectors given by components.
///
/// Evaluated in `i128`, so differences of any two `i32` coordinates
/// can be passed in without overflow.
#[inline]
pub fn dot(x1: i64, y1: i64, x2: i64, y2: i64) -> i128 {
    i128::from(x1) * i128::from(x2) + i128::from(y1) * i128::from(y2)
}

/// Z component of the cross product of two vectors given by components.
#[inline]
pub fn cross(x1: i64, y1: i64, x2: i64, y2: i64) -> i128 {
    i128::from(x1) * i128::from(y2) - i128::from(x2) * i128::from(y1)
}

/// Components of `a - b`, widened so no `i32` pair can overflow.
#[inline]
fn delta(a: Point, b: Point) -> (i64, i64) {
    (
        i64::from(a.x) - i64::from(b.x),
        i64::from(a.y) - i64::from(b.y),
    )
}

/// Orientation of the turn a -> b -> c.
///
/// Positive for a counter-clockwise turn, negative for clockwise,
/// zero when the three points are collinear.
#[inline]
pub fn ccw(a: Point, b: Point, c: Point) -> i128 {
    let (abx, aby) = delta(b, a);
    let (bcx, bcy) = delta(c, b);
    cross(abx, aby, bcx, bcy)
}

/// A straight segment between two lattice points (inclusive).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LineSegment {
    /// Start point
    pub p1: Point,
    /// End point
    pub p2: Point,
}

impl LineSegment {
    /// Create a segment from `p1` to `p2`.
    #[inline]
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    fn x_range(&self) -> (i32, i32) {
        (self.p1.x.min(self.p2.x), self.p1.x.max(self.p2.x))
    }

    fn y_range(&self) -> (i32, i32) {
        (self.p1.y.min(self.p2.y), self.p1.y.max(self.p2.y))
    }

    /// Does the segment pass through `p`, endpoints included?
    pub fn goes_thru(&self, p: Point) -> bool {
        let (min_x, max_x) = self.x_range();
        if p.x < min_x || p.x > max_x {
            return false;
        }
        let (min_y, max_y) = self.y_range();
        if p.y < min_y || p.y > max_y {
            return false;
        }
        let (x1, y1) = delta(self.p1, p);
        let (x2, y2) = delta(self.p2, p);
        ccw(self.p1, self.p2, p) == 0 && dot(x1, y1, x2, y2) <= 0
    }

    /// Do the two segments share at least one point?
    ///
    /// Touching endpoints and collinear overlap both count as intersecting.
    pub fn intersects(&self, other: &LineSegment) -> bool {
        let (min_x, max_x) = self.x_range();
        let (other_min_x, other_max_x) = other.x_range();
        if max_x < other_min_x || other_max_x < min_x {
            return false;
        }
        let (min_y, max_y) = self.y_range();
        let (other_min_y, other_max_y) = other.y_range();
        if max_y < other_min_y || other_max_y < min_y {
            return false;
        }

        if other.side_of(self.p1).signum() * other.side_of(self.p2).signum() > 0 {
            return false;
        }
        if self.side_of(other.p1).signum() * self.side_of(other.p2).signum() > 0 {
            return false;
        }
        true
    }

    /// Signed area telling which side of this segment's line `p` lies on.
    fn side_of(&self, p: Point) -> i128 {
        let (dx, dy) = delta(self.p2, self.p1);
        let (rx, ry) = delta(p, self.p1);
        cross(rx, ry, dx, dy)
    }
}
