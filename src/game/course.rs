//! Race Course
//!
//! Static match parameters plus the immutable obstacle grid.
//! Built once from a course document and shared read-only for the
//! rest of the match.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::{Serialize, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::geometry::Point;
use crate::COURSE_FILE_TYPE;

/// Errors raised while loading a course document.
///
/// All of these are fatal configuration errors: a match cannot run
/// without a valid course.
#[derive(Debug, Error)]
pub enum CourseError {
    /// Course file could not be read.
    #[error("failed to read course: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid JSON or lacks a required field.
    #[error("malformed course document: {0}")]
    Json(#[from] serde_json::Error),

    /// `filetype` missing or not equal to [`COURSE_FILE_TYPE`].
    #[error("the input file does not contain race course data (filetype: {found:?})")]
    WrongFileType {
        /// The filetype found, if any.
        found: Option<String>,
    },

    /// A numeric parameter is out of its valid range.
    #[error("invalid course parameter {field}: {value}")]
    BadParameter {
        /// Field name as it appears in the document.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// `obstacles` does not have `length` rows of `width` cells.
    #[error("obstacle grid shape mismatch: {0}")]
    ObstacleShape(String),
}

// =============================================================================
// OBSTACLE GRID
// =============================================================================

/// Width x length boolean matrix; `true` marks an impassable cell.
#[derive(Clone, PartialEq, Eq)]
pub struct ObstacleGrid {
    width: i32,
    length: i32,
    /// Row-major: index = y * width + x
    cells: Vec<bool>,
}

impl ObstacleGrid {
    /// An obstacle-free grid.
    pub fn new(width: i32, length: i32) -> Self {
        let width = width.max(0);
        let length = length.max(0);
        Self {
            width,
            length,
            cells: vec![false; width as usize * length as usize],
        }
    }

    /// Mark the given cells as obstacles. Points outside the grid are ignored.
    pub fn with_blocked(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        for p in points {
            if let Some(idx) = self.index(p.x, p.y) {
                self.cells[idx] = true;
            }
        }
        self
    }

    /// Grid width (columns).
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Grid length (rows).
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Is (x, y) a valid cell index?
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (0..self.width).contains(&x) && (0..self.length).contains(&y)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.contains(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Is (x, y) an obstacle? Cells outside the grid are passable.
    #[inline]
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|idx| self.cells[idx])
    }

    /// Number of obstacle cells.
    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

impl std::fmt::Debug for ObstacleGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObstacleGrid")
            .field("width", &self.width)
            .field("length", &self.length)
            .field("blocked", &self.blocked_count())
            .finish()
    }
}

// =============================================================================
// COURSE
// =============================================================================

/// Match parameters and obstacle layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Course {
    /// Number of columns.
    pub width: i32,
    /// Number of rows; the goal lies beyond the last row.
    pub length: i32,
    /// Rows revealed on each side of a player's row per turn.
    pub vision: i32,
    /// Initial think-time budget per player (ms).
    pub think_time: i64,
    /// Maximum number of turns.
    pub step_limit: i32,
    /// Starting x-position of each player (y is always 0).
    pub start_x: [i32; 2],
    grid: ObstacleGrid,
}

/// On-disk schema of a course document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseDocument {
    filetype: String,
    width: i32,
    length: i32,
    vision: i32,
    think_time: i64,
    step_limit: i32,
    x0: i32,
    x1: i32,
    obstacles: Vec<Vec<i64>>,
}

impl Course {
    /// A course over `grid` with default match parameters.
    pub fn new(grid: ObstacleGrid) -> Self {
        let width = grid.width();
        Self {
            width,
            length: grid.length(),
            vision: 5,
            think_time: 10_000,
            step_limit: 100,
            start_x: [0, (width - 1).max(0)],
            grid,
        }
    }

    /// The obstacle grid.
    pub fn obstacles(&self) -> &ObstacleGrid {
        &self.grid
    }

    /// Is `p` an obstacle cell?
    #[inline]
    pub fn is_blocked(&self, p: Point) -> bool {
        self.grid.is_blocked(p.x, p.y)
    }

    /// Is `p` inside the course grid?
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        self.grid.contains(p.x, p.y)
    }

    /// Load a course document from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CourseError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a course document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, CourseError> {
        Self::from_reader(json.as_bytes())
    }

    /// Parse a course document from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, CourseError> {
        let value: Value = serde_json::from_reader(reader)?;

        // The filetype check comes first so a foreign document is reported
        // as such rather than as a missing field.
        match value.get("filetype").and_then(Value::as_str) {
            Some(COURSE_FILE_TYPE) => {}
            found => {
                return Err(CourseError::WrongFileType {
                    found: found.map(str::to_string),
                });
            }
        }

        let doc: CourseDocument = serde_json::from_value(value)?;
        Self::from_document(doc)
    }

    fn from_document(doc: CourseDocument) -> Result<Self, CourseError> {
        check_param("width", doc.width.into(), 1)?;
        check_param("length", doc.length.into(), 1)?;
        check_param("vision", doc.vision.into(), 0)?;
        check_param("thinkTime", doc.think_time, 0)?;
        check_param("stepLimit", doc.step_limit.into(), 0)?;
        for (field, x) in [("x0", doc.x0), ("x1", doc.x1)] {
            if !(0..doc.width).contains(&x) {
                return Err(CourseError::BadParameter { field, value: x.into() });
            }
        }

        if doc.obstacles.len() != doc.length as usize {
            return Err(CourseError::ObstacleShape(format!(
                "expected {} rows, found {}",
                doc.length,
                doc.obstacles.len()
            )));
        }
        let mut blocked = Vec::new();
        for (y, row) in doc.obstacles.iter().enumerate() {
            if row.len() != doc.width as usize {
                return Err(CourseError::ObstacleShape(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.len(),
                    doc.width
                )));
            }
            blocked.extend(
                row.iter()
                    .enumerate()
                    .filter(|&(_, &cell)| cell != 0)
                    .map(|(x, _)| Point::new(x as i32, y as i32)),
            );
        }

        Ok(Self {
            width: doc.width,
            length: doc.length,
            vision: doc.vision,
            think_time: doc.think_time,
            step_limit: doc.step_limit,
            start_x: [doc.x0, doc.x1],
            grid: ObstacleGrid::new(doc.width, doc.length).with_blocked(blocked),
        })
    }

    /// Write the course document, one obstacle row per line.
    pub fn write_json(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{{")?;
        writeln!(out, "  \"filetype\": {},", Value::from(COURSE_FILE_TYPE))?;
        writeln!(out, "  \"width\": {}, \"length\": {},", self.width, self.length)?;
        writeln!(
            out,
            "  \"vision\": {}, \"thinkTime\": {}, \"stepLimit\": {},",
            self.vision, self.think_time, self.step_limit
        )?;
        writeln!(out, "  \"x0\": {}, \"x1\": {},", self.start_x[0], self.start_x[1])?;
        writeln!(out, "  \"obstacles\": [")?;
        for y in 0..self.length {
            let row: Vec<&str> = (0..self.width)
                .map(|x| if self.grid.is_blocked(x, y) { "1" } else { "0" })
                .collect();
            let sep = if y == self.length - 1 { "" } else { "," };
            writeln!(out, "    [{}]{}", row.join(", "), sep)?;
        }
        writeln!(out, "  ]")?;
        writeln!(out, "}}")
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_json(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Rows of the grid revealed to a player standing on row `center_y`.
    ///
    /// Returns `2 * vision + 1` rows of `width` cells. A cell is 1 when it
    /// is an obstacle or its row is below 0 or above `length`. Row
    /// `length` itself is not flagged and, lying outside the grid, reads 0.
    pub fn vision_window(&self, center_y: i32) -> Vec<Vec<u8>> {
        (center_y - self.vision..=center_y + self.vision)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let hidden = y < 0 || y > self.length;
                        u8::from(hidden || self.grid.is_blocked(x, y))
                    })
                    .collect()
            })
            .collect()
    }
}

fn check_param(field: &'static str, value: i64, min: i64) -> Result<(), CourseError> {
    if value < min {
        Err(CourseError::BadParameter { field, value })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "filetype": "race course",
        "width": 3, "length": 4,
        "vision": 1, "thinkTime": 2000, "stepLimit": 50,
        "x0": 0, "x1": 2,
        "obstacles": [
            [0, 0, 0],
            [0, 1, 0],
            [1, 0, 0],
            [0, 0, 0]
        ]
    }"#;

    #[test]
    fn test_load_sample() {
        let course = Course::from_json(SAMPLE).unwrap();
        assert_eq!(course.width, 3);
        assert_eq!(course.length, 4);
        assert_eq!(course.vision, 1);
        assert_eq!(course.think_time, 2000);
        assert_eq!(course.step_limit, 50);
        assert_eq!(course.start_x, [0, 2]);
        assert!(course.is_blocked(Point::new(1, 1)));
        assert!(course.is_blocked(Point::new(0, 2)));
        assert!(!course.is_blocked(Point::new(1, 2)));
        assert_eq!(course.obstacles().blocked_count(), 2);
    }

    #[test]
    fn test_wrong_filetype_rejected() {
        let json = SAMPLE.replace("race course", "race results");
        let err = Course::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            CourseError::WrongFileType { found: Some(ref f) } if f == "race results"
        ));
    }

    #[test]
    fn test_missing_filetype_rejected() {
        let json = SAMPLE.replace("\"filetype\": \"race course\",", "");
        let err = Course::from_json(&json).unwrap_err();
        assert!(matches!(err, CourseError::WrongFileType { found: None }));
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = SAMPLE.replace("\"stepLimit\": 50,", "");
        assert!(matches!(Course::from_json(&json), Err(CourseError::Json(_))));
    }

    #[test]
    fn test_obstacle_shape_checked() {
        let json = SAMPLE.replace("[0, 1, 0]", "[0, 1]");
        assert!(matches!(Course::from_json(&json), Err(CourseError::ObstacleShape(_))));

        let json = SAMPLE.replace("\"length\": 4", "\"length\": 5");
        assert!(matches!(Course::from_json(&json), Err(CourseError::ObstacleShape(_))));
    }

    #[test]
    fn test_start_position_checked() {
        let json = SAMPLE.replace("\"x1\": 2", "\"x1\": 3");
        assert!(matches!(
            Course::from_json(&json),
            Err(CourseError::BadParameter { field: "x1", value: 3 })
        ));
    }

    #[test]
    fn test_written_document_reloads() {
        let course = Course::from_json(SAMPLE).unwrap();
        let json = course.to_json();
        assert!(json.contains("\"thinkTime\": 2000"));
        assert!(json.contains("[0, 1, 0],"));
        assert_eq!(Course::from_json(&json).unwrap(), course);
    }

    #[test]
    fn test_vision_window_shape() {
        let mut course = Course::new(ObstacleGrid::new(3, 3));
        course.vision = 1;
        let rows = course.vision_window(1);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_vision_window_boundaries() {
        let grid = ObstacleGrid::new(3, 4).with_blocked([Point::new(2, 0)]);
        let mut course = Course::new(grid);
        course.vision = 2;

        let rows = course.vision_window(0);
        // Rows -2 and -1 are off the course
        assert_eq!(rows[0], vec![1, 1, 1]);
        assert_eq!(rows[1], vec![1, 1, 1]);
        assert_eq!(rows[2], vec![0, 0, 1]);
        assert_eq!(rows[3], vec![0, 0, 0]);

        let rows = course.vision_window(3);
        // Row 4 == length stays open, row 5 is beyond it
        assert_eq!(rows[2], vec![0, 0, 0]);
        assert_eq!(rows[3], vec![0, 0, 0]);
        assert_eq!(rows[4], vec![1, 1, 1]);
    }
}
