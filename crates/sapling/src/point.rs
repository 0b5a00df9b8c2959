//! Positions, extents and ranges in source text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A zero-based row/column position. Columns count bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Line number.
    pub row: usize,
    /// Byte offset within the line.
    pub column: usize,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// The position reached after walking over `text` starting here.
    #[must_use]
    pub fn advance(self, text: &[u8]) -> Self {
        self + extent_of(text)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.column)
    }
}

/// Composes a position with a relative extent.
impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        if other.row > 0 {
            Self::new(self.row + other.row, other.column)
        } else {
            Self::new(self.row, self.column + other.column)
        }
    }
}

/// The extent covering `other..self`. Saturates rather than underflowing.
impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        if self.row > other.row {
            Self::new(self.row - other.row, self.column)
        } else {
            Self::new(0, self.column.saturating_sub(other.column))
        }
    }
}

/// Row/column extent of a byte string.
#[must_use]
pub fn extent_of(text: &[u8]) -> Point {
    match text.iter().rposition(|&b| b == b'\n') {
        Some(last) => Point::new(
            text.iter().filter(|&&b| b == b'\n').count(),
            text.len() - last - 1,
        ),
        None => Point::new(0, text.len()),
    }
}

/// A byte length paired with its row/column extent.
///
/// Subtrees store sizes rather than absolute positions, so that shifting a
/// subtree after an edit does not require touching it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Length {
    /// Number of bytes.
    pub bytes: usize,
    /// Row/column extent of those bytes.
    pub extent: Point,
}

impl Length {
    /// The empty length.
    pub const ZERO: Self = Self {
        bytes: 0,
        extent: Point::new(0, 0),
    };

    /// Length of a byte string.
    #[must_use]
    pub fn of(text: &[u8]) -> Self {
        Self {
            bytes: text.len(),
            extent: extent_of(text),
        }
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            bytes: self.bytes + other.bytes,
            extent: self.extent + other.extent,
        }
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            bytes: self.bytes.saturating_sub(other.bytes),
            extent: self.extent - other.extent,
        }
    }
}

/// A span of source text, in bytes and in row/column terms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// First byte of the span.
    pub start_byte: usize,
    /// One past the last byte.
    pub end_byte: usize,
    /// Row/column of `start_byte`.
    pub start_point: Point,
    /// Row/column of `end_byte`.
    pub end_point: Point,
}

impl Range {
    /// Byte span as a standard range.
    #[must_use]
    pub fn bytes(&self) -> std::ops::Range<usize> {
        self.start_byte..self.end_byte
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start_point, self.end_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_counts_rows_and_trailing_columns() {
        assert_eq!(extent_of(b"abc"), Point::new(0, 3));
        assert_eq!(extent_of(b"ab\ncd"), Point::new(1, 2));
        assert_eq!(extent_of(b"ab\n"), Point::new(1, 0));
        assert_eq!(extent_of(b""), Point::new(0, 0));
    }

    #[test]
    fn test_point_arithmetic_is_relative() {
        let start = Point::new(2, 4);
        assert_eq!(start + Point::new(0, 3), Point::new(2, 7));
        assert_eq!(start + Point::new(1, 3), Point::new(3, 3));
        assert_eq!(Point::new(3, 3) - start, Point::new(1, 3));
        assert_eq!(Point::new(2, 7) - start, Point::new(0, 3));
    }

    #[test]
    fn test_length_addition_matches_concatenation() {
        let a = Length::of(b"x\nyy");
        let b = Length::of(b"z\nw");
        assert_eq!(a + b, Length::of(b"x\nyyz\nw"));
    }
}
