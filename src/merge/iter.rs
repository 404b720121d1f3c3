//! The two-level iterator contract and an in-memory reference implementation.
//!
//! A tree iterator walks a sorted sequence of ranges, and within each range a
//! sorted sequence of records. The cursor is therefore two-level: it is
//! either *at a range header* (about to enter the range) or *inside a range*
//! (at one of its records). [`Position`] is that tagged cursor state.

use std::io;

use crate::model::types::{Range, ValueRecord};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where a tree iterator's cursor currently sits.
#[derive(Clone, Copy, Debug)]
pub enum Position<'a> {
    /// At the header of `range`, before its first record.
    RangeHeader(&'a Range),
    /// Inside `range`, at `record`.
    Record(&'a Range, &'a ValueRecord),
}

impl<'a> Position<'a> {
    /// The range at or inside which the cursor sits.
    #[must_use]
    pub const fn range(&self) -> &'a Range {
        match self {
            Self::RangeHeader(range) | Self::Record(range, _) => range,
        }
    }

    /// The current record, if the cursor is inside a range.
    #[must_use]
    pub const fn record(&self) -> Option<&'a ValueRecord> {
        match self {
            Self::RangeHeader(_) => None,
            Self::Record(_, record) => Some(record),
        }
    }

    /// Returns `true` if the cursor is at a range header.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        matches!(self, Self::RangeHeader(_))
    }
}

// ---------------------------------------------------------------------------
// TreeIterator
// ---------------------------------------------------------------------------

/// Forward cursor over a two-level (ranges → records) sorted sequence.
///
/// A fresh iterator is positioned *before* the first range header;
/// [`advance`](Self::advance) must be called once before
/// [`position`](Self::position) returns anything.
///
/// # Contract
///
/// - Keys are globally unique within one iterator and emerge in strictly
///   increasing order.
/// - Ranges emerge in strictly increasing `min_key` order with non-overlapping
///   bounds; every range is non-empty.
/// - After any `advance*` call returns `false`, [`err`](Self::err)
///   distinguishes end-of-stream (`None`) from an underlying I/O failure
///   (`Some`).
pub trait TreeIterator {
    /// Step to the next logical position: the next record of the current
    /// range, or the next range header once the range is exhausted.
    ///
    /// Returns `false` at end-of-stream (or on failure; see [`err`](Self::err)).
    fn advance(&mut self) -> bool;

    /// Fast-forward to the next range header, skipping any remaining records
    /// of the current range.
    ///
    /// Returns `false` at end-of-stream (or on failure; see [`err`](Self::err)).
    fn advance_range(&mut self) -> bool;

    /// The current cursor position, or `None` before the first advance and
    /// after end-of-stream.
    fn position(&self) -> Option<Position<'_>>;

    /// The I/O failure that terminated iteration, if any.
    fn err(&self) -> Option<&io::Error>;
}

// ---------------------------------------------------------------------------
// VecIterator
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Cursor {
    /// Before the first range header.
    Start,
    /// At the header of range `r`.
    Header(usize),
    /// Inside range `r`, at record `i`.
    Record(usize, usize),
    /// Past the last record.
    Done,
}

/// In-memory [`TreeIterator`] over materialized ranges.
///
/// The reference implementation of the cursor contract: backs small
/// in-memory trees and every fixture in the test suite. A failpoint can be
/// armed with [`fail_after`](Self::fail_after) to exercise error paths.
#[derive(Debug)]
pub struct VecIterator {
    ranges: Vec<(Range, Vec<ValueRecord>)>,
    cursor: Cursor,
    /// Remaining successful `advance*` calls before the armed failure trips.
    fail_after: Option<usize>,
    err: Option<io::Error>,
}

impl VecIterator {
    /// Create an iterator over `ranges`, each paired with its records.
    ///
    /// Callers are responsible for the contract of [`TreeIterator`]: sorted
    /// non-empty ranges, record keys within range bounds, global key order.
    #[must_use]
    pub fn new(ranges: Vec<(Range, Vec<ValueRecord>)>) -> Self {
        debug_assert!(
            ranges.iter().all(|(_, records)| !records.is_empty()),
            "every range must be non-empty"
        );
        debug_assert!(
            ranges
                .windows(2)
                .all(|pair| pair[0].0.max_key() < pair[1].0.min_key()),
            "ranges must be sorted and non-overlapping"
        );
        Self {
            ranges,
            cursor: Cursor::Start,
            fail_after: None,
            err: None,
        }
    }

    /// An iterator over no ranges at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Arm a failpoint: after `steps` further successful `advance*` calls the
    /// iterator stops and reports an I/O error.
    #[must_use]
    pub fn fail_after(mut self, steps: usize) -> Self {
        self.fail_after = Some(steps);
        self
    }

    fn trip_failpoint(&mut self) -> bool {
        match self.fail_after {
            Some(0) => {
                self.err = Some(io::Error::other("injected iterator failure"));
                self.cursor = Cursor::Done;
                true
            }
            Some(ref mut steps) => {
                *steps -= 1;
                false
            }
            None => false,
        }
    }
}

impl TreeIterator for VecIterator {
    fn advance(&mut self) -> bool {
        if self.trip_failpoint() {
            return false;
        }
        self.cursor = match self.cursor {
            Cursor::Start => {
                if self.ranges.is_empty() {
                    Cursor::Done
                } else {
                    Cursor::Header(0)
                }
            }
            Cursor::Header(r) => Cursor::Record(r, 0),
            Cursor::Record(r, i) => {
                if i + 1 < self.ranges[r].1.len() {
                    Cursor::Record(r, i + 1)
                } else if r + 1 < self.ranges.len() {
                    Cursor::Header(r + 1)
                } else {
                    Cursor::Done
                }
            }
            Cursor::Done => Cursor::Done,
        };
        !matches!(self.cursor, Cursor::Done)
    }

    fn advance_range(&mut self) -> bool {
        if self.trip_failpoint() {
            return false;
        }
        self.cursor = match self.cursor {
            Cursor::Start => {
                if self.ranges.is_empty() {
                    Cursor::Done
                } else {
                    Cursor::Header(0)
                }
            }
            Cursor::Header(r) | Cursor::Record(r, _) => {
                if r + 1 < self.ranges.len() {
                    Cursor::Header(r + 1)
                } else {
                    Cursor::Done
                }
            }
            Cursor::Done => Cursor::Done,
        };
        !matches!(self.cursor, Cursor::Done)
    }

    fn position(&self) -> Option<Position<'_>> {
        match self.cursor {
            Cursor::Start | Cursor::Done => None,
            Cursor::Header(r) => Some(Position::RangeHeader(&self.ranges[r].0)),
            Cursor::Record(r, i) => Some(Position::Record(&self.ranges[r].0, &self.ranges[r].1[i])),
        }
    }

    fn err(&self) -> Option<&io::Error> {
        self.err.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
