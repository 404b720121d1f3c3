//! The merge engine: a single forward pass reconciling source and dest
//! against their common ancestor.
//!
//! Control flow follows the cursor shapes of the two sides. While both sides
//! have positions, each step snapshots the two cursors and dispatches to one
//! of four handlers (see the module doc of [`crate::merge`]); when one side
//! exhausts, the survivor drains against the base alone. The base iterator
//! never rewinds — both sides' keys emerge in increasing order, so every base
//! lookup is a monotone forward seek.
//!
//! Whole-range emission is preferred wherever identity equality admits it;
//! the engine descends into ranges only where the decision tables require
//! record-level reasoning.

use std::cmp::Ordering;
use std::io;

use crate::cancel::CancelToken;
use crate::error::{MergeError, MergePhase};
use crate::merge::iter::{Position, TreeIterator};
use crate::merge::writer::TreeWriter;
use crate::model::types::{Key, Range, ValueRecord};

/// Merge `source` and `dest` relative to `base`, streaming the result to
/// `writer` in strictly increasing key order.
///
/// On success the writer has received the full merged tree. On error the
/// merge stops at the first failure: a conflict (with the offending key), a
/// cancellation, or a collaborator I/O error tagged with the phase that
/// observed it. Output already emitted is a correct prefix of the merge but
/// is not rolled back.
///
/// # Errors
///
/// See [`MergeError`].
pub fn merge(
    cancel: &CancelToken,
    writer: &mut dyn TreeWriter,
    base: &mut dyn TreeIterator,
    source: &mut dyn TreeIterator,
    dest: &mut dyn TreeIterator,
) -> Result<(), MergeError> {
    Merger {
        cancel,
        writer,
        base,
        source,
        dest,
        have_source: false,
        have_dest: false,
    }
    .run()
}

// ---------------------------------------------------------------------------
// Merger
// ---------------------------------------------------------------------------

/// The side of the merge a drain or error report refers to.
#[derive(Clone, Copy, Debug)]
enum Side {
    Source,
    Dest,
}

impl Side {
    const fn phase(self) -> MergePhase {
        match self {
            Self::Source => MergePhase::SourceAdvance,
            Self::Dest => MergePhase::DestAdvance,
        }
    }
}

/// Owned snapshot of one side's cursor, taken at the top of each step so the
/// handlers can advance the iterators freely.
#[derive(Debug)]
enum Snap {
    Header(Range),
    Record(ValueRecord),
}

fn snapshot(pos: Option<Position<'_>>) -> Option<Snap> {
    pos.map(|p| match p {
        Position::RangeHeader(range) => Snap::Header(range.clone()),
        Position::Record(_, record) => Snap::Record(record.clone()),
    })
}

/// `io::Error` is not `Clone`; iterators keep ownership of their terminal
/// error, so the engine forwards a kind-and-message copy.
fn copy_io(err: &io::Error) -> io::Error {
    io::Error::new(err.kind(), err.to_string())
}

struct Merger<'a> {
    cancel: &'a CancelToken,
    writer: &'a mut dyn TreeWriter,
    base: &'a mut dyn TreeIterator,
    source: &'a mut dyn TreeIterator,
    dest: &'a mut dyn TreeIterator,
    have_source: bool,
    have_dest: bool,
}

impl Merger<'_> {
    fn run(&mut self) -> Result<(), MergeError> {
        self.have_source = self.source.advance();
        self.have_dest = self.dest.advance();
        let _ = self.base.advance();
        self.check_iterators()?;

        while self.have_source && self.have_dest {
            if self.cancel.is_cancelled() {
                return Err(MergeError::Cancelled);
            }

            // A side that reported `true` from its last advance has a position.
            let (Some(src), Some(dst)) =
                (snapshot(self.source.position()), snapshot(self.dest.position()))
            else {
                break;
            };

            match (src, dst) {
                (Snap::Header(src_range), Snap::Header(dst_range)) => {
                    self.both_ranges(&src_range, &dst_range)?;
                }
                (Snap::Record(src_record), Snap::Header(dst_range)) => {
                    self.dest_range_source_key(&dst_range, &src_record)?;
                }
                (Snap::Header(src_range), Snap::Record(dst_record)) => {
                    self.source_range_dest_key(&src_range, &dst_record)?;
                }
                (Snap::Record(src_record), Snap::Record(dst_record)) => {
                    self.both_keys(&src_record, &dst_record)?;
                }
            }

            self.check_iterators()?;
        }

        if self.have_source {
            self.drain(Side::Source)?;
        }
        if self.have_dest {
            self.drain(Side::Dest)?;
        }
        Ok(())
    }

    // -- dispatch handlers --------------------------------------------------

    /// Both cursors at range headers: the whole-range decision table.
    fn both_ranges(&mut self, src_range: &Range, dst_range: &Range) -> Result<(), MergeError> {
        if src_range.id() == dst_range.id() {
            // Unchanged on both sides, or both added the same range.
            self.emit_range(src_range)?;
            self.have_source = self.source.advance_range();
            self.have_dest = self.dest.advance_range();
        } else if src_range.max_key() < dst_range.min_key() {
            // Source range entirely precedes dest's next range.
            let base_id = self
                .seek_base_ge_range(src_range.min_key())?
                .map(|r| r.id().clone());
            if base_id.as_ref() == Some(src_range.id()) {
                // Source kept the ancestor range; dest deleted it.
                self.have_source = self.source.advance_range();
            } else if base_id.is_none() || base_id.as_ref() == Some(dst_range.id()) {
                // Source added this range while dest is elsewhere.
                self.emit_range(src_range)?;
                self.have_source = self.source.advance_range();
            } else {
                // Both touched this region; reconcile record-by-record.
                self.have_source = self.source.advance();
                self.have_dest = self.dest.advance();
            }
        } else if dst_range.max_key() < src_range.min_key() {
            // Dest range entirely precedes source's next range.
            let base_id = self
                .seek_base_ge_range(dst_range.min_key())?
                .map(|r| r.id().clone());
            if base_id.as_ref() == Some(dst_range.id()) {
                // Dest kept the ancestor range; source deleted it.
                self.have_dest = self.dest.advance_range();
            } else if base_id.is_none() || base_id.as_ref() == Some(src_range.id()) {
                // Dest added this range while source is elsewhere.
                self.emit_range(dst_range)?;
                self.have_dest = self.dest.advance_range();
            } else {
                self.have_source = self.source.advance();
                self.have_dest = self.dest.advance();
            }
        } else if src_range.min_key() == dst_range.min_key()
            && src_range.max_key() == dst_range.max_key()
        {
            // Same bounds, different content: if the ancestor matches one
            // side, the other side is the sole mutator and wins whole.
            let base_id = self
                .seek_base_ge_range(src_range.min_key())?
                .map(|r| r.id().clone());
            if base_id.as_ref() == Some(src_range.id()) {
                self.emit_range(dst_range)?;
                self.have_source = self.source.advance_range();
                self.have_dest = self.dest.advance_range();
            } else if base_id.as_ref() == Some(dst_range.id()) {
                self.emit_range(src_range)?;
                self.have_source = self.source.advance_range();
                self.have_dest = self.dest.advance_range();
            } else {
                self.have_source = self.source.advance();
                self.have_dest = self.dest.advance();
            }
        } else {
            // Ranges overlap without coinciding.
            self.have_source = self.source.advance();
            self.have_dest = self.dest.advance();
        }
        Ok(())
    }

    /// Both cursors inside ranges: record-level reconciliation.
    fn both_keys(
        &mut self,
        src_record: &ValueRecord,
        dst_record: &ValueRecord,
    ) -> Result<(), MergeError> {
        match src_record.key().cmp(dst_record.key()) {
            Ordering::Less => self.lone_record(Side::Source, src_record),
            Ordering::Greater => self.lone_record(Side::Dest, dst_record),
            Ordering::Equal => {
                let base_record = self.seek_base_ge_key(src_record.key())?;
                if src_record.identity() == dst_record.identity() {
                    // Unchanged, or both made the same change.
                    self.emit_record(src_record)?;
                    self.have_source = self.source.advance();
                    self.have_dest = self.dest.advance();
                    return Ok(());
                }
                match base_record {
                    Some(base) if base.key() == src_record.key() => {
                        if base.identity() == src_record.identity() {
                            // Dest is the sole mutator.
                            self.emit_record(dst_record)?;
                        } else if base.identity() == dst_record.identity() {
                            // Source is the sole mutator.
                            self.emit_record(src_record)?;
                        } else {
                            return Err(MergeError::Conflict {
                                key: src_record.key().clone(),
                            });
                        }
                        self.have_source = self.source.advance();
                        self.have_dest = self.dest.advance();
                        Ok(())
                    }
                    // No ancestor: both sides added the same key differently.
                    _ => Err(MergeError::Conflict {
                        key: src_record.key().clone(),
                    }),
                }
            }
        }
    }

    /// One side's record has no counterpart at this position of the other
    /// side: classify it against the ancestor as kept-then-deleted, changed
    /// (conflict with the other side's implicit delete), or added.
    fn lone_record(&mut self, side: Side, record: &ValueRecord) -> Result<(), MergeError> {
        let base_record = self.seek_base_ge_key(record.key())?;
        match base_record {
            Some(base) if base.identity() == record.identity() => {
                // Unchanged on this side; the other side deleted it.
            }
            Some(base) if base.key() == record.key() => {
                // Deleted by the other side, changed by this one.
                return Err(MergeError::Conflict {
                    key: record.key().clone(),
                });
            }
            _ => {
                // Added by this side.
                self.emit_record(record)?;
            }
        }
        match side {
            Side::Source => self.have_source = self.source.advance(),
            Side::Dest => self.have_dest = self.dest.advance(),
        }
        Ok(())
    }

    /// Source inside a range, dest at a range header.
    fn dest_range_source_key(
        &mut self,
        dst_range: &Range,
        src_record: &ValueRecord,
    ) -> Result<(), MergeError> {
        if dst_range.min_key() > src_record.key() {
            // The source record falls before dest's next range.
            return self.lone_record(Side::Source, src_record);
        }
        if dst_range.max_key() < src_record.key() {
            // Dest's whole range precedes the source record.
            let base_range = self.seek_base_ge_range(dst_range.min_key())?;
            if base_range.is_some_and(|b| b.id() == dst_range.id()) {
                // Source dropped this ancestor range.
                self.have_dest = self.dest.advance_range();
                return Ok(());
            }
        }
        // The range needs record-level scanning; enter it.
        self.have_dest = self.dest.advance();
        Ok(())
    }

    /// Dest inside a range, source at a range header.
    fn source_range_dest_key(
        &mut self,
        src_range: &Range,
        dst_record: &ValueRecord,
    ) -> Result<(), MergeError> {
        if src_range.min_key() > dst_record.key() {
            // The dest record falls before source's next range.
            return self.lone_record(Side::Dest, dst_record);
        }
        if src_range.max_key() < dst_record.key() {
            // Source's whole range precedes the dest record.
            let base_range = self.seek_base_ge_range(src_range.min_key())?;
            if base_range.is_some_and(|b| b.id() == src_range.id()) {
                // Dest dropped this ancestor range.
                self.have_source = self.source.advance_range();
                return Ok(());
            }
        }
        self.have_source = self.source.advance();
        Ok(())
    }

    // -- drain --------------------------------------------------------------

    /// One side is exhausted: every remaining item of the survivor is
    /// reconciled against the base alone. Items whose ancestor is identical
    /// were deleted by the vanished side and are skipped; everything else is
    /// emitted as that side's own addition or edit.
    fn drain(&mut self, side: Side) -> Result<(), MergeError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(MergeError::Cancelled);
            }
            let Some(item) = snapshot(self.side(side).position()) else {
                break;
            };
            match item {
                Snap::Header(range) => {
                    let base_range = self.seek_base_ge_range(range.min_key())?;
                    if base_range.is_none_or(|b| b.id() != range.id()) {
                        self.emit_range(&range)?;
                    }
                    if !self.side_mut(side).advance_range() {
                        break;
                    }
                }
                Snap::Record(record) => {
                    let base_record = self.seek_base_ge_key(record.key())?;
                    if base_record.is_none_or(|b| b.identity() != record.identity()) {
                        self.emit_record(&record)?;
                    }
                    if !self.side_mut(side).advance() {
                        break;
                    }
                }
            }
        }
        match self.side(side).err() {
            Some(err) => Err(MergeError::io(side.phase(), copy_io(err))),
            None => Ok(()),
        }
    }

    // -- base lookups -------------------------------------------------------

    /// Advance the base to the first range whose `max_key ≥ key`. Never
    /// rewinds; returns `None` at end-of-stream.
    fn seek_base_ge_range(&mut self, key: &Key) -> Result<Option<Range>, MergeError> {
        loop {
            let hit = match self.base.position() {
                Some(pos) if pos.range().max_key() >= key => Some(pos.range().clone()),
                _ => None,
            };
            if hit.is_some() {
                return Ok(hit);
            }
            if !self.base.advance_range() {
                break;
            }
        }
        self.base_err()?;
        Ok(None)
    }

    /// Advance the base to the first record with `key ≥ key` *within the
    /// range found by [`seek_base_ge_range`](Self::seek_base_ge_range)*.
    ///
    /// Returns `None` when the seek would have to cross into a different
    /// range — the caller then correctly treats the ancestor as absent at
    /// this key.
    fn seek_base_ge_key(&mut self, key: &Key) -> Result<Option<ValueRecord>, MergeError> {
        if let Some(Position::Record(_, record)) = self.base.position() {
            if record.key() >= key {
                return Ok(Some(record.clone()));
            }
        }
        let Some(base_range) = self.seek_base_ge_range(key)? else {
            return Ok(None);
        };
        loop {
            let (hit, range_id) = match self.base.position() {
                Some(Position::Record(range, record)) if record.key() >= key => {
                    (Some(record.clone()), range.id().clone())
                }
                Some(pos) => (None, pos.range().id().clone()),
                None => break,
            };
            if hit.is_some() {
                return Ok(hit);
            }
            // The range id is read before advancing: stepping past the last
            // record of `base_range` is detected one iteration later, once
            // the cursor has left it.
            if !self.base.advance() || range_id != *base_range.id() {
                break;
            }
        }
        self.base_err()?;
        Ok(None)
    }

    // -- emission -----------------------------------------------------------

    fn emit_range(&mut self, range: &Range) -> Result<(), MergeError> {
        tracing::trace!(
            from = %range.min_key(),
            to = %range.max_key(),
            id = %range.id(),
            "copy entire range"
        );
        self.writer
            .write_range(range)
            .map_err(|err| MergeError::io(MergePhase::Write, err))
    }

    fn emit_record(&mut self, record: &ValueRecord) -> Result<(), MergeError> {
        tracing::trace!(key = %record.key(), id = %record.identity(), "write record");
        self.writer
            .write_record(record)
            .map_err(|err| MergeError::io(MergePhase::Write, err))
    }

    // -- error plumbing -----------------------------------------------------

    fn base_err(&self) -> Result<(), MergeError> {
        match self.base.err() {
            Some(err) => Err(MergeError::io(MergePhase::BaseSeek, copy_io(err))),
            None => Ok(()),
        }
    }

    fn check_iterators(&self) -> Result<(), MergeError> {
        if let Some(err) = self.source.err() {
            return Err(MergeError::io(MergePhase::SourceAdvance, copy_io(err)));
        }
        if let Some(err) = self.dest.err() {
            return Err(MergeError::io(MergePhase::DestAdvance, copy_io(err)));
        }
        self.base_err()
    }

    fn side(&self, side: Side) -> &dyn TreeIterator {
        match side {
            Side::Source => &*self.source,
            Side::Dest => &*self.dest,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut dyn TreeIterator {
        match side {
            Side::Source => &mut *self.source,
            Side::Dest => &mut *self.dest,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
