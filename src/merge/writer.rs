//! The output sink contract and an in-memory recording writer.
//!
//! The merge engine emits its result as a sequence of whole ranges and
//! individual records, in strictly increasing key order. Writers are external
//! collaborators (typically a metarange builder over persistent storage); the
//! engine borrows one for the duration of a merge and surfaces its I/O errors
//! unchanged.

use std::io;

use crate::model::types::{Key, Range, ValueRecord};

// ---------------------------------------------------------------------------
// TreeWriter
// ---------------------------------------------------------------------------

/// Sink for merged output.
///
/// # Contract
///
/// The engine guarantees that every call starts strictly after all previously
/// emitted keys: a range's `min_key`, or a record's key, is greater than the
/// `max_key`/key of everything written before. After `write_range(r)` every
/// record of `r` counts as emitted.
pub trait TreeWriter {
    /// Commit a whole range by reference to its identity.
    fn write_range(&mut self, range: &Range) -> io::Result<()>;

    /// Commit a single record.
    fn write_record(&mut self, record: &ValueRecord) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// WriteEvent
// ---------------------------------------------------------------------------

/// One writer call, as recorded by [`BufferWriter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteEvent {
    /// A whole range was committed.
    Range(Range),
    /// A single record was committed.
    Record(ValueRecord),
}

impl WriteEvent {
    /// First key covered by this emission.
    #[must_use]
    pub const fn first_key(&self) -> &Key {
        match self {
            Self::Range(range) => range.min_key(),
            Self::Record(record) => record.key(),
        }
    }

    /// Last key covered by this emission.
    #[must_use]
    pub const fn last_key(&self) -> &Key {
        match self {
            Self::Range(range) => range.max_key(),
            Self::Record(record) => record.key(),
        }
    }
}

// ---------------------------------------------------------------------------
// BufferWriter
// ---------------------------------------------------------------------------

/// In-memory [`TreeWriter`] that records the emitted sequence.
///
/// Also *enforces* the monotonicity precondition: an emission that does not
/// start strictly after everything written before fails with
/// [`io::ErrorKind::InvalidInput`]. Used by callers that materialize merge
/// output, and throughout the test suite as a contract checker.
#[derive(Debug, Default)]
pub struct BufferWriter {
    events: Vec<WriteEvent>,
    last_key: Option<Key>,
    /// Remaining successful writes before the armed failure trips.
    fail_after: Option<usize>,
}

impl BufferWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a failpoint: after `writes` further successful calls the writer
    /// reports an I/O error.
    #[must_use]
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    /// The recorded emission sequence.
    #[must_use]
    pub fn events(&self) -> &[WriteEvent] {
        &self.events
    }

    /// Consume the writer, returning the recorded sequence.
    #[must_use]
    pub fn into_events(self) -> Vec<WriteEvent> {
        self.events
    }

    /// Number of recorded emissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn accept(&mut self, event: WriteEvent) -> io::Result<()> {
        if let Some(0) = self.fail_after {
            return Err(io::Error::other("injected writer failure"));
        }
        if let Some(ref mut writes) = self.fail_after {
            *writes -= 1;
        }
        if let Some(last) = &self.last_key {
            if event.first_key() <= last {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "out-of-order emission: '{}' does not follow '{last}'",
                        event.first_key()
                    ),
                ));
            }
        }
        self.last_key = Some(event.last_key().clone());
        self.events.push(event);
        Ok(())
    }
}

impl TreeWriter for BufferWriter {
    fn write_range(&mut self, range: &Range) -> io::Result<()> {
        self.accept(WriteEvent::Range(range.clone()))
    }

    fn write_record(&mut self, record: &ValueRecord) -> io::Result<()> {
        self.accept(WriteEvent::Record(record.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str, id: &str) -> ValueRecord {
        ValueRecord::new(key, id, Vec::new())
    }

    #[test]
    fn records_emissions_in_order() {
        let mut writer = BufferWriter::new();
        writer.write_record(&rec("a", "ia")).unwrap();
        writer.write_range(&Range::new("r", "b", "d")).unwrap();
        writer.write_record(&rec("e", "ie")).unwrap();

        assert_eq!(writer.len(), 3);
        assert_eq!(writer.events()[0], WriteEvent::Record(rec("a", "ia")));
        assert_eq!(
            writer.events()[1],
            WriteEvent::Range(Range::new("r", "b", "d"))
        );
    }

    #[test]
    fn rejects_duplicate_key() {
        let mut writer = BufferWriter::new();
        writer.write_record(&rec("a", "i1")).unwrap();
        let err = writer.write_record(&rec("a", "i2")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_record_inside_emitted_range() {
        let mut writer = BufferWriter::new();
        writer.write_range(&Range::new("r", "b", "f")).unwrap();
        let err = writer.write_record(&rec("d", "id")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_backwards_range() {
        let mut writer = BufferWriter::new();
        writer.write_record(&rec("m", "im")).unwrap();
        let err = writer.write_range(&Range::new("r", "a", "c")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn failpoint_trips_after_count() {
        let mut writer = BufferWriter::new().fail_after(1);
        writer.write_record(&rec("a", "ia")).unwrap();
        assert!(writer.write_record(&rec("b", "ib")).is_err());
    }

    #[test]
    fn event_key_span() {
        let range_event = WriteEvent::Range(Range::new("r", "b", "d"));
        assert_eq!(range_event.first_key(), &Key::from("b"));
        assert_eq!(range_event.last_key(), &Key::from("d"));

        let record_event = WriteEvent::Record(rec("k", "ik"));
        assert_eq!(record_event.first_key(), &Key::from("k"));
        assert_eq!(record_event.last_key(), &Key::from("k"));
    }
}
