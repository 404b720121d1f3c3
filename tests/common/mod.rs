//! Shared fixture builders for strata integration tests.
//!
//! Trees are described flat — `(key, content-version)` pairs — and chunked
//! into content-addressed ranges: record identities are SHA-256 over
//! key+version, range identities SHA-256 over the member record identities.
//! Invariant 3 (equal range ids ⇒ byte-identical records) therefore holds by
//! construction in every fixture.

use std::collections::HashMap;
use std::io;

use sha2::{Digest, Sha256};

use strata::{
    BufferWriter, CancelToken, Identity, Key, MergeError, Position, Range, TreeIterator,
    ValueRecord, VecIterator, WriteEvent, merge,
};

/// Content address of one record: SHA-256 over key and version.
pub fn record_identity(key: &str, version: u8) -> Identity {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update([version]);
    Identity::new(hasher.finalize().to_vec())
}

/// Build one record with a derived identity and value.
pub fn record(key: &str, version: u8) -> ValueRecord {
    ValueRecord::new(
        key,
        record_identity(key, version),
        format!("v{version}:{key}").into_bytes(),
    )
}

/// Content address of a range: SHA-256 over its records' identities.
pub fn range_identity(records: &[ValueRecord]) -> Identity {
    let mut hasher = Sha256::new();
    for rec in records {
        hasher.update(rec.identity().as_bytes());
    }
    Identity::new(hasher.finalize().to_vec())
}

/// Chunk a flat tree description into content-addressed ranges.
pub fn ranges(flat: &[(&str, u8)], chunk_size: usize) -> Vec<(Range, Vec<ValueRecord>)> {
    flat.chunks(chunk_size.max(1))
        .map(|chunk| {
            let records: Vec<ValueRecord> = chunk.iter().map(|(k, v)| record(k, *v)).collect();
            let range = Range::new(
                range_identity(&records),
                records.first().expect("non-empty chunk").key().clone(),
                records.last().expect("non-empty chunk").key().clone(),
            );
            (range, records)
        })
        .collect()
}

/// Build an in-memory iterator over a flat tree description.
pub fn tree(flat: &[(&str, u8)], chunk_size: usize) -> VecIterator {
    VecIterator::new(ranges(flat, chunk_size))
}

/// Run a merge over three iterators, collecting the emission sequence.
pub fn run(
    mut base: impl TreeIterator,
    mut source: impl TreeIterator,
    mut dest: impl TreeIterator,
) -> (Result<(), MergeError>, Vec<WriteEvent>) {
    let cancel = CancelToken::new();
    let mut writer = BufferWriter::new();
    let result = merge(&cancel, &mut writer, &mut base, &mut source, &mut dest);
    (result, writer.into_events())
}

/// Expand an emission sequence to sorted keys, resolving whole ranges through
/// the given trees' range lists.
pub fn merged_keys(
    events: &[WriteEvent],
    trees: &[&Vec<(Range, Vec<ValueRecord>)>],
) -> Vec<String> {
    let mut registry: HashMap<Identity, &Vec<ValueRecord>> = HashMap::new();
    for tree in trees {
        for (range, records) in tree.iter() {
            registry.insert(range.id().clone(), records);
        }
    }

    let mut keys: Vec<Key> = Vec::new();
    for event in events {
        match event {
            WriteEvent::Record(rec) => keys.push(rec.key().clone()),
            WriteEvent::Range(range) => {
                let records = registry.get(range.id()).expect("emitted range is known");
                keys.extend(records.iter().map(|r| r.key().clone()));
            }
        }
    }
    keys.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// TripwireIterator
// ---------------------------------------------------------------------------

/// Iterator wrapper that trips a [`CancelToken`] after a fixed number of
/// advances — lets tests observe cancellation mid-merge without threads.
pub struct TripwireIterator {
    inner: VecIterator,
    cancel: CancelToken,
    steps_before_cancel: usize,
}

impl TripwireIterator {
    pub fn new(inner: VecIterator, cancel: CancelToken, steps_before_cancel: usize) -> Self {
        Self {
            inner,
            cancel,
            steps_before_cancel,
        }
    }

    fn tick(&mut self) {
        if self.steps_before_cancel == 0 {
            self.cancel.cancel();
        } else {
            self.steps_before_cancel -= 1;
        }
    }
}

impl TreeIterator for TripwireIterator {
    fn advance(&mut self) -> bool {
        self.tick();
        self.inner.advance()
    }

    fn advance_range(&mut self) -> bool {
        self.tick();
        self.inner.advance_range()
    }

    fn position(&self) -> Option<Position<'_>> {
        self.inner.position()
    }

    fn err(&self) -> Option<&io::Error> {
        self.inner.err()
    }
}
