//! strata — a three-way merge engine for content-addressed, range-partitioned
//! key–value trees.
//!
//! A tree is a sorted sequence of immutable *ranges*; each range is a sorted,
//! non-empty run of *records* sharing one content identity. Given iterators
//! over a common ancestor (*base*) and two branches (*source*, *dest*), the
//! engine streams the merged tree to a writer, copying unchanged ranges whole
//! by identity and descending to record-level reconciliation only where the
//! two sides actually overlap.
//!
//! The primary entry point is [`merge::merge`]. Storage, the commit/branch
//! model, and range chunking live outside this crate — the engine only sees
//! the [`merge::TreeIterator`] and [`merge::TreeWriter`] seams.

pub mod cancel;
pub mod error;
pub mod merge;
pub mod model;
pub mod telemetry;

pub use cancel::CancelToken;
pub use error::{MergeError, MergePhase};
pub use merge::iter::{Position, TreeIterator, VecIterator};
pub use merge::merge;
pub use merge::writer::{BufferWriter, TreeWriter, WriteEvent};
pub use model::types::{Identity, Key, Range, ValueRecord};
