//! Three-way merge over range-partitioned trees.
//!
//! The engine is a single forward pass over three [`TreeIterator`]s — base
//! (common ancestor), source, and dest — dispatching at every step on whether
//! each side's cursor sits at a range header or inside a range:
//!
//! | source        | dest          | handler                 |
//! |---------------|---------------|-------------------------|
//! | range header  | range header  | both ranges             |
//! | inside range  | range header  | dest range / source key |
//! | range header  | inside range  | source range / dest key |
//! | inside range  | inside range  | both keys               |
//!
//! Range headers carry content identities, so whole unchanged or
//! single-mutator ranges are copied to the writer by reference without
//! touching their records; the engine descends to record-level reconciliation
//! only where the decision tables require it.
//!
//! # Determinism guarantee
//!
//! The same three inputs always produce the same writer call sequence and the
//! same first conflicting key: dispatch depends only on cursor contents, base
//! seeks are monotone, and no step consults time, randomness, or iteration
//! order of any unordered container.

pub mod iter;
pub mod merger;
pub mod writer;

pub use iter::{Position, TreeIterator, VecIterator};
pub use merger::merge;
pub use writer::{BufferWriter, TreeWriter, WriteEvent};
