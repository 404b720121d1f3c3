//! Error types for the merge engine.
//!
//! Defines [`MergeError`], the single error surface of a merge call. Every
//! variant is terminal: the engine short-circuits on the first failure and
//! performs no local recovery. I/O failures from a collaborator (iterator or
//! writer) are propagated unchanged, wrapped only with a [`MergePhase`] tag
//! naming the step that observed them.

use std::fmt;
use std::io;

use crate::model::types::Key;

// ---------------------------------------------------------------------------
// MergePhase
// ---------------------------------------------------------------------------

/// The merge step during which an I/O error was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePhase {
    /// Seeking the base iterator to a range or record.
    BaseSeek,
    /// Advancing the source iterator.
    SourceAdvance,
    /// Advancing the dest iterator.
    DestAdvance,
    /// Emitting a range or record through the writer.
    Write,
}

impl fmt::Display for MergePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseSeek => write!(f, "base seek"),
            Self::SourceAdvance => write!(f, "source advance"),
            Self::DestAdvance => write!(f, "dest advance"),
            Self::Write => write!(f, "write"),
        }
    }
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Why a merge call stopped before completing.
#[derive(Debug)]
pub enum MergeError {
    /// Both sides changed the same key incompatibly relative to the ancestor.
    ///
    /// The merge halts on the first offending key; output already emitted to
    /// the writer describes a correct prefix of the merge and is expected to
    /// be discarded by the caller.
    Conflict {
        /// The first key at which the two sides' edits could not be reconciled.
        key: Key,
    },

    /// The caller's cancellation token was observed.
    Cancelled,

    /// An iterator or the writer reported an I/O failure.
    Io {
        /// The merge step that observed the failure.
        phase: MergePhase,
        /// The collaborator's error, unchanged.
        source: io::Error,
    },
}

impl MergeError {
    /// Wrap a collaborator I/O error with the phase that observed it.
    pub fn io(phase: MergePhase, source: io::Error) -> Self {
        Self::Io { phase, source }
    }

    /// Returns `true` if this error is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The conflicting key, if this error is a conflict.
    #[must_use]
    pub const fn conflict_key(&self) -> Option<&Key> {
        match self {
            Self::Conflict { key } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { key } => write!(f, "merge conflict at key '{key}'"),
            Self::Cancelled => write!(f, "merge cancelled"),
            Self::Io { phase, source } => write!(f, "{phase}: {source}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_conflict_names_key() {
        let err = MergeError::Conflict {
            key: Key::from(&b"accounts/42"[..]),
        };
        let msg = format!("{err}");
        assert!(msg.contains("conflict"));
        assert!(msg.contains("accounts/42"));
    }

    #[test]
    fn display_cancelled() {
        assert_eq!(format!("{}", MergeError::Cancelled), "merge cancelled");
    }

    #[test]
    fn display_io_includes_phase_and_cause() {
        let err = MergeError::io(
            MergePhase::Write,
            io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"),
        );
        let msg = format!("{err}");
        assert!(msg.contains("write"));
        assert!(msg.contains("sink closed"));
    }

    #[test]
    fn display_phases() {
        assert_eq!(format!("{}", MergePhase::BaseSeek), "base seek");
        assert_eq!(format!("{}", MergePhase::SourceAdvance), "source advance");
        assert_eq!(format!("{}", MergePhase::DestAdvance), "dest advance");
        assert_eq!(format!("{}", MergePhase::Write), "write");
    }

    #[test]
    fn io_error_source_chains() {
        let err = MergeError::io(MergePhase::BaseSeek, io::Error::other("disk gone"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn conflict_has_no_source() {
        let err = MergeError::Conflict {
            key: Key::from(&b"k"[..]),
        };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn conflict_key_accessor() {
        let err = MergeError::Conflict {
            key: Key::from(&b"k"[..]),
        };
        assert!(err.is_conflict());
        assert_eq!(err.conflict_key(), Some(&Key::from(&b"k"[..])));
        assert_eq!(MergeError::Cancelled.conflict_key(), None);
    }
}
