//! Resolution state of a single ledger read.
//!
//! Every read issued against the ledger starts out `Pending`. It ends either
//! `Resolved` with a value or `Absent` when the ledger confirms there is
//! nothing to return (for example an auction id out of range). A pending read
//! must never be rendered as a zero value.

use serde::{Deserialize, Serialize};

/// Tri-state outcome of a ledger read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ReadState<T> {
    /// Not resolved yet.
    Pending,
    /// The ledger confirmed there is no data.
    Absent,
    /// Resolved value.
    Resolved(T),
}

impl<T> ReadState<T> {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, ReadState::Pending)
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, ReadState::Absent)
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, ReadState::Resolved(_))
    }

    /// Whether the read reached a terminal outcome (resolved or absent).
    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Borrow the resolved value, if any.
    pub fn resolved(&self) -> Option<&T> {
        match self {
            ReadState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            ReadState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> ReadState<&T> {
        match self {
            ReadState::Pending => ReadState::Pending,
            ReadState::Absent => ReadState::Absent,
            ReadState::Resolved(value) => ReadState::Resolved(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadState<U> {
        match self {
            ReadState::Pending => ReadState::Pending,
            ReadState::Absent => ReadState::Absent,
            ReadState::Resolved(value) => ReadState::Resolved(f(value)),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ReadState<U>) -> ReadState<U> {
        match self {
            ReadState::Pending => ReadState::Pending,
            ReadState::Absent => ReadState::Absent,
            ReadState::Resolved(value) => f(value),
        }
    }

    /// Resolved value, or `absent` when the ledger confirmed there is none.
    ///
    /// Returns `None` while pending so callers cannot mistake a missing
    /// read for a zero.
    pub fn settled_or(self, absent: T) -> Option<T> {
        match self {
            ReadState::Pending => None,
            ReadState::Absent => Some(absent),
            ReadState::Resolved(value) => Some(value),
        }
    }

    /// Combine two reads. Pending wins over absent so an unresolved input
    /// keeps the combination loading.
    pub fn combine<U>(self, other: ReadState<U>) -> ReadState<(T, U)> {
        match (self, other) {
            (ReadState::Resolved(a), ReadState::Resolved(b)) => ReadState::Resolved((a, b)),
            (ReadState::Pending, _) | (_, ReadState::Pending) => ReadState::Pending,
            _ => ReadState::Absent,
        }
    }
}

impl<T> Default for ReadState<T> {
    fn default() -> Self {
        ReadState::Pending
    }
}

impl<T> From<Option<T>> for ReadState<T> {
    /// `None` maps to `Absent`: an option is a resolved answer.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => ReadState::Resolved(value),
            None => ReadState::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        let state: ReadState<u64> = ReadState::default();
        assert!(state.is_pending());
        assert_eq!(state.settled_or(0), None);
    }

    #[test]
    fn test_settled_or() {
        assert_eq!(ReadState::<u64>::Absent.settled_or(0), Some(0));
        assert_eq!(ReadState::Resolved(7u64).settled_or(0), Some(7));
    }

    #[test]
    fn test_combine_pending_dominates() {
        let pending: ReadState<u64> = ReadState::Pending;
        assert!(pending.combine(ReadState::<u64>::Absent).is_pending());
        assert!(ReadState::Resolved(1u64)
            .combine(ReadState::<u64>::Absent)
            .is_absent());
        assert_eq!(
            ReadState::Resolved(1u64).combine(ReadState::Resolved("a")),
            ReadState::Resolved((1, "a"))
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(ReadState::from(Some(3u8)), ReadState::Resolved(3));
        assert!(ReadState::<u8>::from(None).is_absent());
    }
}
