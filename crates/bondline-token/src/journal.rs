//! Undo journal for in-flight operations
//!
//! Ledgers record the previous value of every entry they touch while a
//! checkpoint is open, so a failed operation is undone in O(touched entries)
//! instead of restoring a copy of every map.
//!
//! A journal belongs to the live ledger only: clones start with no open
//! checkpoint and equality ignores it.

use std::fmt;

pub(crate) struct Journal<E> {
    entries: Option<Vec<E>>,
}

impl<E> Journal<E> {
    pub(crate) fn begin(&mut self) {
        debug_assert!(!self.is_open(), "checkpoint already open");
        self.entries = Some(Vec::new());
    }

    pub(crate) fn is_open(&self) -> bool {
        self.entries.is_some()
    }

    /// No-op when no checkpoint is open
    pub(crate) fn record(&mut self, entry: E) {
        if let Some(entries) = &mut self.entries {
            entries.push(entry);
        }
    }

    pub(crate) fn commit(&mut self) {
        self.entries = None;
    }

    /// Close the checkpoint, returning entries newest first
    pub(crate) fn rewind(&mut self) -> impl Iterator<Item = E> {
        self.entries.take().unwrap_or_default().into_iter().rev()
    }
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Self { entries: None }
    }
}

impl<E> Clone for Journal<E> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<E> PartialEq for Journal<E> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<E> Eq for Journal<E> {}

impl<E> fmt::Debug for Journal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entries {
            Some(entries) => write!(f, "Journal(open, {})", entries.len()),
            None => f.write_str("Journal(closed)"),
        }
    }
}
