//! A single ordered series of states with a read cursor.

use ardan_core::{State, TimelineError};

/// An ordered, append-only series of [`State`]s.
///
/// Entries are sorted by strictly increasing `timestamp` by construction,
/// which is what lets every lookup be a binary search. The cursor marks
/// the "current" entry used by seek and replay; it is `None` only while
/// the timeline is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<State>,
    cursor: Option<usize>,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a timeline holding a single entry, with the cursor on it.
    /// The caller guarantees a finite timestamp.
    pub(crate) fn from_baseline(state: State) -> Self {
        Self {
            entries: vec![state],
            cursor: Some(0),
        }
    }

    /// Rebuild a timeline from stored parts, checking ordering and cursor.
    pub fn from_entries(entries: Vec<State>, cursor: Option<usize>) -> Result<Self, TimelineError> {
        let tl = Self { entries, cursor };
        tl.check()?;
        Ok(tl)
    }

    /// Check that timestamps are finite and strictly increasing and that
    /// the cursor is on an entry whenever there is one.
    pub fn check(&self) -> Result<(), TimelineError> {
        if let Some(first) = self.entries.first() {
            if !first.timestamp.is_finite() {
                return Err(TimelineError::InvalidOrder {
                    last: f64::NEG_INFINITY,
                    attempted: first.timestamp,
                });
            }
        }
        for pair in self.entries.windows(2) {
            if !pair[1].timestamp.is_finite() || !(pair[1].timestamp > pair[0].timestamp) {
                return Err(TimelineError::InvalidOrder {
                    last: pair[0].timestamp,
                    attempted: pair[1].timestamp,
                });
            }
        }
        match (self.cursor, self.entries.len()) {
            (None, 0) => Ok(()),
            (Some(c), len) if c < len => Ok(()),
            (None, _) => Err(TimelineError::EmptyHistory),
            (Some(c), len) => Err(TimelineError::CursorOutOfRange { cursor: c, len }),
        }
    }

    /// Append `state` and move the cursor onto it.
    ///
    /// Fails with [`TimelineError::InvalidOrder`] unless `state.timestamp`
    /// is finite and strictly greater than the last entry's timestamp. On
    /// failure the timeline is unchanged.
    pub fn append(&mut self, state: State) -> Result<usize, TimelineError> {
        let last = self.last().map_or(f64::NEG_INFINITY, |s| s.timestamp);
        if !state.timestamp.is_finite() || !(state.timestamp > last) {
            return Err(TimelineError::InvalidOrder {
                last,
                attempted: state.timestamp,
            });
        }
        self.entries.push(state);
        let idx = self.entries.len() - 1;
        self.cursor = Some(idx);
        Ok(idx)
    }

    /// Index of the entry with the greatest timestamp `<= t`.
    pub fn index_at_or_before(&self, t: f64) -> Option<usize> {
        if t.is_nan() {
            return None;
        }
        match self.entries.partition_point(|e| e.timestamp <= t) {
            0 => None,
            n => Some(n - 1),
        }
    }

    /// Index of the entry with the least timestamp `>= t`.
    pub fn index_at_or_after(&self, t: f64) -> Option<usize> {
        if t.is_nan() {
            return None;
        }
        let n = self.entries.partition_point(|e| e.timestamp < t);
        (n < self.entries.len()).then_some(n)
    }

    /// The entry with the greatest timestamp `<= t`, if any.
    pub fn lookup_at_or_before(&self, t: f64) -> Option<&State> {
        self.index_at_or_before(t).map(|i| &self.entries[i])
    }

    /// The entry with the least timestamp `>= t`, if any.
    pub fn lookup_at_or_after(&self, t: f64) -> Option<&State> {
        self.index_at_or_after(t).map(|i| &self.entries[i])
    }

    /// Move the cursor to the entry at-or-before `t`.
    ///
    /// Returns the new cursor, or `None` (cursor untouched) if no entry
    /// qualifies.
    pub fn seek_at_or_before(&mut self, t: f64) -> Option<usize> {
        let idx = self.index_at_or_before(t)?;
        self.cursor = Some(idx);
        Some(idx)
    }

    /// Move the cursor to the entry at-or-after `t`.
    ///
    /// Returns the new cursor, or `None` (cursor untouched) if no entry
    /// qualifies.
    pub fn seek_at_or_after(&mut self, t: f64) -> Option<usize> {
        let idx = self.index_at_or_after(t)?;
        self.cursor = Some(idx);
        Some(idx)
    }

    /// Copy entries `[0, upto]` into a new timeline whose cursor sits on
    /// its last entry. `None` yields an empty timeline. `self` is untouched.
    pub fn fork(&self, upto: Option<usize>) -> Result<Timeline, TimelineError> {
        match upto {
            None => Ok(Timeline::new()),
            Some(c) if c < self.entries.len() => Ok(Timeline {
                entries: self.entries[..=c].to_vec(),
                cursor: Some(c),
            }),
            Some(c) => Err(TimelineError::CursorOutOfRange {
                cursor: c,
                len: self.entries.len(),
            }),
        }
    }

    /// The entry under the cursor.
    pub fn current(&self) -> Option<&State> {
        self.cursor.map(|i| &self.entries[i])
    }

    /// The cursor position.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// All entries in timestamp order.
    pub fn entries(&self) -> &[State] {
        &self.entries
    }

    /// First entry, if any.
    pub fn first(&self) -> Option<&State> {
        self.entries.first()
    }

    /// Last entry, if any.
    pub fn last(&self) -> Option<&State> {
        self.entries.last()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
