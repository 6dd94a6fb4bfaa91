//! Turn a [`MatchResult`] into the retained window of a read.
//!
//! When the adapter is found everything from it onwards is removed, along with a margin of
//! `min_first` bases at the start and `min_last` bases before the adapter. If the remaining
//! insert is still longer than the target length it is shaved down to exactly that length,
//! alternating between the back and the front (back first).
//!
//! Reads without an adapter are kept: the window starts after `min_first` bases and extends for
//! at most the target length.

use seq_io::fastq::OwnedRecord;

use crate::matcher::MatchResult;

/// How many bases must be removed from either end of a read, and the length to shave down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    pub min_first: usize,
    pub min_last: usize,
    /// `None` disables shaving to a fixed length.
    pub target_length: Option<usize>,
}

/// The half-open window `[start, end)` of a read that is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimBounds {
    pub start: usize,
    pub end: usize,
    /// True if bases beyond the minimum margins were removed to reach the target length.
    pub shaved: bool,
}

impl TrimBounds {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trimmer {
    policy: TrimPolicy,
}

impl Trimmer {
    pub fn new(policy: TrimPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrimPolicy {
        &self.policy
    }

    /// Compute the retained window for a read of length `len`.
    ///
    /// Never fails: degenerate inputs produce an empty window.
    pub fn bounds(&self, len: usize, result: &MatchResult) -> TrimBounds {
        let TrimPolicy { min_first, min_last, target_length } = self.policy;
        match result.usable_length(len) {
            Some(usable) => {
                let mut first = min_first;
                let mut last = min_last;
                let kept = usable.saturating_sub(first + last);
                let excess = target_length.map_or(0, |target| kept.saturating_sub(target));
                // the back gets the odd base
                last += (excess + 1) / 2;
                first += excess / 2;
                let end = usable.saturating_sub(last);
                TrimBounds { start: first.min(end), end, shaved: excess > 0 }
            }
            None => {
                let start = min_first.min(len);
                let end = target_length.map_or(len, |target| (start + target).min(len));
                TrimBounds { start, end, shaved: false }
            }
        }
    }

    /// Trim the sequence and quality of `record` in place, returning the window that was kept.
    pub fn trim(&self, record: &mut OwnedRecord, result: &MatchResult) -> TrimBounds {
        let bounds = self.bounds(record.seq.len(), result);
        for bases in [&mut record.seq, &mut record.qual] {
            bases.truncate(bounds.end);
            bases.drain(..bounds.start.min(bases.len()));
        }
        bounds
    }
}
