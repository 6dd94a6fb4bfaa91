//! Functionality pertaining to the collection of metrics during trimming.
//!
//! Each worker keeps a [`TrimMetrics`] for the reads it processed. After the workers are joined
//! their metrics are merged with [`TrimMetrics::update_with`] and may be written out as a one row
//! [`RunMetrics`] TSV.

use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

use crate::{matcher::MatchResult, trimmer::TrimBounds};

/// Counts accumulated by a single worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimMetrics {
    /// The number of reads processed.
    pub reads: usize,
    /// The number of reads in which the adapter was found.
    pub matched: usize,
    /// The number of reads shaved down to the target length.
    pub shaved: usize,
    /// Bases before trimming.
    pub bases_in: usize,
    /// Bases after trimming.
    pub bases_out: usize,
}

impl TrimMetrics {
    /// Account for one read of `len` bases.
    pub fn record(&mut self, len: usize, result: &MatchResult, bounds: &TrimBounds) {
        self.reads += 1;
        self.matched += usize::from(result.is_match());
        self.shaved += usize::from(bounds.shaved);
        self.bases_in += len;
        self.bases_out += bounds.len();
    }

    /// Update this [`TrimMetrics`] with the counts of another.
    pub fn update_with(&mut self, other: &Self) {
        self.reads += other.reads;
        self.matched += other.matched;
        self.shaved += other.shaved;
        self.bases_in += other.bases_in;
        self.bases_out += other.bases_out;
    }

    /// The fraction of reads in which the adapter was found.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction_matched(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.matched as f64 / self.reads as f64
        }
    }
}

/// The high level metrics for a run.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    /// The matcher that was used.
    pub(crate) matcher: String,
    /// The total number of reads read and written.
    pub(crate) total_reads: usize,
    /// The number of reads with an adapter.
    pub(crate) matched_reads: usize,
    /// The number of reads without an adapter.
    pub(crate) unmatched_reads: usize,
    /// The fraction of reads with an adapter.
    pub(crate) fraction_matched: f64,
    /// The number of reads shaved to the target length.
    pub(crate) shaved_reads: usize,
    pub(crate) bases_in: usize,
    pub(crate) bases_out: usize,
}

impl RunMetrics {
    pub fn new(matcher: &str, metrics: &TrimMetrics) -> Self {
        Self {
            matcher: matcher.to_owned(),
            total_reads: metrics.reads,
            matched_reads: metrics.matched,
            unmatched_reads: metrics.reads - metrics.matched,
            fraction_matched: metrics.fraction_matched(),
            shaved_reads: metrics.shaved,
            bases_in: metrics.bases_in,
            bases_out: metrics.bases_out,
        }
    }

    /// Write the metrics as a single row TSV with a header.
    pub fn to_file<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let delim = DelimFile::default();
        delim
            .write_tsv(&path, std::iter::once(self))
            .with_context(|| format!("Failed to write metrics to {}", path.as_ref().display()))?;
        Ok(())
    }
}
