#![forbid(unsafe_code)]

use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use env_logger::Env;

use crate::{
    collector::CollectStrategy,
    errors::TrimError,
    matcher::{MatcherConfig, MatcherKind, DEFAULT_ADAPTER},
    trimmer::TrimPolicy,
    utils::built_info,
};

pub static TOOL_NAME: &str = "microtrim";

static SHORT_USAGE: &str = "Trims a 3' adapter from the reads of a small-RNA FASTQ.";

static LONG_USAGE: &str = "
Trims a 3' adapter from the reads of a small-RNA FASTQ.

The input may be plain text or block compressed (e.g. with `bgzip`), or `-` for plain text on
stdin.  Gzip files that are not block compressed are rejected.  The output is block compressed
when its path ends in `.gz`, `-` writes plain text to stdout.

Each read is searched from its 3' end for the first --match-only bases of the adapter with the
chosen --matcher.  When found, the adapter and everything after it is removed along with
--trim-first bases from the start and --trim-last bases before the adapter.  Inserts that are
still longer than --trim-to are shaved down to exactly that length, alternating between the
back and the front.  Reads without the adapter are kept, truncated to --trim-to bases after the
first --trim-first.

Reads are processed in chunks of --chunksize by --workers threads.  Unless --channel-capacity is
given the queues between the reader and the workers are unbounded, so a slow writer can make
memory use grow with the size of the input.

Example invocation:

microtrim \\
  --input reads.fastq.gz \\
  --output trimmed.fastq.gz \\
  --matcher variant-set \\
  --metrics trim_metrics.tsv
";

#[derive(Parser, Debug, Clone)]
#[clap(name = TOOL_NAME, version = built_info::VERSION.as_str(), about=SHORT_USAGE, long_about=LONG_USAGE, term_width=0)]
pub struct Opts {
    /// Path to the input FASTQ, `-` for stdin.
    #[clap(long, short = 'i', display_order = 1)]
    pub input: PathBuf,

    /// Path to the output FASTQ, `-` for stdout.
    ///
    /// This tool will overwrite an existing file.
    #[clap(long, short = 'o', display_order = 2)]
    pub output: PathBuf,

    /// The algorithm used to find the adapter.
    #[clap(long, short = 'm', possible_values=MatcherKind::possible_values(), display_order = 3)]
    pub matcher: MatcherKind,

    /// The 3' adapter sequence.
    #[clap(long, short = 'a', default_value = DEFAULT_ADAPTER, display_order = 11)]
    pub adapter: String,

    /// Only the first this many bases of the adapter are searched for.
    #[clap(long, default_value = "15", display_order = 11)]
    pub match_only: usize,

    /// The maximum normalized distance accepted by the approximate matchers.
    ///
    /// Between 0 (exact) and 1.
    #[clap(long, short = 'd', default_value = "0.1", display_order = 11)]
    pub max_distance: f64,

    /// Only search the 3' `1 / stop-after` of each read for the adapter.
    #[clap(long, short = 's', default_value = "2", display_order = 11)]
    pub stop_after: usize,

    /// Bases always removed from the start of a read.
    #[clap(long, short = 'f', default_value = "4", display_order = 21)]
    pub trim_first: usize,

    /// Bases always removed before the adapter.
    #[clap(long, short = 'l', default_value = "4", display_order = 21)]
    pub trim_last: usize,

    /// The length reads are shaved or truncated to.
    ///
    /// If set to 0 reads are not shaved to a fixed length.
    #[clap(long, short = 'T', default_value = "28", display_order = 21)]
    pub trim_to: usize,

    /// Number of threads for trimming.
    #[clap(long, short = 't', default_value = "4", display_order = 31)]
    pub workers: usize,

    /// The number of reads handed to a worker at one time.
    #[clap(long, short = 'c', default_value = "500", display_order = 31)]
    pub chunksize: usize,

    /// Stop after reading this many reads.
    ///
    /// [default: None]
    #[clap(long, display_order = 31, hide = true)]
    pub debug_limit: Option<usize>,

    /// How trimmed chunks are collected from the workers.
    ///
    /// `ordered` keeps the input order, `drain` keeps it only with a single worker and `poll`
    /// writes chunks as soon as they are ready.
    #[clap(long, default_value = "ordered", possible_values=CollectStrategy::possible_values(), display_order = 31)]
    pub collect: CollectStrategy,

    /// Maximum number of chunks queued for each worker.
    ///
    /// [default: unbounded]
    #[clap(long, display_order = 31)]
    pub channel_capacity: Option<usize>,

    /// Number of threads for compressing the output.
    #[clap(long, default_value = "4", display_order = 31)]
    pub compressor_threads: usize,

    /// Number of threads for decompressing the input.
    #[clap(long, default_value = "4", display_order = 31, hide = true)]
    pub decompression_threads: usize,

    /// Path to write the run metrics to.
    ///
    /// [default: None]
    #[clap(long, display_order = 41)]
    pub metrics: Option<PathBuf>,
}

/// The validated settings for one trimming run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimConfig {
    pub matcher: MatcherConfig,
    pub policy: TrimPolicy,
    pub workers: usize,
    pub chunksize: NonZeroUsize,
    pub debug_limit: Option<usize>,
    pub collect: CollectStrategy,
    pub channel_capacity: Option<usize>,
}

fn at_least_one(name: &'static str, value: usize) -> Result<usize, TrimError> {
    if value == 0 {
        Err(TrimError::InvalidOption {
            name,
            value: value.to_string(),
            reason: "must be at least 1",
        })
    } else {
        Ok(value)
    }
}

impl Opts {
    /// Validate the options into a [`TrimConfig`].
    pub fn to_config(&self) -> Result<TrimConfig, TrimError> {
        let matcher = MatcherConfig::new(
            self.matcher,
            &self.adapter,
            self.match_only,
            self.max_distance,
            self.stop_after,
        )?;
        let workers = at_least_one("workers", self.workers)?;
        let chunksize = NonZeroUsize::new(self.chunksize).ok_or(TrimError::InvalidOption {
            name: "chunksize",
            value: self.chunksize.to_string(),
            reason: "must be at least 1",
        })?;
        let channel_capacity =
            self.channel_capacity.map(|c| at_least_one("channel-capacity", c)).transpose()?;
        at_least_one("compressor-threads", self.compressor_threads)?;
        at_least_one("decompression-threads", self.decompression_threads)?;

        Ok(TrimConfig {
            matcher,
            policy: TrimPolicy {
                min_first: self.trim_first,
                min_last: self.trim_last,
                target_length: (self.trim_to > 0).then(|| self.trim_to),
            },
            workers,
            chunksize,
            debug_limit: self.debug_limit,
            collect: self.collect,
            channel_capacity,
        })
    }
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for Opts {
    fn default() -> Self {
        Self {
            input: PathBuf::default(),
            output: PathBuf::default(),
            matcher: MatcherKind::VariantSet,
            adapter: DEFAULT_ADAPTER.to_owned(),
            match_only: 15,
            max_distance: 0.1,
            stop_after: 2,
            trim_first: 4,
            trim_last: 4,
            trim_to: 28,
            workers: 4,
            chunksize: 500,
            debug_limit: None,
            collect: CollectStrategy::Ordered,
            channel_capacity: None,
            compressor_threads: 4,
            decompression_threads: 4,
            metrics: None,
        }
    }
}

#[cfg(test)]
impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::new(MatcherKind::VariantSet, DEFAULT_ADAPTER, 15, 0.1, 2)
                .unwrap(),
            policy: TrimPolicy { min_first: 4, min_last: 4, target_length: Some(28) },
            workers: 4,
            chunksize: NonZeroUsize::new(500).unwrap(),
            debug_limit: None,
            collect: CollectStrategy::Ordered,
            channel_capacity: None,
        }
    }
}

/// Parse args and set up logging / tracing
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    Opts::parse()
}
