//! Typed errors for configuration, input parsing, and the worker pipeline.

use std::fmt::Display;

use thiserror::Error;

/// The reason that an adapter has been deemed invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReasonAdapterInvalid {
    EmptyString,
    InvalidBase(u8),
}

impl Display for ReasonAdapterInvalid {
    /// Proper error wording for each reason an adapter is invalid.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyString => write!(f, "Adapter is an empty string"),
            Self::InvalidBase(base) => {
                write!(f, "Adapter contains the invalid base `{}`", char::from(*base))
            }
        }
    }
}

/// The errors that may occur while configuring or running the trimming pipeline.
#[derive(Error, Debug)]
pub enum TrimError {
    #[error("Unknown matcher `{name}`, expected one of: {expected}")]
    UnknownMatcher { name: String, expected: String },

    #[error("Unknown collection strategy `{name}`, expected one of: {expected}")]
    UnknownCollectStrategy { name: String, expected: String },

    #[error("Invalid adapter sequence `{adapter}` - {reason}")]
    InvalidAdapter { adapter: String, reason: ReasonAdapterInvalid },

    #[error("Invalid value for --{name}: {value} ({reason})")]
    InvalidOption { name: &'static str, value: String, reason: &'static str },

    #[error("Malformed FASTQ record after {records_read} records")]
    Stream {
        records_read: usize,
        #[source]
        source: seq_io::fastq::Error,
    },

    #[error("Failed to send chunk {chunk} to worker {worker}, the worker has stopped")]
    Dispatch { chunk: usize, worker: usize },

    #[error("The input channel of worker {worker} closed before the end of stream was seen")]
    WorkerInputClosed { worker: usize },

    #[error("Worker {worker} failed to send a trimmed chunk, the collector has stopped")]
    WorkerOutputClosed { worker: usize },

    #[error("The output channel of worker {worker} closed before the end of stream was seen")]
    MissingSentinel { worker: usize },
}

impl TrimError {
    /// True if this error only reports that a neighbouring stage went away.
    ///
    /// These are symptoms: the stage that stopped first carries the root cause.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Dispatch { .. }
                | Self::WorkerInputClosed { .. }
                | Self::WorkerOutputClosed { .. }
                | Self::MissingSentinel { .. }
        )
    }
}
