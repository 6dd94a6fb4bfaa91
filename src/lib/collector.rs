//! Drain the worker output channels and write every record to the sink.
//!
//! Three disciplines are available, see [`CollectStrategy`]. All of them write every record
//! exactly once and fail if a worker's channel closes before its end of stream sentinel.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{ArgEnum, PossibleValue};
use flume::{Receiver, TryRecvError};
use itertools::Itertools;

use crate::{
    chunk::{Chunk, Message},
    errors::TrimError,
    sink::write_record,
};

#[derive(ArgEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStrategy {
    /// Receive chunk `k` from worker `k % n`, reproducing the input order exactly.
    Ordered,
    /// Drain worker 0 to its end, then worker 1, and so on. Input order is kept only with a
    /// single worker.
    Drain,
    /// Poll all workers without blocking; the output order depends on scheduling.
    Poll,
}

impl CollectStrategy {
    pub fn possible_values<'a>() -> impl Iterator<Item = PossibleValue<'a>> {
        CollectStrategy::value_variants().iter().filter_map(ArgEnum::to_possible_value)
    }
}

impl std::str::FromStr for CollectStrategy {
    type Err = TrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for variant in Self::value_variants() {
            if variant.to_possible_value().map_or(false, |v| v.matches(s, true)) {
                return Ok(*variant);
            }
        }
        Err(TrimError::UnknownCollectStrategy {
            name: s.to_owned(),
            expected: Self::possible_values().map(|v| v.get_name().to_owned()).join(", "),
        })
    }
}

/// What was written by the collector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    pub chunks: usize,
    pub records: usize,
}

/// Writes the chunks arriving from the workers to a sink.
pub struct Collector<'a, W: Write> {
    outputs: &'a [Receiver<Message>],
    writer: &'a mut W,
    summary: CollectSummary,
}

impl<'a, W: Write> Collector<'a, W> {
    pub fn new(outputs: &'a [Receiver<Message>], writer: &'a mut W) -> Self {
        Self { outputs, writer, summary: CollectSummary::default() }
    }

    /// Collect until every worker has sent its end of stream sentinel.
    pub fn collect(mut self, strategy: CollectStrategy) -> Result<CollectSummary> {
        match strategy {
            CollectStrategy::Ordered => self.collect_ordered()?,
            CollectStrategy::Drain => self.collect_drain()?,
            CollectStrategy::Poll => self.collect_poll()?,
        }
        Ok(self.summary)
    }

    fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        for record in &chunk.records {
            write_record(&mut *self.writer, record).context("Failed to write trimmed read")?;
        }
        self.summary.chunks += 1;
        self.summary.records += chunk.len();
        Ok(())
    }

    /// Blocking round robin over the workers, skipping those that have finished.
    fn collect_ordered(&mut self) -> Result<()> {
        let n = self.outputs.len();
        let mut finished = vec![false; n];
        let mut remaining = n;
        let mut worker = 0;
        while remaining > 0 {
            if !finished[worker] {
                match self.outputs[worker].recv() {
                    Ok(Message::Chunk(chunk)) => self.write_chunk(&chunk)?,
                    Ok(Message::EndOfStream) => {
                        finished[worker] = true;
                        remaining -= 1;
                    }
                    Err(_) => return Err(TrimError::MissingSentinel { worker }.into()),
                }
            }
            worker = (worker + 1) % n;
        }
        Ok(())
    }

    /// Each worker in turn, to its sentinel.
    fn collect_drain(&mut self) -> Result<()> {
        for worker in 0..self.outputs.len() {
            loop {
                match self.outputs[worker].recv() {
                    Ok(Message::Chunk(chunk)) => self.write_chunk(&chunk)?,
                    Ok(Message::EndOfStream) => break,
                    Err(_) => return Err(TrimError::MissingSentinel { worker }.into()),
                }
            }
        }
        Ok(())
    }

    /// Non-blocking round robin; yields the thread after a pass that found nothing.
    fn collect_poll(&mut self) -> Result<()> {
        let n = self.outputs.len();
        let mut finished = vec![false; n];
        let mut remaining = n;
        while remaining > 0 {
            let mut idle = true;
            for worker in 0..n {
                if finished[worker] {
                    continue;
                }
                match self.outputs[worker].try_recv() {
                    Ok(Message::Chunk(chunk)) => {
                        idle = false;
                        self.write_chunk(&chunk)?;
                    }
                    Ok(Message::EndOfStream) => {
                        idle = false;
                        finished[worker] = true;
                        remaining -= 1;
                    }
                    Err(TryRecvError::Empty) => (),
                    Err(TryRecvError::Disconnected) => {
                        return Err(TrimError::MissingSentinel { worker }.into())
                    }
                }
            }
            if idle {
                std::thread::yield_now();
            }
        }
        Ok(())
    }
}
