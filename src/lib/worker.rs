//! Worker threads that apply a [`Matcher`] and a [`Trimmer`] to every read of a chunk.
//!
//! Each worker owns one input and one output channel. It forwards every chunk it receives after
//! trimming it in place, and answers the end of stream sentinel with its own before exiting.

use std::thread::JoinHandle;

use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use log::debug;

use crate::{
    chunk::{Chunk, Message},
    errors::TrimError,
    matcher::{build_matcher, Matcher},
    metrics::TrimMetrics,
    opts::TrimConfig,
    trimmer::Trimmer,
};

pub struct Worker {
    index: usize,
    matcher: Box<dyn Matcher + Send>,
    trimmer: Trimmer,
    rx: Receiver<Message>,
    tx: Sender<Message>,
}

impl Worker {
    /// Create a [`Worker`], building its private matcher from `config`.
    pub fn new(
        index: usize,
        config: &TrimConfig,
        rx: Receiver<Message>,
        tx: Sender<Message>,
    ) -> Self {
        Self {
            index,
            matcher: build_matcher(&config.matcher),
            trimmer: Trimmer::new(config.policy),
            rx,
            tx,
        }
    }

    /// Trim every read in `chunk` in place.
    pub fn process(&self, chunk: &mut Chunk, metrics: &mut TrimMetrics) {
        for record in &mut chunk.records {
            let len = record.seq.len();
            let result = self.matcher.find(&record.seq);
            let bounds = self.trimmer.trim(record, &result);
            metrics.record(len, &result, &bounds);
        }
    }

    /// Process chunks until the end of stream, returning the metrics for this worker.
    pub fn run(self) -> Result<TrimMetrics, TrimError> {
        let mut metrics = TrimMetrics::default();
        loop {
            match self.rx.recv() {
                Ok(Message::Chunk(mut chunk)) => {
                    self.process(&mut chunk, &mut metrics);
                    self.tx
                        .send(Message::Chunk(chunk))
                        .map_err(|_| TrimError::WorkerOutputClosed { worker: self.index })?;
                }
                Ok(Message::EndOfStream) => {
                    self.tx
                        .send(Message::EndOfStream)
                        .map_err(|_| TrimError::WorkerOutputClosed { worker: self.index })?;
                    debug!("Worker {} finished after {} reads", self.index, metrics.reads);
                    return Ok(metrics);
                }
                Err(_) => return Err(TrimError::WorkerInputClosed { worker: self.index }),
            }
        }
    }
}

/// The running workers and both ends of their channels that the caller keeps.
pub struct WorkerPool {
    /// One input channel per worker, for the dispatcher.
    pub inputs: Vec<Sender<Message>>,
    /// One output channel per worker, for the collector.
    pub outputs: Vec<Receiver<Message>>,
    pub handles: Vec<JoinHandle<Result<TrimMetrics, TrimError>>>,
}

impl WorkerPool {
    /// Spawn `config.workers` named worker threads.
    ///
    /// Input channels are bounded by `config.channel_capacity` if set; output channels are
    /// unbounded.
    pub fn spawn(config: &TrimConfig) -> Result<Self> {
        let mut inputs = Vec::with_capacity(config.workers);
        let mut outputs = Vec::with_capacity(config.workers);
        let mut handles = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let (in_tx, in_rx) = match config.channel_capacity {
                Some(capacity) => flume::bounded(capacity),
                None => flume::unbounded(),
            };
            let (out_tx, out_rx) = flume::unbounded();
            let worker = Worker::new(index, config, in_rx, out_tx);
            let handle = std::thread::Builder::new()
                .name(format!("trim-worker-{}", index))
                .spawn(move || worker.run())
                .with_context(|| format!("Failed to spawn worker {}", index))?;
            inputs.push(in_tx);
            outputs.push(out_rx);
            handles.push(handle);
        }
        debug!("Spawned {} workers", handles.len());
        Ok(Self { inputs, outputs, handles })
    }
}
