//! Deterministic round-robin assignment of chunks to workers.

use flume::Sender;
use log::debug;

use crate::{
    chunk::{Chunk, Message},
    errors::TrimError,
};

/// Sends chunk `i` to worker `i % n`.
pub struct Dispatcher {
    senders: Vec<Sender<Message>>,
    dispatched: usize,
}

impl Dispatcher {
    /// Create a [`Dispatcher`] over one input channel per worker.
    ///
    /// # Panics
    ///
    /// - if `senders` is empty
    pub fn new(senders: Vec<Sender<Message>>) -> Self {
        assert!(!senders.is_empty(), "Dispatcher requires at least one worker");
        Self { senders, dispatched: 0 }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// The number of chunks dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Send `chunk` to the next worker in turn, blocking if its input channel is full.
    pub fn dispatch(&mut self, chunk: Chunk) -> Result<(), TrimError> {
        let worker = self.dispatched % self.senders.len();
        self.senders[worker]
            .send(Message::Chunk(chunk))
            .map_err(|_| TrimError::Dispatch { chunk: self.dispatched, worker })?;
        self.dispatched += 1;
        Ok(())
    }

    /// Send exactly one [`Message::EndOfStream`] to every worker, returning the number of chunks
    /// dispatched.
    ///
    /// Consumes [`Self`] so that nothing can be sent after the end of stream.
    pub fn finish(self) -> Result<usize, TrimError> {
        for (worker, sender) in self.senders.iter().enumerate() {
            sender
                .send(Message::EndOfStream)
                .map_err(|_| TrimError::Dispatch { chunk: self.dispatched, worker })?;
        }
        debug!("Dispatched {} chunks to {} workers", self.dispatched, self.senders.len());
        Ok(self.dispatched)
    }
}
