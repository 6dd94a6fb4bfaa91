//! Groups a stream of FASTQ records into fixed size [`Chunk`]s.

use std::num::NonZeroUsize;

use seq_io::fastq::OwnedRecord;

use crate::chunk::Chunk;

/// An iterator adapter that buffers records into chunks of `chunksize`, in arrival order.
///
/// - The final chunk may be shorter than `chunksize`, and is never empty.
/// - If a `debug_limit` is given ingestion stops after that many records.
/// - The first error from the source is yielded (after nothing else) and ends iteration; any
///   records buffered before the error are dropped since the run is going to abort.
pub struct Partitioner<I> {
    records: I,
    chunksize: NonZeroUsize,
    debug_limit: Option<usize>,
    /// The number of records pulled from the source so far.
    consumed: usize,
    finished: bool,
}

impl<I> Partitioner<I> {
    /// Create a new [`Partitioner`] over `records`.
    pub fn new(records: I, chunksize: NonZeroUsize, debug_limit: Option<usize>) -> Self {
        Self { records, chunksize, debug_limit, consumed: 0, finished: false }
    }

    /// The number of records read from the source so far.
    pub fn records_consumed(&self) -> usize {
        self.consumed
    }

    /// True once the debug limit has been hit.
    fn at_limit(&self) -> bool {
        self.debug_limit.map_or(false, |limit| self.consumed >= limit)
    }
}

impl<I, E> Iterator for Partitioner<I>
where
    I: Iterator<Item = Result<OwnedRecord, E>>,
{
    type Item = Result<Chunk, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let chunksize = usize::from(self.chunksize);
        let mut chunk = Chunk::with_capacity(chunksize);
        while chunk.len() < chunksize {
            if self.at_limit() {
                self.finished = true;
                break;
            }
            match self.records.next() {
                Some(Ok(record)) => {
                    self.consumed += 1;
                    chunk.push(record);
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}
