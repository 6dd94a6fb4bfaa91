//! A [`ThreadReader`] pushes the reading and parsing of the input FASTQ onto a separate thread.
//!
//! The thread opens the input (decompressing BGZF on a pool of threads), groups the records into
//! chunks with a [`Partitioner`] and hands them to the workers through a [`Dispatcher`]. Once
//! the input is exhausted every worker receives its end of stream sentinel.
//!
//! On a parse error the thread returns early and drops the [`Dispatcher`]; workers then see their
//! input channels close without a sentinel.

use std::{io::Read, num::NonZeroUsize, path::PathBuf, thread::JoinHandle};

use anyhow::{Context, Result};
use gzp::BUFSIZE;
use log::debug;
use seq_io::fastq;

use crate::{
    dispatcher::Dispatcher, errors::TrimError, partitioner::Partitioner, utils::open_input,
};

/// Where the reader thread gets its FASTQ from.
pub enum FastqSource {
    /// A path, or `-` for stdin.
    Path { path: PathBuf, decompression_threads: usize },
    /// An already opened, uncompressed stream.
    Reader(Box<dyn Read + Send>),
}

impl FastqSource {
    fn open(self) -> Result<Box<dyn Read + Send>> {
        match self {
            Self::Path { path, decompression_threads } => open_input(&path, decompression_threads),
            Self::Reader(reader) => Ok(reader),
        }
    }
}

/// A struct to hold onto the handle for the thread that is reading and dispatching chunks.
pub struct ThreadReader {
    /// The [`JoinHandle`] for the thread; yields the number of records read.
    pub handle: JoinHandle<Result<usize>>,
}

impl ThreadReader {
    /// Spawn the reader thread for `source`, sending chunks of `chunksize` records through
    /// `dispatcher`.
    pub fn new(
        source: FastqSource,
        chunksize: NonZeroUsize,
        debug_limit: Option<usize>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let handle = std::thread::Builder::new()
            .name(String::from("fastq-reader"))
            .spawn(move || Self::read(source, chunksize, debug_limit, dispatcher))
            .context("Failed to spawn the reader thread")?;
        Ok(Self { handle })
    }

    fn read(
        source: FastqSource,
        chunksize: NonZeroUsize,
        debug_limit: Option<usize>,
        mut dispatcher: Dispatcher,
    ) -> Result<usize> {
        let mut reader = fastq::Reader::with_capacity(source.open()?, BUFSIZE);
        let records = std::iter::from_fn(|| {
            reader.next().map(|result| result.map(|record| record.to_owned_record()))
        });
        let mut partitioner = Partitioner::new(records, chunksize, debug_limit);
        while let Some(chunk) = partitioner.next() {
            match chunk {
                Ok(chunk) => dispatcher.dispatch(chunk)?,
                Err(source) => {
                    return Err(TrimError::Stream {
                        records_read: partitioner.records_consumed(),
                        source,
                    }
                    .into())
                }
            }
        }
        let records_read = partitioner.records_consumed();
        let chunks = dispatcher.finish()?;
        debug!("Read {} records in {} chunks", records_read, chunks);
        Ok(records_read)
    }
}

#[cfg(test)]
mod test {
    use std::{io::Cursor, num::NonZeroUsize};

    use flume::{unbounded, Receiver};
    use rstest::rstest;
    use seq_io::fastq::OwnedRecord;
    use tempfile::tempdir;

    use crate::{
        chunk::Message,
        dispatcher::Dispatcher,
        errors::TrimError,
        utils::test_commons::{generate_reads, reads_to_bytes, write_reads_to_file},
    };

    use super::{FastqSource, ThreadReader};

    /// Read everything a single worker channel received, checking for exactly one sentinel.
    fn receive_all(rx: &Receiver<Message>) -> Vec<OwnedRecord> {
        let mut seen = vec![];
        loop {
            match rx.recv().unwrap() {
                Message::Chunk(chunk) => seen.extend(chunk),
                Message::EndOfStream => break,
            }
        }
        assert!(rx.recv().is_err(), "nothing may follow the sentinel");
        seen
    }

    fn spawn(
        source: FastqSource,
        chunksize: usize,
        limit: Option<usize>,
    ) -> (ThreadReader, Receiver<Message>) {
        let (tx, rx) = unbounded();
        let reader = ThreadReader::new(
            source,
            NonZeroUsize::new(chunksize).unwrap(),
            limit,
            Dispatcher::new(vec![tx]),
        )
        .unwrap();
        (reader, rx)
    }

    #[rstest]
    #[case(1, 10, "reads.fastq.gz")]
    #[case(10, 1, "reads.fastq.gz")]
    #[case(0, 100, "reads.fastq.gz")]
    #[case(100, 1, "reads.fastq")]
    #[case(10_000, 500, "reads.fastq.gz")] // 500 is the default chunksize
    #[case(10_000, 500, "reads.fastq")]
    fn test_thread_reader(
        #[case] reads_in_file: usize,
        #[case] chunksize: usize,
        #[case] name: &str,
    ) {
        let dir = tempdir().unwrap();
        let file = dir.path().join(name);
        let reads = generate_reads(1, "frag", reads_in_file);
        write_reads_to_file(reads.clone().into_iter(), &file);

        let source = FastqSource::Path { path: file, decompression_threads: 2 };
        let (reader, rx) = spawn(source, chunksize, None);
        let seen_reads = receive_all(&rx);
        assert_eq!(reader.handle.join().unwrap().unwrap(), reads_in_file);
        assert_eq!(seen_reads, reads);
    }

    #[test]
    fn test_thread_reader_debug_limit() {
        let reads = generate_reads(1, "frag", 100);
        let source = FastqSource::Reader(Box::new(Cursor::new(reads_to_bytes(&reads))));
        let (reader, rx) = spawn(source, 7, Some(30));
        let seen_reads = receive_all(&rx);
        assert_eq!(reader.handle.join().unwrap().unwrap(), 30);
        assert_eq!(seen_reads, reads[..30].to_vec());
    }

    #[rstest]
    #[case(b"bad\nACGT\n+\nIIII\n")]
    #[case(b"@r\nACGTACGT\n+\nIIII\n")]
    fn test_thread_reader_malformed_record(#[case] malformed: &[u8]) {
        let mut bytes = reads_to_bytes(&generate_reads(1, "frag", 5));
        bytes.extend_from_slice(malformed);
        let source = FastqSource::Reader(Box::new(Cursor::new(bytes)));
        let (reader, rx) = spawn(source, 2, None);

        let err = reader.handle.join().unwrap().unwrap_err();
        let err = err.downcast::<TrimError>().unwrap();
        assert!(matches!(err, TrimError::Stream { records_read: 5, .. }));

        // two full chunks made it out, the partial one was dropped, and no sentinel was sent
        let chunks: Vec<Message> = rx.drain().collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|m| matches!(m, Message::Chunk(_))));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_thread_reader_missing_file() {
        let dir = tempdir().unwrap();
        let source =
            FastqSource::Path { path: dir.path().join("missing.fastq"), decompression_threads: 1 };
        let (reader, rx) = spawn(source, 10, None);
        assert!(reader.handle.join().unwrap().is_err());
        assert!(rx.recv().is_err());
    }
}
