//! The unit of work passed between pipeline stages.

use seq_io::fastq::OwnedRecord;

/// An ordered batch of FASTQ records.
///
/// Chunks carry no identity beyond the order in which they were created; every stage takes
/// ownership of the whole chunk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub records: Vec<OwnedRecord>,
}

impl Chunk {
    /// Create an empty [`Chunk`] able to hold `capacity` records without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { records: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, record: OwnedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<OwnedRecord>> for Chunk {
    fn from(records: Vec<OwnedRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for Chunk {
    type Item = OwnedRecord;
    type IntoIter = std::vec::IntoIter<OwnedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// An element of a pipeline channel.
///
/// Every channel carries zero or more chunks followed by exactly one [`Message::EndOfStream`].
#[derive(Debug)]
pub enum Message {
    Chunk(Chunk),
    EndOfStream,
}
