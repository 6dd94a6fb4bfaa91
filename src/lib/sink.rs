//! The destination of trimmed reads: plain FASTQ, or BGZF compressed on a pool of threads.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use gzp::{
    deflate::Bgzf,
    par::compress::{ParCompress, ParCompressBuilder},
    Compression, ZWriter, BUFSIZE,
};
use seq_io::fastq::OwnedRecord;

use crate::utils::is_stdio;

/// Write one record as `@head\nseq\n+\nqual\n`.
pub fn write_record<W: Write>(writer: &mut W, record: &OwnedRecord) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(&record.head)?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&record.qual)?;
    writer.write_all(b"\n")
}

/// An output FASTQ.
///
/// Must be closed with [`FastqWriter::finish`] so that compression errors are surfaced.
pub enum FastqWriter {
    Plain(BufWriter<Box<dyn Write + Send>>),
    Bgzf(ParCompress<Bgzf>),
}

impl FastqWriter {
    /// Create the writer for `path`.
    ///
    /// `-` writes plain FASTQ to stdout, a path ending in `.gz` is BGZF compressed with
    /// `compressor_threads` threads, anything else is written as plain text.
    pub fn create(path: &Path, compressor_threads: usize) -> Result<Self> {
        if is_stdio(path) {
            let stdout: Box<dyn Write + Send> = Box::new(io::stdout());
            return Ok(Self::Plain(BufWriter::with_capacity(BUFSIZE, stdout)));
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.to_string_lossy()))?;
        if path.extension().map_or(false, |ext| ext == "gz") {
            let writer = ParCompressBuilder::<Bgzf>::new()
                .num_threads(compressor_threads)
                .with_context(|| {
                    format!(
                        "Error in setting threads when creating compressor for {}",
                        path.to_string_lossy()
                    )
                })?
                .compression_level(Compression::default())
                .from_writer(BufWriter::with_capacity(BUFSIZE, file));
            Ok(Self::Bgzf(writer))
        } else {
            let file: Box<dyn Write + Send> = Box::new(file);
            Ok(Self::Plain(BufWriter::with_capacity(BUFSIZE, file)))
        }
    }

    /// Consumes [`Self`], flushing buffered output and finishing the compressed stream.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut writer) => writer.flush().context("Failed to flush output"),
            Self::Bgzf(mut writer) => writer.finish().context("Failed to finish BGZF output"),
        }
    }
}

impl Write for FastqWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Bgzf(writer) => writer.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.write_all(buf),
            Self::Bgzf(writer) => writer.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Bgzf(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use rstest::rstest;
    use tempfile::tempdir;

    use crate::utils::test_commons::{generate_reads, read, slurp_fastq};

    use super::{write_record, FastqWriter};

    #[test]
    fn test_write_record_layout() {
        let mut bytes = vec![];
        write_record(&mut bytes, &read("r1 extra", b"ACGT")).unwrap();
        assert_eq!(bytes, b"@r1 extra\nACGT\n+\nIIII\n".to_vec());

        let mut bytes = vec![];
        write_record(&mut bytes, &read("empty", b"")).unwrap();
        assert_eq!(bytes, b"@empty\n\n+\n\n".to_vec());
    }

    #[rstest]
    #[case("out.fastq", 1)]
    #[case("out.fastq.gz", 1)]
    #[case("out.fastq.gz", 4)]
    fn test_fastq_writer_round_trip(#[case] name: &str, #[case] threads: usize) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        let reads = generate_reads(1, "frag", 2_000);

        let mut writer = FastqWriter::create(&path, threads).unwrap();
        for r in &reads {
            write_record(&mut writer, r).unwrap();
        }
        writer.flush().unwrap();
        writer.finish().unwrap();

        assert_eq!(slurp_fastq(&path), reads);
    }

    #[test]
    fn test_fastq_writer_bad_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.fastq");
        assert!(FastqWriter::create(&path, 1).is_err());
    }
}
