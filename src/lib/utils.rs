//! Utility functions.
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use core::fmt::Display;
use gzp::{
    deflate::Bgzf, par::decompress::ParDecompressBuilder, BlockFormatSpec, GzpError, BUFSIZE,
};

/// The path that stands for stdin or stdout.
pub const STDIO_PATH: &str = "-";

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = if let Some(s) = GIT_COMMIT_HASH {
            format!("{}-{}", PKG_VERSION, &s[0..8])
        } else {
            PKG_VERSION.to_string()
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// True if `path` is `-`.
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

/// The compression of an input FASTQ, as judged from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Plain,
    Bgzf,
    /// GZIP that is not block compressed.
    Gzip,
}

/// Guess the [`InputFormat`] from the leading bytes of a file.
///
/// Anything that does not start with the GZIP magic bytes is treated as plain text and left to
/// the FASTQ parser to reject.
pub fn detect_format(header: &[u8]) -> InputFormat {
    if header.len() < 3 || header[0] != 31 || header[1] != 139 || header[2] != 8 {
        InputFormat::Plain
    } else if header.len() >= Bgzf::HEADER_SIZE
        && header[3] & 4 == 4
        && header[12] == b'B'
        && header[13] == b'C'
    {
        InputFormat::Bgzf
    } else {
        InputFormat::Gzip
    }
}

/// Open an input FASTQ for reading, decompressing it on a pool of threads if it is BGZF.
///
/// `-` reads plain FASTQ from stdin.
pub fn open_input(path: &Path, decompression_threads: usize) -> Result<Box<dyn Read + Send>> {
    if is_stdio(path) {
        return Ok(Box::new(std::io::stdin()));
    }
    let mut reader = BufReader::with_capacity(
        BUFSIZE,
        File::open(path).with_context(|| format!("Failed to open {}", path.to_string_lossy()))?,
    );
    let header = reader
        .fill_buf()
        .with_context(|| format!("Error reading from: {}", path.to_string_lossy()))?;
    match detect_format(header) {
        InputFormat::Plain => Ok(Box::new(reader)),
        InputFormat::Bgzf => {
            let decoder = ParDecompressBuilder::<Bgzf>::new()
                .num_threads(decompression_threads)
                .with_context(|| {
                    format!(
                        "Error in setting threads when creating decompressor for {}",
                        path.to_string_lossy()
                    )
                })?
                .from_reader(reader);
            Ok(Box::new(decoder))
        }
        InputFormat::Gzip => {
            report_bgzf_error(path, GzpError::InvalidHeader("Header in GZIP but not BGZF format"))
        }
    }
}

/// Creates an error message when a compressed input is GZIP but not BGZF.
fn report_bgzf_error<C, T>(file: &Path, context: C) -> Result<T>
where
    C: Display + Send + Sync + 'static,
{
    let filename = file.to_string_lossy();
    let message = format!(
        "
Error reading from: {}

Compressed input must be in BGZF (bgzip) format!

The input was found in a gzip format.

To re-compress a GZIP file with bgzip:
  1. install with `conda install -c bioconda htslib`
     or from http://www.htslib.org/download/
  2. `gunzip -c {} > tmp.fastq`
  3. `bgzip --stdout --threads tmp.fastq > {}`

Alternatively pass the uncompressed FASTQ, or `-` to read it from stdin.
",
        filename, filename, filename,
    );
    Err(anyhow!(message).context(context))
}
