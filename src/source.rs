/*!
The `source` module defines the byte-source contract that connects transports
to the decoders. A [`ByteSource`] has no understanding of MIDI; it only
delivers and accepts raw bytes. `start` is called once before the first
`read`/`write` and `stop` once after the last.
!*/

use log::trace;
use snafu::{ensure, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("io error around byte {}: {}", position, source))]
    Io {
        position: u64,
        source: std::io::Error,
    },

    #[snafu(display(
        "unexpected end around byte {}: wanted {} more byte(s)",
        position,
        wanted
    ))]
    End { position: u64, wanted: usize },

    #[snafu(display("unable to open '{}': {}", path.display(), source))]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("this byte source does not support {}", what))]
    Unsupported { what: String },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// The byte-source/sink contract. `read(n)` returns exactly `n` bytes except
/// at end-of-stream, where a short (possibly empty) buffer is returned.
pub trait ByteSource {
    /// Called once before the first `read` or `write`.
    fn start(&mut self) -> SourceResult<()> {
        Ok(())
    }

    /// Called once after the last `read` or `write`.
    fn stop(&mut self) -> SourceResult<()> {
        Ok(())
    }

    /// Read up to `count` bytes. A short read signals end-of-stream.
    fn read(&mut self, count: usize) -> SourceResult<Vec<u8>>;

    /// Write the given bytes, returning the number written.
    fn write(&mut self, _buf: &[u8]) -> SourceResult<usize> {
        UnsupportedSnafu { what: "writing" }.fail()
    }

    /// Read exactly `count` bytes, treating a short read as an error.
    fn read_exact(&mut self, count: usize) -> SourceResult<Vec<u8>> {
        let bytes = self.read(count)?;
        ensure!(
            bytes.len() == count,
            EndSnafu {
                position: self.position(),
                wanted: count - bytes.len(),
            }
        );
        Ok(bytes)
    }

    /// Read a single byte, treating end-of-stream as an error.
    fn read_byte(&mut self) -> SourceResult<u8> {
        Ok(self.read_exact(1)?[0])
    }

    /// The number of bytes consumed so far, for diagnostics.
    fn position(&self) -> u64;
}

const KB: usize = 1024;
const MB: usize = KB * 1024;

/// A [`ByteSource`] over a file on disk. The file is opened by `start` (or
/// lazily by the first read) and closed by `stop`.
pub struct FileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    position: u64,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            position: 0,
        }
    }

    fn open(&mut self) -> SourceResult<()> {
        if self.reader.is_none() {
            trace!("opening '{}'", self.path.display());
            let f = File::open(&self.path).context(FileOpenSnafu { path: &self.path })?;
            self.reader = Some(BufReader::with_capacity(MB, f));
        }
        Ok(())
    }
}

impl ByteSource for FileSource {
    fn start(&mut self) -> SourceResult<()> {
        self.open()
    }

    fn stop(&mut self) -> SourceResult<()> {
        self.reader = None;
        Ok(())
    }

    fn read(&mut self, count: usize) -> SourceResult<Vec<u8>> {
        self.open()?;
        let position = self.position;
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return EndSnafu { position, wanted: count }.fail(),
        };
        let mut buf = vec![0u8; count];
        let mut filled = 0usize;
        while filled < count {
            let n = reader
                .read(&mut buf[filled..])
                .context(IoSnafu { position })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        self.position += filled as u64;
        Ok(buf)
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// A [`ByteSource`] over an in-memory buffer. Reads consume from the front,
/// writes append to the back. Useful for tests and for encoding.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    position: usize,
}

impl MemorySource {
    pub fn new<B: Into<Vec<u8>>>(data: B) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Consumes the source and returns the underlying buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, count: usize) -> SourceResult<Vec<u8>> {
        let available = self.data.len() - self.position;
        let take = count.min(available);
        let bytes = self.data[self.position..self.position + take].to_vec();
        self.position += take;
        Ok(bytes)
    }

    fn write(&mut self, buf: &[u8]) -> SourceResult<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }
}
