use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// Buffer size for line-oriented readers.
pub(crate) const LINE_BUFFER_SIZE: usize = 256 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A readable, seekable byte stream backed by a local file or memory.
#[derive(Debug)]
pub enum ByteSource {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl ByteSource {
    /// Opens a local file as a byte source.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|_| Error::NotFound(format!("could not open {}", path.display())))?;
        Ok(Self::File(file))
    }

    /// Wraps an in-memory buffer as a byte source.
    pub fn memory(data: Vec<u8>) -> Self {
        Self::Memory(Cursor::new(data))
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            Self::Memory(c) => c.seek(pos),
        }
    }
}

/// Compression framing of a text source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// Sniffs the gzip magic bytes, leaving the source at its start.
    ///
    /// BGZF is a valid gzip framing, so block-gzipped sources are detected
    /// as gzip here.
    pub fn detect(source: &mut ByteSource) -> Result<Self> {
        let mut magic = [0; 2];
        let mut n = 0;
        while n < magic.len() {
            let m = source.read(&mut magic[n..])?;
            if m == 0 {
                break;
            }
            n += m;
        }
        source.seek(SeekFrom::Start(0))?;
        if n == magic.len() && magic == GZIP_MAGIC {
            Ok(Self::Gzip)
        } else {
            Ok(Self::None)
        }
    }

    /// Infers compression from a `.gz` or `.bgz` file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("gz") | Some("bgz") => Self::Gzip,
            _ => Self::None,
        }
    }
}

/// A buffered reader delivering successive text lines from a byte source,
/// transparently inflating gzip.
pub struct LineStream {
    inner: Box<dyn BufRead>,
}

impl fmt::Debug for LineStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineStream").finish_non_exhaustive()
    }
}

impl LineStream {
    /// Creates a line stream over a source with the given compression.
    pub fn new(source: ByteSource, compression: Compression) -> Self {
        let inner: Box<dyn BufRead> = match compression {
            Compression::None => Box::new(BufReader::with_capacity(LINE_BUFFER_SIZE, source)),
            Compression::Gzip => Box::new(BufReader::with_capacity(
                LINE_BUFFER_SIZE,
                MultiGzDecoder::new(BufReader::with_capacity(LINE_BUFFER_SIZE, source)),
            )),
        };
        Self { inner }
    }

    /// Creates a line stream with compression detected from the leading
    /// magic bytes.
    pub fn sniff(mut source: ByteSource) -> Result<Self> {
        let compression = Compression::detect(&mut source)?;
        Ok(Self::new(source, compression))
    }

    /// Reads the next line, stripping the `\n` or `\r\n` terminator.
    ///
    /// Returns `Ok(None)` at end of stream; further calls keep returning
    /// `Ok(None)`.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if self.inner.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        let line = String::from_utf8(buf)
            .map_err(|_| Error::DataLoss("line is not valid UTF-8".into()))?;
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_read_lines() {
        let source = ByteSource::memory(b"one\ntwo\r\nthree".to_vec());
        let mut stream = LineStream::new(source, Compression::None);
        assert_eq!(stream.read_line().unwrap(), Some("one".to_string()));
        assert_eq!(stream.read_line().unwrap(), Some("two".to_string()));
        assert_eq!(stream.read_line().unwrap(), Some("three".to_string()));
        assert_eq!(stream.read_line().unwrap(), None);
        // End of stream is sticky.
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_lines_gzip() {
        let source = ByteSource::memory(gzip(b"alpha\nbeta\n"));
        let mut stream = LineStream::new(source, Compression::Gzip);
        assert_eq!(stream.read_line().unwrap(), Some("alpha".to_string()));
        assert_eq!(stream.read_line().unwrap(), Some("beta".to_string()));
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_sniff_dispatches_on_magic() {
        let mut source = ByteSource::memory(gzip(b"x\n"));
        assert_eq!(Compression::detect(&mut source).unwrap(), Compression::Gzip);
        let mut stream = LineStream::sniff(source).unwrap();
        assert_eq!(stream.read_line().unwrap(), Some("x".to_string()));

        let mut source = ByteSource::memory(b"x\n".to_vec());
        assert_eq!(Compression::detect(&mut source).unwrap(), Compression::None);
        let mut stream = LineStream::sniff(source).unwrap();
        assert_eq!(stream.read_line().unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_detect_short_input() {
        let mut source = ByteSource::memory(b"\x1f".to_vec());
        assert_eq!(Compression::detect(&mut source).unwrap(), Compression::None);
    }

    #[test]
    fn test_compression_from_path() {
        assert_eq!(Compression::from_path("reads.fastq.gz"), Compression::Gzip);
        assert_eq!(Compression::from_path("reads.fastq.bgz"), Compression::Gzip);
        assert_eq!(Compression::from_path("reads.fastq"), Compression::None);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = ByteSource::open("/no/such/file.bed").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
