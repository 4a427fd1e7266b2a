//! A streaming reader for FASTQ files, plain or gzip-compressed.
//!
//! Each record is four lines: an `@`-prefixed header, the bases, a
//! `+`-prefixed separator, and the quality string. A stream that ends
//! partway through a record is malformed.

pub mod record;

use std::path::Path;

use crate::error::{Error, Result};
use crate::util::source::{ByteSource, Compression, LineStream};

pub use record::FastqRecord;

/// Options controlling how a FASTQ source is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastqReaderOptions {
    pub compression: Compression,
}

impl FastqReaderOptions {
    /// Infers compression from the path's extension.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            compression: Compression::from_path(path),
        }
    }
}

/// A streaming FASTQ reader.
#[derive(Debug)]
pub struct FastqReader {
    stream: Option<LineStream>,
}

impl FastqReader {
    /// Opens a FASTQ file with the given options.
    pub fn open<P: AsRef<Path>>(path: P, options: FastqReaderOptions) -> Result<Self> {
        let source = ByteSource::open(path)?;
        Ok(Self {
            stream: Some(LineStream::new(source, options.compression)),
        })
    }

    /// Opens a FASTQ file held in memory, sniffing compression from the
    /// magic bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self {
            stream: Some(LineStream::sniff(ByteSource::memory(data))?),
        })
    }

    /// Returns an iterator over the file's records.
    pub fn iterate(&mut self) -> Result<FastqRecords<'_>> {
        if self.stream.is_none() {
            return Err(Error::FailedPrecondition(
                "cannot iterate a closed FASTQ reader".into(),
            ));
        }
        Ok(FastqRecords {
            reader: self,
            done: false,
        })
    }

    /// Releases the underlying stream. Calling this twice is an error.
    pub fn close(&mut self) -> Result<()> {
        if self.stream.take().is_none() {
            return Err(Error::FailedPrecondition(
                "FASTQ reader is already closed".into(),
            ));
        }
        Ok(())
    }
}

impl Drop for FastqReader {
    fn drop(&mut self) {
        if self.stream.is_some() {
            if let Err(e) = self.close() {
                log::warn!("error closing FASTQ reader: {e}");
            }
        }
    }
}

/// Iterator over the records of a [`FastqReader`].
#[derive(Debug)]
pub struct FastqRecords<'r> {
    reader: &'r mut FastqReader,
    done: bool,
}

impl FastqRecords<'_> {
    fn read_record(&mut self) -> Result<Option<FastqRecord>> {
        let stream = match self.reader.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(None),
        };
        let header = match stream.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let mut rest = Vec::with_capacity(3);
        for _ in 0..3 {
            match stream.read_line()? {
                Some(line) => rest.push(line),
                None => {
                    return Err(Error::DataLoss(
                        "FASTQ stream ended in the middle of a record".into(),
                    ))
                }
            }
        }
        let quality = rest.pop().unwrap_or_default();
        let pad = rest.pop().unwrap_or_default();
        let sequence = rest.pop().unwrap_or_default();
        FastqRecord::from_lines(header, sequence, pad, quality).map(Some)
    }
}

impl Iterator for FastqRecords<'_> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;

    use super::*;

    const TWO_READS: &str = "\
@read1 sample=A
ACGTACGT
+
IIIIIIII
@read2
TTTT
+read2
FFFF
";

    fn collect(reader: &mut FastqReader) -> Vec<FastqRecord> {
        reader
            .iterate()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_iterate() {
        let mut reader = FastqReader::from_bytes(TWO_READS.into()).unwrap();
        let records = collect(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "read1");
        assert_eq!(records[0].description.as_deref(), Some("sample=A"));
        assert_eq!(records[0].sequence, "ACGTACGT");
        assert_eq!(records[1].id, "read2");
        assert_eq!(records[1].description, None);
        assert_eq!(records[1].quality, "FFFF");
    }

    #[test]
    fn test_iterate_gzipped() {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(TWO_READS.as_bytes()).unwrap();
        let data = encoder.finish().unwrap();

        let mut reader = FastqReader::from_bytes(data).unwrap();
        let records = collect(&mut reader);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_truncated_record_is_data_loss() {
        let data = "@read1\nACGT\n+\nIIII\n@read2\nTTTT\n";
        let mut reader = FastqReader::from_bytes(data.into()).unwrap();
        let results: Vec<_> = reader.iterate().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::DataLoss(_))));
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let mut reader = FastqReader::from_bytes(Vec::new()).unwrap();
        assert!(reader.iterate().unwrap().next().is_none());
    }

    #[test]
    fn test_close_twice_fails() {
        let mut reader = FastqReader::from_bytes(TWO_READS.into()).unwrap();
        reader.close().unwrap();
        assert!(matches!(
            reader.iterate().unwrap_err(),
            Error::FailedPrecondition(_)
        ));
        assert!(matches!(
            reader.close().unwrap_err(),
            Error::FailedPrecondition(_)
        ));
    }

    #[test]
    fn test_for_path_infers_compression() {
        assert_eq!(
            FastqReaderOptions::for_path("x.fastq.gz").compression,
            Compression::Gzip
        );
        assert_eq!(
            FastqReaderOptions::for_path("x.fastq").compression,
            Compression::None
        );
    }
}
