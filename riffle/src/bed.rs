//! A streaming reader for BED files, plain or gzip-compressed.
//!
//! BED is a tab-delimited text format for genomic intervals carrying 3 to 12
//! columns. The reader discovers the file's column count from its first
//! record line and requires every subsequent line to match it.

pub mod record;

use std::path::Path;

use crate::error::{Error, Result};
use crate::util::source::{ByteSource, LineStream};

pub use record::{BedRecord, Strand, VALID_NUM_FIELDS};

/// Options controlling BED parsing.
#[derive(Debug, Clone, Default)]
pub struct BedReaderOptions {
    /// When nonzero, narrow every record to its first `num_fields` columns.
    /// Must be one of [`VALID_NUM_FIELDS`].
    pub num_fields: usize,
    /// Fail on malformed numeric fields instead of substituting zero.
    pub strict_parsing: bool,
}

/// What the reader learned about the file before yielding records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedHeader {
    /// The column count of the file's first record line.
    pub num_fields: usize,
}

/// A streaming BED reader.
///
/// Lines starting with `#` are treated as comments and skipped wherever they
/// appear. Records are yielded by [`BedReader::iterate`]; the iterator
/// borrows the reader, so a reader cannot be closed while records are still
/// being drawn from it.
#[derive(Debug)]
pub struct BedReader {
    options: BedReaderOptions,
    header: BedHeader,
    stream: Option<LineStream>,
}

impl BedReader {
    /// Opens a BED file, sniffing gzip compression from its magic bytes.
    ///
    /// The file is read once up front to find its column count, then
    /// reopened for iteration.
    pub fn open<P: AsRef<Path>>(path: P, options: BedReaderOptions) -> Result<Self> {
        let mut stream = LineStream::sniff(ByteSource::open(&path)?)?;
        let num_fields = detect_num_fields(&mut stream)?;
        let stream = LineStream::sniff(ByteSource::open(&path)?)?;
        Self::new(stream, num_fields, options)
    }

    /// Opens a BED file held in memory.
    pub fn from_bytes(data: Vec<u8>, options: BedReaderOptions) -> Result<Self> {
        let mut stream = LineStream::sniff(ByteSource::memory(data.clone()))?;
        let num_fields = detect_num_fields(&mut stream)?;
        let stream = LineStream::sniff(ByteSource::memory(data))?;
        Self::new(stream, num_fields, options)
    }

    fn new(stream: LineStream, num_fields: usize, options: BedReaderOptions) -> Result<Self> {
        if options.num_fields != 0 {
            if !VALID_NUM_FIELDS.contains(&options.num_fields) {
                return Err(Error::InvalidArgument(format!(
                    "requested {} fields, expected one of {VALID_NUM_FIELDS:?}",
                    options.num_fields
                )));
            }
            if options.num_fields > num_fields {
                return Err(Error::InvalidArgument(format!(
                    "requested {} fields but the file has {num_fields}",
                    options.num_fields
                )));
            }
        }
        Ok(Self {
            options,
            header: BedHeader { num_fields },
            stream: Some(stream),
        })
    }

    /// The file-level metadata discovered at open time.
    pub fn header(&self) -> &BedHeader {
        &self.header
    }

    /// Returns an iterator over the file's records.
    pub fn iterate(&mut self) -> Result<BedRecords<'_>> {
        if self.stream.is_none() {
            return Err(Error::FailedPrecondition(
                "cannot iterate a closed BED reader".into(),
            ));
        }
        Ok(BedRecords {
            reader: self,
            done: false,
        })
    }

    /// Releases the underlying stream. Calling this twice is an error.
    pub fn close(&mut self) -> Result<()> {
        if self.stream.take().is_none() {
            return Err(Error::FailedPrecondition(
                "BED reader is already closed".into(),
            ));
        }
        Ok(())
    }
}

impl Drop for BedReader {
    fn drop(&mut self) {
        if self.stream.is_some() {
            if let Err(e) = self.close() {
                log::warn!("error closing BED reader: {e}");
            }
        }
    }
}

fn next_non_comment_line(stream: &mut LineStream) -> Result<Option<String>> {
    while let Some(line) = stream.read_line()? {
        if !line.starts_with('#') {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

fn detect_num_fields(stream: &mut LineStream) -> Result<usize> {
    match next_non_comment_line(stream)? {
        Some(line) => Ok(line.split('\t').count()),
        None => Err(Error::DataLoss("BED file has no records".into())),
    }
}

/// Iterator over the records of a [`BedReader`].
#[derive(Debug)]
pub struct BedRecords<'r> {
    reader: &'r mut BedReader,
    done: bool,
}

impl BedRecords<'_> {
    fn read_record(&mut self) -> Result<Option<BedRecord>> {
        let reader = &mut *self.reader;
        let stream = match reader.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(None),
        };
        let line = match next_non_comment_line(stream)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let (record, found) =
            BedRecord::parse_line(&line, reader.options.num_fields, reader.options.strict_parsing)?;
        if found != reader.header.num_fields {
            return Err(Error::DataLoss(format!(
                "BED line has {found} fields but the file started with {}",
                reader.header.num_fields
            )));
        }
        Ok(Some(record))
    }
}

impl Iterator for BedRecords<'_> {
    type Item = Result<BedRecord>;

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
