//! Streaming readers for SAM and BAM files, with BAI-indexed region
//! queries on BAM.
//!
//! The format is dispatched on magic bytes: a BGZF (gzip) framing means
//! BAM, anything else is parsed as SAM text. Both paths decode into the
//! same owned [`Read`] record type and share the [`SamReaderOptions`]
//! filtering surface.

pub mod query;
pub mod record;
pub mod sampler;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use noodles::bam::{self, bai};
use noodles::core::{region::Interval, Position};
use noodles::csi::BinningIndex as _;
use noodles::sam;

use crate::error::{Error, Result};
use crate::util::source::{ByteSource, Compression, LINE_BUFFER_SIZE};

pub use query::{QueryRecords, Range};
pub use record::{AuxValue, CigarOp, Read};
pub use sampler::FractionalSampler;

/// Whether and how to load a BAI index alongside a BAM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Never look for an index; queries are unavailable.
    None,
    /// Load the index if a sidecar file exists.
    #[default]
    LoadIfPresent,
    /// Fail to open when no index is found.
    Require,
}

/// Flag and quality conditions a read must satisfy to be yielded.
///
/// Each `keep_*` knob defaults to dropping the matching reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadRequirements {
    /// Drop mapped reads with mapping quality below this value.
    pub min_mapping_quality: Option<u8>,
    pub keep_duplicates: bool,
    pub keep_failed_vendor_quality_checks: bool,
    pub keep_secondary_alignments: bool,
    pub keep_supplementary_alignments: bool,
    pub keep_unaligned: bool,
}

/// Options controlling SAM/BAM reading and filtering.
#[derive(Debug, Clone, Default)]
pub struct SamReaderOptions {
    pub index_mode: IndexMode,
    /// When set, reads failing the requirements are silently skipped.
    pub read_requirements: Option<ReadRequirements>,
    /// Drop unmapped reads regardless of `read_requirements`.
    pub aligned_reads_only: bool,
    /// When set, keep only reads whose `RG` tag is in the set.
    pub read_group_whitelist: Option<HashSet<String>>,
    /// Keep each read with this probability; `0.0` disables downsampling.
    pub downsample_fraction: f64,
    /// Seed for the downsampling generator.
    pub random_seed: u64,
}

pub(crate) enum SamSource {
    Sam(sam::io::Reader<Box<dyn BufRead>>),
    Bam(bam::io::Reader<noodles::bgzf::Reader<ByteSource>>),
}

impl fmt::Debug for SamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sam(_) => f.write_str("Sam"),
            Self::Bam(_) => f.write_str("Bam"),
        }
    }
}

/// A streaming reader over a SAM or BAM file.
pub struct SamReader {
    options: SamReaderOptions,
    header: sam::Header,
    source: Option<SamSource>,
    index: Option<bai::Index>,
    sampler: Option<RefCell<FractionalSampler>>,
}

impl fmt::Debug for SamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamReader")
            .field("options", &self.options)
            .field("source", &self.source)
            .field("has_index", &self.index.is_some())
            .finish_non_exhaustive()
    }
}

impl SamReader {
    /// Opens a SAM or BAM file, dispatching on the leading magic bytes.
    ///
    /// For BAM, a BAI index is looked up next to the file according to
    /// `options.index_mode`: first `{path}.bai`, then the sibling with the
    /// extension replaced by `.bai`.
    pub fn open<P: AsRef<Path>>(path: P, options: SamReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut source = ByteSource::open(path)?;
        let compression = Compression::detect(&mut source)?;
        let index = match compression {
            Compression::Gzip => load_index(path, options.index_mode)?,
            Compression::None => None,
        };
        Self::new(source, compression, index, options)
    }

    /// Opens a SAM or BAM file held in memory, with an optional pre-loaded
    /// index.
    pub fn from_bytes(
        data: Vec<u8>,
        index: Option<bai::Index>,
        options: SamReaderOptions,
    ) -> Result<Self> {
        let mut source = ByteSource::memory(data);
        let compression = Compression::detect(&mut source)?;
        Self::new(source, compression, index, options)
    }

    fn new(
        source: ByteSource,
        compression: Compression,
        index: Option<bai::Index>,
        options: SamReaderOptions,
    ) -> Result<Self> {
        let sampler = if options.downsample_fraction > 0.0 {
            Some(RefCell::new(FractionalSampler::new(
                options.downsample_fraction,
                options.random_seed,
            )?))
        } else {
            None
        };

        let (header, source) = match compression {
            Compression::Gzip => {
                let mut reader = bam::io::Reader::new(source);
                let header = reader.read_header().map_err(Error::decode)?;
                (header, SamSource::Bam(reader))
            }
            Compression::None => {
                let buffered: Box<dyn BufRead> =
                    Box::new(BufReader::with_capacity(LINE_BUFFER_SIZE, source));
                let mut reader = sam::io::Reader::new(buffered);
                let header = reader.read_header().map_err(Error::decode)?;
                (header, SamSource::Sam(reader))
            }
        };

        Ok(Self {
            options,
            header,
            source: Some(source),
            index,
            sampler,
        })
    }

    /// The parsed SAM header, including the reference sequence dictionary.
    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    /// The options this reader was opened with.
    pub fn options(&self) -> &SamReaderOptions {
        &self.options
    }

    /// Whether an index was loaded, making [`SamReader::query`] available.
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Returns an iterator over all reads passing the configured filters,
    /// in file order.
    pub fn iterate(&mut self) -> Result<SamRecords<'_>> {
        if self.source.is_none() {
            return Err(Error::FailedPrecondition(
                "cannot iterate a closed SAM reader".into(),
            ));
        }
        Ok(SamRecords {
            reader: self,
            done: false,
        })
    }

    /// Returns an iterator over reads overlapping a 0-based half-open
    /// region, in file order. Requires a BAM source with a loaded index.
    pub fn query(&mut self, range: &Range) -> Result<QueryRecords<'_>> {
        match self.source {
            None => {
                return Err(Error::FailedPrecondition(
                    "cannot query a closed SAM reader".into(),
                ))
            }
            Some(SamSource::Sam(_)) => {
                return Err(Error::FailedPrecondition(
                    "range queries require a BAM source".into(),
                ))
            }
            Some(SamSource::Bam(_)) => {}
        }
        let index = self.index.as_ref().ok_or_else(|| {
            Error::FailedPrecondition("range queries require a loaded index".into())
        })?;

        let tid = self
            .header
            .reference_sequences()
            .get_index_of(range.reference_name.as_bytes())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown reference sequence {:?}",
                    range.reference_name
                ))
            })?;
        let (_, reference) = self
            .header
            .reference_sequences()
            .get_index(tid)
            .ok_or_else(|| Error::InvalidArgument("reference sequence vanished".into()))?;
        let reference_len = usize::from(reference.length()) as i64;

        if range.start < 0 || range.start > range.end || range.end > reference_len {
            return Err(Error::InvalidArgument(format!(
                "interval [{}, {}) is not within reference {:?} of length {}",
                range.start, range.end, range.reference_name, reference_len
            )));
        }

        let chunks = if range.start == range.end {
            Vec::new()
        } else {
            let start = Position::try_from((range.start + 1) as usize)
                .map_err(|e| Error::InvalidArgument(e.to_string()))?;
            let end = Position::try_from(range.end as usize)
                .map_err(|e| Error::InvalidArgument(e.to_string()))?;
            index
                .query(tid, Interval::from(start..=end))
                .map_err(Error::decode)?
        };

        Ok(QueryRecords::new(self, chunks, tid, range.start, range.end))
    }

    /// Releases the underlying stream and index. Calling this twice is an
    /// error.
    pub fn close(&mut self) -> Result<()> {
        if self.source.take().is_none() {
            return Err(Error::FailedPrecondition(
                "SAM reader is already closed".into(),
            ));
        }
        self.index = None;
        Ok(())
    }

    /// Whether a decoded read passes the configured filters.
    ///
    /// This is the predicate both [`SamReader::iterate`] and
    /// [`SamReader::query`] apply before surfacing a read. With
    /// downsampling enabled each call advances the sampler, so probing a
    /// read here is not free of side effects.
    pub fn keep_read(&self, read: &Read) -> bool {
        let flags = read.flags;
        if let Some(requirements) = &self.options.read_requirements {
            if !requirements.keep_duplicates && flags.is_duplicate() {
                return false;
            }
            if !requirements.keep_failed_vendor_quality_checks && flags.is_qc_fail() {
                return false;
            }
            if !requirements.keep_secondary_alignments && flags.is_secondary() {
                return false;
            }
            if !requirements.keep_supplementary_alignments && flags.is_supplementary() {
                return false;
            }
            if !requirements.keep_unaligned && flags.is_unmapped() {
                return false;
            }
            if !flags.is_unmapped() {
                if let Some(min) = requirements.min_mapping_quality {
                    if read.mapping_quality.map_or(true, |mapq| mapq < min) {
                        return false;
                    }
                }
            }
        }
        if self.options.aligned_reads_only && flags.is_unmapped() {
            return false;
        }
        if let Some(whitelist) = &self.options.read_group_whitelist {
            match read.read_group() {
                Some(read_group) if whitelist.contains(read_group) => {}
                _ => return false,
            }
        }
        if let Some(sampler) = &self.sampler {
            if !sampler.borrow_mut().keep() {
                return false;
            }
        }
        true
    }
}

impl Drop for SamReader {
    fn drop(&mut self) {
        if self.source.is_some() {
            if let Err(e) = self.close() {
                log::warn!("error closing SAM reader: {e}");
            }
        }
    }
}

fn load_index(path: &Path, mode: IndexMode) -> Result<Option<bai::Index>> {
    if mode == IndexMode::None {
        return Ok(None);
    }
    let mut appended = path.as_os_str().to_owned();
    appended.push(".bai");
    let candidates = [PathBuf::from(appended), path.with_extension("bai")];
    for candidate in candidates {
        if candidate.exists() {
            return Ok(Some(bai::read(candidate)?));
        }
    }
    match mode {
        IndexMode::Require => Err(Error::NotFound(format!(
            "no BAI index found for {}",
            path.display()
        ))),
        _ => Ok(None),
    }
}

/// Iterator over the reads of a [`SamReader`].
#[derive(Debug)]
pub struct SamRecords<'r> {
    reader: &'r mut SamReader,
    done: bool,
}

impl SamRecords<'_> {
    fn read_next(&mut self) -> Result<Option<Read>> {
        loop {
            let reader = &mut *self.reader;
            let source = match reader.source.as_mut() {
                Some(source) => source,
                None => return Ok(None),
            };
            let read = match source {
                SamSource::Sam(sam_reader) => {
                    let mut record = sam::Record::default();
                    if sam_reader.read_record(&mut record).map_err(Error::decode)? == 0 {
                        return Ok(None);
                    }
                    Read::decode(&reader.header, &record).map_err(Error::decode)?
                }
                SamSource::Bam(bam_reader) => {
                    let mut record = bam::Record::default();
                    if bam_reader.read_record(&mut record).map_err(Error::decode)? == 0 {
                        return Ok(None);
                    }
                    Read::decode(&reader.header, &record).map_err(Error::decode)?
                }
            };
            if reader.keep_read(&read) {
                return Ok(Some(read));
            }
        }
    }
}

impl Iterator for SamRecords<'_> {
    type Item = Result<Read>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(read)) => Some(Ok(read)),
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
