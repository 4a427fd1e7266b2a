use std::io;
use std::vec;

use noodles::bam;
use noodles::bgzf::io::Seek as _;
use noodles::bgzf::VirtualPosition;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::sam;

use super::record::Read;
use super::{SamReader, SamSource};
use crate::error::{Error, Result};

/// A 0-based half-open genomic interval on a named reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub reference_name: String,
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn new(reference_name: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            reference_name: reference_name.into(),
            start,
            end,
        }
    }
}

/// Whether a record's alignment overlaps the 0-based half-open interval
/// `[start, end)` on reference sequence `tid`.
pub(super) fn intersects(
    header: &sam::Header,
    record: &impl sam::alignment::Record,
    tid: usize,
    start: i64,
    end: i64,
) -> io::Result<bool> {
    let id = match record.reference_sequence_id(header).transpose()? {
        Some(id) => id,
        None => return Ok(false),
    };
    let (record_start, record_end) = match (
        record.alignment_start().transpose()?,
        record.alignment_end().transpose()?,
    ) {
        (Some(s), Some(e)) => (s.get() as i64 - 1, e.get() as i64),
        _ => return Ok(false),
    };
    Ok(id == tid && record_start < end && record_end > start)
}

#[derive(Debug)]
enum ChunkState {
    Seek,
    Read(VirtualPosition),
    Done,
}

/// Iterator over the reads of a [`SamReader`] region query.
///
/// Walks the virtual position ranges ("chunks") the index reported for the
/// region, keeping only records that actually overlap it and pass the
/// reader's filters.
#[derive(Debug)]
pub struct QueryRecords<'r> {
    reader: &'r mut SamReader,
    chunks: vec::IntoIter<Chunk>,
    state: ChunkState,
    tid: usize,
    start: i64,
    end: i64,
    done: bool,
}

impl<'r> QueryRecords<'r> {
    pub(super) fn new(
        reader: &'r mut SamReader,
        chunks: Vec<Chunk>,
        tid: usize,
        start: i64,
        end: i64,
    ) -> Self {
        Self {
            reader,
            chunks: chunks.into_iter(),
            state: ChunkState::Seek,
            tid,
            start,
            end,
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<Option<Read>> {
        loop {
            match self.state {
                ChunkState::Seek => {
                    self.state = match self.chunks.next() {
                        Some(chunk) => {
                            let reader = &mut *self.reader;
                            match reader.source.as_mut() {
                                Some(SamSource::Bam(bam)) => {
                                    bam.get_mut().seek_to_virtual_position(chunk.start())?;
                                }
                                _ => return Ok(None),
                            }
                            ChunkState::Read(chunk.end())
                        }
                        None => ChunkState::Done,
                    }
                }
                ChunkState::Read(chunk_end) => {
                    let reader = &mut *self.reader;
                    let bam = match reader.source.as_mut() {
                        Some(SamSource::Bam(bam)) => bam,
                        _ => return Ok(None),
                    };
                    if bam.get_ref().virtual_position() >= chunk_end {
                        self.state = ChunkState::Seek;
                        continue;
                    }
                    let mut record = bam::Record::default();
                    if bam.read_record(&mut record).map_err(Error::decode)? == 0 {
                        self.state = ChunkState::Done;
                        continue;
                    }
                    if !intersects(&reader.header, &record, self.tid, self.start, self.end)
                        .map_err(Error::decode)?
                    {
                        continue;
                    }
                    let read = Read::decode(&reader.header, &record).map_err(Error::decode)?;
                    if reader.keep_read(&read) {
                        return Ok(Some(read));
                    }
                }
                ChunkState::Done => return Ok(None),
            }
        }
    }
}

impl Iterator for QueryRecords<'_> {
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

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use noodles::core::Position;
    use noodles::sam::alignment::record::cigar::op::{Kind, Op};
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record_buf::{Cigar as CigarBuf, RecordBuf};
    use noodles::sam::header::record::value::{map::ReferenceSequence, Map};

    use super::*;

    fn header() -> sam::Header {
        sam::Header::builder()
            .add_reference_sequence(
                b"chr1",
                Map::<ReferenceSequence>::new(NonZeroUsize::new(1000).unwrap()),
            )
            .add_reference_sequence(
                b"chr2",
                Map::<ReferenceSequence>::new(NonZeroUsize::new(1000).unwrap()),
            )
            .build()
    }

    fn mapped(tid: usize, start_1based: usize, len: usize) -> RecordBuf {
        let mut record = RecordBuf::default();
        *record.flags_mut() = Flags::empty();
        *record.reference_sequence_id_mut() = Some(tid);
        *record.alignment_start_mut() = Some(Position::try_from(start_1based).unwrap());
        *record.cigar_mut() = CigarBuf::from(vec![Op::new(Kind::Match, len)]);
        record
    }

    #[test]
    fn test_intersects_half_open() {
        let header = header();
        // Alignment covers 0-based [100, 110).
        let record = mapped(0, 101, 10);
        assert!(intersects(&header, &record, 0, 100, 110).unwrap());
        assert!(intersects(&header, &record, 0, 109, 200).unwrap());
        assert!(intersects(&header, &record, 0, 0, 101).unwrap());
        // Abutting intervals do not overlap.
        assert!(!intersects(&header, &record, 0, 110, 200).unwrap());
        assert!(!intersects(&header, &record, 0, 0, 100).unwrap());
    }

    #[test]
    fn test_intersects_other_reference() {
        let header = header();
        let record = mapped(1, 101, 10);
        assert!(!intersects(&header, &record, 0, 0, 1000).unwrap());
        assert!(intersects(&header, &record, 1, 0, 1000).unwrap());
    }

    #[test]
    fn test_unmapped_never_intersects() {
        let header = header();
        let record = RecordBuf::default();
        assert!(!intersects(&header, &record, 0, 0, 1000).unwrap());
    }
}
