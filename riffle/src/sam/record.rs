use std::io;

use noodles::sam::{
    self,
    alignment::record::{
        cigar::op::Kind,
        data::field::{value::Array, Tag, Value},
        Cigar as _, Data as _, Flags, QualityScores as _, Sequence as _,
    },
};

/// One CIGAR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub kind: Kind,
    pub len: usize,
}

impl CigarOp {
    /// Whether this operation consumes reference bases.
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self.kind,
            Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
        )
    }
}

/// A decoded auxiliary tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxValue {
    Character(char),
    Int(i64),
    Float(f32),
    String(String),
    Hex(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f32>),
}

impl AuxValue {
    fn from_value(value: &Value<'_>) -> io::Result<Self> {
        let value = match value {
            Value::Character(c) => Self::Character(char::from(*c)),
            Value::Int8(v) => Self::Int(i64::from(*v)),
            Value::UInt8(v) => Self::Int(i64::from(*v)),
            Value::Int16(v) => Self::Int(i64::from(*v)),
            Value::UInt16(v) => Self::Int(i64::from(*v)),
            Value::Int32(v) => Self::Int(i64::from(*v)),
            Value::UInt32(v) => Self::Int(i64::from(*v)),
            Value::Float(v) => Self::Float(*v),
            Value::String(s) => Self::String(s.to_string()),
            Value::Hex(s) => Self::Hex(s.to_string()),
            Value::Array(array) => match array {
                Array::Int8(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::UInt8(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::Int16(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::UInt16(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::Int32(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::UInt32(values) => Self::IntArray(
                    values
                        .iter()
                        .map(|result| result.map(i64::from))
                        .collect::<io::Result<_>>()?,
                ),
                Array::Float(values) => {
                    Self::FloatArray(values.iter().collect::<io::Result<_>>()?)
                }
            },
        };
        Ok(value)
    }
}

/// A sequencer read, decoded from a SAM or BAM record into owned values.
///
/// Positions are 0-based; `alignment_interval` is half-open on the
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub name: Option<String>,
    pub flags: Flags,
    pub reference_name: Option<String>,
    /// 0-based alignment start, if mapped.
    pub position: Option<i64>,
    pub mapping_quality: Option<u8>,
    pub cigar: Vec<CigarOp>,
    pub sequence: String,
    pub qualities: Vec<u8>,
    pub mate_reference_name: Option<String>,
    pub mate_position: Option<i64>,
    pub template_length: i64,
    pub tags: Vec<(Tag, AuxValue)>,
}

impl Default for Read {
    fn default() -> Self {
        Self {
            name: None,
            flags: Flags::UNMAPPED,
            reference_name: None,
            position: None,
            mapping_quality: None,
            cigar: Vec::new(),
            sequence: String::new(),
            qualities: Vec::new(),
            mate_reference_name: None,
            mate_position: None,
            template_length: 0,
            tags: Vec::new(),
        }
    }
}

impl Read {
    /// Decodes a SAM or BAM record, resolving reference sequence ids
    /// against the header.
    pub fn decode(
        header: &sam::Header,
        record: &impl sam::alignment::Record,
    ) -> io::Result<Self> {
        let name = record.name().map(|name| name.to_string());
        let flags = record.flags()?;

        let reference_name = record
            .reference_sequence(header)
            .transpose()?
            .map(|(name, _)| name.to_string());
        let position = record
            .alignment_start()
            .transpose()?
            .map(|pos| pos.get() as i64 - 1);
        let mapping_quality = record.mapping_quality().transpose()?.map(u8::from);

        let mut cigar = Vec::new();
        for result in record.cigar().iter() {
            let op = result?;
            cigar.push(CigarOp {
                kind: op.kind(),
                len: op.len(),
            });
        }

        let sequence = String::from_utf8(record.sequence().iter().collect::<Vec<u8>>())
            .map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "sequence is not valid UTF-8")
            })?;
        let qualities = record
            .quality_scores()
            .iter()
            .collect::<io::Result<Vec<u8>>>()?;

        let mate_reference_name = record
            .mate_reference_sequence(header)
            .transpose()?
            .map(|(name, _)| name.to_string());
        let mate_position = record
            .mate_alignment_start()
            .transpose()?
            .map(|pos| pos.get() as i64 - 1);
        let template_length = i64::from(record.template_length()?);

        let mut tags = Vec::new();
        for result in record.data().iter() {
            let (tag, value) = result?;
            tags.push((tag, AuxValue::from_value(&value)?));
        }

        Ok(Self {
            name,
            flags,
            reference_name,
            position,
            mapping_quality,
            cigar,
            sequence,
            qualities,
            mate_reference_name,
            mate_position,
            template_length,
            tags,
        })
    }

    /// The value of the `RG` tag, if the read carries one.
    pub fn read_group(&self) -> Option<&str> {
        self.tags.iter().find_map(|(tag, value)| match value {
            AuxValue::String(s) if *tag == Tag::READ_GROUP => Some(s.as_str()),
            _ => None,
        })
    }

    /// The 0-based half-open reference interval this read is aligned over,
    /// or `None` if the read is unmapped.
    pub fn alignment_interval(&self) -> Option<(i64, i64)> {
        if self.flags.is_unmapped() {
            return None;
        }
        let start = self.position?;
        let span: i64 = self
            .cigar
            .iter()
            .filter(|op| op.consumes_reference())
            .map(|op| op.len as i64)
            .sum();
        Some((start, start + span))
    }
}
