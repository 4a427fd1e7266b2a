use crate::error::{Error, Result};

/// A single FASTQ record: four lines of text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FastqRecord {
    /// The read identifier, up to the first space of the header line.
    pub id: String,
    /// Text after the first space of the header line, if any.
    pub description: Option<String>,
    pub sequence: String,
    /// Phred quality string, same length as the sequence.
    pub quality: String,
}

impl FastqRecord {
    /// Assembles a record from its four raw lines, validating the format's
    /// grammar.
    pub(crate) fn from_lines(
        header: String,
        sequence: String,
        pad: String,
        quality: String,
    ) -> Result<Self> {
        if !header.starts_with('@') || header.len() < 2 {
            return Err(Error::DataLoss(format!(
                "FASTQ header line must start with '@' and name a read: {header:?}"
            )));
        }
        if !pad.starts_with('+') {
            return Err(Error::DataLoss(format!(
                "FASTQ separator line must start with '+': {pad:?}"
            )));
        }
        if sequence.is_empty() {
            return Err(Error::DataLoss("FASTQ record has an empty sequence".into()));
        }
        if sequence.len() != quality.len() {
            return Err(Error::DataLoss(format!(
                "FASTQ sequence and quality lengths differ: {} vs {}",
                sequence.len(),
                quality.len()
            )));
        }

        let (id, description) = match header[1..].split_once(' ') {
            Some((id, description)) => (id.to_string(), Some(description.to_string())),
            None => (header[1..].to_string(), None),
        };

        Ok(Self {
            id,
            description,
            sequence,
            quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(header: &str, seq: &str, pad: &str, qual: &str) -> Result<FastqRecord> {
        FastqRecord::from_lines(header.into(), seq.into(), pad.into(), qual.into())
    }

    #[test]
    fn test_from_lines() {
        let record = lines("@read1 pair=1", "ACGT", "+", "IIII").unwrap();
        assert_eq!(record.id, "read1");
        assert_eq!(record.description.as_deref(), Some("pair=1"));
        assert_eq!(record.sequence, "ACGT");
        assert_eq!(record.quality, "IIII");
    }

    #[test]
    fn test_no_description() {
        let record = lines("@read1", "ACGT", "+read1", "IIII").unwrap();
        assert_eq!(record.id, "read1");
        assert_eq!(record.description, None);
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            lines("read1", "ACGT", "+", "IIII").unwrap_err(),
            Error::DataLoss(_)
        ));
        assert!(matches!(
            lines("@", "ACGT", "+", "IIII").unwrap_err(),
            Error::DataLoss(_)
        ));
    }

    #[test]
    fn test_bad_pad() {
        assert!(matches!(
            lines("@read1", "ACGT", "x", "IIII").unwrap_err(),
            Error::DataLoss(_)
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            lines("@read1", "ACGT", "+", "III").unwrap_err(),
            Error::DataLoss(_)
        ));
    }

    #[test]
    fn test_empty_sequence() {
        assert!(matches!(
            lines("@read1", "", "+", "").unwrap_err(),
            Error::DataLoss(_)
        ));
    }
}
