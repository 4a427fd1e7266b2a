use crate::error::{Error, Result};

/// Field counts a BED file may carry per the UCSC specification.
pub const VALID_NUM_FIELDS: [usize; 7] = [3, 4, 5, 6, 8, 9, 12];

/// Orientation of a BED interval on the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strand {
    Forward,
    Reverse,
    /// The strand column held `.`, or the file has no strand column.
    #[default]
    None,
}

/// A single interval parsed from a BED line.
///
/// Only the first three fields are mandatory. The rest are populated when the
/// file carries enough columns, in BED column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BedRecord {
    pub reference_name: String,
    /// 0-based inclusive start.
    pub start: i64,
    /// 0-based exclusive end.
    pub end: i64,
    pub name: Option<String>,
    pub score: Option<f64>,
    pub strand: Option<Strand>,
    pub thick_start: Option<i64>,
    pub thick_end: Option<i64>,
    pub item_rgb: Option<String>,
    pub block_count: Option<i32>,
    pub block_sizes: Option<String>,
    pub block_starts: Option<String>,
}

fn parse_i64(s: &str, strict: bool) -> Result<i64> {
    match s.parse() {
        Ok(v) => Ok(v),
        Err(_) if !strict => Ok(0),
        Err(_) => Err(Error::DataLoss(format!("invalid integer field: {s:?}"))),
    }
}

fn parse_i32(s: &str, strict: bool) -> Result<i32> {
    match s.parse() {
        Ok(v) => Ok(v),
        Err(_) if !strict => Ok(0),
        Err(_) => Err(Error::DataLoss(format!("invalid integer field: {s:?}"))),
    }
}

fn parse_f64(s: &str, strict: bool) -> Result<f64> {
    match s.parse() {
        Ok(v) => Ok(v),
        Err(_) if !strict => Ok(0.0),
        Err(_) => Err(Error::DataLoss(format!("invalid numeric field: {s:?}"))),
    }
}

fn parse_strand(s: &str) -> Result<Strand> {
    match s {
        "+" => Ok(Strand::Forward),
        "-" => Ok(Strand::Reverse),
        "." => Ok(Strand::None),
        _ => Err(Error::DataLoss(format!("invalid strand field: {s:?}"))),
    }
}

impl BedRecord {
    /// Parses a tab-delimited BED line, returning the record together with
    /// the number of fields the line carried.
    ///
    /// `desired_num_fields`, when nonzero, narrows the record to its first
    /// that-many columns. Numeric fields that fail to parse become zero
    /// unless `strict` is set.
    pub(crate) fn parse_line(
        line: &str,
        desired_num_fields: usize,
        strict: bool,
    ) -> Result<(Self, usize)> {
        let fields: Vec<&str> = line.split('\t').collect();
        let found = fields.len();
        if !VALID_NUM_FIELDS.contains(&found) {
            return Err(Error::DataLoss(format!(
                "BED line has {found} fields, expected one of {VALID_NUM_FIELDS:?}"
            )));
        }

        let num_fields = if desired_num_fields > 0 {
            desired_num_fields.min(found)
        } else {
            found
        };

        let mut record = Self {
            reference_name: fields[0].to_string(),
            start: parse_i64(fields[1], strict)?,
            end: parse_i64(fields[2], strict)?,
            ..Self::default()
        };

        if num_fields > 3 {
            record.name = Some(fields[3].to_string());
        }
        if num_fields > 4 {
            record.score = Some(parse_f64(fields[4], strict)?);
        }
        if num_fields > 5 {
            record.strand = Some(parse_strand(fields[5])?);
        }
        if num_fields > 7 {
            record.thick_start = Some(parse_i64(fields[6], strict)?);
            record.thick_end = Some(parse_i64(fields[7], strict)?);
        }
        if num_fields > 8 {
            record.item_rgb = Some(fields[8].to_string());
        }
        if num_fields >= 12 {
            record.block_count = Some(parse_i32(fields[9], strict)?);
            record.block_sizes = Some(fields[10].to_string());
            record.block_starts = Some(fields[11].to_string());
        }

        Ok((record, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let (record, found) = BedRecord::parse_line("chr1\t10\t20", 0, false).unwrap();
        assert_eq!(found, 3);
        assert_eq!(record.reference_name, "chr1");
        assert_eq!(record.start, 10);
        assert_eq!(record.end, 20);
        assert_eq!(record.name, None);
    }

    #[test]
    fn test_parse_twelve_fields() {
        let line = "chr7\t127471196\t127472363\tPos1\t0\t+\t127471196\t127472363\t255,0,0\t2\t100,200\t0,900";
        let (record, found) = BedRecord::parse_line(line, 0, false).unwrap();
        assert_eq!(found, 12);
        assert_eq!(record.name.as_deref(), Some("Pos1"));
        assert_eq!(record.score, Some(0.0));
        assert_eq!(record.strand, Some(Strand::Forward));
        assert_eq!(record.thick_start, Some(127471196));
        assert_eq!(record.thick_end, Some(127472363));
        assert_eq!(record.item_rgb.as_deref(), Some("255,0,0"));
        assert_eq!(record.block_count, Some(2));
        assert_eq!(record.block_sizes.as_deref(), Some("100,200"));
        assert_eq!(record.block_starts.as_deref(), Some("0,900"));
    }

    #[test]
    fn test_narrowing() {
        let line = "chr1\t10\t20\tfeature\t96.5\t-";
        let (record, found) = BedRecord::parse_line(line, 4, false).unwrap();
        assert_eq!(found, 6);
        assert_eq!(record.name.as_deref(), Some("feature"));
        assert_eq!(record.score, None);
        assert_eq!(record.strand, None);
    }

    #[test]
    fn test_invalid_field_count() {
        let err = BedRecord::parse_line("chr1\t10\t20\ta\tb\tc\td", 0, false).unwrap_err();
        assert!(matches!(err, Error::DataLoss(_)));
    }

    #[test]
    fn test_permissive_numeric_parsing() {
        let (record, _) = BedRecord::parse_line("chr1\tgarbage\t20\tx\tNaNish", 0, false).unwrap();
        assert_eq!(record.start, 0);
        assert_eq!(record.score, Some(0.0));
    }

    #[test]
    fn test_strict_numeric_parsing() {
        let err = BedRecord::parse_line("chr1\tgarbage\t20", 0, true).unwrap_err();
        assert!(matches!(err, Error::DataLoss(_)));
    }

    #[test]
    fn test_bad_strand_always_fails() {
        let err = BedRecord::parse_line("chr1\t10\t20\tx\t0\t*", 0, false).unwrap_err();
        assert!(matches!(err, Error::DataLoss(_)));
    }
}
