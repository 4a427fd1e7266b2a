//! **riffle** streams records out of common genomics file formats: BED and
//! FASTQ text (plain or gzipped) and SAM/BAM alignments, with BAI-indexed
//! region queries on BAM.
//!
pub mod bed;
pub mod error;
pub mod fastq;
pub mod sam;
pub mod util;

pub use error::{Error, Result};
