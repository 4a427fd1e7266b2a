use std::io;

/// An error produced by a reader in this crate.
///
/// End-of-stream is never an error: iterators signal exhaustion by
/// returning `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path does not exist or could not be opened.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied options or a query range failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted on a closed reader, or a query was issued
    /// without an index.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// A record violated the format's grammar.
    #[error("data loss: {0}")]
    DataLoss(String),

    /// An underlying I/O failure not otherwise classified.
    #[error("internal: {0}")]
    Internal(#[from] io::Error),
}

impl Error {
    /// Classifies an error surfaced while decoding a record: malformed
    /// input is `DataLoss`, anything else stays `Internal`.
    pub(crate) fn decode(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::InvalidData {
            Self::DataLoss(e.to_string())
        } else {
            Self::Internal(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_classification() {
        let e = Error::decode(io::Error::new(io::ErrorKind::InvalidData, "bad record"));
        assert!(matches!(e, Error::DataLoss(_)));

        let e = Error::decode(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(e, Error::Internal(_)));
    }
}
