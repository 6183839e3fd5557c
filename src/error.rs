use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Fewer than two layer sizes, or a zero-width layer.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// An input, target, or gradient does not match the network's shape.
    #[error("dimension mismatch: {what} has len {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Returns `DimensionMismatch` unless `actual == expected`.
#[inline]
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
