use std::path::PathBuf;

/// Errors raised at the bus boundary.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A slave address does not fit in 7 bits.
    #[error("bus address 0x{0:02x} out of range (max 0x7f)")]
    AddressOutOfRange(u16),

    /// A transaction script line could not be parsed.
    #[error("script line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The transaction script could not be read.
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BusError>;
