use std::io;

/// Rejected queue configuration. Only raised at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Slot count must be a non-zero power of two.
    #[error("slot count {0} is not a power of two")]
    SlotCountNotPowerOfTwo(usize),

    /// A message must hold the header byte plus at least one payload byte.
    #[error("message capacity {capacity} too small (min {min})")]
    MessageCapacityTooSmall { capacity: usize, min: usize },
}

/// Errors returned by queue operations. None of them is fatal; the ring keeps
/// operating after each.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// No message is pending.
    #[error("message queue is empty")]
    Empty,

    /// The destination cannot hold the next message. That message is dropped.
    #[error("message of {len} bytes does not fit in {capacity}-byte buffer")]
    Overflow { len: usize, capacity: usize },

    /// A blocking wait was cancelled before data arrived.
    #[error("wait interrupted")]
    Interrupted,

    /// Producer side only: the in-progress message outgrew the slot.
    #[error("message truncated at {capacity} bytes")]
    Truncated { capacity: usize },
}

pub type Result<T> = std::result::Result<T, QueueError>;

impl From<QueueError> for io::Error {
    fn from(err: QueueError) -> Self {
        let kind = match err {
            QueueError::Empty => io::ErrorKind::WouldBlock,
            QueueError::Overflow { .. } => io::ErrorKind::InvalidInput,
            // `Interrupted` is retried by std's read helpers; the interrupt is
            // already consumed, so a retry would block again.
            QueueError::Interrupted => io::ErrorKind::Other,
            QueueError::Truncated { .. } => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}
