use bytes::{BufMut, BytesMut};

/// Fixed-capacity storage for one framed message.
///
/// The backing allocation is made once and reused for every message written
/// into it; `clear` keeps the capacity and `push` never grows past it.
#[derive(Debug)]
pub struct MessageBuffer {
    bytes: BytesMut,
    capacity: usize,
}

impl MessageBuffer {
    /// Allocate an empty buffer that holds up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of bytes this buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when another byte would not fit.
    pub fn is_full(&self) -> bool {
        self.bytes.len() >= self.capacity
    }

    /// The valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Drop the contents, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Start a new message whose first byte is `header`.
    pub(crate) fn begin(&mut self, header: u8) {
        self.bytes.clear();
        self.bytes.put_u8(header);
    }

    /// Append one byte. Returns false, storing nothing, when full.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.bytes.put_u8(byte);
        true
    }

    /// Copy the message into `dst`. Returns `None` when `dst` is too short.
    pub(crate) fn copy_to(&self, dst: &mut [u8]) -> Option<usize> {
        let len = self.bytes.len();
        let out = dst.get_mut(..len)?;
        out.copy_from_slice(&self.bytes);
        Some(len)
    }
}
