use std::fmt;
use std::str::FromStr;

use crate::error::{BusError, Result};

/// Largest 7-bit slave address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// A 7-bit slave address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress(u8);

impl BusAddress {
    /// Create an address, rejecting anything wider than 7 bits.
    pub fn new(raw: u16) -> Result<Self> {
        if raw > MAX_ADDRESS as u16 {
            return Err(BusError::AddressOutOfRange(raw));
        }
        Ok(Self(raw as u8))
    }

    /// Build an address from the low 7 bits of `raw`.
    pub const fn from_low_bits(raw: u8) -> Self {
        Self(raw & MAX_ADDRESS)
    }

    /// The raw 7-bit value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The address byte a controller puts on the wire for a write.
    ///
    /// The bus layer swallows this byte, so endpoints that want to keep it
    /// have to synthesize it themselves.
    pub fn header_byte(self) -> u8 {
        self.0 << 1
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl FromStr for BusAddress {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = parse_hex_u16(s).ok_or_else(|| BusError::Parse {
            line: 0,
            message: format!("invalid address: {s}"),
        })?;
        Self::new(raw)
    }
}

/// Parse a hexadecimal number with an optional `0x` prefix.
pub(crate) fn parse_hex_u16(s: &str) -> Option<u16> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}
