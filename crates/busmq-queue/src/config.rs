use busmq_bus::BusAddress;

use crate::error::ConfigError;

/// Default number of ring slots.
pub const DEFAULT_SLOT_COUNT: usize = 32;

/// Default bytes per message, header byte included.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 120;

/// Header byte plus one payload byte.
pub const MIN_MESSAGE_CAPACITY: usize = 2;

/// Default own address.
pub const DEFAULT_ADDRESS: BusAddress = BusAddress::from_low_bits(0x10);

/// Fixed-at-construction queue parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Address this endpoint answers to; its write header is stored as
    /// byte 0 of every message.
    pub own_address: BusAddress,
    /// Number of committed-message slots. Must be a power of two.
    pub slot_count: usize,
    /// Bytes per message, header byte included.
    pub message_capacity: usize,
    /// Bus instance number, matched by delivery trace hooks.
    pub bus_id: u32,
}

impl QueueConfig {
    /// Config for `own_address` with default sizing.
    pub fn for_address(own_address: BusAddress) -> Self {
        Self {
            own_address,
            ..Self::default()
        }
    }

    /// Check the sizing constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.slot_count.is_power_of_two() {
            return Err(ConfigError::SlotCountNotPowerOfTwo(self.slot_count));
        }
        if self.message_capacity < MIN_MESSAGE_CAPACITY {
            return Err(ConfigError::MessageCapacityTooSmall {
                capacity: self.message_capacity,
                min: MIN_MESSAGE_CAPACITY,
            });
        }
        Ok(())
    }

    /// Total message storage the ring reserves.
    pub fn storage_size(&self) -> usize {
        self.slot_count.saturating_mul(self.message_capacity)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            own_address: DEFAULT_ADDRESS,
            slot_count: DEFAULT_SLOT_COUNT,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            bus_id: 0,
        }
    }
}
