//! Delivery trace hooks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Observes messages as they are handed to the consumer.
///
/// Called on the consumer's thread after the ring lock is released. Must not
/// block.
pub trait TraceHook: Send + Sync {
    fn delivered(&self, bus_id: u32, bytes: &[u8]);
}

const ROW_SIZE: usize = 16;

/// Hex-dumps delivered messages through `tracing` for one bus instance.
///
/// Both the switch and the match key can be flipped while the queue runs.
#[derive(Debug, Default)]
pub struct HexDumpTrace {
    enabled: AtomicBool,
    bus_id: AtomicU32,
}

impl HexDumpTrace {
    pub fn new(enabled: bool, bus_id: u32) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            bus_id: AtomicU32::new(bus_id),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_bus_id(&self, bus_id: u32) {
        self.bus_id.store(bus_id, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn bus_id(&self) -> u32 {
        self.bus_id.load(Ordering::Relaxed)
    }

    /// True when a message from `bus_id` would be dumped.
    pub fn matches(&self, bus_id: u32) -> bool {
        self.is_enabled() && self.bus_id() == bus_id
    }
}

impl TraceHook for HexDumpTrace {
    fn delivered(&self, bus_id: u32, bytes: &[u8]) {
        if !self.matches(bus_id) {
            return;
        }
        for line in hex_dump_lines(bytes) {
            tracing::info!(target: "busmq::dump", "bus_id:{bus_id}: {line}");
        }
    }
}

/// Format `bytes` as 16-byte rows of hex followed by printable ASCII.
pub fn hex_dump_lines(bytes: &[u8]) -> impl Iterator<Item = String> + '_ {
    bytes.chunks(ROW_SIZE).map(|row| {
        let hex = row
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = row
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        format!("{hex:<width$}  {ascii}", width = ROW_SIZE * 3 - 1)
    })
}
