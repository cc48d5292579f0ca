//! Framing state machine: the producer role.
//!
//! Runs in the bus layer's event context. Every entry point runs to
//! completion without blocking or allocating; the ring lock is taken only to
//! commit.

use std::sync::Arc;

use busmq_bus::{EventReply, SlaveEvent, SlaveHandler, READ_FILL_BYTE};

use crate::buffer::MessageBuffer;
use crate::config::{QueueConfig, MIN_MESSAGE_CAPACITY};
use crate::error::{QueueError, Result};
use crate::ring::Shared;

/// What a `Stop` did with the in-progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Message moved into the ring. `evicted` is set when the oldest unread
    /// message was dropped to make room.
    Committed { evicted: bool },
    /// Message overflowed its slot and was discarded.
    DiscardedTruncated,
    /// Nothing beyond the header was received.
    DiscardedRunt,
}

/// Producer-side counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FramingStats {
    /// Write transactions started.
    pub transactions: u64,
    /// Transactions committed to the ring.
    pub committed: u64,
    /// Transactions discarded for exceeding the message capacity.
    pub truncated: u64,
    /// Write transactions discarded for carrying no payload.
    pub runts: u64,
    /// Bytes refused with a NACK.
    pub nacked_bytes: u64,
    /// Read requests answered with the fill byte.
    pub read_requests: u64,
}

/// Frames bus events into messages and commits them.
///
/// Owns the in-progress message and the truncation flag; nothing else reads
/// them.
pub struct Producer {
    shared: Arc<Shared>,
    current: MessageBuffer,
    header: u8,
    truncated: bool,
    in_write: bool,
    stats: FramingStats,
}

impl Producer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let config = shared.config;
        Self {
            current: MessageBuffer::with_capacity(config.message_capacity),
            header: config.own_address.header_byte(),
            truncated: false,
            in_write: false,
            stats: FramingStats::default(),
            shared,
        }
    }

    /// A write transaction to this endpoint started.
    pub fn on_write_requested(&mut self) {
        self.truncated = false;
        self.in_write = true;
        self.stats.transactions += 1;
        self.current.begin(self.header);
    }

    /// One data byte arrived.
    ///
    /// Once a transaction overflows, this and every later byte of the same
    /// transaction is refused with `Truncated`; the bus layer NACKs them.
    pub fn on_byte_received(&mut self, byte: u8) -> Result<()> {
        if !self.truncated && self.current.push(byte) {
            tracing::trace!(byte, len = self.current.len(), "byte received");
            return Ok(());
        }

        if !self.truncated {
            self.truncated = true;
            self.stats.truncated += 1;
            tracing::warn!(
                address = %self.shared.config.own_address,
                capacity = self.current.capacity(),
                "message is truncated"
            );
        }
        self.stats.nacked_bytes += 1;
        Err(QueueError::Truncated {
            capacity: self.current.capacity(),
        })
    }

    /// The controller ended the transaction.
    pub fn on_stop(&mut self) -> StopOutcome {
        let was_write = std::mem::replace(&mut self.in_write, false);

        if self.truncated {
            return StopOutcome::DiscardedTruncated;
        }
        if self.current.len() < MIN_MESSAGE_CAPACITY {
            if was_write {
                self.stats.runts += 1;
                tracing::debug!(len = self.current.len(), "runt message discarded");
            }
            return StopOutcome::DiscardedRunt;
        }

        let (evicted, slot, pending) = {
            let mut state = self.shared.lock();
            let slot = state.ring.write_index();
            let evicted = state.ring.commit(&mut self.current);
            state.counters.committed += 1;
            if evicted {
                state.counters.evicted += 1;
            }
            (evicted, slot, state.ring.len())
        };

        self.stats.committed += 1;
        if evicted {
            tracing::debug!(slot, pending, "ring full, oldest message evicted");
        } else {
            tracing::debug!(slot, pending, "message committed");
        }

        self.shared.notify_ready();
        StopOutcome::Committed { evicted }
    }

    /// The controller wants to read from this endpoint. There is never
    /// anything to return and the ring is not touched.
    pub fn on_read_request(&mut self) -> u8 {
        self.stats.read_requests += 1;
        READ_FILL_BYTE
    }

    /// Producer-side counters.
    pub fn stats(&self) -> FramingStats {
        self.stats
    }

    /// Configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl SlaveHandler for Producer {
    fn handle_event(&mut self, event: SlaveEvent) -> EventReply {
        match event {
            SlaveEvent::WriteRequested => {
                self.on_write_requested();
                EventReply::Ack
            }
            SlaveEvent::WriteReceived(byte) => match self.on_byte_received(byte) {
                Ok(()) => EventReply::Ack,
                Err(_) => EventReply::Nack,
            },
            SlaveEvent::Stop => {
                self.on_stop();
                EventReply::Ack
            }
            SlaveEvent::ReadRequested | SlaveEvent::ReadProcessed => {
                EventReply::Byte(self.on_read_request())
            }
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("address", &self.shared.config.own_address)
            .field("len", &self.current.len())
            .field("truncated", &self.truncated)
            .finish()
    }
}
