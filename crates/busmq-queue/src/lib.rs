//! Bounded message queuing behind a byte-oriented slave bus endpoint.
//!
//! An external controller streams bytes at the endpoint; the [`Producer`]
//! frames them into messages and commits each complete one into a fixed ring
//! of pre-allocated slots. A single [`Consumer`] drains the ring one message
//! per call, in commit order, and can poll or block on readiness.
//!
//! - The producer never waits on the consumer. When the ring is full the
//!   oldest unread message is evicted.
//! - Slots are allocated once at construction; the producer path does not
//!   allocate.
//! - One lock guards the ring indices and slot reuse. It is held only for
//!   index updates and for copying a message out.

pub mod buffer;
pub mod config;
pub mod delivery;
pub mod error;
pub mod framing;
pub mod ring;
pub mod trace;

pub use buffer::MessageBuffer;
pub use config::{
    QueueConfig, DEFAULT_ADDRESS, DEFAULT_MESSAGE_CAPACITY, DEFAULT_SLOT_COUNT,
    MIN_MESSAGE_CAPACITY,
};
pub use delivery::{Consumer, Interrupter, ReadinessProbe};
pub use error::{ConfigError, QueueError, Result};
pub use framing::{FramingStats, Producer, StopOutcome};
pub use ring::{MessageQueue, QueueStats};
pub use trace::{hex_dump_lines, HexDumpTrace, TraceHook};
