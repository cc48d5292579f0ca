//! Bounded message queuing for slave-mode bus endpoints.
//!
//! An external bus controller writes byte streams at an endpoint; busmq
//! frames them into messages, keeps the most recent ones in a fixed ring and
//! hands them to a single local reader.
//!
//! # Crate Structure
//!
//! - [`bus`] — Slave event model and a simulated bus controller
//! - [`queue`] — Framing, the message ring, and the delivery interface
//!
//! # Example
//!
//! ```
//! use busmq::bus::{BusAddress, SimulatedBus, Transaction};
//! use busmq::queue::{MessageQueue, QueueConfig};
//!
//! let address = BusAddress::new(0x42).unwrap();
//! let (producer, mut consumer) = MessageQueue::new(QueueConfig::for_address(address))
//!     .unwrap()
//!     .split();
//!
//! let mut bus = SimulatedBus::new(address, producer);
//! bus.apply(&Transaction::Write { address, bytes: vec![0x10, 0x20] });
//!
//! let mut buf = [0u8; 120];
//! let n = consumer.try_pop_into(&mut buf).unwrap();
//! assert_eq!(&buf[..n], &[0x84, 0x10, 0x20]);
//! ```

/// Re-export bus types.
pub mod bus {
    pub use busmq_bus::*;
}

/// Re-export queue types.
pub mod queue {
    pub use busmq_queue::*;
}
