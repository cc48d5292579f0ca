//! Slave-mode bus boundary for busmq.
//!
//! A bus layer clocks bytes on and off the wire and raises a small set of
//! events at the endpoint that owns the addressed slave. This crate defines
//! that vocabulary:
//! - [`SlaveEvent`] and [`EventReply`] for the event callback
//! - [`SlaveHandler`], implemented by anything that sits behind an address
//! - [`SimulatedBus`], a controller stand-in that turns whole transactions
//!   into the event sequence a real bus driver would raise
//!
//! Nothing here buffers data. Queuing lives in `busmq-queue`.

pub mod address;
pub mod controller;
pub mod error;
pub mod event;
pub mod script;

pub use address::BusAddress;
pub use controller::{SimulatedBus, Transaction, TransactionOutcome};
pub use error::{BusError, Result};
pub use event::{EventReply, SlaveEvent, SlaveHandler, READ_FILL_BYTE};
pub use script::{load_script, parse_script};
