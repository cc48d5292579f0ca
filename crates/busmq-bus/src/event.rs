//! Slave event vocabulary.
//!
//! Events arrive serialized and run to completion. A handler must not block,
//! sleep, or allocate while servicing one.

/// Byte returned to the controller when an endpoint has nothing to send.
pub const READ_FILL_BYTE: u8 = 0xff;

/// An event raised by the bus layer for the addressed slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveEvent {
    /// The controller started a write transaction to this endpoint.
    WriteRequested,
    /// One data byte was clocked in.
    WriteReceived(u8),
    /// The controller started a read transaction and wants the first byte.
    ReadRequested,
    /// The previous byte was taken; the controller wants another.
    ReadProcessed,
    /// The controller ended the transaction.
    Stop,
}

/// The endpoint's answer to a [`SlaveEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReply {
    /// Event accepted.
    Ack,
    /// Event refused; for a received byte the bus layer NACKs it.
    Nack,
    /// Byte to drive onto the bus for a read request.
    Byte(u8),
}

/// Anything that can sit behind a slave address.
pub trait SlaveHandler {
    /// Service one bus event. Must run to completion without blocking.
    fn handle_event(&mut self, event: SlaveEvent) -> EventReply;
}

impl<H: SlaveHandler + ?Sized> SlaveHandler for &mut H {
    fn handle_event(&mut self, event: SlaveEvent) -> EventReply {
        (**self).handle_event(event)
    }
}

impl<H: SlaveHandler + ?Sized> SlaveHandler for Box<H> {
    fn handle_event(&mut self, event: SlaveEvent) -> EventReply {
        (**self).handle_event(event)
    }
}
