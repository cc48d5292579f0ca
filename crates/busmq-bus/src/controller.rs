use crate::address::BusAddress;
use crate::event::{EventReply, SlaveEvent, SlaveHandler, READ_FILL_BYTE};

/// One controller-level transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Write `bytes` to the slave at `address`.
    Write { address: BusAddress, bytes: Vec<u8> },
    /// Read `len` bytes from the slave at `address`.
    Read { address: BusAddress, len: usize },
}

impl Transaction {
    /// Target address of this transaction.
    pub fn address(&self) -> BusAddress {
        match self {
            Transaction::Write { address, .. } | Transaction::Read { address, .. } => *address,
        }
    }
}

/// What the controller observed while running a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Nobody answered the address; no events were raised.
    NoDevice,
    /// Write finished; per-byte acknowledge counts.
    Write { acked: usize, nacked: usize },
    /// Read finished with the bytes the slave drove.
    Read { bytes: Vec<u8> },
}

/// A bus controller stand-in with a single slave attached.
///
/// It raises exactly the event sequence a slave-mode bus driver raises:
/// `WriteRequested`, one `WriteReceived` per byte, `Stop` for writes, and
/// `ReadRequested`, `ReadProcessed`..., `Stop` for reads.
pub struct SimulatedBus<H> {
    address: BusAddress,
    handler: H,
}

impl<H: SlaveHandler> SimulatedBus<H> {
    /// Attach `handler` at `address`.
    pub fn new(address: BusAddress, handler: H) -> Self {
        Self { address, handler }
    }

    /// Run one transaction against the attached slave.
    pub fn apply(&mut self, transaction: &Transaction) -> TransactionOutcome {
        if transaction.address() != self.address {
            tracing::trace!(
                target_address = %transaction.address(),
                slave_address = %self.address,
                "no slave at address"
            );
            return TransactionOutcome::NoDevice;
        }

        match transaction {
            Transaction::Write { bytes, .. } => self.write(bytes),
            Transaction::Read { len, .. } => self.read(*len),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> TransactionOutcome {
        let mut acked = 0usize;
        let mut nacked = 0usize;

        self.handler.handle_event(SlaveEvent::WriteRequested);
        for &byte in bytes {
            match self.handler.handle_event(SlaveEvent::WriteReceived(byte)) {
                EventReply::Nack => nacked += 1,
                EventReply::Ack | EventReply::Byte(_) => acked += 1,
            }
        }
        self.handler.handle_event(SlaveEvent::Stop);

        TransactionOutcome::Write { acked, nacked }
    }

    fn read(&mut self, len: usize) -> TransactionOutcome {
        let mut bytes = Vec::with_capacity(len);

        for i in 0..len {
            let event = if i == 0 {
                SlaveEvent::ReadRequested
            } else {
                SlaveEvent::ReadProcessed
            };
            let byte = match self.handler.handle_event(event) {
                EventReply::Byte(value) => value,
                EventReply::Ack | EventReply::Nack => READ_FILL_BYTE,
            };
            bytes.push(byte);
        }
        self.handler.handle_event(SlaveEvent::Stop);

        TransactionOutcome::Read { bytes }
    }

    /// Borrow the attached slave.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Detach and return the slave.
    pub fn into_handler(self) -> H {
        self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<SlaveEvent>,
        nack_after: Option<usize>,
        received: usize,
    }

    impl SlaveHandler for Recorder {
        fn handle_event(&mut self, event: SlaveEvent) -> EventReply {
            self.events.push(event);
            match event {
                SlaveEvent::WriteReceived(_) => {
                    self.received += 1;
                    match self.nack_after {
                        Some(limit) if self.received > limit => EventReply::Nack,
                        _ => EventReply::Ack,
                    }
                }
                SlaveEvent::ReadRequested | SlaveEvent::ReadProcessed => {
                    EventReply::Byte(self.events.len() as u8)
                }
                _ => EventReply::Ack,
            }
        }
    }

    fn addr(raw: u16) -> BusAddress {
        BusAddress::new(raw).unwrap()
    }

    #[test]
    fn write_raises_framing_events_in_order() {
        let mut bus = SimulatedBus::new(addr(0x42), Recorder::default());
        let outcome = bus.apply(&Transaction::Write {
            address: addr(0x42),
            bytes: vec![0x10, 0x20],
        });

        assert_eq!(outcome, TransactionOutcome::Write { acked: 2, nacked: 0 });
        assert_eq!(
            bus.handler().events,
            vec![
                SlaveEvent::WriteRequested,
                SlaveEvent::WriteReceived(0x10),
                SlaveEvent::WriteReceived(0x20),
                SlaveEvent::Stop,
            ]
        );
    }

    #[test]
    fn write_counts_nacked_bytes() {
        let recorder = Recorder {
            nack_after: Some(1),
            ..Recorder::default()
        };
        let mut bus = SimulatedBus::new(addr(0x10), recorder);
        let outcome = bus.apply(&Transaction::Write {
            address: addr(0x10),
            bytes: vec![1, 2, 3],
        });
        assert_eq!(outcome, TransactionOutcome::Write { acked: 1, nacked: 2 });
    }

    #[test]
    fn other_address_raises_nothing() {
        let mut bus = SimulatedBus::new(addr(0x42), Recorder::default());
        let outcome = bus.apply(&Transaction::Write {
            address: addr(0x43),
            bytes: vec![1],
        });
        assert_eq!(outcome, TransactionOutcome::NoDevice);
        assert!(bus.handler().events.is_empty());
    }

    #[test]
    fn read_collects_slave_bytes() {
        let mut bus = SimulatedBus::new(addr(0x42), Recorder::default());
        let outcome = bus.apply(&Transaction::Read {
            address: addr(0x42),
            len: 3,
        });

        assert_eq!(
            outcome,
            TransactionOutcome::Read {
                bytes: vec![1, 2, 3]
            }
        );
        let events = bus.into_handler().events;
        assert_eq!(
            events,
            vec![
                SlaveEvent::ReadRequested,
                SlaveEvent::ReadProcessed,
                SlaveEvent::ReadProcessed,
                SlaveEvent::Stop,
            ]
        );
    }

    #[test]
    fn empty_read_only_stops() {
        let mut bus = SimulatedBus::new(addr(0x42), Recorder::default());
        let outcome = bus.apply(&Transaction::Read {
            address: addr(0x42),
            len: 0,
        });
        assert_eq!(outcome, TransactionOutcome::Read { bytes: vec![] });
        assert_eq!(bus.handler().events, vec![SlaveEvent::Stop]);
    }
}
