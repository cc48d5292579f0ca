//! Loopback: a bus thread writes transactions while the main thread reads.
//!
//! Run: cargo run --example loopback

use std::thread;
use std::time::Duration;

use busmq::bus::{BusAddress, SimulatedBus, Transaction};
use busmq::queue::{MessageQueue, QueueConfig, QueueError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = BusAddress::new(0x42)?;
    let config = QueueConfig {
        slot_count: 8,
        message_capacity: 32,
        ..QueueConfig::for_address(address)
    };
    let (producer, mut consumer) = MessageQueue::new(config)?.split();
    let interrupter = consumer.interrupter();

    let bus_thread = thread::spawn(move || {
        let mut bus = SimulatedBus::new(address, producer);
        for i in 0..5u8 {
            bus.apply(&Transaction::Write {
                address,
                bytes: format!("msg-{i}").into_bytes(),
            });
            thread::sleep(Duration::from_millis(50));
        }
        interrupter.interrupt();
    });

    let mut buf = [0u8; 32];
    loop {
        match consumer.pop_blocking(&mut buf) {
            Ok(n) => print_message(&buf[..n]),
            Err(QueueError::Interrupted) => {
                // The bus thread is done; pick up anything still queued.
                while let Ok(n) = consumer.try_pop_into(&mut buf) {
                    print_message(&buf[..n]);
                }
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    bus_thread.join().map_err(|_| "bus thread panicked")?;
    let stats = consumer.stats();
    println!("delivered={} evicted={}", stats.delivered, stats.evicted);
    Ok(())
}

fn print_message(message: &[u8]) {
    let payload = String::from_utf8_lossy(&message[1..]);
    println!("from 0x{:02x}: {payload}", message[0] >> 1);
}
