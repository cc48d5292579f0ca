use busmq_bus::{load_script, SimulatedBus, TransactionOutcome};
use busmq_queue::{Consumer, MessageQueue, QueueError};

use crate::cmd::ReplayArgs;
use crate::exit::{bus_error, config_error, queue_error, CliResult, SUCCESS};
use crate::output::{log_summary, print_message, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.queue.to_config()?;
    let transactions =
        load_script(&args.script).map_err(|err| bus_error("failed loading script", err))?;

    let mut queue =
        MessageQueue::new(config).map_err(|err| config_error("invalid queue config", err))?;
    if let Some(hook) = args.queue.trace_hook() {
        queue.consumer_mut().set_trace_hook(hook);
    }
    let (producer, mut consumer) = queue.split();
    let mut bus = SimulatedBus::new(config.own_address, producer);

    for (idx, transaction) in transactions.iter().enumerate() {
        match bus.apply(transaction) {
            TransactionOutcome::NoDevice => {
                tracing::info!(index = idx, address = %transaction.address(), "no device at address");
            }
            TransactionOutcome::Write { acked, nacked } => {
                tracing::debug!(index = idx, acked, nacked, "write applied");
            }
            TransactionOutcome::Read { bytes } => {
                tracing::debug!(index = idx, len = bytes.len(), "read applied");
            }
        }
    }

    let read_size = args.read_size.unwrap_or(config.message_capacity);
    drain(&mut consumer, read_size, format)?;

    log_summary(&bus.handler().stats(), &consumer.stats());
    Ok(SUCCESS)
}

/// Print every pending message. Oversized ones are reported and skipped.
fn drain(consumer: &mut Consumer, read_size: usize, format: OutputFormat) -> CliResult<u64> {
    let mut buf = vec![0u8; read_size];
    let mut seq = 0u64;

    loop {
        match consumer.try_pop_into(&mut buf) {
            Ok(len) => {
                print_message(seq, &buf[..len], format);
                seq += 1;
            }
            Err(QueueError::Empty) => return Ok(seq),
            Err(QueueError::Overflow { len, capacity }) => {
                tracing::warn!(len, capacity, "message larger than read buffer dropped");
            }
            Err(err) => return Err(queue_error("drain failed", err)),
        }
    }
}
