use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use busmq_bus::{load_script, SimulatedBus};
use busmq_queue::{Interrupter, MessageQueue, QueueError};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{
    bus_error, config_error, queue_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS,
};
use crate::output::{log_summary, print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.queue.to_config()?;
    let interval = parse_duration(&args.interval)?;
    let transactions =
        load_script(&args.script).map_err(|err| bus_error("failed loading script", err))?;

    let mut queue =
        MessageQueue::new(config).map_err(|err| config_error("invalid queue config", err))?;
    if let Some(hook) = args.queue.trace_hook() {
        queue.consumer_mut().set_trace_hook(hook);
    }
    let (producer, mut consumer) = queue.split();

    let stopping = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stopping.clone(), consumer.interrupter())?;

    let feeder = {
        let finished = finished.clone();
        let stopping = stopping.clone();
        let interrupter = consumer.interrupter();
        thread::spawn(move || {
            let mut bus = SimulatedBus::new(config.own_address, producer);
            for transaction in &transactions {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                bus.apply(transaction);
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
            finished.store(true, Ordering::SeqCst);
            interrupter.interrupt();
            bus.into_handler().stats()
        })
    };

    let mut buf = vec![0u8; config.message_capacity];
    let mut seq = 0u64;
    let limit = args.count.unwrap_or(usize::MAX) as u64;

    while seq < limit {
        match consumer.pop_blocking(&mut buf) {
            Ok(len) => {
                print_message(seq, &buf[..len], format);
                seq += 1;
            }
            Err(QueueError::Interrupted) if stopping.load(Ordering::SeqCst) => break,
            Err(QueueError::Interrupted) if finished.load(Ordering::SeqCst) => {
                // Producer is done; take what is left without waiting.
                while seq < limit {
                    match consumer.try_pop_into(&mut buf) {
                        Ok(len) => {
                            print_message(seq, &buf[..len], format);
                            seq += 1;
                        }
                        Err(QueueError::Empty) => break,
                        Err(err) => return Err(queue_error("receive failed", err)),
                    }
                }
                break;
            }
            Err(QueueError::Interrupted) => continue,
            Err(err) => return Err(queue_error("receive failed", err)),
        }
    }

    // Only the signal handler sets `stopping` before this point.
    let cancelled = stopping.swap(true, Ordering::SeqCst);
    let framing = feeder
        .join()
        .map_err(|_| CliError::new(INTERNAL, "producer thread panicked"))?;
    log_summary(&framing, &consumer.stats());

    Ok(exit_code(cancelled))
}

fn exit_code(cancelled: bool) -> i32 {
    if cancelled {
        INTERRUPTED
    } else {
        SUCCESS
    }
}

fn install_ctrlc_handler(stopping: Arc<AtomicBool>, interrupter: Interrupter) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stopping.store(true, Ordering::SeqCst);
        interrupter.interrupt();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
