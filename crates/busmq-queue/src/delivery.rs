//! Delivery interface: the single consumer role.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::ring::{QueueStats, Shared};
use crate::trace::TraceHook;

/// Reads committed messages, one per call, in commit order.
///
/// There is exactly one `Consumer` per queue and every read takes
/// `&mut self`, so two readers can never race for the same message.
pub struct Consumer {
    shared: Arc<Shared>,
    trace: Option<Arc<dyn TraceHook>>,
}

impl Consumer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            trace: None,
        }
    }

    /// Take the oldest pending message without waiting.
    ///
    /// Copies the whole message into `dst` and returns its length. If `dst`
    /// is too small the message is dropped and `Overflow` is returned; the
    /// next call sees the following message. Returns `Empty` when nothing is
    /// pending.
    pub fn try_pop_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        // Hold the lock for the copy too: the slot may be refilled by the next
        // commit as soon as it is released.
        let popped = {
            let mut state = self.shared.lock();
            let popped = state.ring.pop_into(dst);
            match popped.result {
                Ok(_) => state.counters.delivered += 1,
                Err(QueueError::Overflow { .. }) => state.counters.overflowed += 1,
                Err(_) => {}
            }
            popped
        };

        if popped.more_pending {
            self.shared.notify_ready();
        }

        match popped.result {
            Ok(len) => {
                if let Some(hook) = &self.trace {
                    hook.delivered(self.shared.config.bus_id, &dst[..len]);
                }
                Ok(len)
            }
            Err(err) => {
                if let QueueError::Overflow { len, capacity } = err {
                    tracing::debug!(len, capacity, "oversized message dropped");
                }
                Err(err)
            }
        }
    }

    /// Wait for a message, then take it.
    ///
    /// Returns `Interrupted` if an [`Interrupter`] fires first.
    pub fn pop_blocking(&mut self, dst: &mut [u8]) -> Result<usize> {
        loop {
            self.wait_ready()?;
            match self.try_pop_into(dst) {
                Err(QueueError::Empty) => continue,
                other => return other,
            }
        }
    }

    /// Like [`Consumer::pop_blocking`], giving up with `Empty` after `timeout`.
    ///
    /// A timeout too large to represent as a deadline waits without one.
    pub fn pop_timeout(&mut self, dst: &mut [u8], timeout: Duration) -> Result<usize> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.pop_blocking(dst);
        };
        loop {
            self.wait_ready_until(deadline)?;
            match self.try_pop_into(dst) {
                Err(QueueError::Empty) if Instant::now() < deadline => continue,
                other => return other,
            }
        }
    }

    /// Take the next message into a freshly allocated buffer sized to the
    /// configured message capacity. Blocks like [`Consumer::pop_blocking`].
    pub fn recv(&mut self) -> Result<Bytes> {
        let mut buf = vec![0u8; self.shared.config.message_capacity];
        let len = self.pop_blocking(&mut buf)?;
        buf.truncate(len);
        Ok(Bytes::from(buf))
    }

    /// Non-blocking [`Consumer::recv`].
    pub fn try_recv(&mut self) -> Result<Bytes> {
        let mut buf = vec![0u8; self.shared.config.message_capacity];
        let len = self.try_pop_into(&mut buf)?;
        buf.truncate(len);
        Ok(Bytes::from(buf))
    }

    /// True when at least one message is pending.
    pub fn is_ready(&self) -> bool {
        !self.shared.lock().ring.is_empty()
    }

    /// Number of pending messages.
    pub fn pending(&self) -> usize {
        self.shared.lock().ring.len()
    }

    /// Block until a message is pending or an interrupt arrives.
    ///
    /// The lock is released while asleep. A pending interrupt wins over
    /// pending data and is consumed by this call.
    pub fn wait_ready(&self) -> Result<()> {
        let mut state = self.shared.lock();
        loop {
            if state.interrupt_pending {
                state.interrupt_pending = false;
                return Err(QueueError::Interrupted);
            }
            if !state.ring.is_empty() {
                return Ok(());
            }
            state = self.shared.wait(state);
        }
    }

    fn wait_ready_until(&self, deadline: Instant) -> Result<()> {
        let mut state = self.shared.lock();
        loop {
            if state.interrupt_pending {
                state.interrupt_pending = false;
                return Err(QueueError::Interrupted);
            }
            if !state.ring.is_empty() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(QueueError::Empty);
            }
            state = self.shared.wait_timeout(state, deadline - now);
        }
    }

    /// Handle that can cancel this consumer's blocking waits from elsewhere.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Read-only readiness handle for observers other than the reader.
    pub fn probe(&self) -> ReadinessProbe {
        ReadinessProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Install a hook that sees every delivered message.
    pub fn set_trace_hook(&mut self, hook: Arc<dyn TraceHook>) {
        self.trace = Some(hook);
    }

    /// Remove the delivery hook.
    pub fn clear_trace_hook(&mut self) {
        self.trace = None;
    }

    /// Ring counters.
    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    /// Configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

#[cfg(feature = "async")]
impl Consumer {
    /// Wait for a message without blocking the thread, then take it.
    ///
    /// Returns `Interrupted` once `cancel` fires.
    pub async fn pop_async(
        &mut self,
        dst: &mut [u8],
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<usize> {
        loop {
            match self.try_pop_into(dst) {
                Err(QueueError::Empty) => {}
                other => return other,
            }

            tokio::select! {
                _ = self.shared.ready_async.notified() => {}
                _ = cancel.cancelled() => return Err(QueueError::Interrupted),
            }
        }
    }
}

/// Blocking byte-stream view: each `read` returns one whole message.
///
/// An interrupt surfaces as `ErrorKind::Other` carrying
/// [`QueueError::Interrupted`], so std's retrying helpers (`read_to_end`,
/// `read_exact`, `io::copy`) return instead of waiting again.
impl Read for Consumer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.pop_blocking(buf).map_err(io::Error::from)
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("address", &self.shared.config.own_address)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

/// Cancels the consumer's blocking waits.
#[derive(Clone)]
pub struct Interrupter {
    shared: Arc<Shared>,
}

impl Interrupter {
    /// Raise an interrupt. The wait in progress, or the next one to start,
    /// returns `Interrupted` and clears it.
    pub fn interrupt(&self) {
        self.shared.lock().interrupt_pending = true;
        self.shared.wake_waiters();
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter").finish_non_exhaustive()
    }
}

/// Non-mutating readiness view of a queue.
#[derive(Clone)]
pub struct ReadinessProbe {
    shared: Arc<Shared>,
}

impl ReadinessProbe {
    /// True when at least one message is pending.
    pub fn is_ready(&self) -> bool {
        !self.shared.lock().ring.is_empty()
    }

    /// Number of pending messages.
    pub fn pending(&self) -> usize {
        self.shared.lock().ring.len()
    }

    /// Ring counters.
    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }
}

impl std::fmt::Debug for ReadinessProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessProbe")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use busmq_bus::{BusAddress, SimulatedBus, Transaction};

    use super::*;
    use crate::framing::Producer;
    use crate::ring::MessageQueue;

    fn split(capacity: usize, slots: usize) -> (Producer, Consumer) {
        let cfg = QueueConfig {
            own_address: BusAddress::new(0x42).unwrap(),
            slot_count: slots,
            message_capacity: capacity,
            bus_id: 3,
        };
        MessageQueue::new(cfg).unwrap().split()
    }

    fn send(producer: &mut Producer, payload: &[u8]) {
        producer.on_write_requested();
        for &b in payload {
            let _ = producer.on_byte_received(b);
        }
        producer.on_stop();
    }

    fn drain(consumer: &mut Consumer) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut dst = [0u8; 64];
        loop {
            match consumer.try_pop_into(&mut dst) {
                Ok(n) => out.push(dst[..n].to_vec()),
                Err(QueueError::Empty) => return out,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    #[test]
    fn empty_pop_reports_empty() {
        let (_producer, mut consumer) = split(8, 4);
        let mut dst = [0u8; 8];
        assert_eq!(consumer.try_pop_into(&mut dst), Err(QueueError::Empty));
        assert_eq!(consumer.stats().notifications, 0);
    }

    #[test]
    fn overflow_skips_to_next_message() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[1, 2, 3, 4]);
        send(&mut producer, &[5]);

        let mut small = [0u8; 3];
        assert_eq!(
            consumer.try_pop_into(&mut small),
            Err(QueueError::Overflow {
                len: 5,
                capacity: 3
            })
        );
        let n = consumer.try_pop_into(&mut small).unwrap();
        assert_eq!(&small[..n], &[0x84, 5]);

        let stats = consumer.stats();
        assert_eq!(stats.overflowed, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn read_length_is_message_length() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[0x10, 0x20]);

        let mut dst = [0xeeu8; 8];
        assert_eq!(consumer.try_pop_into(&mut dst), Ok(3));
        assert_eq!(dst, [0x84, 0x10, 0x20, 0xee, 0xee, 0xee, 0xee, 0xee]);
    }

    #[test]
    fn readiness_tracks_indices() {
        let (mut producer, mut consumer) = split(8, 4);
        let probe = consumer.probe();
        assert!(!probe.is_ready());

        send(&mut producer, &[1]);
        send(&mut producer, &[2]);
        assert!(probe.is_ready());
        assert_eq!(probe.pending(), 2);

        let mut dst = [0u8; 8];
        consumer.try_pop_into(&mut dst).unwrap();
        assert!(consumer.is_ready());
        consumer.try_pop_into(&mut dst).unwrap();
        assert!(!consumer.is_ready());
        assert!(!probe.is_ready());
    }

    #[test]
    fn pop_renotifies_only_while_more_pending() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[1]);
        send(&mut producer, &[2]);
        assert_eq!(consumer.stats().notifications, 2);

        let mut dst = [0u8; 8];
        consumer.try_pop_into(&mut dst).unwrap();
        assert_eq!(consumer.stats().notifications, 3);
        consumer.try_pop_into(&mut dst).unwrap();
        assert_eq!(consumer.stats().notifications, 3);
    }

    #[test]
    fn last_n_of_n_plus_one_survive() {
        let (mut producer, mut consumer) = split(8, 4);
        for i in 0..5u8 {
            send(&mut producer, &[i]);
        }
        let got = drain(&mut consumer);
        assert_eq!(
            got,
            vec![
                vec![0x84, 1],
                vec![0x84, 2],
                vec![0x84, 3],
                vec![0x84, 4]
            ]
        );
        assert_eq!(consumer.stats().evicted, 1);
    }

    #[test]
    fn address_scenario_keeps_last_four_commits() {
        let (producer, mut consumer) = split(8, 4);
        let address = BusAddress::new(0x42).unwrap();
        let mut bus = SimulatedBus::new(address, producer);

        bus.apply(&Transaction::Write {
            address,
            bytes: vec![0x10, 0x20],
        });
        let mut dst = [0u8; 8];
        let n = consumer.try_pop_into(&mut dst).unwrap();
        assert_eq!(&dst[..n], &[0x84, 0x10, 0x20]);

        for b in 1..=5u8 {
            bus.apply(&Transaction::Write {
                address,
                bytes: vec![b],
            });
        }
        assert_eq!(
            drain(&mut consumer),
            vec![
                vec![0x84, 2],
                vec![0x84, 3],
                vec![0x84, 4],
                vec![0x84, 5]
            ]
        );
    }

    #[test]
    fn blocking_pop_wakes_on_commit() {
        let (mut producer, mut consumer) = split(8, 4);

        let reader = thread::spawn(move || {
            let mut dst = [0u8; 8];
            let n = consumer.pop_blocking(&mut dst).unwrap();
            dst[..n].to_vec()
        });

        thread::sleep(Duration::from_millis(20));
        send(&mut producer, &[0x55]);

        assert_eq!(reader.join().unwrap(), vec![0x84, 0x55]);
    }

    #[test]
    fn interrupt_cancels_blocking_wait() {
        let (_producer, mut consumer) = split(8, 4);
        let interrupter = consumer.interrupter();

        let reader = thread::spawn(move || {
            let mut dst = [0u8; 8];
            let result = consumer.pop_blocking(&mut dst);
            (result, consumer)
        });

        thread::sleep(Duration::from_millis(20));
        interrupter.interrupt();

        let (result, consumer) = reader.join().unwrap();
        assert_eq!(result, Err(QueueError::Interrupted));
        assert_eq!(consumer.pending(), 0);
    }

    #[test]
    fn interrupt_is_consumed_once() {
        let (mut producer, mut consumer) = split(8, 4);
        consumer.interrupter().interrupt();
        send(&mut producer, &[7]);

        let mut dst = [0u8; 8];
        assert_eq!(
            consumer.pop_blocking(&mut dst),
            Err(QueueError::Interrupted)
        );
        assert_eq!(consumer.pop_blocking(&mut dst), Ok(2));
    }

    #[test]
    fn pop_timeout_gives_up() {
        let (_producer, mut consumer) = split(8, 4);
        let mut dst = [0u8; 8];
        let started = Instant::now();
        assert_eq!(
            consumer.pop_timeout(&mut dst, Duration::from_millis(30)),
            Err(QueueError::Empty)
        );
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pop_timeout_returns_pending_message() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[9]);
        let mut dst = [0u8; 8];
        assert_eq!(consumer.pop_timeout(&mut dst, Duration::from_secs(1)), Ok(2));
    }

    #[test]
    fn pop_timeout_without_deadline_still_sees_interrupt() {
        let (_producer, mut consumer) = split(8, 4);
        consumer.interrupter().interrupt();
        let mut dst = [0u8; 8];
        assert_eq!(
            consumer.pop_timeout(&mut dst, Duration::MAX),
            Err(QueueError::Interrupted)
        );
    }

    #[test]
    fn pop_timeout_without_deadline_returns_pending_message() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[4]);
        let mut dst = [0u8; 8];
        assert_eq!(consumer.pop_timeout(&mut dst, Duration::MAX), Ok(2));
    }

    #[test]
    fn interrupt_cancels_timed_wait() {
        let (_producer, mut consumer) = split(8, 4);
        let interrupter = consumer.interrupter();

        let reader = thread::spawn(move || {
            let mut dst = [0u8; 8];
            let started = Instant::now();
            let result = consumer.pop_timeout(&mut dst, Duration::from_secs(10));
            (result, started.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        interrupter.interrupt();

        let (result, elapsed) = reader.join().unwrap();
        assert_eq!(result, Err(QueueError::Interrupted));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn recv_returns_owned_message() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[0x10, 0x20]);
        let msg = consumer.recv().unwrap();
        assert_eq!(msg.as_ref(), &[0x84, 0x10, 0x20]);
        assert_eq!(consumer.try_recv(), Err(QueueError::Empty));
    }

    #[test]
    fn io_read_returns_one_message_per_call() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[1, 2]);
        send(&mut producer, &[3]);

        let mut buf = [0u8; 16];
        assert_eq!(consumer.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[0x84, 1, 2]);
        assert_eq!(consumer.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[0x84, 3]);
    }

    #[test]
    fn io_read_maps_overflow() {
        let (mut producer, mut consumer) = split(8, 4);
        send(&mut producer, &[1, 2, 3]);
        let mut buf = [0u8; 2];
        let err = consumer.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn read_to_end_returns_after_interrupt() {
        let (_producer, mut consumer) = split(8, 4);
        let interrupter = consumer.interrupter();

        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let mut out = Vec::new();
            let _ = tx.send(consumer.read_to_end(&mut out));
        });

        thread::sleep(Duration::from_millis(20));
        interrupter.interrupt();

        let err = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("reader should return after interrupt")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<QueueError>());
        assert_eq!(inner, Some(&QueueError::Interrupted));
    }

    struct Capture(Mutex<Vec<(u32, Vec<u8>)>>);

    impl TraceHook for Capture {
        fn delivered(&self, bus_id: u32, bytes: &[u8]) {
            self.0.lock().unwrap().push((bus_id, bytes.to_vec()));
        }
    }

    #[test]
    fn trace_hook_sees_delivered_bytes_only() {
        let (mut producer, mut consumer) = split(8, 4);
        let capture = Arc::new(Capture(Mutex::new(Vec::new())));
        consumer.set_trace_hook(capture.clone());

        send(&mut producer, &[1, 2, 3, 4, 5]);
        send(&mut producer, &[6]);

        let mut small = [0u8; 4];
        assert!(consumer.try_pop_into(&mut small).is_err());
        assert_eq!(consumer.try_pop_into(&mut small), Ok(2));

        let seen = capture.0.lock().unwrap().clone();
        assert_eq!(seen, vec![(3, vec![0x84, 6])]);

        consumer.clear_trace_hook();
        send(&mut producer, &[7]);
        consumer.try_pop_into(&mut small).unwrap();
        assert_eq!(capture.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_producer_and_consumer_preserve_order() {
        let (producer, mut consumer) = split(8, 64);
        let address = BusAddress::new(0x42).unwrap();

        let writer = thread::spawn(move || {
            let mut bus = SimulatedBus::new(address, producer);
            for i in 0..200u16 {
                bus.apply(&Transaction::Write {
                    address,
                    bytes: i.to_be_bytes().to_vec(),
                });
            }
        });

        let mut last: Option<u16> = None;
        let mut seen = 0usize;
        let mut dst = [0u8; 8];
        loop {
            match consumer.pop_timeout(&mut dst, Duration::from_millis(200)) {
                Ok(n) => {
                    assert_eq!(n, 3);
                    assert_eq!(dst[0], 0x84);
                    let value = u16::from_be_bytes([dst[1], dst[2]]);
                    if let Some(prev) = last {
                        assert!(value > prev, "{value} delivered after {prev}");
                    }
                    last = Some(value);
                    seen += 1;
                }
                Err(QueueError::Empty) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        writer.join().unwrap();
        let rest = drain(&mut consumer);
        for msg in &rest {
            let value = u16::from_be_bytes([msg[1], msg[2]]);
            assert!(last.map_or(true, |prev| value > prev));
            last = Some(value);
        }
        assert_eq!(last, Some(199));
        let stats = consumer.stats();
        assert_eq!(stats.delivered as usize, seen + rest.len());
        assert_eq!(stats.delivered + stats.evicted, 200);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_pop_wakes_on_commit() {
        let (mut producer, mut consumer) = split(8, 4);
        let cancel = tokio_util::sync::CancellationToken::new();

        let task = tokio::spawn(async move {
            let mut dst = [0u8; 8];
            let n = consumer.pop_async(&mut dst, &cancel).await.unwrap();
            dst[..n].to_vec()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        send(&mut producer, &[0x33]);

        assert_eq!(task.await.unwrap(), vec![0x84, 0x33]);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_pop_honours_cancellation() {
        let (_producer, mut consumer) = split(8, 4);
        let cancel = tokio_util::sync::CancellationToken::new();
        let trigger = cancel.clone();

        let task = tokio::spawn(async move {
            let mut dst = [0u8; 8];
            consumer.pop_async(&mut dst, &cancel).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();

        assert_eq!(task.await.unwrap(), Err(QueueError::Interrupted));
    }
}
