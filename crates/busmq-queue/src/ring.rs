use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::buffer::MessageBuffer;
use crate::config::QueueConfig;
use crate::delivery::Consumer;
use crate::error::{ConfigError, QueueError, Result};
use crate::framing::Producer;

/// Fixed ring of committed messages.
///
/// `write` and `read` are free-running counters; a slot is `counter & mask`.
/// Equal counters mean empty, a difference of `slots.len()` means full. The
/// message being framed lives outside the ring and is swapped in on commit.
#[derive(Debug)]
pub(crate) struct MessageRing {
    slots: Box<[MessageBuffer]>,
    mask: usize,
    write: usize,
    read: usize,
}

/// Result of taking the oldest message out of the ring.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Popped {
    pub(crate) result: Result<usize>,
    pub(crate) more_pending: bool,
}

impl MessageRing {
    /// Allocate `slot_count` slots of `message_capacity` bytes each.
    /// `slot_count` must be a power of two.
    pub(crate) fn new(slot_count: usize, message_capacity: usize) -> Self {
        debug_assert!(slot_count.is_power_of_two());
        let slots = (0..slot_count)
            .map(|_| MessageBuffer::with_capacity(message_capacity))
            .collect();
        Self {
            slots,
            mask: slot_count - 1,
            write: 0,
            read: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.write.wrapping_sub(self.read)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.write == self.read
    }

    pub(crate) fn write_index(&self) -> usize {
        self.write & self.mask
    }

    pub(crate) fn read_index(&self) -> usize {
        self.read & self.mask
    }

    /// Move `staging` into the next write slot and hand back the slot's old
    /// buffer, cleared, in its place. Returns true when the oldest unread
    /// message was evicted to make room.
    pub(crate) fn commit(&mut self, staging: &mut MessageBuffer) -> bool {
        let idx = self.write & self.mask;
        mem::swap(&mut self.slots[idx], staging);
        staging.clear();

        self.write = self.write.wrapping_add(1);
        if self.len() > self.slots.len() {
            self.read = self.read.wrapping_add(1);
            return true;
        }
        false
    }

    /// Copy the oldest message into `dst` and advance past it.
    ///
    /// A message that does not fit is dropped with `Overflow`; retrying it
    /// would wedge the queue behind it.
    pub(crate) fn pop_into(&mut self, dst: &mut [u8]) -> Popped {
        if self.is_empty() {
            return Popped {
                result: Err(QueueError::Empty),
                more_pending: false,
            };
        }

        let msg = &self.slots[self.read & self.mask];
        let result = msg.copy_to(dst).ok_or(QueueError::Overflow {
            len: msg.len(),
            capacity: dst.len(),
        });

        self.read = self.read.wrapping_add(1);
        Popped {
            result,
            more_pending: !self.is_empty(),
        }
    }
}

/// Counters kept under the ring lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RingCounters {
    pub(crate) committed: u64,
    pub(crate) evicted: u64,
    pub(crate) delivered: u64,
    pub(crate) overflowed: u64,
}

/// Everything the lock protects.
#[derive(Debug)]
pub(crate) struct RingState {
    pub(crate) ring: MessageRing,
    pub(crate) interrupt_pending: bool,
    pub(crate) counters: RingCounters,
}

/// State shared by the producer, the consumer and their helper handles.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<RingState>,
    ready: Condvar,
    #[cfg(feature = "async")]
    pub(crate) ready_async: tokio::sync::Notify,
    notifications: AtomicU64,
    pub(crate) config: QueueConfig,
}

impl Shared {
    fn new(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(RingState {
                ring: MessageRing::new(config.slot_count, config.message_capacity),
                interrupt_pending: false,
                counters: RingCounters::default(),
            }),
            ready: Condvar::new(),
            #[cfg(feature = "async")]
            ready_async: tokio::sync::Notify::new(),
            notifications: AtomicU64::new(0),
            config,
        }
    }

    /// Take the ring lock.
    ///
    /// Critical sections never panic midway, so a poisoned lock still guards
    /// consistent indices.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block on the readiness condition, releasing the lock while asleep.
    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, RingState>) -> MutexGuard<'a, RingState> {
        self.ready.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Like [`Shared::wait`] with an upper bound on the sleep.
    pub(crate) fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, RingState>,
        timeout: std::time::Duration,
    ) -> MutexGuard<'a, RingState> {
        match self.ready.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    /// Readiness notification. Called without the lock held.
    pub(crate) fn notify_ready(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_all();
        #[cfg(feature = "async")]
        self.ready_async.notify_one();
    }

    /// Wake blocked waiters without signalling data.
    pub(crate) fn wake_waiters(&self) {
        self.ready.notify_all();
    }

    pub(crate) fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            committed: state.counters.committed,
            evicted: state.counters.evicted,
            delivered: state.counters.delivered,
            overflowed: state.counters.overflowed,
            notifications: self.notifications.load(Ordering::Relaxed),
            pending: state.ring.len(),
        }
    }
}

/// Snapshot of ring activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages committed by the producer.
    pub committed: u64,
    /// Unread messages evicted to make room.
    pub evicted: u64,
    /// Messages copied out to the consumer.
    pub delivered: u64,
    /// Messages dropped because the consumer's buffer was too small.
    pub overflowed: u64,
    /// Readiness notifications emitted.
    pub notifications: u64,
    /// Messages currently waiting.
    pub pending: usize,
}

/// A bounded message queue, not yet split into its two roles.
pub struct MessageQueue {
    producer: Producer,
    consumer: Consumer,
}

impl MessageQueue {
    /// Validate `config` and allocate every slot up front.
    pub fn new(config: QueueConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new(Shared::new(config));
        tracing::debug!(
            address = %config.own_address,
            slots = config.slot_count,
            message_capacity = config.message_capacity,
            storage = config.storage_size(),
            "message queue allocated"
        );
        Ok(Self {
            producer: Producer::new(Arc::clone(&shared)),
            consumer: Consumer::new(shared),
        })
    }

    /// Separate the producer and consumer roles so they can move to
    /// different execution contexts.
    pub fn split(self) -> (Producer, Consumer) {
        (self.producer, self.consumer)
    }

    /// The framing side, for single-context use.
    pub fn producer_mut(&mut self) -> &mut Producer {
        &mut self.producer
    }

    /// The reading side, for single-context use.
    pub fn consumer_mut(&mut self) -> &mut Consumer {
        &mut self.consumer
    }

    /// Configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        self.consumer.config()
    }
}
