//! # Update Scheduler — Batched Per-Tick Callbacks
//!
//! A callback is anything that takes `&mut C` and does something with it.
//! Callbacks subscribe to one of three [`Channel`]s, and the external tick
//! source steps the channels once per frame in fixed order:
//!
//! ```text
//! tick ──► PreStep ──► Step ──► PostStep
//! ```
//!
//! ## Batches
//!
//! Each channel is an ordered list of [`Batch`]es. A batch holds at most
//! `capacity` callbacks (500 by default) and is invoked as a unit:
//!
//! ```text
//! Step: [ batch#0: f1 f2 … f500 ] [ batch#1: f501 … ] [ batch#2: … ]
//!          invoked first             then this          then this
//! ```
//!
//! Subscribing scans the batches in registration order and attaches to the
//! first one with room; when all are full a new batch is appended. Batches are
//! never reclaimed, so an emptied batch stays in place and refills before any
//! later batch.
//!
//! The handle returned by [`UpdateScheduler::subscribe`] pairs the callback's
//! id with the id of the batch it landed in. Unsubscribing with a pair that was
//! never subscribed together is a silent no-op.
//!
//! ## Comparison
//!
//! - **A flat `Vec` of systems** runs everything in insertion order with one
//!   unbounded list. Batching keeps the same ordering but bounds how much any
//!   single invocation site fans out to.
//! - **bevy_ecs** schedules have stages and run conditions; here the only
//!   structure is the three fixed channels.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::singleton::Singleton;

/// The three per-tick invocation phases, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PreStep,
    Step,
    PostStep,
}

impl Channel {
    /// Every channel, in tick order.
    pub const ALL: [Channel; 3] = [Channel::PreStep, Channel::Step, Channel::PostStep];

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::PreStep => 0,
            Channel::Step => 1,
            Channel::PostStep => 2,
        }
    }
}

/// A callback that can be subscribed to a channel.
///
/// Any `FnMut(&mut C)` implements this trait, so closures work directly.
pub trait Callback<C> {
    fn invoke(&mut self, ctx: &mut C);
}

impl<C, F: FnMut(&mut C)> Callback<C> for F {
    fn invoke(&mut self, ctx: &mut C) {
        (self)(ctx);
    }
}

/// Identifies one batch within the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

/// Identifies one subscribed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// What [`UpdateScheduler::subscribe`] hands back: enough to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub callback: CallbackId,
    pub batch: BatchId,
    pub channel: Channel,
}

/// A capacity-bounded group of callbacks, invoked together.
pub struct Batch<C> {
    id: BatchId,
    capacity: usize,
    callbacks: Vec<(CallbackId, Box<dyn Callback<C>>)>,
}

impl<C> Batch<C> {
    fn new(id: BatchId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            callbacks: Vec::new(),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Current subscriber count.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn has_room(&self) -> bool {
        self.callbacks.len() < self.capacity
    }

    fn attach(&mut self, id: CallbackId, callback: Box<dyn Callback<C>>) {
        debug_assert!(self.has_room());
        self.callbacks.push((id, callback));
    }

    fn detach(&mut self, id: CallbackId) -> bool {
        match self.callbacks.iter().position(|(cid, _)| *cid == id) {
            Some(pos) => {
                self.callbacks.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Invoke every callback in attach order. Returns how many ran.
    fn invoke(&mut self, ctx: &mut C) -> usize {
        for (_, callback) in &mut self.callbacks {
            callback.invoke(ctx);
        }
        self.callbacks.len()
    }
}

/// Statistics for the most recent step of one channel (diagnostics only).
#[cfg(feature = "diagnostics")]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    pub batches: usize,
    pub callbacks: usize,
    pub duration_us: f64,
}

/// The process-wide update dispatcher.
///
/// Generic over the context `C` every callback receives. Resolved through
/// the [`Singletons`](crate::singleton::Singletons) registry from a
/// [`SchedulerConfig`] template.
pub struct UpdateScheduler<C> {
    capacity: usize,
    channels: [Vec<Batch<C>>; 3],
    next_batch: u64,
    next_callback: u64,
    #[cfg(feature = "diagnostics")]
    stats: [StepStats; 3],
}

impl<C> UpdateScheduler<C> {
    /// Create a scheduler whose batches hold at most `capacity` callbacks.
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: [Vec::new(), Vec::new(), Vec::new()],
            next_batch: 0,
            next_callback: 0,
            #[cfg(feature = "diagnostics")]
            stats: [StepStats::default(); 3],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Attach `callback` to the first batch of `channel` with room, creating a
    /// new batch at the end when every existing one is full.
    pub fn subscribe<F: Callback<C> + 'static>(&mut self, channel: Channel, callback: F) -> Subscription {
        let callback_id = CallbackId(self.next_callback);
        self.next_callback += 1;

        let batches = &mut self.channels[channel.index()];
        let batch = match batches.iter_mut().position(|b| b.has_room()) {
            Some(pos) => &mut batches[pos],
            None => {
                let id = BatchId(self.next_batch);
                self.next_batch += 1;
                log::info!("{channel:?}: opening batch {id:?} (capacity {})", self.capacity);
                batches.push(Batch::new(id, self.capacity));
                let last = batches.len() - 1;
                &mut batches[last]
            }
        };
        batch.attach(callback_id, Box::new(callback));

        Subscription {
            callback: callback_id,
            batch: batch.id,
            channel,
        }
    }

    /// Detach `callback` from batch `batch` of `channel`.
    ///
    /// Returns `false` (and changes nothing) when the pair was never
    /// subscribed together or has already been removed.
    pub fn unsubscribe(&mut self, callback: CallbackId, batch: BatchId, channel: Channel) -> bool {
        let removed = self.channels[channel.index()]
            .iter_mut()
            .find(|b| b.id == batch)
            .is_some_and(|b| b.detach(callback));
        if !removed {
            log::trace!("{channel:?}: unsubscribe of {callback:?} from {batch:?} matched nothing");
        }
        removed
    }

    /// Convenience for `unsubscribe` with a stored handle.
    pub fn cancel(&mut self, subscription: Subscription) -> bool {
        self.unsubscribe(subscription.callback, subscription.batch, subscription.channel)
    }

    /// Invoke every batch of `channel` in registration order.
    pub fn step(&mut self, channel: Channel, ctx: &mut C) {
        #[cfg(feature = "diagnostics")]
        let start = std::time::Instant::now();

        let mut invoked = 0;
        let batches = &mut self.channels[channel.index()];
        for batch in batches.iter_mut() {
            invoked += batch.invoke(ctx);
        }
        log::trace!("{channel:?}: {invoked} callbacks across {} batches", batches.len());

        #[cfg(feature = "diagnostics")]
        {
            self.stats[channel.index()] = StepStats {
                batches: self.channels[channel.index()].len(),
                callbacks: invoked,
                duration_us: start.elapsed().as_secs_f64() * 1_000_000.0,
            };
        }
    }

    /// Batches of `channel`, in registration order.
    pub fn batches(&self, channel: Channel) -> &[Batch<C>] {
        &self.channels[channel.index()]
    }

    pub fn batch_count(&self, channel: Channel) -> usize {
        self.channels[channel.index()].len()
    }

    /// Subscriber count of each batch of `channel`.
    pub fn batch_sizes(&self, channel: Channel) -> Vec<usize> {
        self.channels[channel.index()].iter().map(Batch::len).collect()
    }

    /// Total subscribers on `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels[channel.index()].iter().map(Batch::len).sum()
    }

    #[cfg(feature = "diagnostics")]
    pub fn last_step(&self, channel: Channel) -> StepStats {
        self.stats[channel.index()]
    }
}

impl<C: 'static> Singleton for UpdateScheduler<C> {
    type Template = SchedulerConfig;

    fn instantiate(template: &SchedulerConfig) -> Self {
        UpdateScheduler::new(template.batch_capacity)
    }
}
