//! Randomized stream senders, receivers, and connectors for simulation.
//!
//! These drive and drain channels under configurable stall patterns, recording
//! every transfer; all randomness comes from seeded generators, so runs are
//! reproducible.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streamflow::{BuildError, ChannelId, Component, Domain, Fabric, Item, Layout, Net, Record};
use tracing::trace;

/// Builds one frame of items over `layout`, writing `values` into `field`.
pub fn frame(layout: &Arc<Layout>, field: &str, values: &[u64]) -> Vec<Item> {
    let len = values.len();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mut record = Record::new(layout);
            record.set(field, value);
            Item::with_flags(record, i == 0, i == len - 1)
        })
        .collect()
}

/// Concatenates several frames built over the same layout and field.
pub fn frames(layout: &Arc<Layout>, field: &str, chunks: &[&[u64]]) -> Vec<Item> {
    chunks.iter().flat_map(|chunk| frame(layout, field, chunk)).collect()
}

/// Drives a channel from a list of items at a per-step launch probability.
///
/// Honors no-retraction: once an item is presented it stays presented,
/// unchanged, until the transfer completes.
#[derive(Debug)]
pub struct StreamSender {
    channel: ChannelId,
    domain: Domain,
    items: Vec<Item>,
    index: usize,
    pending: bool,
    speed: f64,
    delay: usize,
    rng: StdRng,
}

impl StreamSender {
    /// Builds a sender presenting `items` on `channel`.
    pub fn new(
        fabric: &Fabric, channel: ChannelId, items: Vec<Item>, speed: f64, seed: u64,
    ) -> Result<Self, BuildError> {
        assert!((0.0..=1.0).contains(&speed), "speed must be a probability");
        for item in &items {
            fabric.check_layout(channel, item.payload.layout())?;
        }
        Ok(Self {
            channel,
            domain: fabric.domain_of(channel),
            items,
            index: 0,
            pending: false,
            speed,
            delay: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Holds off launching for the first `delay` edges.
    pub fn with_initial_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }
}

impl Component for StreamSender {
    fn comb(&self, net: &mut Net) {
        if self.pending {
            net.drive_fwd(self.channel, Some(self.items[self.index].clone()));
        }
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if self.delay > 0 {
            self.delay -= 1;
            return;
        }
        if self.pending && net.fire(self.channel) {
            self.index += 1;
            self.pending = false;
        }
        if !self.pending && self.index < self.items.len() && self.rng.gen_bool(self.speed) {
            self.pending = true;
        }
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.channel]
    }

    fn domains(&self) -> Vec<Domain> {
        vec![self.domain]
    }
}

/// Shared record of everything a [`StreamReceiver`] accepted.
#[derive(Debug, Clone, Default)]
pub struct StreamLog {
    inner: Rc<RefCell<Vec<Item>>>,
}

impl StreamLog {
    /// Returns the number of recorded transfers.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns true iff nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Returns the recorded items in transfer order.
    pub fn items(&self) -> Vec<Item> {
        self.inner.borrow().clone()
    }

    /// Returns one field of every recorded item, in transfer order.
    pub fn values(&self, field: &str) -> Vec<u64> {
        self.inner.borrow().iter().map(|item| item.payload.get(field)).collect()
    }

    /// Returns the `(first, last)` flags of every recorded item.
    pub fn flags(&self) -> Vec<(bool, bool)> {
        self.inner.borrow().iter().map(|item| (item.first, item.last)).collect()
    }

    /// Asserts that `field` carried exactly `expected`, reporting the first
    /// divergence by index.
    pub fn verify(&self, field: &str, expected: &[u64]) {
        let received = self.values(field);
        assert_eq!(received.len(), expected.len(), "length differs for `{}`", field);
        for (i, (received, expected)) in received.iter().zip(expected).enumerate() {
            assert_eq!(received, expected, "`{}` diverges at index {}", field, i);
        }
    }

    fn push(&self, item: Item) {
        self.inner.borrow_mut().push(item);
    }
}

/// Accepts from a channel at a per-step probability, recording every transfer.
#[derive(Debug)]
pub struct StreamReceiver {
    channel: ChannelId,
    domain: Domain,
    speed: f64,
    delay: usize,
    accept: bool,
    rng: StdRng,
    log: StreamLog,
}

impl StreamReceiver {
    /// Builds a receiver draining `channel` with per-step acceptance `speed`.
    pub fn new(fabric: &Fabric, channel: ChannelId, speed: f64, seed: u64) -> Self {
        assert!((0.0..=1.0).contains(&speed), "speed must be a probability");
        Self {
            channel,
            domain: fabric.domain_of(channel),
            speed,
            delay: 0,
            accept: false,
            rng: StdRng::seed_from_u64(seed),
            log: StreamLog::default(),
        }
    }

    /// Withholds readiness for the first `delay` edges.
    pub fn with_initial_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the shared transfer log.
    pub fn log(&self) -> StreamLog {
        self.log.clone()
    }
}

impl Component for StreamReceiver {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.channel, self.accept);
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if net.fire(self.channel) {
            let item = net.fwd(self.channel).cloned().expect("fired");
            trace!(?item, "received");
            self.log.push(item);
        }
        if self.delay > 0 {
            self.delay -= 1;
            self.accept = false;
        } else {
            self.accept = self.rng.gen_bool(self.speed);
        }
    }

    fn drives_bwd(&self) -> Vec<ChannelId> {
        vec![self.channel]
    }

    fn domains(&self) -> Vec<Domain> {
        vec![self.domain]
    }
}

/// Store-and-forward connector with randomized timing on both faces.
///
/// Accepts an item from `a`, holds it, and later presents it on `b`; useful
/// for composing multi-hop stall patterns between two same-domain channels.
#[derive(Debug)]
pub struct StreamForward {
    a: ChannelId,
    b: ChannelId,
    domain: Domain,
    stash: Option<Item>,
    presenting: bool,
    accepting: bool,
    speed: f64,
    rng: StdRng,
}

impl StreamForward {
    /// Builds a forwarder from `a` to `b`.
    pub fn new(fabric: &Fabric, a: ChannelId, b: ChannelId, speed: f64, seed: u64) -> Result<Self, BuildError> {
        assert!((0.0..=1.0).contains(&speed), "speed must be a probability");
        fabric.check_same_layout(a, b)?;
        let domain = fabric.domain_of(a);
        fabric.check_domain(b, domain)?;
        Ok(Self {
            a,
            b,
            domain,
            stash: None,
            presenting: false,
            accepting: false,
            speed,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Component for StreamForward {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.a, self.stash.is_none() && self.accepting);
        if self.presenting {
            net.drive_fwd(self.b, self.stash.clone());
        }
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if net.fire(self.b) {
            self.stash = None;
            self.presenting = false;
        }
        if self.stash.is_none() && net.fire(self.a) {
            self.stash = net.fwd(self.a).cloned();
        }
        if self.stash.is_some() && !self.presenting && self.rng.gen_bool(self.speed) {
            self.presenting = true;
        }
        self.accepting = self.rng.gen_bool(self.speed);
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.b]
    }

    fn drives_bwd(&self) -> Vec<ChannelId> {
        vec![self.a]
    }

    fn domains(&self) -> Vec<Domain> {
        vec![self.domain]
    }
}
