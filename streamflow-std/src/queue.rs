//! Bounded FIFO queue for valid-ready channels.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use streamflow::{BuildError, ChannelId, Component, Domain, Fabric, Item, Net};
use tracing::warn;

/// Mandated queue depth floor.
///
/// Shallower buffers hit unresolved corner cases; requested depths below the
/// floor are raised, with a warning.
pub const DEPTH_FLOOR: usize = 8;

pub(crate) fn clamp_depth(depth: usize) -> usize {
    if depth < DEPTH_FLOOR {
        warn!(requested = depth, floor = DEPTH_FLOOR, "queue depth below floor, raising");
        DEPTH_FLOOR
    } else {
        depth
    }
}

/// Shared occupancy view of a queue, usable after the queue moves into a fabric.
#[derive(Debug, Clone, Default)]
pub struct LevelProbe {
    inner: Rc<Cell<(usize, usize)>>,
}

impl LevelProbe {
    /// Returns the occupancy at the most recent edge.
    pub fn level(&self) -> usize {
        self.inner.get().0
    }

    /// Returns the highest occupancy observed so far.
    pub fn max_level(&self) -> usize {
        self.inner.get().1
    }

    fn record(&self, level: usize) {
        let (_, max) = self.inner.get();
        self.inner.set((level, max.max(level)));
    }
}

/// Same-domain FIFO buffering over one channel.
///
/// Strict FIFO; read and write may occur in the same step when the queue is
/// neither full nor empty. The optional output stage (see [`Queue::buffered`])
/// shortens the path between storage and the consumer at the cost of exactly
/// one extra step of latency on the first read after empty.
#[derive(Debug)]
pub struct Queue {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    depth: usize,
    buffered: bool,
    ring: VecDeque<Item>,
    out: Option<Item>,
    probe: LevelProbe,
}

impl Queue {
    /// Builds a queue of `depth` items between `sink` and `source`.
    ///
    /// Depths below [`DEPTH_FLOOR`] are raised to it.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, depth: usize) -> Result<Self, BuildError> {
        fabric.check_same_layout(sink, source)?;
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;

        let depth = clamp_depth(depth);
        Ok(Self {
            sink,
            source,
            domain,
            depth,
            buffered: false,
            ring: VecDeque::with_capacity(depth),
            out: None,
            probe: LevelProbe::default(),
        })
    }

    /// Appends the output register stage.
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Returns the effective depth of the storage ring.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns an occupancy probe that stays readable after insertion.
    pub fn probe(&self) -> LevelProbe {
        self.probe.clone()
    }

    fn level(&self) -> usize {
        self.ring.len() + usize::from(self.out.is_some())
    }
}

impl Component for Queue {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.sink, self.ring.len() < self.depth);
        let head = if self.buffered { self.out.clone() } else { self.ring.front().cloned() };
        net.drive_fwd(self.source, head);
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let delivered = net.fire(self.source);
        let stored = if net.fire(self.sink) { net.fwd(self.sink).cloned() } else { None };

        if self.buffered {
            if delivered {
                self.out = None;
            }
            // Refill from pre-edge storage only: the stage costs one step.
            if self.out.is_none() {
                self.out = self.ring.pop_front();
            }
        } else if delivered {
            let _ = self.ring.pop_front();
        }

        if let Some(item) = stored {
            self.ring.push_back(item);
        }

        debug_assert!(self.ring.len() <= self.depth);
        self.probe.record(self.level());
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.source]
    }

    fn drives_bwd(&self) -> Vec<ChannelId> {
        vec![self.sink]
    }

    fn domains(&self) -> Vec<Domain> {
        vec![self.domain]
    }
}

#[cfg(test)]
mod tests {
    use streamflow::Layout;

    use super::*;

    #[test]
    fn shallow_depths_are_raised_to_the_floor() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let layout = Layout::data(8);
        let a = fabric.channel(&layout, domain);
        let b = fabric.channel(&layout, domain);

        let queue = Queue::new(&fabric, a, b, 2).unwrap();
        assert_eq!(queue.depth(), DEPTH_FLOOR);
    }

    #[test]
    fn mismatched_endpoints_are_rejected() {
        let mut fabric = Fabric::new();
        let sys = fabric.domain("sys", 1);
        let aux = fabric.domain("aux", 3);
        let layout = Layout::data(8);
        let a = fabric.channel(&layout, sys);
        let b = fabric.channel(&Layout::data(16), sys);
        let c = fabric.channel(&layout, aux);

        assert!(matches!(Queue::new(&fabric, a, b, 8), Err(BuildError::LayoutMismatch { .. })));
        assert!(matches!(Queue::new(&fabric, a, c, 8), Err(BuildError::DomainMismatch)));
    }
}
