//! Cross-domain FIFO queue with Gray-coded pointer synchronizers.
//!
//! The only legal way to move items between independently-clocked domains.
//! Each side exchanges its pointer as a Gray code through a multi-stage
//! synchronizer clocked in the destination domain, so each side's occupancy
//! view may lag (under-reporting data or space) but never runs ahead.

use static_assertions::const_assert;
use streamflow::{clog2, gray_encode, mask, BuildError, ChannelId, Component, Domain, Fabric, Item, Net};

use crate::queue::clamp_depth;

const SYNC_STAGES: usize = 2;
const_assert!(SYNC_STAGES >= 2);

/// Cross-domain FIFO buffering between two independently-clocked channels.
///
/// Same external contract as [`crate::Queue`]; the effective depth is the
/// requested depth raised to the floor and rounded up to a power of two
/// (Gray-pointer wrap arithmetic requires it).
#[derive(Debug)]
pub struct AsyncQueue {
    sink: ChannelId,
    source: ChannelId,
    write_domain: Domain,
    read_domain: Domain,
    depth: usize,
    ptr_bits: usize,
    ring: Vec<Option<Item>>,
    wbin: u64,
    rbin: u64,
    /// Read pointer image, synchronized into the write domain.
    rgray_sync: [u64; SYNC_STAGES],
    /// Write pointer image, synchronized into the read domain.
    wgray_sync: [u64; SYNC_STAGES],
    buffered: bool,
    out: Option<Item>,
}

impl AsyncQueue {
    /// Builds a cross-domain queue of at least `depth` items.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, depth: usize) -> Result<Self, BuildError> {
        fabric.check_same_layout(sink, source)?;
        let write_domain = fabric.domain_of(sink);
        let read_domain = fabric.domain_of(source);

        let depth = clamp_depth(depth).next_power_of_two();
        let ptr_bits = clog2(depth) + 1;
        Ok(Self {
            sink,
            source,
            write_domain,
            read_domain,
            depth,
            ptr_bits,
            ring: vec![None; depth],
            wbin: 0,
            rbin: 0,
            rgray_sync: [0; SYNC_STAGES],
            wgray_sync: [0; SYNC_STAGES],
            buffered: false,
            out: None,
        })
    }

    /// Appends the output register stage on the read side.
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Returns the effective depth of the storage ring.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Full test against the (conservative) synchronized read pointer.
    fn full(&self) -> bool {
        let invert_top = 0b11 << (self.ptr_bits - 2);
        gray_encode(self.wbin) == self.rgray_sync[SYNC_STAGES - 1] ^ invert_top
    }

    /// Empty test against the (conservative) synchronized write pointer.
    fn empty(&self) -> bool {
        gray_encode(self.rbin) == self.wgray_sync[SYNC_STAGES - 1]
    }

    fn slot(&self, ptr: u64) -> usize {
        (ptr % self.depth as u64) as usize
    }

    fn write_edge(&mut self, net: &Net) {
        let snap = gray_encode(self.rbin);
        for i in (1..SYNC_STAGES).rev() {
            self.rgray_sync[i] = self.rgray_sync[i - 1];
        }
        self.rgray_sync[0] = snap;

        if net.fire(self.sink) {
            let slot = self.slot(self.wbin);
            self.ring[slot] = net.fwd(self.sink).cloned();
            self.wbin = (self.wbin + 1) & mask(self.ptr_bits);
        }
    }

    fn read_edge(&mut self, net: &Net) {
        let snap = gray_encode(self.wbin);
        let empty = self.empty();
        for i in (1..SYNC_STAGES).rev() {
            self.wgray_sync[i] = self.wgray_sync[i - 1];
        }
        self.wgray_sync[0] = snap;

        if self.buffered {
            if net.fire(self.source) {
                self.out = None;
            }
            if self.out.is_none() && !empty {
                self.out = self.ring[self.slot(self.rbin)].clone();
                self.rbin = (self.rbin + 1) & mask(self.ptr_bits);
            }
        } else if net.fire(self.source) {
            self.rbin = (self.rbin + 1) & mask(self.ptr_bits);
        }
    }
}

impl Component for AsyncQueue {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.sink, !self.full());
        let head = if self.buffered {
            self.out.clone()
        } else if self.empty() {
            None
        } else {
            self.ring[self.slot(self.rbin)].clone()
        };
        net.drive_fwd(self.source, head);
    }

    fn edge(&mut self, net: &Net, domain: Domain) {
        if domain == self.write_domain {
            self.write_edge(net);
        }
        if domain == self.read_domain {
            self.read_edge(net);
        }
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.source]
    }

    fn drives_bwd(&self) -> Vec<ChannelId> {
        vec![self.sink]
    }

    fn domains(&self) -> Vec<Domain> {
        if self.write_domain == self.read_domain {
            vec![self.write_domain]
        } else {
            vec![self.write_domain, self.read_domain]
        }
    }
}

#[cfg(test)]
mod tests {
    use streamflow::Layout;

    use super::*;

    #[test]
    fn depth_is_clamped_and_rounded_to_a_power_of_two() {
        let mut fabric = Fabric::new();
        let write = fabric.domain("write", 3);
        let read = fabric.domain("read", 7);
        let layout = Layout::data(8);
        let a = fabric.channel(&layout, write);
        let b = fabric.channel(&layout, read);

        assert_eq!(AsyncQueue::new(&fabric, a, b, 2).unwrap().depth(), 8);
        assert_eq!(AsyncQueue::new(&fabric, a, b, 9).unwrap().depth(), 16);
    }
}
