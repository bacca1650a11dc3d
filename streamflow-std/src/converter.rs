//! Width converters for valid-ready channels.
//!
//! Payloads are reinterpreted as raw bits: a wide item is split into `ratio`
//! narrow items (or `ratio` narrow items merged into one wide item) while
//! frame boundaries are preserved across the conversion.

use std::sync::Arc;

use streamflow::{Bits, BuildError, ChannelId, Component, Domain, Fabric, Item, Layout, Net, Record};

use crate::queue::DEPTH_FLOOR;
use crate::queue_async::AsyncQueue;

/// Checks that the two widths divide evenly and returns the ratio.
fn check_ratio(from: usize, to: usize) -> Result<usize, BuildError> {
    let (big, small) = if from > to { (from, to) } else { (to, from) };
    if small == 0 || big % small != 0 {
        return Err(BuildError::RatioNotIntegral { from, to });
    }
    Ok(big / small)
}

/// Narrowing converter: one wide item becomes `ratio` consecutive narrow items.
///
/// `first` is set only on the first sub-item and `last` only on the final one;
/// the wide item is acknowledged only together with its last sub-item.
#[derive(Debug)]
pub struct Down {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    out_layout: Arc<Layout>,
    ratio: usize,
    nbits_to: usize,
    reverse: bool,
    mux: usize,
}

impl Down {
    /// Builds a narrowing converter; `reverse` emits the most-significant slot first.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, reverse: bool) -> Result<Self, BuildError> {
        let from = fabric.layout(sink).width();
        let to = fabric.layout(source).width();
        let ratio = check_ratio(from, to)?;
        if from < to {
            return Err(BuildError::RatioNotIntegral { from, to });
        }
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;

        Ok(Self {
            sink,
            source,
            domain,
            out_layout: Arc::clone(fabric.layout(source)),
            ratio,
            nbits_to: to,
            reverse,
            mux: 0,
        })
    }
}

impl Component for Down {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sink).map(|item| {
            let slot = if self.reverse { self.ratio - 1 - self.mux } else { self.mux };
            let bits = item.payload.bits().slice(slot * self.nbits_to, self.nbits_to);
            Item {
                payload: Record::from_bits(&self.out_layout, bits),
                first: item.first && self.mux == 0,
                last: item.last && self.mux == self.ratio - 1,
            }
        });
        net.drive_fwd(self.source, head);
        net.drive_ready(self.sink, self.mux == self.ratio - 1 && net.ready(self.source));
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if net.fire(self.source) {
            self.mux = if self.mux == self.ratio - 1 { 0 } else { self.mux + 1 };
        }
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

/// Widening converter: `ratio` consecutive narrow items merge into one wide item.
///
/// `first` of the wide item is the OR over the merged narrow `first`s. The
/// group closes when it reaches `ratio` slots or early when a narrow item
/// carries `last`; on early closure the unwritten slots are zero.
#[derive(Debug)]
pub struct Up {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    out_layout: Arc<Layout>,
    ratio: usize,
    nbits_from: usize,
    reverse: bool,
    demux: usize,
    strobe_all: bool,
    acc: Bits,
    first: bool,
    last: bool,
}

impl Up {
    /// Builds a widening converter; `reverse` fills the most-significant slot first.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, reverse: bool) -> Result<Self, BuildError> {
        let from = fabric.layout(sink).width();
        let to = fabric.layout(source).width();
        let ratio = check_ratio(from, to)?;
        if from > to {
            return Err(BuildError::RatioNotIntegral { from, to });
        }
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;

        Ok(Self {
            sink,
            source,
            domain,
            out_layout: Arc::clone(fabric.layout(source)),
            ratio,
            nbits_from: from,
            reverse,
            demux: 0,
            strobe_all: false,
            acc: Bits::zero(to),
            first: false,
            last: false,
        })
    }
}

impl Component for Up {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.sink, !self.strobe_all || net.ready(self.source));
        let head = self.strobe_all.then(|| Item {
            payload: Record::from_bits(&self.out_layout, self.acc.clone()),
            first: self.first,
            last: self.last,
        });
        net.drive_fwd(self.source, head);
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let source_fire = net.fire(self.source);
        let source_ready = net.ready(self.source);
        let loaded = if net.fire(self.sink) { net.fwd(self.sink).cloned() } else { None };
        let demux_last = loaded.as_ref().map_or(false, |item| self.demux == self.ratio - 1 || item.last);

        match (&loaded, source_fire) {
            (Some(item), true) => {
                self.first = item.first;
                self.last = item.last;
            }
            (None, true) => {
                self.first = false;
                self.last = false;
            }
            (Some(item), false) => {
                self.first |= item.first;
                self.last |= item.last;
            }
            (None, false) => {}
        }

        if let Some(item) = &loaded {
            if self.demux == 0 {
                // A fresh group starts over zeroed slots: early closure pads.
                self.acc = Bits::zero(self.out_layout.width());
            }
            let slot = if self.reverse { self.ratio - 1 - self.demux } else { self.demux };
            self.acc.splice(slot * self.nbits_from, item.payload.bits());

            self.demux = if demux_last { 0 } else { self.demux + 1 };
        }

        self.strobe_all = demux_last || (self.strobe_all && !source_ready);
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

/// Identity converter: equal widths pass through, reinterpreted on the egress layout.
#[derive(Debug)]
pub struct Passthrough {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    out_layout: Arc<Layout>,
}

impl Passthrough {
    /// Builds an identity stage between two equal-width channels.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId) -> Result<Self, BuildError> {
        let from = fabric.layout(sink).width();
        let to = fabric.layout(source).width();
        if from != to {
            return Err(BuildError::LayoutMismatch { expected: from, found: to });
        }
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;
        Ok(Self { sink, source, domain, out_layout: Arc::clone(fabric.layout(source)) })
    }
}

impl Component for Passthrough {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sink).map(|item| Item {
            payload: Record::from_bits(&self.out_layout, item.payload.bits().clone()),
            first: item.first,
            last: item.last,
        });
        net.drive_fwd(self.source, head);
        net.drive_ready(self.sink, net.ready(self.source));
    }

    fn edge(&mut self, _net: &Net, _domain: Domain) {}

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

/// Inserts the width converter matching the two endpoint widths.
pub fn insert_width_converter(
    fabric: &mut Fabric, sink: ChannelId, source: ChannelId, reverse: bool,
) -> Result<(), BuildError> {
    let from = fabric.layout(sink).width();
    let to = fabric.layout(source).width();
    if from > to {
        let down = Down::new(fabric, sink, source, reverse)?;
        fabric.add(down)
    } else if from < to {
        let up = Up::new(fabric, sink, source, reverse)?;
        fabric.add(up)
    } else {
        let identity = Passthrough::new(fabric, sink, source)?;
        fabric.add(identity)
    }
}

/// Options for [`insert_converter`].
#[derive(Debug, Clone, Copy)]
pub struct ConverterOptions {
    /// Most-significant slot first.
    pub reverse: bool,
    /// Buffer the cross-domain queue's read side.
    pub buffered: bool,
    /// Convert width on the ingress side of the domain crossing.
    ///
    /// The crossing is costly per bit, so converting first is cheaper when
    /// narrowing; converting last keeps the conversion in the faster domain.
    pub width_converter_first: bool,
    /// Cross-domain queue depth.
    pub depth: usize,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self { reverse: false, buffered: true, width_converter_first: true, depth: DEPTH_FLOOR }
    }
}

/// Inserts a width and/or domain converter between two channels.
///
/// Equal widths in one domain degenerate to an identity stage; differing
/// domains route through an [`AsyncQueue`] on the side selected by
/// [`ConverterOptions::width_converter_first`].
pub fn insert_converter(
    fabric: &mut Fabric, sink: ChannelId, source: ChannelId, options: ConverterOptions,
) -> Result<(), BuildError> {
    let from = fabric.layout(sink).width();
    let to = fabric.layout(source).width();
    check_ratio(from, to)?;

    let crossing = fabric.domain_of(sink) != fabric.domain_of(source);
    if !crossing {
        return insert_width_converter(fabric, sink, source, options.reverse);
    }

    if from == to {
        let queue = AsyncQueue::new(fabric, sink, source, options.depth)?;
        let queue = if options.buffered { queue.buffered() } else { queue };
        return fabric.add(queue);
    }

    let (mid_layout, mid_domain) = if options.width_converter_first {
        (Arc::clone(fabric.layout(source)), fabric.domain_of(sink))
    } else {
        (Arc::clone(fabric.layout(sink)), fabric.domain_of(source))
    };
    let mid = fabric.channel(&mid_layout, mid_domain);

    if options.width_converter_first {
        insert_width_converter(fabric, sink, mid, options.reverse)?;
        let queue = AsyncQueue::new(fabric, mid, source, options.depth)?;
        let queue = if options.buffered { queue.buffered() } else { queue };
        fabric.add(queue)
    } else {
        let queue = AsyncQueue::new(fabric, sink, mid, options.depth)?;
        let queue = if options.buffered { queue.buffered() } else { queue };
        fabric.add(queue)?;
        insert_width_converter(fabric, mid, source, options.reverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_integer_ratios_are_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let wide = fabric.channel(&Layout::data(12), domain);
        let narrow = fabric.channel(&Layout::data(8), domain);

        assert_eq!(
            Down::new(&fabric, wide, narrow, false).unwrap_err(),
            BuildError::RatioNotIntegral { from: 12, to: 8 }
        );
        assert_eq!(
            Up::new(&fabric, narrow, wide, false).unwrap_err(),
            BuildError::RatioNotIntegral { from: 8, to: 12 }
        );
    }

    #[test]
    fn converters_reject_the_wrong_direction() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let wide = fabric.channel(&Layout::data(16), domain);
        let narrow = fabric.channel(&Layout::data(8), domain);

        assert!(Down::new(&fabric, narrow, wide, false).is_err());
        assert!(Up::new(&fabric, wide, narrow, false).is_err());
    }
}
