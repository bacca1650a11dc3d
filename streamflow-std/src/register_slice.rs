//! Retiming stages for valid-ready channels.
//!
//! Both stages decouple timing without altering the transferred sequence or
//! frame boundaries; each adds one item of storage.

use streamflow::{BuildError, ChannelId, Component, Domain, Fabric, Item, Net};

/// Valid-gated pipeline register: cuts the forward (valid/payload) path.
///
/// Loads whenever the output register is empty or being drained; adds one step
/// of latency.
#[derive(Debug)]
pub struct PipeValid {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    out: Option<Item>,
}

impl PipeValid {
    /// Builds a valid-gated stage between `sink` and `source`.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId) -> Result<Self, BuildError> {
        fabric.check_same_layout(sink, source)?;
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;
        Ok(Self { sink, source, domain, out: None })
    }
}

impl Component for PipeValid {
    fn comb(&self, net: &mut Net) {
        net.drive_fwd(self.source, self.out.clone());
        net.drive_ready(self.sink, self.out.is_none() || net.ready(self.source));
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let en = self.out.is_none() || net.ready(self.source);
        if en {
            self.out = net.fwd(self.sink).cloned();
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

/// Ready-gated register with one item of skid storage: cuts the backward path.
///
/// Upstream sees readiness one step ahead of actual consumption; an item
/// launched at a not-yet-ready consumer is parked in the skid register rather
/// than lost.
#[derive(Debug)]
pub struct PipeReady {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    parked: bool,
    stash: Option<Item>,
}

impl PipeReady {
    /// Builds a ready-gated stage between `sink` and `source`.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId) -> Result<Self, BuildError> {
        fabric.check_same_layout(sink, source)?;
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;
        Ok(Self { sink, source, domain, parked: false, stash: None })
    }
}

impl Component for PipeReady {
    fn comb(&self, net: &mut Net) {
        net.drive_ready(self.sink, !self.parked);
        let head = if self.parked { self.stash.clone() } else { net.fwd(self.sink).cloned() };
        net.drive_fwd(self.source, head);
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let sink_valid = net.valid(self.sink);
        let source_ready = net.ready(self.source);

        // Park the in-flight item before the ready register flips.
        if !source_ready && !self.parked {
            self.stash = net.fwd(self.sink).cloned();
        }
        if sink_valid && !source_ready {
            self.parked = true;
        } else if source_ready {
            self.parked = false;
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
