//! Frame re-delimiters: stitching frames together and inserting `last` marks.

use streamflow::{BuildError, ChannelId, Component, Domain, Fabric, Item, Net};

/// Batches `count` consecutive frames into one outer frame.
///
/// `first`/`last` are stripped from every sub-frame boundary except the first
/// of a run of `count` frames and the last; payload passes untouched.
#[derive(Debug)]
pub struct Stitcher {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    count: usize,
    f_idx: usize,
    l_idx: usize,
}

impl Stitcher {
    /// Builds a stitcher batching `count` frames.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, count: usize) -> Result<Self, BuildError> {
        if count == 0 {
            return Err(BuildError::ZeroCount);
        }
        fabric.check_same_layout(sink, source)?;
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;
        Ok(Self { sink, source, domain, count, f_idx: 0, l_idx: 0 })
    }
}

impl Component for Stitcher {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sink).map(|item| Item {
            payload: item.payload.clone(),
            first: item.first && self.f_idx == 0,
            last: item.last && self.l_idx == self.count - 1,
        });
        net.drive_fwd(self.source, head);
        net.drive_ready(self.sink, net.ready(self.source));
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if !net.fire(self.sink) {
            return;
        }
        let item = net.fwd(self.sink).expect("fired");
        if item.first {
            self.f_idx = if self.f_idx < self.count - 1 { self.f_idx + 1 } else { 0 };
        }
        if item.last {
            self.l_idx = if self.l_idx < self.count - 1 { self.l_idx + 1 } else { 0 };
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

/// Forces a `last` mark every `count` transfers, or earlier on an incoming `last`.
///
/// Re-delimits an unframed (or arbitrarily long) stream into bounded frames.
#[derive(Debug)]
pub struct LastInserter {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    count: usize,
    idx: usize,
}

impl LastInserter {
    /// Builds a last-inserter marking every `count`-th transfer.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId, count: usize) -> Result<Self, BuildError> {
        if count == 0 {
            return Err(BuildError::ZeroCount);
        }
        fabric.check_same_layout(sink, source)?;
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;
        Ok(Self { sink, source, domain, count, idx: 0 })
    }
}

impl Component for LastInserter {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sink).map(|item| Item {
            payload: item.payload.clone(),
            first: item.first,
            last: item.last || self.idx == self.count - 1,
        });
        net.drive_fwd(self.source, head);
        net.drive_ready(self.sink, net.ready(self.source));
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        if net.fire(self.source) {
            let last = net.fwd(self.source).map_or(false, |item| item.last);
            self.idx = if last { 0 } else { self.idx + 1 };
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

#[cfg(test)]
mod tests {
    use streamflow::Layout;

    use super::*;

    #[test]
    fn zero_count_is_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let layout = Layout::data(8);
        let a = fabric.channel(&layout, domain);
        let b = fabric.channel(&layout, domain);

        assert_eq!(Stitcher::new(&fabric, a, b, 0).unwrap_err(), BuildError::ZeroCount);
        assert_eq!(LastInserter::new(&fabric, a, b, 0).unwrap_err(), BuildError::ZeroCount);
    }
}
