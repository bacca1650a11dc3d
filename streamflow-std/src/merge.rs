//! Stream merger: disjoint fields from N sinks rendezvous into one source.

use std::sync::Arc;

use itertools::izip;
use streamflow::{Bits, BuildError, ChannelId, Component, Domain, Fabric, FieldDef, Item, Layout, Net, Record};

use crate::register_slice::PipeValid;

/// Merges all the fields coming from multiple sink streams into one source.
///
/// The source becomes valid only when every sink is valid; all sinks are
/// acknowledged together in the step the merged output is accepted.
/// `first`/`last` on the merged output are the OR across the sinks' own flags.
/// The merged output is staged through a [`PipeValid`].
#[derive(Debug)]
pub struct Merger;

impl Merger {
    /// Returns the layout the merged source must carry: the concatenation of
    /// the sink layouts, in order.
    pub fn layout(fabric: &Fabric, sinks: &[ChannelId]) -> Result<Arc<Layout>, BuildError> {
        if sinks.is_empty() {
            return Err(BuildError::NoSinks);
        }
        let mut defs = Vec::new();
        for &sink in sinks {
            for field in fabric.layout(sink).fields() {
                defs.push(FieldDef::Leaf(field.name().to_string(), field.width()));
            }
        }
        Layout::new(defs)
    }

    /// Inserts a merger from `sinks` onto `source`.
    pub fn insert(fabric: &mut Fabric, sinks: &[ChannelId], source: ChannelId) -> Result<(), BuildError> {
        let merged = Self::layout(fabric, sinks)?;
        fabric.check_layout(source, &merged)?;

        let domain = fabric.domain_of(source);
        let mut offsets = Vec::with_capacity(sinks.len());
        let mut offset = 0;
        for &sink in sinks {
            fabric.check_domain(sink, domain)?;
            offsets.push(offset);
            offset += fabric.layout(sink).width();
        }

        let staged = fabric.channel(&merged, domain);
        let pipe = PipeValid::new(fabric, staged, source)?;
        fabric.add(MergeComb { sinks: sinks.to_vec(), staged, domain, layout: merged, offsets })?;
        fabric.add(pipe)
    }
}

/// Combinational rendezvous half of the merger.
#[derive(Debug)]
struct MergeComb {
    sinks: Vec<ChannelId>,
    staged: ChannelId,
    domain: Domain,
    layout: Arc<Layout>,
    offsets: Vec<usize>,
}

impl Component for MergeComb {
    fn comb(&self, net: &mut Net) {
        let all_valid = self.sinks.iter().all(|&sink| net.valid(sink));

        let head = all_valid.then(|| {
            let mut bits = Bits::zero(self.layout.width());
            let mut first = false;
            let mut last = false;
            for (&sink, &offset) in izip!(&self.sinks, &self.offsets) {
                let item = net.fwd(sink).expect("all sinks valid");
                bits.splice(offset, item.payload.bits());
                first |= item.first;
                last |= item.last;
            }
            Item { payload: Record::from_bits(&self.layout, bits), first, last }
        });
        net.drive_fwd(self.staged, head);

        let ack = all_valid && net.ready(self.staged);
        for &sink in &self.sinks {
            net.drive_ready(sink, ack);
        }
    }

    fn edge(&mut self, _net: &Net, _domain: Domain) {}

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.staged]
    }

    fn drives_bwd(&self) -> Vec<ChannelId> {
        self.sinks.clone()
    }

    fn domains(&self) -> Vec<Domain> {
        vec![self.domain]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_layout_concatenates_in_order() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let a = fabric.channel(&Layout::new([("data", 8)]).unwrap(), domain);
        let b = fabric.channel(&Layout::new([("other", 4)]).unwrap(), domain);

        let merged = Merger::layout(&fabric, &[a, b]).unwrap();
        assert_eq!(merged.width(), 12);
        assert_eq!(merged.field("other").unwrap().offset(), 8);
    }

    #[test]
    fn duplicate_fields_across_sinks_are_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let a = fabric.channel(&Layout::data(8), domain);
        let b = fabric.channel(&Layout::data(8), domain);

        assert_eq!(Merger::layout(&fabric, &[a, b]).unwrap_err(), BuildError::DuplicateField("data".to_string()));
    }

    #[test]
    fn no_sinks_is_rejected() {
        let fabric = Fabric::new();
        assert_eq!(Merger::layout(&fabric, &[]).unwrap_err(), BuildError::NoSinks);
    }
}
