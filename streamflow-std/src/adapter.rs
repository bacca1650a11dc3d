//! Field-matched connector between two differently-shaped channels.

use std::sync::Arc;

use streamflow::{Bits, BuildError, ChannelId, Component, Domain, Fabric, Item, Layout, Net, Record};

/// Copies identically-named fields from sink to source, item by item.
///
/// Every field the source layout requires must exist on the sink layout with
/// the same width; the check happens at construction, so a pipeline that
/// builds never drops a required field at run time. Extra sink fields are
/// simply not forwarded. Flags pass through.
#[derive(Debug)]
pub struct Adapter {
    sink: ChannelId,
    source: ChannelId,
    domain: Domain,
    out_layout: Arc<Layout>,
    /// `(sink_offset, width, source_offset)` per forwarded field.
    ranges: Vec<(usize, usize, usize)>,
}

impl Adapter {
    /// Builds a field-matched connector between `sink` and `source`.
    pub fn new(fabric: &Fabric, sink: ChannelId, source: ChannelId) -> Result<Self, BuildError> {
        let domain = fabric.domain_of(sink);
        fabric.check_domain(source, domain)?;

        let from = fabric.layout(sink);
        let to = fabric.layout(source);
        let mut ranges = Vec::with_capacity(to.fields().len());
        for field in to.fields() {
            let found = from
                .field(field.name())
                .ok_or_else(|| BuildError::UnknownField(field.name().to_string()))?;
            if found.width() != field.width() {
                return Err(BuildError::FieldWidthMismatch {
                    name: field.name().to_string(),
                    parent: found.width(),
                    branch: field.width(),
                });
            }
            ranges.push((found.offset(), field.width(), field.offset()));
        }

        Ok(Self { sink, source, domain, out_layout: Arc::clone(to), ranges })
    }
}

impl Component for Adapter {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sink).map(|item| {
            let mut bits = Bits::zero(self.out_layout.width());
            for &(sink_offset, width, source_offset) in &self.ranges {
                bits.splice(source_offset, &item.payload.bits().slice(sink_offset, width));
            }
            Item { payload: Record::from_bits(&self.out_layout, bits), first: item.first, last: item.last }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let a = fabric.channel(&Layout::new([("data", 8), ("extra", 4)]).unwrap(), domain);
        let b = fabric.channel(&Layout::new([("data", 8), ("missing", 4)]).unwrap(), domain);

        assert_eq!(
            Adapter::new(&fabric, a, b).unwrap_err(),
            BuildError::UnknownField("missing".to_string())
        );
    }

    #[test]
    fn subset_connections_are_accepted() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let a = fabric.channel(&Layout::new([("data", 8), ("extra", 4)]).unwrap(), domain);
        let b = fabric.channel(&Layout::new([("data", 8)]).unwrap(), domain);

        assert!(Adapter::new(&fabric, a, b).is_ok());
    }
}
