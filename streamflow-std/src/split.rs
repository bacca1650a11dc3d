//! Stream splitter: disjoint field subsets of one sink fanned out to N sources.

use std::collections::HashSet;
use std::sync::Arc;

use itertools::izip;
use streamflow::{Bits, BuildError, ChannelId, Component, Domain, Fabric, Item, Layout, Net, Record};

/// Copies a branch's fields out of the sink payload.
#[derive(Debug)]
struct Projection {
    /// `(sink_offset, width, branch_offset)` per branch field.
    ranges: Vec<(usize, usize, usize)>,
    layout: Arc<Layout>,
}

/// Splits the fields of one sink stream into several source streams.
///
/// The branch layouts must partition the sink layout exactly. Each source is
/// valid while the sink is valid and that source has not yet completed its
/// share of the current item; the sink is acknowledged once every source has
/// completed, making each item a barrier across the N consumers.
#[derive(Debug)]
pub struct Splitter {
    sink: ChannelId,
    sources: Vec<ChannelId>,
    domain: Domain,
    proj: Vec<Projection>,
    done: Vec<bool>,
}

impl Splitter {
    /// Builds a splitter from `sink` onto `sources`.
    pub fn new(fabric: &Fabric, sink: ChannelId, sources: &[ChannelId]) -> Result<Self, BuildError> {
        if sources.is_empty() {
            return Err(BuildError::NoSinks);
        }
        let domain = fabric.domain_of(sink);
        let parent = Arc::clone(fabric.layout(sink));

        let mut used = HashSet::new();
        let mut proj = Vec::with_capacity(sources.len());
        for &source in sources {
            fabric.check_domain(source, domain)?;
            let branch = fabric.layout(source);
            let mut ranges = Vec::with_capacity(branch.fields().len());
            for field in branch.fields() {
                let parent_field = parent
                    .field(field.name())
                    .ok_or_else(|| BuildError::UnknownField(field.name().to_string()))?;
                if parent_field.width() != field.width() {
                    return Err(BuildError::FieldWidthMismatch {
                        name: field.name().to_string(),
                        parent: parent_field.width(),
                        branch: field.width(),
                    });
                }
                if !used.insert(field.name().to_string()) {
                    return Err(BuildError::DuplicateField(field.name().to_string()));
                }
                ranges.push((parent_field.offset(), field.width(), field.offset()));
            }
            proj.push(Projection { ranges, layout: Arc::clone(branch) });
        }

        for field in parent.fields() {
            if !used.contains(field.name()) {
                return Err(BuildError::UnassignedField(field.name().to_string()));
            }
        }

        Ok(Self { sink, sources: sources.to_vec(), domain, proj, done: vec![false; sources.len()] })
    }
}

impl Component for Splitter {
    fn comb(&self, net: &mut Net) {
        let item = net.fwd(self.sink).cloned();
        for (&source, proj, &done) in izip!(&self.sources, &self.proj, &self.done) {
            let head = match &item {
                Some(item) if !done => {
                    let mut bits = Bits::zero(proj.layout.width());
                    for &(sink_offset, width, branch_offset) in &proj.ranges {
                        bits.splice(branch_offset, &item.payload.bits().slice(sink_offset, width));
                    }
                    Some(Item {
                        payload: Record::from_bits(&proj.layout, bits),
                        first: item.first,
                        last: item.last,
                    })
                }
                _ => None,
            };
            net.drive_fwd(source, head);
        }

        let ready = izip!(&self.sources, &self.done).all(|(&source, &done)| done || net.ready(source));
        net.drive_ready(self.sink, ready);
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let flows = self.sources.iter().map(|&source| net.fire(source)).collect::<Vec<_>>();
        let end = izip!(&flows, &self.done).all(|(&flow, &done)| flow || done);

        if end {
            self.done.iter_mut().for_each(|done| *done = false);
        } else {
            for (done, &flow) in izip!(&mut self.done, &flows) {
                if flow {
                    *done = true;
                }
            }
        }
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        self.sources.clone()
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

    fn three_way() -> (Fabric, ChannelId, Vec<ChannelId>) {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let parent = Layout::new([("data", 8), ("other", 8), ("another", 8)]).unwrap();
        let sink = fabric.channel(&parent, domain);
        let sources = ["data", "other", "another"]
            .into_iter()
            .map(|name| fabric.channel(&Layout::new([(name, 8)]).unwrap(), domain))
            .collect();
        (fabric, sink, sources)
    }

    #[test]
    fn exact_partition_is_accepted() {
        let (fabric, sink, sources) = three_way();
        assert!(Splitter::new(&fabric, sink, &sources).is_ok());
    }

    #[test]
    fn unknown_duplicate_and_unassigned_fields_are_rejected() {
        let (mut fabric, sink, sources) = three_way();
        let domain = fabric.domain_of(sink);

        let stranger = fabric.channel(&Layout::new([("stranger", 8)]).unwrap(), domain);
        assert_eq!(
            Splitter::new(&fabric, sink, &[sources[0], sources[1], stranger]).unwrap_err(),
            BuildError::UnknownField("stranger".to_string())
        );

        let again = fabric.channel(&Layout::new([("data", 8)]).unwrap(), domain);
        assert_eq!(
            Splitter::new(&fabric, sink, &[sources[0], sources[1], sources[2], again]).unwrap_err(),
            BuildError::DuplicateField("data".to_string())
        );

        assert_eq!(
            Splitter::new(&fabric, sink, &[sources[0], sources[1]]).unwrap_err(),
            BuildError::UnassignedField("another".to_string())
        );
    }

    #[test]
    fn width_mismatches_are_rejected() {
        let (mut fabric, sink, sources) = three_way();
        let domain = fabric.domain_of(sink);
        let narrow = fabric.channel(&Layout::new([("another", 4)]).unwrap(), domain);
        assert_eq!(
            Splitter::new(&fabric, sink, &[sources[0], sources[1], narrow]).unwrap_err(),
            BuildError::FieldWidthMismatch { name: "another".to_string(), parent: 8, branch: 4 }
        );
    }
}
