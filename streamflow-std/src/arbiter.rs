//! Frame-atomic round-robin arbiter.

use streamflow::{BuildError, ChannelId, Component, Domain, Fabric, Net};
use tracing::debug;

/// Computes the next grant from the current grant and the request set.
///
/// Scans `(grant+1 ..= grant+n) mod n` and returns the first requesting index,
/// or `grant` unchanged when nothing requests.
pub fn next_grant(grant: usize, requests: &[bool]) -> usize {
    let n = requests.len();
    (1..=n).map(|k| (grant + k) % n).find(|&i| requests[i]).unwrap_or(grant)
}

/// Selects one stream among all valid sinks and bypasses it to the source.
///
/// Re-selection happens only after the granted sink's `last`-delimited frame
/// fully completes, so no frame from two different sinks is ever interleaved.
/// Any continuously requesting sink is granted at least once per N completed
/// frames.
#[derive(Debug)]
pub struct Arbiter {
    sinks: Vec<ChannelId>,
    source: ChannelId,
    domain: Domain,
    grant: usize,
    ongoing: bool,
}

impl Arbiter {
    /// Builds an arbiter over `sinks`; their order defines the ring order.
    pub fn new(fabric: &Fabric, sinks: &[ChannelId], source: ChannelId) -> Result<Self, BuildError> {
        if sinks.is_empty() {
            return Err(BuildError::NoSinks);
        }
        let domain = fabric.domain_of(source);
        for &sink in sinks {
            fabric.check_same_layout(sink, source)?;
            fabric.check_domain(sink, domain)?;
        }
        Ok(Self { sinks: sinks.to_vec(), source, domain, grant: 0, ongoing: false })
    }
}

impl Component for Arbiter {
    fn comb(&self, net: &mut Net) {
        let head = net.fwd(self.sinks[self.grant]).cloned();
        net.drive_fwd(self.source, head);
        let ready = net.ready(self.source);
        for (i, &sink) in self.sinks.iter().enumerate() {
            net.drive_ready(sink, i == self.grant && ready);
        }
    }

    fn edge(&mut self, net: &Net, _domain: Domain) {
        let pending = net.valid(self.source);
        let fire = net.fire(self.source);
        let last = net.fwd(self.source).map_or(false, |item| item.last);
        let complete = fire && last;

        // Re-select only when the current frame has completed, or nothing is
        // ongoing or pending.
        let run = !(self.ongoing || pending) || complete;

        if fire {
            self.ongoing = !last;
        }
        if run {
            let requests = self.sinks.iter().map(|&sink| net.valid(sink)).collect::<Vec<_>>();
            let grant = next_grant(self.grant, &requests);
            if grant != self.grant {
                debug!(from = self.grant, to = grant, "arbiter grant moved");
            }
            self.grant = grant;
        }
    }

    fn drives_fwd(&self) -> Vec<ChannelId> {
        vec![self.source]
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
    fn next_grant_scans_past_the_current_holder() {
        assert_eq!(next_grant(0, &[true, true, false, false]), 1);
        assert_eq!(next_grant(1, &[true, false, false, true]), 3);
        assert_eq!(next_grant(3, &[false, true, true, false]), 1);
    }

    #[test]
    fn next_grant_holds_when_nothing_requests() {
        assert_eq!(next_grant(2, &[false, false, false, false]), 2);
    }

    #[test]
    fn next_grant_returns_to_a_lone_requester() {
        assert_eq!(next_grant(2, &[false, false, true, false]), 2);
        assert_eq!(next_grant(0, &[false, false, false, false, true]), 4);
    }

    #[test]
    fn empty_sink_list_is_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let source = fabric.channel(&streamflow::Layout::data(8), domain);
        assert_eq!(Arbiter::new(&fabric, &[], source).unwrap_err(), BuildError::NoSinks);
    }
}
