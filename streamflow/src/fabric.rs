//! The globally-stepped simulation fabric.
//!
//! All combinational logic within one discrete step settles to a fixed point
//! before every due clock edge commits state atomically. Suspension points are
//! exactly two: a producer stalls while `ready` is low, a consumer withholds
//! progress by keeping `ready` low.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::channel::{ChannelId, Domain, Net, Wire};
use crate::error::{BuildError, SimError};
use crate::layout::Layout;

/// A sequential component of the fabric.
///
/// Every component is a Mealy machine: `comb` drives its output wires as a
/// pure function of registered state and input wires, and `edge` commits the
/// next state from the settled wires at a clock edge of one of its domains.
pub trait Component: fmt::Debug {
    /// Drives output wires from registered state and input wires.
    ///
    /// Called repeatedly within one step until the wires settle; it must not
    /// mutate state and must drive the same outputs for the same inputs.
    fn comb(&self, net: &mut Net);

    /// Commits registered state from the settled wires at `domain`'s edge.
    fn edge(&mut self, net: &Net, domain: Domain);

    /// Channels whose forward half this component drives.
    fn drives_fwd(&self) -> Vec<ChannelId> {
        Vec::new()
    }

    /// Channels whose backward half this component drives.
    fn drives_bwd(&self) -> Vec<ChannelId> {
        Vec::new()
    }

    /// Domains whose clock edges this component observes.
    fn domains(&self) -> Vec<Domain>;
}

#[derive(Debug)]
struct DomainClock {
    name: String,
    period: u64,
    next: u64,
}

/// A set of channels and components stepped under common clock domains.
#[derive(Debug, Default)]
pub struct Fabric {
    net: Net,
    components: Vec<Box<dyn Component>>,
    clocks: Vec<DomainClock>,
    members: Vec<Vec<usize>>,
    time: u64,
}

impl Fabric {
    /// Creates an empty fabric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock domain with the given period in abstract ticks.
    ///
    /// Domains with no common period divisor model independently-clocked
    /// execution contexts with no fixed phase relationship.
    pub fn domain(&mut self, name: &str, period: u64) -> Domain {
        assert!(period > 0, "domain period must be positive");
        let id = Domain(self.clocks.len());
        self.clocks.push(DomainClock { name: name.to_string(), period, next: period });
        self.members.push(Vec::new());
        id
    }

    /// Creates a channel carrying `layout` items within `domain`.
    pub fn channel(&mut self, layout: &Arc<Layout>, domain: Domain) -> ChannelId {
        assert!(domain.0 < self.clocks.len(), "unknown domain");
        let id = ChannelId(self.net.wires.len());
        self.net.wires.push(Wire {
            layout: Arc::clone(layout),
            domain,
            fwd: None,
            ready: false,
            fwd_driver: None,
            bwd_driver: None,
        });
        id
    }

    /// Returns the layout a channel carries.
    pub fn layout(&self, id: ChannelId) -> &Arc<Layout> {
        &self.net.wires[id.0].layout
    }

    /// Returns the domain a channel belongs to.
    pub fn domain_of(&self, id: ChannelId) -> Domain {
        self.net.wires[id.0].domain
    }

    /// Returns the current simulation time in ticks.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Checks that a channel carries the expected layout.
    pub fn check_layout(&self, id: ChannelId, layout: &Arc<Layout>) -> Result<(), BuildError> {
        let found = self.layout(id);
        if **found != **layout {
            return Err(BuildError::LayoutMismatch { expected: layout.width(), found: found.width() });
        }
        Ok(())
    }

    /// Checks that two channels carry the same layout.
    pub fn check_same_layout(&self, a: ChannelId, b: ChannelId) -> Result<(), BuildError> {
        let expected = Arc::clone(self.layout(a));
        self.check_layout(b, &expected)
    }

    /// Checks that a channel belongs to the expected domain.
    pub fn check_domain(&self, id: ChannelId, domain: Domain) -> Result<(), BuildError> {
        if self.domain_of(id) != domain {
            return Err(BuildError::DomainMismatch);
        }
        Ok(())
    }

    /// Inserts a component, enforcing the single-driver discipline.
    ///
    /// Fails without observable effect if any claimed channel half already has
    /// a driver.
    pub fn add<C: Component + 'static>(&mut self, component: C) -> Result<(), BuildError> {
        for id in component.drives_fwd() {
            if self.net.wires[id.0].fwd_driver.is_some() {
                return Err(BuildError::DriverConflict("forward"));
            }
        }
        for id in component.drives_bwd() {
            if self.net.wires[id.0].bwd_driver.is_some() {
                return Err(BuildError::DriverConflict("backward"));
            }
        }

        let index = self.components.len();
        for id in component.drives_fwd() {
            self.net.wires[id.0].fwd_driver = Some(index);
        }
        for id in component.drives_bwd() {
            self.net.wires[id.0].bwd_driver = Some(index);
        }
        for domain in component.domains() {
            self.members[domain.0].push(index);
        }
        self.components.push(Box::new(component));
        Ok(())
    }

    /// Advances to the next clock-edge instant and commits all due edges.
    pub fn step(&mut self) -> Result<(), SimError> {
        if self.clocks.is_empty() {
            return Err(SimError::NoDomains);
        }

        let now = self.clocks.iter().map(|clock| clock.next).min().expect("at least one clock");
        self.time = now;
        self.settle()?;

        for id in 0..self.clocks.len() {
            if self.clocks[id].next != now {
                continue;
            }
            trace!(time = now, domain = %self.clocks[id].name, "clock edge");
            for &index in &self.members[id] {
                self.components[index].edge(&self.net, Domain(id));
            }
            self.clocks[id].next = now + self.clocks[id].period;
        }
        Ok(())
    }

    /// Runs `steps` edge instants.
    pub fn run(&mut self, steps: usize) -> Result<(), SimError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Settles combinational wires to a fixed point.
    ///
    /// Wires are cleared and every component's `comb` is re-evaluated until no
    /// wire changes. The pass cap turns a non-converging (combinationally
    /// looped) design into an error instead of a hang.
    fn settle(&mut self) -> Result<(), SimError> {
        for wire in &mut self.net.wires {
            wire.fwd = None;
            wire.ready = false;
        }

        let cap = 2 * self.net.wires.len() + 2;
        for _ in 0..cap {
            self.net.dirty = false;
            for component in &self.components {
                component.comb(&mut self.net);
            }
            if !self.net.dirty {
                return Ok(());
            }
        }
        Err(SimError::CombLoop(cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Item;
    use crate::layout::Record;

    /// Presents one constant item forever.
    #[derive(Debug)]
    struct Constant {
        out: ChannelId,
        domain: Domain,
        item: Item,
    }

    impl Component for Constant {
        fn comb(&self, net: &mut Net) {
            net.drive_fwd(self.out, Some(self.item.clone()));
        }

        fn edge(&mut self, _net: &Net, _domain: Domain) {}

        fn drives_fwd(&self) -> Vec<ChannelId> {
            vec![self.out]
        }

        fn domains(&self) -> Vec<Domain> {
            vec![self.domain]
        }
    }

    /// Counts transfers while always ready.
    #[derive(Debug)]
    struct Counter {
        input: ChannelId,
        domain: Domain,
        count: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl Component for Counter {
        fn comb(&self, net: &mut Net) {
            net.drive_ready(self.input, true);
        }

        fn edge(&mut self, net: &Net, _domain: Domain) {
            if net.fire(self.input) {
                self.count.set(self.count.get() + 1);
            }
        }

        fn drives_bwd(&self) -> Vec<ChannelId> {
            vec![self.input]
        }

        fn domains(&self) -> Vec<Domain> {
            vec![self.domain]
        }
    }

    /// Drives its own backward wire with the inverse of itself.
    #[derive(Debug)]
    struct Inverter {
        chan: ChannelId,
        domain: Domain,
    }

    impl Component for Inverter {
        fn comb(&self, net: &mut Net) {
            let ready = net.ready(self.chan);
            net.drive_ready(self.chan, !ready);
        }

        fn edge(&mut self, _net: &Net, _domain: Domain) {}

        fn drives_bwd(&self) -> Vec<ChannelId> {
            vec![self.chan]
        }

        fn domains(&self) -> Vec<Domain> {
            vec![self.domain]
        }
    }

    #[test]
    fn transfer_iff_valid_and_ready() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let layout = Layout::data(8);
        let chan = fabric.channel(&layout, domain);

        let item = Item::new(Record::new(&layout));
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        fabric.add(Constant { out: chan, domain, item }).unwrap();
        fabric.add(Counter { input: chan, domain, count: std::rc::Rc::clone(&count) }).unwrap();
        fabric.run(10).unwrap();
        assert_eq!(count.get(), 10);
    }

    #[test]
    fn second_forward_driver_is_rejected() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let layout = Layout::data(8);
        let chan = fabric.channel(&layout, domain);

        let item = Item::new(Record::new(&layout));
        fabric.add(Constant { out: chan, domain, item: item.clone() }).unwrap();
        let err = fabric.add(Constant { out: chan, domain, item }).unwrap_err();
        assert_eq!(err, BuildError::DriverConflict("forward"));
    }

    #[test]
    fn non_monotone_comb_is_reported_as_a_loop() {
        let mut fabric = Fabric::new();
        let domain = fabric.domain("sync", 1);
        let layout = Layout::data(8);
        let chan = fabric.channel(&layout, domain);

        fabric.add(Inverter { chan, domain }).unwrap();
        let err = fabric.step().unwrap_err();
        assert!(matches!(err, SimError::CombLoop(_)));
    }

    #[test]
    fn stepping_without_domains_fails() {
        let mut fabric = Fabric::new();
        assert_eq!(fabric.step().unwrap_err(), SimError::NoDomains);
    }

    #[test]
    fn layout_and_domain_checks() {
        let mut fabric = Fabric::new();
        let sys = fabric.domain("sys", 1);
        let aux = fabric.domain("aux", 3);
        let narrow = Layout::data(8);
        let wide = Layout::data(16);
        let chan = fabric.channel(&narrow, sys);

        assert!(fabric.check_layout(chan, &narrow).is_ok());
        assert_eq!(
            fabric.check_layout(chan, &wide).unwrap_err(),
            BuildError::LayoutMismatch { expected: 16, found: 8 }
        );
        assert!(fabric.check_domain(chan, sys).is_ok());
        assert_eq!(fabric.check_domain(chan, aux).unwrap_err(), BuildError::DomainMismatch);
    }
}
