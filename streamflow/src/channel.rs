//! Channels: the valid/ready handshake wires.

use std::sync::Arc;

use crate::layout::{Layout, Record};

/// One payload quantum transferred across a channel in a single handshake.
///
/// `first`/`last` delimit frames; a single item may carry both (zero-length
/// frame). Frame well-formedness is provider-supplied, not enforced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Payload record.
    pub payload: Record,
    /// First item of a frame.
    pub first: bool,
    /// Last item of a frame.
    pub last: bool,
}

impl Item {
    /// Creates an item with both flags clear.
    pub fn new(payload: Record) -> Self {
        Self { payload, first: false, last: false }
    }

    /// Creates an item with explicit flags.
    pub fn with_flags(payload: Record, first: bool, last: bool) -> Self {
        Self { payload, first, last }
    }
}

/// Identifies a channel within a fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub(crate) usize);

/// Identifies a clock domain within a fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain(pub(crate) usize);

/// One channel's wire state.
///
/// Forward half (`fwd`) carries valid+payload producer to consumer; backward
/// half (`ready`) flows consumer to producer. A transfer occurs iff both are
/// asserted in the same step.
#[derive(Debug)]
pub(crate) struct Wire {
    pub(crate) layout: Arc<Layout>,
    pub(crate) domain: Domain,
    pub(crate) fwd: Option<Item>,
    pub(crate) ready: bool,
    pub(crate) fwd_driver: Option<usize>,
    pub(crate) bwd_driver: Option<usize>,
}

/// The view of all channel wires a component sees during one step.
///
/// `drive_*` calls record whether any wire actually changed, which is what the
/// fabric's fixed-point settle loop watches.
#[derive(Debug, Default)]
pub struct Net {
    pub(crate) wires: Vec<Wire>,
    pub(crate) dirty: bool,
}

impl Net {
    /// Returns true iff the channel's forward half is valid.
    pub fn valid(&self, id: ChannelId) -> bool {
        self.wires[id.0].fwd.is_some()
    }

    /// Returns the channel's forward item, if valid.
    pub fn fwd(&self, id: ChannelId) -> Option<&Item> {
        self.wires[id.0].fwd.as_ref()
    }

    /// Returns the channel's backward (ready) half.
    pub fn ready(&self, id: ChannelId) -> bool {
        self.wires[id.0].ready
    }

    /// Returns true iff a transfer occurs on this channel in this step.
    pub fn fire(&self, id: ChannelId) -> bool {
        self.valid(id) && self.ready(id)
    }

    /// Drives the channel's forward half.
    pub fn drive_fwd(&mut self, id: ChannelId, value: Option<Item>) {
        let wire = &mut self.wires[id.0];
        if wire.fwd != value {
            wire.fwd = value;
            self.dirty = true;
        }
    }

    /// Drives the channel's backward half.
    pub fn drive_ready(&mut self, id: ChannelId, ready: bool) {
        let wire = &mut self.wires[id.0];
        if wire.ready != ready {
            wire.ready = ready;
            self.dirty = true;
        }
    }
}
