//! Construction-time and run-time error types.

use thiserror::Error;

/// Errors surfaced while building a pipeline.
///
/// All configuration is validated eagerly: a pipeline that builds never fails
/// for configuration reasons at run time, and a failed build leaves no partial
/// construction behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A payload field collides with one of the handshake signal names.
    #[error("field `{0}` cannot be used in a payload layout")]
    ReservedField(String),

    /// A payload field name is attributed more than once.
    #[error("field `{0}` already attributed in payload layout")]
    DuplicateField(String),

    /// A branch layout names a field the parent layout does not have.
    #[error("field `{0}` not found in parent layout")]
    UnknownField(String),

    /// A parent field is assigned to no branch.
    #[error("field `{0}` is assigned to no branch")]
    UnassignedField(String),

    /// A field exists on both sides but with different widths.
    #[error("field `{name}` width differs: parent has {parent} bits, branch has {branch} bits")]
    FieldWidthMismatch {
        /// Field name.
        name: String,
        /// Width on the parent layout.
        parent: usize,
        /// Width on the branch layout.
        branch: usize,
    },

    /// The two widths of a converter are not an integer multiple of each other.
    #[error("width conversion ratio must be an integer: {from} bits -> {to} bits")]
    RatioNotIntegral {
        /// Ingress payload width.
        from: usize,
        /// Egress payload width.
        to: usize,
    },

    /// A channel endpoint carries a different layout than the component expects.
    #[error("layout mismatch on channel: expected {expected} bits, found {found} bits")]
    LayoutMismatch {
        /// Width the component expects.
        expected: usize,
        /// Width the channel carries.
        found: usize,
    },

    /// A component was wired to a channel of a different clock domain.
    #[error("channel belongs to a different clock domain")]
    DomainMismatch,

    /// Two components drive the same half of one channel.
    #[error("channel already has a {0} driver")]
    DriverConflict(&'static str),

    /// A repetition count that must be at least one was zero.
    #[error("count must be at least 1")]
    ZeroCount,

    /// A fan-in component was given no sinks.
    #[error("at least one sink is required")]
    NoSinks,
}

/// Errors surfaced while stepping a fabric.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Combinational wires failed to settle to a fixed point.
    #[error("combinational loop: wires failed to settle after {0} passes")]
    CombLoop(usize),

    /// The fabric was stepped before any clock domain was created.
    #[error("fabric has no clock domains")]
    NoDomains,
}
