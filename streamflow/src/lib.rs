//! StreamFlow: a backpressured dataflow substrate with latency-insensitive channel combinators.

// # Tries to deny all lints (`rustc -W help`).
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(anonymous_parameters)]
#![deny(deprecated_in_future)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_extern_crates)]
#![deny(unused_import_braces)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
#![deny(unreachable_pub)]
//
#![allow(elided_lifetimes_in_paths)]

pub mod bits;
pub mod channel;
pub mod error;
pub mod fabric;
pub mod layout;
pub mod utils;

pub use bits::Bits;
pub use channel::{ChannelId, Domain, Item, Net};
pub use error::{BuildError, SimError};
pub use fabric::{Component, Fabric};
pub use layout::{Field, FieldDef, Layout, Record};
pub use utils::*;
