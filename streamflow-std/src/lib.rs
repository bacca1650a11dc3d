//! Standard component library for the streamflow substrate.

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

pub mod adapter;
pub mod arbiter;
pub mod converter;
pub mod merge;
pub mod queue;
pub mod queue_async;
pub mod register_slice;
pub mod split;
pub mod stitcher;
pub mod stream_sim;

pub use adapter::Adapter;
pub use arbiter::{next_grant, Arbiter};
pub use converter::{insert_converter, insert_width_converter, ConverterOptions, Down, Passthrough, Up};
pub use merge::Merger;
pub use queue::{LevelProbe, Queue, DEPTH_FLOOR};
pub use queue_async::AsyncQueue;
pub use register_slice::{PipeReady, PipeValid};
pub use split::Splitter;
pub use stitcher::{LastInserter, Stitcher};
pub use stream_sim::{frame, frames, StreamForward, StreamLog, StreamReceiver, StreamSender};
