//! Mutation-observing wrappers.
//!
//! Containers read out of a live record are wrapped lazily. A wrapper owns
//! nothing but a mutable borrow of its container and a [`Link`] to its owner;
//! every write is applied locally and then reported upward, each owner adding
//! one path step, until the record's funnel receives the full [`Path`].
//!
//! [`Path`]: crate::core::Path

pub mod sink;
pub mod wrapper;

pub use sink::{ChildUpdateSink, Link, RecordingSink};
pub use wrapper::{MapWrapper, ObjectWrapper, SequenceWrapper, Tracked};
