//! Channel-agnostic command pipeline.
//!
//! Channel adapters parse inbound text with [`parse_invocation`], look the
//! keyword up in a [`CommandTable`], and hand the invocation to the
//! [`CommandDispatcher`] along with a [`ReplySink`] for their platform.

pub mod chunk;
pub mod command;
pub mod dispatch;
pub mod sink;

pub use chunk::{split_message, split_segments, Segment};
pub use command::{parse_invocation, CommandSpec, CommandTable, RESERVED_COMMANDS};
pub use dispatch::{
    CommandDispatcher, DispatchError, DispatchOutcome, DispatchSettings, Invocation,
};
pub use sink::{AckHandle, ReplySink, SinkError};
