//! Client-side state: repository registry, graph store, live channel, and
//! the controller tying them together.

mod controller;
mod live;
mod registry;
mod store;

#[cfg(test)]
mod testing;

pub use controller::{UiCommand, ViewController, ViewModel};
pub use live::{
	ChannelHandle, ConnectionState, EventSourceTransport, FrameStream, LiveChannel, PushEvent,
	PushFrame, PushSink, PushTransport, ReconnectPolicy, parse_push_message,
};
pub use registry::{IndexState, RepositoryRegistry, RepositoryRow, TriggerDecision};
pub use store::{Completion, Epoch, FetchOutcome, GraphStore, Scope, fetch_merged, fetch_single};
