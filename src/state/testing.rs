//! Scripted backend and push transport for driving the state layer in tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};
use futures::stream::StreamExt;

use super::live::{FrameStream, PushFrame, PushTransport};
use crate::api::{GraphApi, IndexAccepted};
use crate::error::{ApiError, ChannelError, Result};
use crate::model::{
	GraphEdge, GraphNode, NodeKind, RawGraph, RepositoryIndexStatus, RepositoryListing,
};

/// Node kind from the backend's id prefix.
fn kind_of(id: &str) -> NodeKind {
	match id.split(':').next() {
		Some("repo") => NodeKind::Repository,
		Some("file") => NodeKind::File,
		Some("vuln") => NodeKind::Vulnerability,
		Some("dep") => NodeKind::Dependency,
		Some("analysis") => NodeKind::Analysis,
		_ => NodeKind::Other,
	}
}

/// A graph whose first node links to every other node.
pub fn graph(ids: &[&str]) -> RawGraph {
	let nodes: Vec<GraphNode> = ids.iter().map(|id| GraphNode::new(*id, kind_of(id), *id)).collect();
	let edges = ids
		.iter()
		.skip(1)
		.map(|id| GraphEdge::new(ids[0], *id, "CONTAINS"))
		.collect();
	RawGraph {
		nodes,
		edges,
		..RawGraph::default()
	}
}

/// A listing of `(full_name, is_indexed)` rows.
pub fn listing(repos: &[(&str, bool)]) -> RepositoryListing {
	RepositoryListing {
		repositories: repos
			.iter()
			.map(|(name, indexed)| {
				let mut repo = RepositoryIndexStatus::new(*name);
				repo.is_indexed = *indexed;
				repo
			})
			.collect(),
		..RepositoryListing::default()
	}
}

#[derive(Default)]
struct Script {
	listing: RefCell<Option<Result<RepositoryListing>>>,
	graphs: RefCell<HashMap<String, Result<RawGraph>>>,
	gates: RefCell<HashMap<String, VecDeque<oneshot::Receiver<()>>>>,
	trigger_results: RefCell<VecDeque<Result<IndexAccepted>>>,
	trigger_gate: RefCell<Option<oneshot::Receiver<()>>>,
	calls: RefCell<Vec<String>>,
}

/// In-memory [`GraphApi`]. Clones share the same script, so a test can keep
/// one handle while the controller owns another.
#[derive(Clone, Default)]
pub struct ScriptedApi {
	script: Rc<Script>,
}

impl ScriptedApi {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_listing(self, value: RepositoryListing) -> Self {
		self.set_listing(Ok(value));
		self
	}

	pub fn with_graph(self, repo: &str, raw: RawGraph) -> Self {
		self.set_graph(repo, Ok(raw));
		self
	}

	pub fn with_graph_error(self, repo: &str, err: ApiError) -> Self {
		self.set_graph(repo, Err(err));
		self
	}

	pub fn set_listing(&self, value: Result<RepositoryListing>) {
		*self.script.listing.borrow_mut() = Some(value);
	}

	pub fn set_graph(&self, repo: &str, value: Result<RawGraph>) {
		self.script.graphs.borrow_mut().insert(repo.to_owned(), value);
	}

	pub fn push_trigger_result(&self, value: Result<IndexAccepted>) {
		self.script.trigger_results.borrow_mut().push_back(value);
	}

	/// The next graph request for `repo` waits until the sender fires.
	pub fn gate(&self, repo: &str) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		self.script
			.gates
			.borrow_mut()
			.entry(repo.to_owned())
			.or_default()
			.push_back(rx);
		tx
	}

	/// The next trigger request waits until the sender fires.
	pub fn gate_trigger(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();
		*self.script.trigger_gate.borrow_mut() = Some(rx);
		tx
	}

	/// Every call made so far, e.g. `graph org/a`.
	pub fn calls(&self) -> Vec<String> {
		self.script.calls.borrow().clone()
	}

	pub fn count(&self, call: &str) -> usize {
		self.script.calls.borrow().iter().filter(|c| *c == call).count()
	}

	fn record(&self, call: String) {
		self.script.calls.borrow_mut().push(call);
	}
}

#[async_trait(?Send)]
impl GraphApi for ScriptedApi {
	async fn list_repositories(&self, _user_id: &str) -> Result<RepositoryListing> {
		self.record("list".into());
		self.script
			.listing
			.borrow()
			.clone()
			.unwrap_or_else(|| Ok(RepositoryListing::default()))
	}

	async fn single_graph(&self, full_name: &str, _user_id: &str) -> Result<RawGraph> {
		self.record(format!("graph {full_name}"));
		let gate = self
			.script
			.gates
			.borrow_mut()
			.get_mut(full_name)
			.and_then(VecDeque::pop_front);
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.script
			.graphs
			.borrow()
			.get(full_name)
			.cloned()
			.unwrap_or_else(|| Err(ApiError::Server {
				status: 404,
				message: format!("no graph for {full_name}"),
			}))
	}

	async fn trigger_indexing(&self, full_name: &str, _user_id: &str) -> Result<IndexAccepted> {
		self.record(format!("index {full_name}"));
		let gate = self.script.trigger_gate.borrow_mut().take();
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.script
			.trigger_results
			.borrow_mut()
			.pop_front()
			.unwrap_or_else(|| Ok(IndexAccepted::default()))
	}
}

type Frames = std::result::Result<FrameStream, ChannelError>;

/// Frame sender of one scripted push session. The session counts as open
/// only after [`Session::open`].
pub struct Session {
	tx: mpsc::UnboundedSender<std::result::Result<PushFrame, ChannelError>>,
}

impl Session {
	/// The server accepted the stream.
	pub fn open(&self) {
		let _ = self.tx.unbounded_send(Ok(PushFrame::Opened));
	}

	/// Delivers one text frame.
	pub fn send(&self, frame: &str) {
		let _ = self.tx.unbounded_send(Ok(PushFrame::Message(frame.to_owned())));
	}

	/// Breaks the stream with an error.
	pub fn fail(&self, reason: &str) {
		let _ = self
			.tx
			.unbounded_send(Err(ChannelError::Disconnected(reason.to_owned())));
	}

	/// Ends the stream cleanly.
	pub fn end(&self) {
		self.tx.close_channel();
	}

	/// Whether the receiving side is gone.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

#[derive(Default)]
struct Sessions {
	pending: RefCell<VecDeque<Frames>>,
	delays: RefCell<Vec<Duration>>,
	connects: RefCell<usize>,
}

/// [`PushTransport`] whose connections are scripted up front. Once the
/// script runs out, `connect` never resolves.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
	sessions: Rc<Sessions>,
}

impl ScriptedTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues a connection that is accepted but not yet open, and returns
	/// its frame sender.
	pub fn session(&self) -> Session {
		let (tx, rx) = mpsc::unbounded();
		self.sessions.pending.borrow_mut().push_back(Ok(rx.boxed_local()));
		Session { tx }
	}

	/// Queues a failed connection attempt.
	pub fn refuse(&self, reason: &str) {
		self.sessions
			.pending
			.borrow_mut()
			.push_back(Err(ChannelError::Connect(reason.to_owned())));
	}

	/// Backoff delays requested so far.
	pub fn delays(&self) -> Vec<Duration> {
		self.sessions.delays.borrow().clone()
	}

	pub fn connects(&self) -> usize {
		*self.sessions.connects.borrow()
	}
}

#[async_trait(?Send)]
impl PushTransport for ScriptedTransport {
	async fn connect(
		&self,
		_user_id: &str,
	) -> Frames {
		*self.sessions.connects.borrow_mut() += 1;
		let next = self.sessions.pending.borrow_mut().pop_front();
		match next {
			Some(result) => result,
			None => futures::future::pending().await,
		}
	}

	async fn backoff(&self, delay: Duration) {
		self.sessions.delays.borrow_mut().push(delay);
	}
}
