//! Coordinates the registry, the store and the live channel, and exposes a
//! single render-ready [`ViewModel`].
//!
//! State sits behind `RefCell`s that are never borrowed across an `.await`;
//! each handler borrows, mutates, releases, then suspends on the network.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::live::{ConnectionState, PushEvent, PushSink};
use super::registry::{RepositoryRegistry, RepositoryRow, TriggerDecision};
use super::store::{Completion, GraphStore, Scope, fetch_merged, fetch_single};
use crate::api::GraphApi;
use crate::config::AppConfig;
use crate::error::{ApiError, Result};
use crate::model::{
	GraphPayload, HighRiskFile, IngestReport, RepoBreakdown, high_risk_files,
};

/// User intents, sent from the view as messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiCommand {
	/// Switch to a scope (single repository or all).
	Select(Scope),
	/// Start indexing a repository.
	Index(String),
	/// Reload the repository list and refetch the visible graph.
	Refresh,
}

/// Everything presentation code needs, as one immutable snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewModel {
	/// Current scope, `None` before the first selection.
	pub scope: Option<Scope>,
	/// Visible payload.
	pub payload: Arc<GraphPayload>,
	/// Repository rows with indexing state and row errors.
	pub repositories: Vec<RepositoryRow>,
	/// Live channel state.
	pub connection: ConnectionState,
	/// A graph fetch for the current scope is outstanding.
	pub loading: bool,
	/// The repository list has been loaded at least once.
	pub list_loaded: bool,
	/// Last repository list failure.
	pub list_error: Option<ApiError>,
	/// Backend hint attached to the list.
	pub list_message: Option<String>,
	/// Last graph failure for the current scope.
	pub graph_error: Option<ApiError>,
	/// Data-quality warnings of the visible payload.
	pub integrity_warnings: IngestReport,
	/// Per-repository stats of the merged view.
	pub breakdown: Vec<RepoBreakdown>,
	/// Repositories missing from the merged view.
	pub skipped_repositories: Vec<String>,
	/// Nothing indexed yet; offer "Index now" per row.
	pub needs_indexing: bool,
	/// Files of the visible payload with several vulnerabilities.
	pub high_risk_files: Vec<HighRiskFile>,
}

impl ViewModel {
	/// Whether the live indicator shows "live".
	pub fn connected(&self) -> bool {
		self.connection == ConnectionState::Connected
	}
}

type Listener = Rc<dyn Fn(ViewModel)>;

struct Inner<A> {
	api: A,
	config: AppConfig,
	registry: RefCell<RepositoryRegistry>,
	store: RefCell<GraphStore>,
	connection: Cell<ConnectionState>,
	listener: RefCell<Option<Listener>>,
}

/// Cloneable handle; clones share state.
pub struct ViewController<A> {
	inner: Rc<Inner<A>>,
}

impl<A> Clone for ViewController<A> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<A: GraphApi + 'static> ViewController<A> {
	/// Controller over `api`; nothing is fetched until [`initialize`](Self::initialize).
	pub fn new(api: A, config: AppConfig) -> Self {
		Self {
			inner: Rc::new(Inner {
				api,
				config,
				registry: RefCell::new(RepositoryRegistry::new()),
				store: RefCell::new(GraphStore::new()),
				connection: Cell::new(ConnectionState::Disconnected),
				listener: RefCell::new(None),
			}),
		}
	}

	/// Registers the callback that receives a fresh [`ViewModel`] after
	/// every visible change. Replaces any previous callback.
	pub fn on_change(&self, listener: impl Fn(ViewModel) + 'static) {
		*self.inner.listener.borrow_mut() = Some(Rc::new(listener));
	}

	fn changed(&self) {
		let listener = self.inner.listener.borrow().clone();
		if let Some(listener) = listener {
			listener(self.view_model());
		}
	}

	/// Settings this controller was built with.
	pub fn config(&self) -> &AppConfig {
		&self.inner.config
	}

	/// Loads the repository list, then opens the merged view if anything is
	/// indexed and nothing has been selected yet.
	pub async fn initialize(&self) {
		self.load_repositories().await;
		let pick = {
			let registry = self.inner.registry.borrow();
			let store = self.inner.store.borrow();
			store.scope().is_none() && registry.indexed_count() > 0
		};
		if pick {
			self.select_scope(Scope::All).await;
		}
	}

	/// Fetches the user's repositories with their indexing status.
	pub async fn load_repositories(&self) {
		let result = self
			.inner
			.api
			.list_repositories(&self.inner.config.user_id)
			.await;
		if let Err(err) = &result {
			log::error!("loading repositories failed: {err}");
		}
		self.inner.registry.borrow_mut().apply_listing(result);
		self.changed();
	}

	/// Switches scope and fetches it. Results of earlier selections that
	/// resolve later are discarded by the store.
	pub async fn select_scope(&self, scope: Scope) {
		let epoch = self.inner.store.borrow_mut().begin(scope.clone());
		self.changed();
		let result = self.fetch(&scope).await;
		let completion = self.inner.store.borrow_mut().complete(epoch, result);
		if completion == Completion::Applied {
			self.changed();
		}
	}

	async fn fetch(&self, scope: &Scope) -> Result<super::store::FetchOutcome> {
		let user_id = &self.inner.config.user_id;
		match scope {
			Scope::Repository(name) => fetch_single(&self.inner.api, name, user_id).await,
			Scope::All => {
				let repositories = self.inner.registry.borrow().indexed_names();
				fetch_merged(
					&self.inner.api,
					&repositories,
					user_id,
					self.inner.config.limit_per_repo,
				)
				.await
			}
		}
	}

	/// Fetches the current scope again under a new epoch.
	pub async fn refetch(&self) {
		let scope = self.inner.store.borrow().scope().cloned();
		if let Some(scope) = scope {
			self.select_scope(scope).await;
		}
	}

	/// Manual refresh; works whether or not the live channel is up.
	pub async fn refresh(&self) {
		self.load_repositories().await;
		self.refetch().await;
	}

	/// Requests indexing. Concurrent requests for the same repository are
	/// coalesced into the first one.
	pub async fn trigger_indexing(&self, full_name: &str) {
		let decision = self.inner.registry.borrow_mut().begin_trigger(full_name);
		if decision != TriggerDecision::Start {
			debug!("not triggering {full_name}: {decision:?}");
			return;
		}
		self.changed();

		let result = self
			.inner
			.api
			.trigger_indexing(full_name, &self.inner.config.user_id)
			.await;
		match &result {
			Ok(accepted) => info!(
				"indexing of {full_name} accepted{}",
				accepted
					.message
					.as_deref()
					.map(|m| format!(": {m}"))
					.unwrap_or_default()
			),
			Err(err) => log::error!("indexing {full_name} failed: {err}"),
		}
		self.inner
			.registry
			.borrow_mut()
			.finish_trigger(full_name, result.map(|_| ()));
		self.changed();
	}

	/// Applies a push event: marks the repository indexed, reloads the list
	/// for its fresh counts and refetches when it is part of the visible
	/// scope.
	pub async fn on_push_event(&self, event: PushEvent) {
		let PushEvent::Indexed { repository } = event;
		info!("{repository} finished indexing");
		if self.inner.registry.borrow_mut().mark_indexed(&repository) {
			self.changed();
		}
		// a lagging listing cannot flip the row back; marked rows stay indexed
		self.load_repositories().await;
		let visible = self
			.inner
			.store
			.borrow()
			.scope()
			.is_some_and(|scope| scope.matches(&repository));
		if visible {
			self.refetch().await;
		}
	}

	/// Runs one user command to completion.
	pub async fn handle(&self, command: UiCommand) {
		match command {
			UiCommand::Select(scope) => self.select_scope(scope).await,
			UiCommand::Index(full_name) => self.trigger_indexing(&full_name).await,
			UiCommand::Refresh => self.refresh().await,
		}
	}

	/// Updates the live indicator.
	pub fn set_connection(&self, state: ConnectionState) {
		if self.inner.connection.replace(state) != state {
			self.changed();
		}
	}

	/// Snapshot of everything the view renders.
	pub fn view_model(&self) -> ViewModel {
		let registry = self.inner.registry.borrow();
		let store = self.inner.store.borrow();
		let payload = store.snapshot();
		ViewModel {
			scope: store.scope().cloned(),
			high_risk_files: high_risk_files(&payload, self.inner.config.high_risk_threshold),
			payload,
			repositories: registry.rows(),
			connection: self.inner.connection.get(),
			loading: store.is_loading(),
			list_loaded: registry.is_loaded(),
			list_error: registry.list_error().cloned(),
			list_message: registry.message().map(str::to_owned),
			graph_error: store.error().cloned(),
			integrity_warnings: store.report(),
			breakdown: store.breakdown().to_vec(),
			skipped_repositories: store.skipped().to_vec(),
			needs_indexing: registry.needs_indexing(),
		}
	}
}

#[async_trait(?Send)]
impl<A: GraphApi + 'static> PushSink for ViewController<A> {
	fn set_connection(&self, state: ConnectionState) {
		ViewController::set_connection(self, state);
	}

	async fn on_event(&self, event: PushEvent) {
		self.on_push_event(event).await;
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use futures::executor::{LocalPool, block_on};
	use futures::task::LocalSpawnExt;

	use super::*;
	use crate::api::IndexAccepted;
	use crate::state::live::{LiveChannel, ReconnectPolicy};
	use crate::state::registry::IndexState;
	use crate::state::testing::{ScriptedApi, ScriptedTransport, graph, listing};

	fn config() -> AppConfig {
		AppConfig::default().with_user("1001")
	}

	fn repo(name: &str) -> Scope {
		Scope::Repository(name.into())
	}

	fn ids(vm: &ViewModel) -> Vec<String> {
		vm.payload.nodes.iter().map(|n| n.id.clone()).collect()
	}

	fn state_of(vm: &ViewModel, name: &str) -> IndexState {
		vm.repositories
			.iter()
			.find(|r| r.status.full_name == name)
			.map(|r| r.state)
			.unwrap()
	}

	#[test]
	fn test_initialize_opens_merged_view() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/a", true), ("org/b", false)]))
			.with_graph("org/a", graph(&["repo:org/a", "file:x"]));
		let controller = ViewController::new(api.clone(), config());

		block_on(controller.initialize());

		let vm = controller.view_model();
		assert_eq!(vm.scope, Some(Scope::All));
		assert_eq!(ids(&vm), vec!["org/a::repo:org/a", "org/a::file:x"]);
		assert_eq!(api.calls(), vec!["list", "graph org/a"]);
		assert!(!vm.needs_indexing);
	}

	#[test]
	fn test_initialize_with_nothing_indexed_offers_indexing() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/a", false)]));
		let controller = ViewController::new(api.clone(), config());

		block_on(controller.initialize());

		let vm = controller.view_model();
		assert!(vm.needs_indexing);
		assert_eq!(vm.scope, None);
		assert!(vm.payload.is_empty());
		assert_eq!(state_of(&vm, "org/a"), IndexState::NotIndexed);
	}

	#[test]
	fn test_later_selection_wins_regardless_of_arrival() {
		let api = ScriptedApi::new()
			.with_graph("org/a", graph(&["repo:a"]))
			.with_graph("org/b", graph(&["repo:b"]))
			.with_graph("org/z", graph(&["repo:z"]));
		let controller = ViewController::new(api.clone(), config());

		// move the epoch forward so the race happens at epochs 5 and 6
		for _ in 0..4 {
			block_on(controller.select_scope(repo("org/z")));
		}

		let gate_a = api.gate("org/a");
		let gate_b = api.gate("org/b");
		let mut pool = LocalPool::new();
		let spawner = pool.spawner();
		let c = controller.clone();
		spawner
			.spawn_local(async move { c.select_scope(repo("org/a")).await })
			.unwrap();
		let c = controller.clone();
		spawner
			.spawn_local(async move { c.select_scope(repo("org/b")).await })
			.unwrap();
		pool.run_until_stalled();
		assert_eq!(controller.inner.store.borrow().current_epoch().value(), 6);
		let vm = controller.view_model();
		assert!(vm.loading);
		assert_eq!(ids(&vm), vec!["repo:z"]);

		gate_b.send(()).unwrap();
		pool.run_until_stalled();
		assert_eq!(ids(&controller.view_model()), vec!["repo:b"]);

		gate_a.send(()).unwrap();
		pool.run_until_stalled();
		let vm = controller.view_model();
		assert_eq!(ids(&vm), vec!["repo:b"]);
		assert_eq!(vm.scope, Some(repo("org/b")));
		assert!(!vm.loading);
	}

	#[test]
	fn test_push_event_for_selected_repository_refetches() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/c", false)]))
			.with_graph("org/c", graph(&[]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());
		block_on(controller.select_scope(repo("org/c")));
		assert!(controller.view_model().payload.is_empty());

		api.set_graph("org/c", Ok(graph(&["repo:org/c", "file:main.py"])));
		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/c".into(),
		}));

		let vm = controller.view_model();
		assert_eq!(state_of(&vm, "org/c"), IndexState::Indexed);
		assert_eq!(vm.payload.nodes.len(), 2);
		assert_eq!(api.count("graph org/c"), 2);
		assert_eq!(api.count("list"), 2);
	}

	#[test]
	fn test_push_event_reloads_counts_for_row() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/c", false)]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());

		let mut fresh = listing(&[("org/c", true)]);
		fresh.repositories[0].node_count = 12;
		fresh.repositories[0].stats.files = 4;
		api.set_listing(Ok(fresh));
		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/c".into(),
		}));

		let vm = controller.view_model();
		let row = vm
			.repositories
			.iter()
			.find(|r| r.status.full_name == "org/c")
			.unwrap();
		assert_eq!(row.state, IndexState::Indexed);
		assert_eq!(row.status.node_count, 12);
		assert_eq!(row.status.stats.files, 4);
		assert_eq!(api.count("list"), 2);
	}

	#[test]
	fn test_push_event_survives_lagging_listing() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/c", false)]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());

		// the backend has not caught up yet and still reports the row unindexed
		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/c".into(),
		}));

		assert_eq!(state_of(&controller.view_model(), "org/c"), IndexState::Indexed);
		assert_eq!(api.count("list"), 2);
	}

	#[test]
	fn test_push_event_for_other_repository_only_marks() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/a", true), ("org/d", false)]))
			.with_graph("org/a", graph(&["repo:a"]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());
		block_on(controller.select_scope(repo("org/a")));

		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/d".into(),
		}));

		assert_eq!(state_of(&controller.view_model(), "org/d"), IndexState::Indexed);
		assert_eq!(api.count("graph org/a"), 1);
		assert_eq!(api.count("graph org/d"), 0);
	}

	#[test]
	fn test_push_event_refetches_merged_view() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/a", true), ("org/e", false)]))
			.with_graph("org/a", graph(&["repo:a"]))
			.with_graph("org/e", graph(&["repo:e"]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.initialize());
		assert_eq!(controller.view_model().payload.nodes.len(), 1);

		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/e".into(),
		}));

		let vm = controller.view_model();
		assert_eq!(ids(&vm), vec!["org/a::repo:a", "org/e::repo:e"]);
		assert_eq!(vm.breakdown.len(), 2);
		assert!(vm.skipped_repositories.is_empty());
	}

	#[test]
	fn test_trigger_coalesces_and_tracks_state() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/a", false)]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());

		let gate = api.gate_trigger();
		let mut pool = LocalPool::new();
		let spawner = pool.spawner();
		for _ in 0..3 {
			let c = controller.clone();
			spawner
				.spawn_local(async move { c.handle(UiCommand::Index("org/a".into())).await })
				.unwrap();
		}
		pool.run_until_stalled();
		assert_eq!(api.count("index org/a"), 1);
		assert_eq!(state_of(&controller.view_model(), "org/a"), IndexState::IndexRequested);

		gate.send(()).unwrap();
		pool.run_until_stalled();
		assert_eq!(state_of(&controller.view_model(), "org/a"), IndexState::IndexRequested);

		block_on(controller.on_push_event(PushEvent::Indexed {
			repository: "org/a".into(),
		}));
		assert_eq!(state_of(&controller.view_model(), "org/a"), IndexState::Indexed);
	}

	#[test]
	fn test_failed_trigger_is_scoped_to_row() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/a", false), ("org/b", false)]));
		api.push_trigger_result(Err(ApiError::Server {
			status: 500,
			message: "clone failed".into(),
		}));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());

		block_on(controller.trigger_indexing("org/a"));

		let vm = controller.view_model();
		assert_eq!(state_of(&vm, "org/a"), IndexState::NotIndexed);
		assert!(vm.repositories[0].error.is_some());
		assert!(vm.repositories[1].error.is_none());
		assert!(vm.list_error.is_none());

		api.push_trigger_result(Ok(IndexAccepted {
			message: Some("queued".into()),
			files_indexed: None,
		}));
		block_on(controller.trigger_indexing("org/a"));
		let vm = controller.view_model();
		assert_eq!(state_of(&vm, "org/a"), IndexState::IndexRequested);
		assert!(vm.repositories[0].error.is_none());
	}

	#[test]
	fn test_refresh_keeps_data_when_backend_fails() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/a", true)]))
			.with_graph("org/a", graph(&["repo:a", "file:x"]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.initialize());

		api.set_listing(Err(ApiError::Network("offline".into())));
		api.set_graph("org/a", Err(ApiError::Timeout(Duration::from_secs(30))));
		block_on(controller.handle(UiCommand::Refresh));

		let vm = controller.view_model();
		assert_eq!(vm.repositories.len(), 1);
		assert_eq!(vm.payload.nodes.len(), 2);
		assert_eq!(vm.list_error, Some(ApiError::Network("offline".into())));
		assert_eq!(vm.graph_error, Some(ApiError::Timeout(Duration::from_secs(30))));
	}

	#[test]
	fn test_listener_sees_changes() {
		let api = ScriptedApi::new().with_listing(listing(&[("org/a", false)]));
		let controller = ViewController::new(api, config());
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&seen);
		controller.on_change(move |vm: ViewModel| sink.borrow_mut().push(vm.list_loaded));

		block_on(controller.load_repositories());
		controller.set_connection(ConnectionState::Connected);
		controller.set_connection(ConnectionState::Connected);

		assert_eq!(*seen.borrow(), vec![true, true]);
		assert!(controller.view_model().connected());
	}

	#[test]
	fn test_reconnect_refetches_once_per_event() {
		let api = ScriptedApi::new()
			.with_listing(listing(&[("org/c", true)]))
			.with_graph("org/c", graph(&["repo:c"]));
		let controller = ViewController::new(api.clone(), config());
		block_on(controller.load_repositories());
		block_on(controller.select_scope(repo("org/c")));

		let states = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&states);
		controller.on_change(move |vm: ViewModel| {
			let mut states = sink.borrow_mut();
			if states.last() != Some(&vm.connected()) {
				states.push(vm.connected());
			}
		});

		let transport = ScriptedTransport::new();
		let first = transport.session();
		let second = transport.session();
		let policy = ReconnectPolicy {
			base: Duration::from_secs(3),
			max: Duration::from_secs(30),
		};
		let (handle, task) =
			LiveChannel::new(transport.clone(), controller.clone(), "1001", policy).into_task();
		let mut pool = LocalPool::new();
		pool.spawner().spawn_local(task).unwrap();
		pool.run_until_stalled();

		let frame = r#"{"type":"indexed","repository":"org/c"}"#;
		first.open();
		first.send(frame);
		first.end();
		pool.run_until_stalled();
		second.open();
		second.send(frame);
		pool.run_until_stalled();

		assert_eq!(*states.borrow(), vec![false, true, false, true]);
		assert_eq!(transport.delays(), vec![Duration::from_secs(3)]);
		// initial fetch plus exactly one per received event
		assert_eq!(api.count("graph org/c"), 3);

		handle.close();
		pool.run_until_stalled();
		assert!(handle.is_closed());
	}
}
