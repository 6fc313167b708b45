//! The payload currently on screen and the epoch rule that guards it.
//!
//! Every scope selection takes a fresh [`Epoch`]. A fetch result is applied
//! only if it carries the current epoch; anything older is dropped, so a slow
//! response for an abandoned selection never overwrites a newer one. The
//! underlying request is not aborted, its result is just ignored.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::api::GraphApi;
use crate::error::{ApiError, Result};
use crate::model::{GraphPayload, IngestReport, RepoBreakdown, merge_payloads};

/// What the graph view shows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
	/// One repository, by full name.
	Repository(String),
	/// The merged view over every indexed repository.
	All,
}

impl Scope {
	/// Whether news about `full_name` affects this scope.
	pub fn matches(&self, full_name: &str) -> bool {
		match self {
			Scope::Repository(name) => name == full_name,
			Scope::All => true,
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::Repository(name) => write!(f, "{name}"),
			Scope::All => write!(f, "all repositories"),
		}
	}
}

/// Tag of one scope selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
	/// Raw counter value.
	pub fn value(self) -> u64 {
		self.0
	}

	fn next(self) -> Self {
		Epoch(self.0 + 1)
	}
}

/// Whether a completed fetch made it to the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
	/// Result (or error) is now visible.
	Applied,
	/// Result belonged to an abandoned selection and was discarded.
	Stale,
}

/// A successful fetch, ready to be applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchOutcome {
	/// Graph to show.
	pub payload: GraphPayload,
	/// Dropped duplicates and dangling edges.
	pub report: IngestReport,
	/// Per-repository stats (merged view only).
	pub breakdown: Vec<RepoBreakdown>,
	/// Repositories left out of the merged view because their fetch failed.
	pub skipped: Vec<String>,
}

/// Exclusive owner of the visible payload.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
	epoch: Epoch,
	scope: Option<Scope>,
	payload: Arc<GraphPayload>,
	report: IngestReport,
	breakdown: Vec<RepoBreakdown>,
	skipped: Vec<String>,
	error: Option<ApiError>,
	loading: bool,
}

impl GraphStore {
	/// An empty store with no scope.
	pub fn new() -> Self {
		Self::default()
	}

	/// Selects `scope` and returns the epoch its fetch must carry.
	pub fn begin(&mut self, scope: Scope) -> Epoch {
		self.epoch = self.epoch.next();
		info!("scope {scope} selected (epoch {})", self.epoch.value());
		self.scope = Some(scope);
		self.loading = true;
		self.epoch
	}

	/// Applies a fetch result if `epoch` is still current. Errors keep the
	/// last good payload on screen.
	pub fn complete(&mut self, epoch: Epoch, result: Result<FetchOutcome>) -> Completion {
		if epoch != self.epoch {
			debug!(
				"discarding result of epoch {} (current {})",
				epoch.value(),
				self.epoch.value()
			);
			return Completion::Stale;
		}
		self.loading = false;
		match result {
			Ok(outcome) => {
				self.payload = Arc::new(outcome.payload);
				self.report = outcome.report;
				self.breakdown = outcome.breakdown;
				self.skipped = outcome.skipped;
				self.error = None;
			}
			Err(err) => {
				error!("graph fetch for epoch {} failed: {err}", epoch.value());
				self.error = Some(err);
			}
		}
		Completion::Applied
	}

	/// Epoch of the latest selection.
	pub fn current_epoch(&self) -> Epoch {
		self.epoch
	}

	/// Latest selected scope.
	pub fn scope(&self) -> Option<&Scope> {
		self.scope.as_ref()
	}

	/// Immutable snapshot of the visible payload.
	pub fn snapshot(&self) -> Arc<GraphPayload> {
		Arc::clone(&self.payload)
	}

	/// Integrity report of the shown snapshot.
	pub fn report(&self) -> IngestReport {
		self.report
	}

	/// Per-repository counts of the merged view; empty otherwise.
	pub fn breakdown(&self) -> &[RepoBreakdown] {
		&self.breakdown
	}

	/// Repositories left out of the merged view because their fetch failed.
	pub fn skipped(&self) -> &[String] {
		&self.skipped
	}

	/// Error of the latest applied fetch.
	pub fn error(&self) -> Option<&ApiError> {
		self.error.as_ref()
	}

	/// A fetch for the current epoch is outstanding.
	pub fn is_loading(&self) -> bool {
		self.loading
	}
}

/// Fetches and ingests one repository's graph.
pub async fn fetch_single<A: GraphApi + ?Sized>(
	api: &A,
	full_name: &str,
	user_id: &str,
) -> Result<FetchOutcome> {
	let raw = api.single_graph(full_name, user_id).await?;
	let ingested = GraphPayload::ingest(raw);
	Ok(FetchOutcome {
		payload: ingested.payload,
		report: ingested.report,
		..FetchOutcome::default()
	})
}

/// Fetches every repository in `repositories` one after the other and merges
/// them. Failing repositories are skipped; the fetch fails only when all of
/// them did.
pub async fn fetch_merged<A: GraphApi + ?Sized>(
	api: &A,
	repositories: &[String],
	user_id: &str,
	limit_per_repo: usize,
) -> Result<FetchOutcome> {
	let mut parts = Vec::with_capacity(repositories.len());
	let mut report = IngestReport::default();
	let mut skipped = Vec::new();
	let mut last_error = None;

	for full_name in repositories {
		match fetch_single(api, full_name, user_id).await {
			Ok(outcome) => {
				report.absorb(outcome.report);
				parts.push((full_name.clone(), outcome.payload));
			}
			Err(err) => {
				warn!("leaving {full_name} out of the merged view: {err}");
				skipped.push(full_name.clone());
				last_error = Some(err);
			}
		}
	}

	if parts.is_empty() {
		if let Some(err) = last_error {
			return Err(err);
		}
	}

	let merged = merge_payloads(parts, limit_per_repo);
	report.absorb(merged.report);
	Ok(FetchOutcome {
		payload: merged.payload,
		report,
		breakdown: merged.breakdown,
		skipped,
	})
}
