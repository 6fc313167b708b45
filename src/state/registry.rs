//! Per-user repository list and indexing status.
//!
//! Single writer: the controller feeds results in, everyone else reads rows.
//! The transient "index requested" state is never stored on a row; it is
//! derived from the in-flight and accepted trigger sets.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::error::{ApiError, Result};
use crate::model::{RepositoryIndexStatus, RepositoryListing};

/// Indexing status of a single repository within this session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
	/// No graph yet; the UI offers "Index now".
	NotIndexed,
	/// A trigger is in flight or was accepted and not yet confirmed.
	IndexRequested,
	/// Graph available. Terminal for the session.
	Indexed,
}

/// What [`RepositoryRegistry::begin_trigger`] decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerDecision {
	/// Issue the request.
	Start,
	/// A request for this repository is already outstanding.
	Coalesced,
	/// Nothing to do; rebuilds are not offered.
	AlreadyIndexed,
}

/// A repository row ready for display.
#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryRow {
	/// Last status reported by the backend.
	pub status: RepositoryIndexStatus,
	/// Derived indexing state.
	pub state: IndexState,
	/// Error of the last trigger for this row only.
	pub error: Option<ApiError>,
}

/// Owner of the repository list and its indexing status.
#[derive(Clone, Debug, Default)]
pub struct RepositoryRegistry {
	repositories: Vec<RepositoryIndexStatus>,
	in_flight: HashSet<String>,
	requested: HashSet<String>,
	confirmed: HashSet<String>,
	row_errors: HashMap<String, ApiError>,
	list_error: Option<ApiError>,
	message: Option<String>,
	loaded: bool,
}

impl RepositoryRegistry {
	/// An empty registry; nothing is loaded yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies the outcome of a list fetch. Failures keep the previous list.
	pub fn apply_listing(&mut self, result: Result<RepositoryListing>) {
		let listing = match result {
			Ok(listing) => listing,
			Err(err) => {
				self.list_error = Some(err);
				return;
			}
		};

		self.repositories = listing
			.repositories
			.into_iter()
			.map(RepositoryIndexStatus::normalized)
			.map(|mut repo| {
				if self.confirmed.contains(&repo.full_name) {
					repo.is_indexed = true;
				}
				repo
			})
			.collect();
		for repo in self.repositories.iter().filter(|r| r.is_indexed) {
			self.requested.remove(&repo.full_name);
			self.confirmed.insert(repo.full_name.clone());
		}
		self.list_error = None;
		self.message = listing.message;
		self.loaded = true;
		info!(
			"repository list loaded: {} total, {} indexed",
			self.total(),
			self.indexed_count()
		);
	}

	/// Records a trigger for `full_name` unless one is already outstanding.
	pub fn begin_trigger(&mut self, full_name: &str) -> TriggerDecision {
		if self.state(full_name) == IndexState::Indexed {
			return TriggerDecision::AlreadyIndexed;
		}
		if !self.in_flight.insert(full_name.to_owned()) {
			debug!("trigger for {full_name} already in flight");
			return TriggerDecision::Coalesced;
		}
		self.row_errors.remove(full_name);
		TriggerDecision::Start
	}

	/// Applies the outcome of a trigger request. A failure leaves the row in
	/// the state it had before the trigger and records a row error.
	pub fn finish_trigger(&mut self, full_name: &str, result: Result<()>) {
		self.in_flight.remove(full_name);
		match result {
			Ok(()) => {
				if !self.confirmed.contains(full_name) {
					self.requested.insert(full_name.to_owned());
				}
			}
			Err(err) => {
				self.row_errors.insert(full_name.to_owned(), err);
			}
		}
	}

	/// Marks a repository indexed. Idempotent; returns whether anything
	/// visible changed.
	pub fn mark_indexed(&mut self, full_name: &str) -> bool {
		let before = self.state(full_name);
		let had_error = self.row_errors.remove(full_name).is_some();
		self.confirmed.insert(full_name.to_owned());
		self.requested.remove(full_name);
		if let Some(repo) = self.repositories.iter_mut().find(|r| r.full_name == full_name) {
			repo.is_indexed = true;
		}
		before != IndexState::Indexed || had_error
	}

	/// Current status of `full_name`.
	pub fn state(&self, full_name: &str) -> IndexState {
		let indexed = self.confirmed.contains(full_name)
			|| self
				.repositories
				.iter()
				.any(|r| r.full_name == full_name && r.is_indexed);
		if indexed {
			IndexState::Indexed
		} else if self.in_flight.contains(full_name) || self.requested.contains(full_name) {
			IndexState::IndexRequested
		} else {
			IndexState::NotIndexed
		}
	}

	/// Rows in backend order.
	pub fn rows(&self) -> Vec<RepositoryRow> {
		self.repositories
			.iter()
			.map(|status| RepositoryRow {
				state: self.state(&status.full_name),
				error: self.row_errors.get(&status.full_name).cloned(),
				status: status.clone(),
			})
			.collect()
	}

	/// Full names of indexed repositories, in list order.
	pub fn indexed_names(&self) -> Vec<String> {
		self.repositories
			.iter()
			.filter(|r| self.state(&r.full_name) == IndexState::Indexed)
			.map(|r| r.full_name.clone())
			.collect()
	}

	/// Whether the repository is in the list.
	pub fn contains(&self, full_name: &str) -> bool {
		self.repositories.iter().any(|r| r.full_name == full_name)
	}

	/// Number of listed repositories.
	pub fn total(&self) -> usize {
		self.repositories.len()
	}

	/// Number of listed repositories that are indexed.
	pub fn indexed_count(&self) -> usize {
		self.indexed_names().len()
	}

	/// Loaded, non-empty, and nothing indexed yet.
	pub fn needs_indexing(&self) -> bool {
		self.loaded && self.total() > 0 && self.indexed_count() == 0
	}

	/// Error of the last list fetch, if it failed.
	pub fn list_error(&self) -> Option<&ApiError> {
		self.list_error.as_ref()
	}

	/// Backend hint accompanying the list (e.g. "install the app").
	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	/// Whether a list fetch has ever succeeded.
	pub fn is_loaded(&self) -> bool {
		self.loaded
	}
}
