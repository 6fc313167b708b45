use serde::{Deserialize, Serialize};

use super::types::GraphStats;
use crate::error::{ApiError, Result};

/// One row of the user's repository list as reported by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryIndexStatus {
	/// `owner/name`; the stable key of the row.
	#[serde(alias = "fullName")]
	pub full_name: String,
	/// Account or organisation part of the name.
	#[serde(default)]
	pub owner: String,
	/// Repository part of the name.
	#[serde(default)]
	pub name: String,
	/// Whether a graph has been built.
	#[serde(default, alias = "isIndexed")]
	pub is_indexed: bool,
	/// Size of the built graph.
	#[serde(default, alias = "nodeCount")]
	pub node_count: usize,
	/// Possibly partial stats of the built graph.
	#[serde(default)]
	pub stats: GraphStats,
}

impl RepositoryIndexStatus {
	/// An unindexed row for `full_name`.
	pub fn new(full_name: impl Into<String>) -> Self {
		Self {
			full_name: full_name.into(),
			owner: String::new(),
			name: String::new(),
			is_indexed: false,
			node_count: 0,
			stats: GraphStats::default(),
		}
		.normalized()
	}

	/// Fills `owner` and `name` from `full_name` when the backend left them out.
	pub fn normalized(mut self) -> Self {
		if self.owner.is_empty() || self.name.is_empty() {
			if let Ok((owner, name)) = split_full_name(&self.full_name) {
				self.owner = owner.to_owned();
				self.name = name.to_owned();
			}
		}
		self
	}
}

/// Splits `owner/name`, rejecting anything else.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
	match full_name.split_once('/') {
		Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
			Ok((owner, name))
		}
		_ => Err(ApiError::InvalidRepository(full_name.to_owned())),
	}
}

/// Body of the repository list endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RepositoryListing {
	/// One row per visible repository.
	#[serde(default)]
	pub repositories: Vec<RepositoryIndexStatus>,
	/// Number of repositories, when the backend reports it.
	#[serde(default)]
	pub total: Option<usize>,
	/// Number of indexed repositories, when the backend reports it.
	#[serde(default)]
	pub indexed_count: Option<usize>,
	/// Hint shown when there are no repositories at all.
	#[serde(default)]
	pub message: Option<String>,
}
