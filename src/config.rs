//! Runtime configuration for the explorer.
//!
//! Defaults can be overridden at build time through `KG_API_BASE` and
//! `KG_USER_ID`; the user id normally arrives from the auth layer as the
//! `user_id` query parameter of the page URL.

use std::time::Duration;

use thiserror::Error;

/// Backend base path used when `KG_API_BASE` is not set at build time.
pub const DEFAULT_API_BASE: &str = "/api/v1";
/// Per-repository node cap of the merged view, matching the backend default.
pub const DEFAULT_LIMIT_PER_REPO: usize = 50;
/// Minimum attached vulnerabilities for a file to count as high risk.
pub const DEFAULT_HIGH_RISK_THRESHOLD: usize = 2;

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	/// No user id was supplied.
	#[error("no user id configured")]
	MissingUserId,
	/// The merged view would contain nothing.
	#[error("limit_per_repo must be at least 1")]
	ZeroLimit,
	/// The reconnect window is empty or inverted.
	#[error("reconnect delays must satisfy 0 < base <= max")]
	InvalidReconnect,
}

/// Settings shared by the API client, the live channel and the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
	/// Prefix of every backend route, without a trailing slash.
	pub api_base: String,
	/// Identifier of the signed-in user.
	pub user_id: String,
	/// Upper bound for list and graph requests.
	pub request_timeout: Duration,
	/// Node cap per repository in the merged view.
	pub limit_per_repo: usize,
	/// First reconnect delay of the push channel.
	pub reconnect_base: Duration,
	/// Reconnect delays never grow beyond this.
	pub reconnect_max: Duration,
	/// See [`DEFAULT_HIGH_RISK_THRESHOLD`].
	pub high_risk_threshold: usize,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			api_base: option_env!("KG_API_BASE")
				.unwrap_or(DEFAULT_API_BASE)
				.trim_end_matches('/')
				.to_owned(),
			user_id: option_env!("KG_USER_ID").unwrap_or_default().to_owned(),
			request_timeout: Duration::from_secs(30),
			limit_per_repo: DEFAULT_LIMIT_PER_REPO,
			reconnect_base: Duration::from_secs(1),
			reconnect_max: Duration::from_secs(30),
			high_risk_threshold: DEFAULT_HIGH_RISK_THRESHOLD,
		}
	}
}

impl AppConfig {
	/// Replaces the user id, ignoring blank values.
	pub fn with_user(mut self, user_id: impl AsRef<str>) -> Self {
		let user_id = user_id.as_ref().trim();
		if !user_id.is_empty() {
			self.user_id = user_id.to_owned();
		}
		self
	}

	/// Replaces the API base path.
	pub fn with_api_base(mut self, base: impl AsRef<str>) -> Self {
		self.api_base = base.as_ref().trim_end_matches('/').to_owned();
		self
	}

	/// Replaces the merged-view node cap.
	pub fn with_limit_per_repo(mut self, limit: usize) -> Self {
		self.limit_per_repo = limit;
		self
	}

	/// Checks the values that would otherwise fail later and less clearly.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.user_id.is_empty() {
			return Err(ConfigError::MissingUserId);
		}
		if self.limit_per_repo == 0 {
			return Err(ConfigError::ZeroLimit);
		}
		if self.reconnect_base.is_zero() || self.reconnect_base > self.reconnect_max {
			return Err(ConfigError::InvalidReconnect);
		}
		Ok(())
	}

	/// Absolute route for `path` (which starts with `/`).
	pub fn url(&self, path: &str) -> String {
		format!("{}{}", self.api_base, path)
	}

	/// Route of the server-sent event stream.
	pub fn events_url(&self) -> String {
		self.url("/graphs/events")
	}
}
