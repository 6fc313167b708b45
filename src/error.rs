//! Error types for backend access and the push channel.
//!
//! Nothing in here is fatal to the application: every error is scoped to a
//! repository row, the graph view or the live indicator, and is rendered
//! next to whatever data was already on screen.

use std::time::Duration;

use thiserror::Error;

/// Failures of a request against the graph backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
	/// Transport failure before a response arrived.
	#[error("network error: {0}")]
	Network(String),
	/// No response within the configured request timeout.
	#[error("request timed out after {}s", .0.as_secs())]
	Timeout(Duration),
	/// Session missing or expired (401).
	#[error("not signed in or session expired")]
	Unauthorized,
	/// The user lacks permission for the resource (403).
	#[error("access denied: {0}")]
	AccessDenied(String),
	/// Any other non-success status.
	#[error("server error ({status}): {message}")]
	Server {
		/// HTTP status code.
		status: u16,
		/// `detail` from the response body, or the raw body.
		message: String,
	},
	/// The response body did not match the expected shape.
	#[error("invalid response payload: {0}")]
	InvalidPayload(String),
	/// A repository name that is not `owner/name`.
	#[error("invalid repository name: {0:?}")]
	InvalidRepository(String),
}

/// Coarse classification used to pick retry affordances in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
	/// Transient; retry right away.
	Network,
	/// Needs a permission change; retrying will not help.
	AccessDenied,
	/// Backend fault; retry after a delay.
	Server,
	/// Caller mistake; never retryable.
	Invalid,
}

impl ApiError {
	/// Maps a non-success HTTP status and its body onto an error.
	pub fn from_status(status: u16, body: &str) -> Self {
		let message = extract_detail(body);
		match status {
			401 => Self::Unauthorized,
			403 => Self::AccessDenied(message),
			_ => Self::Server { status, message },
		}
	}

	/// Which taxonomy bucket this error falls into.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Network(_) | Self::Timeout(_) => ErrorClass::Network,
			Self::Unauthorized | Self::AccessDenied(_) => ErrorClass::AccessDenied,
			Self::Server { .. } | Self::InvalidPayload(_) => ErrorClass::Server,
			Self::InvalidRepository(_) => ErrorClass::Invalid,
		}
	}

	/// Whether a plain retry can succeed without user intervention.
	pub fn is_retryable(&self) -> bool {
		matches!(self.class(), ErrorClass::Network | ErrorClass::Server)
	}
}

/// FastAPI style bodies carry the message under `detail`.
fn extract_detail(body: &str) -> String {
	serde_json::from_str::<serde_json::Value>(body)
		.ok()
		.and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_owned))
		.unwrap_or_else(|| body.trim().to_owned())
}

/// Failures of the live push channel. All of them degrade to the
/// "offline" indicator and a scheduled reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
	/// The stream could not be opened.
	#[error("failed to open push channel: {0}")]
	Connect(String),
	/// An open stream errored or ended.
	#[error("push channel disconnected: {0}")]
	Disconnected(String),
}

/// Failures while saving the canvas as an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
	/// No window, document or body to attach the download link to.
	#[error("export needs a document body")]
	NoDocument,
	/// The canvas refused to encode itself (for example a tainted canvas).
	#[error("canvas could not be encoded: {0}")]
	Encode(String),
	/// Creating or attaching the download link failed.
	#[error("download link failed: {0}")]
	Dom(String),
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_status_maps_permissions() {
		assert_eq!(ApiError::from_status(401, ""), ApiError::Unauthorized);
		assert_eq!(
			ApiError::from_status(
				403,
				r#"{"detail":"You do not have access to this repository"}"#
			),
			ApiError::AccessDenied("You do not have access to this repository".into())
		);
	}

	#[test]
	fn test_from_status_keeps_raw_body_without_detail() {
		let err = ApiError::from_status(502, "  bad gateway \n");
		assert_eq!(
			err,
			ApiError::Server {
				status: 502,
				message: "bad gateway".into()
			}
		);
		assert_eq!(err.to_string(), "server error (502): bad gateway");
	}

	#[test]
	fn test_retry_classification() {
		assert!(ApiError::Network("reset".into()).is_retryable());
		assert!(ApiError::Timeout(Duration::from_secs(30)).is_retryable());
		assert!(ApiError::from_status(500, "").is_retryable());
		assert!(!ApiError::AccessDenied(String::new()).is_retryable());
		assert!(!ApiError::InvalidRepository("nope".into()).is_retryable());
		assert_eq!(ApiError::Unauthorized.class(), ErrorClass::AccessDenied);
	}

	#[test]
	fn test_timeout_display() {
		let err = ApiError::Timeout(Duration::from_secs(30));
		assert_eq!(err.to_string(), "request timed out after 30s");
	}

	#[test]
	fn test_export_error_display() {
		assert_eq!(ExportError::NoDocument.to_string(), "export needs a document body");
		assert_eq!(
			ExportError::Encode("SecurityError".into()).to_string(),
			"canvas could not be encoded: SecurityError"
		);
	}
}
