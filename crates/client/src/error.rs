//! Client errors.

use tracker_cache::ShapeError;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The server answered with a non-success status.
	#[error("request failed with status {status}: {message}")]
	Transport { status: u16, message: String },
	/// The server refused the request (HTTP 403).
	#[error("forbidden: {0}")]
	Forbidden(String),
	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(String),
	/// A response body did not have the expected shape.
	#[error("decode error: {0}")]
	Decode(String),
	/// A cache entry did not have the shape a patch expected.
	#[error(transparent)]
	Shape(#[from] ShapeError),
	/// A query's fetch failed. Only the message survives in the cache.
	#[error("fetch failed: {0}")]
	Fetch(String),
	/// Invalid client configuration.
	#[error("configuration error: {0}")]
	Config(String),
	#[error("invalid url: {0}")]
	Url(#[from] url::ParseError),
}

impl Error {
	/// HTTP status, for errors that carry one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transport { status, .. } => Some(*status),
			Self::Forbidden(_) => Some(403),
			_ => None,
		}
	}

	pub fn is_forbidden(&self) -> bool {
		matches!(self, Self::Forbidden(_))
	}
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Self::Decode(error.to_string())
	}
}

impl From<reqwest::Error> for Error {
	fn from(error: reqwest::Error) -> Self {
		match error.status() {
			Some(status) => Self::Transport {
				status: status.as_u16(),
				message: error.to_string(),
			},
			None => Self::Network(error.to_string()),
		}
	}
}
