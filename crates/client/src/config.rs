//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracker_push::Backoff;
use url::Url;

use crate::{Error, Result};

/// Configuration for a [`crate::Client`].
///
/// Loadable from TOML:
///
/// ```toml
/// api_root = "https://tracker.example/tracker/api/v2/"
/// ws_root = "wss://tracker.example/tracker/"
/// page_limit = 50
///
/// [backoff]
/// base_ms = 500
/// max_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL the REST endpoint paths are joined onto.
	pub api_root: Url,
	/// Base URL the push topic paths are joined onto. Derived from
	/// `api_root` when absent.
	#[serde(default)]
	pub ws_root: Option<Url>,
	/// Page size requested for windowed queries.
	#[serde(default = "default_page_limit")]
	pub page_limit: u32,
	#[serde(default = "default_timeout")]
	pub request_timeout_secs: u64,
	#[serde(default)]
	pub backoff: BackoffConfig,
	/// Initial CSRF token sent with mutating requests.
	#[serde(default)]
	pub csrf_token: Option<String>,
}

/// Reconnect backoff for push channels, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
	#[serde(default = "default_backoff_base")]
	pub base_ms: u64,
	#[serde(default = "default_backoff_max")]
	pub max_ms: u64,
}

fn default_page_limit() -> u32 {
	50
}

fn default_timeout() -> u64 {
	30
}

fn default_backoff_base() -> u64 {
	500
}

fn default_backoff_max() -> u64 {
	30_000
}

impl Default for BackoffConfig {
	fn default() -> Self {
		Self {
			base_ms: default_backoff_base(),
			max_ms: default_backoff_max(),
		}
	}
}

impl ClientConfig {
	pub fn new(api_root: Url) -> Self {
		Self {
			api_root,
			ws_root: None,
			page_limit: default_page_limit(),
			request_timeout_secs: default_timeout(),
			backoff: BackoffConfig::default(),
			csrf_token: None,
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.api_root.cannot_be_a_base() {
			return Err(Error::Config(format!("api_root {} cannot be a base url", self.api_root)));
		}
		if self.page_limit == 0 {
			return Err(Error::Config("page_limit must be positive".into()));
		}
		if self.backoff.base_ms == 0 || self.backoff.max_ms < self.backoff.base_ms {
			return Err(Error::Config(format!(
				"backoff base_ms {} must be positive and not above max_ms {}",
				self.backoff.base_ms, self.backoff.max_ms
			)));
		}
		Ok(())
	}

	/// Full URL of a REST path relative to `api_root`.
	pub fn endpoint_url(&self, path: &str) -> Result<Url> {
		Ok(self.api_root.join(path.trim_start_matches('/'))?)
	}

	/// Full URL of a push topic such as `ws/processing/`.
	pub fn ws_url(&self, topic: &str) -> Result<Url> {
		let root = match &self.ws_root {
			Some(root) => root.clone(),
			None => {
				let mut root = self.api_root.clone();
				let scheme = if root.scheme() == "https" { "wss" } else { "ws" };
				root.set_scheme(scheme)
					.map_err(|()| Error::Config(format!("cannot derive a socket url from {}", self.api_root)))?;
				root.set_path("/");
				root.set_query(None);
				root
			}
		};
		Ok(root.join(topic.trim_start_matches('/'))?)
	}

	pub fn backoff(&self) -> Backoff {
		Backoff::new(Duration::from_millis(self.backoff.base_ms), Duration::from_millis(self.backoff.max_ms))
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}
