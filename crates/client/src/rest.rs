//! REST transport seam and its `reqwest` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};
use tracker_model::Resource;

use crate::config::ClientConfig;
use crate::session::Session;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Post,
	Patch,
	Put,
	Delete,
}

impl Method {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Patch => "PATCH",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}

	/// Whether the request carries no side effects and needs no CSRF token.
	pub fn is_safe(self) -> bool {
		matches!(self, Self::Get)
	}
}

/// One request against the REST API. `path` is relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
	pub method: Method,
	pub path: String,
	pub query: Vec<(String, String)>,
	pub body: Option<Value>,
}

impl RestRequest {
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
		}
	}

	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	pub fn post(path: impl Into<String>, body: Value) -> Self {
		Self::new(Method::Post, path).with_body(body)
	}

	pub fn patch(path: impl Into<String>, body: Value) -> Self {
		Self::new(Method::Patch, path).with_body(body)
	}

	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	#[must_use]
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);
		self
	}

	#[must_use]
	pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
		self.query = query;
		self
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
	pub status: u16,
	/// Decoded JSON body; `Null` when empty.
	pub body: Value,
}

impl RestResponse {
	pub fn new(status: u16, body: Value) -> Self {
		Self { status, body }
	}

	pub fn ok(body: Value) -> Self {
		Self::new(200, body)
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Maps non-success statuses to errors: 403 to [`Error::Forbidden`],
	/// anything else to [`Error::Transport`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}
		let message = match &self.body {
			Value::Object(map) => match map.get("detail") {
				Some(Value::String(detail)) => detail.clone(),
				_ => Value::Object(map.clone()).to_string(),
			},
			Value::String(text) => text.clone(),
			Value::Null => String::new(),
			other => other.to_string(),
		};
		if self.status == 403 {
			return Err(Error::Forbidden(message));
		}
		Err(Error::Transport {
			status: self.status,
			message,
		})
	}

	/// Resources in the body: a single object, an array, or nothing.
	pub fn resources(&self) -> Result<Vec<Resource>> {
		match &self.body {
			Value::Null => Ok(Vec::new()),
			Value::Array(items) => items.iter().map(|v| Ok(Resource::deserialize(v)?)).collect(),
			Value::Object(_) => Ok(vec![Resource::deserialize(&self.body)?]),
			other => Err(Error::Decode(format!("expected resources, got {other}"))),
		}
	}
}

/// A page of a paginated collection, as the API returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Paginated {
	pub count: u64,
	#[serde(default)]
	pub next: Option<String>,
	#[serde(default)]
	pub previous: Option<String>,
	pub results: Vec<Resource>,
}

#[async_trait]
pub trait RestTransport: Send + Sync + 'static {
	async fn send(&self, request: RestRequest) -> Result<RestResponse>;
}

/// [`RestTransport`] over HTTP.
///
/// Mutating requests carry the session's CSRF token in `X-CSRFToken`.
pub struct HttpTransport {
	client: reqwest::Client,
	config: ClientConfig,
	session: Arc<Session>,
}

impl HttpTransport {
	pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(config.request_timeout())
			.build()
			.map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
		Ok(Self {
			client,
			config: config.clone(),
			session,
		})
	}
}

#[async_trait]
impl RestTransport for HttpTransport {
	async fn send(&self, request: RestRequest) -> Result<RestResponse> {
		let url = self.config.endpoint_url(&request.path)?;
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Patch => reqwest::Method::PATCH,
			Method::Put => reqwest::Method::PUT,
			Method::Delete => reqwest::Method::DELETE,
		};
		debug!(method = request.method.as_str(), %url, "rest request");

		let mut builder = self.client.request(method, url).query(&request.query);
		if !request.method.is_safe()
			&& let Some(token) = self.session.csrf_token()
		{
			builder = builder.header("X-CSRFToken", token);
		}
		if let Some(body) = &request.body {
			builder = builder
				.header(reqwest::header::CONTENT_TYPE, "application/json")
				.body(serde_json::to_vec(body)?);
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let bytes = response.bytes().await?;
		trace!(status, len = bytes.len(), "rest response");
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			match serde_json::from_slice(&bytes) {
				Ok(body) => body,
				Err(_) if !(200..300).contains(&status) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
				Err(error) => return Err(error.into()),
			}
		};
		Ok(RestResponse { status, body })
	}
}
