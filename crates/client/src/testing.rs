//! Stub transports and resource builders for the client tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracker_model::Resource;
use tracker_push::{Frame, PushConnection, PushConnector};
use url::Url;

use crate::config::ClientConfig;
use crate::rest::{Method, RestRequest, RestResponse, RestTransport};
use crate::{Client, Error, Result};

type Inspector = Box<dyn Fn(&RestRequest) + Send + Sync>;

/// REST transport answering from per-route queues.
///
/// The last queued answer of a route is sticky. Unrouted requests fail with
/// a 404.
#[derive(Default)]
pub struct StubTransport {
	routes: Mutex<HashMap<(Method, String), VecDeque<Result<RestResponse>>>>,
	requests: Mutex<Vec<RestRequest>>,
	inspector: Mutex<Option<Inspector>>,
}

impl StubTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn respond(&self, method: Method, path: &str, answer: Result<RestResponse>) {
		self.routes.lock().entry((method, path.to_string())).or_default().push_back(answer);
	}

	pub fn respond_ok(&self, method: Method, path: &str, body: Value) {
		self.respond(method, path, Ok(RestResponse::ok(body)));
	}

	/// Runs `f` on every request as it is sent.
	pub fn inspect(&self, f: impl Fn(&RestRequest) + Send + Sync + 'static) {
		*self.inspector.lock() = Some(Box::new(f));
	}

	pub fn requests(&self) -> Vec<RestRequest> {
		self.requests.lock().clone()
	}

	pub fn sent(&self, method: Method, path: &str) -> usize {
		self.requests.lock().iter().filter(|r| r.method == method && r.path == path).count()
	}
}

#[async_trait]
impl RestTransport for StubTransport {
	async fn send(&self, request: RestRequest) -> Result<RestResponse> {
		if let Some(inspector) = self.inspector.lock().as_ref() {
			inspector(&request);
		}
		self.requests.lock().push(request.clone());
		let mut routes = self.routes.lock();
		let Some(queue) = routes.get_mut(&(request.method, request.path.clone())) else {
			return Err(Error::Transport {
				status: 404,
				message: format!("no route for {} {}", request.method.as_str(), request.path),
			});
		};
		match queue.len() {
			0 => Err(Error::Network("route exhausted".into())),
			1 => queue[0].clone(),
			_ => queue.pop_front().unwrap_or_else(|| Err(Error::Network("route exhausted".into()))),
		}
	}
}

/// Push connector whose connections replay frames fed through [`Self::send`].
#[derive(Default)]
pub struct StubConnector {
	senders: Mutex<Vec<(Url, mpsc::UnboundedSender<Frame>)>>,
}

struct StubConnection {
	frames: mpsc::UnboundedReceiver<Frame>,
}

impl StubConnector {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Delivers a text frame on every open connection to `url`.
	pub fn send(&self, url: &str, text: &str) {
		for (open, tx) in self.senders.lock().iter() {
			if open.as_str() == url {
				let _ = tx.send(Frame::Text(text.to_string()));
			}
		}
	}

	pub fn connections(&self) -> usize {
		self.senders.lock().len()
	}
}

#[async_trait]
impl PushConnector for StubConnector {
	async fn connect(&self, url: &Url) -> tracker_push::Result<Box<dyn PushConnection>> {
		let (tx, frames) = mpsc::unbounded_channel();
		self.senders.lock().push((url.clone(), tx));
		Ok(Box::new(StubConnection { frames }))
	}
}

#[async_trait]
impl PushConnection for StubConnection {
	async fn recv(&mut self) -> Option<tracker_push::Result<Frame>> {
		self.frames.recv().await.map(Ok)
	}

	async fn close(&mut self) {
		self.frames.close();
	}
}

pub const API_ROOT: &str = "https://tracker.test/api/v2/";

pub fn client(transport: &Arc<StubTransport>, connector: &Arc<StubConnector>) -> Client {
	let config = ClientConfig::new(Url::parse(API_ROOT).unwrap());
	Client::new(config, transport.clone(), connector.clone()).unwrap()
}

/// Lets spawned tasks run until `done` holds.
pub async fn eventually(mut done: impl FnMut() -> bool) {
	for _ in 0..200 {
		if done() {
			return;
		}
		tokio::task::yield_now().await;
	}
	panic!("condition not reached");
}

pub fn donation_json(id: i64, minute: u32, pinned: bool) -> Value {
	json!({
		"type": "donation",
		"id": id,
		"event": 1,
		"donor_name": format!("donor {id}"),
		"amount": 10.0,
		"timereceived": format!("2024-01-07T16:{minute:02}:00Z"),
		"pinned": pinned,
	})
}

pub fn donation(id: i64, minute: u32) -> Resource {
	serde_json::from_value(donation_json(id, minute, false)).unwrap()
}

pub fn page_json(count: u64, next: bool, results: Vec<Value>) -> Value {
	json!({
		"count": count,
		"next": next.then_some("https://tracker.test/api/v2/next/"),
		"previous": null,
		"results": results,
	})
}

pub fn ids<'a>(items: impl IntoIterator<Item = &'a Resource>) -> Vec<String> {
	items.into_iter().map(|r| r.id().to_string()).collect()
}
