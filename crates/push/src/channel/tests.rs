use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tracker_cache::{CacheData, QueryKey};
use tracker_model::QueryArgs;

use super::*;
use crate::{Error, Result};

const GROUP_CREATED: &str = r#"{"action": "group_created", "group": {"id": "mods", "name": "Moderators"}}"#;

enum Script {
	Fail,
	Accept(ScriptedConnection),
}

struct ScriptedConnection {
	frames: mpsc::UnboundedReceiver<Frame>,
	closed: Arc<AtomicBool>,
}

#[async_trait]
impl PushConnection for ScriptedConnection {
	async fn recv(&mut self) -> Option<Result<Frame>> {
		self.frames.recv().await.map(Ok)
	}

	async fn close(&mut self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}

/// Connector replaying a script of accepted and refused connects. Refuses
/// once the script runs out.
#[derive(Default)]
struct ScriptedConnector {
	script: Mutex<VecDeque<Script>>,
	connects: AtomicUsize,
}

impl ScriptedConnector {
	fn accept(&self) -> (mpsc::UnboundedSender<Frame>, Arc<AtomicBool>) {
		let (tx, frames) = mpsc::unbounded_channel();
		let closed = Arc::new(AtomicBool::new(false));
		self.script.lock().push_back(Script::Accept(ScriptedConnection {
			frames,
			closed: closed.clone(),
		}));
		(tx, closed)
	}

	fn refuse(&self) {
		self.script.lock().push_back(Script::Fail);
	}

	fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PushConnector for ScriptedConnector {
	async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		let next = self.script.lock().pop_front();
		match next {
			Some(Script::Accept(conn)) => Ok(Box::new(conn)),
			Some(Script::Fail) | None => Err(Error::Connect {
				url: url.to_string(),
				message: "refused".into(),
			}),
		}
	}
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn url() -> Url {
	Url::parse("wss://tracker.test/ws/processing/").unwrap()
}

fn recorder() -> (EventCallback, mpsc::UnboundedReceiver<&'static str>) {
	let (tx, rx) = mpsc::unbounded_channel();
	let callback: EventCallback = Arc::new(move |event: &PushEvent| {
		let _ = tx.send(event.name());
	});
	(callback, rx)
}

fn spec(tags: &[&'static str], scope: Option<&str>, callback: EventCallback) -> SubscriberSpec {
	SubscriberSpec {
		tags: tags.iter().copied().map(Tag::from_static).collect(),
		scope: scope.map(str::to_owned),
		callback,
	}
}

fn registry(connector: Arc<ScriptedConnector>, cache: Arc<QueryCache>) -> ChannelRegistry {
	ChannelRegistry::new(connector, cache, Backoff::new(Duration::from_millis(500), Duration::from_secs(30)))
}

#[tokio::test]
async fn shares_one_connection_per_url() {
	init_tracing();
	let connector = Arc::new(ScriptedConnector::default());
	let (frames, _closed) = connector.accept();
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));

	let (cb1, mut rx1) = recorder();
	let (cb2, mut rx2) = recorder();
	let first = registry.subscribe(url(), spec(&["donations"], None, cb1));
	let second = registry.subscribe(url(), spec(&["donation_groups"], None, cb2));
	assert!(first.opened().await);
	assert!(second.opened().await);
	assert_eq!(connector.connects(), 1);
	assert_eq!(registry.channel_count(), 1);
	assert_eq!(registry.state(&url()), Some(ConnectionState::Open));

	frames.send(Frame::Text(GROUP_CREATED.into())).unwrap();
	assert_eq!(rx1.recv().await, Some("group_created"));
	assert_eq!(rx2.recv().await, Some("group_created"));
}

#[tokio::test]
async fn scoped_subscribers_receive_each_event_once() {
	let connector = Arc::new(ScriptedConnector::default());
	let (frames, _closed) = connector.accept();
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));

	let hits = Arc::new(AtomicUsize::new(0));
	let counting: EventCallback = {
		let hits = hits.clone();
		Arc::new(move |_: &PushEvent| {
			hits.fetch_add(1, Ordering::SeqCst);
		})
	};
	let _a = registry.subscribe(url(), spec(&[], Some("donations({})"), counting.clone()));
	let _b = registry.subscribe(url(), spec(&[], Some("donations({})"), counting));
	let (tail, mut rx) = recorder();
	let c = registry.subscribe(url(), spec(&[], None, tail));
	assert!(c.opened().await);

	frames.send(Frame::Text(GROUP_CREATED.into())).unwrap();
	assert_eq!(rx.recv().await, Some("group_created"));
	assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn last_subscriber_drop_closes_socket() {
	let connector = Arc::new(ScriptedConnector::default());
	let (_frames, closed) = connector.accept();
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));

	let (cb, _rx) = recorder();
	let first = registry.subscribe(url(), spec(&[], None, cb.clone()));
	let second = registry.subscribe(url(), spec(&[], None, cb));
	assert!(first.opened().await);
	let mut states = first.state_changes();

	drop(second);
	assert_eq!(registry.channel_count(), 1);
	assert_eq!(first.state(), ConnectionState::Open);

	drop(first);
	assert_eq!(registry.channel_count(), 0);
	assert_eq!(*states.borrow(), ConnectionState::Closing);
	states.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
	assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn clean_close_is_terminal() {
	let connector = Arc::new(ScriptedConnector::default());
	let (frames, _closed) = connector.accept();
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));

	let (cb, _rx) = recorder();
	let sub = registry.subscribe(url(), spec(&[], None, cb.clone()));
	assert!(sub.opened().await);
	let mut states = sub.state_changes();

	frames
		.send(Frame::Close {
			clean: true,
			reason: "server shutdown".into(),
		})
		.unwrap();
	states.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(connector.connects(), 1);
	assert_eq!(sub.state(), ConnectionState::Closed);

	// A new subscriber restarts the closed channel.
	let (_frames, _closed) = connector.accept();
	let again = registry.subscribe(url(), spec(&[], None, cb));
	assert!(again.opened().await);
	assert_eq!(connector.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn restart_after_clean_close_invalidates_waiting_subscribers() {
	let cache = Arc::new(QueryCache::new());
	let key = QueryKey::new("donations", QueryArgs::default());
	cache.start_fetch(&key, &[Tag::from_static("donations")]);
	cache.write(&key, CacheData::List(Vec::new()));

	let connector = Arc::new(ScriptedConnector::default());
	let (frames, _closed) = connector.accept();
	let registry = registry(connector.clone(), cache.clone());

	let (cb, _rx) = recorder();
	let waiting = registry.subscribe(url(), spec(&["donations"], None, cb.clone()));
	assert!(waiting.opened().await);
	let mut states = waiting.state_changes();
	frames
		.send(Frame::Close {
			clean: true,
			reason: "restart".into(),
		})
		.unwrap();
	states.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
	assert!(!cache.entry_state(&key).stale);

	let (_frames, _closed) = connector.accept();
	let late = registry.subscribe(url(), spec(&[], None, cb));
	assert!(late.opened().await);
	assert!(cache.entry_state(&key).stale);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_drop_invalidates_subscriber_tags() {
	init_tracing();
	let cache = Arc::new(QueryCache::new());
	let key = QueryKey::new("donations", QueryArgs::default());
	cache.start_fetch(&key, &[Tag::from_static("donations")]);
	cache.write(&key, CacheData::List(Vec::new()));

	let connector = Arc::new(ScriptedConnector::default());
	let (first, _) = connector.accept();
	connector.refuse();
	let (_second, _) = connector.accept();
	let registry = registry(connector.clone(), cache.clone());

	let (cb, _rx) = recorder();
	let sub = registry.subscribe(url(), spec(&["donations"], None, cb));
	assert!(sub.opened().await);
	assert!(!cache.entry_state(&key).stale);
	let mut states = sub.state_changes();

	drop(first);
	states.wait_for(|s| matches!(s, ConnectionState::Down { .. })).await.unwrap();
	assert_eq!(*states.borrow(), ConnectionState::Down { attempt: 1 });
	assert!(!cache.entry_state(&key).stale);

	states.wait_for(|s| *s == ConnectionState::Open).await.unwrap();
	assert!(cache.entry_state(&key).stale);
	assert_eq!(connector.connects(), 3);
}

#[tokio::test(start_paused = true)]
async fn connect_failures_back_off_exponentially() {
	let connector = Arc::new(ScriptedConnector::default());
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));
	let start = tokio::time::Instant::now();

	let (cb, _rx) = recorder();
	let sub = registry.subscribe(url(), spec(&[], None, cb));
	let mut states = sub.state_changes();
	states.wait_for(|s| *s == ConnectionState::Down { attempt: 3 }).await.unwrap();

	let elapsed = start.elapsed();
	assert!(elapsed >= Duration::from_millis(1500), "elapsed {elapsed:?}");
	assert!(elapsed < Duration::from_millis(2000), "elapsed {elapsed:?}");
	assert_eq!(connector.connects(), 3);
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
	let connector = Arc::new(ScriptedConnector::default());
	let (frames, _closed) = connector.accept();
	let registry = registry(connector.clone(), Arc::new(QueryCache::new()));

	let (cb, mut rx) = recorder();
	let sub = registry.subscribe(url(), spec(&[], None, cb));
	assert!(sub.opened().await);

	frames.send(Frame::Text("{not json".into())).unwrap();
	frames.send(Frame::Text(r#"{"type": "heartbeat"}"#.into())).unwrap();
	frames.send(Frame::Text(GROUP_CREATED.into())).unwrap();
	assert_eq!(rx.recv().await, Some("group_created"));
	assert_eq!(sub.state(), ConnectionState::Open);
}
