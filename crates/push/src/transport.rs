//! Socket seam.
//!
//! The channel never talks to a socket library directly. It is handed a
//! [`PushConnector`] that opens [`PushConnection`]s: [`crate::WsConnector`] in
//! production, scripted ones in tests.

use async_trait::async_trait;
use url::Url;

use crate::Result;

/// One message received from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	Text(String),
	/// The peer closed the socket. `clean` is false for abnormal closure.
	Close { clean: bool, reason: String },
}

#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
	async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>>;
}

#[async_trait]
pub trait PushConnection: Send {
	/// Next frame. `None` means the stream ended without a close frame.
	async fn recv(&mut self) -> Option<Result<Frame>>;

	/// Closes the socket from our side.
	async fn close(&mut self);
}
