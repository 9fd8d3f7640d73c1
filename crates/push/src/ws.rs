//! WebSocket implementation of the socket seam.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::transport::{Frame, PushConnection, PushConnector};
use crate::{Error, Result};

/// [`PushConnector`] opening `ws://` and `wss://` sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl PushConnector for WsConnector {
	async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>> {
		let (stream, response) = connect_async(url.as_str()).await.map_err(|e| Error::Connect {
			url: url.to_string(),
			message: e.to_string(),
		})?;
		debug!(url = %url, status = response.status().as_u16(), "websocket handshake complete");
		Ok(Box::new(WsConnection { stream }))
	}
}

struct WsConnection {
	stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
	async fn recv(&mut self) -> Option<Result<Frame>> {
		loop {
			let message = match self.stream.next().await? {
				Ok(message) => message,
				Err(error) => return Some(Err(Error::Transport(error.to_string()))),
			};
			match message {
				Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
				Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
					Ok(text) => return Some(Ok(Frame::Text(text))),
					Err(_) => trace!(len = bytes.len(), "skipping non-utf8 binary frame"),
				},
				Message::Close(frame) => return Some(Ok(close_frame(frame))),
				Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
			}
		}
	}

	async fn close(&mut self) {
		if let Err(error) = self.stream.close(None).await {
			debug!(%error, "websocket close");
		}
	}
}

/// A close handshake without a status, or with 1000, is a clean close.
fn close_frame(frame: Option<CloseFrame>) -> Frame {
	match frame {
		None => Frame::Close {
			clean: true,
			reason: String::new(),
		},
		Some(frame) => Frame::Close {
			clean: frame.code == CloseCode::Normal,
			reason: frame.reason.to_string(),
		},
	}
}
