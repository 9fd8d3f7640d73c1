//! Push synchronization channel.
//!
//! The server announces changes made by other clients over long-lived sockets,
//! one per topic URL. This crate owns the client side of those sockets:
//! * [`PushEvent`]: decoding of wire frames into typed events
//! * [`ChannelRegistry`]: one reconnecting connection per URL, shared by all
//!   subscribers and closed when the last one detaches
//! * [`PushConnector`] / [`PushConnection`]: the socket seam, implemented over
//!   WebSockets by [`WsConnector`]
//!
//! After a reconnect following a drop, the channel invalidates the tags of all
//! its subscribers in the query cache, since events sent while it was down are
//! lost.

pub mod backoff;
pub mod channel;
pub mod error;
pub mod event;
pub mod transport;
pub mod ws;

pub use backoff::Backoff;
pub use channel::{ChannelRegistry, ConnectionState, SubscriberSpec, Subscription};
pub use error::{Error, Result};
pub use event::{PushEvent, ResourceChange};
pub use transport::{Frame, PushConnection, PushConnector};
pub use ws::WsConnector;
