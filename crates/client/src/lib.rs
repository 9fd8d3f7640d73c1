//! Client for the tracker REST API.
//!
//! [`Client`] is the consumer surface over the query cache, the REST
//! transport and the push channels:
//! * [`Client::query`]: a live [`QueryHandle`] on one endpoint and arguments
//! * [`Client::mutate`]: a [`MutationDef`] run through optimistic patching,
//!   the request, then merge or rollback
//! * [`Client::subscribe`]: a query kept current by its endpoint's push topic
//!
//! The [`endpoint`] catalog describes every collection the client knows,
//! [`mutations`] the changes it can make to them.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod mutation;
pub mod mutations;
pub mod query;
pub mod reconcile;
pub mod rest;
pub mod session;
pub mod sync;

pub use client::{Client, key_for};
pub use config::{BackoffConfig, ClientConfig};
pub use endpoint::{Endpoint, Shape};
pub use error::{Error, Result};
pub use mutation::{MutationDef, PatchTarget, PendingMutation};
pub use query::QueryHandle;
pub use rest::{HttpTransport, Method, RestRequest, RestResponse, RestTransport};
pub use session::Session;
pub use sync::SyncSubscription;

#[cfg(test)]
pub(crate) mod testing;
