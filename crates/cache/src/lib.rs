//! Query cache for paginated server collections.
//!
//! The cache is the single owner of every resource copy consumers can see. All
//! writers (fetches, optimistic mutations, push events) go through three entry
//! points:
//! * [`QueryCache::write`]: wholesale replacement after a fetch
//! * [`QueryCache::patch`]: a recipe over the current value, returning an [`Inverse`]
//! * [`QueryCache::invalidate_tags`]: blunt resync through refetch
//!
//! Windowed entries hold only the pages fetched so far. The [`locator`] places
//! a resource that changed locally into the right page and slot without ever
//! breaking the per-kind ordering.

pub mod cache;
pub mod data;
pub mod error;
pub mod inverse;
pub mod key;
pub mod locator;
pub mod page;

pub use cache::{EntryState, QueryCache};
pub use data::{CacheData, Reconciled};
pub use error::ShapeError;
pub use inverse::Inverse;
pub use key::{QueryKey, Tag};
pub use page::{Page, Window};

#[cfg(test)]
pub(crate) mod fixtures;
