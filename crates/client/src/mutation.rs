//! Optimistic mutations.
//!
//! A mutation patches every cached query it affects before the request goes
//! out, then either merges the server's answer into those queries or rolls
//! the patches back and invalidates.
//!
//! # Lifecycle
//!
//! 1. Optimistic recipes run against every cached key of every target; their
//!    inverses are recorded.
//! 2. The request is sent.
//! 3. On success the returned resources are merged into every cached key of
//!    the targets by identity, then pessimistic recipes run. Targets settle
//!    independently: a shape error in one only invalidates that key.
//! 4. On failure all inverses run in reverse order, the fallback tags are
//!    invalidated (plus `me` on 403), and the error is returned.

use std::sync::Arc;

use tracing::{debug, warn};
use tracker_cache::{CacheData, Inverse, QueryCache, QueryKey, ShapeError, Tag};
use tracker_model::{QueryArgs, Resource};

use crate::client::{Client, ClientInner};
use crate::endpoint::{Endpoint, tags};
use crate::rest::RestRequest;
use crate::Result;

type RequestFn<A> = dyn Fn(&A) -> RestRequest + Send + Sync;
type OptimisticFn<A> = dyn Fn(&A, &QueryArgs, &mut CacheData) -> Result<(), ShapeError> + Send + Sync;
type PessimisticFn<A> = dyn Fn(&A, &[Resource], &QueryArgs, &mut CacheData) -> Result<(), ShapeError> + Send + Sync;

/// How one endpoint's cached queries follow a mutation.
pub struct PatchTarget<A> {
	pub endpoint: &'static Endpoint,
	optimistic: Option<Arc<OptimisticFn<A>>>,
	pessimistic: Option<Arc<PessimisticFn<A>>>,
	merge: bool,
}

impl<A> PatchTarget<A> {
	/// A target that merges the returned resources and nothing else.
	pub fn new(endpoint: &'static Endpoint) -> Self {
		Self {
			endpoint,
			optimistic: None,
			pessimistic: None,
			merge: true,
		}
	}

	/// Recipe applied before the request, given the mutation arguments and
	/// the cached query's arguments.
	#[must_use]
	pub fn optimistic(
		mut self,
		recipe: impl Fn(&A, &QueryArgs, &mut CacheData) -> Result<(), ShapeError> + Send + Sync + 'static,
	) -> Self {
		self.optimistic = Some(Arc::new(recipe));
		self
	}

	/// Recipe applied after a successful request, with the returned resources.
	#[must_use]
	pub fn pessimistic(
		mut self,
		recipe: impl Fn(&A, &[Resource], &QueryArgs, &mut CacheData) -> Result<(), ShapeError> + Send + Sync + 'static,
	) -> Self {
		self.pessimistic = Some(Arc::new(recipe));
		self
	}

	/// Skips merging the returned resources into this target.
	#[must_use]
	pub fn without_merge(mut self) -> Self {
		self.merge = false;
		self
	}
}

/// A mutation, defined once and executed with [`Client::mutate`].
pub struct MutationDef<A> {
	pub name: &'static str,
	request: Arc<RequestFn<A>>,
	targets: Vec<PatchTarget<A>>,
	fallback_tags: Vec<Tag>,
}

impl<A> MutationDef<A> {
	pub fn new(name: &'static str, request: impl Fn(&A) -> RestRequest + Send + Sync + 'static) -> Self {
		Self {
			name,
			request: Arc::new(request),
			targets: Vec::new(),
			fallback_tags: Vec::new(),
		}
	}

	#[must_use]
	pub fn target(mut self, target: PatchTarget<A>) -> Self {
		self.targets.push(target);
		self
	}

	/// Tags invalidated when the request fails.
	#[must_use]
	pub fn fallback(mut self, tags: &[Tag]) -> Self {
		self.fallback_tags.extend_from_slice(tags);
		self
	}

	pub fn targets(&self) -> &[PatchTarget<A>] {
		&self.targets
	}

	pub fn request(&self, args: &A) -> RestRequest {
		(self.request)(args)
	}
}

/// Inverses recorded by the optimistic phase of one mutation.
#[derive(Debug, Default)]
pub struct PendingMutation {
	patches: Vec<(QueryKey, Inverse)>,
}

impl PendingMutation {
	pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
		self.patches.iter().map(|(key, _)| key)
	}

	pub fn is_empty(&self) -> bool {
		self.patches.iter().all(|(_, inverse)| inverse.is_identity())
	}

	/// Runs every inverse, newest first. A key that no longer takes its
	/// inverse is invalidated instead.
	pub fn rollback(self, cache: &QueryCache) {
		for (key, inverse) in self.patches.into_iter().rev() {
			if let Err(error) = cache.apply_inverse(&key, &inverse) {
				warn!(%key, %error, "rollback failed, invalidating");
				cache.invalidate_entry(&key);
			}
		}
	}
}

impl Client {
	/// Runs `def` with `args` through the full optimistic cycle.
	///
	/// Resolves with the resources the server returned once they are merged,
	/// or with the request's error once the optimistic patches are rolled
	/// back.
	pub async fn mutate<A: Sync>(&self, def: &MutationDef<A>, args: A) -> Result<Vec<Resource>> {
		execute(&self.inner, def, &args).await
	}
}

pub(crate) async fn execute<A: Sync>(inner: &ClientInner, def: &MutationDef<A>, args: &A) -> Result<Vec<Resource>> {
	let pending = apply_optimistic(&inner.cache, def, args);
	debug!(mutation = def.name, patched = pending.patches.len(), "mutation sent");

	let outcome: Result<Vec<Resource>> = async {
		let response = inner.transport.send(def.request(args)).await?.error_for_status()?;
		response.resources()
	}
	.await;

	match outcome {
		Ok(resources) => {
			let cache = &inner.cache;
			let resources = resources.as_slice();
			for target in &def.targets {
				settle(cache, target, args, resources);
			}
			debug!(mutation = def.name, returned = resources.len(), "mutation settled");
			Ok(resources.to_vec())
		}
		Err(error) => {
			warn!(mutation = def.name, %error, "mutation failed, rolling back");
			pending.rollback(&inner.cache);
			let mut invalidate = def.fallback_tags.clone();
			if error.is_forbidden() {
				invalidate.push(tags::ME);
			}
			inner.cache.invalidate_tags(&invalidate);
			Err(error)
		}
	}
}

fn apply_optimistic<A>(cache: &QueryCache, def: &MutationDef<A>, args: &A) -> PendingMutation {
	let mut pending = PendingMutation::default();
	for target in &def.targets {
		let Some(recipe) = &target.optimistic else {
			continue;
		};
		for key in cache.select_keys_for_endpoint(target.endpoint.name) {
			let inverse = cache.patch_or_invalidate(&key, |data| recipe(args, &key.args, data));
			pending.patches.push((key, inverse));
		}
	}
	pending
}

fn settle<A>(cache: &QueryCache, target: &PatchTarget<A>, args: &A, resources: &[Resource]) {
	let endpoint = target.endpoint;
	for key in cache.select_keys_for_endpoint(endpoint.name) {
		cache.patch_or_invalidate(&key, |data| {
			if target.merge {
				for resource in resources {
					endpoint.merge(&key.args, data, resource)?;
				}
			}
			if let Some(recipe) = &target.pessimistic {
				recipe(args, resources, &key.args, data)?;
			}
			Ok(())
		});
	}
}
