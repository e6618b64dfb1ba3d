// SPDX-License-Identifier: GPL-3.0

//! Single-flight lookup cache bound to one query.
//!
//! # Entry states
//!
//! ```text
//!   (absent) ──first resolve──► InFlight(shared future) ──┬──► Resolved(value)
//!                                    ▲                     └──► Failed(error)
//!                                    └── later resolves attach here
//! ```
//!
//! The check for an existing entry and the insertion of a new one happen under one
//! lock, so exactly one caller wins the right to run the loader for a key. Everything
//! else awaits the same shared future or reads the settled entry. Failures are kept
//! for the rest of the scope; asking again does not retry a doomed call.

use super::key::IdentityKey;
use crate::error::ResolveError;
use futures::{
	FutureExt, TryFutureExt,
	future::{BoxFuture, Shared},
};
use serde_json::Value;
use std::{
	collections::HashMap,
	future::Future,
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicUsize, Ordering},
	},
};

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Value>, ResolveError>>>;

enum CacheEntry {
	InFlight(SharedLoad),
	Resolved(Arc<Value>),
	Failed(ResolveError),
}

/// Lookup cache for one query.
///
/// Dropping the scope (or calling [`Self::clear`]) discards every entry.
#[derive(Default)]
pub struct ResolutionScope {
	entries: Mutex<HashMap<IdentityKey, CacheEntry>>,
	loads: AtomicUsize,
}

impl ResolutionScope {
	/// Create an empty scope.
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolve `key`, running `loader` only if no entry exists for it yet.
	///
	/// `loader` is called while the cache lock is held and must only build the future;
	/// all work belongs in the future it returns.
	pub async fn resolve<F, Fut>(&self, key: IdentityKey, loader: F) -> Result<Arc<Value>, ResolveError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
	{
		let load = {
			let mut entries = self.lock();
			match entries.get(&key) {
				Some(CacheEntry::Resolved(value)) => return Ok(value.clone()),
				Some(CacheEntry::Failed(error)) => return Err(error.clone()),
				Some(CacheEntry::InFlight(load)) => load.clone(),
				None => {
					self.loads.fetch_add(1, Ordering::Relaxed);
					log::trace!("Loading {key}");
					let load = loader().map_ok(Arc::new).boxed().shared();
					entries.insert(key.clone(), CacheEntry::InFlight(load.clone()));
					load
				},
			}
		};

		let outcome = load.await;
		self.settle(key, &outcome);
		outcome
	}

	/// Number of loaders run in this scope.
	pub fn loads(&self) -> usize {
		self.loads.load(Ordering::Relaxed)
	}

	/// Number of cached entries, settled or in flight.
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	/// Whether the scope holds no entries.
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// Discard every entry.
	pub fn clear(&self) {
		self.lock().clear();
	}

	fn settle(&self, key: IdentityKey, outcome: &Result<Arc<Value>, ResolveError>) {
		let mut entries = self.lock();
		// Only an in-flight entry is replaced; a cleared scope stays cleared.
		if let Some(entry) = entries.get_mut(&key) &&
			matches!(entry, CacheEntry::InFlight(_))
		{
			*entry = match outcome {
				Ok(value) => CacheEntry::Resolved(value.clone()),
				Err(error) => CacheEntry::Failed(error.clone()),
			};
		}
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<IdentityKey, CacheEntry>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RpcClientError;
	use serde_json::json;
	use std::time::Duration;

	fn key(name: &str) -> IdentityKey {
		IdentityKey::new("getAccountInfo", &json!([name]))
	}

	#[tokio::test]
	async fn concurrent_resolves_share_one_load() {
		let scope = ResolutionScope::new();
		let runs = Arc::new(AtomicUsize::new(0));
		let load = || {
			let runs = runs.clone();
			async move {
				runs.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(10)).await;
				Ok(json!({ "lamports": 1 }))
			}
		};

		let (a, b, c) = tokio::join!(
			scope.resolve(key("A"), load),
			scope.resolve(key("A"), load),
			scope.resolve(key("A"), load),
		);

		assert_eq!(runs.load(Ordering::SeqCst), 1);
		assert_eq!(scope.loads(), 1);
		let a = a.unwrap();
		assert!(Arc::ptr_eq(&a, &b.unwrap()));
		assert!(Arc::ptr_eq(&a, &c.unwrap()));
	}

	#[tokio::test]
	async fn resolved_values_are_served_from_the_scope() {
		let scope = ResolutionScope::new();
		let first = scope.resolve(key("A"), || async { Ok(json!(1)) }).await.unwrap();
		let second = scope
			.resolve(key("A"), || async { Err(ResolveError::Cancelled) })
			.await
			.unwrap();
		assert_eq!(first, second);
		assert_eq!(scope.loads(), 1);
	}

	#[tokio::test]
	async fn failures_are_cached() {
		let scope = ResolutionScope::new();
		let error = ResolveError::Rpc(RpcClientError::TransportClosed);
		let failed = error.clone();
		let first = scope.resolve(key("A"), move || async move { Err(failed) }).await;
		let second = scope.resolve(key("A"), || async { Ok(json!("retried")) }).await;

		assert_eq!(first, Err(error.clone()));
		assert_eq!(second, Err(error));
		assert_eq!(scope.loads(), 1);
	}

	#[tokio::test]
	async fn distinct_keys_load_independently() {
		let scope = ResolutionScope::new();
		let a = scope.resolve(key("A"), || async { Ok(json!("a")) }).await.unwrap();
		let b = scope.resolve(key("B"), || async { Ok(json!("b")) }).await.unwrap();
		assert_eq!(*a, json!("a"));
		assert_eq!(*b, json!("b"));
		assert_eq!(scope.len(), 2);
	}

	#[tokio::test]
	async fn clear_discards_everything() {
		let scope = ResolutionScope::new();
		scope.resolve(key("A"), || async { Ok(json!(1)) }).await.unwrap();
		scope.clear();
		assert!(scope.is_empty());

		let value = scope.resolve(key("A"), || async { Ok(json!(2)) }).await.unwrap();
		assert_eq!(*value, json!(2));
		assert_eq!(scope.loads(), 2);
	}
}
