// SPDX-License-Identifier: GPL-3.0

//! Coalescing of lookups issued in the same scheduling turn.
//!
//! The first [`BatchLoader::load`] of a turn becomes the leader: it queues its key,
//! yields once so every sibling future polled in the same turn can queue theirs, and
//! then dispatches the whole queue. Each dispatched batch runs on its own task, so a
//! leader that is dropped does not strand the keys queued behind it.
//!
//! ```text
//!   load(x) ──┐
//!   load(y) ──┼──► queue [x, y, z] ──► batch_fn([x, y, z]) ──► fan out results
//!   load(z) ──┘      (max_batch_size per call)
//! ```

use crate::error::ResolveError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::{
	Arc, Mutex, MutexGuard, PoisonError,
	atomic::{AtomicUsize, Ordering},
};
use tokio::sync::oneshot;

/// Per-key results of one batch, in key order.
pub type BatchOutcome = Result<Vec<Result<Value, ResolveError>>, ResolveError>;

/// Loads a batch of keys in one round trip.
pub type BatchFn<K> = Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, BatchOutcome> + Send + Sync>;

type Waiter = oneshot::Sender<Result<Value, ResolveError>>;

struct Inner<K> {
	batch_fn: BatchFn<K>,
	max_batch_size: usize,
	queue: Mutex<Vec<(K, Waiter)>>,
	dispatches: AtomicUsize,
}

/// Groups concurrent lookups into batched calls.
pub struct BatchLoader<K> {
	inner: Arc<Inner<K>>,
}

impl<K> Clone for BatchLoader<K> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<K: Send + 'static> BatchLoader<K> {
	/// Create a loader calling `batch_fn` with at most `max_batch_size` keys at a time.
	pub fn new(max_batch_size: usize, batch_fn: BatchFn<K>) -> Self {
		Self {
			inner: Arc::new(Inner {
				batch_fn,
				max_batch_size: max_batch_size.max(1),
				queue: Mutex::new(Vec::new()),
				dispatches: AtomicUsize::new(0),
			}),
		}
	}

	/// Load `key` as part of the current turn's batch.
	pub async fn load(&self, key: K) -> Result<Value, ResolveError> {
		let (sender, receiver) = oneshot::channel();
		let leader = {
			let mut queue = self.inner.lock();
			queue.push((key, sender));
			queue.len() == 1
		};
		if leader {
			let _dispatch = DispatchOnDrop(&self.inner);
			tokio::task::yield_now().await;
		}
		receiver.await.unwrap_or(Err(ResolveError::Cancelled))
	}

	/// Number of batch calls made so far.
	pub fn dispatches(&self) -> usize {
		self.inner.dispatches.load(Ordering::Relaxed)
	}
}

impl<K: Send + 'static> Inner<K> {
	fn dispatch(&self) {
		let mut pending = std::mem::take(&mut *self.lock());
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			// Waiters observe the dropped senders as cancellation.
			log::debug!("No runtime available; abandoning {} queued keys", pending.len());
			return;
		};
		while !pending.is_empty() {
			let rest = pending.split_off(pending.len().min(self.max_batch_size));
			let chunk = std::mem::replace(&mut pending, rest);
			let (keys, waiters): (Vec<K>, Vec<Waiter>) = chunk.into_iter().unzip();
			self.dispatches.fetch_add(1, Ordering::Relaxed);
			log::trace!("Dispatching batch of {} keys", keys.len());
			let load = (self.batch_fn)(keys);
			runtime.spawn(async move { fan_out(load.await, waiters) });
		}
	}

	fn lock(&self) -> MutexGuard<'_, Vec<(K, Waiter)>> {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn fan_out(outcome: BatchOutcome, waiters: Vec<Waiter>) {
	match outcome {
		Ok(results) if results.len() == waiters.len() =>
			for (waiter, result) in waiters.into_iter().zip(results) {
				let _ = waiter.send(result);
			},
		Ok(results) => {
			let error =
				ResolveError::BatchMismatch { expected: waiters.len(), received: results.len() };
			for waiter in waiters {
				let _ = waiter.send(Err(error.clone()));
			}
		},
		Err(error) =>
			for waiter in waiters {
				let _ = waiter.send(Err(error.clone()));
			},
	}
}

/// Dispatches the queue when the leader resumes, or when it is dropped mid-turn.
struct DispatchOnDrop<'a, K: Send + 'static>(&'a Inner<K>);

impl<K: Send + 'static> Drop for DispatchOnDrop<'_, K> {
	fn drop(&mut self) {
		self.0.dispatch();
	}
}
