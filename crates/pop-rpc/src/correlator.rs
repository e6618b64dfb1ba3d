// SPDX-License-Identifier: GPL-3.0

//! Call correlation for duplex connections.
//!
//! The [`CallCorrelator`] assigns request ids, tracks outstanding calls and hands
//! each inbound response to the caller that issued the matching request.
//!
//! # Lifecycle of a call
//!
//! ```text
//!   call() ──► register pending entry ──► write frame ──► await result slot
//!                      │                                        ▲
//!                      │            route(response) ────────────┤
//!                      │            close() ── TransportClosed ─┤
//!                      └── cancel / drop ── entry removed ──────┘
//! ```
//!
//! Closing uses close-then-drain ordering: the correlator is marked dead, every entry
//! still present is failed with [`RpcClientError::TransportClosed`], and responses
//! arriving afterwards are ignored. All three steps happen under the same lock as
//! routing, so a late response can never race a close.

use crate::{
	connection::FrameSink,
	error::RpcClientError,
	frame::{ErrorObject, Request, RequestId, Response},
};
use futures::future::join_all;
use serde_json::Value;
use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicU64, Ordering},
	},
	time::Instant,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

type CallResult = Result<Value, RpcClientError>;

/// Runs on the reader task when a response is routed, before the caller is woken.
///
/// Lets the subscription manager install a notification route before any frame that
/// follows the subscribe response is processed.
pub(crate) type ResponseHook = Box<dyn FnOnce(CallResult) -> CallResult + Send>;

/// A call awaiting its response.
struct PendingCall {
	method: String,
	/// Batch the call was sent in, if any.
	batch: Option<u64>,
	created_at: Instant,
	hook: Option<ResponseHook>,
	result: oneshot::Sender<CallResult>,
}

impl PendingCall {
	fn fulfil(self, outcome: CallResult) {
		let outcome = match self.hook {
			Some(hook) => hook(outcome),
			None => outcome,
		};
		log::trace!(
			"Fulfilled `{}` after {:?} (ok: {})",
			self.method,
			self.created_at.elapsed(),
			outcome.is_ok()
		);
		// The caller may already be gone; the result is dropped with it.
		let _ = self.result.send(outcome);
	}
}

#[derive(Default)]
struct State {
	calls: HashMap<RequestId, PendingCall>,
	closed: bool,
}

/// Tracks outstanding calls on one connection.
///
/// Request ids come from a counter owned by this instance, so they are unique for the
/// lifetime of the connection and independent of any other connection.
pub struct CallCorrelator {
	sink: Arc<dyn FrameSink>,
	state: Mutex<State>,
	next_id: AtomicU64,
	next_batch: AtomicU64,
}

impl CallCorrelator {
	/// Create a correlator writing to `sink`.
	pub fn new(sink: Arc<dyn FrameSink>) -> Self {
		Self {
			sink,
			state: Mutex::new(State::default()),
			next_id: AtomicU64::new(1),
			next_batch: AtomicU64::new(1),
		}
	}

	/// Issue a call and wait for its response.
	///
	/// # Returns
	/// * `Ok(result)` - The node answered with a result
	/// * `Err(RpcClientError::Protocol { .. })` - The node answered with an error object
	/// * `Err(RpcClientError::Cancelled)` - `cancel` fired before the response arrived
	/// * `Err(RpcClientError::TransportClosed)` - The connection dropped first
	pub async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError> {
		self.call_with_hook(method, params, cancel, None).await
	}

	pub(crate) async fn call_with_hook(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
		hook: Option<ResponseHook>,
	) -> Result<Value, RpcClientError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let frame = serde_json::to_string(&Request::new(id, method, &params))?;

		let receiver = {
			let mut state = self.lock();
			if state.closed {
				return Err(RpcClientError::TransportClosed);
			}
			let (sender, receiver) = oneshot::channel();
			state.calls.insert(
				id,
				PendingCall {
					method: method.to_string(),
					batch: None,
					created_at: Instant::now(),
					hook,
					result: sender,
				},
			);
			receiver
		};
		let _guard = PendingGuard { correlator: self, ids: vec![id] };

		tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			sent = self.sink.send(frame) => sent?,
		}
		log::debug!("Sent `{method}` (id {id})");

		// A response that is already routed wins over a cancellation observed at the same time.
		tokio::select! {
			biased;
			outcome = receiver => outcome.unwrap_or(Err(RpcClientError::TransportClosed)),
			_ = cancel.cancelled() => Err(RpcClientError::Cancelled),
		}
	}

	/// Issue several calls in a single frame.
	///
	/// Results are returned in the order of `calls`. An error object returned for one
	/// entry fails only that entry; the outer error is reserved for failures affecting
	/// the whole batch (cancellation, a closed transport, a failed write).
	pub async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<Vec<Result<Value, RpcClientError>>, RpcClientError> {
		if calls.is_empty() {
			return Ok(vec![]);
		}

		let batch = self.next_batch.fetch_add(1, Ordering::Relaxed);
		let ids: Vec<RequestId> =
			calls.iter().map(|_| self.next_id.fetch_add(1, Ordering::Relaxed)).collect();
		let requests: Vec<Request<'_>> = ids
			.iter()
			.zip(calls.iter())
			.map(|(id, (method, params))| Request::new(*id, method, params))
			.collect();
		let frame = serde_json::to_string(&requests)?;

		let receivers = {
			let mut state = self.lock();
			if state.closed {
				return Err(RpcClientError::TransportClosed);
			}
			let now = Instant::now();
			ids.iter()
				.zip(calls.iter())
				.map(|(id, (method, _))| {
					let (sender, receiver) = oneshot::channel();
					state.calls.insert(
						*id,
						PendingCall {
							method: method.clone(),
							batch: Some(batch),
							created_at: now,
							hook: None,
							result: sender,
						},
					);
					receiver
				})
				.collect::<Vec<_>>()
		};
		let _guard = PendingGuard { correlator: self, ids };

		tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			sent = self.sink.send(frame) => sent?,
		}
		log::debug!("Sent batch {batch} with {} calls", calls.len());

		let outcomes = tokio::select! {
			biased;
			outcomes = join_all(receivers) => outcomes,
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
		};
		Ok(outcomes
			.into_iter()
			.map(|outcome| outcome.unwrap_or(Err(RpcClientError::TransportClosed)))
			.collect())
	}

	/// Route a response to its caller.
	///
	/// Returns `false` if no call with that id is outstanding; the frame is dropped.
	pub fn route(&self, response: Response) -> bool {
		let call = {
			let mut state = self.lock();
			if state.closed {
				return false;
			}
			state.calls.remove(&response.id)
		};
		match call {
			Some(call) => {
				call.fulfil(response.outcome.map_err(RpcClientError::from));
				true
			},
			None => {
				log::warn!("Dropping response for unknown request id {}", response.id);
				false
			},
		}
	}

	/// Route the responses of a batch frame.
	///
	/// Calls that were sent in a batch answered by this frame but are missing from it
	/// are failed with [`RpcClientError::Malformed`] rather than left waiting.
	pub fn route_batch(&self, responses: Vec<Response>) {
		let mut routed = Vec::with_capacity(responses.len());
		{
			let mut state = self.lock();
			if state.closed {
				return;
			}
			let mut batches = HashSet::new();
			for response in responses {
				match state.calls.remove(&response.id) {
					Some(call) => {
						batches.extend(call.batch);
						routed.push((call, response.outcome.map_err(RpcClientError::from)));
					},
					None => log::warn!("Dropping response for unknown request id {}", response.id),
				}
			}
			let missing: Vec<RequestId> = state
				.calls
				.iter()
				.filter(|(_, call)| call.batch.is_some_and(|batch| batches.contains(&batch)))
				.map(|(id, _)| *id)
				.collect();
			for id in missing {
				if let Some(call) = state.calls.remove(&id) {
					let error =
						RpcClientError::Malformed(format!("response {id} missing from batch"));
					routed.push((call, Err(error)));
				}
			}
		}
		for (call, outcome) in routed {
			call.fulfil(outcome);
		}
	}

	/// Fail the batch an error object without an id was meant for.
	///
	/// Nodes answer that way when they reject a whole batch. The error goes to every entry
	/// of the oldest outstanding batch. Single calls always get their id echoed back, so
	/// with no batch outstanding the error is dropped. Returns the number of calls failed.
	pub fn reject(&self, error: ErrorObject) -> usize {
		let rejected: Vec<PendingCall> = {
			let mut state = self.lock();
			if state.closed {
				return 0;
			}
			let Some(oldest) = state.calls.values().filter_map(|call| call.batch).min() else {
				log::warn!("Dropping error without request id: {} ({})", error.message, error.code);
				return 0;
			};
			let ids: Vec<RequestId> = state
				.calls
				.iter()
				.filter(|(_, call)| call.batch == Some(oldest))
				.map(|(id, _)| *id)
				.collect();
			ids.iter().filter_map(|id| state.calls.remove(id)).collect()
		};
		log::debug!("Batch rejected by the node: {} ({})", error.message, error.code);
		let failed = rejected.len();
		for call in rejected {
			call.fulfil(Err(RpcClientError::from(error.clone())));
		}
		failed
	}

	/// Mark the correlator dead and fail every outstanding call.
	///
	/// Returns the number of calls that were failed.
	pub fn close(&self) -> usize {
		let calls = {
			let mut state = self.lock();
			state.closed = true;
			std::mem::take(&mut state.calls)
		};
		let failed = calls.len();
		for (_, call) in calls {
			// Hooks are skipped: nothing they would install can outlive the connection.
			let _ = call.result.send(Err(RpcClientError::TransportClosed));
		}
		failed
	}

	/// Whether [`Self::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.lock().closed
	}

	/// Number of calls awaiting a response.
	pub fn pending_calls(&self) -> usize {
		self.lock().calls.len()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Removes pending entries when a call is cancelled or its future dropped.
///
/// Entries that were already fulfilled are gone, so removal is a no-op for them.
struct PendingGuard<'a> {
	correlator: &'a CallCorrelator,
	ids: Vec<RequestId>,
}

impl Drop for PendingGuard<'_> {
	fn drop(&mut self) {
		let mut state = self.correlator.lock();
		for id in &self.ids {
			if let Some(call) = state.calls.remove(id) {
				log::debug!("Call `{}` (id {id}) cancelled; removed pending entry", call.method);
			}
		}
	}
}
