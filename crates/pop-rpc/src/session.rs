// SPDX-License-Identifier: GPL-3.0

//! A live duplex connection with its reader task.
//!
//! A [`Session`] owns one [`DuplexConnection`]. Callers share its write half through the
//! [`CallCorrelator`]; a single background task reads every inbound frame and hands it
//! to the correlator or the [`SubscriptionManager`].
//!
//! ```text
//!                 ┌────────────────────────────────────────────┐
//!   call() ──────►│ CallCorrelator ───────► FrameSink ─────────┼──► node
//!   subscribe() ─►│ SubscriptionManager ─┘                     │
//!                 │        ▲           ▲                       │
//!                 │   notifications  responses                 │
//!                 │        └─── reader task ◄── FrameStream ◄──┼─── node
//!                 └────────────────────────────────────────────┘
//! ```
//!
//! When the stream ends or fails, the reader fails every outstanding call and closes
//! every subscription before it exits. A session is never revived; the transport opens
//! a new one.

use crate::{
	config::ClientConfig,
	connection::{DuplexConnection, FrameSink, FrameStream},
	correlator::CallCorrelator,
	error::RpcClientError,
	frame::Inbound,
	subscription::{BackpressurePolicy, Subscription, SubscriptionManager, SubscriptionRequest},
};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default number of notifications buffered per subscription.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 256;

/// Per-connection delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
	/// Notifications buffered per subscription before backpressure applies.
	pub notification_buffer: usize,
	/// What to do when a subscription buffer is full.
	pub backpressure: BackpressurePolicy,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
			backpressure: BackpressurePolicy::default(),
		}
	}
}

impl From<&ClientConfig> for SessionOptions {
	fn from(config: &ClientConfig) -> Self {
		Self { notification_buffer: config.notification_buffer, backpressure: config.backpressure }
	}
}

/// One established duplex connection.
///
/// Must be started from within a Tokio runtime.
pub struct Session {
	sink: Arc<dyn FrameSink>,
	correlator: Arc<CallCorrelator>,
	subscriptions: Arc<SubscriptionManager>,
	shutdown: CancellationToken,
}

impl Session {
	/// Take ownership of `connection` and spawn its reader task.
	pub fn start(connection: DuplexConnection, options: SessionOptions) -> Self {
		let sink: Arc<dyn FrameSink> = Arc::from(connection.sink);
		let correlator = Arc::new(CallCorrelator::new(sink.clone()));
		let subscriptions = Arc::new(SubscriptionManager::new(
			correlator.clone(),
			options.notification_buffer,
			options.backpressure,
		));
		let shutdown = CancellationToken::new();

		tokio::spawn(read_frames(
			connection.stream,
			correlator.clone(),
			subscriptions.clone(),
			shutdown.clone(),
		));

		Self { sink, correlator, subscriptions, shutdown }
	}

	/// Issue a call over this session.
	pub async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError> {
		self.correlator.call(method, params, cancel).await
	}

	/// Issue several calls in one frame.
	pub async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<Vec<Result<Value, RpcClientError>>, RpcClientError> {
		self.correlator.call_batch(calls, cancel).await
	}

	/// Open a subscription over this session.
	pub fn subscribe(&self, request: SubscriptionRequest, cancel: &CancellationToken) -> Subscription {
		self.subscriptions.open(request, cancel)
	}

	/// Whether the session has ended or is shutting down.
	pub fn is_closed(&self) -> bool {
		self.shutdown.is_cancelled() || self.correlator.is_closed()
	}

	/// Close the connection.
	///
	/// Outstanding calls fail and subscriptions end with
	/// [`RpcClientError::TransportClosed`].
	pub async fn close(&self) {
		self.shutdown.cancel();
		self.sink.close().await;
	}

	/// Number of calls awaiting a response.
	pub fn pending_calls(&self) -> usize {
		self.correlator.pending_calls()
	}

	/// Number of confirmed, open subscriptions.
	pub fn active_subscriptions(&self) -> usize {
		self.subscriptions.active_subscriptions()
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

async fn read_frames(
	mut stream: FrameStream,
	correlator: Arc<CallCorrelator>,
	subscriptions: Arc<SubscriptionManager>,
	shutdown: CancellationToken,
) {
	let reason = loop {
		let frame = tokio::select! {
			_ = shutdown.cancelled() => break "closed locally".to_string(),
			frame = stream.next() => frame,
		};
		let text = match frame {
			Some(Ok(text)) => text,
			Some(Err(RpcClientError::Malformed(e))) => {
				log::warn!("Skipping unreadable frame: {e}");
				continue;
			},
			Some(Err(e)) => break e.to_string(),
			None => break "closed by peer".to_string(),
		};
		match Inbound::parse(&text) {
			Ok(Inbound::Response(response)) => {
				correlator.route(response);
			},
			Ok(Inbound::Batch(responses)) => correlator.route_batch(responses),
			Ok(Inbound::Rejected(error)) => {
				correlator.reject(error);
			},
			Ok(Inbound::Notification(notification)) => tokio::select! {
				_ = shutdown.cancelled() => break "closed locally".to_string(),
				_ = subscriptions.dispatch(notification) => {},
			},
			Err(e) => log::warn!("Ignoring inbound frame: {e}"),
		}
	};

	let failed = correlator.close();
	let closed = subscriptions.close_all();
	log::debug!(
		"Session ended ({reason}): failed {failed} pending calls, closed {closed} subscriptions"
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::connection::memory;
	use serde_json::json;

	#[tokio::test]
	async fn concurrent_calls_resolve_independently_of_arrival_order() {
		let _ = env_logger::try_init();
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();

		let (first, second, ()) = tokio::join!(
			session.call("getSlot", json!([]), &cancel),
			session.call("getBlockHeight", json!([]), &cancel),
			async {
				let a = node.next_request().await.unwrap();
				let b = node.next_request().await.unwrap();
				node.respond(b.id, json!(format!("{}-reply", b.method)));
				node.respond(a.id, json!(format!("{}-reply", a.method)));
			}
		);

		assert_eq!(first, Ok(json!("getSlot-reply")));
		assert_eq!(second, Ok(json!("getBlockHeight-reply")));
		assert_eq!(session.pending_calls(), 0);
	}

	#[tokio::test]
	async fn batch_responses_are_fanned_out() {
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();
		let calls = vec![
			("getBalance".to_string(), json!(["x"])),
			("getBalance".to_string(), json!(["y"])),
		];

		let (results, ()) = tokio::join!(session.call_batch(calls, &cancel), async {
			let batch = node.next_batch().await.unwrap();
			assert_eq!(batch.len(), 2);
			let responses: Vec<Value> = batch
				.iter()
				.rev()
				.map(|request| {
					let echoed = request.params[0].clone();
					json!({ "jsonrpc": "2.0", "id": request.id, "result": echoed })
				})
				.collect();
			node.push(Value::Array(responses));
		});

		assert_eq!(results.unwrap(), vec![Ok(json!("x")), Ok(json!("y"))]);
	}

	#[tokio::test]
	async fn connection_loss_fails_every_pending_call() {
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();

		let (first, second, ()) = tokio::join!(
			session.call("getSlot", json!([]), &cancel),
			session.call("getSlot", json!([]), &cancel),
			async {
				node.next_request().await.unwrap();
				node.next_request().await.unwrap();
				node.fail("connection reset");
			}
		);

		assert_eq!(first, Err(RpcClientError::TransportClosed));
		assert_eq!(second, Err(RpcClientError::TransportClosed));
		assert!(session.is_closed());
		assert_eq!(
			session.call("getSlot", json!([]), &cancel).await,
			Err(RpcClientError::TransportClosed)
		);
	}

	#[tokio::test]
	async fn garbage_and_unknown_frames_do_not_disturb_calls() {
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();

		let (result, ()) = tokio::join!(session.call("getSlot", json!([]), &cancel), async {
			let request = node.next_request().await.unwrap();
			node.push_raw("{not json");
			node.push(json!({ "jsonrpc": "2.0", "id": 999, "result": 1 }));
			node.push(json!({ "jsonrpc": "2.0", "id": null, "error": { "code": -32700, "message": "Parse error" } }));
			node.respond(request.id, json!(42));
		});

		assert_eq!(result, Ok(json!(42)));
		assert!(!session.is_closed());
	}

	#[tokio::test]
	async fn rejected_batch_fails_every_entry() {
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();
		let calls = vec![("getSlot".to_string(), json!([])), ("getSlot".to_string(), json!([]))];

		let (results, ()) = tokio::join!(session.call_batch(calls, &cancel), async {
			node.next_batch().await.unwrap();
			node.push(json!({
				"jsonrpc": "2.0",
				"id": null,
				"error": { "code": -32600, "message": "Invalid request" },
			}));
		});

		let rejected = Err(RpcClientError::Protocol {
			code: -32600,
			message: "Invalid request".to_string(),
			data: None,
		});
		assert_eq!(results, Ok(vec![rejected.clone(), rejected]));
		assert_eq!(session.pending_calls(), 0);
		assert!(!session.is_closed());
	}

	#[tokio::test]
	async fn close_fails_outstanding_calls() {
		let (connection, mut node) = memory::pair();
		let session = Session::start(connection, SessionOptions::default());
		let cancel = CancellationToken::new();

		let (result, ()) = tokio::join!(session.call("getSlot", json!([]), &cancel), async {
			node.next_request().await.unwrap();
			session.close().await;
		});

		assert_eq!(result, Err(RpcClientError::TransportClosed));
		assert!(session.is_closed());
		// The node sees the write half closing.
		assert_eq!(node.next_frame().await, None);
	}
}
