// SPDX-License-Identifier: GPL-3.0

//! Subscriptions over a duplex connection.
//!
//! [`SubscriptionManager::open`] returns a [`Subscription`] immediately; the subscribe
//! call runs in the background and the stream starts yielding once the node confirmed
//! it. Each subscription moves through the following states:
//!
//! ```text
//!   Pending ──(subscribe ok)──► Active ──(close / cancel / drop)──► Cancelling ──► Closed
//!      │                          │
//!      ├──(subscribe error)───────┼──────────────────────────────────────────────► Closed
//!      └──(connection lost)───────┴──────────────────────────────► Closed (TransportClosed)
//! ```
//!
//! Notifications are routed by the server-assigned subscription id and delivered in wire
//! order through a bounded buffer. What happens when that buffer is full is decided per
//! connection by the [`BackpressurePolicy`]. Subscriptions are never re-established
//! automatically; after a connection loss the caller subscribes again.

use crate::{
	correlator::{CallCorrelator, ResponseHook},
	error::RpcClientError,
	frame::{Notification, SubscriptionId},
};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	task::{Context, Poll},
	time::Duration,
};
use tokio::sync::{
	mpsc::{self, error::TrySendError},
	oneshot,
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Upper bound on how long a best-effort unsubscribe waits for the node.
const UNSUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What the reader does with a notification whose subscription buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackpressurePolicy {
	/// Stop reading from the connection until the consumer catches up.
	///
	/// Nothing is lost and order is preserved, but a stalled consumer stalls every call
	/// and subscription sharing the connection.
	#[default]
	PauseReads,
	/// Discard the notification that does not fit and keep reading.
	DropNewest,
}

/// Wire names and parameters of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
	/// Method opening the subscription, e.g. `accountSubscribe`.
	pub subscribe: String,
	/// Method closing it, e.g. `accountUnsubscribe`.
	pub unsubscribe: String,
	/// Method tag carried by notifications, e.g. `accountNotification`.
	pub notification: String,
	/// Parameters of the subscribe call.
	pub params: Value,
}

/// Lifecycle state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
	/// The subscribe call is in flight.
	Pending,
	/// The node confirmed the subscription; notifications flow.
	Active,
	/// The subscription is being torn down.
	Cancelling,
	/// Terminal. Nothing is delivered any more.
	Closed,
}

struct HandleEntry {
	unsubscribe: String,
	notification: String,
	sender: mpsc::Sender<Value>,
	server_id: Option<SubscriptionId>,
}

#[derive(Default)]
struct Table {
	handles: HashMap<u64, HandleEntry>,
	routes: HashMap<SubscriptionId, u64>,
}

/// Routes notifications of one connection to their subscriptions.
pub struct SubscriptionManager {
	correlator: Arc<CallCorrelator>,
	table: Mutex<Table>,
	closed: AtomicBool,
	next_handle: AtomicU64,
	buffer: usize,
	policy: BackpressurePolicy,
}

impl SubscriptionManager {
	/// Create a manager issuing its subscribe calls through `correlator`.
	///
	/// `buffer` is the number of notifications held per subscription before `policy`
	/// applies.
	pub fn new(correlator: Arc<CallCorrelator>, buffer: usize, policy: BackpressurePolicy) -> Self {
		Self {
			correlator,
			table: Mutex::new(Table::default()),
			closed: AtomicBool::new(false),
			next_handle: AtomicU64::new(1),
			buffer: buffer.max(1),
			policy,
		}
	}

	/// Open a subscription.
	///
	/// Returns immediately. Cancelling `cancel` closes the subscription, including one
	/// whose subscribe call is still in flight.
	pub fn open(
		self: &Arc<Self>,
		request: SubscriptionRequest,
		cancel: &CancellationToken,
	) -> Subscription {
		let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
		let (sender, receiver) = mpsc::channel(self.buffer);
		let token = cancel.child_token();
		let (confirm_tx, confirm_rx) = oneshot::channel();

		let registered = {
			let mut table = self.lock();
			// Checked under the table lock so a concurrent `close_all` cannot miss the entry.
			if self.is_closed() {
				false
			} else {
				table.handles.insert(
					handle,
					HandleEntry {
						unsubscribe: request.unsubscribe.clone(),
						notification: request.notification.clone(),
						sender,
						server_id: None,
					},
				);
				true
			}
		};
		if !registered {
			let _ = confirm_tx.send(Err(RpcClientError::TransportClosed));
			return Subscription::new(self.clone(), handle, confirm_rx, receiver, token);
		}

		let manager = self.clone();
		let task_token = token.clone();
		tokio::spawn(async move {
			let hook = manager.confirm_hook(handle, request.unsubscribe.clone());
			let outcome = manager
				.correlator
				.call_with_hook(&request.subscribe, request.params, &task_token, Some(hook))
				.await
				.and_then(|value| Ok(serde_json::from_value::<SubscriptionId>(value)?));
			match &outcome {
				Ok(id) => log::debug!("Subscribed to `{}` with id {id}", request.notification),
				Err(e) => {
					log::debug!("Subscribe call `{}` failed: {e}", request.subscribe);
					// The confirmation may have been routed just before the call gave up.
					if let Some((id, unsubscribe)) = manager.release(handle) {
						manager.spawn_unsubscribe(id, unsubscribe);
					}
				},
			}
			let _ = confirm_tx.send(outcome);
		});

		Subscription::new(self.clone(), handle, confirm_rx, receiver, token)
	}

	/// Deliver a notification to its subscription.
	///
	/// With [`BackpressurePolicy::PauseReads`] this waits until the subscription's buffer
	/// has room, which holds up the caller (the connection reader).
	pub async fn dispatch(&self, notification: Notification) {
		let sender = {
			let table = self.lock();
			let Some(entry) = table
				.routes
				.get(&notification.subscription)
				.and_then(|handle| table.handles.get(handle))
			else {
				log::warn!(
					"Dropping `{}` for unknown subscription {}",
					notification.method,
					notification.subscription
				);
				return;
			};
			if entry.notification != notification.method {
				log::warn!(
					"Dropping `{}` for subscription {}: expected `{}`",
					notification.method,
					notification.subscription,
					entry.notification
				);
				return;
			}
			entry.sender.clone()
		};

		match self.policy {
			BackpressurePolicy::PauseReads => {
				if sender.send(notification.result).await.is_err() {
					log::trace!("Subscription {} closed before delivery", notification.subscription);
				}
			},
			BackpressurePolicy::DropNewest => match sender.try_send(notification.result) {
				Ok(()) => {},
				Err(TrySendError::Full(_)) => log::warn!(
					"Subscription {} buffer full; dropping `{}`",
					notification.subscription,
					notification.method
				),
				Err(TrySendError::Closed(_)) => {
					log::trace!("Subscription {} closed before delivery", notification.subscription)
				},
			},
		}
	}

	/// Remove a subscription from the routing tables.
	///
	/// Returns the server id and unsubscribe method if the node had confirmed it, so the
	/// caller can tear it down remotely. Releasing twice returns `None`.
	pub fn release(&self, handle: u64) -> Option<(SubscriptionId, String)> {
		let mut table = self.lock();
		let entry = table.handles.remove(&handle)?;
		let id = entry.server_id?;
		table.routes.remove(&id);
		Some((id, entry.unsubscribe))
	}

	/// Ask the node to drop subscription `id`.
	///
	/// Best effort: failures are logged and otherwise ignored.
	pub async fn unsubscribe(&self, id: SubscriptionId, method: &str) -> bool {
		let params = match serde_json::to_value(&id) {
			Ok(id) => Value::Array(vec![id]),
			Err(e) => {
				log::warn!("Cannot encode subscription id {id}: {e}");
				return false;
			},
		};
		let cancel = CancellationToken::new();
		let call = self.correlator.call(method, params, &cancel);
		match tokio::time::timeout(UNSUBSCRIBE_TIMEOUT, call).await {
			Ok(Ok(_)) => {
				log::debug!("Unsubscribed {id} via `{method}`");
				true
			},
			Ok(Err(e)) => {
				log::debug!("Unsubscribe `{method}` for {id} failed: {e}");
				false
			},
			Err(_) => {
				log::debug!("Unsubscribe `{method}` for {id} timed out");
				false
			},
		}
	}

	/// Close every subscription of the connection.
	///
	/// Open streams yield [`RpcClientError::TransportClosed`] and end. Returns the number
	/// of subscriptions closed.
	pub fn close_all(&self) -> usize {
		let handles = {
			let mut table = self.lock();
			self.closed.store(true, Ordering::SeqCst);
			table.routes.clear();
			std::mem::take(&mut table.handles)
		};
		handles.len()
	}

	/// Whether the connection behind this manager is gone.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Number of subscriptions the node has confirmed and that are still open.
	pub fn active_subscriptions(&self) -> usize {
		self.lock().routes.len()
	}

	/// Installs the notification route when the subscribe response is routed, before any
	/// later frame on the connection is processed.
	fn confirm_hook(self: &Arc<Self>, handle: u64, unsubscribe: String) -> ResponseHook {
		let manager = self.clone();
		Box::new(move |outcome: Result<Value, RpcClientError>| -> Result<Value, RpcClientError> {
			let value = outcome?;
			let id: SubscriptionId = serde_json::from_value(value.clone()).map_err(|e| {
				RpcClientError::Malformed(format!("invalid subscription id {value}: {e}"))
			})?;
			let mut table = manager.lock();
			if let Some(entry) = table.handles.get_mut(&handle) {
				entry.server_id = Some(id.clone());
				table.routes.insert(id, handle);
				return Ok(value);
			}
			drop(table);
			// Closed while the subscribe call was in flight.
			manager.spawn_unsubscribe(id, unsubscribe);
			Err(RpcClientError::Cancelled)
		})
	}

	fn spawn_unsubscribe(self: &Arc<Self>, id: SubscriptionId, method: String) {
		if self.is_closed() {
			return;
		}
		match tokio::runtime::Handle::try_current() {
			Ok(runtime) => {
				let manager = self.clone();
				runtime.spawn(async move { manager.unsubscribe(id, &method).await });
			},
			Err(_) => log::debug!("No runtime available; skipping `{method}` for {id}"),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Table> {
		self.table.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

enum Phase {
	Pending(oneshot::Receiver<Result<SubscriptionId, RpcClientError>>),
	Active(SubscriptionId),
	Cancelling,
	Closed,
}

/// Stream of notification payloads of one subscription.
///
/// Yields `Ok(payload)` per notification in wire order. Ends after yielding a single
/// `Err` if the subscribe call fails or the connection is lost, and ends silently when
/// closed or cancelled. Dropping the stream closes the subscription.
pub struct Subscription {
	manager: Arc<SubscriptionManager>,
	handle: u64,
	phase: Phase,
	receiver: mpsc::Receiver<Value>,
	cancel: CancellationToken,
	cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl Subscription {
	fn new(
		manager: Arc<SubscriptionManager>,
		handle: u64,
		confirm: oneshot::Receiver<Result<SubscriptionId, RpcClientError>>,
		receiver: mpsc::Receiver<Value>,
		cancel: CancellationToken,
	) -> Self {
		let cancelled = Box::pin(cancel.clone().cancelled_owned());
		Self { manager, handle, phase: Phase::Pending(confirm), receiver, cancel, cancelled }
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SubscriptionState {
		match self.phase {
			Phase::Pending(_) => SubscriptionState::Pending,
			Phase::Active(_) => SubscriptionState::Active,
			Phase::Cancelling => SubscriptionState::Cancelling,
			Phase::Closed => SubscriptionState::Closed,
		}
	}

	/// Server-assigned id, once the subscription is active.
	pub fn id(&self) -> Option<&SubscriptionId> {
		match &self.phase {
			Phase::Active(id) => Some(id),
			_ => None,
		}
	}

	/// Close the subscription.
	///
	/// Local delivery stops immediately. If the node had confirmed the subscription an
	/// unsubscribe call is sent in the background; its outcome does not affect the local
	/// state. Closing an already closed subscription is a no-op.
	pub fn close(&mut self) {
		if matches!(self.phase, Phase::Closed) {
			return;
		}
		self.phase = Phase::Cancelling;
		self.cancel.cancel();
		self.receiver.close();
		if let Some((id, unsubscribe)) = self.manager.release(self.handle) {
			self.manager.spawn_unsubscribe(id, unsubscribe);
		}
		self.phase = Phase::Closed;
	}
}

impl Stream for Subscription {
	type Item = Result<Value, RpcClientError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			if matches!(this.phase, Phase::Closed | Phase::Cancelling) {
				return Poll::Ready(None);
			}
			if this.cancelled.as_mut().poll(cx).is_ready() {
				this.close();
				return Poll::Ready(None);
			}
			if this.manager.is_closed() {
				// Anything still buffered was received before the loss and is discarded.
				this.receiver.close();
				this.phase = Phase::Closed;
				return Poll::Ready(Some(Err(RpcClientError::TransportClosed)));
			}

			match &mut this.phase {
				Phase::Pending(confirm) => match Pin::new(confirm).poll(cx) {
					Poll::Pending => return Poll::Pending,
					Poll::Ready(Ok(Ok(id))) => this.phase = Phase::Active(id),
					Poll::Ready(Ok(Err(e))) => {
						this.phase = Phase::Closed;
						return Poll::Ready(Some(Err(e)));
					},
					Poll::Ready(Err(_)) => {
						this.phase = Phase::Closed;
						return Poll::Ready(Some(Err(RpcClientError::TransportClosed)));
					},
				},
				Phase::Active(_) => match this.receiver.poll_recv(cx) {
					Poll::Ready(Some(value)) => return Poll::Ready(Some(Ok(value))),
					Poll::Ready(None) if this.manager.is_closed() => continue,
					Poll::Ready(None) => {
						this.phase = Phase::Closed;
						return Poll::Ready(None);
					},
					Poll::Pending => return Poll::Pending,
				},
				Phase::Cancelling | Phase::Closed => return Poll::Ready(None),
			}
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		connection::memory::{self, MockNode},
		session::{Session, SessionOptions},
	};
	use futures::StreamExt;
	use serde_json::json;

	fn slot_request() -> SubscriptionRequest {
		SubscriptionRequest {
			subscribe: "slotSubscribe".to_string(),
			unsubscribe: "slotUnsubscribe".to_string(),
			notification: "slotNotification".to_string(),
			params: json!([]),
		}
	}

	fn start(options: SessionOptions) -> (Session, MockNode) {
		let (connection, node) = memory::pair();
		(Session::start(connection, options), node)
	}

	/// Open a slot subscription and confirm it with `id`.
	async fn confirmed(
		session: &Session,
		node: &mut MockNode,
		id: u64,
		cancel: &CancellationToken,
	) -> Subscription {
		let mut subscription = session.subscribe(slot_request(), cancel);
		assert_eq!(subscription.state(), SubscriptionState::Pending);
		let request = node.next_request().await.unwrap();
		assert_eq!(request.method, "slotSubscribe");
		node.respond(request.id, json!(id));
		// Any notification sent after the confirmation is routed, so poll once it is active.
		node.notify("slotNotification", &SubscriptionId::Number(id), json!({ "slot": 0 }));
		assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": 0 }))));
		assert_eq!(subscription.state(), SubscriptionState::Active);
		subscription
	}

	#[tokio::test]
	async fn delivers_notifications_in_wire_order() {
		let _ = env_logger::try_init();
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 7, &cancel).await;
		assert_eq!(subscription.id(), Some(&SubscriptionId::Number(7)));

		for slot in 1..=5 {
			node.notify("slotNotification", &SubscriptionId::Number(7), json!({ "slot": slot }));
		}
		for slot in 1..=5 {
			assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": slot }))));
		}
		assert_eq!(session.active_subscriptions(), 1);
	}

	#[tokio::test]
	async fn subscribe_failure_ends_the_stream_with_the_error() {
		let (session, mut node) = start(SessionOptions::default());
		let mut subscription = session.subscribe(slot_request(), &CancellationToken::new());

		let request = node.next_request().await.unwrap();
		node.respond_error(request.id, -32601, "Method not found");

		assert_eq!(
			subscription.next().await,
			Some(Err(RpcClientError::Protocol {
				code: -32601,
				message: "Method not found".to_string(),
				data: None,
			}))
		);
		assert_eq!(subscription.next().await, None);
		assert_eq!(subscription.state(), SubscriptionState::Closed);
		assert_eq!(session.active_subscriptions(), 0);
	}

	#[tokio::test]
	async fn close_sends_unsubscribe_and_stops_delivery() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 3, &cancel).await;

		subscription.close();
		subscription.close();
		assert_eq!(subscription.state(), SubscriptionState::Closed);

		let request = node.next_request().await.unwrap();
		assert_eq!(request.method, "slotUnsubscribe");
		assert_eq!(request.params, json!([3]));
		node.respond(request.id, json!(true));

		node.notify("slotNotification", &SubscriptionId::Number(3), json!({ "slot": 9 }));
		assert_eq!(subscription.next().await, None);
		assert_eq!(session.active_subscriptions(), 0);
	}

	#[tokio::test]
	async fn cancellation_ends_the_stream_and_unsubscribes() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 11, &cancel).await;

		node.notify("slotNotification", &SubscriptionId::Number(11), json!({ "slot": 1 }));
		cancel.cancel();
		assert_eq!(subscription.next().await, None);

		let request = node.next_request().await.unwrap();
		assert_eq!(request.method, "slotUnsubscribe");
		assert_eq!(request.params, json!([11]));
	}

	#[tokio::test]
	async fn cancelling_a_pending_subscription_abandons_the_subscribe_call() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut subscription = session.subscribe(slot_request(), &cancel);

		let request = node.next_request().await.unwrap();
		cancel.cancel();
		assert_eq!(subscription.next().await, None);
		assert_eq!(subscription.state(), SubscriptionState::Closed);
		while session.pending_calls() > 0 {
			tokio::task::yield_now().await;
		}

		// The node confirms anyway; the late response is dropped with the pending entry.
		node.respond(request.id, json!(4));
		node.notify("slotNotification", &SubscriptionId::Number(4), json!({ "slot": 1 }));
		assert_eq!(session.active_subscriptions(), 0);
	}

	#[tokio::test]
	async fn connection_loss_closes_subscriptions_with_an_error() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut first = confirmed(&session, &mut node, 1, &cancel).await;
		let mut second = confirmed(&session, &mut node, 2, &cancel).await;

		node.disconnect();

		assert_eq!(first.next().await, Some(Err(RpcClientError::TransportClosed)));
		assert_eq!(first.next().await, None);
		assert_eq!(second.next().await, Some(Err(RpcClientError::TransportClosed)));
		assert_eq!(second.next().await, None);
		assert_eq!(first.state(), SubscriptionState::Closed);

		// Subscribing on a dead session fails straight away.
		let mut late = session.subscribe(slot_request(), &cancel);
		assert_eq!(late.next().await, Some(Err(RpcClientError::TransportClosed)));
		assert_eq!(late.next().await, None);
	}

	#[tokio::test]
	async fn pause_reads_keeps_every_notification() {
		let options = SessionOptions { notification_buffer: 1, ..Default::default() };
		let (session, mut node) = start(options);
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 5, &cancel).await;

		for slot in 1..=4 {
			node.notify("slotNotification", &SubscriptionId::Number(5), json!({ "slot": slot }));
		}
		for slot in 1..=4 {
			assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": slot }))));
		}
	}

	#[tokio::test]
	async fn full_buffer_holds_back_frames_queued_behind_it() {
		let options = SessionOptions { notification_buffer: 1, ..Default::default() };
		let (session, mut node) = start(options);
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 5, &cancel).await;
		let wait = Duration::from_millis(100);

		let call = session.call("getSlot", json!([]), &cancel);
		tokio::pin!(call);
		assert!(tokio::time::timeout(wait, &mut call).await.is_err());
		let request = node.next_request().await.unwrap();
		node.notify("slotNotification", &SubscriptionId::Number(5), json!({ "slot": 1 }));
		node.notify("slotNotification", &SubscriptionId::Number(5), json!({ "slot": 2 }));
		node.respond(request.id, json!(100));

		// Slot 1 fills the buffer; the reader waits on slot 2 and never sees the response.
		assert!(tokio::time::timeout(wait, &mut call).await.is_err());
		assert_eq!(session.pending_calls(), 1);

		assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": 1 }))));
		assert_eq!(call.await, Ok(json!(100)));
		assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": 2 }))));
	}

	#[tokio::test]
	async fn drop_newest_discards_what_does_not_fit() {
		let options = SessionOptions {
			notification_buffer: 1,
			backpressure: BackpressurePolicy::DropNewest,
		};
		let (session, mut node) = start(options);
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 5, &cancel).await;

		// Frames are processed in order, so once the call is answered all three
		// notifications have been dispatched.
		let (result, ()) = tokio::join!(session.call("getSlot", json!([]), &cancel), async {
			let request = node.next_request().await.unwrap();
			for slot in 1..=3 {
				node.notify("slotNotification", &SubscriptionId::Number(5), json!({ "slot": slot }));
			}
			node.respond(request.id, json!(100));
		});
		assert_eq!(result, Ok(json!(100)));

		assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": 1 }))));
		node.notify("slotNotification", &SubscriptionId::Number(5), json!({ "slot": 4 }));
		assert_eq!(subscription.next().await, Some(Ok(json!({ "slot": 4 }))));
	}

	#[tokio::test]
	async fn notifications_with_unexpected_tags_are_ignored() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let mut subscription = confirmed(&session, &mut node, 8, &cancel).await;

		node.notify("accountNotification", &SubscriptionId::Number(8), json!("wrong tag"));
		node.notify("slotNotification", &SubscriptionId::Number(99), json!("unknown id"));
		node.notify("slotNotification", &SubscriptionId::Number(8), json!("ok"));

		assert_eq!(subscription.next().await, Some(Ok(json!("ok"))));
	}

	#[tokio::test]
	async fn string_subscription_ids_are_routed() {
		let (session, mut node) = start(SessionOptions::default());
		let mut subscription = session.subscribe(slot_request(), &CancellationToken::new());

		let request = node.next_request().await.unwrap();
		node.respond(request.id, json!("sub-a"));
		node.notify("slotNotification", &SubscriptionId::Str("sub-a".to_string()), json!(1));

		assert_eq!(subscription.next().await, Some(Ok(json!(1))));
		assert_eq!(subscription.id(), Some(&SubscriptionId::Str("sub-a".to_string())));
	}

	#[tokio::test]
	async fn dropping_the_stream_unsubscribes() {
		let (session, mut node) = start(SessionOptions::default());
		let cancel = CancellationToken::new();
		let subscription = confirmed(&session, &mut node, 6, &cancel).await;

		drop(subscription);

		let request = node.next_request().await.unwrap();
		assert_eq!(request.method, "slotUnsubscribe");
		assert_eq!(request.params, json!([6]));
		assert_eq!(session.active_subscriptions(), 0);
	}
}
