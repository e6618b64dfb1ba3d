// SPDX-License-Identifier: GPL-3.0

//! Typed call surface.
//!
//! [`Rpc`] combines a transport with a [`MethodRegistry`] and a default commitment.
//! Arbitrary methods go through [`Rpc::request`]; the methods the resolution layer
//! relies on have typed helpers.
//!
//! # Example
//!
//! ```ignore
//! let rpc = Rpc::from_config(&ClientConfig::new("ws://127.0.0.1:8900")?)?;
//! let slot: u64 = rpc.request("getSlot", json!([])).send().await?;
//!
//! let mut slots = rpc.slot_notifications(&CancellationToken::new()).await?;
//! while let Some(update) = slots.next().await {
//!     println!("{:?}", update?);
//! }
//! ```

use crate::{
	config::ClientConfig,
	error::RpcClientError,
	registry::{MethodRegistry, Transform},
	strings::rpc::{methods, subscriptions},
	subscription::{Subscription, SubscriptionState},
	transport::{BatchResults, RpcTransport, connect},
	types::{AccountInfoConfig, BlockConfig, Commitment, RpcResponse, TransactionConfig},
};
use futures::{Stream, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{
	fmt,
	marker::PhantomData,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};
use tokio_util::sync::CancellationToken;

/// Client for a node.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Rpc {
	transport: Arc<dyn RpcTransport>,
	registry: Arc<MethodRegistry>,
	commitment: Commitment,
}

impl fmt::Debug for Rpc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Rpc")
			.field("registry", &self.registry)
			.field("commitment", &self.commitment)
			.finish_non_exhaustive()
	}
}

impl Rpc {
	/// Create a client over `transport` with an empty registry.
	pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
		Self { transport, registry: Arc::new(MethodRegistry::new()), commitment: Commitment::default() }
	}

	/// Create a client for the endpoint and commitment in `config`.
	pub fn from_config(config: &ClientConfig) -> Result<Self, RpcClientError> {
		Ok(Self::new(connect(config)?).with_commitment(config.commitment))
	}

	/// Use `registry` for parameter and response transforms.
	pub fn with_registry(mut self, registry: MethodRegistry) -> Self {
		self.registry = Arc::new(registry);
		self
	}

	/// Use `commitment` wherever a request does not set one.
	pub fn with_commitment(mut self, commitment: Commitment) -> Self {
		self.commitment = commitment;
		self
	}

	/// Get the underlying transport.
	pub fn transport(&self) -> &Arc<dyn RpcTransport> {
		&self.transport
	}

	/// Get the default commitment.
	pub fn commitment(&self) -> Commitment {
		self.commitment
	}

	/// Prepare a call to `method`.
	pub fn request(&self, method: &str, params: Value) -> RpcRequest<'_> {
		RpcRequest { rpc: self, method: method.to_string(), params }
	}

	/// Issue several calls in one exchange, with registry transforms applied.
	pub async fn batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<BatchResults, RpcClientError> {
		let methods: Vec<String> = calls.iter().map(|(method, _)| method.clone()).collect();
		let calls = calls
			.into_iter()
			.map(|(method, params)| {
				let params = self.registry.transform_params(&method, params);
				(method, params)
			})
			.collect();
		let results = self.transport.call_batch(calls, cancel).await?;
		Ok(results
			.into_iter()
			.zip(methods)
			.map(|(result, method)| {
				result.map(|value| self.registry.transform_response(&method, value))
			})
			.collect())
	}

	/// Open the subscription registered as `notification_name`, decoding each
	/// notification as `T`.
	pub async fn subscribe<T: DeserializeOwned>(
		&self,
		notification_name: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Notifications<T>, RpcClientError> {
		let request = self.registry.subscription(notification_name, params);
		let transform = self.registry.response_transform(&request.notification);
		let subscription = self.transport.subscribe(request, cancel).await?;
		Ok(Notifications::new(subscription, transform))
	}

	/// Fetch one account.
	///
	/// The value is `None` if the account does not exist.
	pub async fn get_account_info(
		&self,
		address: &str,
		config: AccountInfoConfig,
	) -> Result<RpcResponse<Option<Value>>, RpcClientError> {
		let config = config.normalized(self.commitment);
		self.request(methods::GET_ACCOUNT_INFO, params(address, &config)?).send().await
	}

	/// Fetch several accounts in one call, in the order of `addresses`.
	pub async fn get_multiple_accounts(
		&self,
		addresses: &[String],
		config: AccountInfoConfig,
	) -> Result<RpcResponse<Vec<Option<Value>>>, RpcClientError> {
		let config = config.normalized(self.commitment);
		self.request(methods::GET_MULTIPLE_ACCOUNTS, params(addresses, &config)?)
			.send()
			.await
	}

	/// Fetch a confirmed transaction, `None` if the node does not know it.
	pub async fn get_transaction(
		&self,
		signature: &str,
		config: TransactionConfig,
	) -> Result<Option<Value>, RpcClientError> {
		let config = config.normalized(self.commitment);
		self.request(methods::GET_TRANSACTION, params(signature, &config)?).send().await
	}

	/// Fetch a block, `None` if the slot was skipped or is unavailable.
	pub async fn get_block(&self, slot: u64, config: BlockConfig) -> Result<Option<Value>, RpcClientError> {
		let config = config.normalized(self.commitment);
		self.request(methods::GET_BLOCK, params(slot, &config)?).send().await
	}

	/// Fetch the current slot at the default commitment.
	pub async fn get_slot(&self) -> Result<u64, RpcClientError> {
		let config = commitment_config(self.commitment);
		self.request(methods::GET_SLOT, Value::Array(vec![config])).send().await
	}

	/// Subscribe to changes of one account.
	pub async fn account_notifications(
		&self,
		address: &str,
		config: AccountInfoConfig,
		cancel: &CancellationToken,
	) -> Result<Notifications<RpcResponse<Value>>, RpcClientError> {
		let config = config.normalized(self.commitment);
		self.subscribe(subscriptions::ACCOUNT_NOTIFICATIONS, params(address, &config)?, cancel)
			.await
	}

	/// Subscribe to slot updates.
	pub async fn slot_notifications(
		&self,
		cancel: &CancellationToken,
	) -> Result<Notifications<Value>, RpcClientError> {
		self.subscribe(subscriptions::SLOT_NOTIFICATIONS, Value::Array(vec![]), cancel).await
	}

	/// Subscribe to the status of one transaction signature.
	///
	/// The node sends a single notification and then drops the subscription itself.
	pub async fn signature_notifications(
		&self,
		signature: &str,
		cancel: &CancellationToken,
	) -> Result<Notifications<RpcResponse<Value>>, RpcClientError> {
		let config = commitment_config(self.commitment);
		let params = Value::Array(vec![Value::from(signature), config]);
		self.subscribe(subscriptions::SIGNATURE_NOTIFICATIONS, params, cancel).await
	}

	/// Subscribe to transaction logs matching `filter` (`"all"`, or `{ "mentions": [..] }`).
	pub async fn logs_notifications(
		&self,
		filter: Value,
		cancel: &CancellationToken,
	) -> Result<Notifications<RpcResponse<Value>>, RpcClientError> {
		let params = Value::Array(vec![filter, commitment_config(self.commitment)]);
		self.subscribe(subscriptions::LOGS_NOTIFICATIONS, params, cancel).await
	}
}

/// Positional parameters `[subject, config]`.
fn params(subject: impl Serialize, config: &impl Serialize) -> Result<Value, RpcClientError> {
	Ok(Value::Array(vec![serde_json::to_value(subject)?, serde_json::to_value(config)?]))
}

fn commitment_config(commitment: Commitment) -> Value {
	let mut config = Map::new();
	config.insert(
		"commitment".to_string(),
		serde_json::to_value(commitment).unwrap_or(Value::Null),
	);
	Value::Object(config)
}

/// A prepared call.
#[must_use = "a request does nothing until sent"]
pub struct RpcRequest<'a> {
	rpc: &'a Rpc,
	method: String,
	params: Value,
}

impl RpcRequest<'_> {
	/// Send the call and decode the result as `T`.
	pub async fn send<T: DeserializeOwned>(self) -> Result<T, RpcClientError> {
		self.send_with(&CancellationToken::new()).await
	}

	/// Send the call, giving up with [`RpcClientError::Cancelled`] once `cancel` fires.
	pub async fn send_with<T: DeserializeOwned>(
		self,
		cancel: &CancellationToken,
	) -> Result<T, RpcClientError> {
		let registry = &self.rpc.registry;
		let params = registry.transform_params(&self.method, self.params);
		let value = self.rpc.transport.call(&self.method, params, cancel).await?;
		let value = registry.transform_response(&self.method, value);
		Ok(serde_json::from_value(value)?)
	}
}

/// Stream of decoded notifications.
///
/// Payloads pass through the response transform registered for the notification tag
/// before they are decoded. A notification that fails to decode yields an `Err` and the
/// stream continues.
pub struct Notifications<T> {
	subscription: Subscription,
	transform: Option<Transform>,
	_marker: PhantomData<fn() -> T>,
}

impl<T> Notifications<T> {
	fn new(subscription: Subscription, transform: Option<Transform>) -> Self {
		Self { subscription, transform, _marker: PhantomData }
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SubscriptionState {
		self.subscription.state()
	}

	/// Close the subscription. See [`Subscription::close`].
	pub fn close(&mut self) {
		self.subscription.close();
	}

	/// Get the undecoded subscription.
	pub fn into_inner(self) -> Subscription {
		self.subscription
	}
}

impl<T: DeserializeOwned> Stream for Notifications<T> {
	type Item = Result<T, RpcClientError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		let transform = this.transform.as_ref();
		this.subscription.poll_next_unpin(cx).map(|item| {
			item.map(|notification| {
				notification.and_then(|value| {
					let value = match transform {
						Some(transform) => transform(value),
						None => value,
					};
					Ok(serde_json::from_value(value)?)
				})
			})
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		connection::{Connector, DuplexConnection, memory},
		frame::SubscriptionId,
		session::SessionOptions,
		testing::MockTransport,
		transport::DuplexTransport,
	};
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::Mutex as StdMutex;

	/// Hands out one in-memory connection.
	struct Single(StdMutex<Option<DuplexConnection>>);

	#[async_trait]
	impl Connector for Single {
		async fn connect(&self) -> Result<DuplexConnection, RpcClientError> {
			self.0.lock().unwrap().take().ok_or(RpcClientError::TransportClosed)
		}
	}

	#[tokio::test]
	async fn request_applies_registry_transforms() {
		let transport = Arc::new(MockTransport::new().with_handler("getBalance", |params| {
			Ok(json!({ "context": { "slot": 1 }, "value": params[0].as_str().map(str::len) }))
		}));
		let registry = MethodRegistry::new()
			.with_params_transform("getBalance", |params| json!([params]))
			.with_response_transform("getBalance", |response| response["value"].clone());
		let rpc = Rpc::new(transport.clone()).with_registry(registry);

		let balance: u64 = rpc.request("getBalance", json!("abcd")).send().await.unwrap();

		assert_eq!(balance, 4);
		assert_eq!(transport.calls(), vec![("getBalance".to_string(), json!(["abcd"]))]);
	}

	#[tokio::test]
	async fn notifications_apply_registry_transforms() {
		let (connection, mut node) = memory::pair();
		let connector = Single(StdMutex::new(Some(connection)));
		let transport = Arc::new(DuplexTransport::new(connector, SessionOptions::default()));
		let registry = MethodRegistry::new()
			.with_response_transform("slotNotification", |update| update["slot"].clone());
		let rpc = Rpc::new(transport).with_registry(registry);
		let cancel = CancellationToken::new();

		let mut slots = rpc.slot_notifications(&cancel).await.unwrap();
		let subscribe = node.next_request().await.unwrap();
		node.respond(subscribe.id, json!(2));
		node.notify("slotNotification", &SubscriptionId::Number(2), json!({ "slot": 9, "root": 0 }));

		assert_eq!(slots.next().await, Some(Ok(json!(9))));
	}

	#[tokio::test]
	async fn typed_helpers_fill_in_default_commitment() {
		let transport = Arc::new(
			MockTransport::new()
				.with_handler("getSlot", |_| Ok(json!(17)))
				.with_handler("getTransaction", |_| Ok(Value::Null)),
		);
		let rpc = Rpc::new(transport.clone()).with_commitment(Commitment::Finalized);

		assert_eq!(rpc.get_slot().await, Ok(17));
		assert_eq!(rpc.get_transaction("sig", TransactionConfig::default()).await, Ok(None));

		let calls = transport.calls();
		assert_eq!(calls[0].1, json!([{ "commitment": "finalized" }]));
		assert_eq!(
			calls[1].1,
			json!([
				"sig",
				{ "commitment": "finalized", "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
			])
		);
	}

	#[tokio::test]
	async fn decode_failures_are_serialization_errors() {
		let transport = Arc::new(MockTransport::new().with_handler("getSlot", |_| Ok(json!("x"))));
		let rpc = Rpc::new(transport);
		assert!(matches!(rpc.get_slot().await, Err(RpcClientError::Serialization(_))));
	}

	#[tokio::test]
	async fn batch_keeps_order_and_transforms_each_entry() {
		let transport = Arc::new(
			MockTransport::new()
				.with_handler("getBalance", |params| Ok(params[0].clone()))
				.with_handler("getSlot", |_| {
					Err(RpcClientError::Protocol { code: -1, message: "no".to_string(), data: None })
				}),
		);
		let registry =
			MethodRegistry::new().with_response_transform("getBalance", |v| json!({ "wrapped": v }));
		let rpc = Rpc::new(transport.clone()).with_registry(registry);

		let results = rpc
			.batch(
				vec![
					("getBalance".to_string(), json!(["a"])),
					("getSlot".to_string(), json!([])),
				],
				&CancellationToken::new(),
			)
			.await
			.unwrap();

		assert_eq!(results[0], Ok(json!({ "wrapped": "a" })));
		assert!(matches!(results[1], Err(RpcClientError::Protocol { code: -1, .. })));
		assert_eq!(transport.batches(), 1);
	}

	#[tokio::test]
	async fn subscribe_surfaces_transport_refusal() {
		let rpc = Rpc::new(Arc::new(MockTransport::new()));
		let result = rpc.slot_notifications(&CancellationToken::new()).await;
		assert!(matches!(result, Err(RpcClientError::UnsupportedOperation("subscribe"))));
	}
}
