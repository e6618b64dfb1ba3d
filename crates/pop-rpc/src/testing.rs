// SPDX-License-Identifier: GPL-3.0

//! Shared testing utilities for pop-rpc tests.

use crate::{
	error::RpcClientError,
	subscription::{Subscription, SubscriptionRequest},
	transport::{BatchResults, RpcTransport},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
use tokio_util::sync::CancellationToken;

type Handler = Arc<dyn Fn(&Value) -> Result<Value, RpcClientError> + Send + Sync>;

/// Transport answering calls from per-method handlers and recording what it was asked.
#[derive(Default)]
pub(crate) struct MockTransport {
	handlers: HashMap<String, Handler>,
	latency: Option<Duration>,
	calls: Mutex<Vec<(String, Value)>>,
	single_calls: AtomicUsize,
	batches: AtomicUsize,
}

impl MockTransport {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Answer `method` with `handler`; unknown methods fail with "Method not found".
	pub(crate) fn with_handler(
		mut self,
		method: &str,
		handler: impl Fn(&Value) -> Result<Value, RpcClientError> + Send + Sync + 'static,
	) -> Self {
		self.handlers.insert(method.to_string(), Arc::new(handler));
		self
	}

	/// Delay every exchange, so concurrent callers overlap.
	pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Every call seen so far, batch entries included.
	pub(crate) fn calls(&self) -> Vec<(String, Value)> {
		self.calls.lock().unwrap().clone()
	}

	/// Number of calls to `method`, batch entries included.
	pub(crate) fn calls_to(&self, method: &str) -> usize {
		self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
	}

	/// Number of single-call exchanges.
	pub(crate) fn single_calls(&self) -> usize {
		self.single_calls.load(Ordering::SeqCst)
	}

	/// Number of batch exchanges.
	pub(crate) fn batches(&self) -> usize {
		self.batches.load(Ordering::SeqCst)
	}

	fn answer(&self, method: &str, params: &Value) -> Result<Value, RpcClientError> {
		self.calls.lock().unwrap().push((method.to_string(), params.clone()));
		match self.handlers.get(method) {
			Some(handler) => handler(params),
			None => Err(RpcClientError::Protocol {
				code: -32601,
				message: "Method not found".to_string(),
				data: None,
			}),
		}
	}

	async fn delay(&self, cancel: &CancellationToken) -> Result<(), RpcClientError> {
		if let Some(latency) = self.latency {
			tokio::select! {
				_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
				_ = tokio::time::sleep(latency) => {},
			}
		}
		Ok(())
	}
}

#[async_trait]
impl RpcTransport for MockTransport {
	async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError> {
		self.single_calls.fetch_add(1, Ordering::SeqCst);
		let result = self.answer(method, &params);
		self.delay(cancel).await?;
		result
	}

	async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<BatchResults, RpcClientError> {
		self.batches.fetch_add(1, Ordering::SeqCst);
		let results = calls.iter().map(|(method, params)| self.answer(method, params)).collect();
		self.delay(cancel).await?;
		Ok(results)
	}

	async fn subscribe(
		&self,
		_request: SubscriptionRequest,
		_cancel: &CancellationToken,
	) -> Result<Subscription, RpcClientError> {
		Err(RpcClientError::UnsupportedOperation("subscribe"))
	}
}
