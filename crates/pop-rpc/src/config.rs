// SPDX-License-Identifier: GPL-3.0

//! Client configuration.

use crate::{
	error::RpcClientError,
	strings::rpc::DEFAULT_ENDPOINT,
	subscription::BackpressurePolicy,
	types::Commitment,
};
use serde::Deserialize;
use url::Url;

/// Default number of notifications buffered per subscription.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = crate::session::DEFAULT_NOTIFICATION_BUFFER;

/// Default ceiling on the number of keys carried by one coalesced batch call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Configuration for connecting to a node.
///
/// The endpoint scheme selects the transport: `http(s)` for one-shot exchanges,
/// `ws(s)` for a persistent connection that also supports subscriptions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	/// Node endpoint.
	pub endpoint: Url,
	/// Notifications buffered per subscription before backpressure applies.
	pub notification_buffer: usize,
	/// What to do when a subscription buffer is full.
	pub backpressure: BackpressurePolicy,
	/// Maximum number of keys carried by one coalesced batch call.
	pub max_batch_size: usize,
	/// Commitment used when a request does not set one.
	pub commitment: Commitment,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
			notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
			backpressure: BackpressurePolicy::default(),
			max_batch_size: DEFAULT_MAX_BATCH_SIZE,
			commitment: Commitment::default(),
		}
	}
}

impl ClientConfig {
	/// Create a configuration for `endpoint` with default settings.
	pub fn new(endpoint: &str) -> Result<Self, RpcClientError> {
		let endpoint = Url::parse(endpoint)
			.map_err(|e| RpcClientError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
		Ok(Self { endpoint, ..Default::default() })
	}

	/// Set the number of notifications buffered per subscription.
	pub fn with_notification_buffer(mut self, buffer: usize) -> Self {
		self.notification_buffer = buffer;
		self
	}

	/// Set the backpressure policy.
	pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
		self.backpressure = policy;
		self
	}

	/// Set the ceiling on coalesced batch calls.
	pub fn with_max_batch_size(mut self, size: usize) -> Self {
		self.max_batch_size = size.max(1);
		self
	}

	/// Set the default commitment.
	pub fn with_commitment(mut self, commitment: Commitment) -> Self {
		self.commitment = commitment;
		self
	}
}
