// SPDX-License-Identifier: GPL-3.0

//! Uniform call and subscribe surface over any transport.
//!
//! | Transport           | Connection policy                         | Subscriptions |
//! |---------------------|-------------------------------------------|---------------|
//! | [`HttpTransport`]   | one HTTP exchange per call or batch       | unsupported   |
//! | [`DuplexTransport`] | one shared session, opened on first use   | supported     |
//!
//! A [`DuplexTransport`] whose session died opens a fresh one on the next use. Calls and
//! subscriptions made on the dead session have already failed with
//! [`RpcClientError::TransportClosed`]; nothing is replayed.

use crate::{
	config::ClientConfig,
	connection::{Connector, ws::WsConnector},
	error::RpcClientError,
	frame::{Inbound, Request, RequestId, Response},
	session::{Session, SessionOptions},
	strings::rpc::{CONTENT_TYPE_JSON, operations, schemes},
	subscription::{Subscription, SubscriptionRequest},
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Results of a batch call, in request order.
pub type BatchResults = Vec<Result<Value, RpcClientError>>;

/// Sends calls and opens subscriptions against a node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
	/// Issue a single call.
	async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError>;

	/// Issue several calls in one exchange.
	///
	/// Per-entry errors do not fail sibling entries.
	async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<BatchResults, RpcClientError>;

	/// Open a subscription.
	///
	/// Fails with [`RpcClientError::UnsupportedOperation`] on one-shot transports.
	async fn subscribe(
		&self,
		request: SubscriptionRequest,
		cancel: &CancellationToken,
	) -> Result<Subscription, RpcClientError>;
}

/// Create the transport matching the endpoint scheme of `config`.
///
/// # Arguments
/// * `config` - Client configuration; `http(s)` endpoints get an [`HttpTransport`],
///   `ws(s)` endpoints a WebSocket [`DuplexTransport`]
pub fn connect(config: &ClientConfig) -> Result<Arc<dyn RpcTransport>, RpcClientError> {
	let endpoint = config.endpoint.clone();
	match endpoint.scheme() {
		schemes::HTTP | schemes::HTTPS => Ok(Arc::new(HttpTransport::new(endpoint))),
		schemes::WS | schemes::WSS =>
			Ok(Arc::new(DuplexTransport::websocket(endpoint, SessionOptions::from(config)))),
		other => Err(RpcClientError::InvalidEndpoint(other.to_string())),
	}
}

/// One HTTP exchange per call.
///
/// Nothing is kept open between calls beyond the connection pool of the HTTP client,
/// so a failed exchange never affects the next one.
pub struct HttpTransport {
	client: reqwest::Client,
	endpoint: Url,
	next_id: AtomicU64,
}

impl HttpTransport {
	/// Create a transport posting to `endpoint`.
	pub fn new(endpoint: Url) -> Self {
		Self::with_client(reqwest::Client::new(), endpoint)
	}

	/// Create a transport using an existing HTTP client.
	pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
		Self { client, endpoint, next_id: AtomicU64::new(1) }
	}

	/// Get the endpoint URL.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn exchange(&self, body: String, cancel: &CancellationToken) -> Result<Inbound, RpcClientError> {
		let request = self
			.client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, CONTENT_TYPE_JSON)
			.body(body)
			.send();
		let response = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			response = request => response.map_err(|e| self.request_error(e))?,
		};
		let status = response.status();
		let text = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			text = response.text() => text.map_err(|e| RpcClientError::Transport(e.to_string()))?,
		};
		match Inbound::parse(&text) {
			Ok(inbound) => Ok(inbound),
			// Nodes may answer with an error object and a non-success status; the error
			// object wins. Anything else on a failed status is reported as the status.
			Err(_) if !status.is_success() =>
				Err(RpcClientError::Transport(format!("HTTP {status}: {text}"))),
			Err(e) => Err(e),
		}
	}

	fn request_error(&self, error: reqwest::Error) -> RpcClientError {
		if error.is_connect() {
			RpcClientError::ConnectionFailed {
				endpoint: self.endpoint.to_string(),
				message: error.to_string(),
			}
		} else {
			RpcClientError::Transport(error.to_string())
		}
	}
}

#[async_trait]
impl RpcTransport for HttpTransport {
	async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let body = serde_json::to_string(&Request::new(id, method, &params))?;
		log::debug!("POST `{method}` (id {id}) to {}", self.endpoint);
		match self.exchange(body, cancel).await? {
			Inbound::Response(response) if response.id == id =>
				response.outcome.map_err(RpcClientError::from),
			// One exchange, one caller: an error without an id can only be ours.
			Inbound::Rejected(error) => Err(error.into()),
			_ => Err(RpcClientError::Malformed(format!("no response to request {id}"))),
		}
	}

	async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<BatchResults, RpcClientError> {
		if calls.is_empty() {
			return Ok(vec![]);
		}
		let ids: Vec<RequestId> =
			calls.iter().map(|_| self.next_id.fetch_add(1, Ordering::Relaxed)).collect();
		let requests: Vec<Request<'_>> = ids
			.iter()
			.zip(calls.iter())
			.map(|(id, (method, params))| Request::new(*id, method, params))
			.collect();
		let body = serde_json::to_string(&requests)?;
		log::debug!("POST batch of {} calls to {}", calls.len(), self.endpoint);

		let responses = match self.exchange(body, cancel).await? {
			Inbound::Batch(responses) => responses,
			// A single response to a batch is the node rejecting the batch as a whole.
			Inbound::Response(Response { outcome: Err(error), .. }) | Inbound::Rejected(error) =>
				return Err(error.into()),
			_ => return Err(RpcClientError::Malformed("expected a batch response".to_string())),
		};
		let mut by_id: HashMap<RequestId, Result<Value, RpcClientError>> = responses
			.into_iter()
			.map(|response| (response.id, response.outcome.map_err(RpcClientError::from)))
			.collect();
		Ok(ids
			.into_iter()
			.map(|id| {
				by_id.remove(&id).unwrap_or_else(|| {
					Err(RpcClientError::Malformed(format!("response {id} missing from batch")))
				})
			})
			.collect())
	}

	async fn subscribe(
		&self,
		_request: SubscriptionRequest,
		_cancel: &CancellationToken,
	) -> Result<Subscription, RpcClientError> {
		Err(RpcClientError::UnsupportedOperation(operations::SUBSCRIBE))
	}
}

/// A persistent duplex connection, established lazily.
pub struct DuplexTransport {
	connector: Box<dyn Connector>,
	options: SessionOptions,
	session: Mutex<Option<Arc<Session>>>,
}

impl DuplexTransport {
	/// Create a transport dialing through `connector`.
	pub fn new(connector: impl Connector + 'static, options: SessionOptions) -> Self {
		Self { connector: Box::new(connector), options, session: Mutex::new(None) }
	}

	/// Create a WebSocket transport for `endpoint`.
	pub fn websocket(endpoint: Url, options: SessionOptions) -> Self {
		Self::new(WsConnector::new(endpoint), options)
	}

	/// Get the live session, connecting first if there is none.
	pub async fn session(&self, cancel: &CancellationToken) -> Result<Arc<Session>, RpcClientError> {
		let mut current = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			current = self.session.lock() => current,
		};
		if let Some(session) = current.as_ref() &&
			!session.is_closed()
		{
			return Ok(session.clone());
		}
		if current.take().is_some() {
			log::debug!("Previous session ended; reconnecting");
		}
		let connection = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(RpcClientError::Cancelled),
			connection = self.connector.connect() => connection?,
		};
		let session = Arc::new(Session::start(connection, self.options));
		*current = Some(session.clone());
		Ok(session)
	}

	/// Close the current session, if any.
	pub async fn close(&self) {
		if let Some(session) = self.session.lock().await.take() {
			session.close().await;
		}
	}

	/// Number of calls awaiting a response on the current session.
	pub async fn pending_calls(&self) -> usize {
		self.session.lock().await.as_ref().map_or(0, |session| session.pending_calls())
	}

	/// Number of confirmed, open subscriptions on the current session.
	pub async fn active_subscriptions(&self) -> usize {
		self.session.lock().await.as_ref().map_or(0, |session| session.active_subscriptions())
	}
}

#[async_trait]
impl RpcTransport for DuplexTransport {
	async fn call(
		&self,
		method: &str,
		params: Value,
		cancel: &CancellationToken,
	) -> Result<Value, RpcClientError> {
		self.session(cancel).await?.call(method, params, cancel).await
	}

	async fn call_batch(
		&self,
		calls: Vec<(String, Value)>,
		cancel: &CancellationToken,
	) -> Result<BatchResults, RpcClientError> {
		self.session(cancel).await?.call_batch(calls, cancel).await
	}

	async fn subscribe(
		&self,
		request: SubscriptionRequest,
		cancel: &CancellationToken,
	) -> Result<Subscription, RpcClientError> {
		Ok(self.session(cancel).await?.subscribe(request, cancel))
	}
}
