// SPDX-License-Identifier: GPL-3.0

//! In-memory duplex connection.
//!
//! [`pair`] returns a client-side [`DuplexConnection`] together with the [`MockNode`]
//! holding the other end. The node side sees every frame the client writes and can
//! push arbitrary frames back, which makes correlation and subscription behaviour
//! reproducible without a network.
//!
//! # Example
//!
//! ```ignore
//! let (connection, mut node) = memory::pair();
//! let session = Session::start(connection, SessionOptions::default());
//!
//! let call = session.call("getSlot", json!([]), &CancellationToken::new());
//! let request = node.next_request().await.unwrap();
//! node.respond(request.id, json!(42));
//! ```

use super::{DuplexConnection, FrameSink};
use crate::{
	error::RpcClientError,
	frame::{ErrorObject, RequestId, SubscriptionId},
	strings::rpc::{JSONRPC_VERSION, fields},
};
use async_trait::async_trait;
use futures::{
	StreamExt,
	channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
};
use serde::Deserialize;
use serde_json::{Map, Value};

type FrameSender = UnboundedSender<Result<String, RpcClientError>>;

/// Create a connected client/node pair.
pub fn pair() -> (DuplexConnection, MockNode) {
	let (request_tx, request_rx) = unbounded();
	let (frame_tx, frame_rx) = unbounded();
	let connection = DuplexConnection {
		sink: Box::new(MemorySink { requests: request_tx }),
		stream: frame_rx.boxed(),
	};
	(connection, MockNode { requests: request_rx, frames: Some(frame_tx) })
}

struct MemorySink {
	requests: UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for MemorySink {
	async fn send(&self, frame: String) -> Result<(), RpcClientError> {
		self.requests.unbounded_send(frame).map_err(|_| RpcClientError::TransportClosed)
	}

	async fn close(&self) {
		self.requests.close_channel();
	}
}

/// A call frame observed by the [`MockNode`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceivedRequest {
	/// Id assigned by the client.
	pub id: RequestId,
	/// Method name.
	pub method: String,
	/// Call parameters.
	#[serde(default)]
	pub params: Value,
}

/// Node side of an in-memory connection.
pub struct MockNode {
	requests: UnboundedReceiver<String>,
	frames: Option<FrameSender>,
}

impl MockNode {
	/// Wait for the next raw frame written by the client.
	///
	/// Returns `None` once the client closed its write half.
	pub async fn next_frame(&mut self) -> Option<Value> {
		let frame = self.requests.next().await?;
		match serde_json::from_str(&frame) {
			Ok(value) => Some(value),
			Err(e) => {
				log::warn!("Client wrote invalid JSON: {e}");
				Some(Value::String(frame))
			},
		}
	}

	/// Wait for the next single call frame.
	///
	/// Returns `None` once the client closed its write half or if the next frame is not
	/// a single call.
	pub async fn next_request(&mut self) -> Option<ReceivedRequest> {
		let frame = self.next_frame().await?;
		serde_json::from_value(frame).ok()
	}

	/// Wait for the next batch frame.
	pub async fn next_batch(&mut self) -> Option<Vec<ReceivedRequest>> {
		let frame = self.next_frame().await?;
		serde_json::from_value(frame).ok()
	}

	/// Answer call `id` with `result`.
	pub fn respond(&self, id: RequestId, result: Value) {
		self.push(envelope([(fields::ID, Value::from(id)), (fields::RESULT, result)]));
	}

	/// Answer call `id` with an error object.
	pub fn respond_error(&self, id: RequestId, code: i64, message: &str) {
		let error = ErrorObject { code, message: message.to_string(), data: None };
		let error = serde_json::to_value(error).unwrap_or(Value::Null);
		self.push(envelope([(fields::ID, Value::from(id)), (fields::ERROR, error)]));
	}

	/// Push a notification for `subscription`.
	pub fn notify(&self, method: &str, subscription: &SubscriptionId, result: Value) {
		let subscription = serde_json::to_value(subscription).unwrap_or(Value::Null);
		let params = Map::from_iter([
			(fields::SUBSCRIPTION.to_string(), subscription),
			(fields::RESULT.to_string(), result),
		]);
		self.push(envelope([
			(fields::METHOD, Value::from(method)),
			(fields::PARAMS, Value::Object(params)),
		]));
	}

	/// Push an arbitrary JSON frame.
	pub fn push(&self, frame: Value) {
		self.push_raw(frame.to_string());
	}

	/// Push an arbitrary text frame, valid JSON or not.
	pub fn push_raw(&self, frame: impl Into<String>) {
		self.send(Ok(frame.into()));
	}

	/// Fail the connection with a transport error.
	pub fn fail(&self, message: &str) {
		self.send(Err(RpcClientError::Transport(message.to_string())));
	}

	/// Drop the node's write half; the client sees the connection end.
	pub fn disconnect(&mut self) {
		self.frames = None;
	}

	fn send(&self, frame: Result<String, RpcClientError>) {
		if let Some(frames) = &self.frames &&
			frames.unbounded_send(frame).is_err()
		{
			log::trace!("Client side of the in-memory connection is gone");
		}
	}
}

fn envelope<const N: usize>(entries: [(&str, Value); N]) -> Value {
	let mut object = Map::new();
	object.insert(fields::JSONRPC.to_string(), Value::from(JSONRPC_VERSION));
	for (key, value) in entries {
		object.insert(key.to_string(), value);
	}
	Value::Object(object)
}
