// SPDX-License-Identifier: GPL-3.0

//! JSON-RPC 2.0 wire frames.
//!
//! Only the routing fields of a frame are interpreted here: the request id, the
//! notification method tag and the server-assigned subscription id. Results and
//! notification payloads are carried through as opaque [`Value`]s.

use crate::{
	error::RpcClientError,
	strings::rpc::{JSONRPC_VERSION, fields},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a call, unique for the lifetime of one connection.
pub type RequestId = u64;

/// Subscription identifier assigned by the node.
///
/// Nodes differ in how they encode it, so both numeric and string ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionId {
	/// Numeric subscription id.
	Number(u64),
	/// String subscription id.
	Str(String),
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SubscriptionId::Number(id) => write!(f, "{id}"),
			SubscriptionId::Str(id) => f.write_str(id),
		}
	}
}

/// Outgoing call frame.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
	jsonrpc: &'static str,
	id: RequestId,
	method: &'a str,
	params: &'a Value,
}

impl<'a> Request<'a> {
	/// Create a call frame for `method` with the given id and parameters.
	pub fn new(id: RequestId, method: &'a str, params: &'a Value) -> Self {
		Self { jsonrpc: JSONRPC_VERSION, id, method, params }
	}
}

/// JSON-RPC error object returned by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
	/// Numeric error code.
	pub code: i64,
	/// Error message.
	pub message: String,
	/// Optional structured error data.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Response to a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Id of the call this response answers.
	pub id: RequestId,
	/// Either the call result or the error object returned by the node.
	pub outcome: Result<Value, ErrorObject>,
}

/// Push message produced by an active subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	/// Method tag of the notification, e.g. `accountNotification`.
	pub method: String,
	/// Server-assigned id of the subscription this notification belongs to.
	pub subscription: SubscriptionId,
	/// Notification payload.
	pub result: Value,
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
	/// Response to a single call.
	Response(Response),
	/// Responses to a batch of calls, in whatever order the node sent them.
	Batch(Vec<Response>),
	/// Subscription notification.
	Notification(Notification),
	/// Error object without a request id, sent when the node rejects a request or batch
	/// it could not attribute to an id.
	Rejected(ErrorObject),
}

impl Inbound {
	/// Parse and classify a text frame.
	///
	/// Frames that cannot be routed yield [`RpcClientError::Malformed`]. In a batch, entries
	/// that cannot be routed are skipped; the correlator fails their callers.
	pub fn parse(text: &str) -> Result<Self, RpcClientError> {
		let value: Value = serde_json::from_str(text)
			.map_err(|e| RpcClientError::Malformed(format!("invalid JSON: {e}")))?;
		match value {
			Value::Array(entries) => {
				let responses = entries
					.into_iter()
					.filter_map(|entry| match parse_object(entry) {
						Ok(Inbound::Response(response)) => Some(response),
						Ok(_) => {
							log::warn!("Dropping non-response entry in batch frame");
							None
						},
						Err(e) => {
							log::warn!("Dropping batch entry: {e}");
							None
						},
					})
					.collect();
				Ok(Inbound::Batch(responses))
			},
			other => parse_object(other),
		}
	}
}

fn parse_object(value: Value) -> Result<Inbound, RpcClientError> {
	let Value::Object(mut object) = value else {
		return Err(RpcClientError::Malformed("expected a JSON object".to_string()));
	};
	match object.remove(fields::ID) {
		None | Some(Value::Null) if object.contains_key(fields::ERROR) =>
			parse_error(&mut object).map(Inbound::Rejected),
		None | Some(Value::Null) => parse_notification(object).map(Inbound::Notification),
		Some(id) => parse_response(id, object).map(Inbound::Response),
	}
}

fn parse_response(id: Value, mut object: Map<String, Value>) -> Result<Response, RpcClientError> {
	let id = id
		.as_u64()
		.ok_or_else(|| RpcClientError::Malformed(format!("unexpected request id {id}")))?;
	let outcome = if object.contains_key(fields::ERROR) {
		Err(parse_error(&mut object)?)
	} else if let Some(result) = object.remove(fields::RESULT) {
		Ok(result)
	} else {
		return Err(RpcClientError::Malformed(format!(
			"response {id} carries neither result nor error"
		)));
	};
	Ok(Response { id, outcome })
}

fn parse_error(object: &mut Map<String, Value>) -> Result<ErrorObject, RpcClientError> {
	let error = object.remove(fields::ERROR).unwrap_or(Value::Null);
	serde_json::from_value(error)
		.map_err(|e| RpcClientError::Malformed(format!("invalid error object: {e}")))
}

fn parse_notification(mut object: Map<String, Value>) -> Result<Notification, RpcClientError> {
	let method = match object.remove(fields::METHOD) {
		Some(Value::String(method)) => method,
		_ => return Err(RpcClientError::Malformed("frame has neither id nor method".to_string())),
	};
	let Some(Value::Object(mut params)) = object.remove(fields::PARAMS) else {
		return Err(RpcClientError::Malformed(format!("notification `{method}` has no params")));
	};
	let subscription = params
		.remove(fields::SUBSCRIPTION)
		.and_then(|id| serde_json::from_value::<SubscriptionId>(id).ok())
		.ok_or_else(|| {
			RpcClientError::Malformed(format!("notification `{method}` has no subscription id"))
		})?;
	let result = params.remove(fields::RESULT).unwrap_or(Value::Null);
	Ok(Notification { method, subscription, result })
}
