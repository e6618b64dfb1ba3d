// SPDX-License-Identifier: GPL-3.0

//! RPC client error types.

use crate::frame::ErrorObject;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when interacting with a node over any transport.
///
/// The type is `Clone` because a single connection failure is broadcast to every
/// outstanding call and subscription of that connection.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcClientError {
	/// Failed to connect to the RPC endpoint.
	#[error("Failed to connect to {endpoint}: {message}")]
	ConnectionFailed {
		/// The endpoint URL that failed to connect.
		endpoint: String,
		/// The error message describing the failure.
		message: String,
	},
	/// The endpoint URL uses a scheme no transport understands.
	#[error("Unsupported endpoint scheme: {0}")]
	InvalidEndpoint(String),
	/// The node answered with a JSON-RPC error object.
	#[error("RPC error {code}: {message}")]
	Protocol {
		/// Numeric JSON-RPC error code.
		code: i64,
		/// Human readable error message.
		message: String,
		/// Optional structured error data.
		data: Option<Value>,
	},
	/// The connection dropped while the call or subscription was outstanding.
	#[error("Transport closed")]
	TransportClosed,
	/// The caller cancelled the operation.
	#[error("Request cancelled")]
	Cancelled,
	/// The transport does not support the requested operation.
	#[error("Operation `{0}` is not supported by this transport")]
	UnsupportedOperation(&'static str),
	/// A frame failed to parse or could not be matched to a request.
	#[error("Malformed frame: {0}")]
	Malformed(String),
	/// A payload could not be encoded or decoded.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Writing to or reading from the underlying channel failed.
	#[error("Transport error: {0}")]
	Transport(String),
}

impl From<ErrorObject> for RpcClientError {
	fn from(error: ErrorObject) -> Self {
		RpcClientError::Protocol { code: error.code, message: error.message, data: error.data }
	}
}

impl From<serde_json::Error> for RpcClientError {
	fn from(error: serde_json::Error) -> Self {
		RpcClientError::Serialization(error.to_string())
	}
}
