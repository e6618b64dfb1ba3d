// SPDX-License-Identifier: GPL-3.0

//! String constants for the transport and call surface.

/// JSON-RPC protocol version carried by every request frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Field names of JSON-RPC request, response and notification frames.
pub mod fields {
	pub const JSONRPC: &str = "jsonrpc";
	pub const ID: &str = "id";
	pub const METHOD: &str = "method";
	pub const PARAMS: &str = "params";
	pub const RESULT: &str = "result";
	pub const ERROR: &str = "error";
	pub const SUBSCRIPTION: &str = "subscription";
}

/// JSON-RPC method names exposed by the typed call surface.
pub mod methods {
	pub const GET_ACCOUNT_INFO: &str = "getAccountInfo";
	pub const GET_BLOCK: &str = "getBlock";
	pub const GET_MULTIPLE_ACCOUNTS: &str = "getMultipleAccounts";
	pub const GET_SLOT: &str = "getSlot";
	pub const GET_TRANSACTION: &str = "getTransaction";
}

/// Notification names and the suffixes used to derive the wire method names of a
/// subscription.
///
/// A notification name such as `accountNotifications` maps to `accountSubscribe`,
/// `accountUnsubscribe` and the `accountNotification` tag carried by pushes.
pub mod subscriptions {
	pub const ACCOUNT_NOTIFICATIONS: &str = "accountNotifications";
	pub const LOGS_NOTIFICATIONS: &str = "logsNotifications";
	pub const SIGNATURE_NOTIFICATIONS: &str = "signatureNotifications";
	pub const SLOT_NOTIFICATIONS: &str = "slotNotifications";

	pub const NOTIFICATIONS_SUFFIX: &str = "Notifications";
	pub const NOTIFICATION_SUFFIX: &str = "Notification";
	pub const SUBSCRIBE_SUFFIX: &str = "Subscribe";
	pub const UNSUBSCRIBE_SUFFIX: &str = "Unsubscribe";
}

/// URL schemes understood by [`crate::connect`].
pub mod schemes {
	pub const HTTP: &str = "http";
	pub const HTTPS: &str = "https";
	pub const WS: &str = "ws";
	pub const WSS: &str = "wss";
}

/// Operation names reported by [`crate::RpcClientError::UnsupportedOperation`].
pub mod operations {
	pub const SUBSCRIBE: &str = "subscribe";
}

/// Default endpoint of a locally running node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8899";

/// Content type of every HTTP request body.
pub const CONTENT_TYPE_JSON: &str = "application/json";
