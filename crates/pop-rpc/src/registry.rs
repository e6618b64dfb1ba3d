// SPDX-License-Identifier: GPL-3.0

//! Per-method parameter and response transforms.
//!
//! The registry is the seam between the typed call surface and the wire. Transforms
//! are opaque functions over JSON values; methods without a registered transform are
//! sent and returned unchanged.
//!
//! Subscriptions are registered by notification name. By default a name such as
//! `accountNotifications` maps to the `accountSubscribe` / `accountUnsubscribe` methods
//! and the `accountNotification` tag; nodes using other names can be accommodated with
//! [`MethodRegistry::with_subscription`].

use crate::{
	strings::rpc::subscriptions::{
		NOTIFICATION_SUFFIX, NOTIFICATIONS_SUFFIX, SUBSCRIBE_SUFFIX, UNSUBSCRIBE_SUFFIX,
	},
	subscription::SubscriptionRequest,
};
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

/// Function rewriting a JSON value.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Wire method names of one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionNaming {
	/// Method opening the subscription.
	pub subscribe: String,
	/// Method closing the subscription.
	pub unsubscribe: String,
	/// Tag carried by notifications.
	pub notification: String,
}

impl SubscriptionNaming {
	/// Derive the wire names from a notification name.
	///
	/// `accountNotifications` becomes `accountSubscribe`, `accountUnsubscribe` and
	/// `accountNotification`. A name without the `Notifications` suffix is used as the
	/// base as is.
	pub fn derive(notification_name: &str) -> Self {
		let base = notification_name.strip_suffix(NOTIFICATIONS_SUFFIX).unwrap_or(notification_name);
		Self {
			subscribe: format!("{base}{SUBSCRIBE_SUFFIX}"),
			unsubscribe: format!("{base}{UNSUBSCRIBE_SUFFIX}"),
			notification: format!("{base}{NOTIFICATION_SUFFIX}"),
		}
	}
}

#[derive(Clone, Default)]
struct MethodTransforms {
	params: Option<Transform>,
	response: Option<Transform>,
}

/// Registry of method transforms and subscription names.
#[derive(Clone, Default)]
pub struct MethodRegistry {
	methods: HashMap<String, MethodTransforms>,
	subscriptions: HashMap<String, SubscriptionNaming>,
}

impl MethodRegistry {
	/// Create an empty registry; every method passes through unchanged.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a transform applied to the parameters of `method` before sending.
	pub fn with_params_transform(
		mut self,
		method: &str,
		transform: impl Fn(Value) -> Value + Send + Sync + 'static,
	) -> Self {
		self.methods.entry(method.to_string()).or_default().params = Some(Arc::new(transform));
		self
	}

	/// Register a transform applied to the result of `method` before it is decoded.
	///
	/// Notification payloads use the transform registered under their tag, e.g.
	/// `slotNotification`.
	pub fn with_response_transform(
		mut self,
		method: &str,
		transform: impl Fn(Value) -> Value + Send + Sync + 'static,
	) -> Self {
		self.methods.entry(method.to_string()).or_default().response = Some(Arc::new(transform));
		self
	}

	/// Override the wire names of the subscription registered as `notification_name`.
	pub fn with_subscription(mut self, notification_name: &str, naming: SubscriptionNaming) -> Self {
		self.subscriptions.insert(notification_name.to_string(), naming);
		self
	}

	/// Apply the parameter transform of `method`, if any.
	pub fn transform_params(&self, method: &str, params: Value) -> Value {
		match self.methods.get(method).and_then(|transforms| transforms.params.as_ref()) {
			Some(transform) => transform(params),
			None => params,
		}
	}

	/// Apply the response transform of `method`, if any.
	pub fn transform_response(&self, method: &str, response: Value) -> Value {
		match self.methods.get(method).and_then(|transforms| transforms.response.as_ref()) {
			Some(transform) => transform(response),
			None => response,
		}
	}

	/// Get the response transform of `method`, if any.
	pub fn response_transform(&self, method: &str) -> Option<Transform> {
		self.methods.get(method).and_then(|transforms| transforms.response.clone())
	}

	/// Wire names of the subscription `notification_name`.
	pub fn naming(&self, notification_name: &str) -> SubscriptionNaming {
		self.subscriptions
			.get(notification_name)
			.cloned()
			.unwrap_or_else(|| SubscriptionNaming::derive(notification_name))
	}

	/// Build the subscription request for `notification_name`.
	///
	/// The parameter transform registered for the subscribe method applies.
	pub fn subscription(&self, notification_name: &str, params: Value) -> SubscriptionRequest {
		let SubscriptionNaming { subscribe, unsubscribe, notification } =
			self.naming(notification_name);
		let params = self.transform_params(&subscribe, params);
		SubscriptionRequest { subscribe, unsubscribe, notification, params }
	}
}

impl fmt::Debug for MethodRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MethodRegistry")
			.field("methods", &self.methods.keys().collect::<Vec<_>>())
			.field("subscriptions", &self.subscriptions)
			.finish()
	}
}
