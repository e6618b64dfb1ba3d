// SPDX-License-Identifier: GPL-3.0

//! Physical channels to a node.
//!
//! A duplex connection is split into a [`FrameSink`] used by every caller and a
//! [`FrameStream`] consumed by exactly one reader task. Implementations:
//!
//! - [`ws`] - WebSocket connection backed by `tokio-tungstenite`.
//! - `memory` - In-process connection paired with a scripted `MockNode`. Only built for
//!   tests and with the `testing` feature.
//!
//! One-shot HTTP exchanges do not need a persistent channel and live in
//! [`crate::transport::HttpTransport`].

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod ws;

use crate::error::RpcClientError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of inbound text frames.
///
/// A [`RpcClientError::Malformed`] item is skipped by the reader; any other error or
/// the end of the stream terminates the connection.
pub type FrameStream = BoxStream<'static, Result<String, RpcClientError>>;

/// Write half of a duplex connection.
///
/// Implementations must serialize concurrent `send`s so frames are never interleaved.
#[async_trait]
pub trait FrameSink: Send + Sync {
	/// Send one complete text frame.
	async fn send(&self, frame: String) -> Result<(), RpcClientError>;

	/// Close the write half. Closing twice is a no-op.
	async fn close(&self);
}

/// An established duplex connection.
pub struct DuplexConnection {
	/// Write half shared by all callers.
	pub sink: Box<dyn FrameSink>,
	/// Read half consumed by the session reader.
	pub stream: FrameStream,
}

/// Establishes duplex connections on demand.
#[async_trait]
pub trait Connector: Send + Sync {
	/// Open a fresh connection.
	async fn connect(&self) -> Result<DuplexConnection, RpcClientError>;
}
