// SPDX-License-Identifier: GPL-3.0

//! Client-side access to a remote blockchain node over JSON-RPC.
//!
//! The crate multiplexes calls and subscriptions over one connection per endpoint and
//! coalesces the lookups made while resolving a query.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 RpcGraph / QueryContext (resolve)               │
//! │     identity keys ─▶ single-flight scope ─▶ batch loaders       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Rpc (typed call surface)                    │
//! │          method registry, default commitment, decoding          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   RpcTransport (http / ws)                      │
//! │  ┌───────────────┐   ┌──────────────────────────────────────┐   │
//! │  │ HttpTransport │   │ DuplexTransport ─▶ Session           │   │
//! │  │  (one POST    │   │   CallCorrelator   SubscriptionMgr   │   │
//! │  │   per call)   │   │        ▲ reader task ▲               │   │
//! │  └───────────────┘   └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let graph = RpcGraph::from_config(&ClientConfig::new("ws://127.0.0.1:8900")?)?;
//! let owner = graph
//!     .query(|context| async move {
//!         context.account_owner("Addr", AccountInfoConfig::default(), &Selection::All).await
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod connection;
mod correlator;
pub mod error;
pub mod frame;
mod registry;
pub mod resolve;
mod rpc;
mod session;
mod strings;
mod subscription;
#[cfg(test)]
mod testing;
mod transport;
pub mod types;

pub use config::ClientConfig;
pub use connection::{Connector, DuplexConnection, FrameSink, FrameStream};
pub use correlator::CallCorrelator;
pub use error::{ResolveError, RpcClientError};
pub use registry::{MethodRegistry, SubscriptionNaming, Transform};
pub use resolve::{QueryContext, RpcGraph, Selection};
pub use rpc::{Notifications, Rpc, RpcRequest};
pub use session::{DEFAULT_NOTIFICATION_BUFFER, Session, SessionOptions};
pub use subscription::{
	BackpressurePolicy, Subscription, SubscriptionManager, SubscriptionRequest, SubscriptionState,
};
pub use transport::{BatchResults, DuplexTransport, HttpTransport, RpcTransport, connect};
