// SPDX-License-Identifier: GPL-3.0

//! Query resolution layer.
//!
//! Resolvers of one query look up accounts, transactions and blocks through a
//! [`QueryContext`]. Within that context:
//!
//! - every lookup is keyed by an [`IdentityKey`] built from the method and its
//!   normalized parameters, and a [`ResolutionScope`] runs each key's load at most once;
//! - account and transaction loads issued in the same turn are coalesced by a
//!   [`BatchLoader`] into one node call, split at the configured batch size;
//! - a resolver asking only for an entity's identity field gets it without a lookup.
//!
//! [`RpcGraph::query`] creates a fresh context per query and discards it afterwards, so
//! nothing is cached across queries.

mod batch;
mod context;
mod key;
mod loaders;
mod scope;

pub use batch::{BatchFn, BatchLoader, BatchOutcome};
pub use context::{QueryContext, RpcGraph, Selection};
pub use key::IdentityKey;
pub use loaders::{AccountKey, TransactionKey};
pub use scope::ResolutionScope;
