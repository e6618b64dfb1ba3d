// SPDX-License-Identifier: GPL-3.0

//! Error types for RPC operations.
//!
//! This module contains all error types used throughout the `pop-rpc` crate,
//! organized by context:
//!
//! - [`rpc::RpcClientError`] - Errors from connections, calls and subscriptions.
//! - [`resolve::ResolveError`] - Errors from the per-query resolution layer.

pub mod resolve;
pub mod rpc;

pub use resolve::ResolveError;
pub use rpc::RpcClientError;
