// SPDX-License-Identifier: GPL-3.0

//! Resolution layer error types.

use crate::error::RpcClientError;
use thiserror::Error;

/// Errors that can occur while resolving entities for a query.
///
/// Failures are cached for the remainder of a query scope and replayed to every
/// later request for the same key, hence `Clone`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
	/// The underlying RPC call failed.
	#[error("RPC error: {0}")]
	Rpc(#[from] RpcClientError),
	/// A batched call returned a different number of entries than requested.
	#[error("Batch returned {received} entries for {expected} keys")]
	BatchMismatch {
		/// Number of keys sent in the batch.
		expected: usize,
		/// Number of entries received.
		received: usize,
	},
	/// A loaded payload did not have the expected shape.
	#[error("Failed to decode {entity}: {message}")]
	Decode {
		/// The kind of entity being decoded.
		entity: &'static str,
		/// The error message describing the failure.
		message: String,
	},
	/// The batch carrying this lookup was abandoned before it completed.
	#[error("Resolution cancelled")]
	Cancelled,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_display_rpc() {
		let err = ResolveError::from(RpcClientError::TransportClosed);
		assert_eq!(err.to_string(), "RPC error: Transport closed");
	}

	#[test]
	fn error_display_batch_mismatch() {
		let err = ResolveError::BatchMismatch { expected: 3, received: 2 };
		assert_eq!(err.to_string(), "Batch returned 2 entries for 3 keys");
	}
}
