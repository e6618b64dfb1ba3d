// SPDX-License-Identifier: GPL-3.0

//! Request configuration and response envelope types.
//!
//! Payloads themselves stay opaque JSON; only the options this crate forwards to the
//! node and the `{ context, value }` envelope are typed.

use serde::{Deserialize, Serialize};

/// Consistency level a node should answer at.
///
/// Forwarded as is; never interpreted locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
	/// Latest block seen by the node, may be skipped.
	Processed,
	/// Voted on by a supermajority.
	#[default]
	Confirmed,
	/// Rooted by a supermajority.
	Finalized,
}

/// Encoding of account data and transactions in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
	#[serde(rename = "base58")]
	Base58,
	#[serde(rename = "base64")]
	Base64,
	#[serde(rename = "base64+zstd")]
	Base64Zstd,
	#[serde(rename = "json")]
	Json,
	#[serde(rename = "jsonParsed")]
	JsonParsed,
}

/// Slot at which a node evaluated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcContext {
	/// Slot of the evaluation.
	pub slot: u64,
}

/// Response wrapped with the context it was evaluated in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse<T> {
	/// Evaluation context.
	pub context: RpcContext,
	/// The response value.
	pub value: T,
}

/// Range of account data to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSlice {
	/// Start offset in bytes.
	pub offset: usize,
	/// Number of bytes.
	pub length: usize,
}

/// Options for `getAccountInfo`, `getMultipleAccounts` and `accountSubscribe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfoConfig {
	/// Commitment level to read at.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub commitment: Option<Commitment>,
	/// Encoding of the account data.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub encoding: Option<Encoding>,
	/// Return only this range of the account data.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data_slice: Option<DataSlice>,
	/// Lowest slot the node may answer from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub min_context_slot: Option<u64>,
}

impl AccountInfoConfig {
	/// Fill in the commitment if none was set.
	pub fn normalized(mut self, commitment: Commitment) -> Self {
		self.commitment.get_or_insert(commitment);
		self
	}
}

/// Options for `getTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfig {
	/// Commitment level to read at.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub commitment: Option<Commitment>,
	/// Encoding of the returned transaction.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub encoding: Option<Encoding>,
	/// Highest transaction version to return; legacy only when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_supported_transaction_version: Option<u8>,
}

impl TransactionConfig {
	/// Fill in unset options: the given commitment, `jsonParsed` encoding and support
	/// for version 0 transactions.
	pub fn normalized(mut self, commitment: Commitment) -> Self {
		self.commitment.get_or_insert(commitment);
		self.encoding.get_or_insert(Encoding::JsonParsed);
		self.max_supported_transaction_version.get_or_insert(0);
		self
	}

	/// The same options with `jsonParsed` encoding.
	pub fn json_parsed(&self) -> Self {
		Self { encoding: Some(Encoding::JsonParsed), ..self.clone() }
	}
}

/// Options for `getBlock`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockConfig {
	/// Commitment level to read at.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub commitment: Option<Commitment>,
	/// Encoding of the block's transactions.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub encoding: Option<Encoding>,
	/// `full`, `accounts`, `signatures` or `none`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_details: Option<String>,
	/// Whether to include block rewards.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rewards: Option<bool>,
	/// Highest transaction version to return; legacy only when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_supported_transaction_version: Option<u8>,
}

impl BlockConfig {
	/// Fill in unset options: the given commitment, `jsonParsed` encoding and support
	/// for version 0 transactions.
	pub fn normalized(mut self, commitment: Commitment) -> Self {
		self.commitment.get_or_insert(commitment);
		self.encoding.get_or_insert(Encoding::JsonParsed);
		self.max_supported_transaction_version.get_or_insert(0);
		self
	}
}
