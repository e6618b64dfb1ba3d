// SPDX-License-Identifier: GPL-3.0

//! Batch functions for the entity loaders.
//!
//! - Accounts are fetched with one `getMultipleAccounts` call per distinct config.
//! - Transactions are fetched with one batched exchange of `getTransaction` calls. When a
//!   transaction is requested in an encoding other than `jsonParsed`, it is fetched again
//!   as `jsonParsed` so the result always carries the full status `meta`.
//!
//! Every loaded entity carries its identity field (`address` or `signature`), so an
//! entity can be projected without knowing which lookup produced it.

use super::batch::{BatchFn, BatchOutcome};
use crate::{
	error::ResolveError,
	rpc::Rpc,
	strings::{
		resolve::fields::{ADDRESS, META, SIGNATURE},
		rpc::methods::GET_TRANSACTION,
	},
	types::{AccountInfoConfig, Encoding, TransactionConfig},
};
use futures::{FutureExt, future::join_all};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Account lookup: address plus normalized request options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
	/// Account address.
	pub address: String,
	/// Request options, commitment already filled in.
	pub config: AccountInfoConfig,
}

/// Transaction lookup: signature plus normalized request options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
	/// Transaction signature.
	pub signature: String,
	/// Request options, defaults already filled in.
	pub config: TransactionConfig,
}

/// Batch function loading accounts.
pub fn accounts(rpc: Rpc) -> BatchFn<AccountKey> {
	Arc::new(move |keys: Vec<AccountKey>| {
		let rpc = rpc.clone();
		async move { load_accounts(&rpc, keys).await }.boxed()
	})
}

/// Batch function loading transactions.
pub fn transactions(rpc: Rpc) -> BatchFn<TransactionKey> {
	Arc::new(move |keys: Vec<TransactionKey>| {
		let rpc = rpc.clone();
		async move { load_transactions(&rpc, keys).await }.boxed()
	})
}

/// Set `field` to `id` on an object payload; other payloads are returned unchanged.
pub(crate) fn with_identity(mut value: Value, field: &str, id: Value) -> Value {
	if let Value::Object(object) = &mut value {
		object.insert(field.to_string(), id);
	}
	value
}

async fn load_accounts(rpc: &Rpc, keys: Vec<AccountKey>) -> BatchOutcome {
	// Keys sharing a config share a call, in first-seen order.
	let mut groups: Vec<(AccountInfoConfig, Vec<usize>)> = Vec::new();
	for (index, key) in keys.iter().enumerate() {
		match groups.iter_mut().find(|(config, _)| *config == key.config) {
			Some((_, indices)) => indices.push(index),
			None => groups.push((key.config.clone(), vec![index])),
		}
	}

	let loads = groups.iter().map(|(config, indices)| {
		let addresses: Vec<String> = indices.iter().map(|&index| keys[index].address.clone()).collect();
		let config = config.clone();
		async move { rpc.get_multiple_accounts(&addresses, config).await }
	});
	let responses = join_all(loads).await;

	let mut results: Vec<Result<Value, ResolveError>> = vec![Ok(Value::Null); keys.len()];
	for ((_, indices), response) in groups.iter().zip(responses) {
		match response {
			Ok(response) if response.value.len() == indices.len() =>
				for (&index, account) in indices.iter().zip(response.value) {
					let address = Value::from(keys[index].address.as_str());
					results[index] = Ok(account
						.map(|account| with_identity(account, ADDRESS, address))
						.unwrap_or(Value::Null));
				},
			Ok(response) => {
				let error = ResolveError::BatchMismatch {
					expected: indices.len(),
					received: response.value.len(),
				};
				for &index in indices {
					results[index] = Err(error.clone());
				}
			},
			Err(error) => {
				let error = ResolveError::from(error);
				for &index in indices {
					results[index] = Err(error.clone());
				}
			},
		}
	}
	Ok(results)
}

async fn load_transactions(rpc: &Rpc, keys: Vec<TransactionKey>) -> BatchOutcome {
	let cancel = CancellationToken::new();
	let calls = keys
		.iter()
		.map(|key| (GET_TRANSACTION.to_string(), json!([key.signature, key.config])))
		.collect();
	let mut transactions: Vec<Result<Value, ResolveError>> = rpc
		.batch(calls, &cancel)
		.await?
		.into_iter()
		.map(|result| result.map_err(ResolveError::from))
		.collect();
	if transactions.len() != keys.len() {
		return Err(ResolveError::BatchMismatch {
			expected: keys.len(),
			received: transactions.len(),
		});
	}

	let refetch: Vec<usize> = keys
		.iter()
		.enumerate()
		.filter(|(index, key)| {
			key.config.encoding != Some(Encoding::JsonParsed) &&
				matches!(&transactions[*index], Ok(value) if !value.is_null())
		})
		.map(|(index, _)| index)
		.collect();
	if !refetch.is_empty() {
		let calls = refetch
			.iter()
			.map(|&index| {
				let key = &keys[index];
				(GET_TRANSACTION.to_string(), json!([key.signature, key.config.json_parsed()]))
			})
			.collect();
		let parsed = rpc.batch(calls, &cancel).await?;
		for (&index, parsed) in refetch.iter().zip(parsed) {
			match parsed {
				Ok(Value::Null) => transactions[index] = Ok(Value::Null),
				Ok(parsed) =>
					if let Ok(Value::Object(transaction)) = &mut transactions[index] {
						let meta = parsed.get(META).cloned().unwrap_or(Value::Null);
						transaction.insert(META.to_string(), meta);
					},
				Err(error) => transactions[index] = Err(error.into()),
			}
		}
	}

	Ok(keys
		.iter()
		.zip(transactions)
		.map(|(key, transaction)| {
			transaction.map(|value| {
				with_identity(value, SIGNATURE, Value::from(key.signature.as_str()))
			})
		})
		.collect())
}
