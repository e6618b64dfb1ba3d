// SPDX-License-Identifier: GPL-3.0

//! Per-query resolution context.
//!
//! A [`QueryContext`] lives exactly as long as one query. Every resolver of the query
//! goes through it, so two resolvers asking for the same entity share one lookup and
//! lookups issued in the same turn share one call.

use super::{
	batch::BatchLoader,
	key::IdentityKey,
	loaders::{self, AccountKey, TransactionKey, with_identity},
	scope::ResolutionScope,
};
use crate::{
	config::{ClientConfig, DEFAULT_MAX_BATCH_SIZE},
	error::{ResolveError, RpcClientError},
	rpc::Rpc,
	strings::{
		resolve::{
			entities::ACCOUNT,
			fields::{ADDRESS, OWNER, SIGNATURE, SLOT},
		},
		rpc::methods::{GET_ACCOUNT_INFO, GET_BLOCK, GET_TRANSACTION},
	},
	types::{AccountInfoConfig, BlockConfig, TransactionConfig},
};
use serde_json::{Map, Value, json};
use std::{
	collections::{BTreeSet, HashSet},
	future::Future,
	sync::Arc,
};

/// Fields a resolver asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
	/// Every field of the entity.
	#[default]
	All,
	/// Only the named fields.
	Fields(BTreeSet<String>),
}

impl Selection {
	/// Select the given fields.
	pub fn fields<I, S>(fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::Fields(fields.into_iter().map(Into::into).collect())
	}

	/// Whether `field` is the only field selected.
	pub fn only(&self, field: &str) -> bool {
		match self {
			Self::All => false,
			Self::Fields(fields) => fields.iter().all(|selected| selected == field),
		}
	}
}

/// Entity carrying nothing but its identity field.
fn identity_only(field: &str, id: Value) -> Arc<Value> {
	let mut object = Map::new();
	object.insert(field.to_string(), id);
	Arc::new(Value::Object(object))
}

fn present(value: Arc<Value>) -> Option<Arc<Value>> {
	(!value.is_null()).then_some(value)
}

/// Owner address of an account payload, `None` if it has none.
fn owner_of(account: &Value) -> Result<Option<&str>, ResolveError> {
	match account.get(OWNER) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(owner)) => Ok(Some(owner)),
		Some(other) => Err(ResolveError::Decode {
			entity: ACCOUNT,
			message: format!("owner is not an address: {other}"),
		}),
	}
}

/// Lookups made on behalf of one query.
pub struct QueryContext {
	rpc: Rpc,
	scope: ResolutionScope,
	accounts: BatchLoader<AccountKey>,
	transactions: BatchLoader<TransactionKey>,
}

impl QueryContext {
	/// Create a context whose batched calls carry at most `max_batch_size` keys.
	pub fn new(rpc: Rpc, max_batch_size: usize) -> Self {
		Self {
			accounts: BatchLoader::new(max_batch_size, loaders::accounts(rpc.clone())),
			transactions: BatchLoader::new(max_batch_size, loaders::transactions(rpc.clone())),
			scope: ResolutionScope::new(),
			rpc,
		}
	}

	/// The client lookups go through.
	pub fn rpc(&self) -> &Rpc {
		&self.rpc
	}

	/// The cache backing this context.
	pub fn scope(&self) -> &ResolutionScope {
		&self.scope
	}

	/// Resolve an account, `None` if it does not exist.
	///
	/// A selection of only `address` is answered without a lookup.
	pub async fn account(
		&self,
		address: &str,
		config: AccountInfoConfig,
		selection: &Selection,
	) -> Result<Option<Arc<Value>>, ResolveError> {
		if selection.only(ADDRESS) {
			return Ok(Some(identity_only(ADDRESS, Value::from(address))));
		}
		let config = config.normalized(self.rpc.commitment());
		let key = IdentityKey::new(GET_ACCOUNT_INFO, &json!([address, config]));
		let loader = self.accounts.clone();
		let account = AccountKey { address: address.to_string(), config };
		let value = self.scope.resolve(key, move || async move { loader.load(account).await }).await?;
		Ok(present(value))
	}

	/// Resolve the owner of an account, `None` if either does not exist.
	pub async fn account_owner(
		&self,
		address: &str,
		config: AccountInfoConfig,
		selection: &Selection,
	) -> Result<Option<Arc<Value>>, ResolveError> {
		let Some(account) = self.account(address, config.clone(), &Selection::All).await? else {
			return Ok(None);
		};
		match owner_of(&account)? {
			Some(owner) => self.account(owner, config, selection).await,
			None => Ok(None),
		}
	}

	/// Resolve an account followed by its owner, the owner's owner and so on.
	///
	/// The chain ends at a missing account, an account without an owner, or the first
	/// address already in the chain.
	pub async fn account_owner_chain(
		&self,
		address: &str,
		config: AccountInfoConfig,
	) -> Result<Vec<Arc<Value>>, ResolveError> {
		let mut chain = Vec::new();
		let mut seen = HashSet::new();
		let mut current = address.to_string();
		while seen.insert(current.clone()) {
			let Some(account) = self.account(&current, config.clone(), &Selection::All).await? else {
				break;
			};
			let owner = owner_of(&account)?.map(str::to_string);
			chain.push(account);
			match owner {
				Some(owner) => current = owner,
				None => break,
			}
		}
		Ok(chain)
	}

	/// Resolve a transaction, `None` if the node does not know it.
	///
	/// A selection of only `signature` is answered without a lookup.
	pub async fn transaction(
		&self,
		signature: &str,
		config: TransactionConfig,
		selection: &Selection,
	) -> Result<Option<Arc<Value>>, ResolveError> {
		if selection.only(SIGNATURE) {
			return Ok(Some(identity_only(SIGNATURE, Value::from(signature))));
		}
		let config = config.normalized(self.rpc.commitment());
		let key = IdentityKey::new(GET_TRANSACTION, &json!([signature, config]));
		let loader = self.transactions.clone();
		let transaction = TransactionKey { signature: signature.to_string(), config };
		let value =
			self.scope.resolve(key, move || async move { loader.load(transaction).await }).await?;
		Ok(present(value))
	}

	/// Resolve a block, `None` if the slot was skipped or is unavailable.
	///
	/// A selection of only `slot` is answered without a lookup. Blocks are cached in
	/// the scope but not batched.
	pub async fn block(
		&self,
		slot: u64,
		config: BlockConfig,
		selection: &Selection,
	) -> Result<Option<Arc<Value>>, ResolveError> {
		if selection.only(SLOT) {
			return Ok(Some(identity_only(SLOT, Value::from(slot))));
		}
		let config = config.normalized(self.rpc.commitment());
		let key = IdentityKey::new(GET_BLOCK, &json!([slot, config]));
		let rpc = self.rpc.clone();
		let value = self
			.scope
			.resolve(key, move || async move {
				let block = rpc.get_block(slot, config).await?;
				Ok::<_, ResolveError>(
					block
						.map(|block| with_identity(block, SLOT, Value::from(slot)))
						.unwrap_or(Value::Null),
				)
			})
			.await?;
		Ok(present(value))
	}

	/// Discard everything cached for the query.
	pub fn teardown(&self) {
		log::trace!("Tearing down query scope with {} entries", self.scope.len());
		self.scope.clear();
	}
}

/// Entry point for queries against a node.
///
/// Each query gets a fresh [`QueryContext`]; nothing is shared between queries.
#[derive(Debug, Clone)]
pub struct RpcGraph {
	rpc: Rpc,
	max_batch_size: usize,
}

impl RpcGraph {
	/// Create a graph over `rpc`.
	pub fn new(rpc: Rpc) -> Self {
		Self { rpc, max_batch_size: DEFAULT_MAX_BATCH_SIZE }
	}

	/// Create a graph for the endpoint, commitment and batch ceiling in `config`.
	pub fn from_config(config: &ClientConfig) -> Result<Self, RpcClientError> {
		Ok(Self::new(Rpc::from_config(config)?).with_max_batch_size(config.max_batch_size))
	}

	/// Carry at most `size` keys per batched call.
	pub fn with_max_batch_size(mut self, size: usize) -> Self {
		self.max_batch_size = size.max(1);
		self
	}

	/// The client queries go through.
	pub fn rpc(&self) -> &Rpc {
		&self.rpc
	}

	/// Create a context for a new query.
	pub fn context(&self) -> Arc<QueryContext> {
		Arc::new(QueryContext::new(self.rpc.clone(), self.max_batch_size))
	}

	/// Run `query` with a fresh context, tearing it down once the query completes.
	pub async fn query<F, Fut, T>(&self, query: F) -> T
	where
		F: FnOnce(Arc<QueryContext>) -> Fut,
		Fut: Future<Output = T>,
	{
		let context = self.context();
		let output = query(context.clone()).await;
		context.teardown();
		output
	}
}
