// SPDX-License-Identifier: GPL-3.0

//! String constants for the query resolution layer.

/// Entity fields read or synthesized by the loaders.
pub mod fields {
	/// Identity field of an account.
	pub const ADDRESS: &str = "address";
	/// Identity field of a block.
	pub const SLOT: &str = "slot";
	/// Identity field of a transaction.
	pub const SIGNATURE: &str = "signature";
	/// Account field holding the address of the owning program.
	pub const OWNER: &str = "owner";
	/// Transaction status metadata.
	pub const META: &str = "meta";
}

/// Entity names used in decode errors.
pub mod entities {
	pub const ACCOUNT: &str = "account";
}
