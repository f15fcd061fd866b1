//! # goldsettle-custody
//!
//! The Asset Custody Registry: the single source of truth for gold asset
//! records and the only component allowed to change them.
//!
//! - [`AssetCustodyRegistry`]: issuance, status, custody handoffs, holder
//!   transfers and burn
//! - [`WarrantRegistry`]: global single-use record of consumed warrants
//! - [`HolderMove`]: one holder change inside a settlement batch
//!
//! Issuance and burn move exactly one unit on the bound account through
//! the ledger's contract path.

pub mod registry;
pub mod warrant;

pub use registry::{AssetCustodyRegistry, HolderMove, SharedCustody};
pub use warrant::WarrantRegistry;
