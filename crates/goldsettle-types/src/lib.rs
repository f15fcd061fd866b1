//! # goldsettle-types
//!
//! Shared types, ports, errors, and configuration for the **GoldSettle**
//! settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`MemberId`], [`AccountId`], [`AssetId`], [`TransactionRef`], [`WarrantId`]
//! - **Order model**: [`TransactionOrder`], [`OrderStatus`], [`SignerRole`], [`SignaturePolicy`]
//! - **Asset model**: [`GoldAsset`], [`AssetStatus`], [`CustodyEvent`]
//! - **Account model**: [`Account`], [`LedgerEntry`], [`BalanceDelta`]
//! - **Receipts**: [`SettlementReceipt`]
//! - **Authorization**: [`Capability`], [`CapabilitySet`], [`CallerContext`], [`AuthorityPort`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`GoldSettleError`] with `GS_ERR_` prefix codes and [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod asset;
pub mod authority;
pub mod capability;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod receipt;
pub mod sync;

pub use account::*;
pub use asset::*;
pub use authority::*;
pub use capability::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use receipt::*;
pub use sync::{read_lock, write_lock};

// Constants are accessed via `goldsettle_types::constants::FOO`
// (not re-exported to avoid name collisions).
