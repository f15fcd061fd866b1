//! # goldsettle-ledger
//!
//! **Balance Ledger**: the sole owner of per-account gold unit balances.
//!
//! ## Architecture
//!
//! 1. **BalanceLedger**: accounts, guarded mutation paths, journal
//! 2. **SupplyConservation**: Σ balances == credited − debited
//!
//! The ledger is a leaf service: it is built before the custody registry
//! and the settlement engine, which receive it as a [`SharedLedger`].

pub mod balance_ledger;
pub mod supply;

pub use balance_ledger::{BalanceLedger, SharedLedger};
pub use supply::SupplyConservation;
