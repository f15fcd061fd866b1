//! # goldsettle-settlement
//!
//! **Order Settlement Engine**: transaction orders, multi-party signing,
//! and atomic settlement against the custody registry and balance ledger.
//!
//! ## Architecture
//!
//! The engine owns only orders. On execution it builds a
//! [`SettlementBatch`] and commits it while holding the custody and ledger
//! write locks:
//! 1. Validates every holder move and balance delta (no writes)
//! 2. Moves asset holders from the sender's holder to the receiver's
//! 3. Debits the sender and credits the receiver one unit per asset
//! 4. Reverts step 2 if step 3 fails
//! 5. Seals a [`SettlementReceipt`](goldsettle_types::SettlementReceipt)
//!
//! Expiry is lazy: there is no scheduler, every mutating call checks it.

pub mod batch;
pub mod engine;

pub use batch::SettlementBatch;
pub use engine::OrderSettlementEngine;
