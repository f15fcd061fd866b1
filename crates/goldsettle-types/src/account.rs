//! Ledger account and journal types.
//!
//! Every account holds a non-negative count of gold units. Each mutation is
//! recorded as a [`LedgerEntry`] in an append-only journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Address, AssetId, EntryId, MemberId};

/// A ledger account (IGAN) owned by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub member: MemberId,
    /// Address that holds assets on behalf of this account.
    pub holder: Address,
    pub vault_site: String,
    pub purpose: String,
    /// Unit count. Never negative.
    pub balance: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input to account creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub id: AccountId,
    pub member: MemberId,
    pub holder: Address,
    pub vault_site: String,
    pub purpose: String,
}

/// Which guarded path performed a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationPath {
    /// Human-operated, capability-gated path.
    Operator,
    /// Programmatic path for allow-listed services.
    Contract,
}

impl std::fmt::Display for MutationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operator => write!(f, "OPERATOR"),
            Self::Contract => write!(f, "CONTRACT"),
        }
    }
}

/// A requested change to one account's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub account: AccountId,
    pub delta: i64,
    pub reason: String,
    pub asset_id: Option<AssetId>,
}

impl BalanceDelta {
    #[must_use]
    pub fn new(
        account: AccountId,
        delta: i64,
        reason: impl Into<String>,
        asset_id: Option<AssetId>,
    ) -> Self {
        Self {
            account,
            delta,
            reason: reason.into(),
            asset_id,
        }
    }
}

/// One applied balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account: AccountId,
    pub delta: i64,
    pub balance_after: u64,
    pub reason: String,
    pub asset_id: Option<AssetId>,
    pub path: MutationPath,
    pub caller: Address,
    pub recorded_at: DateTime<Utc>,
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl CreateAccountRequest {
    pub fn dummy(id: &str, member: &str, holder: &str) -> Self {
        Self {
            id: AccountId::new(id),
            member: MemberId::new(member),
            holder: Address::new(holder),
            vault_site: "ZRH-01".to_string(),
            purpose: "TRADING".to_string(),
        }
    }
}
