//! Settlement receipts for the GoldSettle audit trail.
//!
//! Every executed order produces a [`SettlementReceipt`] that records what
//! moved and hashes the canonical settlement payload so it can be verified
//! independently of the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, Address, AssetId, ReceiptId, TransactionRef};

/// Proof that an order settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub id: ReceiptId,
    pub tx_ref: TransactionRef,
    /// Hex SHA-256 of the order's signing payload at execution.
    pub order_digest: String,
    pub asset_ids: Vec<AssetId>,
    pub from_holder: Address,
    pub to_holder: Address,
    pub sender_account: AccountId,
    pub receiver_account: AccountId,
    pub sender_balance_after: u64,
    pub receiver_balance_after: u64,
    /// SHA-256 of [`SettlementReceipt::payload`].
    pub payload_hash: [u8; 32],
    pub executed_by: Address,
    pub executed_at: DateTime<Utc>,
}

impl SettlementReceipt {
    /// Canonical receipt bytes.
    ///
    /// Format: `"goldsettle:receipt:v1:" || id(16 bytes) || tx_ref ||
    /// order_digest || sender || receiver || from_holder || to_holder ||
    /// executed_by || asset_ids(le u64) || balances(le u64) ||
    /// executed_at(rfc3339)`, strings NUL-terminated.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"goldsettle:receipt:v1:");
        payload.extend_from_slice(self.id.0.as_bytes());
        for field in [
            self.tx_ref.as_str(),
            self.order_digest.as_str(),
            self.sender_account.as_str(),
            self.receiver_account.as_str(),
            self.from_holder.as_str(),
            self.to_holder.as_str(),
            self.executed_by.as_str(),
        ] {
            payload.extend_from_slice(field.as_bytes());
            payload.push(0);
        }
        for id in &self.asset_ids {
            payload.extend_from_slice(&id.0.to_le_bytes());
        }
        payload.extend_from_slice(&self.sender_balance_after.to_le_bytes());
        payload.extend_from_slice(&self.receiver_balance_after.to_le_bytes());
        payload.extend_from_slice(self.executed_at.to_rfc3339().as_bytes());
        payload
    }

    /// Recompute the payload hash and store it on the receipt.
    pub fn seal(&mut self) {
        self.payload_hash = Sha256::digest(self.payload()).into();
    }

    /// Whether the stored hash matches the receipt contents.
    #[must_use]
    pub fn verify(&self) -> bool {
        let expected: [u8; 32] = Sha256::digest(self.payload()).into();
        expected == self.payload_hash
    }
}
