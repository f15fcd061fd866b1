//! Transaction order model for the settlement state machine.
//!
//! ## State Machine
//!
//! ```text
//!   PENDING_PREPARATION ─prepare─▶ PENDING_SIGNATURE ─initiator─▶ PENDING_COUNTERPARTY
//!                                        │ (one-signer)                  │ counterparty
//!                                        └──────────────▶ PENDING_EXECUTION ◀┘
//!                                                               │ execute
//!                                                               ▼
//!                                                           EXECUTED
//!
//!   any non-terminal ──▶ CANCELLED | FAILED | EXPIRED
//! ```
//!
//! Terminal orders are frozen: no field changes once the status is
//! EXECUTED, CANCELLED, FAILED or EXPIRED.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, Address, AssetId, GoldSettleError, MemberId, Result, TransactionRef};

/// Commercial nature of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Transfer,
    Sale,
    Purchase,
    Collateral,
    Redemption,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Sale => write!(f, "SALE"),
            Self::Purchase => write!(f, "PURCHASE"),
            Self::Collateral => write!(f, "COLLATERAL"),
            Self::Redemption => write!(f, "REDEMPTION"),
        }
    }
}

/// Lifecycle status of a transaction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingPreparation,
    PendingSignature,
    PendingCounterparty,
    PendingExecution,
    Executed,
    Cancelled,
    Failed,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Cancelled | Self::Failed | Self::Expired
        )
    }

    /// Whether the graph has an edge from `self` to `target`.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match target {
            Self::Cancelled | Self::Failed | Self::Expired => true,
            Self::PendingSignature => *self == Self::PendingPreparation,
            Self::PendingCounterparty => *self == Self::PendingSignature,
            Self::PendingExecution => {
                matches!(self, Self::PendingSignature | Self::PendingCounterparty)
            }
            Self::Executed => *self == Self::PendingExecution,
            Self::PendingPreparation => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingPreparation => write!(f, "PENDING_PREPARATION"),
            Self::PendingSignature => write!(f, "PENDING_SIGNATURE"),
            Self::PendingCounterparty => write!(f, "PENDING_COUNTERPARTY"),
            Self::PendingExecution => write!(f, "PENDING_EXECUTION"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// The party a signature is given for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerRole {
    Initiator,
    Counterparty,
}

impl SignerRole {
    /// Status an order must be in for this role to sign.
    #[must_use]
    pub fn signing_status(&self) -> OrderStatus {
        match self {
            Self::Initiator => OrderStatus::PendingSignature,
            Self::Counterparty => OrderStatus::PendingCounterparty,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initiator => crate::constants::ROLE_LABEL_INITIATOR,
            Self::Counterparty => crate::constants::ROLE_LABEL_COUNTERPARTY,
        }
    }
}

impl std::str::FromStr for SignerRole {
    type Err = GoldSettleError;

    fn from_str(label: &str) -> Result<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case(crate::constants::ROLE_LABEL_INITIATOR) {
            Ok(Self::Initiator)
        } else if label.eq_ignore_ascii_case(crate::constants::ROLE_LABEL_COUNTERPARTY) {
            Ok(Self::Counterparty)
        } else {
            Err(GoldSettleError::validation(format!(
                "unrecognized signer role label '{label}'"
            )))
        }
    }
}

impl std::fmt::Display for SignerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How many parties must sign before an order can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignaturePolicy {
    /// Only the initiator signs.
    InitiatorOnly,
    /// Initiator signs first, then the counterparty.
    #[default]
    InitiatorThenCounterparty,
}

impl SignaturePolicy {
    #[must_use]
    pub fn requires(&self, role: SignerRole) -> bool {
        match self {
            Self::InitiatorOnly => role == SignerRole::Initiator,
            Self::InitiatorThenCounterparty => true,
        }
    }

    /// Status reached once `role` has signed.
    #[must_use]
    pub fn status_after(&self, role: SignerRole) -> OrderStatus {
        match (self, role) {
            (Self::InitiatorThenCounterparty, SignerRole::Initiator) => {
                OrderStatus::PendingCounterparty
            }
            _ => OrderStatus::PendingExecution,
        }
    }
}

/// What the initiator asks for: a product type and a unit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub product_type: String,
    pub quantity: u32,
}

/// Commercial valuation attached to an order. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub unit_price: Decimal,
    pub total_value: Decimal,
    pub currency: String,
}

impl Valuation {
    #[must_use]
    pub fn unpriced(currency: impl Into<String>) -> Self {
        Self {
            unit_price: Decimal::ZERO,
            total_value: Decimal::ZERO,
            currency: currency.into(),
        }
    }
}

/// An accepted signature on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSignature {
    pub signer: Address,
    pub role: SignerRole,
    /// Opaque signature bytes; verification belongs to the key layer.
    pub signature: Vec<u8>,
    pub signed_at: DateTime<Utc>,
}

/// Input to order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub tx_ref: TransactionRef,
    pub order_type: OrderType,
    pub initiator: MemberId,
    pub counterparty: MemberId,
    /// Asset ids proposed at creation; preparation fixes the final list.
    pub asset_ids: Vec<AssetId>,
    pub requested: AssetRequest,
    pub valuation: Valuation,
    pub expires_at: Option<DateTime<Utc>>,
    pub signature_policy: SignaturePolicy,
    /// Supporting document bundle, checked against the document registry.
    pub document_set: Option<String>,
}

/// A transaction order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionOrder {
    pub tx_ref: TransactionRef,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub initiator: MemberId,
    pub counterparty: MemberId,
    pub sender_account: Option<AccountId>,
    pub receiver_account: Option<AccountId>,
    pub asset_ids: Vec<AssetId>,
    pub requested: AssetRequest,
    pub valuation: Valuation,
    pub signature_policy: SignaturePolicy,
    pub document_set: Option<String>,
    pub signatures: Vec<OrderSignature>,
    pub created_by: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Reason recorded on cancellation or failure.
    pub terminal_reason: Option<String>,
}

impl TransactionOrder {
    /// Build a fresh order in PENDING_PREPARATION from a validated request.
    #[must_use]
    pub fn from_request(
        request: CreateOrderRequest,
        created_by: Address,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tx_ref: request.tx_ref,
            order_type: request.order_type,
            status: OrderStatus::PendingPreparation,
            initiator: request.initiator,
            counterparty: request.counterparty,
            sender_account: None,
            receiver_account: None,
            asset_ids: request.asset_ids,
            requested: request.requested,
            valuation: request.valuation,
            signature_policy: request.signature_policy,
            document_set: request.document_set,
            signatures: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
            expires_at: request.expires_at,
            terminal_reason: None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the expiry time is set and has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    #[must_use]
    pub fn is_participant(&self, member: &MemberId) -> bool {
        self.initiator == *member || self.counterparty == *member
    }

    /// The member that must sign for `role`.
    #[must_use]
    pub fn party_for(&self, role: SignerRole) -> &MemberId {
        match role {
            SignerRole::Initiator => &self.initiator,
            SignerRole::Counterparty => &self.counterparty,
        }
    }

    #[must_use]
    pub fn signature_for(&self, role: SignerRole) -> Option<&OrderSignature> {
        self.signatures.iter().find(|sig| sig.role == role)
    }

    #[must_use]
    pub fn has_signed(&self, signer: &Address) -> bool {
        self.signatures.iter().any(|sig| sig.signer == *signer)
    }

    /// Move along the status graph, or fail without touching the order.
    pub fn transition(
        &mut self,
        target: OrderStatus,
        operation: &'static str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(GoldSettleError::InvalidOrderState {
                tx_ref: self.tx_ref.clone(),
                current: self.status,
                operation,
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Canonical bytes identifying what is being settled.
    ///
    /// Format: `"goldsettle:order:v1:" || tx_ref || type || initiator ||
    /// counterparty || sender || receiver || asset_ids(le u64) || product || quantity`
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"goldsettle:order:v1:");
        for field in [
            self.tx_ref.as_str(),
            self.order_type.to_string().as_str(),
            self.initiator.as_str(),
            self.counterparty.as_str(),
            self.sender_account.as_ref().map_or("", AccountId::as_str),
            self.receiver_account.as_ref().map_or("", AccountId::as_str),
        ] {
            payload.extend_from_slice(field.as_bytes());
            payload.push(0);
        }
        for id in &self.asset_ids {
            payload.extend_from_slice(&id.0.to_le_bytes());
        }
        payload.extend_from_slice(self.requested.product_type.as_bytes());
        payload.extend_from_slice(&self.requested.quantity.to_le_bytes());
        payload
    }

    /// SHA-256 of [`signing_payload`](Self::signing_payload).
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.signing_payload()).into()
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl CreateOrderRequest {
    pub fn dummy_transfer(
        tx_ref: &str,
        initiator: &str,
        counterparty: &str,
        asset_ids: Vec<AssetId>,
    ) -> Self {
        let quantity = u32::try_from(asset_ids.len()).unwrap_or(u32::MAX);
        Self {
            tx_ref: TransactionRef::new(tx_ref),
            order_type: OrderType::Transfer,
            initiator: MemberId::new(initiator),
            counterparty: MemberId::new(counterparty),
            asset_ids,
            requested: AssetRequest {
                product_type: "KILOBAR".to_string(),
                quantity,
            },
            valuation: Valuation::unpriced("USD"),
            expires_at: None,
            signature_policy: SignaturePolicy::InitiatorThenCounterparty,
            document_set: None,
        }
    }
}
