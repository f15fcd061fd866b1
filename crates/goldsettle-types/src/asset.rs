//! Gold asset model for the custody registry.
//!
//! ## Status Graph
//!
//! ```text
//!   REGISTERED ─▶ IN_VAULT ─▶ IN_TRANSIT ─▶ PLEDGED ─▶ BURNED
//!        any non-terminal ─▶ MISSING | STOLEN
//! ```
//!
//! PLEDGED and IN_TRANSIT assets are *locked*: their holder cannot change.
//! BURNED is terminal. The bound ledger account is fixed at issuance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, Address, AssetId, CustodyEventId, GoldSettleError, MemberId, Result, WarrantId,
    constants,
};

/// Status of a gold asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetStatus {
    Registered,
    InVault,
    InTransit,
    Pledged,
    Missing,
    Stolen,
    Burned,
}

impl AssetStatus {
    /// Locked assets cannot change holder.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Pledged | Self::InTransit)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        *self == Self::Burned
    }

    /// Whether a status update may move an asset from `self` to `target`.
    ///
    /// REGISTERED is only entered at issuance and BURNED only through burn.
    #[must_use]
    pub fn can_update_to(&self, target: Self) -> bool {
        if self.is_terminal() || *self == target {
            return false;
        }
        !matches!(target, Self::Registered | Self::Burned)
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "REGISTERED"),
            Self::InVault => write!(f, "IN_VAULT"),
            Self::InTransit => write!(f, "IN_TRANSIT"),
            Self::Pledged => write!(f, "PLEDGED"),
            Self::Missing => write!(f, "MISSING"),
            Self::Stolen => write!(f, "STOLEN"),
            Self::Burned => write!(f, "BURNED"),
        }
    }
}

/// Kind of physical custody handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustodyType {
    Vault,
    Courier,
    Refinery,
    Inspection,
}

impl std::fmt::Display for CustodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault => write!(f, "VAULT"),
            Self::Courier => write!(f, "COURIER"),
            Self::Refinery => write!(f, "REFINERY"),
            Self::Inspection => write!(f, "INSPECTION"),
        }
    }
}

/// A recorded change of physical custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub id: CustodyEventId,
    pub asset_id: AssetId,
    pub from_custodian: Option<Address>,
    pub to_custodian: Address,
    pub custody_type: CustodyType,
    pub recorded_by: Address,
    pub recorded_at: DateTime<Utc>,
}

/// Input to asset issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Initial holder address.
    pub holder: Address,
    /// Ledger account permanently bound to the asset.
    pub bound_account: AccountId,
    pub serial_number: String,
    pub issuer: String,
    /// Gross weight in grams.
    pub gross_weight: Decimal,
    /// Purity in parts per 10 000 (9999 = four nines).
    pub fineness: u32,
    pub product_type: String,
    pub certificate_hash: String,
    pub warrant_id: WarrantId,
    pub issuing_member: MemberId,
    /// Initial physical custodian, if already vaulted.
    pub custodian: Option<Address>,
}

/// A tokenized unit of physical gold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldAsset {
    pub id: AssetId,
    pub serial_number: String,
    pub issuer: String,
    pub gross_weight: Decimal,
    pub fineness: u32,
    pub fine_weight: Decimal,
    pub product_type: String,
    pub certificate_hash: String,
    pub issuing_member: MemberId,
    pub warrant_id: WarrantId,
    /// Fixed at issuance; burn debits this account.
    pub bound_account: AccountId,
    pub status: AssetStatus,
    pub holder: Address,
    pub custodian: Option<Address>,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoldAsset {
    pub fn from_request(id: AssetId, request: IssueRequest, now: DateTime<Utc>) -> Result<Self> {
        let fine_weight = fine_weight(request.gross_weight, request.fineness)?;
        Ok(Self {
            id,
            serial_number: request.serial_number,
            issuer: request.issuer,
            gross_weight: request.gross_weight,
            fineness: request.fineness,
            fine_weight,
            product_type: request.product_type,
            certificate_hash: request.certificate_hash,
            issuing_member: request.issuing_member,
            warrant_id: request.warrant_id,
            bound_account: request.bound_account,
            status: AssetStatus::Registered,
            holder: request.holder,
            custodian: request.custodian,
            issued_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status.is_locked()
    }

    #[must_use]
    pub fn is_burned(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Pure-metal content: `gross × fineness / 10000`.
pub fn fine_weight(gross_weight: Decimal, fineness: u32) -> Result<Decimal> {
    gross_weight
        .checked_mul(Decimal::from(fineness))
        .and_then(|scaled| scaled.checked_div(Decimal::from(constants::FINENESS_SCALE)))
        .ok_or_else(|| {
            GoldSettleError::validation(format!(
                "fine weight of {gross_weight} g at fineness {fineness} is out of range"
            ))
        })
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl IssueRequest {
    pub fn dummy_kilobar(holder: &str, bound_account: &str, serial: &str, warrant: &str) -> Self {
        Self {
            holder: Address::new(holder),
            bound_account: AccountId::new(bound_account),
            serial_number: serial.to_string(),
            issuer: "ACME REFINERY".to_string(),
            gross_weight: Decimal::new(1000, 0),
            fineness: 9999,
            product_type: "KILOBAR".to_string(),
            certificate_hash: format!("cert-{serial}"),
            warrant_id: WarrantId::new(warrant),
            issuing_member: MemberId::new("GIC-ISSUER"),
            custodian: None,
        }
    }
}
