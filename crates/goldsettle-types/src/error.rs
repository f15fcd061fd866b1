//! Error types for the GoldSettle settlement engine.
//!
//! All errors use the `GS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by failure class:
//! - 1xx: Authorization errors
//! - 2xx: Not-found errors
//! - 3xx: Invalid-state errors
//! - 4xx: Validation errors
//! - 5xx: Already-used errors
//! - 6xx: Balance errors
//! - 7xx: Locked-resource errors
//! - 9xx: General / internal errors
//!
//! Every error is an immediate, non-retryable abort. The operation that
//! returned it left all state exactly as it found it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AccountId, Address, AssetId, AssetStatus, MemberId, MemberStatus, OrderStatus, SignerRole,
    TransactionRef, WarrantId,
};

/// Failure class of a [`GoldSettleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the required capability or identity match.
    Authorization,
    /// Unknown order, asset, account or member.
    NotFound,
    /// Operation not valid from the current status.
    InvalidState,
    /// Missing, malformed or empty required field; non-future expiry.
    Validation,
    /// Warrant reuse, duplicate signature, duplicate identifier.
    AlreadyUsed,
    /// A balance would go below zero.
    InsufficientBalance,
    /// Asset locked or reserved during transfer or execution.
    LockedResource,
    Configuration,
    Serialization,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::InvalidState => write!(f, "INVALID_STATE"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::AlreadyUsed => write!(f, "ALREADY_USED"),
            Self::InsufficientBalance => write!(f, "INSUFFICIENT_BALANCE"),
            Self::LockedResource => write!(f, "LOCKED_RESOURCE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all GoldSettle operations.
#[derive(Debug, Error)]
pub enum GoldSettleError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller does not hold any capability accepted for the action.
    #[error("GS_ERR_100: {caller} is not authorized to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },

    /// The caller address does not resolve to a registered member.
    #[error("GS_ERR_101: Caller {0} does not resolve to a member")]
    UnresolvedPrincipal(Address),

    /// The address is blacklisted by the authority.
    #[error("GS_ERR_102: Address is blacklisted: {0}")]
    Blacklisted(Address),

    /// The caller is not on the trust table guarding a programmatic path.
    #[error("GS_ERR_103: {caller} is not on the {table} allow-list")]
    NotAllowListed {
        caller: Address,
        table: &'static str,
    },

    // =================================================================
    // Not-Found Errors (2xx)
    // =================================================================
    #[error("GS_ERR_200: Order not found: {0}")]
    OrderNotFound(TransactionRef),

    #[error("GS_ERR_201: Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("GS_ERR_202: Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("GS_ERR_203: Member not found: {0}")]
    MemberNotFound(MemberId),

    // =================================================================
    // Invalid-State Errors (3xx)
    // =================================================================
    /// The order's current status does not allow the operation.
    #[error("GS_ERR_300: Order {tx_ref} is {current}, cannot {operation}")]
    InvalidOrderState {
        tx_ref: TransactionRef,
        current: OrderStatus,
        operation: &'static str,
    },

    /// The asset's current status does not allow the operation.
    #[error("GS_ERR_301: {asset} is {current}, cannot {operation}")]
    InvalidAssetState {
        asset: AssetId,
        current: AssetStatus,
        operation: &'static str,
    },

    /// The member exists but is not in the ACTIVE state.
    #[error("GS_ERR_302: Member {member} is {status}, expected ACTIVE")]
    MemberNotActive {
        member: MemberId,
        status: MemberStatus,
    },

    /// The account exists but is deactivated.
    #[error("GS_ERR_303: Account {0} is inactive")]
    AccountInactive(AccountId),

    // =================================================================
    // Validation Errors (4xx)
    // =================================================================
    /// A required field is missing, empty or malformed.
    #[error("GS_ERR_400: Validation failed: {reason}")]
    Validation { reason: String },

    // =================================================================
    // Already-Used Errors (5xx)
    // =================================================================
    #[error("GS_ERR_500: Order already exists: {0}")]
    DuplicateOrder(TransactionRef),

    #[error("GS_ERR_501: Account already exists: {0}")]
    DuplicateAccount(AccountId),

    /// Warrants are single-use across the whole registry.
    #[error("GS_ERR_502: Warrant already used: {0}")]
    WarrantAlreadyUsed(WarrantId),

    #[error("GS_ERR_503: Serial {serial} from issuer {issuer} already issued")]
    DuplicateSerial { serial: String, issuer: String },

    /// The role already carries an accepted signature on this order.
    #[error("GS_ERR_504: Order {tx_ref} already signed as {role}")]
    SignatureAlreadyRecorded {
        tx_ref: TransactionRef,
        role: SignerRole,
    },

    /// The signer already signed this order under another role.
    #[error("GS_ERR_505: {signer} already signed order {tx_ref}")]
    SignerAlreadySigned {
        tx_ref: TransactionRef,
        signer: Address,
    },

    // =================================================================
    // Balance Errors (6xx)
    // =================================================================
    /// Applying the delta would take the balance below zero.
    #[error("GS_ERR_600: Insufficient balance on {account}: balance {balance}, delta {delta}")]
    InsufficientBalance {
        account: AccountId,
        balance: u64,
        delta: i64,
    },

    /// Applying the delta would overflow the balance counter.
    #[error("GS_ERR_601: Balance overflow on {0}")]
    BalanceOverflow(AccountId),

    /// Total balances no longer match issued minus burned units.
    #[error("GS_ERR_602: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Locked-Resource Errors (7xx)
    // =================================================================
    /// The asset is PLEDGED or IN_TRANSIT and cannot change holder.
    #[error("GS_ERR_700: {asset} is locked ({status})")]
    AssetLocked { asset: AssetId, status: AssetStatus },

    /// The asset is already committed to another open order.
    #[error("GS_ERR_701: {asset} is reserved by open order {tx_ref}")]
    AssetReserved {
        asset: AssetId,
        tx_ref: TransactionRef,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("GS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("GS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("GS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl GoldSettleError {
    /// Shorthand for a [`GoldSettleError::Validation`] error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// The failure class this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. }
            | Self::UnresolvedPrincipal(_)
            | Self::Blacklisted(_)
            | Self::NotAllowListed { .. } => ErrorKind::Authorization,
            Self::OrderNotFound(_)
            | Self::AssetNotFound(_)
            | Self::AccountNotFound(_)
            | Self::MemberNotFound(_) => ErrorKind::NotFound,
            Self::InvalidOrderState { .. }
            | Self::InvalidAssetState { .. }
            | Self::MemberNotActive { .. }
            | Self::AccountInactive(_) => ErrorKind::InvalidState,
            Self::Validation { .. } | Self::BalanceOverflow(_) => ErrorKind::Validation,
            Self::DuplicateOrder(_)
            | Self::DuplicateAccount(_)
            | Self::WarrantAlreadyUsed(_)
            | Self::DuplicateSerial { .. }
            | Self::SignatureAlreadyRecorded { .. }
            | Self::SignerAlreadySigned { .. } => ErrorKind::AlreadyUsed,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::AssetLocked { .. } | Self::AssetReserved { .. } => ErrorKind::LockedResource,
            Self::SupplyInvariantViolation { .. } | Self::Internal(_) => ErrorKind::Internal,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, GoldSettleError>;

impl From<serde_json::Error> for GoldSettleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
