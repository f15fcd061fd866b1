//! System-wide constants for the GoldSettle settlement engine.

/// Fineness is expressed in parts per this scale (9999 = 99.99%).
pub const FINENESS_SCALE: u32 = 10_000;

/// Heaviest single item accepted at issuance, in grams (one tonne).
pub const MAX_GROSS_WEIGHT_GRAMS: i64 = 1_000_000;

/// Units moved per asset on issuance, settlement and burn.
pub const UNITS_PER_ASSET: i64 = 1;

/// Default cap on the number of assets a single order may settle.
pub const DEFAULT_MAX_ASSETS_PER_ORDER: usize = 500;

/// Default principal address the settlement engine acts as.
pub const DEFAULT_SETTLEMENT_PRINCIPAL: &str = "goldsettle:settlement-engine";

/// Default principal address the custody registry acts as.
pub const DEFAULT_CUSTODY_PRINCIPAL: &str = "goldsettle:custody-registry";

/// Maximum length of a free-text reason (cancel, fail, status update, burn).
pub const MAX_REASON_LEN: usize = 512;

/// Role label for the initiating party's signature.
pub const ROLE_LABEL_INITIATOR: &str = "initiator";

/// Role label for the counterparty's signature.
pub const ROLE_LABEL_COUNTERPARTY: &str = "counterparty";

/// Trust-table name for programmatic balance mutation.
pub const LEDGER_CONTRACT_TABLE: &str = "ledger contract";

/// Trust-table name for settlement-driven holder changes.
pub const CUSTODY_OPERATOR_TABLE: &str = "custody operator";
