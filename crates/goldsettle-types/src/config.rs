//! Configuration for a GoldSettle deployment.

use serde::{Deserialize, Serialize};

use crate::{Address, GoldSettleError, Result, constants};

/// Settings shared by the ledger, custody registry and settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Address the settlement engine presents to the ledger and registry.
    pub settlement_principal: Address,
    /// Address the custody registry presents to the ledger.
    pub custody_principal: Address,
    /// Largest asset list a single order may carry.
    pub max_assets_per_order: usize,
    /// Reject preparation when an asset is already on another open order.
    pub enforce_asset_exclusivity: bool,
    /// Require every order to reference a valid document set.
    pub require_document_set: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_principal: Address::new(constants::DEFAULT_SETTLEMENT_PRINCIPAL),
            custody_principal: Address::new(constants::DEFAULT_CUSTODY_PRINCIPAL),
            max_assets_per_order: constants::DEFAULT_MAX_ASSETS_PER_ORDER,
            enforce_asset_exclusivity: true,
            require_document_set: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.settlement_principal.is_blank() {
            return Err(GoldSettleError::Configuration(
                "settlement_principal must not be empty".to_string(),
            ));
        }
        if self.custody_principal.is_blank() {
            return Err(GoldSettleError::Configuration(
                "custody_principal must not be empty".to_string(),
            ));
        }
        if self.settlement_principal == self.custody_principal {
            return Err(GoldSettleError::Configuration(
                "settlement and custody principals must differ".to_string(),
            ));
        }
        if self.max_assets_per_order == 0 {
            return Err(GoldSettleError::Configuration(
                "max_assets_per_order must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
