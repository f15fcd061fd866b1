//! Warrant registry: blocks re-issuance against a consumed warrant.
//!
//! Each warrant id can back exactly one asset, forever. Unlike a bounded
//! replay cache, nothing is ever evicted: a warrant consumed by an asset
//! that was later burned stays consumed.

use std::collections::HashMap;

use goldsettle_types::{AssetId, GoldSettleError, Result, WarrantId};

/// Global single-use record of consumed warrants.
#[derive(Debug, Default)]
pub struct WarrantRegistry {
    used: HashMap<WarrantId, AssetId>,
}

impl WarrantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if the warrant has already backed an asset.
    ///
    /// # Errors
    /// Returns [`GoldSettleError::WarrantAlreadyUsed`].
    pub fn check_unused(&self, warrant: &WarrantId) -> Result<()> {
        if self.used.contains_key(warrant) {
            return Err(GoldSettleError::WarrantAlreadyUsed(warrant.clone()));
        }
        Ok(())
    }

    /// Consume a warrant for `asset`.
    ///
    /// # Errors
    /// Returns [`GoldSettleError::WarrantAlreadyUsed`] on reuse.
    pub fn mark_used(&mut self, warrant: WarrantId, asset: AssetId) -> Result<()> {
        self.check_unused(&warrant)?;
        self.used.insert(warrant, asset);
        Ok(())
    }

    #[must_use]
    pub fn is_used(&self, warrant: &WarrantId) -> bool {
        self.used.contains_key(warrant)
    }

    /// The asset a warrant was consumed by.
    #[must_use]
    pub fn asset_for(&self, warrant: &WarrantId) -> Option<AssetId> {
        self.used.get(warrant).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
