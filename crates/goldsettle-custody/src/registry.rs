//! Asset Custody Registry: issuance, locks, holder moves and burn of gold assets.
//!
//! The registry is the sole mutator of [`GoldAsset`] records. Issuance and
//! burn also move one unit on the ledger; both happen through the ledger's
//! contract path under the registry's own principal, and the asset record
//! is only written once the ledger mutation has succeeded.
//!
//! Holder changes are refused while an asset is locked (PLEDGED or
//! IN_TRANSIT), including administrative force transfers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use goldsettle_types::{
    AccountId, Address, AssetId, AssetStatus, AuthorityPort, CallerContext, Capability,
    CapabilitySet, Clock, CustodyEvent, CustodyEventId, CustodyType, EngineConfig,
    GoldAsset, GoldSettleError, IssueRequest, Result, WarrantId, constants,
    ensure_not_blacklisted, require_active_member, require_role, write_lock,
};
use goldsettle_ledger::SharedLedger;
use rust_decimal::Decimal;

use crate::warrant::WarrantRegistry;

/// A registry shared between direct callers and the settlement engine.
pub type SharedCustody = Arc<RwLock<AssetCustodyRegistry>>;

/// One holder change inside a settlement batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderMove {
    pub asset_id: AssetId,
    pub from: Address,
    pub to: Address,
}

impl HolderMove {
    /// The same move in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            asset_id: self.asset_id,
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

/// Owns every gold asset record.
pub struct AssetCustodyRegistry {
    assets: BTreeMap<AssetId, GoldAsset>,
    next_id: AssetId,
    warrants: WarrantRegistry,
    /// (issuer, serial) pairs already issued.
    serials: HashSet<(String, String)>,
    custody_log: Vec<CustodyEvent>,
    /// Trust table for settlement-driven holder changes: caller → granted.
    trusted_operators: HashMap<Address, bool>,
    /// Identity the registry presents on the ledger's contract path.
    principal: CallerContext,
    ledger: SharedLedger,
    authority: Arc<dyn AuthorityPort>,
    clock: Arc<dyn Clock>,
}

impl AssetCustodyRegistry {
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        ledger: SharedLedger,
        authority: Arc<dyn AuthorityPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            assets: BTreeMap::new(),
            next_id: AssetId(1),
            warrants: WarrantRegistry::new(),
            serials: HashSet::new(),
            custody_log: Vec::new(),
            trusted_operators: HashMap::new(),
            principal: CallerContext::new(config.custody_principal.clone()),
            ledger,
            authority,
            clock,
        }
    }

    #[must_use]
    pub fn into_shared(self) -> SharedCustody {
        Arc::new(RwLock::new(self))
    }

    /// Address the registry uses on the ledger's contract path.
    #[must_use]
    pub fn principal(&self) -> &Address {
        &self.principal.address
    }

    // -----------------------------------------------------------------
    // Issuance
    // -----------------------------------------------------------------

    /// Mint a new asset bound to `request.bound_account` and credit that
    /// account one unit.
    pub fn issue(&mut self, caller: &CallerContext, request: IssueRequest) -> Result<AssetId> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::Issuer]),
            "issue asset",
        )?;
        validate_issue(&request)?;
        self.warrants.check_unused(&request.warrant_id)?;
        let serial_key = serial_key(&request.issuer, &request.serial_number);
        if self.serials.contains(&serial_key) {
            return Err(GoldSettleError::DuplicateSerial {
                serial: request.serial_number,
                issuer: request.issuer,
            });
        }
        require_active_member(self.authority.as_ref(), &request.issuing_member)?;
        ensure_not_blacklisted(self.authority.as_ref(), &request.holder)?;

        let id = self.next_id;
        let asset = GoldAsset::from_request(id, request, self.clock.now())?;
        {
            let mut ledger = write_lock(&self.ledger, "ledger")?;
            if !ledger.details(&asset.bound_account)?.active {
                return Err(GoldSettleError::AccountInactive(asset.bound_account.clone()));
            }
            ledger.update_balance_from_contract(
                &self.principal,
                &asset.bound_account,
                constants::UNITS_PER_ASSET,
                &format!("issue {id}"),
                Some(id),
            )?;
        }

        self.warrants.mark_used(asset.warrant_id.clone(), id)?;
        self.serials.insert(serial_key);
        tracing::info!(
            asset = %id,
            serial = %asset.serial_number,
            warrant = %asset.warrant_id,
            account = %asset.bound_account,
            fine_weight = %asset.fine_weight,
            "Gold asset issued"
        );
        self.assets.insert(id, asset);
        self.next_id = id.next();
        Ok(id)
    }

    // -----------------------------------------------------------------
    // Status & custody
    // -----------------------------------------------------------------

    /// Change an asset's status. BURNED is only reachable through burn.
    pub fn update_status(
        &mut self,
        caller: &CallerContext,
        asset_id: AssetId,
        status: AssetStatus,
        reason: &str,
    ) -> Result<()> {
        require_reason(reason)?;
        let asset = self.asset(asset_id)?;
        ensure_not_burned(asset, "update status")?;
        self.require_holder_or(
            caller,
            asset,
            &CapabilitySet::of([Capability::Custodian, Capability::Operator]),
            "update asset status",
        )?;
        if !asset.status.can_update_to(status) {
            return Err(GoldSettleError::InvalidAssetState {
                asset: asset_id,
                current: asset.status,
                operation: "update status",
            });
        }

        let now = self.clock.now();
        let asset = self.asset_mut(asset_id)?;
        let previous = asset.status;
        asset.status = status;
        asset.updated_at = now;
        tracing::info!(
            asset = %asset_id,
            from = %previous,
            to = %status,
            reason,
            "Asset status updated"
        );
        Ok(())
    }

    /// Hand one asset to a new physical custodian. Forces IN_TRANSIT.
    pub fn update_custody(
        &mut self,
        caller: &CallerContext,
        asset_id: AssetId,
        custodian: Address,
        custody_type: CustodyType,
    ) -> Result<CustodyEventId> {
        let ids = self.update_custody_batch(caller, &[asset_id], custodian, custody_type)?;
        Ok(ids[0])
    }

    /// Hand several assets to one custodian, all or none.
    pub fn update_custody_batch(
        &mut self,
        caller: &CallerContext,
        asset_ids: &[AssetId],
        custodian: Address,
        custody_type: CustodyType,
    ) -> Result<Vec<CustodyEventId>> {
        if asset_ids.is_empty() {
            return Err(GoldSettleError::validation("custody batch must not be empty"));
        }
        ensure_unique(asset_ids)?;
        if custodian.is_blank() {
            return Err(GoldSettleError::validation("custodian must not be empty"));
        }
        ensure_not_blacklisted(self.authority.as_ref(), &custodian)?;
        let roles = CapabilitySet::of([Capability::Custodian, Capability::Operator]);
        for id in asset_ids {
            let asset = self.asset(*id)?;
            ensure_not_burned(asset, "hand over custody")?;
            if asset.status == AssetStatus::Pledged {
                return Err(GoldSettleError::AssetLocked {
                    asset: *id,
                    status: asset.status,
                });
            }
            self.require_holder_or(caller, asset, &roles, "hand over custody")?;
        }

        let now = self.clock.now();
        let mut events = Vec::with_capacity(asset_ids.len());
        for id in asset_ids {
            let asset = self.asset_mut(*id)?;
            let event = CustodyEvent {
                id: CustodyEventId::new(),
                asset_id: *id,
                from_custodian: asset.custodian.replace(custodian.clone()),
                to_custodian: custodian.clone(),
                custody_type,
                recorded_by: caller.address.clone(),
                recorded_at: now,
            };
            asset.status = AssetStatus::InTransit;
            asset.updated_at = now;
            tracing::info!(
                asset = %id,
                custodian = %custodian,
                custody_type = %custody_type,
                "Custody handoff recorded, asset in transit"
            );
            events.push(event.id);
            self.custody_log.push(event);
        }
        Ok(events)
    }

    // -----------------------------------------------------------------
    // Holder changes
    // -----------------------------------------------------------------

    /// Move an asset to a new holder. The bound account never changes.
    pub fn transfer(&mut self, caller: &CallerContext, asset_id: AssetId, to: Address) -> Result<()> {
        ensure_not_blacklisted(self.authority.as_ref(), &caller.address)?;
        let asset = self.asset(asset_id)?;
        ensure_not_burned(asset, "transfer")?;
        if asset.holder != caller.address && !self.is_trusted_operator(&caller.address) {
            return Err(GoldSettleError::Unauthorized {
                caller: caller.address.clone(),
                action: "transfer asset",
            });
        }
        let from = asset.holder.clone();
        let moves = [HolderMove { asset_id, from, to }];
        self.check_moves(&moves)?;
        self.apply_moves(&moves, "Asset transferred");
        Ok(())
    }

    /// Administrative transfer that skips the holder identity check.
    /// Still refused while the asset is locked.
    pub fn admin_force_transfer(
        &mut self,
        caller: &CallerContext,
        asset_id: AssetId,
        from: Address,
        to: Address,
        reason: &str,
    ) -> Result<()> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::AdminOverride]),
            "force transfer",
        )?;
        require_reason(reason)?;
        let moves = [HolderMove { asset_id, from, to }];
        self.check_moves(&moves)?;
        tracing::warn!(
            asset = %asset_id,
            admin = %caller.address,
            reason,
            "Administrative force transfer"
        );
        self.apply_moves(&moves, "Asset force-transferred");
        Ok(())
    }

    /// Destroy an asset and debit its bound account one unit.
    ///
    /// `claimed_account` is informational only: the debit always hits the
    /// account bound at issuance.
    pub fn burn(
        &mut self,
        caller: &CallerContext,
        asset_id: AssetId,
        reason: &str,
        claimed_account: Option<&AccountId>,
    ) -> Result<AccountId> {
        require_reason(reason)?;
        let asset = self.asset(asset_id)?;
        ensure_not_burned(asset, "burn")?;
        self.require_holder_or(
            caller,
            asset,
            &CapabilitySet::of([Capability::Custodian]),
            "burn asset",
        )?;
        if asset.is_locked() {
            return Err(GoldSettleError::AssetLocked {
                asset: asset_id,
                status: asset.status,
            });
        }
        let bound = asset.bound_account.clone();
        if let Some(claimed) = claimed_account.filter(|claimed| **claimed != bound) {
            tracing::warn!(
                asset = %asset_id,
                claimed = %claimed,
                bound = %bound,
                "Burn account argument ignored; debiting bound account"
            );
        }

        write_lock(&self.ledger, "ledger")?.update_balance_from_contract(
            &self.principal,
            &bound,
            -constants::UNITS_PER_ASSET,
            &format!("burn {asset_id}: {reason}"),
            Some(asset_id),
        )?;

        let now = self.clock.now();
        let asset = self.asset_mut(asset_id)?;
        asset.status = AssetStatus::Burned;
        asset.updated_at = now;
        tracing::info!(asset = %asset_id, account = %bound, reason, "Gold asset burned");
        Ok(bound)
    }

    // -----------------------------------------------------------------
    // Settlement staging
    // -----------------------------------------------------------------

    /// Grant or withdraw settlement-driven transfer rights for `address`.
    pub fn set_trusted_operator(
        &mut self,
        caller: &CallerContext,
        address: Address,
        allowed: bool,
    ) -> Result<()> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::PlatformAdmin]),
            "edit custody operator table",
        )?;
        if address.is_blank() {
            return Err(GoldSettleError::validation("operator address must not be empty"));
        }
        tracing::info!(address = %address, allowed, "Custody operator table updated");
        self.trusted_operators.insert(address, allowed);
        Ok(())
    }

    #[must_use]
    pub fn is_trusted_operator(&self, address: &Address) -> bool {
        self.trusted_operators.get(address).copied().unwrap_or(false)
    }

    /// Check that every move in a settlement batch would apply.
    pub fn validate_moves(&self, caller: &CallerContext, moves: &[HolderMove]) -> Result<()> {
        self.require_operator(caller)?;
        self.check_moves(moves)
    }

    /// Apply a settlement batch of holder moves, all or none.
    pub fn commit_moves(&mut self, caller: &CallerContext, moves: &[HolderMove]) -> Result<()> {
        self.require_operator(caller)?;
        self.check_moves(moves)?;
        self.apply_moves(moves, "Asset moved by settlement");
        Ok(())
    }

    fn require_operator(&self, caller: &CallerContext) -> Result<()> {
        if self.is_trusted_operator(&caller.address) {
            Ok(())
        } else {
            Err(GoldSettleError::NotAllowListed {
                caller: caller.address.clone(),
                table: constants::CUSTODY_OPERATOR_TABLE,
            })
        }
    }

    fn check_moves(&self, moves: &[HolderMove]) -> Result<()> {
        let ids: Vec<AssetId> = moves.iter().map(|m| m.asset_id).collect();
        ensure_unique(&ids)?;
        for mv in moves {
            let asset = self.asset(mv.asset_id)?;
            ensure_not_burned(asset, "transfer")?;
            if asset.is_locked() {
                tracing::warn!(
                    asset = %mv.asset_id,
                    status = %asset.status,
                    "Holder change blocked: asset locked"
                );
                return Err(GoldSettleError::AssetLocked {
                    asset: mv.asset_id,
                    status: asset.status,
                });
            }
            if asset.holder != mv.from {
                return Err(GoldSettleError::validation(format!(
                    "{} is held by {}, not {}",
                    mv.asset_id, asset.holder, mv.from
                )));
            }
            if mv.to.is_blank() {
                return Err(GoldSettleError::validation("recipient must not be empty"));
            }
            if mv.to == mv.from {
                return Err(GoldSettleError::validation(format!(
                    "{} is already held by {}",
                    mv.asset_id, mv.to
                )));
            }
            ensure_not_blacklisted(self.authority.as_ref(), &mv.to)?;
        }
        Ok(())
    }

    /// Apply pre-checked moves. Only called after [`Self::check_moves`].
    fn apply_moves(&mut self, moves: &[HolderMove], message: &'static str) {
        let now = self.clock.now();
        for mv in moves {
            if let Some(asset) = self.assets.get_mut(&mv.asset_id) {
                asset.holder = mv.to.clone();
                asset.updated_at = now;
                tracing::info!(asset = %mv.asset_id, from = %mv.from, to = %mv.to, "{message}");
            }
        }
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    pub fn is_locked(&self, asset_id: AssetId) -> Result<bool> {
        self.asset(asset_id).map(GoldAsset::is_locked)
    }

    pub fn details(&self, asset_id: AssetId) -> Result<&GoldAsset> {
        self.asset(asset_id)
    }

    /// Whether `hash` matches the certificate recorded at issuance.
    pub fn verify_certificate(&self, asset_id: AssetId, hash: &str) -> Result<bool> {
        self.asset(asset_id)
            .map(|asset| asset.certificate_hash.eq_ignore_ascii_case(hash.trim()))
    }

    /// Non-burned assets currently held by `holder`, by id.
    #[must_use]
    pub fn assets_held_by(&self, holder: &Address) -> Vec<&GoldAsset> {
        self.assets
            .values()
            .filter(|a| a.holder == *holder && !a.is_burned())
            .collect()
    }

    /// Custody handoffs of one asset, oldest first.
    #[must_use]
    pub fn custody_history(&self, asset_id: AssetId) -> Vec<&CustodyEvent> {
        self.custody_log
            .iter()
            .filter(|e| e.asset_id == asset_id)
            .collect()
    }

    #[must_use]
    pub fn is_warrant_used(&self, warrant: &WarrantId) -> bool {
        self.warrants.is_used(warrant)
    }

    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn asset(&self, asset_id: AssetId) -> Result<&GoldAsset> {
        self.assets
            .get(&asset_id)
            .ok_or(GoldSettleError::AssetNotFound(asset_id))
    }

    fn asset_mut(&mut self, asset_id: AssetId) -> Result<&mut GoldAsset> {
        self.assets
            .get_mut(&asset_id)
            .ok_or(GoldSettleError::AssetNotFound(asset_id))
    }

    fn require_holder_or(
        &self,
        caller: &CallerContext,
        asset: &GoldAsset,
        roles: &CapabilitySet,
        action: &'static str,
    ) -> Result<()> {
        ensure_not_blacklisted(self.authority.as_ref(), &caller.address)?;
        if asset.holder == caller.address
            || self.authority.is_member_in_role(&caller.address, roles)
        {
            Ok(())
        } else {
            Err(GoldSettleError::Unauthorized {
                caller: caller.address.clone(),
                action,
            })
        }
    }
}

fn validate_issue(request: &IssueRequest) -> Result<()> {
    if request.holder.is_blank() {
        return Err(GoldSettleError::validation("holder must not be empty"));
    }
    if request.bound_account.is_blank() {
        return Err(GoldSettleError::validation("bound account must not be empty"));
    }
    if request.serial_number.trim().is_empty() {
        return Err(GoldSettleError::validation("serial number must not be empty"));
    }
    if request.issuer.trim().is_empty() {
        return Err(GoldSettleError::validation("issuer must not be empty"));
    }
    if request.product_type.trim().is_empty() {
        return Err(GoldSettleError::validation("product type must not be empty"));
    }
    if request.certificate_hash.trim().is_empty() {
        return Err(GoldSettleError::validation("certificate hash must not be empty"));
    }
    if request.warrant_id.is_blank() {
        return Err(GoldSettleError::validation("warrant id must not be empty"));
    }
    if request.gross_weight.is_zero() || request.gross_weight.is_sign_negative() {
        return Err(GoldSettleError::validation("gross weight must be positive"));
    }
    if request.gross_weight > Decimal::from(constants::MAX_GROSS_WEIGHT_GRAMS) {
        return Err(GoldSettleError::validation(format!(
            "gross weight {} g exceeds {} g",
            request.gross_weight,
            constants::MAX_GROSS_WEIGHT_GRAMS
        )));
    }
    if request.fineness == 0 || request.fineness > constants::FINENESS_SCALE {
        return Err(GoldSettleError::validation(format!(
            "fineness {} outside 1..={}",
            request.fineness,
            constants::FINENESS_SCALE
        )));
    }
    Ok(())
}

fn serial_key(issuer: &str, serial: &str) -> (String, String) {
    (
        issuer.trim().to_ascii_uppercase(),
        serial.trim().to_ascii_uppercase(),
    )
}

fn require_reason(reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(GoldSettleError::validation("a reason is required"));
    }
    if reason.len() > constants::MAX_REASON_LEN {
        return Err(GoldSettleError::validation("reason too long"));
    }
    Ok(())
}

fn ensure_not_burned(asset: &GoldAsset, operation: &'static str) -> Result<()> {
    if asset.is_burned() {
        return Err(GoldSettleError::InvalidAssetState {
            asset: asset.id,
            current: asset.status,
            operation,
        });
    }
    Ok(())
}

fn ensure_unique(ids: &[AssetId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(GoldSettleError::validation(format!("{id} listed twice")));
        }
    }
    Ok(())
}
