//! Balance Ledger: per-account gold unit balances.
//!
//! Two guarded mutation paths exist:
//! - **Operator path** ([`BalanceLedger::update_balance`]): callers holding
//!   PLATFORM_ADMIN or CUSTODIAN.
//! - **Contract path** ([`BalanceLedger::update_balance_from_contract`] and
//!   the batch calls): callers on an explicit allow-list that only
//!   PLATFORM_ADMIN can edit. The custody registry and settlement engine
//!   mutate balances through this path without holding admin rights.
//!
//! All mutations are atomic: a batch is staged against projected balances
//! first and applied only if every delta keeps its account non-negative.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use goldsettle_types::{
    Account, AccountId, Address, AssetId, AuthorityPort, BalanceDelta, CallerContext, Capability,
    CapabilitySet, Clock, CreateAccountRequest, EntryId, GoldSettleError, LedgerEntry, MemberId,
    MutationPath, Result, constants, ensure_not_blacklisted, require_active_member, require_role,
};

use crate::supply::SupplyConservation;

/// A ledger shared between the registry, the engine and direct callers.
pub type SharedLedger = Arc<RwLock<BalanceLedger>>;

/// Owns every account balance and the journal of their changes.
pub struct BalanceLedger {
    accounts: HashMap<AccountId, Account>,
    /// Append-only record of applied mutations.
    journal: Vec<LedgerEntry>,
    /// Trust table for the contract path: caller → granted.
    contract_allow_list: HashMap<Address, bool>,
    supply: SupplyConservation,
    authority: Arc<dyn AuthorityPort>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    #[must_use]
    pub fn new(authority: Arc<dyn AuthorityPort>, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: HashMap::new(),
            journal: Vec::new(),
            contract_allow_list: HashMap::new(),
            supply: SupplyConservation::new(),
            authority,
            clock,
        }
    }

    /// Wrap the ledger for sharing with the registry and engine.
    #[must_use]
    pub fn into_shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    // -----------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------

    /// Open a zero-balance account for an active member.
    pub fn create_account(
        &mut self,
        caller: &CallerContext,
        request: CreateAccountRequest,
    ) -> Result<Account> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::PlatformAdmin]),
            "create account",
        )?;

        if request.id.is_blank() {
            return Err(GoldSettleError::validation("account id must not be empty"));
        }
        if request.holder.is_blank() {
            return Err(GoldSettleError::validation("holder address must not be empty"));
        }
        if request.vault_site.trim().is_empty() {
            return Err(GoldSettleError::validation("vault site must not be empty"));
        }
        if request.purpose.trim().is_empty() {
            return Err(GoldSettleError::validation("purpose must not be empty"));
        }
        ensure_not_blacklisted(self.authority.as_ref(), &request.holder)?;
        require_active_member(self.authority.as_ref(), &request.member)?;
        if self.accounts.contains_key(&request.id) {
            return Err(GoldSettleError::DuplicateAccount(request.id));
        }

        let account = Account {
            id: request.id,
            member: request.member,
            holder: request.holder,
            vault_site: request.vault_site,
            purpose: request.purpose,
            balance: 0,
            active: true,
            created_at: self.clock.now(),
        };
        tracing::info!(
            account = %account.id,
            member = %account.member,
            holder = %account.holder,
            "Ledger account created"
        );
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    /// Activate or deactivate an account. Balances are untouched.
    pub fn set_account_active(
        &mut self,
        caller: &CallerContext,
        account: &AccountId,
        active: bool,
    ) -> Result<()> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::PlatformAdmin]),
            "change account activity",
        )?;
        let entry = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| GoldSettleError::AccountNotFound(account.clone()))?;
        entry.active = active;
        tracing::info!(account = %account, active, "Ledger account activity changed");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Trust table
    // -----------------------------------------------------------------

    /// Grant or withdraw contract-path access for `address`.
    pub fn set_contract_allowed(
        &mut self,
        caller: &CallerContext,
        address: Address,
        allowed: bool,
    ) -> Result<()> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::PlatformAdmin]),
            "edit ledger allow-list",
        )?;
        if address.is_blank() {
            return Err(GoldSettleError::validation("allow-list address must not be empty"));
        }
        tracing::info!(address = %address, allowed, "Ledger contract allow-list updated");
        self.contract_allow_list.insert(address, allowed);
        Ok(())
    }

    #[must_use]
    pub fn is_contract_allowed(&self, address: &Address) -> bool {
        self.contract_allow_list
            .get(address)
            .copied()
            .unwrap_or(false)
    }

    fn require_contract(&self, caller: &CallerContext) -> Result<()> {
        if self.is_contract_allowed(&caller.address) {
            Ok(())
        } else {
            tracing::warn!(
                caller = %caller.address,
                "Contract-path balance mutation rejected: caller not allow-listed"
            );
            Err(GoldSettleError::NotAllowListed {
                caller: caller.address.clone(),
                table: constants::LEDGER_CONTRACT_TABLE,
            })
        }
    }

    // -----------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------

    /// Operator path: apply one delta. Returns the new balance.
    pub fn update_balance(
        &mut self,
        caller: &CallerContext,
        account: &AccountId,
        delta: i64,
        reason: &str,
        asset_id: Option<AssetId>,
    ) -> Result<u64> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::PlatformAdmin, Capability::Custodian]),
            "update balance",
        )?;
        let batch = [BalanceDelta::new(account.clone(), delta, reason, asset_id)];
        let after = self.apply(caller, &batch, MutationPath::Operator)?;
        Ok(after[0])
    }

    /// Contract path: apply one delta. Returns the new balance.
    pub fn update_balance_from_contract(
        &mut self,
        caller: &CallerContext,
        account: &AccountId,
        delta: i64,
        reason: &str,
        asset_id: Option<AssetId>,
    ) -> Result<u64> {
        self.require_contract(caller)?;
        let batch = [BalanceDelta::new(account.clone(), delta, reason, asset_id)];
        let after = self.apply(caller, &batch, MutationPath::Contract)?;
        Ok(after[0])
    }

    /// Contract path: check that a batch would apply, without applying it.
    pub fn validate_batch(&self, caller: &CallerContext, batch: &[BalanceDelta]) -> Result<()> {
        self.require_contract(caller)?;
        self.stage(batch).map(|_| ())
    }

    /// Contract path: apply a batch all-or-nothing.
    ///
    /// Returns the balance of each delta's account right after that delta.
    pub fn commit_batch(
        &mut self,
        caller: &CallerContext,
        batch: &[BalanceDelta],
    ) -> Result<Vec<u64>> {
        self.require_contract(caller)?;
        self.apply(caller, batch, MutationPath::Contract)
    }

    /// Project every delta onto current balances. Touches nothing.
    fn stage(&self, batch: &[BalanceDelta]) -> Result<Vec<u64>> {
        let mut projected: HashMap<&AccountId, u64> = HashMap::new();
        let mut after = Vec::with_capacity(batch.len());
        for delta in batch {
            if delta.delta == 0 {
                return Err(GoldSettleError::validation("balance delta must be non-zero"));
            }
            if delta.reason.trim().is_empty() {
                return Err(GoldSettleError::validation("balance update requires a reason"));
            }
            let account = self
                .accounts
                .get(&delta.account)
                .ok_or_else(|| GoldSettleError::AccountNotFound(delta.account.clone()))?;
            let current = projected
                .get(&delta.account)
                .copied()
                .unwrap_or(account.balance);
            let next = apply_delta(&delta.account, current, delta.delta)?;
            projected.insert(&delta.account, next);
            after.push(next);
        }
        Ok(after)
    }

    fn apply(
        &mut self,
        caller: &CallerContext,
        batch: &[BalanceDelta],
        path: MutationPath,
    ) -> Result<Vec<u64>> {
        let after = self.stage(batch)?;
        let now = self.clock.now();
        for (delta, balance_after) in batch.iter().zip(after.iter().copied()) {
            if let Some(account) = self.accounts.get_mut(&delta.account) {
                account.balance = balance_after;
            }
            self.supply.record(delta.delta);
            let entry = LedgerEntry {
                id: EntryId::new(),
                account: delta.account.clone(),
                delta: delta.delta,
                balance_after,
                reason: delta.reason.clone(),
                asset_id: delta.asset_id,
                path,
                caller: caller.address.clone(),
                recorded_at: now,
            };
            tracing::debug!(
                entry = %entry.id,
                account = %entry.account,
                delta = entry.delta,
                balance = entry.balance_after,
                path = %path,
                "Ledger entry recorded"
            );
            self.journal.push(entry);
        }
        Ok(after)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    pub fn balance(&self, account: &AccountId) -> Result<u64> {
        self.details(account).map(|a| a.balance)
    }

    pub fn details(&self, account: &AccountId) -> Result<&Account> {
        self.accounts
            .get(account)
            .ok_or_else(|| GoldSettleError::AccountNotFound(account.clone()))
    }

    /// Accounts owned by a member, ordered by id.
    #[must_use]
    pub fn accounts_for_member(&self, member: &MemberId) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self
            .accounts
            .values()
            .filter(|a| a.member == *member)
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    /// Journal entries of one account, oldest first.
    #[must_use]
    pub fn journal(&self, account: &AccountId) -> Vec<&LedgerEntry> {
        self.journal
            .iter()
            .filter(|e| e.account == *account)
            .collect()
    }

    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Sum of every account balance.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.accounts.values().map(|a| a.balance).sum()
    }

    /// Check total balances against credited minus debited units.
    pub fn verify_supply(&self) -> Result<()> {
        self.supply.verify(self.total_units())
    }
}

fn apply_delta(account: &AccountId, balance: u64, delta: i64) -> Result<u64> {
    if delta >= 0 {
        balance
            .checked_add(delta.unsigned_abs())
            .ok_or_else(|| GoldSettleError::BalanceOverflow(account.clone()))
    } else {
        balance
            .checked_sub(delta.unsigned_abs())
            .ok_or_else(|| GoldSettleError::InsufficientBalance {
                account: account.clone(),
                balance,
                delta,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldsettle_types::{InMemoryAuthority, ManualClock, MemberStatus};

    const ADMIN: &str = "0xADMIN";
    const CUSTODIAN: &str = "0xCUSTODIAN";
    const ENGINE: &str = "svc:engine";

    fn setup() -> BalanceLedger {
        let auth = InMemoryAuthority::new();
        auth.register_member("GIC-A", MemberStatus::Active);
        auth.register_member("GIC-S", MemberStatus::Suspended);
        auth.grant_roles(ADMIN, &CapabilitySet::of([Capability::PlatformAdmin]));
        auth.grant_roles(CUSTODIAN, &CapabilitySet::of([Capability::Custodian]));
        let mut ledger = BalanceLedger::new(Arc::new(auth), Arc::new(ManualClock::starting_now()));
        let admin = CallerContext::new(ADMIN);
        ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-A", "GIC-A", "0xA"))
            .unwrap();
        ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-B", "GIC-A", "0xB"))
            .unwrap();
        ledger
            .set_contract_allowed(&admin, Address::new(ENGINE), true)
            .unwrap();
        ledger
    }

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    #[test]
    fn create_account_starts_at_zero() {
        let ledger = setup();
        let account = ledger.details(&id("IGAN-A")).unwrap();
        assert_eq!(account.balance, 0);
        assert!(account.active);
        assert_eq!(ledger.accounts_for_member(&MemberId::new("GIC-A")).len(), 2);
    }

    #[test]
    fn create_account_requires_platform_admin() {
        let mut ledger = setup();
        let err = ledger
            .create_account(
                &CallerContext::new(CUSTODIAN),
                CreateAccountRequest::dummy("IGAN-C", "GIC-A", "0xC"),
            )
            .unwrap_err();
        assert!(matches!(err, GoldSettleError::Unauthorized { .. }));
    }

    #[test]
    fn create_account_rejects_inactive_member_and_duplicates() {
        let mut ledger = setup();
        let admin = CallerContext::new(ADMIN);
        let err = ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-S", "GIC-S", "0xS"))
            .unwrap_err();
        assert!(matches!(err, GoldSettleError::MemberNotActive { .. }));

        let err = ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-A", "GIC-A", "0xA"))
            .unwrap_err();
        assert!(matches!(err, GoldSettleError::DuplicateAccount(_)));
    }

    #[test]
    fn operator_update_applies_delta() {
        let mut ledger = setup();
        let custodian = CallerContext::new(CUSTODIAN);
        let after = ledger
            .update_balance(&custodian, &id("IGAN-A"), 3, "opening balance", None)
            .unwrap();
        assert_eq!(after, 3);
        assert_eq!(ledger.balance(&id("IGAN-A")).unwrap(), 3);
        let journal = ledger.journal(&id("IGAN-A"));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].path, MutationPath::Operator);
        assert_eq!(journal[0].caller, Address::new(CUSTODIAN));
    }

    #[test]
    fn negative_result_rejected_and_balance_unchanged() {
        let mut ledger = setup();
        let custodian = CallerContext::new(CUSTODIAN);
        ledger
            .update_balance(&custodian, &id("IGAN-A"), 1, "opening", None)
            .unwrap();
        let err = ledger
            .update_balance(&custodian, &id("IGAN-A"), -2, "overdraw", None)
            .unwrap_err();
        assert!(matches!(
            err,
            GoldSettleError::InsufficientBalance {
                balance: 1,
                delta: -2,
                ..
            }
        ));
        assert_eq!(ledger.balance(&id("IGAN-A")).unwrap(), 1);
        assert_eq!(ledger.journal_len(), 1);
    }

    #[test]
    fn operator_path_requires_admin_or_custodian() {
        let mut ledger = setup();
        // The account's own holder, and an allow-listed service, are not operators.
        for caller in ["0xA", ENGINE] {
            let err = ledger
                .update_balance(&CallerContext::new(caller), &id("IGAN-A"), 5, "self credit", None)
                .unwrap_err();
            assert!(matches!(err, GoldSettleError::Unauthorized { .. }), "{caller}");
        }
        assert_eq!(ledger.balance(&id("IGAN-A")).unwrap(), 0);
        assert_eq!(ledger.journal_len(), 0);

        let after = ledger
            .update_balance(&CallerContext::new(ADMIN), &id("IGAN-A"), 5, "opening", None)
            .unwrap();
        assert_eq!(after, 5);
    }

    #[test]
    fn contract_path_requires_allow_list() {
        let mut ledger = setup();
        let err = ledger
            .update_balance_from_contract(
                &CallerContext::new("svc:rogue"),
                &id("IGAN-A"),
                1,
                "mint",
                Some(AssetId(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GoldSettleError::NotAllowListed { .. }));

        // Admin rights do not open the contract path.
        let err = ledger
            .update_balance_from_contract(&CallerContext::new(ADMIN), &id("IGAN-A"), 1, "mint", None)
            .unwrap_err();
        assert!(matches!(err, GoldSettleError::NotAllowListed { .. }));

        let after = ledger
            .update_balance_from_contract(
                &CallerContext::new(ENGINE),
                &id("IGAN-A"),
                1,
                "mint",
                Some(AssetId(1)),
            )
            .unwrap();
        assert_eq!(after, 1);
    }

    #[test]
    fn revoked_contract_loses_access() {
        let mut ledger = setup();
        ledger
            .set_contract_allowed(&CallerContext::new(ADMIN), Address::new(ENGINE), false)
            .unwrap();
        assert!(!ledger.is_contract_allowed(&Address::new(ENGINE)));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut ledger = setup();
        let engine = CallerContext::new(ENGINE);
        ledger
            .update_balance_from_contract(&engine, &id("IGAN-A"), 1, "mint", None)
            .unwrap();
        let batch = vec![
            BalanceDelta::new(id("IGAN-B"), 2, "credit", None),
            BalanceDelta::new(id("IGAN-A"), -2, "debit", None),
        ];
        assert!(ledger.validate_batch(&engine, &batch).is_err());
        let err = ledger.commit_batch(&engine, &batch).unwrap_err();
        assert!(matches!(err, GoldSettleError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance(&id("IGAN-A")).unwrap(), 1);
        assert_eq!(ledger.balance(&id("IGAN-B")).unwrap(), 0);
    }

    #[test]
    fn batch_projects_repeated_accounts() {
        let mut ledger = setup();
        let engine = CallerContext::new(ENGINE);
        let batch = vec![
            BalanceDelta::new(id("IGAN-A"), 2, "credit", None),
            BalanceDelta::new(id("IGAN-A"), -1, "debit", None),
            BalanceDelta::new(id("IGAN-B"), 1, "credit", None),
        ];
        let after = ledger.commit_batch(&engine, &batch).unwrap();
        assert_eq!(after, vec![2, 1, 1]);
        assert_eq!(ledger.total_units(), 2);
        ledger.verify_supply().unwrap();
    }

    #[test]
    fn unknown_account_not_found() {
        let ledger = setup();
        assert!(matches!(
            ledger.balance(&id("IGAN-?")).unwrap_err(),
            GoldSettleError::AccountNotFound(_)
        ));
        assert!(matches!(
            ledger.details(&id("IGAN-?")).unwrap_err(),
            GoldSettleError::AccountNotFound(_)
        ));
    }

    #[test]
    fn zero_delta_and_blank_reason_rejected() {
        let mut ledger = setup();
        let custodian = CallerContext::new(CUSTODIAN);
        assert!(matches!(
            ledger
                .update_balance(&custodian, &id("IGAN-A"), 0, "noop", None)
                .unwrap_err(),
            GoldSettleError::Validation { .. }
        ));
        assert!(matches!(
            ledger
                .update_balance(&custodian, &id("IGAN-A"), 1, "  ", None)
                .unwrap_err(),
            GoldSettleError::Validation { .. }
        ));
    }

    #[test]
    fn deactivation_is_admin_only() {
        let mut ledger = setup();
        assert!(
            ledger
                .set_account_active(&CallerContext::new(CUSTODIAN), &id("IGAN-A"), false)
                .is_err()
        );
        ledger
            .set_account_active(&CallerContext::new(ADMIN), &id("IGAN-A"), false)
            .unwrap();
        assert!(!ledger.details(&id("IGAN-A")).unwrap().active);
    }

    #[test]
    fn journal_exports_as_json() {
        let mut ledger = setup();
        ledger
            .update_balance_from_contract(
                &CallerContext::new(ENGINE),
                &id("IGAN-A"),
                2,
                "vault intake",
                Some(AssetId(9)),
            )
            .unwrap();
        let entries: Vec<_> = ledger.journal(&id("IGAN-A")).into_iter().cloned().collect();
        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["account"], "IGAN-A");
        assert_eq!(json[0]["delta"], 2);
        assert_eq!(json[0]["balance_after"], 2);
        assert_eq!(json[0]["asset_id"], 9);
        assert_eq!(json[0]["path"], "Contract");
        assert_eq!(json[0]["caller"], ENGINE);
    }
}
