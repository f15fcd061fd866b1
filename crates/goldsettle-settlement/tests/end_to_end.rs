//! End-to-end integration tests across ledger, custody and settlement.
//!
//! These tests exercise the full order lifecycle:
//! Issuance (custody + ledger) -> Order (create, prepare, sign) ->
//! Settlement (atomic holder moves + balance deltas) -> Burn
//!
//! They verify that the three services agree after every step: holders,
//! balances, journal entries and the unit-supply identity.

use std::sync::Arc;

use goldsettle_custody::{AssetCustodyRegistry, SharedCustody};
use goldsettle_ledger::{BalanceLedger, SharedLedger};
use goldsettle_settlement::OrderSettlementEngine;
use goldsettle_types::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const ADMIN: &str = "0xADMIN";
const ISSUER: &str = "0xISSUER";
const CUSTODIAN: &str = "0xCUSTODIAN";
const ALICE: &str = "0xALICE";
const BOB: &str = "0xBOB";

/// Helper: a fully wired deployment with two trading members.
struct Harness {
    engine: OrderSettlementEngine,
    clock: Arc<ManualClock>,
    issued: u64,
}

impl Harness {
    fn new() -> Self {
        let authority = Arc::new(InMemoryAuthority::new());
        for member in ["GIC-A", "GIC-B", "GIC-ISSUER"] {
            authority.register_member(member, MemberStatus::Active);
        }
        authority.link_principal(ALICE, "GIC-A");
        authority.link_principal(BOB, "GIC-B");
        for trader in [ALICE, BOB] {
            authority.grant_roles(trader, &CapabilitySet::of([Capability::OrderCreator]));
        }
        authority.grant_roles(
            ADMIN,
            &CapabilitySet::of([Capability::PlatformAdmin, Capability::AdminOverride]),
        );
        authority.grant_roles(ISSUER, &CapabilitySet::of([Capability::Issuer]));
        authority.grant_roles(CUSTODIAN, &CapabilitySet::of([Capability::Custodian]));

        let clock = Arc::new(ManualClock::starting_now());
        let config = EngineConfig::from_json("{}").expect("Default config should load");
        let admin = CallerContext::new(ADMIN);

        let mut ledger = BalanceLedger::new(authority.clone(), clock.clone());
        ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-A", "GIC-A", ALICE))
            .expect("Account A should be created");
        ledger
            .create_account(&admin, CreateAccountRequest::dummy("IGAN-B", "GIC-B", BOB))
            .expect("Account B should be created");
        for principal in [&config.custody_principal, &config.settlement_principal] {
            ledger
                .set_contract_allowed(&admin, principal.clone(), true)
                .expect("Allow-listing should succeed");
        }
        let ledger = ledger.into_shared();

        let mut custody =
            AssetCustodyRegistry::new(&config, ledger.clone(), authority.clone(), clock.clone());
        custody
            .set_trusted_operator(&admin, config.settlement_principal.clone(), true)
            .expect("Operator trust should succeed");
        let custody = custody.into_shared();

        let engine = OrderSettlementEngine::new(
            config,
            custody,
            ledger,
            authority,
            clock.clone(),
        )
        .expect("Engine should start");

        Self {
            engine,
            clock,
            issued: 0,
        }
    }

    fn custody(&self) -> &SharedCustody {
        self.engine.custody()
    }

    fn ledger(&self) -> &SharedLedger {
        self.engine.ledger()
    }

    fn issue_to_alice(&mut self, n: u64) -> Vec<AssetId> {
        let mut ids = Vec::new();
        for _ in 0..n {
            self.issued += 1;
            let serial = format!("SN-{}", self.issued);
            let warrant = format!("W-{}", self.issued);
            let id = self
                .custody()
                .write()
                .unwrap()
                .issue(
                    &CallerContext::new(ISSUER),
                    IssueRequest::dummy_kilobar(ALICE, "IGAN-A", &serial, &warrant),
                )
                .expect("Issuance should succeed");
            ids.push(id);
        }
        ids
    }

    fn balance(&self, account: &str) -> u64 {
        self.ledger()
            .read()
            .unwrap()
            .balance(&AccountId::new(account))
            .unwrap()
    }

    fn holder(&self, asset: AssetId) -> Address {
        self.custody().read().unwrap().details(asset).unwrap().holder.clone()
    }

    fn status(&self, asset: AssetId) -> AssetStatus {
        self.custody().read().unwrap().details(asset).unwrap().status
    }

    fn create(&mut self, tx: &str, assets: &[AssetId]) -> TransactionRef {
        self.engine
            .create_order(
                &CallerContext::new(ALICE),
                CreateOrderRequest::dummy_transfer(tx, "GIC-A", "GIC-B", assets.to_vec()),
            )
            .expect("Order creation should succeed");
        TransactionRef::new(tx)
    }

    fn prepare(&mut self, tx: &TransactionRef, assets: &[AssetId]) -> Result<OrderStatus> {
        self.engine.prepare_order(
            &CallerContext::new(ALICE),
            tx,
            AccountId::new("IGAN-A"),
            AccountId::new("IGAN-B"),
            assets.to_vec(),
        )
    }

    fn sign_both(&mut self, tx: &TransactionRef) {
        self.engine
            .sign_order(&CallerContext::new(ALICE), tx, b"sig-alice".to_vec(), "initiator")
            .expect("Initiator should sign");
        self.engine
            .sign_order(&CallerContext::new(BOB), tx, b"sig-bob".to_vec(), "counterparty")
            .expect("Counterparty should sign");
    }

    /// Create, prepare and sign an order, leaving it PENDING_EXECUTION.
    fn ready(&mut self, tx: &str, assets: &[AssetId]) -> TransactionRef {
        let tx = self.create(tx, assets);
        self.prepare(&tx, assets).expect("Preparation should succeed");
        self.sign_both(&tx);
        tx
    }
}

// =============================================================================
// Test: TX-1, three kilobars from A to B
// =============================================================================
#[test]
fn e2e_three_asset_transfer() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(3);
    assert_eq!(h.balance("IGAN-A"), 3);
    assert_eq!(h.balance("IGAN-B"), 0);

    let tx = h.create("TX-1", &assets);
    assert_eq!(
        h.prepare(&tx, &assets).unwrap(),
        OrderStatus::PendingSignature
    );
    h.sign_both(&tx);
    assert_eq!(
        h.engine.order(&tx).unwrap().status,
        OrderStatus::PendingExecution
    );

    let outcome = h
        .engine
        .execute_order(&CallerContext::new(BOB), &tx)
        .expect("Execution should succeed");
    assert_eq!(outcome, OrderStatus::Executed);

    for id in &assets {
        assert_eq!(h.holder(*id), Address::new(BOB));
        let bound = h.custody().read().unwrap().details(*id).unwrap().bound_account.clone();
        assert_eq!(bound, AccountId::new("IGAN-A"), "Binding must not move");
    }
    assert_eq!(h.balance("IGAN-A"), 0);
    assert_eq!(h.balance("IGAN-B"), 3);

    let receipt = h.engine.receipt(&tx).expect("Receipt should exist");
    assert!(receipt.verify(), "Receipt hash must be valid");
    assert_eq!(receipt.asset_ids, assets);
    assert_eq!(receipt.sender_balance_after, 0);
    assert_eq!(receipt.receiver_balance_after, 3);
    assert_eq!(receipt.order_digest, h.engine.order(&tx).unwrap().digest_hex());

    let ledger = h.ledger().read().unwrap();
    ledger.verify_supply().unwrap();
    // 3 issuance credits, then a debit per asset.
    assert_eq!(ledger.journal(&AccountId::new("IGAN-A")).len(), 6);
    assert_eq!(ledger.journal(&AccountId::new("IGAN-B")).len(), 3);
}

// =============================================================================
// Test: the engine's principal is trusted by both stores
// =============================================================================
#[test]
fn e2e_engine_principal_is_wired_into_both_trust_tables() {
    let h = Harness::new();
    let config = h.engine.config();
    assert!(
        h.custody()
            .read()
            .unwrap()
            .is_trusted_operator(&config.settlement_principal)
    );
    let ledger = h.ledger().read().unwrap();
    assert!(ledger.is_contract_allowed(&config.settlement_principal));
    assert!(ledger.is_contract_allowed(&config.custody_principal));
    assert!(!ledger.is_contract_allowed(&Address::new(ALICE)));
}

// =============================================================================
// Test: execution is exactly-once
// =============================================================================
#[test]
fn e2e_executed_order_is_final() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(1);
    let tx = h.ready("TX-1", &assets);
    h.engine.execute_order(&CallerContext::new(ALICE), &tx).unwrap();

    let again = h
        .engine
        .execute_order(&CallerContext::new(ALICE), &tx)
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::InvalidState);
    let cancel = h
        .engine
        .cancel_order(&CallerContext::new(ALICE), &tx, "too late")
        .unwrap_err();
    assert_eq!(cancel.kind(), ErrorKind::InvalidState);
    assert_eq!(h.balance("IGAN-B"), 1);
}

// =============================================================================
// Test: duplicate counterparty signature
// =============================================================================
#[test]
fn e2e_duplicate_signature_already_used() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(1);
    let tx = h.ready("TX-1", &assets);

    let err = h
        .engine
        .sign_order(&CallerContext::new(BOB), &tx, b"again".to_vec(), "counterparty")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyUsed);
    assert_eq!(h.engine.signatures(&tx).unwrap().len(), 2);
    assert_eq!(
        h.engine.order(&tx).unwrap().status,
        OrderStatus::PendingExecution
    );
}

// =============================================================================
// Test: execute before signatures
// =============================================================================
#[test]
fn e2e_execute_in_pending_signature_is_invalid_state() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let tx = h.create("TX-1", &assets);
    h.prepare(&tx, &assets).unwrap();

    let err = h
        .engine
        .execute_order(&CallerContext::new(ALICE), &tx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(h.balance("IGAN-A"), 2);
    assert_eq!(h.holder(assets[0]), Address::new(ALICE));
}

// =============================================================================
// Test: lazy expiry
// =============================================================================
#[test]
fn e2e_expired_order_reports_expired() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(1);
    let mut request =
        CreateOrderRequest::dummy_transfer("TX-1", "GIC-A", "GIC-B", assets.clone());
    request.expires_at = Some(h.clock.now() + chrono::Duration::minutes(30));
    h.engine
        .create_order(&CallerContext::new(ALICE), request)
        .unwrap();
    let tx = TransactionRef::new("TX-1");

    h.clock.advance(chrono::Duration::minutes(31));
    let outcome = h.prepare(&tx, &assets).expect("Expiry is not an error");
    assert_eq!(outcome, OrderStatus::Expired);

    let order = h.engine.order(&tx).unwrap();
    assert_eq!(order.status, OrderStatus::Expired);
    assert!(order.sender_account.is_none());
    assert!(order.receiver_account.is_none());
    assert_eq!(h.engine.reservation_of(assets[0]), None);

    // Terminal now: further calls are state errors.
    let err = h.prepare(&tx, &assets).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn e2e_expiry_between_signing_and_execution() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let mut request =
        CreateOrderRequest::dummy_transfer("TX-1", "GIC-A", "GIC-B", assets.clone());
    request.expires_at = Some(h.clock.now() + chrono::Duration::hours(1));
    h.engine
        .create_order(&CallerContext::new(ALICE), request)
        .unwrap();
    let tx = TransactionRef::new("TX-1");
    h.prepare(&tx, &assets).unwrap();
    h.sign_both(&tx);

    h.clock.advance(chrono::Duration::hours(1));
    assert_eq!(
        h.engine.execute_order(&CallerContext::new(BOB), &tx).unwrap(),
        OrderStatus::Expired
    );
    assert_eq!(h.balance("IGAN-A"), 2);
    assert_eq!(h.balance("IGAN-B"), 0);
    assert!(h.engine.receipt(&tx).is_none());
}

// =============================================================================
// Test: warrant reuse
// =============================================================================
#[test]
fn e2e_warrant_reuse_rejected() {
    let mut h = Harness::new();
    let first = h
        .custody()
        .write()
        .unwrap()
        .issue(
            &CallerContext::new(ISSUER),
            IssueRequest::dummy_kilobar(ALICE, "IGAN-A", "SN-100", "W-SHARED"),
        )
        .unwrap();
    let err = h
        .custody()
        .write()
        .unwrap()
        .issue(
            &CallerContext::new(ISSUER),
            IssueRequest::dummy_kilobar(BOB, "IGAN-B", "SN-101", "W-SHARED"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyUsed);
    assert_eq!(h.custody().read().unwrap().asset_count(), 1);
    assert_eq!(h.holder(first), Address::new(ALICE));
    assert_eq!(h.balance("IGAN-B"), 0);
}

// =============================================================================
// Test: one locked asset blocks the whole settlement
// =============================================================================
#[test]
fn e2e_locked_asset_aborts_everything() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(4);
    let tx = h.ready("TX-1", &assets);

    h.custody()
        .write()
        .unwrap()
        .update_status(
            &CallerContext::new(CUSTODIAN),
            assets[2],
            AssetStatus::Pledged,
            "margin call",
        )
        .unwrap();
    let journal_before = h.ledger().read().unwrap().journal_len();

    let err = h
        .engine
        .execute_order(&CallerContext::new(ALICE), &tx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockedResource);

    for id in &assets {
        assert_eq!(h.holder(*id), Address::new(ALICE));
    }
    assert_eq!(h.status(assets[2]), AssetStatus::Pledged);
    assert_eq!(h.balance("IGAN-A"), 4);
    assert_eq!(h.balance("IGAN-B"), 0);
    assert_eq!(h.ledger().read().unwrap().journal_len(), journal_before);
    assert_eq!(
        h.engine.order(&tx).unwrap().status,
        OrderStatus::PendingExecution
    );

    // Releasing the pledge lets the same order settle.
    h.custody()
        .write()
        .unwrap()
        .update_status(
            &CallerContext::new(CUSTODIAN),
            assets[2],
            AssetStatus::InVault,
            "pledge released",
        )
        .unwrap();
    h.engine.execute_order(&CallerContext::new(ALICE), &tx).unwrap();
    assert_eq!(h.balance("IGAN-B"), 4);
}

#[test]
fn e2e_in_transit_asset_aborts_everything() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let tx = h.ready("TX-1", &assets);
    h.custody()
        .write()
        .unwrap()
        .update_custody(
            &CallerContext::new(CUSTODIAN),
            assets[0],
            Address::new("0xCOURIER"),
            CustodyType::Courier,
        )
        .unwrap();

    let err = h
        .engine
        .execute_order(&CallerContext::new(ALICE), &tx)
        .unwrap_err();
    assert!(matches!(err, GoldSettleError::AssetLocked { .. }));
    assert_eq!(h.holder(assets[1]), Address::new(ALICE));
    assert_eq!(h.balance("IGAN-A"), 2);
}

// =============================================================================
// Test: asset moved outside the order
// =============================================================================
#[test]
fn e2e_holder_mismatch_aborts_everything() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let tx = h.ready("TX-1", &assets);
    h.custody()
        .write()
        .unwrap()
        .transfer(&CallerContext::new(ALICE), assets[1], Address::new("0xELSEWHERE"))
        .unwrap();

    let err = h
        .engine
        .execute_order(&CallerContext::new(ALICE), &tx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.holder(assets[0]), Address::new(ALICE));
    assert_eq!(h.balance("IGAN-A"), 2);
    assert_eq!(h.balance("IGAN-B"), 0);
}

// =============================================================================
// Test: burn debits the bound account after settlement
// =============================================================================
#[test]
fn e2e_burn_debits_bound_account() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let tx = h.ready("TX-1", &assets[..1]);
    // Order for one asset only.
    assert_eq!(h.engine.order(&tx).unwrap().asset_ids.len(), 1);
    h.engine.execute_order(&CallerContext::new(ALICE), &tx).unwrap();
    assert_eq!(h.balance("IGAN-A"), 1);
    assert_eq!(h.balance("IGAN-B"), 1);

    // Bob now holds asset 0; its bound account is still IGAN-A.
    let debited = h
        .custody()
        .write()
        .unwrap()
        .burn(
            &CallerContext::new(BOB),
            assets[0],
            "sent to refinery",
            Some(&AccountId::new("IGAN-B")),
        )
        .unwrap();
    assert_eq!(debited, AccountId::new("IGAN-A"));
    assert_eq!(h.balance("IGAN-A"), 0);
    assert_eq!(h.balance("IGAN-B"), 1);
    assert_eq!(h.status(assets[0]), AssetStatus::Burned);
    h.ledger().read().unwrap().verify_supply().unwrap();

    // A burned asset cannot be settled again.
    let tx2 = h.create("TX-2", &assets[..1]);
    let err = h.prepare(&tx2, &assets[..1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// =============================================================================
// Test: randomized settlements conserve supply
// =============================================================================
#[test]
fn e2e_random_settlements_conserve_supply() {
    let mut h = Harness::new();
    let mut pool = h.issue_to_alice(20);
    let mut rng = StdRng::seed_from_u64(42);
    let mut moved = 0u64;

    for round in 0..5 {
        pool.shuffle(&mut rng);
        let take = (round % 3) + 1;
        let batch: Vec<AssetId> = pool.drain(..take).collect();
        let tx = h.ready(&format!("TX-R{round}"), &batch);
        h.engine
            .execute_order(&CallerContext::new(ALICE), &tx)
            .expect("Random settlement should succeed");
        moved += batch.len() as u64;

        assert_eq!(h.balance("IGAN-A") + h.balance("IGAN-B"), 20);
        assert_eq!(h.balance("IGAN-B"), moved);
        h.ledger().read().unwrap().verify_supply().unwrap();
        assert!(h.engine.receipt(&tx).unwrap().verify());
    }
    assert_eq!(
        h.custody().read().unwrap().assets_held_by(&Address::new(BOB)).len() as u64,
        moved
    );
    assert!(h.engine.open_orders().is_empty());
}

// =============================================================================
// Test: receipts survive audit export
// =============================================================================
#[test]
fn e2e_receipt_json_export_still_verifies() {
    let mut h = Harness::new();
    let assets = h.issue_to_alice(2);
    let tx = h.ready("TX-1", &assets);
    h.engine.execute_order(&CallerContext::new(BOB), &tx).unwrap();

    let receipt = h.engine.receipt(&tx).unwrap();
    let json = serde_json::to_string_pretty(receipt).unwrap();
    let mut exported: SettlementReceipt = serde_json::from_str(&json).unwrap();
    assert_eq!(&exported, receipt);
    assert!(exported.verify());

    exported.receiver_balance_after += 1;
    assert!(!exported.verify(), "Tampered receipt must not verify");
}
