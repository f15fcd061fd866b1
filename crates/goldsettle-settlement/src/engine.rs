//! Order Settlement Engine.
//!
//! ## Lifecycle
//!
//! ```text
//! create ─▶ PENDING_PREPARATION ─prepare─▶ PENDING_SIGNATURE
//!             ─sign(initiator)─▶ PENDING_COUNTERPARTY ─sign(counterparty)─▶
//!             PENDING_EXECUTION ─execute─▶ EXECUTED
//! ```
//!
//! One-signer orders skip PENDING_COUNTERPARTY. Any non-terminal order may
//! be cancelled, failed, or expired.
//!
//! ## Expiry
//!
//! Expiry is lazy. Every mutating call on an existing order first checks
//! `expires_at`; a due order is moved to EXPIRED and the call returns
//! `Ok(OrderStatus::Expired)` without authorizing or performing anything
//! else.
//!
//! ## Atomic execution
//!
//! Execution takes the custody write lock, then the ledger write lock,
//! and commits a [`SettlementBatch`] while holding both. The order record
//! only changes once the batch is committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use goldsettle_custody::SharedCustody;
use goldsettle_ledger::SharedLedger;
use goldsettle_types::{
    AccountId, AssetId, AuthorityPort, CallerContext, Capability, CapabilitySet, Clock,
    CreateOrderRequest, DocumentRegistryPort, EngineConfig, GoldSettleError, MemberId,
    OrderSignature, OrderStatus, ReceiptId, Result, SettlementReceipt, SignerRole,
    TransactionOrder, TransactionRef, constants, ensure_not_blacklisted, read_lock,
    require_active_member, require_role, resolve_member, write_lock,
};

use crate::batch::SettlementBatch;

/// Owns transaction orders and drives them through settlement.
pub struct OrderSettlementEngine {
    orders: HashMap<TransactionRef, TransactionOrder>,
    /// Assets committed to an open order: asset → order.
    reservations: HashMap<AssetId, TransactionRef>,
    receipts: HashMap<TransactionRef, SettlementReceipt>,
    /// Identity the engine presents to the registry and ledger.
    principal: CallerContext,
    config: EngineConfig,
    custody: SharedCustody,
    ledger: SharedLedger,
    authority: Arc<dyn AuthorityPort>,
    documents: Option<Arc<dyn DocumentRegistryPort>>,
    clock: Arc<dyn Clock>,
}

impl OrderSettlementEngine {
    /// Build an engine over shared registry and ledger handles.
    ///
    /// # Errors
    /// Returns [`GoldSettleError::Configuration`] if `config` is invalid.
    pub fn new(
        config: EngineConfig,
        custody: SharedCustody,
        ledger: SharedLedger,
        authority: Arc<dyn AuthorityPort>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            orders: HashMap::new(),
            reservations: HashMap::new(),
            receipts: HashMap::new(),
            principal: CallerContext::new(config.settlement_principal.clone()),
            config,
            custody,
            ledger,
            authority,
            documents: None,
            clock,
        })
    }

    /// Wire a document registry for supporting-document checks.
    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentRegistryPort>) -> Self {
        self.documents = Some(documents);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn custody(&self) -> &SharedCustody {
        &self.custody
    }

    #[must_use]
    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    // -----------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------

    /// Record a new order in PENDING_PREPARATION.
    pub fn create_order(
        &mut self,
        caller: &CallerContext,
        request: CreateOrderRequest,
    ) -> Result<OrderStatus> {
        require_role(
            self.authority.as_ref(),
            caller,
            &CapabilitySet::of([Capability::OrderCreator]),
            "create order",
        )?;
        if !self.is_admin(caller) {
            let member = resolve_member(self.authority.as_ref(), caller)?;
            if member != request.initiator {
                return Err(GoldSettleError::Unauthorized {
                    caller: caller.address.clone(),
                    action: "create order for another initiator",
                });
            }
        }
        if request.tx_ref.is_blank() {
            return Err(GoldSettleError::validation("transaction ref must not be empty"));
        }
        if self.orders.contains_key(&request.tx_ref) {
            return Err(GoldSettleError::DuplicateOrder(request.tx_ref));
        }
        let now = self.clock.now();
        self.validate_request(&request, now)?;
        require_active_member(self.authority.as_ref(), &request.initiator)?;
        require_active_member(self.authority.as_ref(), &request.counterparty)?;
        self.check_documents(request.document_set.as_deref())?;

        let order = TransactionOrder::from_request(request, caller.address.clone(), now);
        tracing::info!(
            tx_ref = %order.tx_ref,
            order_type = %order.order_type,
            initiator = %order.initiator,
            counterparty = %order.counterparty,
            quantity = order.requested.quantity,
            "Order created"
        );
        let status = order.status;
        self.orders.insert(order.tx_ref.clone(), order);
        Ok(status)
    }

    fn validate_request(&self, request: &CreateOrderRequest, now: DateTime<Utc>) -> Result<()> {
        if request.initiator == request.counterparty {
            return Err(GoldSettleError::validation(
                "initiator and counterparty must differ",
            ));
        }
        if request.requested.product_type.trim().is_empty() {
            return Err(GoldSettleError::validation("requested product type must not be empty"));
        }
        if request.requested.quantity == 0 {
            return Err(GoldSettleError::validation("requested quantity must be positive"));
        }
        if request.asset_ids.len() > self.config.max_assets_per_order {
            return Err(GoldSettleError::validation(format!(
                "at most {} assets per order",
                self.config.max_assets_per_order
            )));
        }
        ensure_unique(&request.asset_ids)?;
        if request.valuation.unit_price.is_sign_negative()
            || request.valuation.total_value.is_sign_negative()
        {
            return Err(GoldSettleError::validation("valuation must not be negative"));
        }
        if let Some(expiry) = request.expires_at {
            if expiry <= now {
                return Err(GoldSettleError::validation("expiry must be in the future"));
            }
        }
        Ok(())
    }

    fn check_documents(&self, document_set: Option<&str>) -> Result<()> {
        let Some(set_id) = document_set else {
            if self.config.require_document_set {
                return Err(GoldSettleError::validation("a document set is required"));
            }
            return Ok(());
        };
        if set_id.trim().is_empty() {
            return Err(GoldSettleError::validation("document set id must not be empty"));
        }
        match &self.documents {
            Some(documents) if !documents.document_set_exists_and_valid(set_id) => Err(
                GoldSettleError::validation(format!("document set {set_id} is not valid")),
            ),
            Some(_) => Ok(()),
            None if self.config.require_document_set => Err(GoldSettleError::Configuration(
                "document sets are required but no document registry is wired".to_string(),
            )),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------
    // Prepare
    // -----------------------------------------------------------------

    /// Fix the accounts and assets an order settles.
    pub fn prepare_order(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
        sender: AccountId,
        receiver: AccountId,
        asset_ids: Vec<AssetId>,
    ) -> Result<OrderStatus> {
        if let Some(expired) = self.expire_if_due(tx_ref)? {
            return Ok(expired);
        }
        let order = self.order(tx_ref)?;
        self.require_participant(caller, order, "prepare order")?;
        require_status(order, OrderStatus::PendingPreparation, "prepare")?;

        if asset_ids.is_empty() {
            return Err(GoldSettleError::validation("asset list must not be empty"));
        }
        if asset_ids.len() > self.config.max_assets_per_order {
            return Err(GoldSettleError::validation(format!(
                "at most {} assets per order",
                self.config.max_assets_per_order
            )));
        }
        ensure_unique(&asset_ids)?;
        if u32::try_from(asset_ids.len()).ok() != Some(order.requested.quantity) {
            return Err(GoldSettleError::validation(format!(
                "{} assets supplied, {} requested",
                asset_ids.len(),
                order.requested.quantity
            )));
        }
        if sender == receiver {
            return Err(GoldSettleError::validation(
                "sender and receiver accounts must differ",
            ));
        }

        {
            let custody = read_lock(&self.custody, "custody")?;
            for id in &asset_ids {
                let asset = custody.details(*id)?;
                if asset.is_burned() {
                    return Err(GoldSettleError::InvalidAssetState {
                        asset: *id,
                        current: asset.status,
                        operation: "prepare order",
                    });
                }
            }
            let ledger = read_lock(&self.ledger, "ledger")?;
            for account in [&sender, &receiver] {
                if !ledger.details(account)?.active {
                    return Err(GoldSettleError::AccountInactive(account.clone()));
                }
            }
        }
        if self.config.enforce_asset_exclusivity {
            for id in &asset_ids {
                if let Some(holder) = self.reservations.get(id).filter(|r| *r != tx_ref) {
                    return Err(GoldSettleError::AssetReserved {
                        asset: *id,
                        tx_ref: holder.clone(),
                    });
                }
            }
        }

        let now = self.clock.now();
        let order = self.order_mut(tx_ref)?;
        order.transition(OrderStatus::PendingSignature, "prepare", now)?;
        order.sender_account = Some(sender);
        order.receiver_account = Some(receiver);
        order.asset_ids = asset_ids;
        tracing::info!(
            tx_ref = %tx_ref,
            assets = order.asset_ids.len(),
            digest = %order.digest_hex(),
            "Order prepared"
        );
        let reserved = order.asset_ids.clone();
        if self.config.enforce_asset_exclusivity {
            for id in reserved {
                self.reservations.insert(id, tx_ref.clone());
            }
        }
        Ok(OrderStatus::PendingSignature)
    }

    // -----------------------------------------------------------------
    // Sign
    // -----------------------------------------------------------------

    /// Record a party's signature under `role_label`.
    pub fn sign_order(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
        signature: Vec<u8>,
        role_label: &str,
    ) -> Result<OrderStatus> {
        if let Some(expired) = self.expire_if_due(tx_ref)? {
            return Ok(expired);
        }
        ensure_not_blacklisted(self.authority.as_ref(), &caller.address)?;
        let member = resolve_member(self.authority.as_ref(), caller)?;
        let role: SignerRole = role_label.parse()?;
        let order = self.order(tx_ref)?;

        if *order.party_for(role) != member {
            return Err(GoldSettleError::Unauthorized {
                caller: caller.address.clone(),
                action: "sign for this role",
            });
        }
        if !order.signature_policy.requires(role) {
            return Err(GoldSettleError::validation(format!(
                "order {tx_ref} does not take a {role} signature"
            )));
        }
        if order.signature_for(role).is_some() {
            return Err(GoldSettleError::SignatureAlreadyRecorded {
                tx_ref: tx_ref.clone(),
                role,
            });
        }
        if order.has_signed(&caller.address) {
            return Err(GoldSettleError::SignerAlreadySigned {
                tx_ref: tx_ref.clone(),
                signer: caller.address.clone(),
            });
        }
        if signature.is_empty() {
            return Err(GoldSettleError::validation("signature must not be empty"));
        }
        require_status(order, role.signing_status(), "sign")?;

        let next = order.signature_policy.status_after(role);
        let now = self.clock.now();
        let order = self.order_mut(tx_ref)?;
        order.transition(next, "sign", now)?;
        order.signatures.push(OrderSignature {
            signer: caller.address.clone(),
            role,
            signature,
            signed_at: now,
        });
        tracing::info!(
            tx_ref = %tx_ref,
            role = %role,
            signer = %caller.address,
            status = %next,
            "Order signed"
        );
        Ok(next)
    }

    // -----------------------------------------------------------------
    // Execute
    // -----------------------------------------------------------------

    /// Settle a fully signed order: move every asset and balance at once.
    pub fn execute_order(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
    ) -> Result<OrderStatus> {
        if let Some(expired) = self.expire_if_due(tx_ref)? {
            return Ok(expired);
        }
        let order = self.order(tx_ref)?;
        self.require_participant(caller, order, "execute order")?;
        require_status(order, OrderStatus::PendingExecution, "execute")?;
        let (Some(sender_id), Some(receiver_id)) = (&order.sender_account, &order.receiver_account)
        else {
            return Err(GoldSettleError::validation(format!(
                "order {tx_ref} has no settlement accounts"
            )));
        };
        if order.asset_ids.is_empty() {
            return Err(GoldSettleError::validation(format!(
                "order {tx_ref} has no assets"
            )));
        }
        let order_digest = order.digest_hex();

        let mut custody = write_lock(&self.custody, "custody")?;
        let mut ledger = write_lock(&self.ledger, "ledger")?;
        let sender = ledger.details(sender_id)?.clone();
        let receiver = ledger.details(receiver_id)?.clone();
        for account in [&sender, &receiver] {
            if !account.active {
                return Err(GoldSettleError::AccountInactive(account.id.clone()));
            }
        }
        let batch = SettlementBatch::for_assets(tx_ref, &order.asset_ids, &sender, &receiver);
        batch.commit(&self.principal, &mut custody, &mut ledger)?;
        let sender_balance_after = ledger.balance(&sender.id)?;
        let receiver_balance_after = ledger.balance(&receiver.id)?;
        drop(ledger);
        drop(custody);

        let now = self.clock.now();
        let mut receipt = SettlementReceipt {
            id: ReceiptId::new(),
            tx_ref: tx_ref.clone(),
            order_digest,
            asset_ids: order.asset_ids.clone(),
            from_holder: sender.holder,
            to_holder: receiver.holder,
            sender_account: sender.id,
            receiver_account: receiver.id,
            sender_balance_after,
            receiver_balance_after,
            payload_hash: [0; 32],
            executed_by: caller.address.clone(),
            executed_at: now,
        };
        receipt.seal();

        let order = self.order_mut(tx_ref)?;
        order.transition(OrderStatus::Executed, "execute", now)?;
        tracing::info!(
            tx_ref = %tx_ref,
            assets = receipt.asset_ids.len(),
            from = %receipt.sender_account,
            to = %receipt.receiver_account,
            receipt = %receipt.id,
            "Order executed"
        );
        self.release_reservations(tx_ref);
        self.receipts.insert(tx_ref.clone(), receipt);
        Ok(OrderStatus::Executed)
    }

    // -----------------------------------------------------------------
    // Cancel / fail
    // -----------------------------------------------------------------

    /// Withdraw an order before execution.
    pub fn cancel_order(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
        reason: &str,
    ) -> Result<OrderStatus> {
        self.terminate(caller, tx_ref, reason, OrderStatus::Cancelled, "cancel")
    }

    /// Mark an order as failed for an out-of-band reason.
    pub fn fail_order(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
        reason: &str,
    ) -> Result<OrderStatus> {
        self.terminate(caller, tx_ref, reason, OrderStatus::Failed, "fail")
    }

    fn terminate(
        &mut self,
        caller: &CallerContext,
        tx_ref: &TransactionRef,
        reason: &str,
        target: OrderStatus,
        operation: &'static str,
    ) -> Result<OrderStatus> {
        if let Some(expired) = self.expire_if_due(tx_ref)? {
            return Ok(expired);
        }
        ensure_not_blacklisted(self.authority.as_ref(), &caller.address)?;
        let order = self.order(tx_ref)?;
        if order.created_by != caller.address && !self.is_admin(caller) {
            return Err(GoldSettleError::Unauthorized {
                caller: caller.address.clone(),
                action: "terminate order",
            });
        }
        if reason.trim().is_empty() {
            return Err(GoldSettleError::validation("a reason is required"));
        }
        if reason.len() > constants::MAX_REASON_LEN {
            return Err(GoldSettleError::validation("reason too long"));
        }

        let now = self.clock.now();
        let order = self.order_mut(tx_ref)?;
        order.transition(target, operation, now)?;
        order.terminal_reason = Some(reason.to_string());
        tracing::info!(tx_ref = %tx_ref, status = %target, reason, "Order terminated");
        self.release_reservations(tx_ref);
        Ok(target)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    pub fn order(&self, tx_ref: &TransactionRef) -> Result<&TransactionOrder> {
        self.orders
            .get(tx_ref)
            .ok_or_else(|| GoldSettleError::OrderNotFound(tx_ref.clone()))
    }

    pub fn signatures(&self, tx_ref: &TransactionRef) -> Result<&[OrderSignature]> {
        self.order(tx_ref).map(|order| order.signatures.as_slice())
    }

    /// Orders where `member` is initiator or counterparty, oldest first.
    #[must_use]
    pub fn orders_for_member(&self, member: &MemberId) -> Vec<&TransactionOrder> {
        let mut orders: Vec<_> = self
            .orders
            .values()
            .filter(|o| o.is_participant(member))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.tx_ref.cmp(&b.tx_ref)));
        orders
    }

    /// Non-terminal orders that have not passed their expiry.
    #[must_use]
    pub fn open_orders(&self) -> Vec<&TransactionOrder> {
        let now = self.clock.now();
        let mut orders: Vec<_> = self
            .orders
            .values()
            .filter(|o| !o.is_terminal() && !o.is_expired_at(now))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.tx_ref.cmp(&b.tx_ref)));
        orders
    }

    #[must_use]
    pub fn receipt(&self, tx_ref: &TransactionRef) -> Option<&SettlementReceipt> {
        self.receipts.get(tx_ref)
    }

    /// The open order an asset is committed to, if any.
    #[must_use]
    pub fn reservation_of(&self, asset_id: AssetId) -> Option<&TransactionRef> {
        self.reservations.get(&asset_id)
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn order_mut(&mut self, tx_ref: &TransactionRef) -> Result<&mut TransactionOrder> {
        self.orders
            .get_mut(tx_ref)
            .ok_or_else(|| GoldSettleError::OrderNotFound(tx_ref.clone()))
    }

    /// Move a due order to EXPIRED. Returns `Some` if it just expired.
    fn expire_if_due(&mut self, tx_ref: &TransactionRef) -> Result<Option<OrderStatus>> {
        let now = self.clock.now();
        let order = self
            .orders
            .get_mut(tx_ref)
            .ok_or_else(|| GoldSettleError::OrderNotFound(tx_ref.clone()))?;
        if order.is_terminal() || !order.is_expired_at(now) {
            return Ok(None);
        }
        let previous = order.status;
        order.transition(OrderStatus::Expired, "expire", now)?;
        tracing::info!(tx_ref = %tx_ref, from = %previous, "Order expired");
        self.reservations.retain(|_, reserved_by| reserved_by != tx_ref);
        Ok(Some(OrderStatus::Expired))
    }

    fn release_reservations(&mut self, tx_ref: &TransactionRef) {
        self.reservations.retain(|_, reserved_by| reserved_by != tx_ref);
    }

    fn is_admin(&self, caller: &CallerContext) -> bool {
        self.authority
            .is_member_in_role(&caller.address, &CapabilitySet::of([Capability::AdminOverride]))
    }

    /// Admin override, or a caller acting for one of the order's parties.
    fn require_participant(
        &self,
        caller: &CallerContext,
        order: &TransactionOrder,
        action: &'static str,
    ) -> Result<()> {
        ensure_not_blacklisted(self.authority.as_ref(), &caller.address)?;
        if self.is_admin(caller) {
            return Ok(());
        }
        let member = resolve_member(self.authority.as_ref(), caller)?;
        if order.is_participant(&member) {
            Ok(())
        } else {
            tracing::warn!(tx_ref = %order.tx_ref, caller = %caller.address, action, "Non-participant rejected");
            Err(GoldSettleError::Unauthorized {
                caller: caller.address.clone(),
                action,
            })
        }
    }
}

fn require_status(
    order: &TransactionOrder,
    expected: OrderStatus,
    operation: &'static str,
) -> Result<()> {
    if order.status == expected {
        Ok(())
    } else {
        Err(GoldSettleError::InvalidOrderState {
            tx_ref: order.tx_ref.clone(),
            current: order.status,
            operation,
        })
    }
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

impl std::fmt::Debug for OrderSettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSettlementEngine")
            .field("principal", &self.principal.address)
            .field("orders", &self.orders.len())
            .field("reservations", &self.reservations.len())
            .field("receipts", &self.receipts.len())
            .finish_non_exhaustive()
    }
}
