//! Settlement write batch.
//!
//! An executed order touches two stores: holder changes in the custody
//! registry and unit deltas in the ledger. The batch is validated against
//! both stores before either is written, then committed registry first.
//! If the ledger commit still fails, the registry moves are reverted before
//! the error is returned, so callers never observe a half-applied batch.
//!
//! Callers must hold the registry and ledger write guards, acquired in that
//! order, for the whole of [`SettlementBatch::commit`].

use goldsettle_custody::{AssetCustodyRegistry, HolderMove};
use goldsettle_ledger::BalanceLedger;
use goldsettle_types::{
    Account, AssetId, BalanceDelta, CallerContext, GoldSettleError, Result, TransactionRef,
    constants,
};

/// Every write one order execution performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementBatch {
    tx_ref: TransactionRef,
    moves: Vec<HolderMove>,
    deltas: Vec<BalanceDelta>,
}

impl SettlementBatch {
    /// Move `asset_ids` from the sender's holder to the receiver's holder
    /// and shift one unit per asset between the two accounts.
    #[must_use]
    pub fn for_assets(
        tx_ref: &TransactionRef,
        asset_ids: &[AssetId],
        sender: &Account,
        receiver: &Account,
    ) -> Self {
        let mut moves = Vec::with_capacity(asset_ids.len());
        let mut deltas = Vec::with_capacity(asset_ids.len() * 2);
        for id in asset_ids {
            moves.push(HolderMove {
                asset_id: *id,
                from: sender.holder.clone(),
                to: receiver.holder.clone(),
            });
            let reason = format!("settle {tx_ref}");
            deltas.push(BalanceDelta::new(
                sender.id.clone(),
                -constants::UNITS_PER_ASSET,
                reason.clone(),
                Some(*id),
            ));
            deltas.push(BalanceDelta::new(
                receiver.id.clone(),
                constants::UNITS_PER_ASSET,
                reason,
                Some(*id),
            ));
        }
        Self {
            tx_ref: tx_ref.clone(),
            moves,
            deltas,
        }
    }

    #[must_use]
    pub fn moves(&self) -> &[HolderMove] {
        &self.moves
    }

    #[must_use]
    pub fn deltas(&self) -> &[BalanceDelta] {
        &self.deltas
    }

    /// Check both halves without writing anything.
    pub fn validate(
        &self,
        principal: &CallerContext,
        custody: &AssetCustodyRegistry,
        ledger: &BalanceLedger,
    ) -> Result<()> {
        if self.moves.is_empty() {
            return Err(GoldSettleError::validation(format!(
                "settlement of {} moves no assets",
                self.tx_ref
            )));
        }
        custody.validate_moves(principal, &self.moves)?;
        ledger.validate_batch(principal, &self.deltas)
    }

    /// Validate, then write both halves or neither.
    pub fn commit(
        &self,
        principal: &CallerContext,
        custody: &mut AssetCustodyRegistry,
        ledger: &mut BalanceLedger,
    ) -> Result<()> {
        self.validate(principal, custody, ledger)?;
        self.write(principal, custody, ledger)
    }

    fn write(
        &self,
        principal: &CallerContext,
        custody: &mut AssetCustodyRegistry,
        ledger: &mut BalanceLedger,
    ) -> Result<()> {
        custody.commit_moves(principal, &self.moves)?;
        let Err(err) = ledger.commit_batch(principal, &self.deltas) else {
            return Ok(());
        };

        let reverse: Vec<HolderMove> = self.moves.iter().rev().map(HolderMove::reversed).collect();
        if let Err(revert_err) = custody.commit_moves(principal, &reverse) {
            tracing::error!(
                tx_ref = %self.tx_ref,
                error = %err,
                revert_error = %revert_err,
                "Settlement revert failed; custody and ledger diverge"
            );
            return Err(GoldSettleError::Internal(format!(
                "revert of {} failed after ledger error ({err}): {revert_err}",
                self.tx_ref
            )));
        }
        tracing::warn!(
            tx_ref = %self.tx_ref,
            error = %err,
            "Ledger commit failed; holder moves reverted"
        );
        Err(err)
    }
}
