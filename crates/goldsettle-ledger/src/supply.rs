//! Unit-supply conservation invariant checker.
//!
//! Mathematical invariant enforced by the ledger:
//! ```text
//! Σ(account balances) == Σ(credited units) - Σ(debited units)
//! ```
//!
//! Settlement only moves units between accounts, so it leaves both sides
//! of the identity unchanged in total. Issuance credits, burn debits.

use goldsettle_types::{GoldSettleError, Result};

/// Tracks every unit credited to and debited from the ledger since genesis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SupplyConservation {
    credited: u64,
    debited: u64,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one applied delta.
    pub fn record(&mut self, delta: i64) {
        if delta >= 0 {
            self.credited = self.credited.saturating_add(delta.unsigned_abs());
        } else {
            self.debited = self.debited.saturating_add(delta.unsigned_abs());
        }
    }

    /// Expected total supply: credited - debited.
    #[must_use]
    pub fn expected_supply(&self) -> u64 {
        self.credited.saturating_sub(self.debited)
    }

    #[must_use]
    pub fn total_credited(&self) -> u64 {
        self.credited
    }

    #[must_use]
    pub fn total_debited(&self) -> u64 {
        self.debited
    }

    /// Verify the actual supply (sum of all balances) against the record.
    ///
    /// # Errors
    /// Returns [`GoldSettleError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_supply: u64) -> Result<()> {
        let expected = self.expected_supply();
        if actual_supply != expected {
            return Err(GoldSettleError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (credited={}, debited={})",
                    self.credited, self.debited
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply(), 0);
        assert!(sc.verify(0).is_ok());
    }

    #[test]
    fn credits_and_debits_net_out() {
        let mut sc = SupplyConservation::new();
        sc.record(3);
        sc.record(-1);
        assert_eq!(sc.expected_supply(), 2);
        assert_eq!(sc.total_credited(), 3);
        assert_eq!(sc.total_debited(), 1);
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record(10);
        let err = sc.verify(11).unwrap_err();
        assert!(matches!(
            err,
            GoldSettleError::SupplyInvariantViolation { .. }
        ));
    }

    #[test]
    fn transfer_does_not_change_supply() {
        let mut sc = SupplyConservation::new();
        sc.record(1);
        // Settlement: debit sender, credit receiver.
        sc.record(-1);
        sc.record(1);
        assert!(sc.verify(1).is_ok());
    }
}
