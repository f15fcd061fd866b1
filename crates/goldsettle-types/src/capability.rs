//! Capability sets granted to principals by the membership authority.
//!
//! A [`CapabilitySet`] is a tagged set of enumerated permissions. Grants
//! take the union, revocations take the set difference, and a role check
//! passes when the held set intersects the required set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single permission a principal may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Capability {
    /// Platform administration: accounts, trust tables.
    PlatformAdmin,
    /// Bypasses participant/creator identity checks on orders and assets.
    AdminOverride,
    /// May create transaction orders.
    OrderCreator,
    /// May issue (mint) gold assets.
    Issuer,
    /// Vault custodian: status, custody, burn, operator balance updates.
    Custodian,
    /// Logistics operator: status and custody updates.
    Operator,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlatformAdmin => write!(f, "PLATFORM_ADMIN"),
            Self::AdminOverride => write!(f, "ADMIN_OVERRIDE"),
            Self::OrderCreator => write!(f, "ORDER_CREATOR"),
            Self::Issuer => write!(f, "ISSUER"),
            Self::Custodian => write!(f, "CUSTODIAN"),
            Self::Operator => write!(f, "OPERATOR"),
        }
    }
}

/// An unordered set of [`Capability`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from a fixed list of capabilities.
    #[must_use]
    pub fn of<const N: usize>(caps: [Capability; N]) -> Self {
        Self(caps.into_iter().collect())
    }

    /// Union: add every capability in `other`.
    pub fn grant(&mut self, other: &CapabilitySet) {
        self.0.extend(other.0.iter().copied());
    }

    /// Set difference: remove every capability in `other`.
    pub fn revoke(&mut self, other: &CapabilitySet) {
        self.0.retain(|cap| !other.0.contains(cap));
    }

    /// Whether at least one capability is shared with `required`.
    #[must_use]
    pub fn intersects(&self, required: &CapabilitySet) -> bool {
        self.0.iter().any(|cap| required.0.contains(cap))
    }

    #[must_use]
    pub fn contains(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{{{}}}", names.join("|"))
    }
}
