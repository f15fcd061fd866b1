//! Ports to the external membership authority and document registry.
//!
//! The core never owns membership data. It asks the [`AuthorityPort`] who a
//! caller is, what it may do, and whether it is blacklisted. Every operation
//! receives an explicit [`CallerContext`] instead of reading ambient state.
//!
//! [`InMemoryAuthority`] and [`InMemoryDocumentRegistry`] are reference
//! adapters for embedding and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Address, CapabilitySet, GoldSettleError, MemberId, Result};

/// Lifecycle state of a member organization, as reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    Pending,
    Active,
    Suspended,
    Terminated,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Identity of the caller of a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerContext {
    pub address: Address,
}

impl CallerContext {
    #[must_use]
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Read interface of the membership/role authority.
pub trait AuthorityPort: Send + Sync {
    /// Whether `principal` holds at least one capability in `roles`.
    fn is_member_in_role(&self, principal: &Address, roles: &CapabilitySet) -> bool;

    /// Status of a member, or `None` if the member is unknown.
    fn member_status(&self, member: &MemberId) -> Option<MemberStatus>;

    /// Member organization a principal address acts for, if any.
    fn resolve_principal_to_member(&self, address: &Address) -> Option<MemberId>;

    fn is_blacklisted(&self, address: &Address) -> bool;
}

/// Read interface of the supporting-document registry.
pub trait DocumentRegistryPort: Send + Sync {
    fn document_set_exists_and_valid(&self, set_id: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Shared authorization checks
// ---------------------------------------------------------------------------

/// Reject blacklisted callers, then require one of `roles`.
pub fn require_role(
    authority: &dyn AuthorityPort,
    caller: &CallerContext,
    roles: &CapabilitySet,
    action: &'static str,
) -> Result<()> {
    ensure_not_blacklisted(authority, &caller.address)?;
    if authority.is_member_in_role(&caller.address, roles) {
        Ok(())
    } else {
        Err(GoldSettleError::Unauthorized {
            caller: caller.address.clone(),
            action,
        })
    }
}

pub fn ensure_not_blacklisted(authority: &dyn AuthorityPort, address: &Address) -> Result<()> {
    if authority.is_blacklisted(address) {
        return Err(GoldSettleError::Blacklisted(address.clone()));
    }
    Ok(())
}

/// Require that `member` is known and ACTIVE.
pub fn require_active_member(authority: &dyn AuthorityPort, member: &MemberId) -> Result<()> {
    match authority.member_status(member) {
        None => Err(GoldSettleError::MemberNotFound(member.clone())),
        Some(MemberStatus::Active) => Ok(()),
        Some(status) => Err(GoldSettleError::MemberNotActive {
            member: member.clone(),
            status,
        }),
    }
}

/// Resolve the caller to the member it acts for.
pub fn resolve_member(authority: &dyn AuthorityPort, caller: &CallerContext) -> Result<MemberId> {
    authority
        .resolve_principal_to_member(&caller.address)
        .ok_or_else(|| GoldSettleError::UnresolvedPrincipal(caller.address.clone()))
}

// ---------------------------------------------------------------------------
// InMemoryAuthority
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AuthorityState {
    members: HashMap<MemberId, MemberStatus>,
    principals: HashMap<Address, MemberId>,
    roles: HashMap<Address, CapabilitySet>,
    blacklist: HashSet<Address>,
}

/// In-process authority backed by hash maps.
///
/// Writes take `&self` so one instance can be shared behind an `Arc` by
/// every service that consults it.
#[derive(Default)]
pub struct InMemoryAuthority {
    state: RwLock<AuthorityState>,
}

impl InMemoryAuthority {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member with an initial status (overwrites an existing one).
    pub fn register_member(&self, member: impl Into<MemberId>, status: MemberStatus) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.members.insert(member.into(), status);
    }

    pub fn set_member_status(&self, member: &MemberId, status: MemberStatus) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let entry = state
            .members
            .get_mut(member)
            .ok_or_else(|| GoldSettleError::MemberNotFound(member.clone()))?;
        *entry = status;
        Ok(())
    }

    /// Bind a principal address to the member it acts for.
    pub fn link_principal(&self, address: impl Into<Address>, member: impl Into<MemberId>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.principals.insert(address.into(), member.into());
    }

    pub fn grant_roles(&self, address: impl Into<Address>, roles: &CapabilitySet) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.roles.entry(address.into()).or_default().grant(roles);
    }

    pub fn revoke_roles(&self, address: &Address, roles: &CapabilitySet) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(held) = state.roles.get_mut(address) {
            held.revoke(roles);
        }
    }

    /// Capabilities currently held by an address.
    #[must_use]
    pub fn roles_of(&self, address: &Address) -> CapabilitySet {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.roles.get(address).cloned().unwrap_or_default()
    }

    pub fn set_blacklisted(&self, address: impl Into<Address>, blacklisted: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let address = address.into();
        if blacklisted {
            state.blacklist.insert(address);
        } else {
            state.blacklist.remove(&address);
        }
    }
}

impl AuthorityPort for InMemoryAuthority {
    fn is_member_in_role(&self, principal: &Address, roles: &CapabilitySet) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .roles
            .get(principal)
            .is_some_and(|held| held.intersects(roles))
    }

    fn member_status(&self, member: &MemberId) -> Option<MemberStatus> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.members.get(member).copied()
    }

    fn resolve_principal_to_member(&self, address: &Address) -> Option<MemberId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.principals.get(address).cloned()
    }

    fn is_blacklisted(&self, address: &Address) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.blacklist.contains(address)
    }
}

// ---------------------------------------------------------------------------
// InMemoryDocumentRegistry
// ---------------------------------------------------------------------------

/// Document registry holding the ids of currently valid document sets.
#[derive(Default)]
pub struct InMemoryDocumentRegistry {
    valid_sets: RwLock<HashSet<String>>,
}

impl InMemoryDocumentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_valid(&self, set_id: impl Into<String>) {
        let mut sets = self.valid_sets.write().unwrap_or_else(PoisonError::into_inner);
        sets.insert(set_id.into());
    }

    pub fn invalidate(&self, set_id: &str) {
        let mut sets = self.valid_sets.write().unwrap_or_else(PoisonError::into_inner);
        sets.remove(set_id);
    }
}

impl DocumentRegistryPort for InMemoryDocumentRegistry {
    fn document_set_exists_and_valid(&self, set_id: &str) -> bool {
        let sets = self.valid_sets.read().unwrap_or_else(PoisonError::into_inner);
        sets.contains(set_id)
    }
}
