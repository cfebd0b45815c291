use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{Authority, LedgerError, LedgerResult},
};

/// Named permission bits. Each role is a single bit; further roles take
/// higher bits without moving these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u64)]
pub enum Role {
    Issuer = 1,
    Consumer = 2,
    Seller = 4,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Issuer, Role::Consumer, Role::Seller];

    pub const fn bit(self) -> u64 {
        self as u64
    }

    pub const fn name(self) -> &'static str {
        match self {
            Role::Issuer => "issuer",
            Role::Consumer => "consumer",
            Role::Seller => "seller",
        }
    }
}

/// A set of role bits held by one account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMask(u64);

impl RoleMask {
    pub const NONE: RoleMask = RoleMask(0);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True iff `flags` is non-empty and every bit of it is set in `self`.
    pub const fn contains(self, flags: RoleMask) -> bool {
        flags.0 != 0 && self.0 & flags.0 == flags.0
    }

    pub const fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    pub fn roles(self) -> impl Iterator<Item = Role> {
        Role::ALL
            .into_iter()
            .filter(move |role| self.0 & role.bit() != 0)
    }
}

impl From<Role> for RoleMask {
    fn from(role: Role) -> Self {
        Self(role.bit())
    }
}

impl FromIterator<Role> for RoleMask {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(RoleMask::NONE, RoleMask::with)
    }
}

impl fmt::Display for RoleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.roles().map(Role::name).collect();
        if names.is_empty() {
            write!(f, "{:#x}", self.0)
        } else {
            write!(f, "{:#x} ({})", self.0, names.join("|"))
        }
    }
}

/// Owner capability plus the per-account role table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessControl {
    owner: Option<Address>,
    roles: BTreeMap<Address, RoleMask>,
}

impl AccessControl {
    pub fn new(owner: Address) -> Self {
        Self {
            owner: (!owner.is_null()).then_some(owner),
            roles: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(owner: Option<Address>, roles: BTreeMap<Address, RoleMask>) -> Self {
        Self { owner, roles }
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn roles_of(&self, account: &Address) -> RoleMask {
        self.roles.get(account).copied().unwrap_or_default()
    }

    pub fn has_role(&self, account: &Address, flags: impl Into<RoleMask>) -> bool {
        self.roles_of(account).contains(flags.into())
    }

    /// Accounts with a non-empty mask, ordered by address.
    pub fn entries(&self) -> impl Iterator<Item = (&Address, &RoleMask)> {
        self.roles.iter()
    }

    pub fn require_owner(&self, caller: &Address) -> LedgerResult<()> {
        match self.owner {
            Some(owner) if owner == *caller => Ok(()),
            _ => Err(LedgerError::Unauthorized {
                caller: *caller,
                required: Authority::Owner,
            }),
        }
    }

    pub fn requires(&self, caller: &Address, role: Role) -> LedgerResult<()> {
        if self.has_role(caller, role) {
            return Ok(());
        }
        Err(LedgerError::Unauthorized {
            caller: *caller,
            required: Authority::Roles(role.into()),
        })
    }

    /// Replace the mask of `target`, returning the previous one. A zero mask
    /// removes the entry.
    pub(crate) fn set_mask(&mut self, target: Address, mask: RoleMask) -> RoleMask {
        let previous = if mask == RoleMask::NONE {
            self.roles.remove(&target)
        } else {
            self.roles.insert(target, mask)
        };
        previous.unwrap_or_default()
    }

    pub(crate) fn set_owner(&mut self, owner: Option<Address>) -> Option<Address> {
        std::mem::replace(&mut self.owner, owner)
    }
}
