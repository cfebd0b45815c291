use std::collections::BTreeSet;

use crate::{
    address::Address,
    error::{LedgerError, LedgerResult},
};

/// Accounts marked as known, in first-insertion order.
///
/// The null address is never a member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnownAddresses {
    order: Vec<Address>,
    members: BTreeSet<Address>,
}

impl KnownAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_list(list: impl IntoIterator<Item = Address>) -> LedgerResult<Self> {
        let mut known = Self::new();
        for account in list {
            if account.is_null() {
                return Err(LedgerError::CorruptSnapshot(
                    "null address in known list".into(),
                ));
            }
            if !known.insert(account) {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "known address {account} listed twice"
                )));
            }
        }
        Ok(known)
    }

    pub fn is_known(&self, account: &Address) -> bool {
        self.members.contains(account)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.order
    }

    /// Accounts from `candidates` that an insertion would actually add:
    /// null and already-known addresses are dropped, and so are repeats
    /// within `candidates` itself.
    pub fn pending(&self, candidates: &[Address]) -> Vec<Address> {
        let mut seen = BTreeSet::new();
        candidates
            .iter()
            .copied()
            .filter(|account| !account.is_null() && !self.is_known(account))
            .filter(|account| seen.insert(*account))
            .collect()
    }

    /// Returns whether the account was newly added.
    pub(crate) fn insert(&mut self, account: Address) -> bool {
        if account.is_null() || !self.members.insert(account) {
            return false;
        }
        self.order.push(account);
        true
    }

    /// Referral validity: both ends real and distinct, the referrer known and
    /// the referred account not yet known.
    pub fn is_valid(&self, referrer: &Address, referred: &Address) -> bool {
        !referrer.is_null()
            && !referred.is_null()
            && referrer != referred
            && self.is_known(referrer)
            && !self.is_known(referred)
    }
}
