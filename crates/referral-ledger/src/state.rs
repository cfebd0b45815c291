use tracing::debug;

use crate::{
    address::Address,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    known::KnownAddresses,
    ledger::{PointsLedger, PostingKind, PostingPlan},
    points::Points,
    roles::{AccessControl, Role, RoleMask},
};

/// The whole referral registry: roles, points, known addresses and the event
/// log.
///
/// Every mutating method takes the caller's address, checks the caller's
/// authority first, then validates the complete input before changing
/// anything. An `Err` return always means the state is exactly what it was
/// before the call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferralState {
    pub(crate) access: AccessControl,
    pub(crate) ledger: PointsLedger,
    pub(crate) known: KnownAddresses,
    pub(crate) events: Vec<LedgerEvent>,
}

impl ReferralState {
    /// Fresh state owned by `owner`. A null owner yields a state nobody can
    /// administer.
    pub fn new(owner: Address) -> Self {
        Self {
            access: AccessControl::new(owner),
            ..Default::default()
        }
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn ledger(&self) -> &PointsLedger {
        &self.ledger
    }

    pub fn known(&self) -> &KnownAddresses {
        &self.known
    }

    /// Every effect since the state was created, oldest first. The log is not
    /// part of the state root and grows without bound unless
    /// [`prune_events`](Self::prune_events) trims it.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Drop all but the newest `keep` events, returning how many were
    /// dropped. Balances, roles and known addresses are untouched, so the
    /// state root does not change.
    pub fn prune_events(&mut self, keep: usize) -> usize {
        let dropped = self.events.len().saturating_sub(keep);
        if dropped > 0 {
            self.events.drain(..dropped);
            debug!(dropped, kept = self.events.len(), "event log pruned");
        }
        dropped
    }

    // ------------------------------ access control ------------------------------

    pub fn owner(&self) -> Option<Address> {
        self.access.owner()
    }

    pub fn has_role(&self, account: &Address, flags: impl Into<RoleMask>) -> bool {
        self.access.has_role(account, flags)
    }

    pub fn roles_of(&self, account: &Address) -> RoleMask {
        self.access.roles_of(account)
    }

    pub fn update_role(
        &mut self,
        caller: &Address,
        target: Address,
        mask: RoleMask,
    ) -> LedgerResult<()> {
        self.access.require_owner(caller)?;

        let previous = self.access.set_mask(target, mask);
        debug!(%caller, %target, %previous, current = %mask, "role updated");
        self.events.push(LedgerEvent::RoleUpdated {
            account: target,
            previous,
            current: mask,
        });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> LedgerResult<()> {
        self.access.require_owner(caller)?;
        if new_owner.is_null() {
            return Err(LedgerError::InvalidAddress);
        }

        let previous = self.access.set_owner(Some(new_owner));
        debug!(%caller, %new_owner, "ownership transferred");
        self.events.push(LedgerEvent::OwnershipTransferred {
            previous,
            current: Some(new_owner),
        });
        Ok(())
    }

    /// Give up the owner capability for good. Role masks stay as they are but
    /// can no longer change.
    pub fn renounce_ownership(&mut self, caller: &Address) -> LedgerResult<()> {
        self.access.require_owner(caller)?;

        let previous = self.access.set_owner(None);
        debug!(%caller, "ownership renounced");
        self.events.push(LedgerEvent::OwnershipTransferred {
            previous,
            current: None,
        });
        Ok(())
    }

    // ---------------------------------- points ----------------------------------

    pub fn issue_to(
        &mut self,
        caller: &Address,
        account: Address,
        amount: Points,
    ) -> LedgerResult<()> {
        self.access.requires(caller, Role::Issuer)?;
        let entries = [(account, amount)];
        let plan = self.ledger.plan(PostingKind::Issue, &entries)?;
        self.commit_postings(caller, &plan);
        Ok(())
    }

    pub fn bulk_issue(
        &mut self,
        caller: &Address,
        accounts: &[Address],
        amounts: &[Points],
    ) -> LedgerResult<()> {
        self.access.requires(caller, Role::Issuer)?;
        let entries = pair_up(accounts, amounts)?;
        let plan = self.ledger.plan(PostingKind::Issue, &entries)?;
        self.commit_postings(caller, &plan);
        Ok(())
    }

    pub fn consume_from(
        &mut self,
        caller: &Address,
        account: Address,
        amount: Points,
    ) -> LedgerResult<()> {
        self.access.requires(caller, Role::Consumer)?;
        let entries = [(account, amount)];
        let plan = self.ledger.plan(PostingKind::Consume, &entries)?;
        self.commit_postings(caller, &plan);
        Ok(())
    }

    pub fn bulk_consume(
        &mut self,
        caller: &Address,
        accounts: &[Address],
        amounts: &[Points],
    ) -> LedgerResult<()> {
        self.access.requires(caller, Role::Consumer)?;
        let entries = pair_up(accounts, amounts)?;
        let plan = self.ledger.plan(PostingKind::Consume, &entries)?;
        self.commit_postings(caller, &plan);
        Ok(())
    }

    fn commit_postings(&mut self, caller: &Address, plan: &PostingPlan) {
        self.ledger.commit(plan);
        for posting in plan.postings() {
            let event = match posting.kind {
                PostingKind::Issue => LedgerEvent::PointsIssued {
                    account: posting.account,
                    amount: posting.amount,
                    issued: posting.total_after,
                },
                PostingKind::Consume => LedgerEvent::PointsConsumed {
                    account: posting.account,
                    amount: posting.amount,
                    consumed: posting.total_after,
                },
            };
            self.events.push(event);
        }
        debug!(%caller, postings = plan.postings().len(), "points committed");
    }

    pub fn available(&self, account: &Address) -> Points {
        self.ledger.available(account)
    }

    /// Same as [`available`](Self::available).
    pub fn balance_of(&self, account: &Address) -> Points {
        self.available(account)
    }

    pub fn issued(&self, account: &Address) -> Points {
        self.ledger.issued(account)
    }

    pub fn consumed(&self, account: &Address) -> Points {
        self.ledger.consumed(account)
    }

    pub fn number_of_holders(&self) -> usize {
        self.ledger.number_of_holders()
    }

    pub fn holder(&self, index: usize) -> LedgerResult<Address> {
        self.ledger.holder(index)
    }

    pub fn all_holders(&self) -> Vec<Address> {
        self.ledger.holders().to_vec()
    }

    // ----------------------------- known addresses ------------------------------

    pub fn add_known_address(&mut self, caller: &Address, account: Address) -> LedgerResult<()> {
        self.access.requires(caller, Role::Seller)?;
        self.insert_known(caller, &[account]);
        Ok(())
    }

    pub fn bulk_add_known_addresses(
        &mut self,
        caller: &Address,
        accounts: &[Address],
    ) -> LedgerResult<()> {
        self.access.requires(caller, Role::Seller)?;
        if accounts.is_empty() {
            return Err(LedgerError::InvalidBulkInput {
                reason: "no addresses given",
            });
        }
        self.insert_known(caller, accounts);
        Ok(())
    }

    fn insert_known(&mut self, caller: &Address, accounts: &[Address]) {
        let added = self.known.pending(accounts);
        for account in &added {
            self.known.insert(*account);
            let event = LedgerEvent::KnownAddressAdded { account: *account };
            self.events.push(event);
        }
        debug!(
            %caller,
            requested = accounts.len(),
            added = added.len(),
            "known addresses updated"
        );
    }

    pub fn is_known(&self, account: &Address) -> bool {
        self.known.is_known(account)
    }

    pub fn number_of_known_addresses(&self) -> usize {
        self.known.len()
    }

    pub fn known_addresses(&self) -> Vec<Address> {
        self.known.as_slice().to_vec()
    }

    pub fn is_valid(&self, referrer: &Address, referred: &Address) -> bool {
        self.known.is_valid(referrer, referred)
    }
}

fn pair_up(accounts: &[Address], amounts: &[Points]) -> LedgerResult<Vec<(Address, Points)>> {
    if accounts.is_empty() {
        return Err(LedgerError::InvalidBulkInput {
            reason: "no accounts given",
        });
    }
    if accounts.len() != amounts.len() {
        return Err(LedgerError::InvalidBulkInput {
            reason: "accounts and amounts differ in length",
        });
    }
    let pairs = accounts.iter().copied().zip(amounts.iter().copied());
    Ok(pairs.collect())
}
