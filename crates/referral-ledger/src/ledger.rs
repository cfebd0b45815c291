use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{LedgerError, LedgerResult},
    points::Points,
};

/// Cumulative counters of one account. `consumed <= issued` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRecord {
    pub issued: Points,
    pub consumed: Points,
}

impl PointsRecord {
    pub fn available(&self) -> Points {
        self.issued.saturating_sub(self.consumed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostingKind {
    Issue,
    Consume,
}

/// One validated change to a single account, carrying the counter value it
/// leaves behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Posting {
    pub kind: PostingKind,
    pub account: Address,
    pub amount: Points,
    pub total_after: Points,
}

/// Postings that passed validation as a group. Produced by
/// [`PointsLedger::plan`] and applied by [`PointsLedger::commit`].
#[derive(Debug, Default)]
pub struct PostingPlan {
    postings: Vec<Posting>,
}

impl PostingPlan {
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }
}

/// Per-account issued/consumed counters and the holder index.
///
/// An account gets a record the first time it is issued points, and is
/// appended to `holders` at the same moment. Records are never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointsLedger {
    records: BTreeMap<Address, PointsRecord>,
    holders: Vec<Address>,
}

impl PointsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from holder-ordered records, checking the invariants
    /// a live ledger maintains.
    pub(crate) fn from_records(
        entries: impl IntoIterator<Item = (Address, PointsRecord)>,
    ) -> LedgerResult<Self> {
        let mut ledger = Self::new();
        for (account, record) in entries {
            if record.issued.is_zero() {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "holder {account} has no issuance"
                )));
            }
            if record.consumed > record.issued {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "holder {account} consumed more than issued"
                )));
            }
            if ledger.records.insert(account, record).is_some() {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "holder {account} listed twice"
                )));
            }
            ledger.holders.push(account);
        }
        Ok(ledger)
    }

    pub fn record(&self, account: &Address) -> PointsRecord {
        self.records.get(account).copied().unwrap_or_default()
    }

    pub fn issued(&self, account: &Address) -> Points {
        self.record(account).issued
    }

    pub fn consumed(&self, account: &Address) -> Points {
        self.record(account).consumed
    }

    pub fn available(&self, account: &Address) -> Points {
        self.record(account).available()
    }

    pub fn number_of_holders(&self) -> usize {
        self.holders.len()
    }

    pub fn holder(&self, index: usize) -> LedgerResult<Address> {
        self.holders
            .get(index)
            .copied()
            .ok_or(LedgerError::InvalidIndex {
                index,
                len: self.holders.len(),
            })
    }

    pub fn holders(&self) -> &[Address] {
        &self.holders
    }

    /// Validate a batch of same-kind postings without touching the ledger.
    ///
    /// Pairs are checked in order against a staged view, so a later pair for
    /// the same account sees the earlier ones. The first failing pair aborts
    /// the whole plan.
    pub fn plan(
        &self,
        kind: PostingKind,
        entries: &[(Address, Points)],
    ) -> LedgerResult<PostingPlan> {
        let mut staged: BTreeMap<Address, PointsRecord> = BTreeMap::new();
        let mut postings = Vec::with_capacity(entries.len());

        for &(account, amount) in entries {
            if amount.is_zero() {
                return Err(LedgerError::InvalidAmount { account });
            }

            let record = staged
                .entry(account)
                .or_insert_with(|| self.record(&account));

            let total_after = match kind {
                PostingKind::Issue => {
                    record.issued = record
                        .issued
                        .checked_add(amount)
                        .ok_or(LedgerError::ArithmeticOverflow { account })?;
                    record.issued
                }
                PostingKind::Consume => {
                    let available = record.available();
                    if amount > available {
                        return Err(LedgerError::InsufficientBalance {
                            account,
                            available,
                            requested: amount,
                        });
                    }
                    // Bounded by `issued` after the check above.
                    record.consumed = record
                        .consumed
                        .checked_add(amount)
                        .ok_or(LedgerError::ArithmeticOverflow { account })?;
                    record.consumed
                }
            };

            postings.push(Posting {
                kind,
                account,
                amount,
                total_after,
            });
        }

        Ok(PostingPlan { postings })
    }

    /// Apply a plan produced by [`plan`](Self::plan) against this same
    /// ledger state. Infallible: every check already ran.
    pub fn commit(&mut self, plan: &PostingPlan) {
        for posting in &plan.postings {
            let is_new = !self.records.contains_key(&posting.account);
            let record = self.records.entry(posting.account).or_default();
            match posting.kind {
                PostingKind::Issue => {
                    record.issued = posting.total_after;
                    if is_new {
                        self.holders.push(posting.account);
                    }
                }
                PostingKind::Consume => record.consumed = posting.total_after,
            }
        }
    }
}
