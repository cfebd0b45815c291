use thiserror::Error;

use crate::{address::Address, points::Points, roles::RoleMask};

/// Every way a ledger call can be rejected.
///
/// A rejected call has no effect on the state, whatever the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller lacks the owner capability or a required role bit.
    #[error("caller {caller} is not authorized (requires {required})")]
    Unauthorized {
        caller: Address,
        required: Authority,
    },

    #[error("amount for account {account} must be greater than zero")]
    InvalidAmount { account: Address },

    #[error("points counter of account {account} would overflow")]
    ArithmeticOverflow { account: Address },

    #[error("account {account} has {available} points, {requested} requested")]
    InsufficientBalance {
        account: Address,
        available: Points,
        requested: Points,
    },

    #[error("invalid bulk input: {reason}")]
    InvalidBulkInput { reason: &'static str },

    #[error("index {index} out of range for {len} entries")]
    InvalidIndex { index: usize, len: usize },

    /// The null address was given where a real account is required.
    #[error("the null address is not allowed here")]
    InvalidAddress,

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

/// What an unauthorized caller was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Owner,
    Roles(RoleMask),
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authority::Owner => f.write_str("owner"),
            Authority::Roles(mask) => write!(f, "roles {mask}"),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
