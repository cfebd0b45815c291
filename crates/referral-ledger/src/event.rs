use serde::{Deserialize, Serialize};

use crate::{address::Address, points::Points, roles::RoleMask};

/// Effects recorded by successful calls, one per changed entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    RoleUpdated {
        account: Address,
        previous: RoleMask,
        current: RoleMask,
    },
    OwnershipTransferred {
        previous: Option<Address>,
        current: Option<Address>,
    },
    PointsIssued {
        account: Address,
        amount: Points,
        /// Cumulative issued after this event.
        issued: Points,
    },
    PointsConsumed {
        account: Address,
        amount: Points,
        /// Cumulative consumed after this event.
        consumed: Points,
    },
    KnownAddressAdded {
        account: Address,
    },
}
