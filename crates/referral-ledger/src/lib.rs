//! Referral points ledger.
//!
//! One [`ReferralState`] holds three pieces of state that always change
//! together:
//!
//! * [`roles`]: the owner capability and per-account role bitmasks
//!   (issuer, consumer, seller) that gate every mutation.
//! * [`ledger`]: cumulative issued/consumed points per account and the
//!   first-issuance ordered list of holders.
//! * [`known`]: the ordered set of known addresses and the referral validity
//!   predicate built on it.
//!
//! Mutations take the caller's [`Address`] and either apply completely or
//! return a [`LedgerError`] with no effect. [`Command`] is the serializable
//! form of those mutations, and [`SnapshotStore`] persists the state as JSON.

pub mod address;
pub mod command;
pub mod error;
pub mod event;
pub mod known;
pub mod ledger;
pub mod points;
pub mod roles;
pub mod snapshot;
pub mod state;

pub use address::{Address, AddressParseError};
pub use command::Command;
pub use error::{Authority, LedgerError, LedgerResult};
pub use event::LedgerEvent;
pub use points::{Points, PointsParseError};
pub use roles::{Role, RoleMask};
pub use snapshot::{SnapshotStore, StateSnapshot, StoreError};
pub use state::ReferralState;
