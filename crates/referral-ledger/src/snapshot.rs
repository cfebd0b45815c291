use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    address::Address,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    known::KnownAddresses,
    ledger::{PointsLedger, PointsRecord},
    points::Points,
    roles::{AccessControl, RoleMask},
    state::ReferralState,
};

pub type StateRoot = [u8; 32];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HolderEntry {
    pub account: Address,
    pub issued: Points,
    pub consumed: Points,
}

/// Serializable image of a [`ReferralState`]. Holders and known addresses
/// keep their insertion order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateSnapshot {
    pub owner: Option<Address>,
    pub roles: BTreeMap<Address, RoleMask>,
    pub holders: Vec<HolderEntry>,
    pub known: Vec<Address>,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: StateRoot,
}

impl ReferralState {
    pub fn snapshot(&self) -> StateSnapshot {
        let holders = self
            .ledger
            .holders()
            .iter()
            .map(|account| {
                let record = self.ledger.record(account);
                HolderEntry {
                    account: *account,
                    issued: record.issued,
                    consumed: record.consumed,
                }
            })
            .collect();
        StateSnapshot {
            owner: self.access.owner(),
            roles: self.access.entries().map(|(a, m)| (*a, *m)).collect(),
            holders,
            known: self.known.as_slice().to_vec(),
            events: self.events.clone(),
            state_root: self.state_root(),
        }
    }

    /// Rebuild a state, refusing snapshots that a live state could never
    /// have produced or whose root does not match their content.
    pub fn from_snapshot(snapshot: StateSnapshot) -> LedgerResult<Self> {
        if snapshot.owner.is_some_and(|owner| owner.is_null()) {
            return Err(LedgerError::CorruptSnapshot("null owner".into()));
        }
        if snapshot.roles.values().any(|mask| *mask == RoleMask::NONE) {
            return Err(LedgerError::CorruptSnapshot("empty role entry".into()));
        }

        let records = snapshot.holders.into_iter().map(|entry| {
            let record = PointsRecord {
                issued: entry.issued,
                consumed: entry.consumed,
            };
            (entry.account, record)
        });
        let ledger = PointsLedger::from_records(records)?;
        let known = KnownAddresses::from_list(snapshot.known)?;

        let state = Self {
            access: AccessControl::from_parts(snapshot.owner, snapshot.roles),
            ledger,
            known,
            events: snapshot.events,
        };

        let root = state.state_root();
        if root != snapshot.state_root {
            return Err(LedgerError::CorruptSnapshot(format!(
                "state root mismatch: recorded {}, computed {}",
                hex::encode(snapshot.state_root),
                hex::encode(root)
            )));
        }
        Ok(state)
    }

    /// Merkle root over owner, roles, holder records (in holder order) and
    /// known addresses. The event log is not committed to.
    pub fn state_root(&self) -> StateRoot {
        let mut leaves: Vec<[u8; 32]> = Vec::new();

        let mut hasher = Sha256::new();
        hasher.update(b"owner");
        if let Some(owner) = self.access.owner() {
            hasher.update(owner.as_bytes());
        }
        leaves.push(hasher.finalize().into());

        for (account, mask) in self.access.entries() {
            let mut hasher = Sha256::new();
            hasher.update(b"role");
            hasher.update(account.as_bytes());
            hasher.update(mask.bits().to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        for account in self.ledger.holders() {
            let record = self.ledger.record(account);
            let mut hasher = Sha256::new();
            hasher.update(b"holder");
            hasher.update(account.as_bytes());
            update_points(&mut hasher, record.issued);
            update_points(&mut hasher, record.consumed);
            leaves.push(hasher.finalize().into());
        }
        for account in self.known.as_slice() {
            let mut hasher = Sha256::new();
            hasher.update(b"known");
            hasher.update(account.as_bytes());
            leaves.push(hasher.finalize().into());
        }

        build_merkle(leaves)
    }
}

fn update_points(hasher: &mut Sha256, points: Points) {
    let decimal = points.to_string();
    hasher.update((decimal.len() as u8).to_le_bytes());
    hasher.update(decimal.as_bytes());
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    // The owner leaf is always present, so there is exactly one leaf left.
    leaves.first().copied().unwrap_or_default()
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut root = [0u8; 32];
        hex::decode_to_slice(&encoded, &mut root).map_err(D::Error::custom)?;
        Ok(root)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed snapshot file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// JSON snapshot file. Writes go to a sibling temp file that is renamed into
/// place, so a crash never leaves a half-written state behind.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Option<StateSnapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let snapshot = serde_json::from_slice(&data).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    /// Load and rebuild the state in one go.
    pub fn load_state(&self) -> Result<Option<ReferralState>, StoreError> {
        match self.load()? {
            Some(snapshot) => Ok(Some(ReferralState::from_snapshot(snapshot)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let data = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
