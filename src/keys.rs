use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use referral_ledger::Address;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("key file {path} is not hex: {source}")]
    Hex {
        path: PathBuf,
        source: hex::FromHexError,
    },
}

/// Write a fresh Ed25519 secret key as 64 hex characters. Refuses to
/// overwrite an existing file.
pub fn generate(path: &Path) -> Result<SigningKey, KeyError> {
    let io_err = |source: std::io::Error| KeyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let sk = SigningKey::generate(&mut OsRng);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_err)?;
    let encoded = hex::encode(sk.to_bytes());
    writeln!(file, "{encoded}").map_err(io_err)?;
    Ok(sk)
}

pub fn load(path: &Path) -> Result<SigningKey, KeyError> {
    let raw = fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut secret = [0u8; 32];
    hex::decode_to_slice(raw.trim(), &mut secret).map_err(|source| KeyError::Hex {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SigningKey::from_bytes(&secret))
}

pub fn address_of(sk: &SigningKey) -> Address {
    Address::from_verifying_key(&sk.verifying_key())
}

/// Address of the key stored at `path`; this is the caller identity of every
/// mutating subcommand.
pub fn load_address(path: &Path) -> Result<Address, KeyError> {
    load(path).map(|sk| address_of(&sk))
}
