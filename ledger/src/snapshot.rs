//! # Checkpoints
//!
//! Full-state persistence for a node running both ledgers. A [`Checkpoint`]
//! bundles the vault state, the stake state, and their custody backends
//! into one versioned document that can be written as human-auditable JSON
//! or packed to compact bytes for transport.
//!
//! The replay set and the open rate-limit windows are part of the
//! checkpoint on purpose: restoring a node must not reopen spent windows
//! or resurrect burned nonces.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::stake::StakeState;
use crate::vault::VaultState;

/// Format version written into every checkpoint.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Errors reading or writing checkpoints.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// The file was written by an incompatible release.
    #[error("unsupported checkpoint version {found} (expected {CHECKPOINT_VERSION})")]
    UnsupportedVersion {
        /// The version found in the file.
        found: u32,
    },
}

/// A complete, restorable snapshot of a node's ledger state.
///
/// Generic over the custody backend so the same machinery serves any
/// serializable custody implementation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint<C> {
    /// Format version; checked on load.
    pub version: u32,
    /// Unix timestamp at which the checkpoint was taken.
    pub taken_at: i64,
    pub vault: VaultState,
    pub vault_custody: C,
    pub stake: StakeState,
    pub stake_custody: C,
}

impl<C: Serialize + DeserializeOwned> Checkpoint<C> {
    /// Assembles a checkpoint from the two ledgers' exported parts.
    pub fn new(
        taken_at: i64,
        vault: VaultState,
        vault_custody: C,
        stake: StakeState,
        stake_custody: C,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            taken_at,
            vault,
            vault_custody,
            stake,
            stake_custody,
        }
    }

    /// Writes the checkpoint as pretty JSON, atomically.
    ///
    /// Writes to a sibling `.tmp` file first and renames into place so a
    /// crash mid-write never truncates the previous good checkpoint.
    pub fn save_json(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), "checkpoint written");
        Ok(())
    }

    /// Loads and version-checks a JSON checkpoint.
    pub fn load_json(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        let checkpoint: Self = serde_json::from_str(&json)?;
        checkpoint.check_version()?;
        info!(path = %path.display(), taken_at = checkpoint.taken_at, "checkpoint loaded");
        Ok(checkpoint)
    }

    /// Packs the checkpoint to compact bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Unpacks a checkpoint from [`Checkpoint::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let checkpoint: Self = bincode::deserialize(bytes)?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AccountId, AssetId};
    use crate::crypto::HavenPublicKey;
    use crate::custody::{AssetCustody, InMemoryCustody};
    use crate::stake::StakeLedger;
    use crate::vault::{VaultConfig, VaultLedger};
    use chrono::{DateTime, Utc};

    fn owner() -> AccountId {
        AccountId::from_bytes([0xAA; 32])
    }

    fn vault_acct() -> AccountId {
        AccountId::from_bytes([0xFF; 32])
    }

    fn alice() -> AccountId {
        AccountId::from_bytes([1; 32])
    }

    fn usdc() -> AssetId {
        AssetId::Token([3; 20])
    }

    fn hvn() -> AssetId {
        AssetId::Token([5; 20])
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn sample_checkpoint() -> Checkpoint<InMemoryCustody> {
        let mut bank = InMemoryCustody::new(vault_acct());
        bank.mint(usdc(), &vault_acct(), 1_000).unwrap();
        let config = VaultConfig {
            chain_id: crate::config::CHAIN_ID_DEVNET,
            validator: HavenPublicKey::from_bytes([7; 32]),
            withdrawal_limit_bps: 5_000,
            window_duration_secs: 3_600,
        };
        let mut vault = VaultLedger::new(owner(), vault_acct(), config, bank).unwrap();
        vault.add_to_whitelist(&owner(), usdc()).unwrap();

        let mut stake_bank = InMemoryCustody::new(vault_acct());
        stake_bank.mint(hvn(), &alice(), 500).unwrap();
        let mut stakes = StakeLedger::new(hvn(), stake_bank);
        stakes.stake(&alice(), 500, 12, at(1_750_000_000)).unwrap();

        Checkpoint::new(
            1_750_000_100,
            vault.state(),
            vault.custody().clone(),
            stakes.state(),
            stakes.custody().clone(),
        )
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haven.checkpoint.json");

        let checkpoint = sample_checkpoint();
        checkpoint.save_json(&path).unwrap();

        let loaded = Checkpoint::<InMemoryCustody>::load_json(&path).unwrap();
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert_eq!(loaded.taken_at, 1_750_000_100);
        assert_eq!(loaded.vault_custody.balance_of(usdc(), &vault_acct()), 1_000);
        assert_eq!(loaded.stake.stakes.len(), 1);
    }

    #[test]
    fn save_replaces_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haven.checkpoint.json");

        let mut checkpoint = sample_checkpoint();
        checkpoint.save_json(&path).unwrap();
        checkpoint.taken_at = 1_750_000_200;
        checkpoint.save_json(&path).unwrap();

        let loaded = Checkpoint::<InMemoryCustody>::load_json(&path).unwrap();
        assert_eq!(loaded.taken_at, 1_750_000_200);
        // No stray temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn bytes_roundtrip() {
        let checkpoint = sample_checkpoint();
        let bytes = checkpoint.to_bytes().unwrap();
        let recovered = Checkpoint::<InMemoryCustody>::from_bytes(&bytes).unwrap();
        assert_eq!(recovered.vault.owner, owner());
        assert_eq!(recovered.stake.staking_token, hvn());
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut checkpoint = sample_checkpoint();
        checkpoint.version = 99;
        let bytes = bincode::serialize(&checkpoint).unwrap();

        let result = Checkpoint::<InMemoryCustody>::from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = Checkpoint::<InMemoryCustody>::load_json(Path::new("/nonexistent/ckpt.json"));
        assert!(matches!(result, Err(SnapshotError::Io(_))));
    }
}
