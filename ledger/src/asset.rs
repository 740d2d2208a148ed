//! # Asset & Account Identifiers
//!
//! Two identifier types underpin every ledger operation:
//!
//! - [`AssetId`] — what is being moved: a 20-byte token contract address,
//!   or the [`AssetId::Native`] sentinel for the chain's native currency.
//! - [`AccountId`] — who is moving it: a 32-byte value, in practice the
//!   Ed25519 public key of the account holder.
//!
//! Both serialize as strings (`"native"` / `"0x…"` / hex) so that maps
//! keyed by them stay valid JSON — the same trick the balance-sheet
//! persistence layer relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::HavenPublicKey;

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Length of a token contract address in bytes.
pub const TOKEN_ADDRESS_LENGTH: usize = 20;

/// Identifies an asset that can move through the vault.
///
/// The whitelist, the per-asset rate-limit windows, and the custody
/// collaborator are all keyed by this type. `Native` is a distinct sentinel
/// rather than a magic address so that "the native currency" can never
/// collide with a deployable token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AssetId {
    /// The chain's native currency (value carried with the call in the
    /// original deployment; an ordinary custody entry here).
    Native,
    /// A token contract, identified by its 20-byte address.
    Token([u8; TOKEN_ADDRESS_LENGTH]),
}

/// Errors parsing an [`AssetId`] or [`AccountId`] from its string form.
#[derive(Debug, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid asset identifier: expected \"native\" or 0x-prefixed 20-byte hex")]
    InvalidAsset,

    #[error("invalid account identifier: expected 32-byte hex")]
    InvalidAccount,
}

impl AssetId {
    /// Builds a token asset from a hex address, with or without `0x` prefix.
    pub fn token_from_hex(s: &str) -> Result<Self, IdParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| IdParseError::InvalidAsset)?;
        if bytes.len() != TOKEN_ADDRESS_LENGTH {
            return Err(IdParseError::InvalidAsset);
        }
        let mut arr = [0u8; TOKEN_ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(AssetId::Token(arr))
    }

    /// Appends the canonical byte encoding of this asset to `buf`.
    ///
    /// One discriminant byte followed by the address bytes (absent for
    /// `Native`). Part of the signed withdrawal message format — must
    /// never change once authorizations are in the wild.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            AssetId::Native => buf.push(0x00),
            AssetId::Token(addr) => {
                buf.push(0x01);
                buf.extend_from_slice(addr);
            }
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(addr) => write!(f, "0x{}", hex::encode(addr)),
        }
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self)
    }
}

impl FromStr for AssetId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "native" {
            return Ok(AssetId::Native);
        }
        Self::token_from_hex(s)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AssetId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A 32-byte account address.
///
/// In practice this is the raw bytes of the holder's Ed25519 public key —
/// the same bytes the validator binds into a withdrawal authorization, so
/// an authorization issued to one account can never be redeemed by another.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Creates an `AccountId` from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex-encoded address.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded address.
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| IdParseError::InvalidAccount)?;
        if bytes.len() != 32 {
            return Err(IdParseError::InvalidAccount);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl From<&HavenPublicKey> for AccountId {
    fn from(pk: &HavenPublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({}...)", &self.to_hex()[..12])
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for AccountId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn native_string_roundtrip() {
        let parsed: AssetId = "native".parse().unwrap();
        assert_eq!(parsed, AssetId::Native);
        assert_eq!(AssetId::Native.to_string(), "native");
    }

    #[test]
    fn token_string_roundtrip() {
        let id = AssetId::Token([0xAB; 20]);
        let parsed: AssetId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn token_hex_accepts_with_and_without_prefix() {
        let hex40 = "ab".repeat(20);
        let a = AssetId::token_from_hex(&hex40).unwrap();
        let b = AssetId::token_from_hex(&format!("0x{hex40}")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_asset_strings_rejected() {
        assert!("".parse::<AssetId>().is_err());
        assert!("0x1234".parse::<AssetId>().is_err());
        assert!("nativ".parse::<AssetId>().is_err());
    }

    #[test]
    fn encoding_disambiguates_native_from_tokens() {
        let mut native = Vec::new();
        AssetId::Native.encode_into(&mut native);

        let mut token = Vec::new();
        AssetId::Token([0u8; 20]).encode_into(&mut token);

        // An all-zero token address must not encode like the native sentinel.
        assert_ne!(native, token);
    }

    #[test]
    fn asset_map_serializes_with_string_keys() {
        let mut map: HashMap<AssetId, u64> = HashMap::new();
        map.insert(AssetId::Native, 1);
        map.insert(AssetId::Token([7; 20]), 2);

        let json = serde_json::to_string(&map).expect("serialize");
        let recovered: HashMap<AssetId, u64> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered, map);
    }

    #[test]
    fn account_hex_roundtrip() {
        let id = AccountId::from_bytes([0x42; 32]);
        let recovered = AccountId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn account_rejects_wrong_length() {
        assert!(AccountId::from_hex("deadbeef").is_err());
    }

    #[test]
    fn account_from_public_key_uses_raw_bytes() {
        let kp = crate::crypto::HavenKeypair::generate();
        let pk = kp.public_key();
        let id = AccountId::from(&pk);
        assert_eq!(id.as_bytes(), pk.as_bytes());
    }
}
