//! # Withdrawal Authorization
//!
//! Nothing leaves the vault without the validator's say-so. The off-chain
//! matching service watches deposits, decides a payout, and signs a
//! [`WithdrawalAuthorization`]; the user hands that signature to
//! [`crate::vault::VaultLedger::withdraw`], which verifies it against the
//! configured validator key.
//!
//! ## Canonical Message Format
//!
//! The signed message is the BLAKE3 hash of:
//!
//! ```text
//! AUTHORIZATION_DOMAIN_TAG
//! || chain_id   (8 bytes, big-endian)
//! || user       (32 bytes)
//! || token_in   (tagged asset encoding)
//! || token_out  (tagged asset encoding)
//! || amount_out (8 bytes, big-endian)
//! || nonce      (16 bytes, big-endian)
//! ```
//!
//! Every field is either fixed-width or self-delimiting (the asset tag),
//! so no two distinct tuples share an encoding. The chain ID pins an
//! authorization to one deployment; the user binds it to one redeemer;
//! the nonce makes it single-use (enforced by the vault's replay set,
//! not by this module).
//!
//! ## Verification as a capability
//!
//! The vault checks signatures through the [`SignatureVerifier`] trait
//! rather than calling the crypto module directly. Production uses
//! [`Ed25519Verifier`]; tests that only care about rate-limit or replay
//! behavior inject a permissive fake and skip key management entirely.

use serde::{Deserialize, Serialize};

use crate::asset::{AccountId, AssetId};
use crate::config::AUTHORIZATION_DOMAIN_TAG;
use crate::crypto::{blake3_hash, HavenKeypair, HavenPublicKey, HavenSignature};

// ---------------------------------------------------------------------------
// WithdrawalAuthorization
// ---------------------------------------------------------------------------

/// The tuple a validator signs to approve one withdrawal.
///
/// `token_in` is the asset the user originally deposited — carried as
/// matching metadata and bound into the signature, but never moved by the
/// withdrawal itself. `token_out` is what actually leaves the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalAuthorization {
    /// The account allowed to redeem this authorization.
    pub user: AccountId,
    /// The deposited asset this payout corresponds to.
    pub token_in: AssetId,
    /// The asset to pay out.
    pub token_out: AssetId,
    /// The payout amount in smallest units.
    pub amount_out: u64,
    /// One-time-use value chosen by the off-chain service.
    pub nonce: u128,
}

impl WithdrawalAuthorization {
    /// Computes the canonical 32-byte message hash for this authorization
    /// on the given chain.
    pub fn message_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(128);
        preimage.extend_from_slice(AUTHORIZATION_DOMAIN_TAG);
        preimage.extend_from_slice(&chain_id.to_be_bytes());
        preimage.extend_from_slice(self.user.as_bytes());
        self.token_in.encode_into(&mut preimage);
        self.token_out.encode_into(&mut preimage);
        preimage.extend_from_slice(&self.amount_out.to_be_bytes());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        blake3_hash(&preimage)
    }

    /// Signs this authorization with a validator keypair.
    ///
    /// This is the off-chain service's half of the protocol, provided here
    /// so integration tests (and the devnet node) can exercise the full
    /// authorize→submit flow.
    pub fn sign(&self, chain_id: u64, validator: &HavenKeypair) -> HavenSignature {
        validator.sign(&self.message_hash(chain_id))
    }
}

// ---------------------------------------------------------------------------
// SignatureVerifier
// ---------------------------------------------------------------------------

/// Verifies that a message hash was signed by the expected signer.
pub trait SignatureVerifier {
    /// Returns `true` if `signature` is `expected_signer`'s signature over
    /// `message_hash`.
    fn verify(
        &self,
        message_hash: &[u8; 32],
        signature: &HavenSignature,
        expected_signer: &HavenPublicKey,
    ) -> bool;
}

/// The production verifier: plain Ed25519 over the message hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        message_hash: &[u8; 32],
        signature: &HavenSignature,
        expected_signer: &HavenPublicKey,
    ) -> bool {
        expected_signer.verify(message_hash, signature)
    }
}
