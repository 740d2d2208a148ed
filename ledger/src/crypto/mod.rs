//! # Cryptographic Primitives for HAVEN
//!
//! Everything security-related in the ledger flows through here: the
//! validator keys that authorize withdrawals and the hash that canonicalizes
//! authorization messages.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **BLAKE3** for hashing — because we live in the future.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then go read about timing attacks and come back when you've
//! lost the urge.

pub mod hash;
pub mod keys;

pub use hash::blake3_hash;
pub use keys::{HavenKeypair, HavenPublicKey, HavenSignature, KeyError};
