//! # Asset Custody Collaborator
//!
//! The ledgers decide *whether* value may move; something else decides *how*.
//! [`AssetCustody`] is that something else: a vault-centric movement
//! interface — pull funds from a user into custody, push funds from custody
//! to a user, and report balances.
//!
//! In the original deployment these were token-contract calls and native
//! value transfers. Here the trait keeps transfer mechanics out of the core
//! so the authorization and rate-limit logic can be tested against the
//! bundled [`InMemoryCustody`] bank, and wired to a real settlement backend
//! in production.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{AccountId, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while moving assets.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// The paying account holds less than the requested amount.
    #[error("insufficient balance: available {available}, requested {requested} (asset {asset})")]
    InsufficientBalance {
        /// The asset being debited.
        asset: AssetId,
        /// The payer's current balance.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// Arithmetic overflow during a credit operation.
    ///
    /// If you're hitting this, someone is trying to credit more than
    /// 18.4 quintillion units. That's either a bug or an attack.
    #[error("balance overflow: current {current}, credit {credit} (asset {asset})")]
    Overflow {
        /// The asset being credited.
        asset: AssetId,
        /// The balance before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// AssetCustody
// ---------------------------------------------------------------------------

/// Vault-centric asset movement.
///
/// `transfer_in` pulls from a user into vault custody; `transfer_out`
/// pushes from vault custody to a user. Implementations must be atomic:
/// a returned error means no balance changed.
pub trait AssetCustody {
    /// Moves `amount` of `asset` from `from` into vault custody.
    fn transfer_in(
        &mut self,
        asset: AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError>;

    /// Moves `amount` of `asset` from vault custody to `to`.
    fn transfer_out(
        &mut self,
        asset: AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError>;

    /// Returns `holder`'s balance of `asset`. Unknown holders read as zero.
    fn balance_of(&self, asset: AssetId, holder: &AccountId) -> u64;
}

// ---------------------------------------------------------------------------
// InMemoryCustody
// ---------------------------------------------------------------------------

/// A complete in-memory bank: per-(asset, holder) balances with overflow
/// protection and non-negative enforcement.
///
/// Used by the test suite and by `haven-node` in devnet mode. The vault's
/// own holdings live under a designated custody account so that
/// `balance_of(asset, vault_account())` is the number the rate limiter
/// snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryCustody {
    /// The account that holds everything currently in vault custody.
    vault: AccountId,

    /// Balances indexed by asset, then holder.
    balances: HashMap<AssetId, HashMap<AccountId, u64>>,
}

impl InMemoryCustody {
    /// Creates an empty bank whose custody account is `vault`.
    pub fn new(vault: AccountId) -> Self {
        Self {
            vault,
            balances: HashMap::new(),
        }
    }

    /// The account under which vault custody is held.
    pub fn vault_account(&self) -> AccountId {
        self.vault
    }

    /// Credits `amount` of `asset` to `holder` out of thin air.
    ///
    /// Test and devnet fixture — the moral equivalent of the mock token's
    /// `mint`.
    pub fn mint(
        &mut self,
        asset: AssetId,
        holder: &AccountId,
        amount: u64,
    ) -> Result<u64, CustodyError> {
        let balance = self.entry(asset, holder);
        let new_balance = balance.checked_add(amount).ok_or(CustodyError::Overflow {
            asset,
            current: *balance,
            credit: amount,
        })?;
        *balance = new_balance;
        Ok(new_balance)
    }

    fn entry(&mut self, asset: AssetId, holder: &AccountId) -> &mut u64 {
        self.balances
            .entry(asset)
            .or_default()
            .entry(*holder)
            .or_insert(0)
    }

    fn transfer(
        &mut self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        let available = self.balance_of(asset, &from);
        if available < amount {
            return Err(CustodyError::InsufficientBalance {
                asset,
                available,
                requested: amount,
            });
        }

        if from == to {
            // A self-transfer is a no-op once covered; writing both sides
            // below would double-count it.
            return Ok(());
        }

        let receiving = self.balance_of(asset, &to);
        let credited = receiving.checked_add(amount).ok_or(CustodyError::Overflow {
            asset,
            current: receiving,
            credit: amount,
        })?;

        // Both sides checked; commit is infallible from here.
        *self.entry(asset, &from) = available - amount;
        *self.entry(asset, &to) = credited;
        Ok(())
    }
}

impl AssetCustody for InMemoryCustody {
    fn transfer_in(
        &mut self,
        asset: AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.transfer(asset, *from, self.vault, amount)
    }

    fn transfer_out(
        &mut self,
        asset: AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.transfer(asset, self.vault, *to, amount)
    }

    fn balance_of(&self, asset: AssetId, holder: &AccountId) -> u64 {
        self.balances
            .get(&asset)
            .and_then(|per_holder| per_holder.get(holder))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> AccountId {
        AccountId::from_bytes([0xFF; 32])
    }

    fn alice() -> AccountId {
        AccountId::from_bytes([1; 32])
    }

    fn usdc() -> AssetId {
        AssetId::Token([2; 20])
    }

    #[test]
    fn mint_credits_holder() {
        let mut bank = InMemoryCustody::new(vault());
        assert_eq!(bank.mint(usdc(), &alice(), 1000).unwrap(), 1000);
        assert_eq!(bank.balance_of(usdc(), &alice()), 1000);
    }

    #[test]
    fn transfer_in_moves_to_vault() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(usdc(), &alice(), 500).unwrap();

        bank.transfer_in(usdc(), &alice(), 300).unwrap();

        assert_eq!(bank.balance_of(usdc(), &alice()), 200);
        assert_eq!(bank.balance_of(usdc(), &vault()), 300);
    }

    #[test]
    fn transfer_out_moves_from_vault() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(usdc(), &vault(), 1000).unwrap();

        bank.transfer_out(usdc(), &alice(), 400).unwrap();

        assert_eq!(bank.balance_of(usdc(), &alice()), 400);
        assert_eq!(bank.balance_of(usdc(), &vault()), 600);
    }

    #[test]
    fn insufficient_balance_rejected_without_side_effects() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(usdc(), &alice(), 100).unwrap();

        let result = bank.transfer_in(usdc(), &alice(), 200);
        assert!(matches!(
            result,
            Err(CustodyError::InsufficientBalance {
                available: 100,
                requested: 200,
                ..
            })
        ));
        assert_eq!(bank.balance_of(usdc(), &alice()), 100);
        assert_eq!(bank.balance_of(usdc(), &vault()), 0);
    }

    #[test]
    fn overflow_rejected() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(usdc(), &vault(), u64::MAX).unwrap();
        bank.mint(usdc(), &alice(), 1).unwrap();

        let result = bank.transfer_in(usdc(), &alice(), 1);
        assert!(matches!(result, Err(CustodyError::Overflow { .. })));
        // Nothing moved.
        assert_eq!(bank.balance_of(usdc(), &alice()), 1);
    }

    #[test]
    fn native_is_an_ordinary_asset_here() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(AssetId::Native, &alice(), 50).unwrap();
        bank.transfer_in(AssetId::Native, &alice(), 50).unwrap();
        assert_eq!(bank.balance_of(AssetId::Native, &vault()), 50);
    }

    #[test]
    fn unknown_holder_reads_zero() {
        let bank = InMemoryCustody::new(vault());
        assert_eq!(bank.balance_of(usdc(), &alice()), 0);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut bank = InMemoryCustody::new(vault());
        bank.mint(usdc(), &alice(), 123).unwrap();

        let json = serde_json::to_string(&bank).expect("serialize");
        let recovered: InMemoryCustody = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.balance_of(usdc(), &alice()), 123);
    }
}
