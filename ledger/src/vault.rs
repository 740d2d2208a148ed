//! # Vault Ledger
//!
//! The custody core of HAVEN: users deposit whitelisted assets into the
//! vault, an off-chain validator authorizes payouts by signature, and a
//! per-asset sliding-window rate limiter caps how much can leave custody
//! per window regardless of how many valid authorizations exist.
//!
//! ## Withdrawal pipeline
//!
//! A withdrawal passes these gates, in order:
//!
//! 1. payout asset is whitelisted
//! 2. the caller is the account the authorization was issued to, and the
//!    validator's signature over the canonical message verifies
//! 3. the (caller, nonce) pair has never been redeemed before
//! 4. the amount fits under the current window's remaining allowance
//! 5. custody releases the funds
//!
//! Only after all five succeed does any state change: the window counter,
//! the replay set, and the balances move together or not at all. A rejected
//! withdrawal is invisible — it does not even trigger a window rollover.
//!
//! ## Rate-limit windows
//!
//! Windows are per payout asset and lazily rolled: the first withdrawal at
//! or after `window_start + window_duration` opens a fresh window anchored
//! at that withdrawal's timestamp. The new window's allowance is
//! `limit_bps / 10_000` of the vault's balance of that asset *at the roll
//! moment*, frozen for the life of the window. Deposits arriving mid-window
//! do not raise the cap until the next roll, and configuration changes to
//! the limit take effect the same way.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::asset::{AccountId, AssetId};
use crate::authorization::{Ed25519Verifier, SignatureVerifier, WithdrawalAuthorization};
use crate::config::{BPS_DENOMINATOR, MAX_WITHDRAWAL_LIMIT_BPS};
use crate::crypto::{HavenPublicKey, HavenSignature};
use crate::custody::{AssetCustody, CustodyError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong with a vault operation.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The validator key is the all-zero sentinel.
    #[error("validator key must not be the zero key")]
    InvalidValidator,

    /// The withdrawal limit exceeds 100% of the vault balance.
    #[error("withdrawal limit {limit_bps} bps exceeds 10000")]
    InvalidLimit {
        /// The rejected value.
        limit_bps: u32,
    },

    /// A configuration change was attempted by someone other than the owner.
    #[error("caller {caller} is not the vault owner")]
    NotOwner {
        /// The rejected caller.
        caller: AccountId,
    },

    /// The asset has not been admitted to the vault.
    #[error("asset {asset} is not whitelisted")]
    NotWhitelisted {
        /// The asset in question.
        asset: AssetId,
    },

    /// Zero-amount deposits and withdrawals are meaningless and rejected.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// The signature does not verify, or the caller is not the account the
    /// authorization was issued to. Deliberately one error for both — a
    /// forger learns nothing about which gate stopped them.
    #[error("withdrawal authorization is invalid")]
    InvalidAuthorization,

    /// This (caller, nonce) pair has already been redeemed.
    #[error("authorization nonce {nonce} already used")]
    AuthorizationReused {
        /// The replayed nonce.
        nonce: u128,
    },

    /// The withdrawal would exceed the current window's allowance.
    #[error(
        "withdrawal of {requested} exceeds window allowance: {remaining} remaining (asset {asset})"
    )]
    OverWithdrawalLimit {
        /// The payout asset.
        asset: AssetId,
        /// Allowance left in the current window.
        remaining: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The custody collaborator refused the transfer.
    #[error(transparent)]
    Custody(#[from] CustodyError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment parameters of a vault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Chain this vault is anchored to; bound into every signed message.
    pub chain_id: u64,
    /// The key whose signature authorizes withdrawals.
    pub validator: HavenPublicKey,
    /// Per-window withdrawal cap in basis points of the vault balance.
    pub withdrawal_limit_bps: u32,
    /// Length of a rate-limit window in seconds.
    pub window_duration_secs: u64,
}

impl VaultConfig {
    /// Checks every parameter. Called by the vault constructors and again
    /// when restoring from a snapshot, so a hand-edited state file cannot
    /// smuggle in an invalid configuration.
    ///
    /// A limit of 0 bps is valid: it pauses withdrawals until the owner
    /// raises it. A duration of 0 is valid too: every withdrawal then
    /// re-snapshots its own window.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.validator.is_zero() {
            return Err(VaultError::InvalidValidator);
        }
        if self.withdrawal_limit_bps > MAX_WITHDRAWAL_LIMIT_BPS {
            return Err(VaultError::InvalidLimit {
                limit_bps: self.withdrawal_limit_bps,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Windows & Receipts
// ---------------------------------------------------------------------------

/// One asset's rate-limit window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalWindow {
    /// Unix timestamp at which this window opened.
    pub window_start: i64,
    /// The allowance frozen when the window opened.
    pub limit_snapshot: u64,
    /// Total withdrawn since the window opened.
    pub withdrawn_in_window: u64,
}

impl WithdrawalWindow {
    /// Allowance left before the window cap is hit.
    pub fn remaining(&self) -> u64 {
        self.limit_snapshot.saturating_sub(self.withdrawn_in_window)
    }
}

/// Returned by [`VaultLedger::deposit`] on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub depositor: AccountId,
    pub asset: AssetId,
    /// The payout asset the depositor wants back. Metadata for the off-chain
    /// matcher; not validated and moves nothing here.
    pub requested_out: AssetId,
    pub amount: u64,
    /// Vault custody balance of `asset` after this deposit.
    pub vault_balance: u64,
    pub timestamp: i64,
}

/// Returned by [`VaultLedger::withdraw`] on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub recipient: AccountId,
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub amount: u64,
    pub nonce: u128,
    /// Window allowance left after this withdrawal.
    pub window_remaining: u64,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Persistent state
// ---------------------------------------------------------------------------

/// The serializable heart of a [`VaultLedger`]: everything except the
/// custody backend and the signature verifier, which are runtime wiring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultState {
    pub owner: AccountId,
    /// Account under which the custody backend holds the vault's funds.
    pub vault_account: AccountId,
    pub config: VaultConfig,
    pub whitelist: HashSet<AssetId>,
    pub windows: HashMap<AssetId, WithdrawalWindow>,
    /// Redeemed (account, nonce) pairs.
    pub used_nonces: HashSet<(AccountId, u128)>,
}

// ---------------------------------------------------------------------------
// VaultLedger
// ---------------------------------------------------------------------------

/// The vault state machine, generic over its two collaborators.
///
/// `C` moves funds; `V` checks signatures. Production wires in a real
/// custody backend and [`Ed25519Verifier`]; tests swap either for a fake
/// to exercise one gate at a time.
#[derive(Debug)]
pub struct VaultLedger<C, V = Ed25519Verifier> {
    owner: AccountId,
    vault_account: AccountId,
    config: VaultConfig,
    whitelist: HashSet<AssetId>,
    windows: HashMap<AssetId, WithdrawalWindow>,
    used_nonces: HashSet<(AccountId, u128)>,
    custody: C,
    verifier: V,
}

impl<C: AssetCustody> VaultLedger<C> {
    /// Creates a vault with the production Ed25519 verifier.
    ///
    /// `vault_account` is the account under which `custody` holds the
    /// vault's funds; its balance is what the rate limiter snapshots.
    pub fn new(
        owner: AccountId,
        vault_account: AccountId,
        config: VaultConfig,
        custody: C,
    ) -> Result<Self, VaultError> {
        Self::with_verifier(owner, vault_account, config, custody, Ed25519Verifier)
    }
}

impl<C: AssetCustody, V: SignatureVerifier> VaultLedger<C, V> {
    /// Creates a vault with an explicit signature verifier.
    pub fn with_verifier(
        owner: AccountId,
        vault_account: AccountId,
        config: VaultConfig,
        custody: C,
        verifier: V,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        info!(
            owner = %owner,
            validator = %config.validator,
            limit_bps = config.withdrawal_limit_bps,
            window_secs = config.window_duration_secs,
            "vault ledger initialized"
        );
        Ok(Self {
            owner,
            vault_account,
            config,
            whitelist: HashSet::new(),
            windows: HashMap::new(),
            used_nonces: HashSet::new(),
            custody,
            verifier,
        })
    }

    /// Rebuilds a vault from a previously exported [`VaultState`].
    pub fn from_state(state: VaultState, custody: C, verifier: V) -> Result<Self, VaultError> {
        state.config.validate()?;
        Ok(Self {
            owner: state.owner,
            vault_account: state.vault_account,
            config: state.config,
            whitelist: state.whitelist,
            windows: state.windows,
            used_nonces: state.used_nonces,
            custody,
            verifier,
        })
    }

    /// Exports the ledger state for persistence.
    pub fn state(&self) -> VaultState {
        VaultState {
            owner: self.owner,
            vault_account: self.vault_account,
            config: self.config.clone(),
            whitelist: self.whitelist.clone(),
            windows: self.windows.clone(),
            used_nonces: self.used_nonces.clone(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn vault_account(&self) -> AccountId {
        self.vault_account
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    pub fn is_whitelisted(&self, asset: AssetId) -> bool {
        self.whitelist.contains(&asset)
    }

    /// The stored window for `asset`, if one has ever been opened. May be
    /// expired; callers who care about liveness should compare against
    /// `window_start + window_duration` themselves.
    pub fn window_of(&self, asset: AssetId) -> Option<WithdrawalWindow> {
        self.windows.get(&asset).copied()
    }

    /// Whether `nonce` has been redeemed by `account`.
    pub fn is_nonce_used(&self, account: &AccountId, nonce: u128) -> bool {
        self.used_nonces.contains(&(*account, nonce))
    }

    /// Vault custody balance of `asset`.
    pub fn vault_balance(&self, asset: AssetId) -> u64 {
        self.custody.balance_of(asset, &self.vault_account)
    }

    // -- owner operations ---------------------------------------------------

    fn require_owner(&self, caller: &AccountId) -> Result<(), VaultError> {
        if *caller != self.owner {
            return Err(VaultError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    /// Rotates the validator key. Outstanding authorizations signed by the
    /// old key stop verifying immediately.
    pub fn set_validator(
        &mut self,
        caller: &AccountId,
        validator: HavenPublicKey,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        if validator.is_zero() {
            return Err(VaultError::InvalidValidator);
        }
        info!(validator = %validator, "validator key rotated");
        self.config.validator = validator;
        Ok(())
    }

    /// Changes the withdrawal limit. Open windows keep their frozen
    /// allowance; the new limit applies from each asset's next roll.
    /// 0 bps pauses withdrawals from the next roll on.
    pub fn set_withdrawal_limit(
        &mut self,
        caller: &AccountId,
        limit_bps: u32,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        if limit_bps > MAX_WITHDRAWAL_LIMIT_BPS {
            return Err(VaultError::InvalidLimit { limit_bps });
        }
        info!(limit_bps, "withdrawal limit updated");
        self.config.withdrawal_limit_bps = limit_bps;
        Ok(())
    }

    /// Changes the window duration. Applies to expiry checks immediately,
    /// including for windows already open.
    pub fn set_window_duration(
        &mut self,
        caller: &AccountId,
        duration_secs: u64,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        info!(duration_secs, "window duration updated");
        self.config.window_duration_secs = duration_secs;
        Ok(())
    }

    /// Admits an asset. Idempotent.
    pub fn add_to_whitelist(&mut self, caller: &AccountId, asset: AssetId) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        if self.whitelist.insert(asset) {
            info!(asset = %asset, "asset whitelisted");
        }
        Ok(())
    }

    // -- user operations ----------------------------------------------------

    /// Moves `amount` of `asset` from `caller` into vault custody.
    ///
    /// `requested_out` is which asset the depositor wants paid out on the
    /// other side. It is echoed into the receipt for the off-chain matcher
    /// and otherwise ignored: not whitelisted-checked, moves nothing.
    pub fn deposit(
        &mut self,
        caller: &AccountId,
        asset: AssetId,
        requested_out: AssetId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt, VaultError> {
        if !self.whitelist.contains(&asset) {
            return Err(VaultError::NotWhitelisted { asset });
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        self.custody.transfer_in(asset, caller, amount)?;

        let vault_balance = self.vault_balance(asset);
        info!(
            depositor = %caller,
            asset = %asset,
            requested_out = %requested_out,
            amount,
            vault_balance,
            "deposit accepted"
        );
        Ok(DepositReceipt {
            depositor: *caller,
            asset,
            requested_out,
            amount,
            vault_balance,
            timestamp: now.timestamp(),
        })
    }

    /// Redeems a validator-signed withdrawal authorization.
    ///
    /// See the module docs for the gate order. On any error the ledger is
    /// exactly as it was: no window roll, no nonce burn, no transfer.
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        auth: &WithdrawalAuthorization,
        signature: &HavenSignature,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt, VaultError> {
        if !self.whitelist.contains(&auth.token_out) {
            return Err(VaultError::NotWhitelisted {
                asset: auth.token_out,
            });
        }
        if auth.amount_out == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if auth.user != *caller {
            return Err(VaultError::InvalidAuthorization);
        }
        let message_hash = auth.message_hash(self.config.chain_id);
        if !self
            .verifier
            .verify(&message_hash, signature, &self.config.validator)
        {
            return Err(VaultError::InvalidAuthorization);
        }

        let nonce_key = (*caller, auth.nonce);
        if self.used_nonces.contains(&nonce_key) {
            return Err(VaultError::AuthorizationReused { nonce: auth.nonce });
        }

        // Work on a scratch copy of the window. A roll computed here is
        // discarded along with everything else if any later gate fails.
        let now_secs = now.timestamp();
        let mut window = self.rolled_window(auth.token_out, now_secs);
        let remaining = window.remaining();
        if auth.amount_out > remaining {
            return Err(VaultError::OverWithdrawalLimit {
                asset: auth.token_out,
                remaining,
                requested: auth.amount_out,
            });
        }
        // Bounded by remaining, so this cannot overflow.
        window.withdrawn_in_window += auth.amount_out;

        self.custody
            .transfer_out(auth.token_out, caller, auth.amount_out)?;

        // Past the last fallible step; commit everything together.
        self.windows.insert(auth.token_out, window);
        self.used_nonces.insert(nonce_key);

        let window_remaining = window.remaining();
        info!(
            recipient = %caller,
            asset = %auth.token_out,
            amount = auth.amount_out,
            nonce = auth.nonce,
            window_remaining,
            "withdrawal released"
        );
        Ok(WithdrawalReceipt {
            recipient: *caller,
            token_in: auth.token_in,
            token_out: auth.token_out,
            amount: auth.amount_out,
            nonce: auth.nonce,
            window_remaining,
            timestamp: now_secs,
        })
    }

    /// The window a withdrawal at `now_secs` would count against, rolling
    /// a fresh one if none exists or the stored one has expired. Pure read;
    /// the caller commits (or discards) the result.
    fn rolled_window(&self, asset: AssetId, now_secs: i64) -> WithdrawalWindow {
        let duration = self.config.window_duration_secs as i64;
        match self.windows.get(&asset) {
            Some(window) if now_secs < window.window_start.saturating_add(duration) => *window,
            _ => WithdrawalWindow {
                window_start: now_secs,
                limit_snapshot: self.limit_for_balance(self.vault_balance(asset)),
                withdrawn_in_window: 0,
            },
        }
    }

    /// `limit_bps / 10_000` of `balance`, rounded down. Widened to u128 so
    /// the multiply cannot overflow near `u64::MAX`.
    fn limit_for_balance(&self, balance: u64) -> u64 {
        let product = u128::from(balance) * u128::from(self.config.withdrawal_limit_bps);
        (product / u128::from(BPS_DENOMINATOR)) as u64
    }
}
