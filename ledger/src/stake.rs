//! # Stake Ledger
//!
//! Term-locked staking: an account locks an amount of the staking token
//! for 6, 12, or 24 months and can reclaim it once the lock matures.
//! Maturity is calendar arithmetic, not duration arithmetic — "12 months"
//! means the same day-of-month a year later (clamped to short months), so
//! a lock opened 29 February 2028 matures 28 February 2029. The math
//! lives in [`crate::calendar`].
//!
//! Each account holds at most one stake slot. Opening a stake while one
//! is active replaces the record outright: the previously locked amount
//! stays in custody with no record pointing at it. That is how the
//! original deployment behaved and downstream accounting depends on it,
//! so it is preserved here and logged loudly instead of being "fixed".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::asset::{AccountId, AssetId};
use crate::calendar;
use crate::config::{is_allowed_term, ALLOWED_STAKE_TERMS};
use crate::custody::{AssetCustody, CustodyError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong with a staking operation.
#[derive(Debug, Error)]
pub enum StakeError {
    /// The requested term is not one of the allowed lock durations.
    #[error("invalid stake term {term_months} months (allowed: {ALLOWED_STAKE_TERMS:?})")]
    InvalidTerm {
        /// The rejected term.
        term_months: u32,
    },

    /// Zero-amount stakes are rejected.
    #[error("stake amount must be non-zero")]
    ZeroAmount,

    /// The account has no stake to withdraw.
    #[error("account has no active stake")]
    NoActiveStake,

    /// The stake exists but its lock has not expired.
    #[error("stake is locked until {matures_at} (now {now})")]
    NotMatured {
        /// Unix timestamp at which withdrawal becomes possible.
        matures_at: i64,
        /// The rejected withdrawal's timestamp.
        now: i64,
    },

    /// The custody collaborator refused the transfer.
    #[error(transparent)]
    Custody(#[from] CustodyError),
}

// ---------------------------------------------------------------------------
// Records & Receipts
// ---------------------------------------------------------------------------

/// One account's active stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    /// Locked amount in smallest units.
    pub amount: u64,
    /// Lock term in whole months.
    pub term_months: u32,
    /// Unix timestamp at which the lock opened.
    pub started_at: i64,
}

impl StakeRecord {
    /// Unix timestamp at which this stake may be withdrawn.
    pub fn matures_at(&self) -> i64 {
        calendar::maturity(self.started_at, self.term_months)
    }

    /// Whether the lock has expired as of `now` (inclusive).
    pub fn is_matured(&self, now: i64) -> bool {
        now >= self.matures_at()
    }
}

/// Returned by [`StakeLedger::stake`] on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub staker: AccountId,
    pub amount: u64,
    pub term_months: u32,
    pub started_at: i64,
    pub matures_at: i64,
}

/// Returned by [`StakeLedger::withdraw_stake`] on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeWithdrawalReceipt {
    pub staker: AccountId,
    pub amount: u64,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Persistent state
// ---------------------------------------------------------------------------

/// The serializable part of a [`StakeLedger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakeState {
    pub staking_token: AssetId,
    pub stakes: HashMap<AccountId, StakeRecord>,
}

// ---------------------------------------------------------------------------
// StakeLedger
// ---------------------------------------------------------------------------

/// The staking state machine. One fixed staking token, one slot per account.
#[derive(Debug)]
pub struct StakeLedger<C> {
    staking_token: AssetId,
    stakes: HashMap<AccountId, StakeRecord>,
    custody: C,
}

impl<C: AssetCustody> StakeLedger<C> {
    /// Creates an empty stake ledger locking `staking_token`.
    pub fn new(staking_token: AssetId, custody: C) -> Self {
        info!(token = %staking_token, "stake ledger initialized");
        Self {
            staking_token,
            stakes: HashMap::new(),
            custody,
        }
    }

    /// Rebuilds a stake ledger from a previously exported [`StakeState`].
    pub fn from_state(state: StakeState, custody: C) -> Self {
        Self {
            staking_token: state.staking_token,
            stakes: state.stakes,
            custody,
        }
    }

    /// Exports the ledger state for persistence.
    pub fn state(&self) -> StakeState {
        StakeState {
            staking_token: self.staking_token,
            stakes: self.stakes.clone(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn staking_token(&self) -> AssetId {
        self.staking_token
    }

    /// The account's active stake, if any.
    pub fn stake_of(&self, account: &AccountId) -> Option<StakeRecord> {
        self.stakes.get(account).copied()
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    // -- operations ---------------------------------------------------------

    /// Locks `amount` of the staking token for `term_months`, starting now.
    pub fn stake(
        &mut self,
        caller: &AccountId,
        amount: u64,
        term_months: u32,
        now: DateTime<Utc>,
    ) -> Result<StakeReceipt, StakeError> {
        if !is_allowed_term(term_months) {
            return Err(StakeError::InvalidTerm { term_months });
        }
        if amount == 0 {
            return Err(StakeError::ZeroAmount);
        }

        self.custody.transfer_in(self.staking_token, caller, amount)?;

        let started_at = now.timestamp();
        let record = StakeRecord {
            amount,
            term_months,
            started_at,
        };
        if let Some(previous) = self.stakes.insert(*caller, record) {
            warn!(
                staker = %caller,
                orphaned_amount = previous.amount,
                "stake slot overwritten; previously locked funds have no record"
            );
        }

        let matures_at = record.matures_at();
        info!(staker = %caller, amount, term_months, matures_at, "stake opened");
        Ok(StakeReceipt {
            staker: *caller,
            amount,
            term_months,
            started_at,
            matures_at,
        })
    }

    /// Returns the account's matured stake and clears the slot.
    pub fn withdraw_stake(
        &mut self,
        caller: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<StakeWithdrawalReceipt, StakeError> {
        let record = self
            .stakes
            .get(caller)
            .copied()
            .ok_or(StakeError::NoActiveStake)?;

        let now_secs = now.timestamp();
        let matures_at = record.matures_at();
        if now_secs < matures_at {
            return Err(StakeError::NotMatured {
                matures_at,
                now: now_secs,
            });
        }

        self.custody
            .transfer_out(self.staking_token, caller, record.amount)?;
        // Slot cleared only after the payout went through.
        self.stakes.remove(caller);

        info!(staker = %caller, amount = record.amount, "stake withdrawn");
        Ok(StakeWithdrawalReceipt {
            staker: *caller,
            amount: record.amount,
            timestamp: now_secs,
        })
    }
}
