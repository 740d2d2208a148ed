//! End-to-end integration tests for the HAVEN ledger.
//!
//! These tests exercise the full custody lifecycle the way the node drives
//! it: keypair generation, deposits, validator-signed withdrawal
//! authorizations with real Ed25519 signatures, rate-limit windows rolling
//! across simulated hours, stake locks maturing across simulated months,
//! and checkpoint persistence through a restart.
//!
//! Each test stands alone with its own in-memory bank and manual clock.
//! No shared state, no test ordering dependencies, no flaky failures.

use chrono::{DateTime, Utc};

use haven_ledger::calendar::{days_from_civil, SECONDS_PER_DAY};
use haven_ledger::clock::{Clock, ManualClock};
use haven_ledger::config::CHAIN_ID_DEVNET;
use haven_ledger::snapshot::Checkpoint;
use haven_ledger::{
    AccountId, AssetCustody, AssetId, Ed25519Verifier, HavenKeypair, InMemoryCustody, StakeError,
    StakeLedger, VaultConfig, VaultError, VaultLedger, WithdrawalAuthorization,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const WINDOW_SECS: u64 = 3_600;

fn owner() -> AccountId {
    AccountId::from_bytes([0xAA; 32])
}

fn vault_acct() -> AccountId {
    AccountId::from_bytes([0xFF; 32])
}

fn usdc() -> AssetId {
    AssetId::Token([0x11; 20])
}

fn hvn() -> AssetId {
    AssetId::Token([0x22; 20])
}

fn midnight(year: i32, month: u32, day: u32) -> i64 {
    days_from_civil(year, month, day) * SECONDS_PER_DAY
}

/// Spins up a whitelisted vault with a real Ed25519 validator and a user
/// holding `user_funds` of usdc.
fn setup_vault(
    limit_bps: u32,
    user_funds: u64,
) -> (
    VaultLedger<InMemoryCustody, Ed25519Verifier>,
    HavenKeypair,
    HavenKeypair,
    AccountId,
) {
    let validator = HavenKeypair::generate();
    let user_kp = HavenKeypair::generate();
    let user = AccountId::from(&user_kp.public_key());

    let mut bank = InMemoryCustody::new(vault_acct());
    bank.mint(usdc(), &user, user_funds).expect("mint");

    let config = VaultConfig {
        chain_id: CHAIN_ID_DEVNET,
        validator: validator.public_key(),
        withdrawal_limit_bps: limit_bps,
        window_duration_secs: WINDOW_SECS,
    };
    let mut vault = VaultLedger::new(owner(), vault_acct(), config, bank).expect("vault");
    vault.add_to_whitelist(&owner(), usdc()).expect("whitelist");
    (vault, validator, user_kp, user)
}

/// Builds a signed authorization paying `amount` of usdc to `user`.
fn authorize(
    validator: &HavenKeypair,
    user: AccountId,
    amount: u64,
    nonce: u128,
) -> (
    WithdrawalAuthorization,
    haven_ledger::HavenSignature,
) {
    let auth = WithdrawalAuthorization {
        user,
        token_in: usdc(),
        token_out: usdc(),
        amount_out: amount,
        nonce,
    };
    let sig = auth.sign(CHAIN_ID_DEVNET, validator);
    (auth, sig)
}

// ---------------------------------------------------------------------------
// Vault lifecycle
// ---------------------------------------------------------------------------

#[test]
fn deposit_authorize_withdraw_lifecycle() {
    let (mut vault, validator, _user_kp, user) = setup_vault(5_000, 1_000);
    let clock = ManualClock::starting_at(midnight(2025, 6, 1));

    // User deposits the full 1000 into custody.
    let receipt = vault.deposit(&user, usdc(), usdc(), 1_000, clock.now()).expect("deposit");
    assert_eq!(receipt.vault_balance, 1_000);
    assert_eq!(vault.custody().balance_of(usdc(), &user), 0);

    // The matching service authorizes a 400 payout; the user redeems it.
    let (auth, sig) = authorize(&validator, user, 400, 1);
    clock.advance(60);
    let receipt = vault.withdraw(&user, &auth, &sig, clock.now()).expect("withdraw");
    assert_eq!(receipt.amount, 400);
    assert_eq!(receipt.window_remaining, 100);
    assert_eq!(vault.custody().balance_of(usdc(), &user), 400);
    assert_eq!(vault.vault_balance(usdc()), 600);

    // Replaying the same authorization fails and moves nothing.
    clock.advance(10);
    let replay = vault.withdraw(&user, &auth, &sig, clock.now());
    assert!(matches!(replay, Err(VaultError::AuthorizationReused { nonce: 1 })));
    assert_eq!(vault.custody().balance_of(usdc(), &user), 400);
}

#[test]
fn rate_limit_windows_roll_across_hours() {
    let (mut vault, validator, _user_kp, user) = setup_vault(5_000, 1_000);
    let clock = ManualClock::starting_at(midnight(2025, 6, 1));
    vault.deposit(&user, usdc(), usdc(), 1_000, clock.now()).expect("deposit");

    // Hour 1: allowance is 500. Spend all of it.
    let (auth, sig) = authorize(&validator, user, 500, 1);
    vault.withdraw(&user, &auth, &sig, clock.now()).expect("hour 1");

    // A validly signed payout over the drained window is refused.
    let (auth, sig) = authorize(&validator, user, 100, 2);
    clock.advance(1_800);
    let blocked = vault.withdraw(&user, &auth, &sig, clock.now());
    assert!(matches!(
        blocked,
        Err(VaultError::OverWithdrawalLimit { remaining: 0, requested: 100, .. })
    ));

    // Hour 2: the window rolls and snapshots the reduced balance (500),
    // so the new allowance is 250. The previously refused payout clears.
    clock.advance(1_800);
    let receipt = vault.withdraw(&user, &auth, &sig, clock.now()).expect("hour 2");
    assert_eq!(receipt.window_remaining, 150);

    // Hour 3: balance 400, allowance 200.
    clock.advance(WINDOW_SECS as i64);
    let (auth, sig) = authorize(&validator, user, 201, 3);
    let blocked = vault.withdraw(&user, &auth, &sig, clock.now());
    assert!(matches!(
        blocked,
        Err(VaultError::OverWithdrawalLimit { remaining: 200, requested: 201, .. })
    ));
}

#[test]
fn forged_and_misdirected_authorizations_never_pay_out() {
    let (mut vault, validator, _user_kp, user) = setup_vault(10_000, 1_000);
    let clock = ManualClock::starting_at(midnight(2025, 6, 1));
    vault.deposit(&user, usdc(), usdc(), 1_000, clock.now()).expect("deposit");

    // Self-signed by the user instead of the validator.
    let forger = HavenKeypair::generate();
    let forged = WithdrawalAuthorization {
        user,
        token_in: usdc(),
        token_out: usdc(),
        amount_out: 1_000,
        nonce: 1,
    };
    let bad_sig = forged.sign(CHAIN_ID_DEVNET, &forger);
    let result = vault.withdraw(&user, &forged, &bad_sig, clock.now());
    assert!(matches!(result, Err(VaultError::InvalidAuthorization)));

    // Properly signed but issued to somebody else.
    let other = AccountId::from_bytes([0x33; 32]);
    let (auth, sig) = authorize(&validator, other, 500, 2);
    let result = vault.withdraw(&user, &auth, &sig, clock.now());
    assert!(matches!(result, Err(VaultError::InvalidAuthorization)));

    // Nothing ever left custody.
    assert_eq!(vault.vault_balance(usdc()), 1_000);
}

// ---------------------------------------------------------------------------
// Stake lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stake_locks_through_the_calendar() {
    let user = AccountId::from_bytes([1; 32]);
    let mut bank = InMemoryCustody::new(vault_acct());
    bank.mint(hvn(), &user, 2_000).expect("mint");
    let mut stakes = StakeLedger::new(hvn(), bank);

    // Lock 1500 for 6 months on the last day of March.
    let clock = ManualClock::starting_at(midnight(2025, 3, 31) + 12 * 3_600);
    let receipt = stakes.stake(&user, 1_500, 6, clock.now()).expect("stake");
    assert_eq!(receipt.matures_at, midnight(2025, 9, 30) + 12 * 3_600);

    // Mid-term withdrawal attempts keep failing.
    clock.set(midnight(2025, 7, 1));
    assert!(matches!(
        stakes.withdraw_stake(&user, clock.now()),
        Err(StakeError::NotMatured { .. })
    ));
    clock.set(midnight(2025, 9, 30));
    assert!(matches!(
        stakes.withdraw_stake(&user, clock.now()),
        Err(StakeError::NotMatured { .. })
    ));

    // Noon on 30 September is the maturity instant.
    clock.set(midnight(2025, 9, 30) + 12 * 3_600);
    let receipt = stakes.withdraw_stake(&user, clock.now()).expect("withdraw");
    assert_eq!(receipt.amount, 1_500);
    assert_eq!(stakes.custody().balance_of(hvn(), &user), 2_000);
    assert!(stakes.stake_of(&user).is_none());
}

#[test]
fn leap_day_stake_round_trip() {
    let user = AccountId::from_bytes([1; 32]);
    let mut bank = InMemoryCustody::new(vault_acct());
    bank.mint(hvn(), &user, 1_000).expect("mint");
    let mut stakes = StakeLedger::new(hvn(), bank);

    let clock = ManualClock::starting_at(midnight(2028, 2, 29));
    let receipt = stakes.stake(&user, 1_000, 12, clock.now()).expect("stake");
    assert_eq!(receipt.matures_at, midnight(2029, 2, 28));

    clock.set(midnight(2029, 2, 27));
    assert!(matches!(
        stakes.withdraw_stake(&user, clock.now()),
        Err(StakeError::NotMatured { .. })
    ));

    clock.set(midnight(2029, 2, 28));
    stakes.withdraw_stake(&user, clock.now()).expect("withdraw");
}

// ---------------------------------------------------------------------------
// Checkpoint persistence
// ---------------------------------------------------------------------------

#[test]
fn node_state_survives_a_restart() {
    let (mut vault, validator, _user_kp, user) = setup_vault(5_000, 1_000);
    let clock = ManualClock::starting_at(midnight(2025, 6, 1));
    vault.deposit(&user, usdc(), usdc(), 1_000, clock.now()).expect("deposit");

    let (auth, sig) = authorize(&validator, user, 300, 77);
    vault.withdraw(&user, &auth, &sig, clock.now()).expect("withdraw");

    let mut stake_bank = InMemoryCustody::new(vault_acct());
    stake_bank.mint(hvn(), &user, 500).expect("mint");
    let mut stakes = StakeLedger::new(hvn(), stake_bank);
    stakes.stake(&user, 500, 12, clock.now()).expect("stake");

    // Checkpoint to disk, then rebuild everything from the file.
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("haven.checkpoint.json");
    Checkpoint::new(
        clock.now().timestamp(),
        vault.state(),
        vault.custody().clone(),
        stakes.state(),
        stakes.custody().clone(),
    )
    .save_json(&path)
    .expect("save");

    let loaded = Checkpoint::<InMemoryCustody>::load_json(&path).expect("load");
    let mut vault =
        VaultLedger::from_state(loaded.vault, loaded.vault_custody, Ed25519Verifier)
            .expect("restore vault");
    let stakes = StakeLedger::from_state(loaded.stake, loaded.stake_custody);

    // The burned nonce stays burned across the restart.
    let replay = vault.withdraw(&user, &auth, &sig, clock.now());
    assert!(matches!(replay, Err(VaultError::AuthorizationReused { nonce: 77 })));

    // The open window survives with its spend intact.
    let window = vault.window_of(usdc()).expect("window");
    assert_eq!(window.withdrawn_in_window, 300);
    assert_eq!(window.limit_snapshot, 500);

    // The stake lock survives too.
    assert_eq!(stakes.stake_of(&user).expect("stake").amount, 500);

    // And a fresh, properly signed payout still clears under the old window.
    let (auth, sig) = authorize(&validator, user, 200, 78);
    let receipt = vault.withdraw(&user, &auth, &sig, clock.now()).expect("withdraw");
    assert_eq!(receipt.window_remaining, 0);
}

#[test]
fn manual_clock_drives_deterministic_timestamps() {
    let clock = ManualClock::starting_at(midnight(2025, 1, 1));
    let t0: DateTime<Utc> = clock.now();
    clock.advance(WINDOW_SECS as i64);
    assert_eq!(clock.now().timestamp() - t0.timestamp(), WINDOW_SECS as i64);
}
