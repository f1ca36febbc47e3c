//! Vote escrow: locked governance tokens with linearly decaying voting power.
//!
//! Voting power = amount * (unlock_at - t) / (unlock_at - created_at)
//!
//! Power equals the locked amount when the lock is created and reaches
//! exactly zero at `unlock_at`. One lock per holder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vegov_ledger::TokenLedger;
use vegov_types::{Address, Timestamp, U256};

use crate::error::GovernanceError;
use crate::math;

/// Escrowed deposit of the governance token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Holder
    pub owner: Address,
    /// Amount of tokens locked
    pub amount: U256,
    /// When the lock was created
    pub created_at: Timestamp,
    /// When the tokens can be withdrawn
    pub unlock_at: Timestamp,
}

impl Lock {
    /// Check if lock has expired.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.unlock_at
    }

    /// Voting power of this lock at `at`.
    ///
    /// Zero before the lock existed and from `unlock_at` on.
    pub fn voting_power(&self, at: Timestamp) -> Result<U256, GovernanceError> {
        if at < self.created_at || at >= self.unlock_at {
            return Ok(U256::ZERO);
        }
        math::mul_div(
            self.amount,
            U256::from(self.unlock_at - at),
            U256::from(self.unlock_at - self.created_at),
        )
    }
}

/// Holds every lock and the escrowed governance tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingEscrow {
    /// Governance token locked here
    token: Address,
    /// Ledger account holding the escrowed tokens
    account: Address,
    /// Longest allowed lock, in seconds
    max_lock_duration: u64,
    /// Locks by holder
    locks: BTreeMap<Address, Lock>,
    /// Sum of all locked amounts
    total_locked: U256,
}

impl VotingEscrow {
    pub fn new(token: Address, account: Address, max_lock_duration: u64) -> Self {
        Self {
            token,
            account,
            max_lock_duration,
            locks: BTreeMap::new(),
            total_locked: U256::ZERO,
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn max_lock_duration(&self) -> u64 {
        self.max_lock_duration
    }

    /// Lock `amount` for `duration` seconds.
    ///
    /// # Errors
    /// - `InvalidAmount` for a zero amount
    /// - `InvalidDuration` for a zero duration or one above the maximum
    /// - `LockAlreadyExists` if the caller still holds a lock
    /// - ledger failures (`InsufficientBalance`, `InsufficientAllowance`)
    pub fn create_lock(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        amount: U256,
        duration: u64,
        now: Timestamp,
    ) -> Result<Lock, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }
        if duration == 0 || duration > self.max_lock_duration {
            return Err(GovernanceError::InvalidDuration(duration));
        }
        if self.locks.contains_key(&caller) {
            return Err(GovernanceError::LockAlreadyExists);
        }

        let unlock_at = now
            .checked_add(duration)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        let total_locked = math::add(self.total_locked, amount)?;
        let lock = Lock {
            owner: caller,
            amount,
            created_at: now,
            unlock_at,
        };

        let prev_total = self.total_locked;
        self.locks.insert(caller, lock.clone());
        self.total_locked = total_locked;

        let deposited =
            ledger.transfer_from(&self.token, &self.account, &caller, &self.account, amount);
        if let Err(e) = deposited {
            self.locks.remove(&caller);
            self.total_locked = prev_total;
            tracing::warn!(holder = %caller, error = %e, "lock deposit reverted");
            return Err(e.into());
        }

        tracing::info!(holder = %caller, amount = %amount, unlock_at, "lock created");
        Ok(lock)
    }

    /// Add `extra` tokens to an existing, unexpired lock.
    pub fn increase_amount(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        extra: U256,
        now: Timestamp,
    ) -> Result<Lock, GovernanceError> {
        if extra.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }
        let prev = self.active_lock(&caller, now)?.clone();

        let mut lock = prev.clone();
        lock.amount = math::add(lock.amount, extra)?;
        let total_locked = math::add(self.total_locked, extra)?;

        let prev_total = self.total_locked;
        self.locks.insert(caller, lock.clone());
        self.total_locked = total_locked;

        let deposited =
            ledger.transfer_from(&self.token, &self.account, &caller, &self.account, extra);
        if let Err(e) = deposited {
            self.locks.insert(caller, prev);
            self.total_locked = prev_total;
            tracing::warn!(holder = %caller, error = %e, "lock increase reverted");
            return Err(e.into());
        }

        tracing::info!(holder = %caller, extra = %extra, amount = %lock.amount, "lock increased");
        Ok(lock)
    }

    /// Move the unlock time of an unexpired lock later, to `new_unlock`.
    pub fn extend_duration(
        &mut self,
        caller: Address,
        new_unlock: Timestamp,
        now: Timestamp,
    ) -> Result<Lock, GovernanceError> {
        let max_lock_duration = self.max_lock_duration;
        let current = self.active_lock(&caller, now)?.unlock_at;

        if new_unlock <= current {
            return Err(GovernanceError::DurationDecrease {
                current,
                requested: new_unlock,
            });
        }
        if new_unlock - now > max_lock_duration {
            return Err(GovernanceError::InvalidDuration(new_unlock - now));
        }

        let lock = self
            .locks
            .get_mut(&caller)
            .ok_or(GovernanceError::NoActiveLock)?;
        lock.unlock_at = new_unlock;

        tracing::info!(holder = %caller, unlock_at = new_unlock, "lock extended");
        Ok(lock.clone())
    }

    /// Return the principal of an expired lock and delete it.
    ///
    /// # Errors
    /// - `NoActiveLock` if the caller holds no lock
    /// - `LockNotExpired` before `unlock_at`
    pub fn withdraw(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        let lock = self.locks.get(&caller).ok_or(GovernanceError::NoActiveLock)?;
        if !lock.is_expired(now) {
            return Err(GovernanceError::LockNotExpired {
                unlock_at: lock.unlock_at,
                now,
            });
        }
        let total_locked = math::sub(self.total_locked, lock.amount)?;

        // Delete before paying out.
        let prev_total = self.total_locked;
        let lock = self
            .locks
            .remove(&caller)
            .ok_or(GovernanceError::NoActiveLock)?;
        self.total_locked = total_locked;

        if let Err(e) = ledger.transfer(&self.token, &self.account, &caller, lock.amount) {
            let amount = lock.amount;
            self.locks.insert(caller, lock);
            self.total_locked = prev_total;
            tracing::warn!(holder = %caller, amount = %amount, error = %e, "withdraw reverted");
            return Err(e.into());
        }

        tracing::info!(holder = %caller, amount = %lock.amount, "lock withdrawn");
        Ok(lock.amount)
    }

    /// Voting power of `holder` at `at`; zero without a lock.
    pub fn voting_power_of(
        &self,
        holder: &Address,
        at: Timestamp,
    ) -> Result<U256, GovernanceError> {
        match self.locks.get(holder) {
            Some(lock) => lock.voting_power(at),
            None => Ok(U256::ZERO),
        }
    }

    /// Sum of every holder's voting power at `at`.
    pub fn total_voting_power(&self, at: Timestamp) -> Result<U256, GovernanceError> {
        self.locks
            .values()
            .try_fold(U256::ZERO, |acc, lock| math::add(acc, lock.voting_power(at)?))
    }

    /// The lock held by `holder`, if any.
    pub fn locked(&self, holder: &Address) -> Option<&Lock> {
        self.locks.get(holder)
    }

    pub fn total_locked(&self) -> U256 {
        self.total_locked
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn active_lock(&self, holder: &Address, now: Timestamp) -> Result<&Lock, GovernanceError> {
        let lock = self.locks.get(holder).ok_or(GovernanceError::NoActiveLock)?;
        if lock.is_expired(now) {
            return Err(GovernanceError::LockExpired);
        }
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegov_ledger::TokenBook;
    use vegov_types::time::{DAY, YEAR};

    const T0: Timestamp = 1_700_000_000;

    struct Fixture {
        book: TokenBook,
        gov: Address,
        alice: Address,
        escrow: VotingEscrow,
    }

    fn setup() -> Fixture {
        let owner = Address::from_bytes([1u8; 20]);
        let alice = Address::from_bytes([2u8; 20]);
        let mut book = TokenBook::new();
        let gov = book.create_token("GOV", owner, U256::units(10_000)).unwrap();
        book.transfer(&gov, &owner, &alice, U256::units(1_000)).unwrap();

        let escrow = VotingEscrow::new(gov, Address::from_label("escrow"), 4 * YEAR);
        book.approve(&gov, &alice, &escrow.account(), U256::MAX).unwrap();

        Fixture { book, gov, alice, escrow }
    }

    #[test]
    fn test_lock_creation() {
        let mut f = setup();
        let lock = f
            .escrow
            .create_lock(&mut f.book, f.alice, U256::units(500), 30 * DAY, T0)
            .unwrap();

        assert_eq!(lock.amount, U256::units(500));
        assert_eq!(lock.created_at, T0);
        assert_eq!(lock.unlock_at, T0 + 30 * DAY);
        assert_eq!(f.escrow.total_locked(), U256::units(500));
        assert_eq!(f.book.balance_of(&f.gov, &f.alice), U256::units(500));
        assert_eq!(f.book.balance_of(&f.gov, &f.escrow.account()), U256::units(500));
    }

    #[test]
    fn test_lock_validation() {
        let mut f = setup();
        let result = f.escrow.create_lock(&mut f.book, f.alice, U256::ZERO, DAY, T0);
        assert_eq!(result, Err(GovernanceError::InvalidAmount));

        let result = f.escrow.create_lock(&mut f.book, f.alice, U256::ONE, 0, T0);
        assert_eq!(result, Err(GovernanceError::InvalidDuration(0)));

        let result = f.escrow.create_lock(&mut f.book, f.alice, U256::ONE, 4 * YEAR + 1, T0);
        assert_eq!(result, Err(GovernanceError::InvalidDuration(4 * YEAR + 1)));

        f.escrow.create_lock(&mut f.book, f.alice, U256::ONE, DAY, T0).unwrap();
        let result = f.escrow.create_lock(&mut f.book, f.alice, U256::ONE, DAY, T0);
        assert_eq!(result, Err(GovernanceError::LockAlreadyExists));
    }

    #[test]
    fn test_voting_power_decays_linearly() {
        let mut f = setup();
        f.escrow
            .create_lock(&mut f.book, f.alice, U256::units(500), 30 * DAY, T0)
            .unwrap();

        let power = |at| f.escrow.voting_power_of(&f.alice, at).unwrap();
        assert_eq!(power(T0), U256::units(500));
        assert_eq!(power(T0 + 15 * DAY), U256::units(250));
        assert_eq!(power(T0 + 27 * DAY), U256::units(50));
        assert_eq!(power(T0 + 30 * DAY), U256::ZERO);
        assert_eq!(power(T0 + 365 * DAY), U256::ZERO);
        // Before the lock existed
        assert_eq!(power(T0 - 1), U256::ZERO);
    }

    #[test]
    fn test_no_lock_has_no_power() {
        let f = setup();
        assert_eq!(f.escrow.voting_power_of(&f.alice, T0).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_withdraw_before_expiry_fails() {
        let mut f = setup();
        f.escrow
            .create_lock(&mut f.book, f.alice, U256::units(500), 30 * DAY, T0)
            .unwrap();

        let result = f.escrow.withdraw(&mut f.book, f.alice, T0 + 30 * DAY - 1);
        assert_eq!(
            result,
            Err(GovernanceError::LockNotExpired {
                unlock_at: T0 + 30 * DAY,
                now: T0 + 30 * DAY - 1,
            })
        );

        let returned = f.escrow.withdraw(&mut f.book, f.alice, T0 + 30 * DAY).unwrap();
        assert_eq!(returned, U256::units(500));
        assert_eq!(f.book.balance_of(&f.gov, &f.alice), U256::units(1_000));
        assert!(f.escrow.locked(&f.alice).is_none());
        assert_eq!(f.escrow.total_locked(), U256::ZERO);
        assert_eq!(f.escrow.voting_power_of(&f.alice, T0).unwrap(), U256::ZERO);

        let result = f.escrow.withdraw(&mut f.book, f.alice, T0 + 31 * DAY);
        assert_eq!(result, Err(GovernanceError::NoActiveLock));
    }

    #[test]
    fn test_increase_amount() {
        let mut f = setup();
        let result = f.escrow.increase_amount(&mut f.book, f.alice, U256::ONE, T0);
        assert_eq!(result, Err(GovernanceError::NoActiveLock));

        f.escrow
            .create_lock(&mut f.book, f.alice, U256::units(100), 10 * DAY, T0)
            .unwrap();
        let lock = f
            .escrow
            .increase_amount(&mut f.book, f.alice, U256::units(50), T0 + 5 * DAY)
            .unwrap();

        assert_eq!(lock.amount, U256::units(150));
        assert_eq!(f.escrow.total_locked(), U256::units(150));
        // Half the window left
        assert_eq!(
            f.escrow.voting_power_of(&f.alice, T0 + 5 * DAY).unwrap(),
            U256::units(75)
        );

        let result = f.escrow.increase_amount(&mut f.book, f.alice, U256::ONE, T0 + 10 * DAY);
        assert_eq!(result, Err(GovernanceError::LockExpired));
    }

    #[test]
    fn test_extend_duration() {
        let mut f = setup();
        f.escrow
            .create_lock(&mut f.book, f.alice, U256::units(100), 10 * DAY, T0)
            .unwrap();

        let result = f.escrow.extend_duration(f.alice, T0 + 10 * DAY, T0);
        assert_eq!(
            result,
            Err(GovernanceError::DurationDecrease {
                current: T0 + 10 * DAY,
                requested: T0 + 10 * DAY,
            })
        );

        let result = f.escrow.extend_duration(f.alice, T0 + 4 * YEAR + 1, T0);
        assert_eq!(result, Err(GovernanceError::InvalidDuration(4 * YEAR + 1)));

        let lock = f.escrow.extend_duration(f.alice, T0 + 20 * DAY, T0).unwrap();
        assert_eq!(lock.unlock_at, T0 + 20 * DAY);
        assert_eq!(
            f.escrow.voting_power_of(&f.alice, T0 + 10 * DAY).unwrap(),
            U256::units(50)
        );
    }

    #[test]
    fn test_failed_deposit_leaves_no_lock() {
        let mut f = setup();
        // More than Alice owns
        let result = f
            .escrow
            .create_lock(&mut f.book, f.alice, U256::units(2_000), DAY, T0);
        assert_eq!(result, Err(GovernanceError::InsufficientBalance));
        assert!(f.escrow.locked(&f.alice).is_none());
        assert_eq!(f.escrow.total_locked(), U256::ZERO);

        // No allowance
        let bob = Address::from_bytes([3u8; 20]);
        let result = f.escrow.create_lock(&mut f.book, bob, U256::ONE, DAY, T0);
        assert_eq!(result, Err(GovernanceError::InsufficientAllowance));
        assert_eq!(f.escrow.lock_count(), 0);
    }

    #[test]
    fn test_total_voting_power() {
        let mut f = setup();
        let owner = Address::from_bytes([1u8; 20]);
        f.book.approve(&f.gov, &owner, &f.escrow.account(), U256::MAX).unwrap();

        f.escrow
            .create_lock(&mut f.book, f.alice, U256::units(100), 10 * DAY, T0)
            .unwrap();
        f.escrow
            .create_lock(&mut f.book, owner, U256::units(300), 20 * DAY, T0)
            .unwrap();

        assert_eq!(f.escrow.total_voting_power(T0).unwrap(), U256::units(400));
        assert_eq!(
            f.escrow.total_voting_power(T0 + 10 * DAY).unwrap(),
            U256::units(150)
        );
    }
}
