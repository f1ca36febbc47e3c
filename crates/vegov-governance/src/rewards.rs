//! Liquidity gauge: staking with continuously streamed, boosted rewards.
//!
//! Rewards are streamed at `reward_rate` per second until `period_finish` and
//! split per unit of *working supply*. A staker's working balance is
//!
//! ```text
//! min(staked, staked * base / 10000 + voting_power * (10000 - base) / 10000)
//! ```
//!
//! so holding voting power lifts the stake from `base` up to its full amount
//! (2.5x at the default base of 4000). Boosting redistributes the stream, it
//! never adds to it. While the working supply is zero the stream is paused
//! and the unstreamed part of the window moves forward.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vegov_ledger::TokenLedger;
use vegov_types::{Address, Timestamp, U256};

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::escrow::VotingEscrow;
use crate::gauge::GaugeId;
use crate::math::{self, BPS, PRECISION};

/// Pool-wide accrual state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    /// Sum of staked principal
    pub total_staked: U256,
    /// Sum of working balances
    pub working_supply: U256,
    /// Reward units streamed per second
    pub reward_rate: U256,
    /// Accumulated reward per unit of working balance, scaled by 1e18
    pub reward_per_token_stored: U256,
    pub last_update_time: Timestamp,
    pub period_finish: Timestamp,
    /// Part of the last funding that did not divide into the rate; added to
    /// the next funding
    pub undistributed: U256,
    /// Lifetime rewards deposited
    pub total_funded: U256,
    /// Lifetime rewards paid out
    pub total_paid: U256,
}

/// A staker's position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub amount: U256,
    pub working_balance: U256,
    /// Accumulator value at the last settlement
    pub reward_per_token_paid: U256,
    /// Settled but unpaid rewards
    pub rewards: U256,
    pub last_update: Timestamp,
}

impl Stake {
    fn is_empty(&self) -> bool {
        self.amount.is_zero() && self.rewards.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    /// Never funded or staked
    Idle,
    Active,
}

/// Stake/reward pair bound to one gauge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityGauge {
    gauge_id: GaugeId,
    stake_token: Address,
    reward_token: Address,
    /// Ledger account holding stakes and undistributed rewards
    account: Address,
    reward_duration: u64,
    boost_base_bps: u64,
    state: PoolState,
    pool: RewardPool,
    stakes: BTreeMap<Address, Stake>,
}

impl LiquidityGauge {
    pub fn new(
        gauge_id: GaugeId,
        stake_token: Address,
        reward_token: Address,
        account: Address,
        config: &GovernanceConfig,
    ) -> Self {
        Self {
            gauge_id,
            stake_token,
            reward_token,
            account,
            reward_duration: config.reward_duration,
            boost_base_bps: config.boost_base_bps,
            state: PoolState::Idle,
            pool: RewardPool::default(),
            stakes: BTreeMap::new(),
        }
    }

    pub fn gauge_id(&self) -> GaugeId {
        self.gauge_id
    }

    pub fn stake_token(&self) -> Address {
        self.stake_token
    }

    pub fn reward_token(&self) -> Address {
        self.reward_token
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn pool(&self) -> &RewardPool {
        &self.pool
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Deposit `amount` of the reward token and (re)start the window.
    ///
    /// Rewards still unstreamed in a running window are rolled into the new
    /// one, so the rate becomes `(amount + leftover + undistributed) / duration`.
    /// The remainder of that division is kept in `undistributed`.
    pub fn fund_rewards(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }

        let prev_pool = self.pool.clone();
        let prev_state = self.state;

        if let Err(e) = self.notify_reward(amount, now) {
            self.pool = prev_pool;
            return Err(e);
        }
        self.state = PoolState::Active;

        let funded =
            ledger.transfer_from(&self.reward_token, &self.account, &caller, &self.account, amount);
        if let Err(e) = funded {
            self.pool = prev_pool;
            self.state = prev_state;
            tracing::warn!(
                gauge = self.gauge_id,
                funder = %caller,
                error = %e,
                "reward funding reverted"
            );
            return Err(e.into());
        }

        tracing::info!(
            gauge = self.gauge_id,
            funder = %caller,
            amount = %amount,
            rate = %self.pool.reward_rate,
            period_finish = self.pool.period_finish,
            "rewards funded"
        );
        Ok(())
    }

    /// Stake `amount` of the stake token.
    pub fn stake(
        &mut self,
        ledger: &mut dyn TokenLedger,
        escrow: &VotingEscrow,
        caller: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }

        let prev_pool = self.pool.clone();
        let prev_stake = self.stakes.get(&caller).cloned();
        let prev_state = self.state;

        let staked = match self.apply_stake(escrow, caller, amount, now) {
            Ok(staked) => staked,
            Err(e) => {
                self.restore(caller, prev_pool, prev_stake, prev_state);
                return Err(e);
            }
        };

        let deposited =
            ledger.transfer_from(&self.stake_token, &self.account, &caller, &self.account, amount);
        if let Err(e) = deposited {
            self.restore(caller, prev_pool, prev_stake, prev_state);
            tracing::warn!(gauge = self.gauge_id, staker = %caller, error = %e, "stake reverted");
            return Err(e.into());
        }

        tracing::info!(
            gauge = self.gauge_id,
            staker = %caller,
            amount = %amount,
            staked = %staked,
            "staked"
        );
        Ok(staked)
    }

    /// Withdraw `amount` of staked principal. Pending rewards stay claimable.
    pub fn unstake(
        &mut self,
        ledger: &mut dyn TokenLedger,
        escrow: &VotingEscrow,
        caller: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }
        if self.balance_of(&caller) < amount {
            return Err(GovernanceError::InsufficientStake);
        }

        let prev_pool = self.pool.clone();
        let prev_stake = self.stakes.get(&caller).cloned();
        let prev_state = self.state;

        let remaining = match self.apply_unstake(escrow, caller, amount, now) {
            Ok(remaining) => remaining,
            Err(e) => {
                self.restore(caller, prev_pool, prev_stake, prev_state);
                return Err(e);
            }
        };

        if let Err(e) = ledger.transfer(&self.stake_token, &self.account, &caller, amount) {
            self.restore(caller, prev_pool, prev_stake, prev_state);
            tracing::warn!(gauge = self.gauge_id, staker = %caller, error = %e, "unstake reverted");
            return Err(e.into());
        }

        tracing::info!(
            gauge = self.gauge_id,
            staker = %caller,
            amount = %amount,
            staked = %remaining,
            "unstaked"
        );
        Ok(remaining)
    }

    /// Pay out everything the caller has earned. Returns the amount paid;
    /// nothing is transferred when it is zero.
    pub fn claim_rewards(
        &mut self,
        ledger: &mut dyn TokenLedger,
        escrow: &VotingEscrow,
        caller: Address,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        let prev_pool = self.pool.clone();
        let prev_stake = self.stakes.get(&caller).cloned();
        let prev_state = self.state;

        let reward = match self.apply_claim(escrow, caller, now) {
            Ok(reward) => reward,
            Err(e) => {
                self.restore(caller, prev_pool, prev_stake, prev_state);
                return Err(e);
            }
        };
        if reward.is_zero() {
            return Ok(U256::ZERO);
        }

        if let Err(e) = ledger.transfer(&self.reward_token, &self.account, &caller, reward) {
            self.restore(caller, prev_pool, prev_stake, prev_state);
            tracing::warn!(
                gauge = self.gauge_id,
                staker = %caller,
                error = %e,
                "reward payout reverted"
            );
            return Err(e.into());
        }

        tracing::info!(
            gauge = self.gauge_id,
            staker = %caller,
            reward = %reward,
            "rewards claimed"
        );
        Ok(reward)
    }

    /// Unstake everything and claim. Returns `(principal, reward)`.
    ///
    /// The two payouts are separate ledger calls; if the reward payout fails
    /// the principal has already been returned and the reward stays claimable.
    pub fn exit(
        &mut self,
        ledger: &mut dyn TokenLedger,
        escrow: &VotingEscrow,
        caller: Address,
        now: Timestamp,
    ) -> Result<(U256, U256), GovernanceError> {
        let principal = self.balance_of(&caller);
        if principal.is_zero() {
            return Err(GovernanceError::InsufficientStake);
        }
        self.unstake(ledger, escrow, caller, principal, now)?;
        let reward = self.claim_rewards(ledger, escrow, caller, now)?;
        Ok((principal, reward))
    }

    /// Lower `holder`'s working balance to what their voting power at `now`
    /// supports. Anyone may call it; returns the new working balance.
    ///
    /// # Errors
    /// - `InsufficientStake` if `holder` has nothing staked
    /// - `WorkingBalanceCurrent` if the stored balance is not above the
    ///   recomputed one
    pub fn kick(
        &mut self,
        escrow: &VotingEscrow,
        holder: Address,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        let stake = match self.stakes.get(&holder) {
            Some(stake) if !stake.amount.is_zero() => stake,
            _ => return Err(GovernanceError::InsufficientStake),
        };
        let voting_power = escrow.voting_power_of(&holder, now)?;
        let working = self.working_balance(stake.amount, voting_power)?;
        if working >= stake.working_balance {
            return Err(GovernanceError::WorkingBalanceCurrent);
        }
        let previous = stake.working_balance;

        let prev_pool = self.pool.clone();
        let prev_stake = self.stakes.get(&holder).cloned();
        let prev_state = self.state;
        let refreshed = self.accrue(now).and_then(|_| {
            let stake = self.settle(&holder, now)?;
            self.store_with_working(escrow, holder, stake, now)
        });
        if let Err(e) = refreshed {
            self.restore(holder, prev_pool, prev_stake, prev_state);
            return Err(e);
        }

        tracing::info!(
            gauge = self.gauge_id,
            holder = %holder,
            previous = %previous,
            working = %working,
            "working balance kicked"
        );
        Ok(working)
    }

    /// Rewards the caller could claim at `now`.
    pub fn earned(&self, holder: &Address, now: Timestamp) -> Result<U256, GovernanceError> {
        match self.stakes.get(holder) {
            Some(stake) => Self::earned_with(stake, self.reward_per_token(now)?),
            None => Ok(U256::ZERO),
        }
    }

    /// Accumulator value as of `now`, without mutating the pool.
    pub fn reward_per_token(&self, now: Timestamp) -> Result<U256, GovernanceError> {
        let pool = &self.pool;
        if pool.working_supply.is_zero() {
            return Ok(pool.reward_per_token_stored);
        }
        let elapsed = self.streamed_seconds(now);
        if elapsed == 0 {
            return Ok(pool.reward_per_token_stored);
        }
        let streamed = math::mul(U256::from(elapsed), pool.reward_rate)?;
        let per_token = math::mul_div(streamed, PRECISION, pool.working_supply)?;
        math::add(pool.reward_per_token_stored, per_token)
    }

    /// Current boost multiplier in basis points (10000 = 1x).
    pub fn boost_bps(&self, holder: &Address) -> Result<u64, GovernanceError> {
        let stake = match self.stakes.get(holder) {
            Some(stake) if !stake.amount.is_zero() => stake,
            _ => return Ok(BPS),
        };
        let base = math::apply_bps(stake.amount, self.boost_base_bps)?;
        if base.is_zero() {
            return Ok(BPS);
        }
        let boost = math::mul_div(stake.working_balance, U256::from(BPS), base)?;
        u64::try_from(boost).map_err(|_| GovernanceError::ArithmeticOverflow)
    }

    /// Staked principal of `holder`.
    pub fn balance_of(&self, holder: &Address) -> U256 {
        self.stakes.get(holder).map(|s| s.amount).unwrap_or(U256::ZERO)
    }

    pub fn stake_of(&self, holder: &Address) -> Option<&Stake> {
        self.stakes.get(holder)
    }

    pub fn staker_count(&self) -> usize {
        self.stakes.len()
    }

    fn apply_stake(
        &mut self,
        escrow: &VotingEscrow,
        caller: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        self.accrue(now)?;
        let mut stake = self.settle(&caller, now)?;
        stake.amount = math::add(stake.amount, amount)?;
        self.pool.total_staked = math::add(self.pool.total_staked, amount)?;
        let staked = stake.amount;
        self.store_with_working(escrow, caller, stake, now)?;
        self.state = PoolState::Active;
        Ok(staked)
    }

    fn apply_unstake(
        &mut self,
        escrow: &VotingEscrow,
        caller: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        self.accrue(now)?;
        let mut stake = self.settle(&caller, now)?;
        stake.amount = stake
            .amount
            .checked_sub(&amount)
            .ok_or(GovernanceError::InsufficientStake)?;
        self.pool.total_staked = math::sub(self.pool.total_staked, amount)?;
        let remaining = stake.amount;
        self.store_with_working(escrow, caller, stake, now)?;
        Ok(remaining)
    }

    fn apply_claim(
        &mut self,
        escrow: &VotingEscrow,
        caller: Address,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        if !self.stakes.contains_key(&caller) {
            return Ok(U256::ZERO);
        }
        self.accrue(now)?;
        let mut stake = self.settle(&caller, now)?;
        let reward = stake.rewards;
        stake.rewards = U256::ZERO;
        self.pool.total_paid = math::add(self.pool.total_paid, reward)?;
        if self.pool.total_paid > self.pool.total_funded {
            return Err(GovernanceError::ArithmeticOverflow);
        }
        self.store_with_working(escrow, caller, stake, now)?;
        Ok(reward)
    }

    /// Seconds of streaming between the last update and `now`.
    fn streamed_seconds(&self, now: Timestamp) -> u64 {
        now.min(self.pool.period_finish)
            .saturating_sub(self.pool.last_update_time)
    }

    /// Bring the accumulator up to `now`.
    fn accrue(&mut self, now: Timestamp) -> Result<(), GovernanceError> {
        let now = now.max(self.pool.last_update_time);
        if self.pool.working_supply.is_zero() {
            // Nobody to stream to: keep the unstreamed part of the window intact.
            if self.pool.period_finish > self.pool.last_update_time {
                let remaining = self.pool.period_finish - self.pool.last_update_time;
                self.pool.period_finish = now
                    .checked_add(remaining)
                    .ok_or(GovernanceError::ArithmeticOverflow)?;
            }
        } else {
            let rpt = self.reward_per_token(now)?;
            tracing::debug!(
                gauge = self.gauge_id,
                reward_per_token = %rpt,
                elapsed = self.streamed_seconds(now),
                "rewards accrued"
            );
            self.pool.reward_per_token_stored = rpt;
        }
        self.pool.last_update_time = now;
        Ok(())
    }

    /// New rate and window for a deposit of `amount` at `now`.
    fn notify_reward(&mut self, amount: U256, now: Timestamp) -> Result<(), GovernanceError> {
        self.accrue(now)?;
        let now = self.pool.last_update_time;
        let duration = U256::from(self.reward_duration);

        let mut total = math::add(amount, self.pool.undistributed)?;
        if now < self.pool.period_finish {
            let remaining = U256::from(self.pool.period_finish - now);
            let leftover = math::mul(remaining, self.pool.reward_rate)?;
            total = math::add(total, leftover)?;
        }

        let (rate, remainder) = total
            .div_rem(&duration)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.pool.reward_rate = rate;
        self.pool.undistributed = remainder;
        self.pool.period_finish = now
            .checked_add(self.reward_duration)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.pool.total_funded = math::add(self.pool.total_funded, amount)?;
        Ok(())
    }

    /// Move the holder's pending accrual into `rewards`. Expects `accrue` first.
    fn settle(&self, holder: &Address, now: Timestamp) -> Result<Stake, GovernanceError> {
        let rpt = self.pool.reward_per_token_stored;
        let mut stake = self.stakes.get(holder).cloned().unwrap_or_default();
        stake.rewards = Self::earned_with(&stake, rpt)?;
        stake.reward_per_token_paid = rpt;
        stake.last_update = now;
        Ok(stake)
    }

    /// Recompute the holder's working balance, update the supply and store.
    fn store_with_working(
        &mut self,
        escrow: &VotingEscrow,
        holder: Address,
        mut stake: Stake,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let voting_power = escrow.voting_power_of(&holder, now)?;
        let working = self.working_balance(stake.amount, voting_power)?;

        let supply = math::sub(self.pool.working_supply, stake.working_balance)?;
        self.pool.working_supply = math::add(supply, working)?;
        stake.working_balance = working;

        if stake.is_empty() {
            self.stakes.remove(&holder);
        } else {
            self.stakes.insert(holder, stake);
        }
        Ok(())
    }

    fn working_balance(&self, staked: U256, voting_power: U256) -> Result<U256, GovernanceError> {
        let base = math::apply_bps(staked, self.boost_base_bps)?;
        let boost = math::apply_bps(voting_power, BPS - self.boost_base_bps.min(BPS))?;
        Ok(math::add(base, boost)?.min(staked))
    }

    fn earned_with(stake: &Stake, reward_per_token: U256) -> Result<U256, GovernanceError> {
        let delta = math::sub(reward_per_token, stake.reward_per_token_paid)?;
        let accrued = math::mul_div(stake.working_balance, delta, PRECISION)?;
        math::add(stake.rewards, accrued)
    }

    fn restore(
        &mut self,
        holder: Address,
        pool: RewardPool,
        stake: Option<Stake>,
        state: PoolState,
    ) {
        self.pool = pool;
        self.state = state;
        match stake {
            Some(stake) => {
                self.stakes.insert(holder, stake);
            }
            None => {
                self.stakes.remove(&holder);
            }
        }
    }
}
