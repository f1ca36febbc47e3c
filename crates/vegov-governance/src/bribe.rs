//! Bribe market: third-party incentives paid to a gauge's voters.
//!
//! A bribe snapshots the gauge's vote checkpoint when it is posted. Each
//! voter's share is `amount * weight_at_snapshot / total_at_snapshot`, so
//! votes cast afterwards never change who is owed what and the payouts of a
//! bribe can never add up to more than its amount. Unclaimed shares stay in
//! the market.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use vegov_ledger::TokenLedger;
use vegov_types::{Address, Timestamp, U256};

use crate::error::GovernanceError;
use crate::gauge::{GaugeController, GaugeId};
use crate::math;

pub type BribeId = u64;

/// An escrowed incentive for one gauge's voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bribe {
    pub id: BribeId,
    pub gauge_id: GaugeId,
    /// Token paid out
    pub token: Address,
    pub amount: U256,
    pub poster: Address,
    pub posted_at: Timestamp,
    /// Vote checkpoint the shares are computed against
    pub snapshot_seq: u64,
    pub snapshot_total_weight: U256,
    /// Running total paid to voters
    pub claimed: U256,
    /// Voters who have claimed
    claimants: BTreeSet<Address>,
}

impl Bribe {
    /// Amount not yet paid out.
    pub fn remaining(&self) -> U256 {
        self.amount.saturating_sub(&self.claimed)
    }

    pub fn has_claimed(&self, voter: &Address) -> bool {
        self.claimants.contains(voter)
    }

    /// Share of this bribe owed to a voter with `weight` at the snapshot.
    fn share_for(&self, weight: U256) -> Result<U256, GovernanceError> {
        math::mul_div(self.amount, weight, self.snapshot_total_weight)
    }
}

/// Holds posted bribes and their claim records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BribeMarket {
    /// Ledger account holding escrowed bribes
    account: Address,
    bribes: BTreeMap<BribeId, Bribe>,
    next_bribe_id: BribeId,
}

impl BribeMarket {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            bribes: BTreeMap::new(),
            next_bribe_id: 1,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Escrow `amount` of `token` for the current voters of `gauge_id`.
    ///
    /// # Errors
    /// - `InvalidAmount` for a zero amount
    /// - `UnknownGauge`
    /// - `ZeroWeightGauge` if nobody votes for the gauge right now
    /// - ledger failures
    #[allow(clippy::too_many_arguments)]
    pub fn post_bribe(
        &mut self,
        ledger: &mut dyn TokenLedger,
        controller: &GaugeController,
        caller: Address,
        gauge_id: GaugeId,
        token: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<BribeId, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount);
        }
        let gauge = controller
            .gauge(gauge_id)
            .ok_or(GovernanceError::UnknownGauge(gauge_id))?;
        if gauge.weight.is_zero() {
            return Err(GovernanceError::ZeroWeightGauge(gauge_id));
        }

        let id = self.next_bribe_id;
        let next_bribe_id = id
            .checked_add(1)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        let bribe = Bribe {
            id,
            gauge_id,
            token,
            amount,
            poster: caller,
            posted_at: now,
            snapshot_seq: controller.checkpoint(),
            snapshot_total_weight: gauge.weight,
            claimed: U256::ZERO,
            claimants: BTreeSet::new(),
        };

        self.bribes.insert(id, bribe);
        self.next_bribe_id = next_bribe_id;

        let deposited =
            ledger.transfer_from(&token, &self.account, &caller, &self.account, amount);
        if let Err(e) = deposited {
            self.bribes.remove(&id);
            self.next_bribe_id = id;
            tracing::warn!(
                poster = %caller,
                gauge = gauge_id,
                error = %e,
                "bribe deposit reverted"
            );
            return Err(e.into());
        }

        tracing::info!(
            bribe = id,
            gauge = gauge_id,
            token = %token,
            amount = %amount,
            snapshot_seq = controller.checkpoint(),
            "bribe posted"
        );
        Ok(id)
    }

    /// Pay the caller's share of a bribe. Returns the amount paid.
    ///
    /// # Errors
    /// - `UnknownBribe`
    /// - `AlreadyClaimed`
    /// - `NoVotingWeight` if the caller had no allocation to the gauge at
    ///   the bribe's snapshot
    pub fn claim_bribe(
        &mut self,
        ledger: &mut dyn TokenLedger,
        controller: &GaugeController,
        caller: Address,
        bribe_id: BribeId,
    ) -> Result<U256, GovernanceError> {
        let bribe = self
            .bribes
            .get(&bribe_id)
            .ok_or(GovernanceError::UnknownBribe(bribe_id))?;
        if bribe.has_claimed(&caller) {
            return Err(GovernanceError::AlreadyClaimed);
        }

        let weight = controller.vote_weight_at(&caller, bribe.gauge_id, bribe.snapshot_seq);
        if weight.is_zero() {
            return Err(GovernanceError::NoVotingWeight);
        }
        let share = bribe.share_for(weight)?;
        let claimed = math::add(bribe.claimed, share)?;
        if claimed > bribe.amount {
            return Err(GovernanceError::ArithmeticOverflow);
        }
        let token = bribe.token;

        // Mark the claim before paying out.
        let account = self.account;
        let bribe = self
            .bribes
            .get_mut(&bribe_id)
            .ok_or(GovernanceError::UnknownBribe(bribe_id))?;
        let prev_claimed = bribe.claimed;
        bribe.claimants.insert(caller);
        bribe.claimed = claimed;

        if !share.is_zero() {
            if let Err(e) = ledger.transfer(&token, &account, &caller, share) {
                bribe.claimants.remove(&caller);
                bribe.claimed = prev_claimed;
                tracing::warn!(
                    bribe = bribe_id,
                    voter = %caller,
                    error = %e,
                    "bribe payout reverted"
                );
                return Err(e.into());
            }
        }

        tracing::info!(bribe = bribe_id, voter = %caller, share = %share, "bribe claimed");
        Ok(share)
    }

    /// What `voter` would receive from `claim_bribe` right now.
    pub fn claimable(
        &self,
        controller: &GaugeController,
        bribe_id: BribeId,
        voter: &Address,
    ) -> Result<U256, GovernanceError> {
        let bribe = self
            .bribes
            .get(&bribe_id)
            .ok_or(GovernanceError::UnknownBribe(bribe_id))?;
        if bribe.has_claimed(voter) {
            return Ok(U256::ZERO);
        }
        let weight = controller.vote_weight_at(voter, bribe.gauge_id, bribe.snapshot_seq);
        bribe.share_for(weight)
    }

    pub fn bribe(&self, bribe_id: BribeId) -> Option<&Bribe> {
        self.bribes.get(&bribe_id)
    }

    pub fn has_claimed(&self, bribe_id: BribeId, voter: &Address) -> bool {
        self.bribes
            .get(&bribe_id)
            .map(|b| b.has_claimed(voter))
            .unwrap_or(false)
    }

    /// Every bribe posted for `gauge_id`, oldest first.
    pub fn bribes_for_gauge(&self, gauge_id: GaugeId) -> impl Iterator<Item = &Bribe> {
        self.bribes.values().filter(move |b| b.gauge_id == gauge_id)
    }

    pub fn bribe_count(&self) -> usize {
        self.bribes.len()
    }
}
