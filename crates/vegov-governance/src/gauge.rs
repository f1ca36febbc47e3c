//! Gauge controller: voters allocate escrowed voting power across gauges.
//!
//! A vote is an absolute allocation to one gauge. Allocations are checked
//! against the voter's voting power when they are cast and are not
//! re-validated as that power decays; `gauge_weight` is the raw sum. They are
//! dropped only when the voter releases them, which the protocol does when
//! the voter's lock is withdrawn.
//!
//! Every successful vote advances a global checkpoint sequence and appends to
//! the voter's and the gauge's history, so weights can be read exactly as of
//! any earlier checkpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vegov_types::{Address, Timestamp, U256};

use crate::error::GovernanceError;
use crate::escrow::VotingEscrow;
use crate::math;

pub type GaugeId = u64;

/// Weight recorded at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub seq: u64,
    pub weight: U256,
}

/// Value of a checkpointed history as of `seq`.
fn weight_at(history: &[Checkpoint], seq: u64) -> U256 {
    let idx = history.partition_point(|c| c.seq <= seq);
    if idx == 0 {
        U256::ZERO
    } else {
        history[idx - 1].weight
    }
}

/// A votable target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gauge {
    pub id: GaugeId,
    pub label: String,
    /// Sum of all current allocations
    pub weight: U256,
    history: Vec<Checkpoint>,
}

/// One voter's allocation to one gauge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteRecord {
    pub weight: U256,
    history: Vec<Checkpoint>,
}

/// All of one voter's allocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoterVotes {
    /// Sum of weights across gauges
    pub total: U256,
    pub gauges: BTreeMap<GaugeId, VoteRecord>,
}

/// Records votes and aggregates gauge weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeController {
    owner: Address,
    gauges: BTreeMap<GaugeId, Gauge>,
    next_gauge_id: GaugeId,
    votes: BTreeMap<Address, VoterVotes>,
    seq: u64,
}

impl GaugeController {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            gauges: BTreeMap::new(),
            next_gauge_id: 1,
            votes: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Register a new gauge (owner only). Ids start at 1.
    pub fn add_gauge(&mut self, caller: Address, label: &str) -> Result<GaugeId, GovernanceError> {
        if caller != self.owner {
            return Err(GovernanceError::Unauthorized(
                "only the controller owner can add gauges".to_string(),
            ));
        }

        let id = self.next_gauge_id;
        self.next_gauge_id = id
            .checked_add(1)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.gauges.insert(
            id,
            Gauge {
                id,
                label: label.to_string(),
                weight: U256::ZERO,
                history: Vec::new(),
            },
        );

        tracing::info!(gauge = id, label, "gauge added");
        Ok(id)
    }

    /// Set the caller's allocation to `gauge_id` to `weight`.
    ///
    /// Returns the gauge's new aggregate weight. Setting a weight of zero
    /// withdraws the allocation and is always allowed.
    ///
    /// # Errors
    /// - `UnknownGauge`
    /// - `WeightExceedsVotingPower` if `weight` plus the caller's other
    ///   allocations is above the caller's voting power at `now`
    pub fn vote(
        &mut self,
        escrow: &VotingEscrow,
        caller: Address,
        gauge_id: GaugeId,
        weight: U256,
        now: Timestamp,
    ) -> Result<U256, GovernanceError> {
        let gauge = self
            .gauges
            .get(&gauge_id)
            .ok_or(GovernanceError::UnknownGauge(gauge_id))?;

        let voter = self.votes.get(&caller);
        let prior = voter
            .and_then(|v| v.gauges.get(&gauge_id))
            .map(|r| r.weight)
            .unwrap_or(U256::ZERO);
        let voter_total = voter.map(|v| v.total).unwrap_or(U256::ZERO);

        let others = math::sub(voter_total, prior)?;
        let new_voter_total = math::add(others, weight)?;
        if !weight.is_zero() {
            let power = escrow.voting_power_of(&caller, now)?;
            if new_voter_total > power {
                return Err(GovernanceError::WeightExceedsVotingPower);
            }
        }

        let gauge_weight = math::add(math::sub(gauge.weight, prior)?, weight)?;
        let seq = self
            .seq
            .checked_add(1)
            .ok_or(GovernanceError::ArithmeticOverflow)?;

        // All checks passed; commit.
        self.seq = seq;
        if let Some(gauge) = self.gauges.get_mut(&gauge_id) {
            gauge.weight = gauge_weight;
            gauge.history.push(Checkpoint { seq, weight: gauge_weight });
        }
        let voter = self.votes.entry(caller).or_default();
        voter.total = new_voter_total;
        let record = voter.gauges.entry(gauge_id).or_default();
        record.weight = weight;
        record.history.push(Checkpoint { seq, weight });

        tracing::info!(
            voter = %caller,
            gauge = gauge_id,
            weight = %weight,
            gauge_weight = %gauge_weight,
            seq,
            "vote recorded"
        );
        Ok(gauge_weight)
    }

    /// Zero every allocation of `voter` under a single new checkpoint.
    ///
    /// Returns the total released. Reads at earlier checkpoints are
    /// unaffected, so bribes already posted stay claimable.
    pub fn release_votes(&mut self, voter: Address) -> Result<U256, GovernanceError> {
        let votes = match self.votes.get(&voter) {
            Some(votes) if !votes.total.is_zero() => votes,
            _ => return Ok(U256::ZERO),
        };

        let mut gauge_weights = Vec::new();
        for (&gauge_id, record) in votes.gauges.iter().filter(|(_, r)| !r.weight.is_zero()) {
            let gauge = self
                .gauges
                .get(&gauge_id)
                .ok_or(GovernanceError::UnknownGauge(gauge_id))?;
            gauge_weights.push((gauge_id, math::sub(gauge.weight, record.weight)?));
        }
        let released = votes.total;
        let seq = self
            .seq
            .checked_add(1)
            .ok_or(GovernanceError::ArithmeticOverflow)?;

        self.seq = seq;
        for (gauge_id, weight) in gauge_weights {
            if let Some(gauge) = self.gauges.get_mut(&gauge_id) {
                gauge.weight = weight;
                gauge.history.push(Checkpoint { seq, weight });
            }
        }
        if let Some(votes) = self.votes.get_mut(&voter) {
            votes.total = U256::ZERO;
            for record in votes.gauges.values_mut().filter(|r| !r.weight.is_zero()) {
                record.weight = U256::ZERO;
                record.history.push(Checkpoint { seq, weight: U256::ZERO });
            }
        }

        tracing::info!(voter = %voter, released = %released, seq, "votes released");
        Ok(released)
    }

    /// Current aggregate weight of a gauge; zero for an unknown gauge.
    pub fn gauge_weight(&self, gauge_id: GaugeId) -> U256 {
        self.gauges
            .get(&gauge_id)
            .map(|g| g.weight)
            .unwrap_or(U256::ZERO)
    }

    /// Aggregate weight of a gauge as of checkpoint `seq`.
    pub fn gauge_weight_at(&self, gauge_id: GaugeId, seq: u64) -> U256 {
        self.gauges
            .get(&gauge_id)
            .map(|g| weight_at(&g.history, seq))
            .unwrap_or(U256::ZERO)
    }

    /// Current allocation of `voter` to `gauge_id`.
    pub fn vote_weight(&self, voter: &Address, gauge_id: GaugeId) -> U256 {
        self.votes
            .get(voter)
            .and_then(|v| v.gauges.get(&gauge_id))
            .map(|r| r.weight)
            .unwrap_or(U256::ZERO)
    }

    /// Allocation of `voter` to `gauge_id` as of checkpoint `seq`.
    pub fn vote_weight_at(&self, voter: &Address, gauge_id: GaugeId, seq: u64) -> U256 {
        self.votes
            .get(voter)
            .and_then(|v| v.gauges.get(&gauge_id))
            .map(|r| weight_at(&r.history, seq))
            .unwrap_or(U256::ZERO)
    }

    /// Sum of `voter`'s allocations across all gauges.
    pub fn voter_allocation(&self, voter: &Address) -> U256 {
        self.votes
            .get(voter)
            .map(|v| v.total)
            .unwrap_or(U256::ZERO)
    }

    /// Latest checkpoint sequence number (0 before any vote).
    pub fn checkpoint(&self) -> u64 {
        self.seq
    }

    pub fn gauge(&self, gauge_id: GaugeId) -> Option<&Gauge> {
        self.gauges.get(&gauge_id)
    }

    pub fn gauges(&self) -> impl Iterator<Item = &Gauge> {
        self.gauges.values()
    }

    pub fn gauge_count(&self) -> usize {
        self.gauges.len()
    }
}
