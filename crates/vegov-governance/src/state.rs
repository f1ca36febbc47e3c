//! JSON snapshot of the whole protocol.
//!
//! Locks by holder, votes by voter then gauge, bribes by id with their
//! claimants, and stakes by holder next to the pool they belong to.

use serde::{Deserialize, Serialize};
use vegov_ledger::TokenLedger;
use vegov_types::Clock;

use crate::bribe::BribeMarket;
use crate::config::GovernanceConfig;
use crate::escrow::VotingEscrow;
use crate::gauge::GaugeController;
use crate::protocol::{Accounts, Protocol};
use crate::rewards::LiquidityGauge;

/// Every component's records at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolState {
    pub config: GovernanceConfig,
    pub escrow: VotingEscrow,
    pub controller: GaugeController,
    pub market: BribeMarket,
    pub gauge: LiquidityGauge,
}

impl ProtocolState {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to encode protocol state: {}", e))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let state: ProtocolState = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Failed to decode protocol state: {}", e))?;
        state.config.validate()?;
        Ok(state)
    }
}

impl<L: TokenLedger, C: Clock> Protocol<L, C> {
    /// Copy every component's records.
    pub fn snapshot(&self) -> ProtocolState {
        let escrow = self.escrow.read();
        let controller = self.controller.read();
        let market = self.market.read();
        let gauge = self.gauge.read();
        ProtocolState {
            config: self.config.clone(),
            escrow: escrow.clone(),
            controller: controller.clone(),
            market: market.clone(),
            gauge: gauge.clone(),
        }
    }

    /// Rebuild a protocol from a snapshot on top of `ledger` and `clock`.
    ///
    /// The ledger must hold the balances the snapshot's component accounts
    /// had when it was taken.
    pub fn restore(state: ProtocolState, ledger: L, clock: C) -> Self {
        let accounts = Accounts {
            escrow: state.escrow.account(),
            market: state.market.account(),
            gauge: state.gauge.account(),
        };
        tracing::info!(
            locks = state.escrow.lock_count(),
            gauges = state.controller.gauge_count(),
            bribes = state.market.bribe_count(),
            stakers = state.gauge.staker_count(),
            "protocol restored"
        );
        Self::from_parts(
            state.config,
            accounts,
            state.escrow,
            state.controller,
            state.market,
            state.gauge,
            ledger,
            clock,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Deployment;
    use std::sync::Arc;
    use vegov_ledger::TokenBook;
    use vegov_types::time::DAY;
    use vegov_types::{Address, ManualClock, Timestamp, U256};

    const T0: Timestamp = 1_700_000_000;

    #[test]
    fn test_snapshot_json_roundtrip() {
        let owner = Address::from_bytes([1u8; 20]);
        let alice = Address::from_bytes([2u8; 20]);
        let mut book = TokenBook::new();
        let gov = book.create_token("GOV", owner, U256::units(10_000)).unwrap();
        book.transfer(&gov, &owner, &alice, U256::units(1_000)).unwrap();

        let clock = Arc::new(ManualClock::new(T0));
        let protocol = Protocol::deploy(
            book,
            clock.clone(),
            GovernanceConfig::default(),
            Deployment::single_token(owner, gov),
        )
        .unwrap();
        let accounts = protocol.accounts();
        {
            let mut ledger = protocol.ledger();
            ledger.approve(&gov, &alice, &accounts.escrow, U256::MAX).unwrap();
            ledger.approve(&gov, &alice, &accounts.gauge, U256::MAX).unwrap();
            ledger.approve(&gov, &owner, &accounts.market, U256::MAX).unwrap();
            ledger.approve(&gov, &owner, &accounts.gauge, U256::MAX).unwrap();
        }

        protocol.create_lock(alice, U256::units(500), 30 * DAY).unwrap();
        protocol.vote(alice, 1, U256::units(500)).unwrap();
        let bribe = protocol.post_bribe(owner, 1, gov, U256::units(100)).unwrap();
        protocol.fund_rewards(owner, U256::units(200)).unwrap();
        protocol.stake(alice, U256::units(100)).unwrap();
        clock.advance(DAY);

        let json = protocol.snapshot().to_json().unwrap();
        let earned = protocol.earned(&alice).unwrap();
        let ledger = protocol.into_ledger();

        let restored = Protocol::restore(ProtocolState::from_json(&json).unwrap(), ledger, clock);
        assert_eq!(restored.accounts(), accounts);
        assert_eq!(restored.escrow().locked(&alice).unwrap().amount, U256::units(500));
        assert_eq!(restored.gauge_weight(1), U256::units(500));
        assert_eq!(restored.controller().checkpoint(), 1);
        assert_eq!(restored.earned(&alice).unwrap(), earned);

        assert_eq!(restored.claim_bribe(alice, bribe).unwrap(), U256::units(100));
        assert_eq!(
            restored.claim_bribe(alice, bribe),
            Err(crate::GovernanceError::AlreadyClaimed)
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ProtocolState::from_json("{\"config\": 1}").is_err());
        assert!(ProtocolState::from_json("not json").is_err());
    }
}
