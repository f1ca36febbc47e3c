//! Protocol facade.
//!
//! Deploys the escrow, the gauge controller, the bribe market and one
//! liquidity gauge against a single token ledger and clock, and exposes the
//! user-facing operations with `now` taken from the clock.
//!
//! Each component sits behind its own lock. Operations always acquire them in
//! the order escrow, controller, market, gauge, ledger, taking read guards for
//! components they only consult.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use vegov_ledger::TokenLedger;
use vegov_types::{Address, Clock, Timestamp, U256};

use crate::bribe::{BribeId, BribeMarket};
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::escrow::{Lock, VotingEscrow};
use crate::gauge::{GaugeController, GaugeId};
use crate::rewards::LiquidityGauge;

/// Ledger accounts owned by the protocol's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accounts {
    pub escrow: Address,
    pub market: Address,
    pub gauge: Address,
}

impl Accounts {
    /// Accounts derived from fixed labels.
    pub fn derive() -> Self {
        Self {
            escrow: Address::from_label("vegov/escrow"),
            market: Address::from_label("vegov/bribe-market"),
            gauge: Address::from_label("vegov/liquidity-gauge"),
        }
    }
}

/// What to deploy.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Controller owner
    pub owner: Address,
    /// Token locked in the escrow
    pub governance_token: Address,
    /// Token staked in the liquidity gauge
    pub stake_token: Address,
    /// Token the liquidity gauge streams
    pub reward_token: Address,
    /// Label of the gauge the liquidity gauge is bound to
    pub gauge_label: String,
}

impl Deployment {
    /// Governance token used for locking, staking and rewards alike.
    pub fn single_token(owner: Address, token: Address) -> Self {
        Self {
            owner,
            governance_token: token,
            stake_token: token,
            reward_token: token,
            gauge_label: "Main Gauge".to_string(),
        }
    }
}

/// The deployed protocol.
pub struct Protocol<L: TokenLedger, C: Clock> {
    pub(crate) config: GovernanceConfig,
    pub(crate) accounts: Accounts,
    pub(crate) escrow: RwLock<VotingEscrow>,
    pub(crate) controller: RwLock<GaugeController>,
    pub(crate) market: RwLock<BribeMarket>,
    pub(crate) gauge: RwLock<LiquidityGauge>,
    pub(crate) ledger: Mutex<L>,
    pub(crate) clock: C,
}

impl<L: TokenLedger, C: Clock> Protocol<L, C> {
    /// Deploy every component and register the first gauge.
    pub fn deploy(
        ledger: L,
        clock: C,
        config: GovernanceConfig,
        deployment: Deployment,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let accounts = Accounts::derive();

        let escrow = VotingEscrow::new(
            deployment.governance_token,
            accounts.escrow,
            config.max_lock_duration,
        );
        let mut controller = GaugeController::new(deployment.owner);
        let gauge_id = controller.add_gauge(deployment.owner, &deployment.gauge_label)?;
        let market = BribeMarket::new(accounts.market);
        let gauge = LiquidityGauge::new(
            gauge_id,
            deployment.stake_token,
            deployment.reward_token,
            accounts.gauge,
            &config,
        );

        tracing::info!(
            owner = %deployment.owner,
            governance_token = %deployment.governance_token,
            escrow = %accounts.escrow,
            market = %accounts.market,
            gauge = %accounts.gauge,
            gauge_id,
            "protocol deployed"
        );

        Ok(Self::from_parts(config, accounts, escrow, controller, market, gauge, ledger, clock))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config: GovernanceConfig,
        accounts: Accounts,
        escrow: VotingEscrow,
        controller: GaugeController,
        market: BribeMarket,
        gauge: LiquidityGauge,
        ledger: L,
        clock: C,
    ) -> Self {
        Self {
            config,
            accounts,
            escrow: RwLock::new(escrow),
            controller: RwLock::new(controller),
            market: RwLock::new(market),
            gauge: RwLock::new(gauge),
            ledger: Mutex::new(ledger),
            clock,
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn accounts(&self) -> Accounts {
        self.accounts
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Exclusive access to the token ledger, e.g. to set up approvals.
    pub fn ledger(&self) -> MutexGuard<'_, L> {
        self.ledger.lock()
    }

    pub fn escrow(&self) -> RwLockReadGuard<'_, VotingEscrow> {
        self.escrow.read()
    }

    pub fn controller(&self) -> RwLockReadGuard<'_, GaugeController> {
        self.controller.read()
    }

    pub fn market(&self) -> RwLockReadGuard<'_, BribeMarket> {
        self.market.read()
    }

    pub fn gauge(&self) -> RwLockReadGuard<'_, LiquidityGauge> {
        self.gauge.read()
    }

    /// Consume the protocol and hand back the ledger.
    pub fn into_ledger(self) -> L {
        self.ledger.into_inner()
    }

    // Escrow

    pub fn create_lock(
        &self,
        caller: Address,
        amount: U256,
        duration: u64,
    ) -> Result<Lock, GovernanceError> {
        let now = self.now();
        let mut escrow = self.escrow.write();
        let mut ledger = self.ledger.lock();
        escrow.create_lock(&mut *ledger, caller, amount, duration, now)
    }

    pub fn increase_amount(&self, caller: Address, extra: U256) -> Result<Lock, GovernanceError> {
        let now = self.now();
        let mut escrow = self.escrow.write();
        let mut ledger = self.ledger.lock();
        escrow.increase_amount(&mut *ledger, caller, extra, now)
    }

    pub fn extend_duration(
        &self,
        caller: Address,
        new_unlock: Timestamp,
    ) -> Result<Lock, GovernanceError> {
        let now = self.now();
        self.escrow.write().extend_duration(caller, new_unlock, now)
    }

    /// Withdraw the caller's expired lock and release all of its votes.
    pub fn withdraw(&self, caller: Address) -> Result<U256, GovernanceError> {
        let now = self.now();
        let mut escrow = self.escrow.write();
        let mut controller = self.controller.write();
        let mut ledger = self.ledger.lock();

        let prev_controller = controller.clone();
        controller.release_votes(caller)?;
        escrow.withdraw(&mut *ledger, caller, now).map_err(|e| {
            *controller = prev_controller;
            e
        })
    }

    /// Voting power of `holder` now.
    pub fn voting_power_of(&self, holder: &Address) -> Result<U256, GovernanceError> {
        self.escrow.read().voting_power_of(holder, self.now())
    }

    // Gauge controller

    pub fn add_gauge(&self, caller: Address, label: &str) -> Result<GaugeId, GovernanceError> {
        self.controller.write().add_gauge(caller, label)
    }

    pub fn vote(
        &self,
        caller: Address,
        gauge_id: GaugeId,
        weight: U256,
    ) -> Result<U256, GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut controller = self.controller.write();
        controller.vote(&escrow, caller, gauge_id, weight, now)
    }

    pub fn gauge_weight(&self, gauge_id: GaugeId) -> U256 {
        self.controller.read().gauge_weight(gauge_id)
    }

    // Bribes

    pub fn post_bribe(
        &self,
        caller: Address,
        gauge_id: GaugeId,
        token: Address,
        amount: U256,
    ) -> Result<BribeId, GovernanceError> {
        let now = self.now();
        let controller = self.controller.read();
        let mut market = self.market.write();
        let mut ledger = self.ledger.lock();
        market.post_bribe(&mut *ledger, &controller, caller, gauge_id, token, amount, now)
    }

    pub fn claim_bribe(&self, caller: Address, bribe_id: BribeId) -> Result<U256, GovernanceError> {
        let controller = self.controller.read();
        let mut market = self.market.write();
        let mut ledger = self.ledger.lock();
        market.claim_bribe(&mut *ledger, &controller, caller, bribe_id)
    }

    pub fn claimable_bribe(
        &self,
        bribe_id: BribeId,
        voter: &Address,
    ) -> Result<U256, GovernanceError> {
        let controller = self.controller.read();
        self.market.read().claimable(&controller, bribe_id, voter)
    }

    // Liquidity gauge

    pub fn fund_rewards(&self, caller: Address, amount: U256) -> Result<(), GovernanceError> {
        let now = self.now();
        let mut gauge = self.gauge.write();
        let mut ledger = self.ledger.lock();
        gauge.fund_rewards(&mut *ledger, caller, amount, now)
    }

    pub fn stake(&self, caller: Address, amount: U256) -> Result<U256, GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut gauge = self.gauge.write();
        let mut ledger = self.ledger.lock();
        gauge.stake(&mut *ledger, &escrow, caller, amount, now)
    }

    pub fn unstake(&self, caller: Address, amount: U256) -> Result<U256, GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut gauge = self.gauge.write();
        let mut ledger = self.ledger.lock();
        gauge.unstake(&mut *ledger, &escrow, caller, amount, now)
    }

    pub fn claim_rewards(&self, caller: Address) -> Result<U256, GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut gauge = self.gauge.write();
        let mut ledger = self.ledger.lock();
        gauge.claim_rewards(&mut *ledger, &escrow, caller, now)
    }

    pub fn exit(&self, caller: Address) -> Result<(U256, U256), GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut gauge = self.gauge.write();
        let mut ledger = self.ledger.lock();
        gauge.exit(&mut *ledger, &escrow, caller, now)
    }

    /// Refresh a stale boost of `holder`; callable by anyone.
    pub fn kick(&self, holder: Address) -> Result<U256, GovernanceError> {
        let now = self.now();
        let escrow = self.escrow.read();
        let mut gauge = self.gauge.write();
        gauge.kick(&escrow, holder, now)
    }

    pub fn earned(&self, holder: &Address) -> Result<U256, GovernanceError> {
        self.gauge.read().earned(holder, self.now())
    }

    pub fn boost_bps(&self, holder: &Address) -> Result<u64, GovernanceError> {
        self.gauge.read().boost_bps(holder)
    }
}
