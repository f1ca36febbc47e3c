//! Vegov Governance - vote-escrow gauge governance core.
//!
//! This crate provides:
//! - Vote escrow with linearly decaying voting power
//! - Gauge voting with checkpointed weights
//! - Bribe market paying voters pro rata at a snapshot
//! - Liquidity gauge streaming rewards boosted by voting power
//! - A protocol facade wiring them to one token ledger and clock

pub mod bribe;
pub mod config;
pub mod error;
pub mod escrow;
pub mod gauge;
pub mod math;
pub mod protocol;
pub mod rewards;
pub mod state;

pub use bribe::{Bribe, BribeId, BribeMarket};
pub use config::GovernanceConfig;
pub use error::GovernanceError;
pub use escrow::{Lock, VotingEscrow};
pub use gauge::{Checkpoint, Gauge, GaugeController, GaugeId};
pub use math::{BPS, PRECISION};
pub use protocol::{Accounts, Deployment, Protocol};
pub use rewards::{LiquidityGauge, PoolState, RewardPool, Stake};
pub use state::ProtocolState;
