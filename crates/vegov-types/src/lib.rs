//! Vegov Types - Core type definitions for the vote-escrow governance engine.
//!
//! This crate provides the fundamental types shared by every vegov component:
//! - Addresses (20-byte, Bech32m encoded)
//! - U256 (256-bit unsigned integer with checked arithmetic)
//! - Timestamps and the clock capability

pub mod address;
pub mod u256;
pub mod time;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use u256::U256;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Clock, ManualClock, SystemClock, Timestamp, TypesError, U256};
}
