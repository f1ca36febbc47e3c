//! Checked arithmetic for accounting paths.
//!
//! Every decay, share and accrual computation goes through these helpers so
//! that overflow and underflow surface as `ArithmeticOverflow` instead of
//! wrapping or saturating.

use vegov_types::U256;

use crate::error::GovernanceError;

/// Fixed-point scale of the reward-per-token accumulator (1e18).
pub const PRECISION: U256 = U256::UNIT;

/// Basis-point denominator (10000 = 1x).
pub const BPS: u64 = 10_000;

pub(crate) fn add(a: U256, b: U256) -> Result<U256, GovernanceError> {
    a.checked_add(&b).ok_or(GovernanceError::ArithmeticOverflow)
}

pub(crate) fn sub(a: U256, b: U256) -> Result<U256, GovernanceError> {
    a.checked_sub(&b).ok_or(GovernanceError::ArithmeticOverflow)
}

pub(crate) fn mul(a: U256, b: U256) -> Result<U256, GovernanceError> {
    a.checked_mul(&b).ok_or(GovernanceError::ArithmeticOverflow)
}

/// `a * b / c`, floor. `c == 0` is an arithmetic fault.
pub(crate) fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, GovernanceError> {
    a.checked_mul_div(&b, &c).ok_or(GovernanceError::ArithmeticOverflow)
}

/// `amount * bps / 10000`, floor.
pub(crate) fn apply_bps(amount: U256, bps: u64) -> Result<U256, GovernanceError> {
    mul_div(amount, U256::from(bps), U256::from(BPS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(add(U256::MAX, U256::ONE), Err(GovernanceError::ArithmeticOverflow));
        assert_eq!(sub(U256::ZERO, U256::ONE), Err(GovernanceError::ArithmeticOverflow));
        assert_eq!(mul(U256::MAX, U256::from(2u64)), Err(GovernanceError::ArithmeticOverflow));
        assert_eq!(
            mul_div(U256::ONE, U256::ONE, U256::ZERO),
            Err(GovernanceError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(U256::units(100), 4_000).unwrap(), U256::units(40));
        assert_eq!(apply_bps(U256::from(3u64), 5_000).unwrap(), U256::ONE);
    }
}
