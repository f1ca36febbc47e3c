use thiserror::Error;
use vegov_ledger::LedgerError;
use vegov_types::Address;

/// Errors that can occur in governance operations.
///
/// Every variant is a validation failure of a single request; a failed
/// operation leaves all component state exactly as it was.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid lock duration: {0} seconds")]
    InvalidDuration(u64),

    #[error("Holder already has a lock")]
    LockAlreadyExists,

    #[error("No active lock")]
    NoActiveLock,

    #[error("Lock has expired")]
    LockExpired,

    #[error("Lock not expired: unlocks at {unlock_at}, now {now}")]
    LockNotExpired { unlock_at: u64, now: u64 },

    #[error("New unlock time {requested} must be after current unlock time {current}")]
    DurationDecrease { current: u64, requested: u64 },

    #[error("Vote weight exceeds voting power")]
    WeightExceedsVotingPower,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Gauge not found: {0}")]
    UnknownGauge(u64),

    #[error("Gauge {0} has no voting weight")]
    ZeroWeightGauge(u64),

    #[error("Bribe not found: {0}")]
    UnknownBribe(u64),

    #[error("Bribe already claimed")]
    AlreadyClaimed,

    #[error("No voting weight on the bribed gauge at snapshot")]
    NoVotingWeight,

    #[error("Insufficient stake")]
    InsufficientStake,

    #[error("Working balance is already current")]
    WorkingBalanceCurrent,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Insufficient allowance")]
    InsufficientAllowance,

    #[error("Unknown token: {0}")]
    UnknownToken(Address),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for GovernanceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { .. } => GovernanceError::InsufficientBalance,
            LedgerError::InsufficientAllowance { .. } => GovernanceError::InsufficientAllowance,
            LedgerError::UnknownToken(token) => GovernanceError::UnknownToken(token),
            LedgerError::InvalidAmount => GovernanceError::InvalidAmount,
            LedgerError::Overflow => GovernanceError::ArithmeticOverflow,
            other => GovernanceError::Ledger(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegov_types::U256;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::LockNotExpired { unlock_at: 200, now: 100 };
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_ledger_errors_pass_through() {
        let err: GovernanceError = LedgerError::InsufficientAllowance {
            required: U256::ONE,
            have: U256::ZERO,
        }
        .into();
        assert_eq!(err, GovernanceError::InsufficientAllowance);

        let err: GovernanceError = LedgerError::InsufficientBalance {
            required: U256::ONE,
            have: U256::ZERO,
        }
        .into();
        assert_eq!(err, GovernanceError::InsufficientBalance);
    }
}
