use thiserror::Error;
use vegov_types::{Address, U256};

/// Errors raised by a token ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient balance: required {required}, have {have}")]
    InsufficientBalance { required: U256, have: U256 },

    #[error("Insufficient allowance: required {required}, have {have}")]
    InsufficientAllowance { required: U256, have: U256 },

    #[error("Unknown token: {0}")]
    UnknownToken(Address),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Caller is not the token owner")]
    NotOwner,

    #[error("Token already exists: {0}")]
    TokenExists(Address),

    #[error("Arithmetic overflow")]
    Overflow,
}
