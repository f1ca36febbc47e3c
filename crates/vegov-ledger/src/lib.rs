//! Vegov Ledger - the fungible-token capability consumed by the governance core.
//!
//! The core never owns balances. It moves tokens through [`TokenLedger`]:
//! - `transfer` moves a component's own funds (payouts, withdrawals)
//! - `transfer_from` pulls a user's funds against an allowance (deposits)
//! - `balance_of` reads a balance
//!
//! [`TokenBook`] is an in-memory, ERC20-style implementation holding any
//! number of tokens. It backs tests and the protocol facade.

pub mod book;
pub mod error;

pub use book::{Token, TokenBook};
pub use error::LedgerError;

use vegov_types::{Address, U256};

/// Fungible-token ledger capability.
pub trait TokenLedger {
    /// Balance of `account` in `token`.
    fn balance_of(&self, token: &Address, account: &Address) -> U256;

    /// Move `amount` of `token` owned by `from` to `to`.
    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Move `amount` of `token` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError>;
}

impl<T: TokenLedger + ?Sized> TokenLedger for &mut T {
    fn balance_of(&self, token: &Address, account: &Address) -> U256 {
        (**self).balance_of(token, account)
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        (**self).transfer(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        (**self).transfer_from(token, spender, from, to, amount)
    }
}
