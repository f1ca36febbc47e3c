//! In-memory multi-token ledger.
//!
//! Each token is a plain ERC20-style table of balances and allowances.
//! Transfers check everything before touching a balance, so a failed call
//! never leaves a half-applied move behind.

use std::collections::HashMap;
use vegov_types::{Address, U256};

use crate::error::LedgerError;
use crate::TokenLedger;

/// One fungible token.
#[derive(Debug, Clone)]
pub struct Token {
    /// Token symbol
    pub symbol: String,
    /// Minting authority
    pub owner: Address,
    /// Total supply
    pub total_supply: U256,
    /// Balances mapping: address -> balance
    balances: HashMap<Address, U256>,
    /// Allowances mapping: (owner, spender) -> amount
    allowances: HashMap<(Address, Address), U256>,
}

impl Token {
    fn new(symbol: String, owner: Address) -> Self {
        Self {
            symbol,
            owner,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn balance_of(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or(U256::ZERO)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Validate a move and return the resulting (from, to) balances.
    fn plan_move(
        &self,
        from: &Address,
        to: &Address,
        value: U256,
    ) -> Result<(U256, U256), LedgerError> {
        if value.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let from_balance = self.balance_of(from);
        let new_from = from_balance
            .checked_sub(&value)
            .ok_or(LedgerError::InsufficientBalance {
                required: value,
                have: from_balance,
            })?;

        if from == to {
            return Ok((from_balance, from_balance));
        }

        let new_to = self
            .balance_of(to)
            .checked_add(&value)
            .ok_or(LedgerError::Overflow)?;
        Ok((new_from, new_to))
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(&address);
        } else {
            self.balances.insert(address, balance);
        }
    }

    fn apply_move(&mut self, from: Address, to: Address, new_from: U256, new_to: U256) {
        self.set_balance(from, new_from);
        self.set_balance(to, new_to);
    }
}

/// In-memory ledger holding any number of tokens, keyed by token address.
#[derive(Debug, Default, Clone)]
pub struct TokenBook {
    tokens: HashMap<Address, Token>,
}

impl TokenBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token and mint `initial_supply` to `owner`.
    ///
    /// The token address is derived from the symbol.
    pub fn create_token(
        &mut self,
        symbol: &str,
        owner: Address,
        initial_supply: U256,
    ) -> Result<Address, LedgerError> {
        let address = Address::from_label(&format!("token/{}", symbol));
        if self.tokens.contains_key(&address) {
            return Err(LedgerError::TokenExists(address));
        }

        let mut token = Token::new(symbol.to_string(), owner);
        token.set_balance(owner, initial_supply);
        token.total_supply = initial_supply;
        self.tokens.insert(address, token);

        tracing::debug!(token = %address, symbol, supply = %initial_supply, "token created");
        Ok(address)
    }

    pub fn token(&self, token: &Address) -> Option<&Token> {
        self.tokens.get(token)
    }

    fn token_mut(&mut self, token: &Address) -> Result<&mut Token, LedgerError> {
        self.tokens
            .get_mut(token)
            .ok_or(LedgerError::UnknownToken(*token))
    }

    /// Mint new tokens (token owner only).
    pub fn mint(
        &mut self,
        token: &Address,
        caller: &Address,
        to: &Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        let t = self.token_mut(token)?;
        if caller != &t.owner {
            return Err(LedgerError::NotOwner);
        }
        if value.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let supply = t.total_supply.checked_add(&value).ok_or(LedgerError::Overflow)?;
        let balance = t.balance_of(to).checked_add(&value).ok_or(LedgerError::Overflow)?;
        t.total_supply = supply;
        t.set_balance(*to, balance);
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s balance.
    pub fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        let t = self.token_mut(token)?;
        if value.is_zero() {
            t.allowances.remove(&(*owner, *spender));
        } else {
            t.allowances.insert((*owner, *spender), value);
        }
        Ok(())
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.allowance(owner, spender))
            .unwrap_or(U256::ZERO)
    }

    pub fn total_supply(&self, token: &Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.total_supply)
            .unwrap_or(U256::ZERO)
    }
}

impl TokenLedger for TokenBook {
    fn balance_of(&self, token: &Address, account: &Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.balance_of(account))
            .unwrap_or(U256::ZERO)
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let t = self.token_mut(token)?;
        let (new_from, new_to) = t.plan_move(from, to, amount)?;
        t.apply_move(*from, *to, new_from, new_to);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let t = self.token_mut(token)?;

        let allowance = t.allowance(from, spender);
        let new_allowance = allowance
            .checked_sub(&amount)
            .ok_or(LedgerError::InsufficientAllowance {
                required: amount,
                have: allowance,
            })?;
        let (new_from, new_to) = t.plan_move(from, to, amount)?;

        // Unlimited approvals are never drawn down.
        if allowance != U256::MAX {
            if new_allowance.is_zero() {
                t.allowances.remove(&(*from, *spender));
            } else {
                t.allowances.insert((*from, *spender), new_allowance);
            }
        }
        t.apply_move(*from, *to, new_from, new_to);
        Ok(())
    }
}
