//! Combination-token balances.
//!
//! `mint_to` and `burn_from` are the only paths that change `total_supply`.
//! Holder-to-holder transfers move balances and leave pool accounting alone.

use alloc::{vec, vec::Vec};
use alloy_primitives::{Address, U256};
use stylus_sdk::prelude::*;

use crate::{overflow, ComboError, InsufficientAllowance, InsufficientBalance};

sol_storage! {
    pub struct Ledger {
        mapping(address => uint256) balances;
        mapping(address => mapping(address => uint256)) allowances;
        uint256 total_supply;
    }
}

impl Ledger {
    pub(crate) fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(holder)
    }

    pub(crate) fn total_supply(&self) -> U256 {
        self.total_supply.get()
    }

    pub(crate) fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.getter(owner).get(spender)
    }

    pub(crate) fn mint_to(&mut self, holder: Address, quantity: U256) -> Result<(), ComboError> {
        let supply = self
            .total_supply
            .get()
            .checked_add(quantity)
            .ok_or_else(overflow)?;
        let balance = self
            .balances
            .get(holder)
            .checked_add(quantity)
            .ok_or_else(overflow)?;

        self.total_supply.set(supply);
        self.balances.insert(holder, balance);
        Ok(())
    }

    pub(crate) fn burn_from(&mut self, holder: Address, quantity: U256) -> Result<(), ComboError> {
        self.debit(holder, quantity)?;

        let supply = self
            .total_supply
            .get()
            .checked_sub(quantity)
            .ok_or_else(overflow)?;
        self.total_supply.set(supply);
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        quantity: U256,
    ) -> Result<(), ComboError> {
        self.debit(from, quantity)?;

        let balance = self
            .balances
            .get(to)
            .checked_add(quantity)
            .ok_or_else(overflow)?;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub(crate) fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        let mut allowance_setter = self.allowances.setter(owner);
        allowance_setter.insert(spender, amount);
    }

    /// Consumes `amount` of the allowance `owner` granted `spender`.
    /// An allowance of `U256::MAX` is treated as unlimited.
    pub(crate) fn spend_allowance(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), ComboError> {
        let allowance = self.allowance(owner, spender);
        if allowance == U256::MAX {
            return Ok(());
        }
        if allowance < amount {
            return Err(ComboError::InsufficientAllowance(InsufficientAllowance {
                asset: token,
                allowance,
                needed: amount,
            }));
        }

        self.approve(owner, spender, allowance - amount);
        Ok(())
    }

    fn debit(&mut self, holder: Address, quantity: U256) -> Result<(), ComboError> {
        let balance = self.balances.get(holder);
        if balance < quantity {
            return Err(ComboError::InsufficientBalance(InsufficientBalance {
                holder,
                balance,
                needed: quantity,
            }));
        }

        self.balances.insert(holder, balance - quantity);
        Ok(())
    }
}
