//! Custody totals backing the outstanding combination-token supply.

use alloc::{vec, vec::Vec};
use alloy_primitives::U256;
use stylus_sdk::prelude::*;

use crate::{overflow, ComboError};

/// Snapshot of the assets the pool custodies.
///
/// All mutation goes through checked arithmetic and returns a new snapshot,
/// so a failed step never leaves a half-updated position behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolPosition {
    /// Raw underlying units held.
    pub underlying_held: U256,
    /// Option-token units held.
    pub option_held: U256,
}

impl PoolPosition {
    #[must_use]
    pub const fn new(underlying_held: U256, option_held: U256) -> Self {
        Self {
            underlying_held,
            option_held,
        }
    }

    /// Adds freshly pulled assets to the position.
    ///
    /// # Errors
    /// - `ArithmeticOverflow`: If either total would exceed `U256::MAX`
    pub fn deposit(self, underlying: U256, option: U256) -> Result<Self, ComboError> {
        Ok(Self {
            underlying_held: self
                .underlying_held
                .checked_add(underlying)
                .ok_or_else(overflow)?,
            option_held: self.option_held.checked_add(option).ok_or_else(overflow)?,
        })
    }

    /// Removes redeemed assets from the position.
    ///
    /// # Errors
    /// - `ArithmeticOverflow`: If either amount exceeds what is held
    pub fn withdraw(self, underlying: U256, option: U256) -> Result<Self, ComboError> {
        Ok(Self {
            underlying_held: self
                .underlying_held
                .checked_sub(underlying)
                .ok_or_else(overflow)?,
            option_held: self.option_held.checked_sub(option).ok_or_else(overflow)?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.underlying_held.is_zero() && self.option_held.is_zero()
    }
}

sol_storage! {
    /// Persistent custody totals. Written only by the mint and redeem paths.
    pub struct PoolState {
        uint256 underlying_held;
        uint256 option_held;
        uint256 underlying_per_unit;
    }
}

impl PoolState {
    pub(crate) fn position(&self) -> PoolPosition {
        PoolPosition::new(self.underlying_held.get(), self.option_held.get())
    }

    pub(crate) fn commit(&mut self, position: PoolPosition) {
        self.underlying_held.set(position.underlying_held);
        self.option_held.set(position.option_held);
    }

    pub(crate) fn underlying_per_unit(&self) -> U256 {
        self.underlying_per_unit.get()
    }

    pub(crate) fn set_underlying_per_unit(&mut self, scale: U256) {
        self.underlying_per_unit.set(scale);
    }
}
