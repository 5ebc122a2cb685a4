//! Mint/redeem planning.
//!
//! Everything here is pure: the contract computes a plan, performs the
//! external transfers the plan calls for, and only then commits the plan's
//! ledger and pool deltas. A failure anywhere before the commit leaves
//! storage untouched.

use alloy_primitives::{Address, U256};

use crate::pool::PoolPosition;
use crate::{overflow, ComboError, InsufficientBalance, InvalidQuantity};

/// Whether the wrapped option's expiry price has been finalized.
///
/// Derived from a live adapter query on every redeem, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Expiry price not final yet; option units are returned as-is.
    Pending,
    /// Expiry price final; option units are converted to their cash payout.
    Eligible,
}

impl Settlement {
    #[must_use]
    pub const fn from_eligible(eligible: bool) -> Self {
        if eligible {
            Self::Eligible
        } else {
            Self::Pending
        }
    }

    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Assets to pull from a depositor and the pool position after they land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintPlan {
    pub quantity: U256,
    pub underlying_in: U256,
    pub option_in: U256,
    pub pool: PoolPosition,
}

/// Proportional claim of a redemption and the pool position after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemPlan {
    pub quantity: U256,
    pub underlying_share: U256,
    pub option_share: U256,
    pub pool: PoolPosition,
}

/// Final asset-distribution step of a redeem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Send the underlying share and the option share as raw units.
    Raw { underlying: U256, option: U256 },
    /// Send the underlying share and convert the option share to cash first.
    Settled {
        underlying: U256,
        option_to_convert: U256,
    },
}

impl RedeemPlan {
    #[must_use]
    pub const fn distribution(&self, settlement: Settlement) -> Distribution {
        match settlement {
            Settlement::Pending => Distribution::Raw {
                underlying: self.underlying_share,
                option: self.option_share,
            },
            Settlement::Eligible => Distribution::Settled {
                underlying: self.underlying_share,
                option_to_convert: self.option_share,
            },
        }
    }
}

/// Plans a mint of `quantity` combination units.
///
/// One combination unit always takes one option unit and `underlying_per_unit`
/// raw underlying units, independent of the current pool state.
///
/// # Errors
/// - `InvalidQuantity`: If `quantity` is zero
/// - `ArithmeticOverflow`: If the scaled pull or the new totals overflow
pub fn plan_mint(
    pool: PoolPosition,
    underlying_per_unit: U256,
    quantity: U256,
) -> Result<MintPlan, ComboError> {
    if quantity.is_zero() {
        return Err(ComboError::InvalidQuantity(InvalidQuantity {}));
    }

    let underlying_in = quantity
        .checked_mul(underlying_per_unit)
        .ok_or_else(overflow)?;
    let pool = pool.deposit(underlying_in, quantity)?;

    Ok(MintPlan {
        quantity,
        underlying_in,
        option_in: quantity,
        pool,
    })
}

/// Floor of `quantity * held / supply`.
///
/// Redeeming the whole supply returns everything held, so the remainder left
/// behind by earlier floor divisions is paid out to the last redeemer instead
/// of being stranded.
///
/// # Errors
/// - `ArithmeticOverflow`: If `supply` is zero, `quantity` exceeds `supply`,
///   or the product overflows
pub fn pro_rata_share(quantity: U256, held: U256, supply: U256) -> Result<U256, ComboError> {
    if supply.is_zero() || quantity > supply {
        return Err(overflow());
    }
    if quantity == supply {
        return Ok(held);
    }

    quantity
        .checked_mul(held)
        .ok_or_else(overflow)?
        .checked_div(supply)
        .ok_or_else(overflow)
}

/// Plans a redeem of `quantity` combination units held by `holder`.
///
/// # Errors
/// - `InvalidQuantity`: If `quantity` is zero
/// - `InsufficientBalance`: If `balance < quantity`
/// - `ArithmeticOverflow`: If a share computation overflows or the pool
///   cannot cover it
pub fn plan_redeem(
    pool: PoolPosition,
    supply: U256,
    holder: Address,
    balance: U256,
    quantity: U256,
) -> Result<RedeemPlan, ComboError> {
    if quantity.is_zero() {
        return Err(ComboError::InvalidQuantity(InvalidQuantity {}));
    }
    if balance < quantity {
        return Err(ComboError::InsufficientBalance(InsufficientBalance {
            holder,
            balance,
            needed: quantity,
        }));
    }

    let underlying_share = pro_rata_share(quantity, pool.underlying_held, supply)?;
    let option_share = pro_rata_share(quantity, pool.option_held, supply)?;
    let pool = pool.withdraw(underlying_share, option_share)?;

    Ok(RedeemPlan {
        quantity,
        underlying_share,
        option_share,
        pool,
    })
}
