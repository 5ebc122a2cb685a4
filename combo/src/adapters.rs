//! Interfaces of the external contracts the pool calls into.
//!
//! None of these are implemented here. The pool binds to one settlement
//! controller, one oracle and one option token at initialization and talks to
//! them (and to plain ERC-20 assets) through the bindings below.

use alloc::{vec, vec::Vec};
use alloy_primitives::{Address, U256};
use stylus_sdk::prelude::*;

sol_interface! {
    // Fungible-asset surface used for the underlying, the option token and
    // every payout asset.
    interface IErc20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    // (underlying, strike asset, collateral, strike price, expiry, is put)
    interface IOptionToken {
        function getOptionDetails() external view returns (address, address, address, uint256, uint256, bool);
        function decimals() external view returns (uint8);
    }

    // `redeemForCash` burns `amount` option units held by the caller and pays
    // the caller the listed `(asset, amount)` legs.
    interface ISettlementAdapter {
        function isSettlementAllowed(address option) external view returns (bool);
        function redeemForCash(address option, uint256 amount) external returns (address[] memory, uint256[] memory);
    }

    interface IPriceOracle {
        function isPriceFinalized(address asset, uint256 timestamp) external view returns (bool);
        function getPrice(address asset, uint256 timestamp) external view returns (uint256, bool);
    }
}

/// One asset leg of a cash settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutLeg {
    pub asset: Address,
    pub amount: U256,
}

/// Whatever the settlement controller paid for a batch of option units.
///
/// The composition is not fixed: a put usually pays the strike asset, other
/// kinds may pay the underlying or several assets at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payout {
    legs: Vec<PayoutLeg>,
}

impl Payout {
    /// Zips the controller's parallel return arrays.
    ///
    /// Returns `None` when the arrays disagree in length or a non-zero amount
    /// names the zero address.
    #[must_use]
    pub fn from_parts(assets: Vec<Address>, amounts: Vec<U256>) -> Option<Self> {
        if assets.len() != amounts.len() {
            return None;
        }

        let mut legs = Vec::with_capacity(assets.len());
        for (asset, amount) in assets.into_iter().zip(amounts) {
            if amount.is_zero() {
                continue;
            }
            if asset.is_zero() {
                return None;
            }
            legs.push(PayoutLeg { asset, amount });
        }

        Some(Self { legs })
    }

    /// Non-zero legs in the order the controller reported them.
    #[must_use]
    pub fn legs(&self) -> &[PayoutLeg] {
        &self.legs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// One leg per distinct asset, summing repeated legs.
    ///
    /// Returns `None` if a per-asset sum overflows.
    #[must_use]
    pub fn totals(&self) -> Option<Vec<PayoutLeg>> {
        let mut totals: Vec<PayoutLeg> = Vec::with_capacity(self.legs.len());
        for leg in &self.legs {
            match totals.iter_mut().find(|total| total.asset == leg.asset) {
                Some(total) => total.amount = total.amount.checked_add(leg.amount)?,
                None => totals.push(*leg),
            }
        }
        Some(totals)
    }
}
