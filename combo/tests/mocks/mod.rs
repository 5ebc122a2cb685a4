#![allow(dead_code)]

use alloc::{vec, vec::Vec};
use alloy_primitives::{Address, U256, U8};
use stylus_sdk::{call::Call, prelude::*};

sol_storage! {
    /// ERC-20 that can also describe option terms, so one mock serves as the
    /// underlying, the option token and the cash asset.
    pub struct TestERC20 {
        mapping(address => uint256) balances;
        mapping(address => mapping(address => uint256)) allowances;
        uint8 decimals;
        address underlying;
        address strike_asset;
        address collateral;
        uint256 strike_price;
        uint256 expiry;
        bool is_put;
        // Transfers to this account are refused.
        address blocked;
    }
}

unsafe impl TopLevelStorage for TestERC20 {}

#[public]
impl TestERC20 {
    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(account)
    }

    #[must_use]
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.getter(owner).get(spender)
    }

    #[must_use]
    pub fn decimals(&self) -> u8 {
        self.decimals.get().to::<u8>()
    }

    pub fn set_decimals(&mut self, decimals: u8) {
        self.decimals.set(U8::from(decimals));
    }

    pub fn set_blocked(&mut self, account: Address) {
        self.blocked.set(account);
    }

    pub fn transfer(&mut self, to: Address, amount: U256) -> bool {
        if to == self.blocked.get() {
            return false;
        }
        let from = self.vm().msg_sender();
        let sender_balance = self.balances.get(from);

        if sender_balance < amount {
            return false;
        }

        self.balances.insert(from, sender_balance - amount);
        let recipient_balance = self.balances.get(to);
        self.balances.insert(to, recipient_balance + amount);

        true
    }

    pub fn transfer_from(&mut self, from: Address, to: Address, amount: U256) -> bool {
        if to == self.blocked.get() {
            return false;
        }
        let spender = self.vm().msg_sender();
        let allowance = self.allowances.getter(from).get(spender);

        if allowance < amount {
            return false;
        }

        let sender_balance = self.balances.get(from);
        if sender_balance < amount {
            return false;
        }

        self.balances.insert(from, sender_balance - amount);
        let recipient_balance = self.balances.get(to);
        self.balances.insert(to, recipient_balance + amount);

        let mut allowance_setter = self.allowances.setter(from);
        allowance_setter.insert(spender, allowance - amount);

        true
    }

    pub fn approve(&mut self, spender: Address, amount: U256) {
        let owner = self.vm().msg_sender();
        let mut allowance_setter = self.allowances.setter(owner);
        allowance_setter.insert(spender, amount);
    }

    pub fn mint(&mut self, to: Address, amount: U256) {
        let current_balance = self.balances.get(to);
        self.balances.insert(to, current_balance + amount);
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> bool {
        let balance = self.balances.get(from);
        if balance < amount {
            return false;
        }
        self.balances.insert(from, balance - amount);
        true
    }

    pub fn set_option_details(
        &mut self,
        underlying: Address,
        strike_asset: Address,
        collateral: Address,
        strike_price: U256,
        expiry: U256,
        is_put: bool,
    ) {
        self.underlying.set(underlying);
        self.strike_asset.set(strike_asset);
        self.collateral.set(collateral);
        self.strike_price.set(strike_price);
        self.expiry.set(expiry);
        self.is_put.set(is_put);
    }

    #[must_use]
    pub fn get_option_details(&self) -> (Address, Address, Address, U256, U256, bool) {
        (
            self.underlying.get(),
            self.strike_asset.get(),
            self.collateral.get(),
            self.strike_price.get(),
            self.expiry.get(),
            self.is_put.get(),
        )
    }
}

sol_interface! {
    interface ITestToken {
        function burn(address from, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

sol_storage! {
    /// Settlement controller paying `amount * numerator / denominator` of a
    /// cash asset, plus an optional second leg, per batch of option units it
    /// burns from the caller.
    pub struct TestSettlement {
        bool allowed;
        bool broken;
        address payout_asset;
        uint256 payout_numerator;
        uint256 payout_denominator;
        address second_asset;
        uint256 second_numerator;
        uint256 second_denominator;
        // Reply with one more amount than assets.
        bool mismatched;
        // Report the legs without paying them.
        bool unfunded;
    }
}

unsafe impl TopLevelStorage for TestSettlement {}

#[public]
impl TestSettlement {
    pub fn set_settlement_allowed(&mut self, allowed: bool) {
        self.allowed.set(allowed);
    }

    pub fn set_broken(&mut self, broken: bool) {
        self.broken.set(broken);
    }

    pub fn set_payout(&mut self, asset: Address, numerator: U256, denominator: U256) {
        self.payout_asset.set(asset);
        self.payout_numerator.set(numerator);
        self.payout_denominator.set(denominator);
    }

    pub fn set_second_payout(&mut self, asset: Address, numerator: U256, denominator: U256) {
        self.second_asset.set(asset);
        self.second_numerator.set(numerator);
        self.second_denominator.set(denominator);
    }

    pub fn set_mismatched(&mut self, mismatched: bool) {
        self.mismatched.set(mismatched);
    }

    pub fn set_unfunded(&mut self, unfunded: bool) {
        self.unfunded.set(unfunded);
    }

    #[must_use]
    pub fn is_settlement_allowed(&self, _option: Address) -> bool {
        self.allowed.get()
    }

    pub fn redeem_for_cash(
        &mut self,
        option: Address,
        amount: U256,
    ) -> Result<(Vec<Address>, Vec<U256>), Vec<u8>> {
        if !self.allowed.get() || self.broken.get() {
            return Err(b"settlement unavailable".to_vec());
        }

        let caller = self.vm().msg_sender();
        let config = Call::new_in(self);
        let burned = ITestToken::new(option)
            .burn(config, caller, amount)
            .map_err(|_| b"burn reverted".to_vec())?;
        if !burned {
            return Err(b"burn failed".to_vec());
        }

        let mut assets = vec![self.payout_asset.get()];
        let mut amounts =
            vec![amount * self.payout_numerator.get() / self.payout_denominator.get()];
        if !self.second_asset.get().is_zero() {
            assets.push(self.second_asset.get());
            amounts.push(amount * self.second_numerator.get() / self.second_denominator.get());
        }

        if !self.unfunded.get() {
            for (asset, cash) in assets.iter().zip(&amounts) {
                if cash.is_zero() {
                    continue;
                }
                let config = Call::new_in(self);
                let paid = ITestToken::new(*asset)
                    .transfer(config, caller, *cash)
                    .map_err(|_| b"payout reverted".to_vec())?;
                if !paid {
                    return Err(b"payout failed".to_vec());
                }
            }
        }

        if self.mismatched.get() {
            amounts.push(U256::from(1));
        }
        Ok((assets, amounts))
    }
}

sol_storage! {
    pub struct TestOracle {
        mapping(address => mapping(uint256 => uint256)) prices;
        mapping(address => mapping(uint256 => bool)) finalized;
    }
}

unsafe impl TopLevelStorage for TestOracle {}

#[public]
impl TestOracle {
    pub fn set_price(&mut self, asset: Address, timestamp: U256, price: U256, finalized: bool) {
        self.prices.setter(asset).insert(timestamp, price);
        self.finalized.setter(asset).insert(timestamp, finalized);
    }

    #[must_use]
    pub fn is_price_finalized(&self, asset: Address, timestamp: U256) -> bool {
        self.finalized.getter(asset).get(timestamp)
    }

    #[must_use]
    pub fn get_price(&self, asset: Address, timestamp: U256) -> (U256, bool) {
        (
            self.prices.getter(asset).get(timestamp),
            self.finalized.getter(asset).get(timestamp),
        )
    }
}

pub mod fixture {
    use alloy_primitives::{Address, U256};
    use combo_token::ComboToken;
    use motsu::prelude::*;

    use super::{TestERC20, TestOracle, TestSettlement};

    pub const EXPIRY: u64 = 2_000_000_000;
    pub const STRIKE: u64 = 200;
    /// Cash paid per whole option unit once settled: strike 200, spot 180.
    pub const PAYOUT_PER_OPTION: u64 = 20;

    #[must_use]
    pub fn option_units(n: u64) -> U256 {
        U256::from(n) * U256::from(10).pow(U256::from(8))
    }

    #[must_use]
    pub fn weth_units(n: u64) -> U256 {
        U256::from(n) * U256::from(10).pow(U256::from(18))
    }

    #[must_use]
    pub fn usdc_units(n: u64) -> U256 {
        U256::from(n) * U256::from(10).pow(U256::from(6))
    }

    /// Describes a WETH/USDC put on `otoken`, funds the controller with cash
    /// and binds `pool` to it.
    pub fn bind_pool(
        pool: &Contract<ComboToken>,
        weth: &Contract<TestERC20>,
        otoken: &Contract<TestERC20>,
        usdc: &Contract<TestERC20>,
        controller: &Contract<TestSettlement>,
        oracle: &Contract<TestOracle>,
        deployer: Address,
    ) {
        weth.sender(deployer).set_decimals(18);
        usdc.sender(deployer).set_decimals(6);
        otoken.sender(deployer).set_decimals(8);
        otoken.sender(deployer).set_option_details(
            weth.address(),
            usdc.address(),
            usdc.address(),
            option_units(STRIKE),
            U256::from(EXPIRY),
            true,
        );

        controller.sender(deployer).set_payout(
            usdc.address(),
            usdc_units(PAYOUT_PER_OPTION),
            option_units(1),
        );
        usdc.sender(deployer)
            .mint(controller.address(), usdc_units(1_000_000));

        pool.sender(deployer)
            .initialize(controller.address(), oracle.address(), otoken.address())
            .unwrap();
    }

    /// Gives `holder` `n` whole option units plus the matching WETH and
    /// approves the pool for both.
    pub fn fund(
        pool: &Contract<ComboToken>,
        weth: &Contract<TestERC20>,
        otoken: &Contract<TestERC20>,
        holder: Address,
        n: u64,
    ) {
        weth.sender(holder).mint(holder, weth_units(n));
        weth.sender(holder).approve(pool.address(), weth_units(n));
        otoken.sender(holder).mint(holder, option_units(n));
        otoken.sender(holder).approve(pool.address(), option_units(n));
    }
}
