#![cfg_attr(not(any(test, feature = "export-abi")), no_main)]
#![cfg_attr(not(any(test, feature = "export-abi")), no_std)]
extern crate alloc;

pub mod adapters;
pub mod engine;
pub mod ledger;
pub mod option;
pub mod pool;

use alloc::{string::String, vec, vec::Vec};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::sol;
use stylus_sdk::{call::Call, prelude::*, stylus_core::log};

use adapters::{IErc20, IOptionToken, IPriceOracle, ISettlementAdapter, Payout};
use engine::{Distribution, Settlement};
use ledger::Ledger;
use option::{OptionKind, OptionTerms};
use pool::PoolState;

/// ERC-20 name of the combination token.
pub const NAME: &str = "Option Combination Token";
/// ERC-20 symbol of the combination token.
pub const SYMBOL: &str = "OCT";

sol! {
    /// Emitted once when the pool is bound to its option.
    event Initialized(
        address indexed option,
        address indexed settlement,
        address oracle,
        bytes32 series_id,
        uint256 underlying_per_unit
    );

    /// Emitted when a depositor wraps underlying and option units.
    event Minted(
        address indexed holder,
        uint256 quantity,
        uint256 underlying_in,
        uint256 option_in
    );

    /// Emitted on every redeem; `settled` tells which branch paid out.
    event Redeemed(
        address indexed holder,
        uint256 quantity,
        uint256 underlying_out,
        uint256 option_share,
        bool settled
    );

    /// Emitted for each cash leg forwarded to a redeemer after settlement.
    event CashPayout(address indexed holder, address indexed asset, uint256 amount);

    /// Emitted the first time the pool sees its option as settlement eligible.
    event SettlementObserved(address indexed option);

    event Transfer(address indexed from, address indexed to, uint256 value);
    event Approval(address indexed owner, address indexed spender, uint256 value);

    /// Errors that can occur in the ComboToken contract.
    #[derive(Debug)]
    error InvalidQuantity();
    #[derive(Debug)]
    error InsufficientBalance(address holder, uint256 balance, uint256 needed);
    #[derive(Debug)]
    error InsufficientFunds(address asset, uint256 balance, uint256 needed);
    #[derive(Debug)]
    error InsufficientAllowance(address asset, uint256 allowance, uint256 needed);
    #[derive(Debug)]
    error SettlementUnavailable(address option);
    #[derive(Debug)]
    error SettlementRegressed(address option);
    #[derive(Debug)]
    error ArithmeticOverflow();
    #[derive(Debug)]
    error AlreadyInitialized();
    #[derive(Debug)]
    error NotInitialized();
    #[derive(Debug)]
    error ZeroAddress();
    #[derive(Debug)]
    error InvalidDecimals(uint8 decimals);
    #[derive(Debug)]
    error OptionUnreadable(address option);
    #[derive(Debug)]
    error OracleUnavailable(address oracle);
    #[derive(Debug)]
    error TransferFailed(address asset);
}

#[derive(SolidityError, Debug)]
pub enum ComboError {
    /// Zero quantity on mint or redeem.
    InvalidQuantity(InvalidQuantity),
    /// Combination-token balance below the requested quantity.
    InsufficientBalance(InsufficientBalance),
    /// Depositor does not hold enough of an asset to mint.
    InsufficientFunds(InsufficientFunds),
    /// Depositor has not approved enough of an asset, or a spender exceeds
    /// its combination-token allowance.
    InsufficientAllowance(InsufficientAllowance),
    /// Cash conversion of option units failed after settlement.
    SettlementUnavailable(SettlementUnavailable),
    /// Controller reports the option ineligible after eligibility was seen.
    SettlementRegressed(SettlementRegressed),
    /// Checked arithmetic would overflow or underflow.
    ArithmeticOverflow(ArithmeticOverflow),
    /// `initialize` called on a bound pool.
    AlreadyInitialized(AlreadyInitialized),
    /// Pool used before `initialize`.
    NotInitialized(NotInitialized),
    /// A collaborator address is zero.
    ZeroAddress(ZeroAddress),
    /// Underlying and option decimals cannot be reconciled.
    InvalidDecimals(InvalidDecimals),
    /// Option token did not answer the terms query.
    OptionUnreadable(OptionUnreadable),
    /// Oracle did not answer a price query.
    OracleUnavailable(OracleUnavailable),
    /// An outgoing pre-settlement transfer was refused.
    TransferFailed(TransferFailed),
}

pub(crate) const fn overflow() -> ComboError {
    ComboError::ArithmeticOverflow(ArithmeticOverflow {})
}

const fn insufficient_funds(asset: Address, balance: U256, needed: U256) -> ComboError {
    ComboError::InsufficientFunds(InsufficientFunds {
        asset,
        balance,
        needed,
    })
}

sol_storage! {
    #[entrypoint]
    pub struct ComboToken {
        bool initialized;
        address settlement;
        address oracle;
        // Latched the first time the controller reports eligibility.
        bool settlement_observed;
        OptionTerms option;
        PoolState pool;
        Ledger ledger;
    }
}

// Private helper methods
impl ComboToken {
    fn ensure_initialized(&self) -> Result<(), ComboError> {
        if self.initialized.get() {
            Ok(())
        } else {
            Err(ComboError::NotInitialized(NotInitialized {}))
        }
    }

    fn read_decimals(&self, asset: Address) -> Result<u8, ComboError> {
        IErc20::new(asset)
            .decimals(Call::new())
            .map_err(|_| ComboError::OptionUnreadable(OptionUnreadable { option: asset }))
    }

    /// Verifies `from` holds and has approved `amount` of `asset` for this
    /// contract, so a short mint fails before any asset moves and reports
    /// which side is short.
    fn check_pull(&self, asset: Address, from: Address, amount: U256) -> Result<(), ComboError> {
        if amount.is_zero() {
            return Ok(());
        }

        let token = IErc20::new(asset);
        let this = self.vm().contract_address();

        let balance = token
            .balance_of(Call::new(), from)
            .map_err(|_| insufficient_funds(asset, U256::ZERO, amount))?;
        if balance < amount {
            return Err(insufficient_funds(asset, balance, amount));
        }

        let allowance = token
            .allowance(Call::new(), from, this)
            .map_err(|_| insufficient_funds(asset, balance, amount))?;
        if allowance < amount {
            return Err(ComboError::InsufficientAllowance(InsufficientAllowance {
                asset,
                allowance,
                needed: amount,
            }));
        }
        Ok(())
    }

    /// Pulls `amount` of `asset` from `from` into pool custody.
    fn pull(&mut self, asset: Address, from: Address, amount: U256) -> Result<(), ComboError> {
        if amount.is_zero() {
            return Ok(());
        }

        let this = self.vm().contract_address();
        let config = Call::new_in(self);
        let moved = IErc20::new(asset)
            .transfer_from(config, from, this, amount)
            .map_err(|_| insufficient_funds(asset, U256::ZERO, amount))?;
        if moved {
            Ok(())
        } else {
            Err(insufficient_funds(asset, U256::ZERO, amount))
        }
    }

    /// Sends `amount` of `asset` from pool custody to `to`.
    fn push(&mut self, asset: Address, to: Address, amount: U256) -> Result<(), ComboError> {
        if amount.is_zero() {
            return Ok(());
        }

        let failed = || ComboError::TransferFailed(TransferFailed { asset });
        let config = Call::new_in(self);
        let moved = IErc20::new(asset)
            .transfer(config, to, amount)
            .map_err(|_| failed())?;
        if moved {
            Ok(())
        } else {
            Err(failed())
        }
    }

    /// Asks the controller whether the option settles, enforcing that the
    /// answer never goes back from eligible to pending.
    ///
    /// The second field is true when this is the first eligible answer the
    /// pool has seen; the caller latches it once the redeem succeeds.
    fn settlement_state(&self) -> Result<(Settlement, bool), ComboError> {
        let option = self.option.token();
        let eligible = ISettlementAdapter::new(self.settlement.get())
            .is_settlement_allowed(Call::new(), option)
            .map_err(|_| ComboError::SettlementUnavailable(SettlementUnavailable { option }))?;

        let observed = self.settlement_observed.get();
        if observed && !eligible {
            return Err(ComboError::SettlementRegressed(SettlementRegressed {
                option,
            }));
        }
        Ok((Settlement::from_eligible(eligible), eligible && !observed))
    }

    /// Converts `amount` option units held by the pool into their cash payout.
    fn convert_to_cash(&mut self, amount: U256) -> Result<Payout, ComboError> {
        if amount.is_zero() {
            return Ok(Payout::default());
        }

        let option = self.option.token();
        let unavailable = move || ComboError::SettlementUnavailable(SettlementUnavailable { option });

        let adapter = ISettlementAdapter::new(self.settlement.get());
        let config = Call::new_in(self);
        let (assets, amounts) = adapter
            .redeem_for_cash(config, option, amount)
            .map_err(|_| unavailable())?;

        let payout = Payout::from_parts(assets, amounts).ok_or_else(unavailable)?;
        if !payout.is_empty() {
            self.ensure_payout_received(&payout, amount)?;
        }
        Ok(payout)
    }

    /// Checks the pool's balance of every paid asset covers the reported
    /// amount on top of what the pool still owes its holders in that asset.
    ///
    /// `converted` option units have already left the pool.
    fn ensure_payout_received(&self, payout: &Payout, converted: U256) -> Result<(), ComboError> {
        let option = self.option.token();
        let unavailable = move || ComboError::SettlementUnavailable(SettlementUnavailable { option });

        let this = self.vm().contract_address();
        let underlying = self.option.underlying();
        let position = self.pool.position();

        for total in payout.totals().ok_or_else(unavailable)? {
            let reserved = if total.asset == underlying {
                position.underlying_held
            } else if total.asset == option {
                position
                    .option_held
                    .checked_sub(converted)
                    .ok_or_else(overflow)?
            } else {
                U256::ZERO
            };
            let needed = reserved.checked_add(total.amount).ok_or_else(unavailable)?;

            let balance = IErc20::new(total.asset)
                .balance_of(Call::new(), this)
                .map_err(|_| unavailable())?;
            if balance < needed {
                return Err(unavailable());
            }
        }
        Ok(())
    }

    fn distribute(
        &mut self,
        holder: Address,
        distribution: Distribution,
    ) -> Result<(), ComboError> {
        let underlying = self.option.underlying();

        match distribution {
            Distribution::Raw {
                underlying: underlying_out,
                option: option_out,
            } => {
                let option = self.option.token();
                self.push(underlying, holder, underlying_out)?;
                self.push(option, holder, option_out)?;
            }
            Distribution::Settled {
                underlying: underlying_out,
                option_to_convert,
            } => {
                // Convert and forward the cash before the underlying leaves.
                let option = self.option.token();
                let payout = self.convert_to_cash(option_to_convert)?;

                for leg in payout.legs() {
                    self.push(leg.asset, holder, leg.amount).map_err(|_| {
                        ComboError::SettlementUnavailable(SettlementUnavailable { option })
                    })?;
                    log(self.vm(), CashPayout {
                        holder,
                        asset: leg.asset,
                        amount: leg.amount,
                    });
                }
                self.push(underlying, holder, underlying_out)?;
            }
        }
        Ok(())
    }
}

#[public]
impl ComboToken {
    /// Binds the pool to its option, settlement controller and oracle.
    ///
    /// Reads the option's terms from the option token and fixes the number of
    /// raw underlying units backing one combination unit. The binding can
    /// never be changed afterwards.
    ///
    /// # Parameters
    /// - `settlement`: Controller that reports eligibility and pays out cash
    /// - `oracle`: Price oracle for the option's expiry price
    /// - `option_token`: The wrapped option token
    ///
    /// # Errors
    /// - `AlreadyInitialized` if the pool is already bound
    /// - `ZeroAddress` if any collaborator address is zero
    /// - `OptionUnreadable` if the option token or underlying cannot be queried
    /// - `InvalidDecimals` if the underlying is less precise than the option
    pub fn initialize(
        &mut self,
        settlement: Address,
        oracle: Address,
        option_token: Address,
    ) -> Result<(), ComboError> {
        if self.initialized.get() {
            return Err(ComboError::AlreadyInitialized(AlreadyInitialized {}));
        }
        if settlement.is_zero() || oracle.is_zero() || option_token.is_zero() {
            return Err(ComboError::ZeroAddress(ZeroAddress {}));
        }

        let unreadable = || ComboError::OptionUnreadable(OptionUnreadable {
            option: option_token,
        });
        let details = IOptionToken::new(option_token)
            .get_option_details(Call::new())
            .map_err(|_| unreadable())?;
        let (underlying, strike_asset, collateral, strike_price, expiry, is_put) = details;
        if underlying.is_zero() {
            return Err(unreadable());
        }

        let option_decimals = IOptionToken::new(option_token)
            .decimals(Call::new())
            .map_err(|_| unreadable())?;
        let underlying_decimals = self.read_decimals(underlying)?;
        let underlying_per_unit = option::unit_scale(underlying_decimals, option_decimals)?;

        let series_id = self.option.bind(
            option_token,
            underlying,
            strike_asset,
            collateral,
            strike_price,
            expiry,
            OptionKind::from_is_put(is_put),
            option_decimals,
        );
        self.pool.set_underlying_per_unit(underlying_per_unit);
        self.settlement.set(settlement);
        self.oracle.set(oracle);
        self.initialized.set(true);

        log(self.vm(), Initialized {
            option: option_token,
            settlement,
            oracle,
            series_id,
            underlying_per_unit,
        });
        Ok(())
    }

    /// Wraps `quantity` option units and the matching underlying into
    /// `quantity` combination units credited to the caller.
    ///
    /// The caller must have approved this contract for both assets.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize`
    /// - `InvalidQuantity` if `quantity` is zero
    /// - `InsufficientFunds` / `InsufficientAllowance` if either pull fails
    /// - `ArithmeticOverflow` if any total would overflow
    pub fn mint(&mut self, quantity: U256) -> Result<(), ComboError> {
        self.ensure_initialized()?;

        let payer = self.vm().msg_sender();
        let plan = engine::plan_mint(
            self.pool.position(),
            self.pool.underlying_per_unit(),
            quantity,
        )?;

        let underlying = self.option.underlying();
        let option = self.option.token();
        self.check_pull(underlying, payer, plan.underlying_in)?;
        self.check_pull(option, payer, plan.option_in)?;
        self.pull(underlying, payer, plan.underlying_in)?;
        self.pull(option, payer, plan.option_in)?;

        self.ledger.mint_to(payer, plan.quantity)?;
        self.pool.commit(plan.pool);

        log(self.vm(), Transfer {
            from: Address::ZERO,
            to: payer,
            value: plan.quantity,
        });
        log(self.vm(), Minted {
            holder: payer,
            quantity: plan.quantity,
            underlying_in: plan.underlying_in,
            option_in: plan.option_in,
        });
        Ok(())
    }

    /// Burns `quantity` combination units of the caller and pays out the
    /// proportional share of the pool.
    ///
    /// Before the option's expiry price is final the option share is returned
    /// as raw option units; afterwards it is converted through the settlement
    /// controller and the cash is forwarded instead. The underlying share is
    /// paid in both cases.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize`
    /// - `InvalidQuantity` if `quantity` is zero
    /// - `InsufficientBalance` if the caller holds less than `quantity`
    /// - `SettlementUnavailable` if the eligibility query or cash conversion
    ///   fails, the controller reports a payout the pool did not receive, or a
    ///   cash leg cannot be forwarded
    /// - `SettlementRegressed` if eligibility flips back to pending
    /// - `TransferFailed` if a raw transfer out of the pool is refused
    pub fn redeem(&mut self, quantity: U256) -> Result<(), ComboError> {
        self.ensure_initialized()?;

        let holder = self.vm().msg_sender();
        let plan = engine::plan_redeem(
            self.pool.position(),
            self.ledger.total_supply(),
            holder,
            self.ledger.balance_of(holder),
            quantity,
        )?;

        let (settlement, first_seen) = self.settlement_state()?;
        self.distribute(holder, plan.distribution(settlement))?;

        self.ledger.burn_from(holder, plan.quantity)?;
        self.pool.commit(plan.pool);
        if first_seen {
            self.settlement_observed.set(true);
            log(
                self.vm(),
                SettlementObserved {
                    option: self.option.token(),
                },
            );
        }

        log(self.vm(), Transfer {
            from: holder,
            to: Address::ZERO,
            value: plan.quantity,
        });
        log(self.vm(), Redeemed {
            holder,
            quantity: plan.quantity,
            underlying_out: plan.underlying_share,
            option_share: plan.option_share,
            settled: settlement.is_eligible(),
        });
        Ok(())
    }

    /// Returns `(underlying_share, option_share)` a redeem of `quantity`
    /// would pay out right now, without changing state.
    ///
    /// # Errors
    /// - `InvalidQuantity` if `quantity` is zero
    /// - `InsufficientBalance` if `quantity` exceeds the outstanding supply
    pub fn preview_redeem(&self, quantity: U256) -> Result<(U256, U256), ComboError> {
        let supply = self.ledger.total_supply();
        let plan = engine::plan_redeem(self.pool.position(), supply, Address::ZERO, supply, quantity)?;
        Ok((plan.underlying_share, plan.option_share))
    }

    /// Live eligibility answer of the settlement controller.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize`
    /// - `SettlementUnavailable` if the controller cannot be queried
    pub fn is_settlement_allowed(&self) -> Result<bool, ComboError> {
        self.ensure_initialized()?;
        let option = self.option.token();
        ISettlementAdapter::new(self.settlement.get())
            .is_settlement_allowed(Call::new(), option)
            .map_err(|_| ComboError::SettlementUnavailable(SettlementUnavailable { option }))
    }

    /// Oracle price of the underlying at the option's expiry and whether it
    /// is final.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize`
    /// - `OracleUnavailable` if the oracle cannot be queried
    pub fn expiry_price(&self) -> Result<(U256, bool), ComboError> {
        self.ensure_initialized()?;
        let oracle = self.oracle.get();
        IPriceOracle::new(oracle)
            .get_price(
                Call::new(),
                self.option.underlying(),
                self.option.expiry(),
            )
            .map_err(|_| ComboError::OracleUnavailable(OracleUnavailable { oracle }))
    }

    /// Whether the oracle has finalized the underlying's expiry price.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize`
    /// - `OracleUnavailable` if the oracle cannot be queried
    pub fn is_expiry_price_finalized(&self) -> Result<bool, ComboError> {
        self.ensure_initialized()?;
        let oracle = self.oracle.get();
        IPriceOracle::new(oracle)
            .is_price_finalized(
                Call::new(),
                self.option.underlying(),
                self.option.expiry(),
            )
            .map_err(|_| ComboError::OracleUnavailable(OracleUnavailable { oracle }))
    }

    // ========================================
    // ERC-20 surface
    // ========================================

    #[must_use]
    pub fn name(&self) -> String {
        String::from(NAME)
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        String::from(SYMBOL)
    }

    /// Same precision as the wrapped option token.
    #[must_use]
    pub fn decimals(&self) -> u8 {
        self.option.decimals()
    }

    #[must_use]
    pub fn total_supply(&self) -> U256 {
        self.ledger.total_supply()
    }

    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.ledger.balance_of(account)
    }

    #[must_use]
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.ledger.allowance(owner, spender)
    }

    /// Lets `spender` move up to `amount` of the caller's combination units.
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.vm().msg_sender();
        self.ledger.approve(owner, spender, amount);
        log(self.vm(), Approval {
            owner,
            spender,
            value: amount,
        });
        true
    }

    /// Moves combination units between holders. Pool custody is unaffected.
    ///
    /// # Errors
    /// - `InsufficientBalance` if the caller holds less than `amount`
    pub fn transfer(&mut self, to: Address, amount: U256) -> Result<bool, ComboError> {
        let from = self.vm().msg_sender();
        self.ledger.transfer(from, to, amount)?;
        log(self.vm(), Transfer {
            from,
            to,
            value: amount,
        });
        Ok(true)
    }

    /// Moves combination units on behalf of `from` using the caller's allowance.
    ///
    /// # Errors
    /// - `InsufficientAllowance` if the caller's allowance is below `amount`
    /// - `InsufficientBalance` if `from` holds less than `amount`
    pub fn transfer_from(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, ComboError> {
        let spender = self.vm().msg_sender();
        let this = self.vm().contract_address();
        self.ledger.spend_allowance(this, from, spender, amount)?;
        self.ledger.transfer(from, to, amount)?;
        log(self.vm(), Transfer {
            from,
            to,
            value: amount,
        });
        Ok(true)
    }

    // ========================================
    // View Functions
    // ========================================

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    #[must_use]
    pub fn option_token(&self) -> Address {
        self.option.token()
    }

    #[must_use]
    pub fn settlement_adapter(&self) -> Address {
        self.settlement.get()
    }

    #[must_use]
    pub fn oracle(&self) -> Address {
        self.oracle.get()
    }

    #[must_use]
    pub fn underlying_asset(&self) -> Address {
        self.option.underlying()
    }

    #[must_use]
    pub fn strike_asset(&self) -> Address {
        self.option.strike_asset()
    }

    #[must_use]
    pub fn collateral_asset(&self) -> Address {
        self.option.collateral()
    }

    #[must_use]
    pub fn strike_price(&self) -> U256 {
        self.option.strike_price()
    }

    #[must_use]
    pub fn expiry(&self) -> U256 {
        self.option.expiry()
    }

    #[must_use]
    pub fn is_put(&self) -> bool {
        self.option.kind().is_put()
    }

    #[must_use]
    pub fn series_id(&self) -> B256 {
        self.option.series_id()
    }

    /// Raw underlying units backing one combination unit.
    #[must_use]
    pub fn underlying_per_unit(&self) -> U256 {
        self.pool.underlying_per_unit()
    }

    #[must_use]
    pub fn underlying_held(&self) -> U256 {
        self.pool.position().underlying_held
    }

    #[must_use]
    pub fn option_held(&self) -> U256 {
        self.pool.position().option_held
    }

    /// Whether a redeem has already observed the option as settlement eligible.
    #[must_use]
    pub fn settlement_observed(&self) -> bool {
        self.settlement_observed.get()
    }
}
