//! Immutable identity of the wrapped option and the unit scaling derived from it.

use alloc::{vec, vec::Vec};
use alloy_primitives::{keccak256, Address, B256, U256, U8};
use stylus_sdk::prelude::*;

use crate::{ArithmeticOverflow, ComboError, InvalidDecimals};

/// Largest decimal precision accepted for either leg.
pub const MAX_DECIMALS: u8 = 18;

/// Represents the kind of the wrapped option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionKind {
    /// Call option: Right to BUY underlying at strike price.
    #[default]
    Call,
    /// Put option: Right to SELL underlying at strike price.
    Put,
}

impl OptionKind {
    #[must_use]
    pub const fn from_is_put(is_put: bool) -> Self {
        if is_put {
            Self::Put
        } else {
            Self::Call
        }
    }

    #[must_use]
    pub const fn is_put(self) -> bool {
        matches!(self, Self::Put)
    }

    /// Converts option kind to u8 for encoding.
    ///
    /// # Returns
    /// - `0` for Call
    /// - `1` for Put
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Call => 0,
            Self::Put => 1,
        }
    }
}

/// Generates a deterministic identifier for the wrapped option series.
///
/// Computed as `keccak256(option_token, underlying, strike_asset, strike, expiry, kind)`.
/// Two pools wrapping the same option token report the same id.
pub(crate) fn series_id(
    option_token: Address,
    underlying: Address,
    strike_asset: Address,
    strike_price: U256,
    expiry: U256,
    kind: OptionKind,
) -> B256 {
    let encoded = [
        option_token.as_slice(),
        underlying.as_slice(),
        strike_asset.as_slice(),
        strike_price.to_be_bytes::<32>().as_slice(),
        expiry.to_be_bytes::<32>().as_slice(),
        &[kind.to_u8()],
    ]
    .concat();

    keccak256(encoded)
}

/// Underlying units held per combination-token unit.
///
/// The combination token inherits the option token's decimals, so one
/// combination unit is backed by `10^(underlying_decimals - option_decimals)`
/// raw underlying units.
///
/// # Errors
/// - `InvalidDecimals`: If either precision exceeds 18 or the underlying is
///   less precise than the option token
/// - `ArithmeticOverflow`: If the scale factor cannot be represented
pub(crate) fn unit_scale(underlying_decimals: u8, option_decimals: u8) -> Result<U256, ComboError> {
    if underlying_decimals > MAX_DECIMALS {
        return Err(ComboError::InvalidDecimals(InvalidDecimals {
            decimals: underlying_decimals,
        }));
    }
    if option_decimals > underlying_decimals {
        return Err(ComboError::InvalidDecimals(InvalidDecimals {
            decimals: option_decimals,
        }));
    }

    let scale_exp = underlying_decimals - option_decimals;
    U256::from(10)
        .checked_pow(U256::from(scale_exp))
        .ok_or(ComboError::ArithmeticOverflow(ArithmeticOverflow {}))
}

sol_storage! {
    /// Terms of the wrapped option, written once by `initialize`.
    pub struct OptionTerms {
        address token;
        address underlying;
        address strike_asset;
        address collateral;
        uint256 strike_price;
        uint256 expiry;
        bool is_put;
        uint8 decimals;
        bytes32 series_id;
    }
}

impl OptionTerms {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn bind(
        &mut self,
        token: Address,
        underlying: Address,
        strike_asset: Address,
        collateral: Address,
        strike_price: U256,
        expiry: U256,
        kind: OptionKind,
        decimals: u8,
    ) -> B256 {
        let id = series_id(token, underlying, strike_asset, strike_price, expiry, kind);

        self.token.set(token);
        self.underlying.set(underlying);
        self.strike_asset.set(strike_asset);
        self.collateral.set(collateral);
        self.strike_price.set(strike_price);
        self.expiry.set(expiry);
        self.is_put.set(kind.is_put());
        self.decimals.set(U8::from(decimals));
        self.series_id.set(id);

        id
    }

    pub(crate) fn token(&self) -> Address {
        self.token.get()
    }

    pub(crate) fn underlying(&self) -> Address {
        self.underlying.get()
    }

    pub(crate) fn strike_asset(&self) -> Address {
        self.strike_asset.get()
    }

    pub(crate) fn collateral(&self) -> Address {
        self.collateral.get()
    }

    pub(crate) fn strike_price(&self) -> U256 {
        self.strike_price.get()
    }

    pub(crate) fn expiry(&self) -> U256 {
        self.expiry.get()
    }

    pub(crate) fn kind(&self) -> OptionKind {
        OptionKind::from_is_put(self.is_put.get())
    }

    pub(crate) fn decimals(&self) -> u8 {
        self.decimals.get().to::<u8>()
    }

    pub(crate) fn series_id(&self) -> B256 {
        self.series_id.get()
    }
}
