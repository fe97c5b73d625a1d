//! Fixed-point money and order quantities.
//!
//! Amounts are non-negative decimals with at most two fractional digits,
//! stored as `NUMERIC(12, 2)`. Signed values only appear when folding a
//! ledger (see [`crate::ledger`]); everything a caller passes in or reads
//! back is a [`Money`].

use core::fmt;
use core::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of fractional digits carried by every amount.
pub const MONEY_SCALE: u32 = 2;

/// Errors that can occur when constructing a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount must be strictly greater than zero.
    #[error("amount must be positive")]
    NotPositive,
    /// The amount has more fractional digits than a cent.
    #[error("amount must have at most {MONEY_SCALE} decimal places (got {scale})")]
    TooPrecise {
        /// Scale of the rejected value.
        scale: u32,
    },
    /// The result does not fit in a decimal.
    #[error("amount overflow")]
    Overflow,
    /// The amount does not fit the `NUMERIC(12, 2)` money columns.
    #[error("amount must be at most {max}")]
    TooLarge {
        /// Largest accepted amount.
        max: Money,
    },
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
}

/// A non-negative monetary amount with cent precision.
///
/// ## Examples
///
/// ```
/// use atelier_core::Money;
///
/// let price: Money = "100.00".parse().unwrap();
/// assert_eq!(price.to_string(), "100.00");
/// assert!("-1".parse::<Money>().is_err());
/// assert!("1.005".parse::<Money>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero with cent scale.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));

    /// Largest amount a price, order total or balance may hold:
    /// `9999999999.99`, the `NUMERIC(12, 2)` limit.
    pub const MAX: Self = Self(Decimal::from_parts(
        0xD4A5_0FFF,
        0xE8,
        0,
        false,
        MONEY_SCALE,
    ));

    /// Create a `Money` from a decimal.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is negative, has more than two
    /// fractional digits (after dropping trailing zeros), or exceeds
    /// [`Self::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise {
                scale: normalized.scale(),
            });
        }
        if normalized > Self::MAX.0 {
            return Err(MoneyError::TooLarge { max: Self::MAX });
        }
        let mut value = normalized;
        value.rescale(MONEY_SCALE);
        value.set_sign_positive(true);
        Ok(Self(value))
    }

    /// Create a strictly positive `Money`, as required for deposits and
    /// withdrawals.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for zero or negative input, or
    /// [`MoneyError::TooPrecise`] for sub-cent precision.
    pub fn positive(amount: Decimal) -> Result<Self, MoneyError> {
        if amount <= Decimal::ZERO {
            return Err(MoneyError::NotPositive);
        }
        Self::new(amount)
    }

    /// Create from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative input.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(cents, MONEY_SCALE))
    }

    /// Round an arbitrary-precision decimal to cents (banker's rounding) and
    /// wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative input.
    pub fn round_from(amount: Decimal) -> Result<Self, MoneyError> {
        Self::new(amount.round_dp_with_strategy(
            MONEY_SCALE,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        ))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true for a zero amount.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the sum exceeds [`Self::MAX`].
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .ok_or(MoneyError::Overflow)
            .and_then(Self::new)
    }

    /// Subtract `other`, failing when the result would go below zero.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `other > self`.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        if other > self {
            return Err(MoneyError::Negative);
        }
        Self::new(self.0 - other.0)
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the product exceeds [`Self::MAX`].
    pub fn times(self, quantity: Quantity) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or(MoneyError::Overflow)
            .and_then(Self::new)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| MoneyError::Invalid(e.to_string()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Self::new(amount).map_err(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities start at one.
    #[error("quantity must be at least 1")]
    Zero,
    /// The value does not fit the stock column.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Largest accepted quantity.
        max: u32,
    },
}

/// Number of units of a product in a cart line or order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Largest accepted quantity (stock is stored as `INTEGER`).
    #[allow(clippy::cast_sign_loss)]
    pub const MAX: u32 = i32::MAX as u32;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error for zero or values above [`Self::MAX`].
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value > Self::MAX {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        NonZeroU32::new(value).map(Self).ok_or(QuantityError::Zero)
    }

    /// The quantity as an unsigned integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The quantity as the `INTEGER` used by stock columns.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i32(self) -> i32 {
        self.0.get() as i32
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u32::try_from(value).map_or(Err(QuantityError::Zero), Self::new)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
