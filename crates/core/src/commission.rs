//! Commission arithmetic.
//!
//! Commission is charged per order line: `price * quantity * rate / 100`,
//! rounded half-to-even to the cent. The seller receives the line total
//! minus commission; the platform keeps the commission.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, MoneyError, Quantity};

/// Errors raised when constructing a [`CommissionRate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommissionRateError {
    #[error("commission rate must be between 0 and 100 (got {0})")]
    OutOfRange(Decimal),
    #[error("commission rate must have at most 2 decimal places")]
    TooPrecise,
    #[error("invalid commission rate: {0}")]
    Invalid(String),
}

/// Platform commission as a percentage in `[0, 100]`.
///
/// ```
/// use atelier_core::CommissionRate;
///
/// assert_eq!(CommissionRate::DEFAULT.to_string(), "10.00");
/// assert!("100.01".parse::<CommissionRate>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    /// Rate applied to sellers who have no explicit rate: 10%.
    pub const DEFAULT: Self = Self(Decimal::from_parts(1000, 0, 0, false, 2));

    /// Validate a percentage.
    ///
    /// # Errors
    ///
    /// Returns [`CommissionRateError`] when the rate is outside `[0, 100]` or
    /// finer than a hundredth of a percent.
    pub fn new(percent: Decimal) -> Result<Self, CommissionRateError> {
        if percent.is_sign_negative() && !percent.is_zero() || percent > Decimal::ONE_HUNDRED {
            return Err(CommissionRateError::OutOfRange(percent));
        }
        let normalized = percent.normalize();
        if normalized.scale() > 2 {
            return Err(CommissionRateError::TooPrecise);
        }
        let mut value = normalized;
        value.rescale(2);
        Ok(Self(value))
    }

    /// The rate as a percentage.
    #[must_use]
    pub const fn percent(self) -> Decimal {
        self.0
    }

    /// Commission owed on `amount`, rounded half-to-even to the cent.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub fn commission_on(self, amount: Money) -> Result<Money, MoneyError> {
        let raw = amount
            .amount()
            .checked_mul(self.0)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(MoneyError::Overflow)?;
        Money::round_from(raw)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CommissionRate {
    type Err = CommissionRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Decimal = s
            .trim()
            .parse()
            .map_err(|_| CommissionRateError::Invalid(s.to_owned()))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = CommissionRateError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CommissionRate {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CommissionRate {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let d = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Self::new(d).map_err(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CommissionRate {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Priced order line: unit price snapshot, quantity and commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemPricing {
    pub unit_price: Money,
    pub quantity: Quantity,
    pub line_total: Money,
    pub commission: Money,
}

impl ItemPricing {
    /// Price one line at the seller's rate.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the line total exceeds
    /// [`Money::MAX`].
    pub fn compute(
        unit_price: Money,
        quantity: Quantity,
        rate: CommissionRate,
    ) -> Result<Self, MoneyError> {
        let line_total = unit_price.times(quantity)?;
        let commission = rate.commission_on(line_total)?;
        Ok(Self {
            unit_price,
            quantity,
            line_total,
            commission,
        })
    }

    /// What the seller is credited at settlement.
    ///
    /// # Errors
    ///
    /// Never fails for a rate in `[0, 100]`; the check guards stored data.
    pub fn seller_credit(&self) -> Result<Money, MoneyError> {
        self.line_total.checked_sub(self.commission)
    }
}

/// Accumulated totals for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub commission: Money,
    pub shipping: Money,
}

impl OrderTotals {
    /// Start from a shipping cost with no lines.
    #[must_use]
    pub fn with_shipping(shipping: Money) -> Self {
        Self {
            shipping,
            ..Self::default()
        }
    }

    /// Add a priced line.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if a running total exceeds
    /// [`Money::MAX`].
    pub fn add(&mut self, item: &ItemPricing) -> Result<(), MoneyError> {
        self.subtotal = self.subtotal.checked_add(item.line_total)?;
        self.commission = self.commission.checked_add(item.commission)?;
        Ok(())
    }

    /// Amount charged to the buyer: lines plus shipping.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the sum exceeds [`Money::MAX`].
    pub fn total(&self) -> Result<Money, MoneyError> {
        self.subtotal.checked_add(self.shipping)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_two_items_at_default_rate() {
        let item = ItemPricing::compute(money("100.00"), qty(2), CommissionRate::DEFAULT).unwrap();
        assert_eq!(item.line_total, money("200.00"));
        assert_eq!(item.commission, money("20.00"));
        assert_eq!(item.seller_credit().unwrap(), money("180.00"));

        let mut totals = OrderTotals::default();
        totals.add(&item).unwrap();
        assert_eq!(totals.total().unwrap(), money("200.00"));
        assert_eq!(totals.commission, money("20.00"));
    }

    #[test]
    fn test_commission_rounds_half_even() {
        // 0.25 * 10% = 0.025 -> 0.02
        let rate = CommissionRate::DEFAULT;
        assert_eq!(rate.commission_on(money("0.25")).unwrap(), money("0.02"));
        // 0.35 * 10% = 0.035 -> 0.04
        assert_eq!(rate.commission_on(money("0.35")).unwrap(), money("0.04"));
        // 33.33 * 12.5% = 4.16625 -> 4.17
        let rate: CommissionRate = "12.5".parse().unwrap();
        assert_eq!(rate.commission_on(money("33.33")).unwrap(), money("4.17"));
    }

    #[test]
    fn test_rate_bounds() {
        assert!(CommissionRate::new(Decimal::ZERO).is_ok());
        assert!(CommissionRate::new(Decimal::ONE_HUNDRED).is_ok());
        assert!(matches!(
            "-0.01".parse::<CommissionRate>(),
            Err(CommissionRateError::OutOfRange(_))
        ));
        assert!(matches!(
            "100.5".parse::<CommissionRate>(),
            Err(CommissionRateError::OutOfRange(_))
        ));
        assert_eq!(
            "10.001".parse::<CommissionRate>(),
            Err(CommissionRateError::TooPrecise)
        );
        assert!(matches!(
            "ten".parse::<CommissionRate>(),
            Err(CommissionRateError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_and_full_rate() {
        let zero = CommissionRate::new(Decimal::ZERO).unwrap();
        let item = ItemPricing::compute(money("9.99"), qty(3), zero).unwrap();
        assert!(item.commission.is_zero());
        assert_eq!(item.seller_credit().unwrap(), money("29.97"));

        let full = CommissionRate::new(Decimal::ONE_HUNDRED).unwrap();
        let item = ItemPricing::compute(money("9.99"), qty(3), full).unwrap();
        assert_eq!(item.commission, money("29.97"));
        assert!(item.seller_credit().unwrap().is_zero());
    }

    #[test]
    fn test_totals_include_shipping() {
        let mut totals = OrderTotals::with_shipping(money("5.00"));
        for (price, n) in [("10.00", 1), ("2.50", 4)] {
            let item = ItemPricing::compute(money(price), qty(n), CommissionRate::DEFAULT).unwrap();
            totals.add(&item).unwrap();
        }
        assert_eq!(totals.subtotal, money("20.00"));
        assert_eq!(totals.commission, money("2.00"));
        assert_eq!(totals.total().unwrap(), money("25.00"));
    }

    #[test]
    fn test_line_and_order_totals_stay_within_money_bound() {
        let rate = CommissionRate::DEFAULT;
        assert!(matches!(
            ItemPricing::compute(Money::MAX, qty(2), rate),
            Err(MoneyError::TooLarge { .. })
        ));

        let half = money("5000000000.00");
        let item = ItemPricing::compute(half, qty(1), rate).unwrap();
        let mut totals = OrderTotals::default();
        totals.add(&item).unwrap();
        totals.add(&item).unwrap_err();
        assert_eq!(totals.subtotal, half);

        let totals = OrderTotals {
            subtotal: Money::MAX,
            commission: Money::ZERO,
            shipping: money("0.01"),
        };
        assert!(matches!(totals.total(), Err(MoneyError::TooLarge { .. })));
    }

    #[test]
    fn test_rate_serde_uses_string_decimal() {
        let rate: CommissionRate = serde_json::from_str("\"7.5\"").unwrap();
        assert_eq!(rate.to_string(), "7.50");
        assert_eq!(serde_json::to_string(&rate).unwrap(), "\"7.50\"");
    }
}
