use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// decimal places kept for every fee amount (paise / cents)
pub const MONEY_SCALE: u32 = 2;

/// Money type with 2 decimal places precision for fee amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(MONEY_SCALE))
    }

    /// accept only amounts already expressed in whole minor units
    pub fn from_decimal_exact(d: Decimal) -> Option<Self> {
        let rounded = d.round_dp(MONEY_SCALE);
        (rounded == d).then_some(Money(rounded))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s.trim())?.round_dp(MONEY_SCALE)))
    }

    /// create from integer amount (rupees, dollars, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor amount (paise, cents)
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, MONEY_SCALE))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// subtraction floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        (self - other).max(Money::ZERO)
    }

    /// calculate percentage (e.g., 10% of 5000)
    pub fn percentage(&self, percent: Decimal) -> Self {
        Money((self.0 * percent / Decimal::from(100)).round_dp(MONEY_SCALE))
    }

    /// split into `parts` installments, remainder lands on the last one
    pub fn split(&self, parts: u32) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let share = Money(
            (self.0 / Decimal::from(parts))
                .round_dp_with_strategy(MONEY_SCALE, rust_decimal::RoundingStrategy::ToZero),
        );
        let mut shares = vec![share; parts as usize];
        let allocated = share.0 * Decimal::from(parts - 1);
        if let Some(last) = shares.last_mut() {
            *last = Money(self.0 - allocated);
        }
        shares
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// amounts arriving from outside carry at most MONEY_SCALE places
impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let d = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal_exact(d).ok_or_else(|| {
            de::Error::custom(format!("amount {} has more than {} decimal places", d, MONEY_SCALE))
        })
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(MONEY_SCALE))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(MONEY_SCALE);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(MONEY_SCALE))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = (self.0 - other.0).round_dp(MONEY_SCALE);
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_precision() {
        let m = Money::from_str_exact("100.126").unwrap();
        assert_eq!(m.to_string(), "100.13"); // rounded to 2 places
    }

    #[test]
    fn test_deserialize_rejects_sub_minor_amounts() {
        let m: Money = serde_json::from_str(r#""1500.50""#).unwrap();
        assert_eq!(m, Money::from_minor(150_050));
        let trailing: Money = serde_json::from_str(r#""12.340""#).unwrap();
        assert_eq!(trailing, Money::from_str_exact("12.34").unwrap());

        assert!(serde_json::from_str::<Money>(r#""0.004""#).is_err());
        assert!(serde_json::from_str::<Money>(r#""99.995""#).is_err());
        assert_eq!(Money::from_decimal_exact(dec!(0.004)), None);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::from_minor(150_050), Money::from_str_exact("1500.50").unwrap());
        assert_eq!(Money::from_minor(100), Money::ONE);
    }

    #[test]
    fn test_saturating_sub_never_negative() {
        let paid = Money::from_major(6_000);
        let amount = Money::from_major(5_000);
        assert_eq!(amount.saturating_sub(paid), Money::ZERO);
        assert_eq!(paid.saturating_sub(amount), Money::from_major(1_000));
    }

    #[test]
    fn test_split_puts_remainder_on_last_share() {
        let shares = Money::from_major(10_000).split(3);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0], Money::from_str_exact("3333.33").unwrap());
        assert_eq!(shares[1], Money::from_str_exact("3333.33").unwrap());
        assert_eq!(shares[2], Money::from_str_exact("3333.34").unwrap());
        assert_eq!(shares.iter().sum::<Money>(), Money::from_major(10_000));

        assert!(Money::from_major(100).split(0).is_empty());
    }

    #[test]
    fn test_concession_percentage() {
        let fee = Money::from_major(12_000);
        assert_eq!(fee.percentage(dec!(12.5)), Money::from_major(1_500));
    }
}
