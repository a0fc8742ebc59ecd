//! Fixed-point monetary arithmetic
//!
//! Every balance, transfer amount and commission fee in the wallet is an exact
//! base-10 number carried at scale 4 (four fractional digits). Values are backed
//! by `rust_decimal::Decimal`, an integer mantissa with a decimal scale, so no
//! binary floating point is ever involved.
//!
//! # Operations
//!
//! - [`Amount::normalize`] - parse user input into a scale-4 amount
//! - [`Amount::checked_add`] / [`Amount::checked_sub`] - overflow-checked arithmetic
//! - [`Amount::mul_rate`] - full-precision product with a rate, rounded once to scale 4
//! - `Ord` - numeric comparison

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every monetary value
pub const SCALE: u32 = 4;

/// Input that could not be read as a decimal amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a valid decimal amount")]
pub struct MalformedAmount {
    /// The raw input as received
    pub input: String,
}

impl MalformedAmount {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

/// Commission rate outside of `[0, 1)` or not a decimal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("commission rate '{input}' must be a decimal in [0, 1)")]
pub struct InvalidCommissionRate {
    pub input: String,
}

/// How a full-precision product is brought back to scale 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// 0.00005 rounds to 0.0001, -0.00005 rounds to -0.0001
    #[default]
    HalfAwayFromZero,
    /// Drop extra digits
    Truncate,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::Truncate => RoundingStrategy::ToZero,
        }
    }
}

/// Fee rate applied to the transferred amount
///
/// Stored at full precision; it is never rounded before multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    /// Create a rate from a decimal fraction (`0.015` is 1.5%)
    pub fn new(rate: Decimal) -> Result<Self, InvalidCommissionRate> {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(InvalidCommissionRate {
                input: rate.to_string(),
            });
        }
        Ok(Self(rate))
    }

    /// Parse a rate from its decimal string form
    pub fn parse(input: &str) -> Result<Self, InvalidCommissionRate> {
        let rate = Decimal::from_str(input.trim()).map_err(|_| InvalidCommissionRate {
            input: input.to_string(),
        })?;
        Self::new(rate).map_err(|_| InvalidCommissionRate {
            input: input.to_string(),
        })
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for CommissionRate {
    /// 1.5%
    fn default() -> Self {
        Self(Decimal::new(15, 3))
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scale-4 monetary value
///
/// Results of every operation are rescaled to 4 and `Display` prints exactly
/// four fractional digits (`898.5000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Parse user input into a scale-4 amount
    ///
    /// Accepts an optional sign, integer digits, and an optional fractional
    /// part (`"100"`, `"-5"`, `"0.5"`, `".25"`, `"10."`). Surrounding whitespace
    /// is ignored. Fractional digits beyond the fourth are truncated.
    ///
    /// Exponents, separators, empty strings and values outside the decimal
    /// range are rejected with [`MalformedAmount`].
    pub fn normalize(input: &str) -> Result<Self, MalformedAmount> {
        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction)
        {
            return Err(MalformedAmount::new(input));
        }

        let integer = if integer.is_empty() { "0" } else { integer };
        let fraction = &fraction[..fraction.len().min(SCALE as usize)];
        let canonical = format!(
            "{}{}.{}",
            if negative { "-" } else { "" },
            integer,
            if fraction.is_empty() { "0" } else { fraction }
        );

        Decimal::from_str(&canonical)
            .ok()
            .and_then(Self::rescaled)
            .ok_or_else(|| MalformedAmount::new(input))
    }

    /// Build an amount from ten-thousandths (`10_000` is `1.0000`)
    pub fn from_minor_units(units: i64) -> Self {
        Self(Decimal::new(units, SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).and_then(Self::rescaled)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).and_then(Self::rescaled)
    }

    /// Multiply by a rate and round the exact product once, to scale 4
    pub fn mul_rate(self, rate: CommissionRate, mode: RoundingMode) -> Option<Amount> {
        self.0
            .checked_mul(rate.0)
            .and_then(|product| Self::rescaled(product.round_dp_with_strategy(SCALE, mode.strategy())))
    }

    /// `None` when the value cannot carry four fractional digits
    ///
    /// Near the top of its range `Decimal` drops fractional digits instead
    /// of failing.
    fn rescaled(mut value: Decimal) -> Option<Self> {
        if value.is_zero() {
            value.set_sign_positive(true);
        }
        value.rescale(SCALE);
        (value.scale() == SCALE).then_some(Self(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl FromStr for Amount {
    type Err = MalformedAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}
