use primitive_types::U256;
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Number of fractional decimal digits carried by every monetary value on the ledger.
pub const DECIMALS: usize = 18;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount `{0}`")]
    Malformed(String),
    #[error("amount `{0}` has more than 18 decimal places")]
    TooPrecise(String),
    #[error("amount `{0}` is too large")]
    Overflow(String),
}

/// A ledger quantity scaled by 10^18.
///
/// The inner integer is exactly what the contract stores. Conversion to a human
/// decimal happens only through [`fmt::Display`] and [`Amount::to_fixed`]; values
/// going back to the ledger are always re-encoded from caller input with
/// [`Amount::parse_decimal`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Amount(U256);

fn scale() -> U256 {
    U256::exp10(DECIMALS)
}

impl Amount {
    pub const ZERO: Amount = Amount(U256([0; 4]));

    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whole units, e.g. `Amount::from_units(2)` is `2.0`.
    pub fn from_units(units: u64) -> Self {
        Self(U256::from(units) * scale())
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Encodes a plain decimal string such as `"0.05"` or `"12"`.
    pub fn parse_decimal(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty())
            || !all_digits(whole)
            || !all_digits(fraction)
        {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }
        if fraction.len() > DECIMALS {
            return Err(AmountError::TooPrecise(trimmed.to_string()));
        }

        let overflow = || AmountError::Overflow(trimmed.to_string());
        let whole = if whole.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole).map_err(|_| overflow())?
        };
        let padded = format!("{fraction:0<width$}", width = DECIMALS);
        let fraction = U256::from_dec_str(&padded).map_err(|_| overflow())?;
        let raw = whole
            .checked_mul(scale())
            .and_then(|scaled| scaled.checked_add(fraction))
            .ok_or_else(overflow)?;
        Ok(Self(raw))
    }

    /// Renders with exactly `places` decimals, rounding half up.
    pub fn to_fixed(&self, places: usize) -> String {
        let places = places.min(DECIMALS);
        let divisor = U256::exp10(DECIMALS - places);
        let (mut quotient, remainder) = self.0.div_mod(divisor);
        if remainder * U256::from(2u8) >= divisor {
            quotient = quotient.saturating_add(U256::one());
        }
        if places == 0 {
            return quotient.to_string();
        }
        let (whole, fraction) = quotient.div_mod(U256::exp10(places));
        format!("{whole}.{:0>places$}", fraction.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, fraction) = self.0.div_mod(scale());
        if fraction.is_zero() {
            return write!(f, "{whole}");
        }
        let digits = format!("{:0>width$}", fraction.to_string(), width = DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl serde::Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_decimal__fractional_input__scales_by_eighteen_places() {
        // when
        let amount = Amount::parse_decimal("0.05").unwrap();

        // then
        assert_eq!(amount.raw(), U256::from(50_000_000_000_000_000u64));
    }

    #[test]
    fn parse_decimal__rejects_malformed_input() {
        for bad in ["", "  ", ".", "-1", "1e18", "1.2.3", "abc", "0x10"] {
            assert!(Amount::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_decimal__nineteen_decimals__is_too_precise() {
        let err = Amount::parse_decimal("0.0000000000000000001").unwrap_err();
        assert!(matches!(err, AmountError::TooPrecise(_)));
    }

    #[test]
    fn parse_decimal__value_beyond_u256__overflows() {
        let huge = "9".repeat(80);
        let err = Amount::parse_decimal(&huge).unwrap_err();
        assert!(matches!(err, AmountError::Overflow(_)));
    }

    #[test]
    fn display__trims_trailing_zeros() {
        assert_eq!(Amount::from_units(0).to_string(), "0");
        assert_eq!(Amount::from_units(3).to_string(), "3");
        assert_eq!(Amount::parse_decimal("1.50").unwrap().to_string(), "1.5");
        assert_eq!(
            Amount::from_raw(U256::one()).to_string(),
            "0.000000000000000001"
        );
    }

    #[test]
    fn to_fixed__rounds_half_up() {
        let amount = Amount::parse_decimal("1.23455").unwrap();
        assert_eq!(amount.to_fixed(4), "1.2346");
        assert_eq!(Amount::parse_decimal("0.99996").unwrap().to_fixed(4), "1.0000");
        assert_eq!(Amount::ZERO.to_fixed(4), "0.0000");
        assert_eq!(Amount::parse_decimal("2.5").unwrap().to_fixed(0), "3");
    }

    proptest! {
        #[test]
        fn parse_then_display__returns_original_decimal(
            whole in 0u64..1_000_000_000,
            fraction in 0u64..1_000_000_000_000_000_000,
        ) {
            let input = format!("{whole}.{fraction:018}");
            let amount = Amount::parse_decimal(&input).unwrap();
            let reparsed = Amount::parse_decimal(&amount.to_string()).unwrap();
            prop_assert_eq!(amount, reparsed);
        }
    }
}
