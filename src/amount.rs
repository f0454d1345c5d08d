// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Token amount precision
//!
//! Conversions between atomic token amounts and their decimalized string form. Everything here
//! is a structural transform over exact integers: no floating point is involved, so amounts up to
//! `2^64 - 1` (and beyond) are represented exactly.
//!
//! ```
//! # use ecash_coinselect::amount::*;
//! # use ecash_coinselect::TokenProtocol;
//! # use num_bigint::BigUint;
//! assert_eq!(to_decimal_string(&BigUint::from(10012345u32), 5), "100.12345");
//! assert_eq!(from_decimal_string("100.123", 5)?, BigUint::from(10012300u32));
//! assert_eq!(
//!     to_decimal_string(&max_atomic_amount(TokenProtocol::Alp), 9),
//!     "281474.976710655"
//! );
//! # Ok::<(), ParseAmountError>(())
//! ```

use std::fmt;

use num_bigint::BigUint;

use crate::types::TokenProtocol;

/// Errors returned when parsing a decimalized amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    /// The string was empty
    Empty,
    /// The string contained something other than digits and a single `.`
    InvalidCharacter(String),
    /// More fractional digits than the token supports
    ExcessPrecision {
        /// Fractional digits in the input
        given: usize,
        /// Decimals of the token
        decimals: u32,
    },
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Decimalized amount must be a non-empty string"),
            Self::InvalidCharacter(s) => write!(
                f,
                "Decimalized amount `{}` must contain only digits and optionally one decimal point",
                s
            ),
            Self::ExcessPrecision { given, decimals } => write!(
                f,
                "Decimalized amount specified at {} decimal places, token supports {}",
                given, decimals
            ),
        }
    }
}

impl std::error::Error for ParseAmountError {}

/// Maximum atomic amount representable under `protocol`
pub fn max_atomic_amount(protocol: TokenProtocol) -> BigUint {
    protocol.max_atoms()
}

/// Insert a decimal point `decimals` digits from the right of `atoms`
///
/// The digit string is left-padded with zeros so that there is always at least one digit before
/// the point. With `decimals == 0` the integer string is returned unchanged.
pub fn to_decimal_string(atoms: &BigUint, decimals: u32) -> String {
    let digits = atoms.to_str_radix(10);
    if decimals == 0 {
        return digits;
    }

    let decimals = decimals as usize;
    let digits = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let (before, after) = digits.split_at(digits.len() - decimals);
    format!("{}.{}", before, after)
}

/// Parse a decimalized amount into atoms for a token with `decimals` decimal places
///
/// Missing fractional digits are padded with zeros, so `"100.1"` at 3 decimals is `100100`.
/// Supplying more fractional digits than `decimals` is an error, even when they are zeros.
pub fn from_decimal_string(s: &str, decimals: u32) -> Result<BigUint, ParseAmountError> {
    if s.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let mut parts = s.splitn(2, '.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(integer) || !is_digits(fraction) || (integer.is_empty() && fraction.is_empty())
    {
        return Err(ParseAmountError::InvalidCharacter(s.to_string()));
    }

    if fraction.len() > decimals as usize {
        return Err(ParseAmountError::ExcessPrecision {
            given: fraction.len(),
            decimals,
        });
    }

    let padding = "0".repeat(decimals as usize - fraction.len());
    let digits = format!("{}{}{}", integer, fraction, padding);
    if digits.is_empty() {
        return Ok(BigUint::default());
    }

    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| ParseAmountError::InvalidCharacter(s.to_string()))
}
