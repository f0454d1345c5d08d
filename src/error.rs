// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fmt;

use bitcoin::Amount;

use crate::wallet::coin_selection::InsufficientFunds;
use crate::wallet::token_outputs::TokenOutputError;
use crate::wallet::token_selection::TokenSelectionError;
use crate::{amount, script};

/// Errors that can be returned by any operation of this crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Wallet's UTXO set is not enough to cover the targets plus fee
    InsufficientFunds {
        /// Sats needed for the transaction
        needed: Amount,
        /// Sats available for spending
        available: Amount,
    },
    /// Error while selecting token inputs
    TokenSelection(TokenSelectionError),
    /// Error while building token outputs
    TokenOutput(TokenOutputError),
    /// Error while encoding or decoding a script
    Script(script::Error),
    /// A script failed the minimal push check
    MinimalPush(script::MinimalPushError),
    /// Error while parsing a decimalized amount
    ParseAmount(amount::ParseAmountError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds { needed, available } => write!(
                f,
                "Insufficient funds: {} sat available of {} sat needed",
                available.to_sat(),
                needed.to_sat()
            ),
            Self::TokenSelection(err) => write!(f, "Token selection error: {}", err),
            Self::TokenOutput(err) => write!(f, "Token output error: {}", err),
            Self::Script(err) => write!(f, "Script error: {}", err),
            Self::MinimalPush(err) => write!(f, "Non-minimal script: {}", err),
            Self::ParseAmount(err) => write!(f, "Amount parsing error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(TokenSelectionError, TokenSelection);
impl_error!(script::Error, Script);
impl_error!(script::MinimalPushError, MinimalPush);
impl_error!(amount::ParseAmountError, ParseAmount);

impl From<InsufficientFunds> for Error {
    fn from(err: InsufficientFunds) -> Self {
        Error::InsufficientFunds {
            needed: err.needed,
            available: err.available,
        }
    }
}

impl From<TokenOutputError> for Error {
    fn from(err: TokenOutputError) -> Self {
        match err {
            TokenOutputError::Script(inner) => Error::Script(inner),
            e => Error::TokenOutput(e),
        }
    }
}
