// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

//! Transaction construction core for eCash wallets.
//!
//! This crate picks the inputs of native and token transactions and builds the embed scripts
//! that carry token metadata. It never signs, broadcasts or stores anything: callers bring their
//! UTXO set and get back inputs, outputs and fee.
//!
//! - [`wallet::coin_selection`]: native coin selection with a dust policy on change
//! - [`wallet::token_selection`]: SLP and ALP token input selection
//! - [`wallet::token_outputs`]: `GENESIS`, `MINT` and `SEND` embed scripts and their outputs
//! - [`script`]: embed-script codec and minimal push checks
//! - [`amount`]: exact conversions between atomic and decimalized token amounts
//!
//! ## Example
//!
//! ```
//! use std::str::FromStr;
//!
//! use bitcoin::{Amount, OutPoint};
//! use num_bigint::BigUint;
//! use ecash_coinselect::wallet::token_selection::{filter_by_token, select_token_inputs};
//! use ecash_coinselect::wallet::token_outputs::token_send_outputs;
//! use ecash_coinselect::*;
//!
//! let token_id = TokenId::new("7e7dacd72dcdb14e00a03dd3aff47f019ed51a6f1f4e4f532ae50692f62bc4e5");
//! let outpoint = |vout: u32| {
//!     OutPoint::from_str(&format!(
//!         "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a:{}",
//!         vout
//!     ))
//! };
//! let utxos = vec![
//!     Utxo::Token {
//!         outpoint: outpoint(0)?,
//!         value: Amount::from_sat(546),
//!         token: TokenAnnotation::new(token_id.clone(), TokenProtocol::Slp, BigUint::from(5u32)),
//!     },
//!     Utxo::Token {
//!         outpoint: outpoint(1)?,
//!         value: Amount::from_sat(546),
//!         token: TokenAnnotation::new(token_id.clone(), TokenProtocol::Slp, BigUint::from(3u32)),
//!     },
//! ];
//!
//! let candidates = filter_by_token(&utxos, &token_id);
//! let requested = amount::from_decimal_string("0.6", 1)?;
//! let selection =
//!     select_token_inputs(&candidates, &token_id, TokenProtocol::Slp, &requested, 1)?;
//! assert_eq!(selection.send_amounts, vec![BigUint::from(6u32), BigUint::from(2u32)]);
//!
//! let outputs = token_send_outputs(
//!     &selection,
//!     &token_id,
//!     TokenProtocol::Slp,
//!     Destination::ScriptPubkey(vec![0x76, 0xa9, 0x14]),
//!     Amount::from_sat(DEFAULT_DUST_SATS),
//! )?;
//! assert_eq!(outputs.len(), 3);
//!
//! // the token inputs are spent, native inputs pay for the rest
//! let wallet = vec![Utxo::Native {
//!     outpoint: outpoint(2)?,
//!     value: Amount::from_sat(10_000),
//! }];
//! let tx = select_coins_with_required(
//!     &selection.inputs,
//!     &wallet,
//!     &outputs,
//!     &CoinSelectionParams::default(),
//! )?;
//! assert_eq!(tx.inputs.len(), 3);
//! assert_eq!(tx.selected_amount(), tx.output_amount() + tx.fee);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub extern crate bitcoin;
extern crate log;
pub extern crate num_bigint;
extern crate serde;

#[macro_use]
pub(crate) mod error;
pub mod amount;
pub mod script;
pub(crate) mod types;
pub mod wallet;

pub use error::Error;
pub use types::*;
pub use wallet::coin_selection::{
    max_sendable, select_coins, select_coins_with_required, CoinSelectionAlgorithm,
    DefaultCoinSelectionAlgorithm, InsufficientFunds, SelectionResult,
};
pub use wallet::token_selection::{
    filter_by_token, max_decimalized_quantity, mint_batons, select_token_inputs, token_balance,
    TokenInputSelection, TokenSelectionError,
};
pub use script::{decode_script, encode_script, is_minimal_push, Script, ScriptChunk};
