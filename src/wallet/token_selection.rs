// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Token input selection
//!
//! Helpers to pick the token-carrying UTXOs needed for a token send. Amounts are atomic and kept
//! as [`BigUint`] throughout; decimals only matter for validation and display, see
//! [`crate::amount`].
//!
//! A selection never mixes tokens: every candidate passed to [`select_token_inputs`] must carry
//! the requested token under the requested protocol, and mint batons are never spent as send
//! inputs. Use [`filter_by_token`] to build a valid candidate set from a mixed wallet.

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::amount::{max_atomic_amount, to_decimal_string};
use crate::types::{TokenId, TokenProtocol, Utxo};

/// Errors that can be raised while selecting token inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSelectionError {
    /// The candidates do not hold enough atoms
    InsufficientTokenBalance {
        /// Atoms requested
        needed: BigUint,
        /// Atoms held by all candidates
        available: BigUint,
    },
    /// The requested quantity cannot be represented by the protocol
    AmountExceedsProtocolMax {
        /// Atoms requested
        requested: BigUint,
        /// Protocol ceiling
        max: BigUint,
        /// Protocol of the token
        protocol: TokenProtocol,
    },
    /// Malformed arguments, such as candidates of another token
    InvalidInput(String),
    /// The token declares more decimals than the protocol allows
    InvalidDecimals {
        /// Decimals given
        decimals: u32,
        /// Maximum allowed
        max: u32,
    },
}

impl fmt::Display for TokenSelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientTokenBalance { needed, available } => write!(
                f,
                "Insufficient token balance: {} atoms available of {} needed",
                available, needed
            ),
            Self::AmountExceedsProtocolMax {
                requested,
                max,
                protocol,
            } => write!(
                f,
                "Requested {} atoms, but {} outputs carry at most {}",
                requested, protocol, max
            ),
            Self::InvalidInput(msg) => write!(f, "Invalid token selection input: {}", msg),
            Self::InvalidDecimals { decimals, max } => write!(
                f,
                "Token decimals must be at most {}, got {}",
                max, decimals
            ),
        }
    }
}

impl std::error::Error for TokenSelectionError {}

/// Inputs picked for a token send, and the amounts the send has to assign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInputSelection {
    /// Selected token UTXOs, in the order they were picked
    pub inputs: Vec<Utxo>,
    /// Atoms per token output: the send amount, then the change if any
    pub send_amounts: Vec<BigUint>,
    /// Atoms going back to the wallet
    pub change_atoms: BigUint,
}

impl TokenInputSelection {
    /// Total atoms held by the selected inputs
    pub fn selected_atoms(&self) -> BigUint {
        sum_atoms(self.inputs.iter())
    }

    /// Whether the send needs a token change output
    pub fn has_change(&self) -> bool {
        !self.change_atoms.is_zero()
    }
}

/// Spendable UTXOs of `token_id`, mint batons excluded
pub fn filter_by_token(utxos: &[Utxo], token_id: &TokenId) -> Vec<Utxo> {
    utxos
        .iter()
        .filter(|utxo| {
            utxo.token()
                .map(|token| &token.token_id == token_id && !token.is_mint_baton)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Mint batons of `token_id`
pub fn mint_batons(utxos: &[Utxo], token_id: &TokenId) -> Vec<Utxo> {
    utxos
        .iter()
        .filter(|utxo| {
            utxo.token()
                .map(|token| &token.token_id == token_id && token.is_mint_baton)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Spendable atoms of `token_id` held by `utxos`
pub fn token_balance(utxos: &[Utxo], token_id: &TokenId) -> BigUint {
    sum_atoms(filter_by_token(utxos, token_id).iter())
}

/// Largest quantity a single output of `protocol` can carry, decimalized for `decimals`
///
/// Fails with [`TokenSelectionError::InvalidDecimals`] above the protocol's decimals limit.
pub fn max_decimalized_quantity(
    decimals: u32,
    protocol: TokenProtocol,
) -> Result<String, TokenSelectionError> {
    check_decimals(decimals, protocol)?;
    Ok(to_decimal_string(&max_atomic_amount(protocol), decimals))
}

fn check_decimals(decimals: u32, protocol: TokenProtocol) -> Result<(), TokenSelectionError> {
    if decimals > protocol.max_decimals() {
        return Err(TokenSelectionError::InvalidDecimals {
            decimals,
            max: protocol.max_decimals(),
        });
    }
    Ok(())
}

/// Pick token inputs, in the given order, until they cover `requested` atoms
///
/// Every candidate must be a spendable UTXO of `token_id` under `protocol`; anything else is
/// [`TokenSelectionError::InvalidInput`]. The protocol ceiling is checked before the balance, so
/// an unrepresentable quantity is reported as such even when the wallet could cover it.
///
/// At least one input is always picked. A zero request therefore spends the first candidate and
/// sends all of its atoms back as change.
pub fn select_token_inputs(
    candidates: &[Utxo],
    token_id: &TokenId,
    protocol: TokenProtocol,
    requested: &BigUint,
    decimals: u32,
) -> Result<TokenInputSelection, TokenSelectionError> {
    let max = protocol.max_atoms();
    if requested > &max {
        return Err(TokenSelectionError::AmountExceedsProtocolMax {
            requested: requested.clone(),
            max,
            protocol,
        });
    }
    check_decimals(decimals, protocol)?;
    if candidates.is_empty() {
        return Err(TokenSelectionError::InvalidInput(
            "no candidate utxos".to_string(),
        ));
    }
    for utxo in candidates {
        match utxo.token() {
            Some(token) if token.is_spendable_for(token_id, protocol) => {}
            Some(token) if token.is_mint_baton => {
                log::trace!("Rejecting mint baton {}", utxo.outpoint());
                return Err(TokenSelectionError::InvalidInput(format!(
                    "utxo {} is a mint baton",
                    utxo.outpoint()
                )));
            }
            Some(token) => {
                return Err(TokenSelectionError::InvalidInput(format!(
                    "utxo {} carries {} token {}, expected {} token {}",
                    utxo.outpoint(),
                    token.protocol,
                    token.token_id,
                    protocol,
                    token_id
                )))
            }
            None => {
                return Err(TokenSelectionError::InvalidInput(format!(
                    "utxo {} carries no token",
                    utxo.outpoint()
                )))
            }
        }
    }

    log::debug!(
        "requested = `{}` atoms of {} token {}, candidates = `{}`",
        requested,
        protocol,
        token_id,
        candidates.len()
    );

    let mut selected_atoms = BigUint::zero();
    let mut inputs = Vec::new();
    for utxo in candidates {
        if let Some(token) = utxo.token() {
            selected_atoms += &token.atoms;
        }
        log::debug!(
            "Selected {}, updated selected_atoms = `{}`",
            utxo.outpoint(),
            selected_atoms
        );
        inputs.push(utxo.clone());
        if &selected_atoms >= requested {
            break;
        }
    }

    if &selected_atoms < requested {
        return Err(TokenSelectionError::InsufficientTokenBalance {
            needed: requested.clone(),
            available: selected_atoms,
        });
    }

    let change_atoms = selected_atoms - requested;
    let mut send_amounts = vec![requested.clone()];
    if !change_atoms.is_zero() {
        send_amounts.push(change_atoms.clone());
    }

    Ok(TokenInputSelection {
        inputs,
        send_amounts,
        change_atoms,
    })
}

fn sum_atoms<'a, I: Iterator<Item = &'a Utxo>>(utxos: I) -> BigUint {
    utxos
        .filter_map(Utxo::token)
        .fold(BigUint::zero(), |acc, token| acc + &token.atoms)
}
