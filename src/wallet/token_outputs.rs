// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Token transaction outputs
//!
//! Builders for the embed scripts of SLP and ALP `GENESIS`, `MINT` and `SEND` transactions, and
//! for the output lists that go with them. The embed script is always the first output, followed
//! by one dust output per token amount in the same order as the amounts in the script. For a
//! send these are [`TokenInputSelection::send_amounts`].
//!
//! Genesis and mint outputs always go to the wallet's change address, and a mint baton, when
//! there is one, is kept at output 2.

use std::fmt;

use bitcoin::opcodes::all::{OP_PUSHDATA1, OP_PUSHDATA2, OP_RESERVED, OP_RETURN};
use bitcoin::Amount;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::script::{self, Script, MAX_EMBED_SCRIPT_SIZE};
use crate::types::{Destination, TargetOutput, TokenAmount, TokenId, TokenProtocol};
use crate::wallet::token_selection::TokenInputSelection;

/// Lokad prefix of SLP scripts
pub const SLP_LOKAD_ID: &[u8] = b"SLP\0";
/// Lokad prefix of ALP sections
pub const ALP_LOKAD_ID: &[u8] = b"SLP2";
/// SLP fungible token type
pub const SLP_FUNGIBLE: u8 = 0x01;
/// ALP standard token type
pub const ALP_STANDARD: u8 = 0x00;
/// Maximum number of amounts in an SLP `SEND`
pub const SLP_MAX_SEND_OUTPUTS: usize = 19;
/// Maximum number of amounts in an ALP `SEND`
pub const ALP_MAX_SEND_OUTPUTS: usize = 127;
/// Maximum number of mint batons created by an ALP `GENESIS` or `MINT`
pub const ALP_MAX_MINT_BATONS: u8 = 127;
/// Output index of the mint baton created by the builders of this module
pub const MINT_BATON_VOUT: u8 = 2;

const GENESIS: &[u8] = b"GENESIS";
const MINT: &[u8] = b"MINT";
const SEND: &[u8] = b"SEND";

/// Token metadata committed to by a `GENESIS`
///
/// `hash` is only used by SLP, `data` and `auth_pubkey` only by ALP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GenesisInfo {
    /// Token ticker
    pub ticker: String,
    /// Token name
    pub name: String,
    /// Document URL
    pub url: String,
    /// SLP document hash
    pub hash: Option<[u8; 32]>,
    /// ALP free-form data
    pub data: Vec<u8>,
    /// ALP public key allowed to authorize the token
    pub auth_pubkey: Vec<u8>,
    /// Decimal places of the token
    pub decimals: u32,
}

/// Errors raised while building token outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutputError {
    /// Token id is not 32 bytes of hex
    InvalidTokenId(String),
    /// Wrong number of amounts for the protocol
    InvalidAmountCount {
        /// Amounts given
        count: usize,
        /// Minimum allowed
        min: usize,
        /// Maximum allowed
        max: usize,
    },
    /// Too many mint batons for an ALP section
    InvalidBatonCount(u8),
    /// The token declares more decimals than the protocol allows
    InvalidDecimals {
        /// Decimals given
        decimals: u32,
        /// Maximum allowed
        max: u32,
    },
    /// An amount does not fit the protocol's amount field
    AmountExceedsProtocolMax {
        /// The amount
        amount: BigUint,
        /// Protocol of the token
        protocol: TokenProtocol,
    },
    /// The resulting script could not be encoded
    Script(script::Error),
}

impl fmt::Display for TokenOutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTokenId(id) => write!(f, "Invalid token id `{}`", id),
            Self::InvalidAmountCount { count, min, max } => write!(
                f,
                "Expected between {} and {} amounts, got {}",
                min, max, count
            ),
            Self::InvalidBatonCount(count) => write!(
                f,
                "At most {} mint batons can be created, got {}",
                ALP_MAX_MINT_BATONS, count
            ),
            Self::InvalidDecimals { decimals, max } => write!(
                f,
                "Token decimals must be at most {}, got {}",
                max, decimals
            ),
            Self::AmountExceedsProtocolMax { amount, protocol } => {
                write!(f, "Amount {} does not fit a {} output", amount, protocol)
            }
            Self::Script(e) => write!(f, "Script error: {}", e),
        }
    }
}

impl std::error::Error for TokenOutputError {}

impl From<script::Error> for TokenOutputError {
    fn from(e: script::Error) -> Self {
        TokenOutputError::Script(e)
    }
}

fn token_id_bytes(token_id: &TokenId) -> Result<[u8; 32], TokenOutputError> {
    hex::decode(token_id.as_str())
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| TokenOutputError::InvalidTokenId(token_id.to_string()))
}

fn check_amounts(
    amounts: &[BigUint],
    protocol: TokenProtocol,
    min_count: usize,
    max_count: usize,
) -> Result<(), TokenOutputError> {
    if amounts.len() < min_count || amounts.len() > max_count {
        return Err(TokenOutputError::InvalidAmountCount {
            count: amounts.len(),
            min: min_count,
            max: max_count,
        });
    }
    let max = protocol.max_atoms();
    match amounts.iter().find(|amount| *amount > &max) {
        Some(amount) => Err(TokenOutputError::AmountExceedsProtocolMax {
            amount: amount.clone(),
            protocol,
        }),
        None => Ok(()),
    }
}

fn check_decimals(decimals: u32, protocol: TokenProtocol) -> Result<(), TokenOutputError> {
    if decimals > protocol.max_decimals() {
        return Err(TokenOutputError::InvalidDecimals {
            decimals,
            max: protocol.max_decimals(),
        });
    }
    Ok(())
}

fn check_batons(num_batons: u8) -> Result<(), TokenOutputError> {
    if num_batons > ALP_MAX_MINT_BATONS {
        return Err(TokenOutputError::InvalidBatonCount(num_batons));
    }
    Ok(())
}

// Explicit-length push, with `OP_PUSHDATA1 0` for empty fields
fn slp_push(out: &mut Vec<u8>, data: &[u8]) {
    let pushdata1 = OP_PUSHDATA1.to_u8();
    match data.len() {
        0 => out.extend_from_slice(&[pushdata1, 0]),
        len if len < pushdata1 as usize => out.push(len as u8),
        len if len <= 0xff => out.extend_from_slice(&[pushdata1, len as u8]),
        len => {
            out.push(OP_PUSHDATA2.to_u8());
            out.extend_from_slice(&(len.min(0xffff) as u16).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

fn slp_script(tx_type: &[u8]) -> Vec<u8> {
    let mut out = vec![OP_RETURN.to_u8()];
    slp_push(&mut out, SLP_LOKAD_ID);
    slp_push(&mut out, &[SLP_FUNGIBLE]);
    slp_push(&mut out, tx_type);
    out
}

fn slp_push_amount(out: &mut Vec<u8>, amount: &BigUint) {
    // checked against the protocol ceiling by the callers
    let amount = amount.to_u64().unwrap_or(u64::MAX);
    slp_push(out, &amount.to_be_bytes());
}

fn slp_push_baton(out: &mut Vec<u8>, mint_baton: bool) {
    if mint_baton {
        slp_push(out, &[MINT_BATON_VOUT]);
    } else {
        slp_push(out, &[]);
    }
}

fn slp_finish(out: Vec<u8>) -> Result<Vec<u8>, TokenOutputError> {
    if out.len() > MAX_EMBED_SCRIPT_SIZE {
        return Err(script::Error::ScriptTooLarge {
            size: out.len(),
            max: MAX_EMBED_SCRIPT_SIZE,
        }
        .into());
    }
    Ok(out)
}

/// SLP `GENESIS` script minting `initial` atoms to output 1
///
/// With `mint_baton` the baton goes to output 2, otherwise the supply is fixed.
pub fn slp_genesis_script(
    info: &GenesisInfo,
    initial: &BigUint,
    mint_baton: bool,
) -> Result<Vec<u8>, TokenOutputError> {
    check_decimals(info.decimals, TokenProtocol::Slp)?;
    check_amounts(std::slice::from_ref(initial), TokenProtocol::Slp, 1, 1)?;

    let mut out = slp_script(GENESIS);
    slp_push(&mut out, info.ticker.as_bytes());
    slp_push(&mut out, info.name.as_bytes());
    slp_push(&mut out, info.url.as_bytes());
    slp_push(&mut out, info.hash.as_ref().map_or(&[][..], |hash| &hash[..]));
    slp_push(&mut out, &[info.decimals as u8]);
    slp_push_baton(&mut out, mint_baton);
    slp_push_amount(&mut out, initial);

    slp_finish(out)
}

/// SLP `MINT` script for `atoms` more of `token_id`, sent to output 1
///
/// With `mint_baton` the baton moves to output 2, otherwise it is destroyed.
pub fn slp_mint_script(
    token_id: &TokenId,
    atoms: &BigUint,
    mint_baton: bool,
) -> Result<Vec<u8>, TokenOutputError> {
    let token_id = token_id_bytes(token_id)?;
    check_amounts(std::slice::from_ref(atoms), TokenProtocol::Slp, 1, 1)?;

    let mut out = slp_script(MINT);
    slp_push(&mut out, &token_id);
    slp_push_baton(&mut out, mint_baton);
    slp_push_amount(&mut out, atoms);

    slp_finish(out)
}

/// SLP `SEND` script for `amounts` of `token_id`
///
/// SLP requires every field to be pushed with an explicit length byte, the one-byte token type
/// included, so the result is not minimal-push and is written directly rather than through
/// [`Script::encode`].
pub fn slp_send_script(
    token_id: &TokenId,
    amounts: &[BigUint],
) -> Result<Vec<u8>, TokenOutputError> {
    let token_id = token_id_bytes(token_id)?;
    check_amounts(amounts, TokenProtocol::Slp, 1, SLP_MAX_SEND_OUTPUTS)?;

    let mut out = slp_script(SEND);
    slp_push(&mut out, &token_id);
    for amount in amounts {
        slp_push_amount(&mut out, amount);
    }

    slp_finish(out)
}

fn alp_section(tx_type: &[u8]) -> Vec<u8> {
    let mut section = Vec::with_capacity(MAX_EMBED_SCRIPT_SIZE);
    section.extend_from_slice(ALP_LOKAD_ID);
    section.push(ALP_STANDARD);
    section.push(tx_type.len() as u8);
    section.extend_from_slice(tx_type);
    section
}

// Size-prefixed bytes, the prefix is a single byte below 253
fn alp_put_bytes(section: &mut Vec<u8>, data: &[u8]) -> Result<(), TokenOutputError> {
    if data.len() > MAX_EMBED_SCRIPT_SIZE {
        return Err(script::Error::ScriptTooLarge {
            size: data.len(),
            max: MAX_EMBED_SCRIPT_SIZE,
        }
        .into());
    }
    section.push(data.len() as u8);
    section.extend_from_slice(data);
    Ok(())
}

fn alp_put_amounts(section: &mut Vec<u8>, amounts: &[BigUint]) {
    section.push(amounts.len() as u8);
    for amount in amounts {
        // checked against the protocol ceiling by the callers
        let amount = amount.to_u64().unwrap_or(u64::MAX);
        section.extend_from_slice(&amount.to_le_bytes()[..6]);
    }
}

fn alp_finish(section: Vec<u8>) -> Result<Vec<u8>, TokenOutputError> {
    Ok(Script::new()
        .push_opcode(OP_RETURN)
        .push_opcode(OP_RESERVED)
        .push_slice(section)
        .encode()?)
}

/// ALP `GENESIS` script minting `amounts` to outputs 1 onwards
///
/// `num_batons` mint batons follow the minted outputs.
pub fn alp_genesis_script(
    info: &GenesisInfo,
    amounts: &[BigUint],
    num_batons: u8,
) -> Result<Vec<u8>, TokenOutputError> {
    check_decimals(info.decimals, TokenProtocol::Alp)?;
    check_amounts(amounts, TokenProtocol::Alp, 0, ALP_MAX_SEND_OUTPUTS)?;
    check_batons(num_batons)?;

    let mut section = alp_section(GENESIS);
    alp_put_bytes(&mut section, info.ticker.as_bytes())?;
    alp_put_bytes(&mut section, info.name.as_bytes())?;
    alp_put_bytes(&mut section, info.url.as_bytes())?;
    alp_put_bytes(&mut section, &info.data)?;
    alp_put_bytes(&mut section, &info.auth_pubkey)?;
    section.push(info.decimals as u8);
    alp_put_amounts(&mut section, amounts);
    section.push(num_batons);

    alp_finish(section)
}

/// ALP `MINT` script for `amounts` more of `token_id`
///
/// `num_batons` mint batons follow the minted outputs.
pub fn alp_mint_script(
    token_id: &TokenId,
    amounts: &[BigUint],
    num_batons: u8,
) -> Result<Vec<u8>, TokenOutputError> {
    let mut token_id = token_id_bytes(token_id)?;
    check_amounts(amounts, TokenProtocol::Alp, 0, ALP_MAX_SEND_OUTPUTS)?;
    check_batons(num_batons)?;
    token_id.reverse();

    let mut section = alp_section(MINT);
    section.extend_from_slice(&token_id);
    alp_put_amounts(&mut section, amounts);
    section.push(num_batons);

    alp_finish(section)
}

/// ALP `SEND` script for `amounts` of `token_id`
///
/// The section is a single push after `OP_RETURN OP_RESERVED`, holding the token id in reversed
/// byte order and each amount as 6 little-endian bytes.
pub fn alp_send_script(
    token_id: &TokenId,
    amounts: &[BigUint],
) -> Result<Vec<u8>, TokenOutputError> {
    let mut token_id = token_id_bytes(token_id)?;
    check_amounts(amounts, TokenProtocol::Alp, 1, ALP_MAX_SEND_OUTPUTS)?;
    token_id.reverse();

    let mut section = alp_section(SEND);
    section.extend_from_slice(&token_id);
    alp_put_amounts(&mut section, amounts);

    alp_finish(section)
}

/// `GENESIS` script for `protocol`, minting `initial` atoms to output 1
///
/// With `mint_baton` a single baton is created at output 2.
pub fn genesis_script(
    protocol: TokenProtocol,
    info: &GenesisInfo,
    initial: &BigUint,
    mint_baton: bool,
) -> Result<Vec<u8>, TokenOutputError> {
    match protocol {
        TokenProtocol::Slp => slp_genesis_script(info, initial, mint_baton),
        TokenProtocol::Alp => {
            alp_genesis_script(info, std::slice::from_ref(initial), u8::from(mint_baton))
        }
    }
}

/// `MINT` script for `protocol`, minting `atoms` to output 1 and keeping the baton at output 2
pub fn mint_script(
    protocol: TokenProtocol,
    token_id: &TokenId,
    atoms: &BigUint,
) -> Result<Vec<u8>, TokenOutputError> {
    match protocol {
        TokenProtocol::Slp => slp_mint_script(token_id, atoms, true),
        TokenProtocol::Alp => alp_mint_script(token_id, std::slice::from_ref(atoms), 1),
    }
}

/// `SEND` script for `protocol`
pub fn send_script(
    protocol: TokenProtocol,
    token_id: &TokenId,
    amounts: &[BigUint],
) -> Result<Vec<u8>, TokenOutputError> {
    match protocol {
        TokenProtocol::Slp => slp_send_script(token_id, amounts),
        TokenProtocol::Alp => alp_send_script(token_id, amounts),
    }
}

fn token_output(
    destination: Destination,
    dust: Amount,
    token_id: &TokenId,
    protocol: TokenProtocol,
    atoms: BigUint,
) -> TargetOutput {
    TargetOutput {
        destination,
        value: dust,
        token: Some(TokenAmount {
            token_id: token_id.clone(),
            protocol,
            atoms,
        }),
    }
}

/// Outputs of a token `GENESIS`
///
/// The embed script, the initial supply at the wallet's change address and, with `mint_baton`,
/// the baton at the change address too. The token id is the id of the transaction itself, so
/// none of these outputs carry a [`TokenAmount`].
pub fn token_genesis_outputs(
    info: &GenesisInfo,
    protocol: TokenProtocol,
    initial: &BigUint,
    mint_baton: bool,
    dust: Amount,
) -> Result<Vec<TargetOutput>, TokenOutputError> {
    let script = genesis_script(protocol, info, initial, mint_baton)?;

    let mut outputs = vec![
        TargetOutput::new(Destination::Embed(script), Amount::ZERO),
        TargetOutput::change(dust),
    ];
    if mint_baton {
        outputs.push(TargetOutput::change(dust));
    }

    log::debug!(
        "Built {} genesis outputs for {} token `{}`",
        outputs.len(),
        protocol,
        info.ticker
    );

    Ok(outputs)
}

/// Outputs minting `atoms` more of `token_id`
///
/// The minted atoms and the baton both go back to the wallet's change address, so the wallet can
/// keep minting. The transaction has to spend one of
/// [`mint_batons`](crate::wallet::token_selection::mint_batons) as a required input.
pub fn token_mint_outputs(
    token_id: &TokenId,
    protocol: TokenProtocol,
    atoms: &BigUint,
    dust: Amount,
) -> Result<Vec<TargetOutput>, TokenOutputError> {
    let script = mint_script(protocol, token_id, atoms)?;

    Ok(vec![
        TargetOutput::new(Destination::Embed(script), Amount::ZERO),
        token_output(
            Destination::Change,
            dust,
            token_id,
            protocol,
            atoms.clone(),
        ),
        TargetOutput::change(dust),
    ])
}

/// Outputs sending the selected tokens to `destination`
///
/// Returns the embed script, the destination output, and a change output if the selection has
/// token change. Token-carrying outputs are worth `dust` satoshis each.
pub fn token_send_outputs(
    selection: &TokenInputSelection,
    token_id: &TokenId,
    protocol: TokenProtocol,
    destination: Destination,
    dust: Amount,
) -> Result<Vec<TargetOutput>, TokenOutputError> {
    let script = send_script(protocol, token_id, &selection.send_amounts)?;

    let mut outputs = vec![TargetOutput::new(Destination::Embed(script), Amount::ZERO)];
    let mut amounts = selection.send_amounts.iter().cloned();
    if let Some(send) = amounts.next() {
        outputs.push(token_output(destination, dust, token_id, protocol, send));
    }
    if let Some(change) = amounts.next() {
        outputs.push(token_output(
            Destination::Change,
            dust,
            token_id,
            protocol,
            change,
        ));
    }

    log::debug!(
        "Built {} send outputs for {} token {}",
        outputs.len(),
        protocol,
        token_id
    );

    Ok(outputs)
}

/// Outputs burning the selected send amount
///
/// The embed script only assigns the change back to the wallet, so every other selected atom is
/// burned. With no change a zero amount is assigned.
pub fn token_burn_outputs(
    selection: &TokenInputSelection,
    token_id: &TokenId,
    protocol: TokenProtocol,
    dust: Amount,
) -> Result<Vec<TargetOutput>, TokenOutputError> {
    let change = selection.change_atoms.clone();
    let script = send_script(protocol, token_id, std::slice::from_ref(&change))?;

    Ok(vec![
        TargetOutput::new(Destination::Embed(script), Amount::ZERO),
        token_output(Destination::Change, dust, token_id, protocol, change),
    ])
}
