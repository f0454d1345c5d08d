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
use std::str::FromStr;

use bitcoin::{Amount, OutPoint};
use num_bigint::BigUint;
use num_traits::One;

use serde::{Deserialize, Serialize};

/// Default dust threshold, in satoshis
pub const DEFAULT_DUST_SATS: u64 = 546;

/// Token protocols that can be carried in an embed script
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenProtocol {
    /// Legacy SLP tokens, amounts are 64-bit
    Slp,
    /// Compact ALP tokens, amounts are 48-bit
    Alp,
}

impl TokenProtocol {
    /// Width in bits of an atomic amount under this protocol
    pub const fn amount_bits(&self) -> u32 {
        match self {
            TokenProtocol::Slp => 64,
            TokenProtocol::Alp => 48,
        }
    }

    /// Largest atomic amount a single output can carry, `2^bits - 1`
    pub fn max_atoms(&self) -> BigUint {
        (BigUint::one() << self.amount_bits()) - BigUint::one()
    }

    /// Largest number of decimal places a token of this protocol may declare
    pub const fn max_decimals(&self) -> u32 {
        9
    }
}

impl fmt::Display for TokenProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenProtocol::Slp => write!(f, "SLP"),
            TokenProtocol::Alp => write!(f, "ALP"),
        }
    }
}

/// Opaque token identifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(String);

impl TokenId {
    /// Create a new [`TokenId`]
    pub fn new<S: Into<String>>(id: S) -> Self {
        TokenId(id.into())
    }

    /// Return the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TokenId::new(s))
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        TokenId::new(s)
    }
}

/// Token metadata attached to an output
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenAnnotation {
    /// Token this output belongs to
    pub token_id: TokenId,
    /// Protocol the token was created with
    pub protocol: TokenProtocol,
    /// Atomic amount held by the output, always zero for a mint baton
    pub atoms: BigUint,
    /// Whether the output authorizes minting instead of carrying spendable atoms
    pub is_mint_baton: bool,
}

impl TokenAnnotation {
    /// Annotation for an output carrying `atoms` of `token_id`
    pub fn new(token_id: TokenId, protocol: TokenProtocol, atoms: BigUint) -> Self {
        TokenAnnotation {
            token_id,
            protocol,
            atoms,
            is_mint_baton: false,
        }
    }

    /// Annotation for a mint baton of `token_id`
    pub fn mint_baton(token_id: TokenId, protocol: TokenProtocol) -> Self {
        TokenAnnotation {
            token_id,
            protocol,
            atoms: BigUint::default(),
            is_mint_baton: true,
        }
    }

    /// Whether the annotation is spendable for `token_id` under `protocol`
    pub fn is_spendable_for(&self, token_id: &TokenId, protocol: TokenProtocol) -> bool {
        !self.is_mint_baton && &self.token_id == token_id && self.protocol == protocol
    }
}

/// An unspent transaction output (UTXO).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Utxo {
    /// A UTXO only holding native currency
    Native {
        /// The location of the output
        outpoint: OutPoint,
        /// Value in satoshis
        value: Amount,
    },
    /// A UTXO that also carries tokens (or a mint baton)
    Token {
        /// The location of the output
        outpoint: OutPoint,
        /// Value in satoshis, usually dust
        value: Amount,
        /// The token carried by this output
        token: TokenAnnotation,
    },
}

impl Utxo {
    /// Get the location of the UTXO
    pub fn outpoint(&self) -> OutPoint {
        match self {
            Utxo::Native { outpoint, .. } | Utxo::Token { outpoint, .. } => *outpoint,
        }
    }

    /// Get the native value of the UTXO
    pub fn value(&self) -> Amount {
        match self {
            Utxo::Native { value, .. } | Utxo::Token { value, .. } => *value,
        }
    }

    /// Get the token annotation, if any
    pub fn token(&self) -> Option<&TokenAnnotation> {
        match self {
            Utxo::Native { .. } => None,
            Utxo::Token { token, .. } => Some(token),
        }
    }

    /// Whether this UTXO only holds native currency
    pub fn is_native(&self) -> bool {
        matches!(self, Utxo::Native { .. })
    }
}

/// Where a [`TargetOutput`] sends its value
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Raw locking script supplied by the caller
    ScriptPubkey(Vec<u8>),
    /// The wallet's change address, resolved by the caller
    Change,
    /// An encoded embed-data script
    Embed(Vec<u8>),
}

/// Token quantity assigned to a [`TargetOutput`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    /// Token being sent
    pub token_id: TokenId,
    /// Protocol of the token
    pub protocol: TokenProtocol,
    /// Atomic amount
    pub atoms: BigUint,
}

/// An output the caller wants in the transaction
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetOutput {
    /// Destination of the output
    pub destination: Destination,
    /// Native value in satoshis
    pub value: Amount,
    /// Tokens assigned to the output, if any
    pub token: Option<TokenAmount>,
}

impl TargetOutput {
    /// Plain native payment
    pub fn new(destination: Destination, value: Amount) -> Self {
        TargetOutput {
            destination,
            value,
            token: None,
        }
    }

    /// Change output of `value`
    pub fn change(value: Amount) -> Self {
        TargetOutput::new(Destination::Change, value)
    }

    /// Whether this output goes back to the wallet's change address
    pub fn is_change(&self) -> bool {
        self.destination == Destination::Change
    }
}

/// Fee rate
///
/// Stored as satoshis per 1000 bytes so that fractional satoshi-per-byte rates stay exact.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeeRate(u64);

impl FeeRate {
    /// Create a new instance of [`FeeRate`] given satoshis per 1000 bytes
    pub const fn from_sat_per_kb(sat_per_kb: u64) -> Self {
        FeeRate(sat_per_kb)
    }

    /// Create a new instance of [`FeeRate`] given whole satoshis per byte
    pub const fn from_sat_per_byte(sat_per_byte: u64) -> Self {
        FeeRate(sat_per_byte * 1000)
    }

    /// Create a new [`FeeRate`] with the default min relay fee value
    pub const fn default_min_relay_fee() -> Self {
        FeeRate::from_sat_per_byte(1)
    }

    /// Return the value as satoshis per 1000 bytes
    pub const fn as_sat_per_kb(&self) -> u64 {
        self.0
    }

    /// Fee for a transaction of `bytes` bytes, rounded up to the next satoshi
    pub fn fee_for_bytes(&self, bytes: u64) -> Amount {
        let millisats = u128::from(bytes) * u128::from(self.0);
        let sats = (millisats + 999) / 1000;
        Amount::from_sat(u64::try_from(sats).unwrap_or(u64::MAX))
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        FeeRate::default_min_relay_fee()
    }
}

/// Parameters shared by the coin selection entry points
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSelectionParams {
    /// Fee rate to pay
    pub fee_rate: FeeRate,
    /// Change below this value is folded into the fee
    pub dust_threshold: Amount,
    /// Inputs already in the transaction, counted for size only
    pub base_input_count: usize,
}

impl CoinSelectionParams {
    /// Set the fee rate
    pub fn fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Set the dust threshold
    pub fn dust_threshold(mut self, dust_threshold: Amount) -> Self {
        self.dust_threshold = dust_threshold;
        self
    }

    /// Set the number of inputs already committed to the transaction
    pub fn base_input_count(mut self, base_input_count: usize) -> Self {
        self.base_input_count = base_input_count;
        self
    }
}

impl Default for CoinSelectionParams {
    fn default() -> Self {
        CoinSelectionParams {
            fee_rate: FeeRate::default(),
            dust_threshold: Amount::from_sat(DEFAULT_DUST_SATS),
            base_input_count: 0,
        }
    }
}
