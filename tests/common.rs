#![allow(unused)]
use std::str::FromStr;

use bitcoin::{Amount, OutPoint};
use ecash_coinselect::{Destination, TargetOutput, TokenAnnotation, TokenId, TokenProtocol, Utxo};
use num_bigint::BigUint;
use rand::{Rng, RngCore};

pub const TXID: &str = "1b59feeb756e59c8df26af0f636dfb7c6fd466743539617cee49d60ffda02994";
pub const TOKEN_ID: &str = "7e7dacd72dcdb14e00a03dd3aff47f019ed51a6f1f4e4f532ae50692f62bc4e5";

pub fn outpoint(vout: u32) -> OutPoint {
    OutPoint::from_str(&format!("{}:{}", TXID, vout)).unwrap()
}

pub fn native_utxo(value: u64, vout: u32) -> Utxo {
    Utxo::Native {
        outpoint: outpoint(vout),
        value: Amount::from_sat(value),
    }
}

pub fn token_utxo(token_id: &str, protocol: TokenProtocol, atoms: u64, vout: u32) -> Utxo {
    Utxo::Token {
        outpoint: outpoint(vout),
        value: Amount::from_sat(546),
        token: TokenAnnotation::new(TokenId::new(token_id), protocol, BigUint::from(atoms)),
    }
}

pub fn mint_baton(token_id: &str, protocol: TokenProtocol, vout: u32) -> Utxo {
    Utxo::Token {
        outpoint: outpoint(vout),
        value: Amount::from_sat(546),
        token: TokenAnnotation::mint_baton(TokenId::new(token_id), protocol),
    }
}

pub fn payment(value: u64) -> TargetOutput {
    TargetOutput::new(
        Destination::ScriptPubkey(vec![
            0x76, 0xa9, 0x14, 0x8d, 0xcf, 0x61, 0x03, 0xa3, 0x71, 0xe2, 0xc7, 0x21, 0x6c, 0xff,
            0x3b, 0x02, 0x43, 0xc1, 0x3f, 0x5c, 0xf6, 0x3a, 0x5a, 0x88, 0xac,
        ]),
        Amount::from_sat(value),
    )
}

/// Random native UTXOs with values in `min..max`
pub fn random_utxos(mut rng: impl RngCore, count: usize, min: u64, max: u64) -> Vec<Utxo> {
    (0..count)
        .map(|vout| native_utxo(rng.gen_range(min..max), vout as u32))
        .collect()
}
