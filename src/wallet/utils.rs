// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Transaction size and dust helpers

use bitcoin::Amount;

/// Fixed transaction overhead: version, input and output counts, locktime
pub const TX_OVERHEAD_BYTES: u64 = 10;
/// Size of a signed P2PKH input
pub const P2PKH_INPUT_BYTES: u64 = 148;
/// Size of a P2PKH output
pub const P2PKH_OUTPUT_BYTES: u64 = 34;

/// Trait to check if a value is below a dust threshold
// we implement this trait to make sure we don't mess up the comparison with off-by-one like a <=
// instead of a < etc.
pub trait IsDust {
    /// Check whether or not a value is below `threshold`
    fn is_dust(&self, threshold: Amount) -> bool;
}

impl IsDust for Amount {
    fn is_dust(&self, threshold: Amount) -> bool {
        *self < threshold
    }
}

impl IsDust for u64 {
    fn is_dust(&self, threshold: Amount) -> bool {
        Amount::from_sat(*self).is_dust(threshold)
    }
}

/// Estimated size in bytes of a P2PKH transaction with the given number of inputs and outputs
pub fn estimate_tx_size(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD_BYTES + P2PKH_INPUT_BYTES * inputs as u64 + P2PKH_OUTPUT_BYTES * outputs as u64
}
