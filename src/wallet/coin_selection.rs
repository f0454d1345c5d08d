// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Coin selection
//!
//! This module provides the trait [`CoinSelectionAlgorithm`] that can be implemented to
//! define custom coin selection algorithms.
//!
//! Every algorithm shipped here is accumulative: it walks the candidate UTXOs in some order and
//! stops as soon as the selected value covers the targets plus the fee for a transaction that
//! also carries a change output. What differs between them is only the order in which candidates
//! are visited. [`InOrderCoinSelection`] keeps the caller's order while
//! [`SmallestFirstCoinSelection`] visits the smallest UTXOs first, which is the
//! [`DefaultCoinSelectionAlgorithm`].
//!
//! Only native UTXOs are ever selected. UTXOs carrying tokens or mint batons are skipped so that a
//! plain payment can never burn tokens.
//!
//! ## Example
//!
//! ```
//! # use std::str::FromStr;
//! # use bitcoin::{Amount, OutPoint};
//! # use ecash_coinselect::*;
//! # use ecash_coinselect::wallet::coin_selection::*;
//! let utxos = vec![
//!     Utxo::Native {
//!         outpoint: OutPoint::from_str(
//!             "1b59feeb756e59c8df26af0f636dfb7c6fd466743539617cee49d60ffda02994:0",
//!         )?,
//!         value: Amount::from_sat(900),
//!     },
//!     Utxo::Native {
//!         outpoint: OutPoint::from_str(
//!             "1b59feeb756e59c8df26af0f636dfb7c6fd466743539617cee49d60ffda02994:1",
//!         )?,
//!         value: Amount::from_sat(38_052),
//!     },
//! ];
//! let targets = vec![TargetOutput::new(
//!     Destination::ScriptPubkey(vec![0x76, 0xa9]),
//!     Amount::from_sat(900),
//! )];
//!
//! let result = select_coins(&utxos, &targets, &CoinSelectionParams::default())?;
//! assert_eq!(result.inputs.len(), 2);
//! assert_eq!(result.fee, Amount::from_sat(374));
//! assert_eq!(result.change().map(|c| c.value), Some(Amount::from_sat(37_678)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use bitcoin::Amount;

use crate::types::{CoinSelectionParams, TargetOutput, Utxo};
use crate::wallet::utils::{estimate_tx_size, IsDust};

/// Default coin selection algorithm used if not overridden
pub type DefaultCoinSelectionAlgorithm = SmallestFirstCoinSelection;

/// Wallet's UTXO set is not enough to cover the targets plus fee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientFunds {
    /// Amount needed for the transaction
    pub needed: Amount,
    /// Amount available for spending
    pub available: Amount,
}

impl fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insufficient funds: {} sat available of {} sat needed",
            self.available.to_sat(),
            self.needed.to_sat()
        )
    }
}

impl std::error::Error for InsufficientFunds {}

/// Result of a successful coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected inputs: the required ones first, then the optional ones in the order they were
    /// picked
    pub inputs: Vec<Utxo>,
    /// The caller's targets followed by the change output, if any
    pub outputs: Vec<TargetOutput>,
    /// Total fee paid, including any change folded in as dust
    pub fee: Amount,
    /// Index in `outputs` of the change output added by the selection
    pub change_index: Option<usize>,
}

impl SelectionResult {
    /// Sum of the selected inputs' value
    pub fn selected_amount(&self) -> Amount {
        sum_values(self.inputs.iter().map(Utxo::value))
    }

    /// Sum of the outputs' value, change included
    pub fn output_amount(&self) -> Amount {
        sum_values(self.outputs.iter().map(|output| output.value))
    }

    /// The change output added by the selection, if any
    ///
    /// Targets that already go to the wallet's change address, such as token change, are never
    /// returned here.
    pub fn change(&self) -> Option<&TargetOutput> {
        self.change_index.and_then(|index| self.outputs.get(index))
    }
}

/// Trait for generalized coin selection algorithms
///
/// This trait can be implemented to plug a customized candidate ordering, or an entirely different
/// selection strategy, into code that builds transactions.
///
/// For an example see [this module](crate::wallet::coin_selection)'s documentation.
pub trait CoinSelectionAlgorithm: fmt::Debug {
    /// Perform the coin selection
    ///
    /// - `required_utxos`: the UTXOs that must be spent, whatever their value or kind
    /// - `optional_utxos`: the UTXOs that may be spent to satisfy `targets`
    /// - `targets`: the outputs the transaction must create
    /// - `params`: fee rate, dust threshold and inputs counted for size only
    fn coin_select(
        &self,
        required_utxos: Vec<Utxo>,
        optional_utxos: Vec<Utxo>,
        targets: Vec<TargetOutput>,
        params: &CoinSelectionParams,
    ) -> Result<SelectionResult, InsufficientFunds>;
}

/// Accumulative selection in the caller's order
#[derive(Debug, Default, Clone, Copy)]
pub struct InOrderCoinSelection;

impl CoinSelectionAlgorithm for InOrderCoinSelection {
    fn coin_select(
        &self,
        required_utxos: Vec<Utxo>,
        optional_utxos: Vec<Utxo>,
        targets: Vec<TargetOutput>,
        params: &CoinSelectionParams,
    ) -> Result<SelectionResult, InsufficientFunds> {
        select_coins_with_required(&required_utxos, &optional_utxos, &targets, params)
    }
}

/// Accumulative selection, smallest UTXOs first
///
/// Only the optional UTXOs are sorted. Ties keep the caller's relative order, so the result is
/// deterministic for a given input.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmallestFirstCoinSelection;

impl CoinSelectionAlgorithm for SmallestFirstCoinSelection {
    fn coin_select(
        &self,
        required_utxos: Vec<Utxo>,
        mut optional_utxos: Vec<Utxo>,
        targets: Vec<TargetOutput>,
        params: &CoinSelectionParams,
    ) -> Result<SelectionResult, InsufficientFunds> {
        optional_utxos.sort_by_key(Utxo::value);
        select_coins_with_required(&required_utxos, &optional_utxos, &targets, params)
    }
}

/// Select native UTXOs, in the given order, to cover `targets` plus fee
///
/// The fee is estimated for the selected inputs, the ones already counted in
/// [`CoinSelectionParams::base_input_count`], the targets and one extra change output. Change
/// below the dust threshold is not created and goes to the fee instead, so the result always
/// satisfies `selected_amount == output_amount + fee`.
///
/// Fails with [`InsufficientFunds`] if the whole set is not enough. No partial selection is ever
/// returned.
pub fn select_coins(
    utxos: &[Utxo],
    targets: &[TargetOutput],
    params: &CoinSelectionParams,
) -> Result<SelectionResult, InsufficientFunds> {
    select_coins_with_required(&[], utxos, targets, params)
}

/// Like [`select_coins`], but always spending `required` first
///
/// Required UTXOs are spent whatever they carry, so token inputs of a token transaction go
/// here: their native value is credited to the selection and they are counted in the fee. The
/// optional UTXOs then fill the gap, native ones only, skipping any outpoint already required.
pub fn select_coins_with_required(
    required: &[Utxo],
    optional: &[Utxo],
    targets: &[TargetOutput],
    params: &CoinSelectionParams,
) -> Result<SelectionResult, InsufficientFunds> {
    let target_value = sum_values(targets.iter().map(|target| target.value)).to_sat();
    // one more output for the change
    let output_count = targets.len() + 1;
    let calc_fee = |selected: usize| {
        params
            .fee_rate
            .fee_for_bytes(estimate_tx_size(
                params.base_input_count + selected,
                output_count,
            ))
            .to_sat()
    };

    log::debug!(
        "target_value = `{}`, fee_rate = `{:?}`, required = `{}`, candidates = `{}`",
        target_value,
        params.fee_rate,
        required.len(),
        optional.len()
    );

    // We put the "must_use" UTXOs first, then the native "may_use" ones
    let utxos = required.iter().map(|utxo| (true, utxo)).chain(
        optional
            .iter()
            .filter(|utxo| {
                if !utxo.is_native() {
                    log::trace!("Skipping token utxo {}", utxo.outpoint());
                    return false;
                }
                !required
                    .iter()
                    .any(|must_use| must_use.outpoint() == utxo.outpoint())
            })
            .map(|utxo| (false, utxo)),
    );

    // Keep including inputs until we've got enough.
    // Store the total input value in selected_amount and the fee being paid in fee_amount
    let mut selected_amount = 0u64;
    let mut fee_amount = calc_fee(0);
    let inputs = utxos
        .scan(
            (&mut selected_amount, &mut fee_amount, 0usize),
            |(selected_amount, fee_amount, count), (must_use, utxo)| {
                if must_use
                    || *count == 0
                    || **selected_amount < target_value.saturating_add(**fee_amount)
                {
                    *count += 1;
                    **selected_amount = selected_amount.saturating_add(utxo.value().to_sat());
                    **fee_amount = calc_fee(*count);

                    log::debug!(
                        "Selected {}, updated fee_amount = `{}`",
                        utxo.outpoint(),
                        fee_amount
                    );

                    Some(utxo.clone())
                } else {
                    None
                }
            },
        )
        .collect::<Vec<_>>();

    let needed = target_value.saturating_add(fee_amount);
    if inputs.is_empty() || selected_amount < needed {
        return Err(InsufficientFunds {
            needed: Amount::from_sat(needed),
            available: Amount::from_sat(selected_amount),
        });
    }

    let change = selected_amount - needed;
    let mut outputs = targets.to_vec();
    let mut change_index = None;
    if change == 0 || change.is_dust(params.dust_threshold) {
        log::debug!(
            "Change of `{}` is below the dust threshold, adding it to the fee",
            change
        );
        fee_amount += change;
    } else {
        log::debug!("Adding change output of `{}`", change);
        change_index = Some(outputs.len());
        outputs.push(TargetOutput::change(Amount::from_sat(change)));
    }

    let result = SelectionResult {
        inputs,
        outputs,
        fee: Amount::from_sat(fee_amount),
        change_index,
    };
    debug_assert_eq!(
        result.selected_amount(),
        result.output_amount() + result.fee
    );

    Ok(result)
}

/// Largest value that can be sent by spending every native UTXO
///
/// `output_count` is the number of outputs of the resulting transaction, change included. Returns
/// zero if what is left after the fee would be dust.
pub fn max_sendable(utxos: &[Utxo], output_count: usize, params: &CoinSelectionParams) -> Amount {
    let (count, total) = utxos
        .iter()
        .filter(|utxo| utxo.is_native())
        .fold((0usize, 0u64), |(count, total), utxo| {
            (count + 1, total.saturating_add(utxo.value().to_sat()))
        });

    let fee = params
        .fee_rate
        .fee_for_bytes(estimate_tx_size(
            params.base_input_count + count,
            output_count,
        ))
        .to_sat();
    let sendable = total.saturating_sub(fee);

    log::debug!(
        "max_sendable: total = `{}`, fee = `{}`, sendable = `{}`",
        total,
        fee,
        sendable
    );

    if sendable.is_dust(params.dust_threshold) {
        Amount::ZERO
    } else {
        Amount::from_sat(sendable)
    }
}

fn sum_values<I: Iterator<Item = Amount>>(values: I) -> Amount {
    values.fold(Amount::ZERO, |acc, value| {
        acc.checked_add(value).unwrap_or(Amount::MAX)
    })
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use bitcoin::OutPoint;
    use num_bigint::BigUint;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::types::*;

    const TXID: &str = "1b59feeb756e59c8df26af0f636dfb7c6fd466743539617cee49d60ffda02994";

    fn native_utxo(value: u64, vout: u32) -> Utxo {
        Utxo::Native {
            outpoint: OutPoint::from_str(&format!("{}:{}", TXID, vout)).unwrap(),
            value: Amount::from_sat(value),
        }
    }

    fn token_utxo(value: u64, vout: u32) -> Utxo {
        Utxo::Token {
            outpoint: OutPoint::from_str(&format!("{}:{}", TXID, vout)).unwrap(),
            value: Amount::from_sat(value),
            token: TokenAnnotation::new(
                "T".into(),
                TokenProtocol::Slp,
                BigUint::from(100u32),
            ),
        }
    }

    fn payment(value: u64) -> TargetOutput {
        TargetOutput::new(
            Destination::ScriptPubkey(vec![0x76, 0xa9, 0x14]),
            Amount::from_sat(value),
        )
    }

    fn get_test_utxos() -> Vec<Utxo> {
        vec![
            native_utxo(900, 0),
            native_utxo(38_052, 1),
            native_utxo(1_000_000, 2),
        ]
    }

    fn generate_random_utxos(rng: &mut StdRng, utxos_number: usize) -> Vec<Utxo> {
        (0..utxos_number)
            .map(|i| native_utxo(rng.gen_range(546..2_000_000), i as u32))
            .collect()
    }

    #[test]
    fn test_select_coins_with_change() {
        let result = select_coins(
            &get_test_utxos(),
            &[payment(900)],
            &CoinSelectionParams::default(),
        )
        .unwrap();

        assert_eq!(result.inputs.len(), 2);
        assert_eq!(result.selected_amount(), Amount::from_sat(38_952));
        assert_eq!(result.fee, Amount::from_sat(374));
        assert_eq!(result.outputs.len(), 2);
        assert_eq!(
            result.change().map(|c| c.value),
            Some(Amount::from_sat(37_678))
        );
    }

    #[test]
    fn test_select_coins_change_folded_into_fee() {
        let result = select_coins(
            &get_test_utxos(),
            &[payment(590)],
            &CoinSelectionParams::default(),
        )
        .unwrap();

        // 900 - 590 - 226 = 84, below dust
        assert_eq!(result.inputs, vec![native_utxo(900, 0)]);
        assert_eq!(result.outputs, vec![payment(590)]);
        assert_eq!(result.fee, Amount::from_sat(310));
        assert!(result.change().is_none());
    }

    #[test]
    fn test_select_coins_multiple_targets() {
        let result = select_coins(
            &get_test_utxos(),
            &[payment(900), payment(9_000), payment(5_000)],
            &CoinSelectionParams::default(),
        )
        .unwrap();

        assert_eq!(result.inputs.len(), 2);
        assert_eq!(result.fee, Amount::from_sat(442));
        assert_eq!(
            result.change().map(|c| c.value),
            Some(Amount::from_sat(23_610))
        );
        assert_eq!(result.outputs.len(), 4);
        assert!(result.outputs[3].is_change());
    }

    #[test]
    fn test_select_coins_exact_match() {
        // 1 input, 2 outputs = 226 bytes
        let utxos = vec![native_utxo(10_226, 0)];
        let result =
            select_coins(&utxos, &[payment(10_000)], &CoinSelectionParams::default()).unwrap();

        assert_eq!(result.fee, Amount::from_sat(226));
        assert_eq!(result.outputs, vec![payment(10_000)]);
    }

    #[test]
    fn test_select_coins_insufficient_funds() {
        let result = select_coins(
            &get_test_utxos(),
            &[payment(50_000_000_000)],
            &CoinSelectionParams::default(),
        );

        assert_matches!(
            result,
            Err(InsufficientFunds {
                needed,
                available,
            }) if needed == Amount::from_sat(50_000_000_522) && available == Amount::from_sat(1_038_952)
        );
    }

    #[test]
    fn test_select_coins_empty_utxos() {
        let result = select_coins(&[], &[payment(1_000)], &CoinSelectionParams::default());
        assert_matches!(result, Err(InsufficientFunds { available, .. }) if available == Amount::ZERO);

        let result = select_coins(
            &[],
            &[],
            &CoinSelectionParams::default().fee_rate(FeeRate::from_sat_per_kb(0)),
        );
        assert_matches!(result, Err(InsufficientFunds { .. }));
    }

    #[test]
    fn test_select_coins_skips_token_utxos() {
        let utxos = vec![token_utxo(50_000, 0), native_utxo(10_000, 1)];
        let result =
            select_coins(&utxos, &[payment(1_000)], &CoinSelectionParams::default()).unwrap();

        assert_eq!(result.inputs, vec![native_utxo(10_000, 1)]);

        let utxos = vec![token_utxo(50_000, 0)];
        assert_matches!(
            select_coins(&utxos, &[payment(1_000)], &CoinSelectionParams::default()),
            Err(InsufficientFunds { available, .. }) if available == Amount::ZERO
        );
    }

    #[test]
    fn test_select_coins_base_input_count() {
        let params = CoinSelectionParams::default().base_input_count(1);
        let utxos = vec![native_utxo(100_000, 0)];
        let result = select_coins(&utxos, &[payment(1_000)], &params).unwrap();

        // two inputs counted, two outputs
        assert_eq!(result.fee, Amount::from_sat(374));
        assert_eq!(
            result.change().map(|c| c.value),
            Some(Amount::from_sat(98_626))
        );
    }

    #[test]
    fn test_select_coins_fractional_fee_rate() {
        let params = CoinSelectionParams::default().fee_rate(FeeRate::from_sat_per_kb(2_010));
        let utxos = vec![native_utxo(100_000, 0)];
        let result = select_coins(&utxos, &[payment(1_000)], &params).unwrap();

        // ceil(226 * 2.01)
        assert_eq!(result.fee, Amount::from_sat(455));
    }

    #[test]
    fn test_select_coins_custom_dust_threshold() {
        let params = CoinSelectionParams::default().dust_threshold(Amount::from_sat(50));
        let result = select_coins(&get_test_utxos(), &[payment(590)], &params).unwrap();

        assert_eq!(result.fee, Amount::from_sat(226));
        assert_eq!(result.change().map(|c| c.value), Some(Amount::from_sat(84)));
    }

    #[test]
    fn test_smallest_first_coin_selection() {
        let utxos = vec![
            native_utxo(1_000_000, 2),
            native_utxo(38_052, 1),
            native_utxo(900, 0),
        ];
        let result = SmallestFirstCoinSelection
            .coin_select(vec![], utxos, vec![payment(900)], &CoinSelectionParams::default())
            .unwrap();

        assert_eq!(result.inputs, vec![native_utxo(900, 0), native_utxo(38_052, 1)]);
        assert_eq!(result.fee, Amount::from_sat(374));
    }

    #[test]
    fn test_in_order_coin_selection() {
        let utxos = vec![native_utxo(1_000_000, 2), native_utxo(900, 0)];
        let result = InOrderCoinSelection
            .coin_select(vec![], utxos, vec![payment(900)], &CoinSelectionParams::default())
            .unwrap();

        assert_eq!(result.inputs, vec![native_utxo(1_000_000, 2)]);
    }

    #[test]
    fn test_select_coins_random_pool() {
        let seed = [0; 32];
        let mut rng: StdRng = SeedableRng::from_seed(seed);
        let params = CoinSelectionParams::default().fee_rate(FeeRate::from_sat_per_byte(2));

        for _ in 0..50 {
            let utxos = generate_random_utxos(&mut rng, 20);
            let target = rng.gen_range(1_000..5_000_000);
            match DefaultCoinSelectionAlgorithm::default().coin_select(
                vec![],
                utxos,
                vec![payment(target)],
                &params,
            ) {
                Ok(result) => {
                    assert_eq!(
                        result.selected_amount(),
                        result.output_amount() + result.fee
                    );
                    if let Some(change) = result.change() {
                        assert!(!change.value.is_dust(params.dust_threshold));
                    }
                }
                Err(e) => assert!(e.available < e.needed),
            }
        }
    }

    #[test]
    fn test_change_ignores_change_targets() {
        // token change is already addressed to the wallet
        let mut token_change = TargetOutput::change(Amount::from_sat(546));
        token_change.token = Some(TokenAmount {
            token_id: "T".into(),
            protocol: TokenProtocol::Slp,
            atoms: BigUint::from(2u32),
        });
        let targets = vec![payment(546), token_change.clone()];
        let utxos = vec![native_utxo(100_000, 0)];

        let result = select_coins(&utxos, &targets, &CoinSelectionParams::default()).unwrap();
        // 1 input, 3 outputs = 260 bytes
        assert_eq!(result.change_index, Some(2));
        assert_eq!(
            result.change().map(|c| c.value),
            Some(Amount::from_sat(98_648))
        );
        assert_eq!(result.outputs[1], token_change);

        let result = select_coins(
            &[native_utxo(1_600, 0)],
            &targets,
            &CoinSelectionParams::default(),
        )
        .unwrap();
        assert!(result.change().is_none());
        assert_eq!(result.fee, Amount::from_sat(508));
    }

    #[test]
    fn test_select_coins_with_required() {
        let required = vec![token_utxo(546, 0), token_utxo(546, 1)];
        let optional = vec![token_utxo(546, 1), native_utxo(100_000, 2)];
        let result = select_coins_with_required(
            &required,
            &optional,
            &[payment(5_000)],
            &CoinSelectionParams::default(),
        )
        .unwrap();

        // 3 inputs, 2 outputs = 522 bytes
        assert_eq!(
            result.inputs,
            vec![token_utxo(546, 0), token_utxo(546, 1), native_utxo(100_000, 2)]
        );
        assert_eq!(result.fee, Amount::from_sat(522));
        assert_eq!(
            result.change().map(|c| c.value),
            Some(Amount::from_sat(95_570))
        );
        assert_eq!(
            result.selected_amount(),
            result.output_amount() + result.fee
        );
    }

    #[test]
    fn test_required_utxos_always_spent() {
        let required = vec![native_utxo(50_000, 0)];
        let optional = vec![native_utxo(900, 1)];
        let result = InOrderCoinSelection
            .coin_select(
                required.clone(),
                optional.clone(),
                vec![payment(1_000)],
                &CoinSelectionParams::default(),
            )
            .unwrap();
        assert_eq!(result.inputs, required);

        // a required input is spent even when it is not needed
        let result = SmallestFirstCoinSelection
            .coin_select(
                vec![native_utxo(900, 1)],
                vec![native_utxo(50_000, 0)],
                vec![payment(1_000)],
                &CoinSelectionParams::default(),
            )
            .unwrap();
        assert_eq!(result.inputs.len(), 2);

        assert_matches!(
            select_coins_with_required(
                &[token_utxo(546, 0)],
                &[],
                &[payment(1_000)],
                &CoinSelectionParams::default(),
            ),
            Err(InsufficientFunds { available, .. }) if available == Amount::from_sat(546)
        );
    }

    #[test]
    fn test_max_sendable() {
        let utxos = vec![native_utxo(900, 0), native_utxo(38_052, 1), token_utxo(546, 2)];
        // 2 inputs, 1 output = 340 bytes
        assert_eq!(
            max_sendable(&utxos, 1, &CoinSelectionParams::default()),
            Amount::from_sat(38_612)
        );
    }

    #[test]
    fn test_max_sendable_dust() {
        let params = CoinSelectionParams::default();
        assert_eq!(max_sendable(&[native_utxo(600, 0)], 1, &params), Amount::ZERO);
        assert_eq!(max_sendable(&[native_utxo(100, 0)], 1, &params), Amount::ZERO);
        assert_eq!(max_sendable(&[], 1, &params), Amount::ZERO);
        assert_eq!(
            max_sendable(&[native_utxo(738, 0)], 1, &params),
            Amount::from_sat(546)
        );
    }
}
