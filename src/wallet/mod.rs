// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Transaction building blocks
//!
//! Native coin selection lives in [`coin_selection`], token input selection in
//! [`token_selection`] and the token `SEND` outputs that go with it in [`token_outputs`].

pub mod coin_selection;
pub mod token_outputs;
pub mod token_selection;
pub mod utils;

pub use utils::IsDust;
