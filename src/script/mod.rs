// eCash Coin Select
//
// Copyright (c) 2024 eCash Coin Select Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Embed-script codec
//!
//! This module encodes and decodes the data-carrier scripts used to embed token metadata in a
//! transaction. A [`Script`] is an ordered list of [`ScriptChunk`]s, each one either a bare opcode
//! or a data push. Pushes are always serialized with their canonical (minimal) opcode, and
//! [`is_minimal_push`] checks that an externally supplied script does the same.
//!
//! ## Example
//!
//! ```
//! # use ecash_coinselect::script::*;
//! # use bitcoin::opcodes::all::OP_RETURN;
//! let script = Script::new().push_opcode(OP_RETURN).push_slice(b"SLP\0").push_slice(b"\x01");
//! let bytes = script.encode()?;
//! assert_eq!(bytes, vec![0x6a, 0x04, b'S', b'L', b'P', 0x00, 0x51]);
//! assert!(is_minimal_push(&bytes));
//! assert_eq!(Script::decode(&bytes)?, script);
//! # Ok::<(), ecash_coinselect::script::Error>(())
//! ```

use std::fmt;

use bitcoin::opcodes::all::{
    OP_PUSHBYTES_0, OP_PUSHBYTES_75, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_PUSHNUM_1,
    OP_PUSHNUM_16, OP_PUSHNUM_NEG1,
};
use bitcoin::opcodes::Opcode;

/// Maximum size in bytes of an encoded embed script
pub const MAX_EMBED_SCRIPT_SIZE: usize = 223;
/// Maximum size in bytes of a single push
pub const MAX_PUSH_SIZE: usize = 520;

// Data implicitly pushed by `OP_1`..`OP_16`
static PUSHNUM_DATA: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
// Data implicitly pushed by `OP_1NEGATE`
static PUSHNUM_NEG1_DATA: [u8; 1] = [0x81];

/// Errors raised while encoding or decoding a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A push declared more bytes than the buffer holds
    MalformedScript {
        /// Offset of the offending opcode
        position: usize,
        /// Bytes required after the opcode
        needed: usize,
        /// Bytes left in the buffer after the opcode
        available: usize,
    },
    /// The encoded script is over the embed-script budget
    ScriptTooLarge {
        /// Encoded size
        size: usize,
        /// Allowed size
        max: usize,
    },
    /// A single push is over the push size limit
    PushTooLarge {
        /// Size of the data
        len: usize,
        /// Allowed size
        max: usize,
    },
    /// A push opcode was used as a bare opcode chunk
    PushOpcodeWithoutData(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedScript {
                position,
                needed,
                available,
            } => write!(
                f,
                "Malformed script: push at byte {} needs {} bytes but only {} remain",
                position, needed, available
            ),
            Self::ScriptTooLarge { size, max } => {
                write!(f, "Script of {} bytes exceeds the {} byte limit", size, max)
            }
            Self::PushTooLarge { len, max } => {
                write!(f, "Push of {} bytes exceeds the {} byte limit", len, max)
            }
            Self::PushOpcodeWithoutData(op) => {
                write!(f, "Push opcode 0x{:02x} used without data", op)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Reason a script failed the minimal push check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinimalPushError {
    /// The script could not be decoded at all
    Malformed(Error),
    /// A push did not use its canonical opcode
    NonMinimal {
        /// Index of the offending instruction
        index: usize,
        /// Opcode that was used
        opcode: u8,
    },
}

impl fmt::Display for MinimalPushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{}", e),
            Self::NonMinimal { index, opcode } => write!(
                f,
                "Instruction {} pushes with non-minimal opcode 0x{:02x}",
                index, opcode
            ),
        }
    }
}

impl std::error::Error for MinimalPushError {}

/// A single element of a [`Script`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptChunk {
    /// An opcode that carries no data
    Opcode(Opcode),
    /// Data pushed onto the stack
    Push(Vec<u8>),
}

impl ScriptChunk {
    /// Bare opcode chunk
    pub fn op(opcode: Opcode) -> Self {
        ScriptChunk::Opcode(opcode)
    }

    /// Push chunk holding `data`
    pub fn push_data<T: AsRef<[u8]>>(data: T) -> Self {
        ScriptChunk::Push(data.as_ref().to_vec())
    }
}

/// A raw instruction, as read from an encoded script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data pushed by `opcode`
    ///
    /// `OP_0`, `OP_1NEGATE` and `OP_1`..`OP_16` are reported here with the data they imply.
    Push {
        /// The opcode that produced the push
        opcode: Opcode,
        /// The pushed bytes
        data: &'a [u8],
    },
    /// Any other opcode
    Op(Opcode),
}

impl<'a> Instruction<'a> {
    /// Whether the push uses the canonical opcode for its data
    ///
    /// Bare opcodes are always minimal.
    pub fn is_minimal(&self) -> bool {
        match self {
            Instruction::Op(_) => true,
            Instruction::Push { opcode, data } => {
                data.len() <= MAX_PUSH_SIZE && canonical_push_opcode(data) == opcode.to_u8()
            }
        }
    }
}

/// Iterator over the raw instructions of an encoded script
///
/// Yields an error and then stops if a push runs past the end of the buffer.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    data: &'a [u8],
    position: usize,
    done: bool,
}

impl<'a> Instructions<'a> {
    /// Iterate over the instructions of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Instructions {
            data,
            position: 0,
            done: false,
        }
    }

    fn take(&mut self, start: usize, needed: usize) -> Result<&'a [u8], Error> {
        let available = self.data.len() - start;
        if needed > available {
            return Err(Error::MalformedScript {
                position: self.position,
                needed,
                available,
            });
        }
        Ok(&self.data[start..start + needed])
    }

    fn read_push(&mut self, opcode: u8) -> Result<(usize, &'a [u8]), Error> {
        let after_op = self.position + 1;
        let (len_size, len) = match opcode {
            0x01..=0x4b => (0, opcode as usize),
            0x4c => (1, self.take(after_op, 1)?[0] as usize),
            0x4d => {
                let b = self.take(after_op, 2)?;
                (2, u16::from_le_bytes([b[0], b[1]]) as usize)
            }
            _ => {
                let b = self.take(after_op, 4)?;
                (4, u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            }
        };

        let data = self
            .take(after_op + len_size, len)
            .map_err(|_| Error::MalformedScript {
                position: self.position,
                needed: len_size + len,
                available: self.data.len() - after_op,
            })?;
        Ok((1 + len_size + len, data))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.data.len() {
            return None;
        }

        let byte = self.data[self.position];
        let opcode = Opcode::from(byte);
        let (consumed, instruction) = match byte {
            0x00 => (
                1,
                Instruction::Push {
                    opcode,
                    data: &PUSHNUM_DATA[..0],
                },
            ),
            0x01..=0x4e => match self.read_push(byte) {
                Ok((consumed, data)) => (consumed, Instruction::Push { opcode, data }),
                Err(e) => {
                    log::trace!("Stopped decoding at byte {}: {}", self.position, e);
                    self.done = true;
                    return Some(Err(e));
                }
            },
            0x4f => (
                1,
                Instruction::Push {
                    opcode,
                    data: &PUSHNUM_NEG1_DATA[..],
                },
            ),
            0x51..=0x60 => {
                let n = (byte - 0x51) as usize;
                (
                    1,
                    Instruction::Push {
                        opcode,
                        data: &PUSHNUM_DATA[n..n + 1],
                    },
                )
            }
            _ => (1, Instruction::Op(opcode)),
        };

        self.position += consumed;
        Some(Ok(instruction))
    }
}

impl<'a> std::iter::FusedIterator for Instructions<'a> {}

/// An embed script: an ordered sequence of [`ScriptChunk`]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(Vec<ScriptChunk>);

impl Script {
    /// Create an empty script
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Append a bare opcode
    pub fn push_opcode(mut self, opcode: Opcode) -> Self {
        self.0.push(ScriptChunk::Opcode(opcode));
        self
    }

    /// Append a data push
    pub fn push_slice<T: AsRef<[u8]>>(mut self, data: T) -> Self {
        self.0.push(ScriptChunk::push_data(data));
        self
    }

    /// The chunks of the script, in order
    pub fn chunks(&self) -> &[ScriptChunk] {
        &self.0
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script has no chunks
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize the script using the canonical encoding of every push
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        for chunk in &self.0 {
            match chunk {
                ScriptChunk::Opcode(opcode) => {
                    let byte = opcode.to_u8();
                    if is_push_opcode(byte) {
                        return Err(Error::PushOpcodeWithoutData(byte));
                    }
                    out.push(byte);
                }
                ScriptChunk::Push(data) => write_push(&mut out, data)?,
            }
        }

        if out.len() > MAX_EMBED_SCRIPT_SIZE {
            return Err(Error::ScriptTooLarge {
                size: out.len(),
                max: MAX_EMBED_SCRIPT_SIZE,
            });
        }

        Ok(out)
    }

    /// Parse an encoded script
    ///
    /// Fails with [`Error::MalformedScript`] if a push runs past the end of `bytes`; a partial
    /// script is never returned.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Instructions::new(bytes)
            .map(|instruction| {
                instruction.map(|instruction| match instruction {
                    Instruction::Push { data, .. } => ScriptChunk::Push(data.to_vec()),
                    Instruction::Op(opcode) => ScriptChunk::Opcode(opcode),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Script)
    }
}

impl From<Vec<ScriptChunk>> for Script {
    fn from(chunks: Vec<ScriptChunk>) -> Self {
        Script(chunks)
    }
}

impl FromIterator<ScriptChunk> for Script {
    fn from_iter<I: IntoIterator<Item = ScriptChunk>>(iter: I) -> Self {
        Script(iter.into_iter().collect())
    }
}

/// Serialize `script`, see [`Script::encode`]
pub fn encode_script(script: &Script) -> Result<Vec<u8>, Error> {
    script.encode()
}

/// Parse `bytes` into a [`Script`], see [`Script::decode`]
pub fn decode_script(bytes: &[u8]) -> Result<Script, Error> {
    Script::decode(bytes)
}

/// Check that every push in `bytes` uses its canonical opcode
///
/// Returns the first violation found, or [`MinimalPushError::Malformed`] if the buffer cannot be
/// decoded.
pub fn check_minimal_push(bytes: &[u8]) -> Result<(), MinimalPushError> {
    for (index, instruction) in Instructions::new(bytes).enumerate() {
        let instruction = instruction.map_err(MinimalPushError::Malformed)?;
        if !instruction.is_minimal() {
            let opcode = match instruction {
                Instruction::Push { opcode, .. } | Instruction::Op(opcode) => opcode.to_u8(),
            };
            return Err(MinimalPushError::NonMinimal { index, opcode });
        }
    }
    Ok(())
}

/// Whether every push in `bytes` uses its canonical opcode
///
/// Malformed buffers are reported as not minimal. Use [`check_minimal_push`] to tell the two
/// cases apart.
pub fn is_minimal_push(bytes: &[u8]) -> bool {
    check_minimal_push(bytes).is_ok()
}

/// Whether `byte` is an opcode that pushes data, explicitly or implicitly
pub fn is_push_opcode(byte: u8) -> bool {
    byte <= OP_PUSHDATA4.to_u8()
        || byte == OP_PUSHNUM_NEG1.to_u8()
        || (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&byte)
}

// The one opcode allowed to push `data`
fn canonical_push_opcode(data: &[u8]) -> u8 {
    match data {
        [] => OP_PUSHBYTES_0.to_u8(),
        [n @ 1..=16] => OP_PUSHNUM_1.to_u8() + n - 1,
        [0x81] => OP_PUSHNUM_NEG1.to_u8(),
        _ if data.len() <= OP_PUSHBYTES_75.to_u8() as usize => data.len() as u8,
        _ if data.len() <= 0xff => OP_PUSHDATA1.to_u8(),
        _ if data.len() <= 0xffff => OP_PUSHDATA2.to_u8(),
        _ => OP_PUSHDATA4.to_u8(),
    }
}

fn write_push(out: &mut Vec<u8>, data: &[u8]) -> Result<(), Error> {
    if data.len() > MAX_PUSH_SIZE {
        return Err(Error::PushTooLarge {
            len: data.len(),
            max: MAX_PUSH_SIZE,
        });
    }

    let opcode = canonical_push_opcode(data);
    out.push(opcode);
    match opcode {
        0x01..=0x4b => out.extend_from_slice(data),
        0x4c => {
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        0x4d => {
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        0x4e => {
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        // implied by the opcode
        _ => {}
    }
    Ok(())
}
