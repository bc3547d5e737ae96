use std::fmt;
use std::ops::Range;

use tracing::trace;

use crate::error::DecodeError;
use crate::opcode::{Arity, Binary, Op, Unary, OPCODE_MASK};
use crate::operand::{split, Location};
use crate::region::Region;

/// A resolved instruction together with its operand word.
///
/// Zero-operand instructions carry `0`, one-operand instructions carry their
/// byte in the low half, two-operand instructions carry the first byte in the
/// high half and the second in the low half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
  pub op: Op,
  pub operand: u16,
}

impl Decoded {
  pub fn new(op: impl Into<Op>, operand: u16) -> Self {
    Self {
      op: op.into(),
      operand,
    }
  }

  /// Encoded length in bytes
  pub fn encoded_len(&self) -> usize {
    1 + self.op.arity().operand_bytes()
  }

  /// The bytes this instruction is stored as. Operand bits that the arity
  /// does not carry are dropped.
  pub fn encode(&self) -> Vec<u8> {
    let (hi, lo) = split(self.operand);
    let mut bytes = vec![self.op.first_byte()];
    match self.op.arity() {
      Arity::Zero => {}
      Arity::One => bytes.push(lo),
      Arity::Two => bytes.extend([hi, lo]),
    }
    bytes
  }
}

impl fmt::Display for Decoded {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (hi, lo) = split(self.operand);
    let mnemonic = self.op.mnemonic();
    match self.op {
      Op::Nullary(_) | Op::Unary(Unary::Call) => write!(f, "{mnemonic}"),
      Op::Unary(Unary::Sjmp) => write!(f, "{mnemonic} {:+}", lo as i8),
      Op::Unary(Unary::Psh) => write!(f, "{mnemonic} {lo:#04x}"),
      Op::Unary(Unary::Pop) => write!(f, "{mnemonic} {}", Location::from(lo)),
      Op::Binary(Binary::Tst | Binary::Mov) => {
        write!(f, "{mnemonic} {}, {}", Location::from(hi), Location::from(lo))
      }
    }
  }
}

/// Decodes the instruction starting at `*cursor` and moves the cursor to the
/// first byte of the next instruction.
///
/// On error the cursor is left where it was.
pub fn decode<R>(region: &R, cursor: &mut usize) -> Result<Decoded, DecodeError>
where
  R: Region + ?Sized,
{
  let at = *cursor;
  let eat = |address: usize| {
    region
      .byte(address)
      .ok_or(DecodeError::UnexpectedEof { at: address })
  };

  let byte = eat(at)?;
  let arity = Arity::from_selector(byte).ok_or(DecodeError::InvalidSelector { byte, at })?;
  let opcode = byte & OPCODE_MASK;

  let mut operand = 0u16;
  let mut last = at;
  if arity == Arity::Two {
    last += 1;
    operand |= (eat(last)? as u16) << 8;
  }
  if arity != Arity::Zero {
    last += 1;
    operand |= eat(last)? as u16;
  }

  let op = Op::resolve(arity, opcode)?;
  let decoded = Decoded { op, operand };
  *cursor = last + 1;
  trace!(at, instruction = %decoded, "decoded");
  Ok(decoded)
}

/// Decodes every instruction that starts inside `range`, paired with its
/// address.
pub fn disassemble<R>(region: &R, range: Range<usize>) -> Result<Vec<(usize, Decoded)>, DecodeError>
where
  R: Region + ?Sized,
{
  let mut listing = Vec::new();
  let mut cursor = range.start;
  while cursor < range.end {
    let at = cursor;
    listing.push((at, decode(region, &mut cursor)?));
  }
  Ok(listing)
}
