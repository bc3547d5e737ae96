use std::fmt;

use crate::error::DecodeError;

/// Mask for the opcode bits of an instruction's first byte
pub const OPCODE_MASK: u8 = 0x3F;

/// Shift that brings the length selector down to the low bits
pub const SELECTOR_SHIFT: u32 = 6;

/// How many operand bytes follow the first byte of an instruction.
///
/// The discriminant is the two-bit length selector itself; selector `0b11`
/// has no arity and never decodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
  Zero = 0b00,
  One = 0b01,
  Two = 0b10,
}

impl Arity {
  /// Reads the arity out of the top two bits of `byte`
  pub fn from_selector(byte: u8) -> Option<Self> {
    match byte >> SELECTOR_SHIFT {
      0b00 => Some(Self::Zero),
      0b01 => Some(Self::One),
      0b10 => Some(Self::Two),
      _ => None,
    }
  }

  /// Number of operand bytes, which is also the encoded length minus one
  pub fn operand_bytes(self) -> usize {
    self as usize
  }
}

impl fmt::Display for Arity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-arg", self.operand_bytes())
  }
}

/// Instructions without operand bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullary {
  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | No-op     | `(nothing)`   | `nop`    |
  Nop = 0x0,

  /// Returns from a `call` through the address left on the stack.
  ///
  /// | Operation | Semantics/RTL                     | Assembly |
  /// |-----------|-----------------------------------|----------|
  /// | Return    | `hi ← pop; lo ← pop; ip ← hi:lo`  | `ret`    |
  Ret = 0x1,

  /// | Operation | Semantics/RTL      | Assembly |
  /// |-----------|--------------------|----------|
  /// | Halt      | `(stop execution)` | `halt`   |
  Halt = 0x2,
}

impl TryFrom<u8> for Nullary {
  type Error = DecodeError;

  fn try_from(opcode: u8) -> Result<Self, Self::Error> {
    match opcode {
      0x0 => Ok(Self::Nop),
      0x1 => Ok(Self::Ret),
      0x2 => Ok(Self::Halt),
      _ => Err(DecodeError::UnknownOpcode {
        opcode,
        arity: Arity::Zero,
      }),
    }
  }
}

/// Instructions with one operand byte, carried in the low half of the
/// operand word.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unary {
  /// Short jump relative to the next instruction.
  ///
  /// | Operation  | Semantics/RTL   | Assembly  |
  /// |------------|-----------------|-----------|
  /// | Short Jump | `ip ← ip + ss`  | `sjmp ss` |
  Sjmp = 0x0,

  /// | Operation      | Semantics/RTL | Assembly  |
  /// |----------------|---------------|-----------|
  /// | Push Immediate | `push vv`     | `psh $vv` |
  Psh = 0x1,

  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | Pop       | `l[d] ← pop`  | `pop ld` |
  Pop = 0x2,

  /// Calls the address on top of the stack, leaving the return address in its
  /// place. The operand byte is reserved.
  ///
  /// | Operation | Semantics/RTL                                      | Assembly |
  /// |-----------|----------------------------------------------------|----------|
  /// | Call      | `t ← pop:pop; push lo(ip); push hi(ip); ip ← t`    | `call`   |
  Call = 0x3,
}

impl TryFrom<u8> for Unary {
  type Error = DecodeError;

  fn try_from(opcode: u8) -> Result<Self, Self::Error> {
    match opcode {
      0x0 => Ok(Self::Sjmp),
      0x1 => Ok(Self::Psh),
      0x2 => Ok(Self::Pop),
      0x3 => Ok(Self::Call),
      _ => Err(DecodeError::UnknownOpcode {
        opcode,
        arity: Arity::One,
      }),
    }
  }
}

/// Instructions with two operand bytes; the first byte read is the high half
/// of the operand word.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binary {
  /// Compares two locations without storing the difference.
  ///
  /// | Operation | Semantics/RTL                                  | Assembly     |
  /// |-----------|------------------------------------------------|--------------|
  /// | Test      | `zero ← l[a] = l[b]; carry ← l[a] < l[b]`      | `tst la, lb` |
  Tst = 0x0,

  /// | Operation | Semantics/RTL  | Assembly     |
  /// |-----------|----------------|--------------|
  /// | Move      | `l[d] ← l[s]`  | `mov ld, ls` |
  Mov = 0x1,
}

impl TryFrom<u8> for Binary {
  type Error = DecodeError;

  fn try_from(opcode: u8) -> Result<Self, Self::Error> {
    match opcode {
      0x0 => Ok(Self::Tst),
      0x1 => Ok(Self::Mov),
      _ => Err(DecodeError::UnknownOpcode {
        opcode,
        arity: Arity::Two,
      }),
    }
  }
}

/// Any opcode, tagged by its arity class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Nullary(Nullary),
  Unary(Unary),
  Binary(Binary),
}

impl Op {
  /// Looks `opcode` up in the table belonging to `arity`
  pub fn resolve(arity: Arity, opcode: u8) -> Result<Self, DecodeError> {
    match arity {
      Arity::Zero => Nullary::try_from(opcode).map(Self::Nullary),
      Arity::One => Unary::try_from(opcode).map(Self::Unary),
      Arity::Two => Binary::try_from(opcode).map(Self::Binary),
    }
  }

  pub fn arity(self) -> Arity {
    match self {
      Self::Nullary(_) => Arity::Zero,
      Self::Unary(_) => Arity::One,
      Self::Binary(_) => Arity::Two,
    }
  }

  pub fn opcode(self) -> u8 {
    match self {
      Self::Nullary(op) => op as u8,
      Self::Unary(op) => op as u8,
      Self::Binary(op) => op as u8,
    }
  }

  /// The first byte of this instruction's encoding
  pub fn first_byte(self) -> u8 {
    ((self.arity() as u8) << SELECTOR_SHIFT) | self.opcode()
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Self::Nullary(Nullary::Nop) => "nop",
      Self::Nullary(Nullary::Ret) => "ret",
      Self::Nullary(Nullary::Halt) => "halt",
      Self::Unary(Unary::Sjmp) => "sjmp",
      Self::Unary(Unary::Psh) => "psh",
      Self::Unary(Unary::Pop) => "pop",
      Self::Unary(Unary::Call) => "call",
      Self::Binary(Binary::Tst) => "tst",
      Self::Binary(Binary::Mov) => "mov",
    }
  }
}

impl From<Nullary> for Op {
  fn from(op: Nullary) -> Self {
    Self::Nullary(op)
  }
}

impl From<Unary> for Op {
  fn from(op: Unary) -> Self {
    Self::Unary(op)
  }
}

impl From<Binary> for Op {
  fn from(op: Binary) -> Self {
    Self::Binary(op)
  }
}
