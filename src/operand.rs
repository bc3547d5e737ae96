use std::fmt;

/// Packs two operand bytes into one operand word, `hi` in the upper half.
#[inline]
pub fn combine(hi: u8, lo: u8) -> u16 {
  ((hi as u16) << 8) | lo as u16
}

/// Splits an operand word back into its `(hi, lo)` bytes.
#[inline]
pub fn split(word: u16) -> (u8, u8) {
  (((word >> 8) & 0xFF) as u8, (word & 0xFF) as u8)
}

const MEMORY_BIT: u8 = 0x80;

/// Where `pop`, `tst` and `mov` read or write a byte.
///
/// | Byte        | Location           | Assembly |
/// |-------------|--------------------|----------|
/// | `0nnnnnnn`  | register `r[n]`    | `rn`     |
/// | `1aaaaaaa`  | memory `m[a]`      | `[0xaa]` |
///
/// Only the zero page (`0x00..=0x7F`) is reachable this way. Register indices
/// are not checked here; a bad index faults when the location is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
  Register(u8),
  Memory(u8),
}

impl From<u8> for Location {
  fn from(byte: u8) -> Self {
    if byte & MEMORY_BIT == 0 {
      Self::Register(byte)
    } else {
      Self::Memory(byte & !MEMORY_BIT)
    }
  }
}

impl From<Location> for u8 {
  fn from(location: Location) -> Self {
    match location {
      Location::Register(index) => index & !MEMORY_BIT,
      Location::Memory(address) => address | MEMORY_BIT,
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Register(index) => write!(f, "r{index}"),
      Self::Memory(address) => write!(f, "[{address:#04x}]"),
    }
  }
}
