use crate::opcode::Arity;

/// The instruction stream could not be turned into an instruction
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("invalid length selector in instruction byte `{byte:#04x}` at {at:#06x}")]
  InvalidSelector { byte: u8, at: usize },

  #[error("no {arity} instruction with opcode `{opcode}`")]
  UnknownOpcode { opcode: u8, arity: Arity },

  #[error("did not expect to reach the end of instructions at {at:#06x}")]
  UnexpectedEof { at: usize },
}

/// A decoded instruction could not be carried out against the machine state
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
  #[error("stack overflow (sp = {sp:#06x})")]
  StackOverflow { sp: usize },

  #[error("stack underflow (sp = {sp:#06x})")]
  StackUnderflow { sp: usize },

  #[error("memory access out of bounds at {0:#06x}")]
  OutOfBounds(usize),

  #[error("invalid jump target {0:#06x}")]
  InvalidJumpTarget(usize),

  #[error("no register `r{0}`")]
  InvalidRegister(u8),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
  #[error("bad magic {0:02x?}")]
  BadMagic([u8; 4]),

  #[error("image truncated: expected {expected} bytes, found {actual}")]
  Truncated { expected: usize, actual: usize },

  #[error("{0} unexpected bytes after the payload")]
  TrailingBytes(usize),

  #[error("payload of {0} bytes does not fit a 16-bit length")]
  TooLarge(usize),

  #[error("payload of {len} bytes at {origin:#06x} does not fit in {capacity} bytes of memory")]
  DoesNotFit {
    origin: usize,
    len: usize,
    capacity: usize,
  },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
  #[error("memory capacity {0} must be between 1 and 65536 bytes")]
  Capacity(usize),

  #[error("code origin {origin:#06x} lies outside {capacity} bytes of memory")]
  CodeOrigin { origin: usize, capacity: usize },

  #[error("stack top {top:#06x} lies outside {capacity} bytes of memory")]
  StackTop { top: usize, capacity: usize },

  #[error("stack limit {limit:#06x} must be non-zero and at most the stack top {top:#06x}")]
  StackLimit { limit: usize, top: usize },
}

/// Anything that can stop the machine from making progress
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error(transparent)]
  Decode(#[from] DecodeError),

  #[error(transparent)]
  Fault(#[from] Fault),

  #[error(transparent)]
  Image(#[from] ImageError),

  #[error(transparent)]
  Layout(#[from] LayoutError),

  #[error("machine is halted")]
  MachineHalted,

  #[error("machine did not halt within {0} steps")]
  StepBudgetExhausted(usize),
}
