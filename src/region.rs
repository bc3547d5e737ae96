/// Byte-addressed storage that instructions can be fetched from
pub trait Region {
  fn instructions(&self) -> &[u8];

  /// The byte at `address`, if the region reaches that far
  #[inline]
  fn byte(&self, address: usize) -> Option<u8> {
    self.instructions().get(address).copied()
  }

  fn len(&self) -> usize {
    self.instructions().len()
  }

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A `Chunk` is a detached run of encoded instructions, useful for decoding
/// or disassembling a program before it is loaded into a machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
  instructions: Vec<u8>,
}

impl From<Vec<u8>> for Chunk {
  fn from(instructions: Vec<u8>) -> Self {
    Self { instructions }
  }
}

impl From<&[u8]> for Chunk {
  fn from(instructions: &[u8]) -> Self {
    instructions.to_vec().into()
  }
}

impl Region for Chunk {
  fn instructions(&self) -> &[u8] {
    &self.instructions
  }
}
