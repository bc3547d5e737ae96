//! A small container for shipping programs around.
//!
//! ```text
//! "VCPU" | origin: u16 be | length: u16 be | payload: [u8; length]
//! ```

use crate::error::ImageError;
use crate::region::Region;

pub const MAGIC: [u8; 4] = *b"VCPU";

const HEADER_LEN: usize = MAGIC.len() + 2 + 2;

/// A program payload and the address it should be loaded at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
  origin: u16,
  payload: Vec<u8>,
}

impl Image {
  pub fn new(origin: u16, payload: Vec<u8>) -> Result<Self, ImageError> {
    if payload.len() > u16::MAX as usize {
      return Err(ImageError::TooLarge(payload.len()));
    }
    Ok(Self { origin, payload })
  }

  pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
    if bytes.len() < HEADER_LEN {
      return Err(ImageError::Truncated {
        expected: HEADER_LEN,
        actual: bytes.len(),
      });
    }
    let (header, rest) = bytes.split_at(HEADER_LEN);
    let magic = [header[0], header[1], header[2], header[3]];
    if magic != MAGIC {
      return Err(ImageError::BadMagic(magic));
    }
    let origin = u16::from_be_bytes([header[4], header[5]]);
    let len = u16::from_be_bytes([header[6], header[7]]) as usize;
    if rest.len() < len {
      return Err(ImageError::Truncated {
        expected: HEADER_LEN + len,
        actual: bytes.len(),
      });
    }
    if rest.len() > len {
      return Err(ImageError::TrailingBytes(rest.len() - len));
    }
    Ok(Self {
      origin,
      payload: rest.to_vec(),
    })
  }

  pub fn to_bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
    bytes.extend(MAGIC);
    bytes.extend(self.origin.to_be_bytes());
    // length was checked on construction
    bytes.extend((self.payload.len() as u16).to_be_bytes());
    bytes.extend(&self.payload);
    bytes
  }

  pub fn origin(&self) -> usize {
    self.origin as usize
  }

  pub fn payload(&self) -> &[u8] {
    &self.payload
  }
}

impl Region for Image {
  fn instructions(&self) -> &[u8] {
    &self.payload
  }
}
