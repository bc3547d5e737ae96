//! A tiny virtual CPU with a self-describing, variable-length instruction
//! encoding.
//!
//! Every instruction is one to three bytes. The top two bits of the first
//! byte select how many operand bytes follow (`00`, `01` or `10`), the low six
//! bits are the opcode:
//!
//! ```text
//! 1 byte: [0 0] [o o o o o o]
//! 2 byte: [0 1] [o o o o o o] [a a a a a a a a]
//! 3 byte: [1 0] [o o o o o o] [a a a a a a a a] [b b b b b b b b]
//! ```
//!
//! Code, stack and data all live in one flat byte memory. There is no return
//! address register: `call` and `ret` shuttle addresses through the stack.

pub mod decode;
pub mod error;
pub mod image;
pub mod layout;
pub mod opcode;
pub mod operand;
pub mod region;
pub mod vm;

pub use error::{DecodeError, Error, Fault, ImageError, LayoutError};
