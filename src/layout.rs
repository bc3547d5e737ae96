use crate::error::LayoutError;

/// Largest memory the 16-bit addresses of `call` and `ret` can reach
pub const MAX_CAPACITY: usize = 1 << 16;

/// How the single flat memory is carved up.
///
/// Code starts at `code_origin`. The stack grows down from `stack_top` and may
/// not go below `stack_limit`. Nothing stops code and stack from overlapping;
/// keeping them apart is the loader's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
  pub capacity: usize,
  pub code_origin: usize,
  pub stack_limit: usize,
  pub stack_top: usize,
}

impl Layout {
  pub fn validate(&self) -> Result<(), LayoutError> {
    let capacity = self.capacity;
    if capacity == 0 || capacity > MAX_CAPACITY {
      return Err(LayoutError::Capacity(capacity));
    }
    if self.code_origin >= capacity {
      return Err(LayoutError::CodeOrigin {
        origin: self.code_origin,
        capacity,
      });
    }
    if self.stack_top >= capacity {
      return Err(LayoutError::StackTop {
        top: self.stack_top,
        capacity,
      });
    }
    // a full stack leaves the stack pointer at `stack_limit - 1`
    if self.stack_limit == 0 || self.stack_limit > self.stack_top {
      return Err(LayoutError::StackLimit {
        limit: self.stack_limit,
        top: self.stack_top,
      });
    }
    Ok(())
  }

  /// Bytes the stack can hold
  pub fn stack_capacity(&self) -> usize {
    self.stack_top - self.stack_limit + 1
  }
}

impl Default for Layout {
  fn default() -> Self {
    Self {
      capacity: MAX_CAPACITY,
      code_origin: 0x0000,
      stack_limit: 0xF000,
      stack_top: 0xFFFF,
    }
  }
}
