use std::mem;

/// Marks the header of a live allocated block.
pub const BLOCK_MAGIC: usize = 0xDEAD_BEEF;

/// Size of both in-band headers.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Bytes at the end of the region that never become part of a span.
pub const BOOKKEEPING_OVERHEAD: usize = HEADER_SIZE;

/// Encodes the end of the free list in a span header's `next` field.
pub(crate) const NIL: usize = usize::MAX;

/// Header at the front of every allocated block.
///
/// `size` is the capacity that follows the header: the alignment byte, the
/// alignment shift and the user bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockHeader {
  pub magic: usize,
  pub size: usize,
}

impl BlockHeader {
  pub fn new(size: usize) -> Self {
    Self {
      magic: BLOCK_MAGIC,
      size,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.magic == BLOCK_MAGIC
  }
}

/// Header at the front of every free span.
///
/// `size` includes the header itself and `next` is the offset of the following
/// span, or [`NIL`]. `size` overlays [`BlockHeader::magic`], so turning a block
/// back into a span destroys its magic.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SpanHeader {
  pub size: usize,
  pub next: usize,
}

impl SpanHeader {
  pub fn new(
    size: usize,
    next: Option<usize>,
  ) -> Self {
    Self {
      size,
      next: next.unwrap_or(NIL),
    }
  }

  pub fn next(&self) -> Option<usize> {
    (self.next != NIL).then_some(self.next)
  }

  pub fn set_next(
    &mut self,
    next: Option<usize>,
  ) {
    self.next = next.unwrap_or(NIL);
  }
}

#[cfg(test)]
mod tests {
  use static_assertions::{const_assert, const_assert_eq};

  use super::*;

  const_assert_eq!(mem::size_of::<SpanHeader>(), HEADER_SIZE);
  const_assert_eq!(mem::offset_of!(SpanHeader, size), mem::offset_of!(BlockHeader, magic));
  const_assert!(HEADER_SIZE == 2 * mem::size_of::<usize>());

  #[test]
  fn test_span_next_roundtrip() {
    assert_eq!(SpanHeader::new(64, None).next(), None);
    assert_eq!(SpanHeader::new(64, Some(128)).next(), Some(128));
  }

  #[test]
  fn test_block_header_magic() {
    let header = BlockHeader::new(100);
    assert!(header.is_valid());
    assert!(!BlockHeader { magic: 100, size: 100 }.is_valid());
  }
}
