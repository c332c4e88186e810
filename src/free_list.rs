//! Address-ordered singly linked list of free spans.
//!
//! ```text
//!   head
//!    │
//!    ▼
//!   ┌──────────────┬─────────┐     ┌──────────────┬─────┐
//!   │ size │ next ─┼─ ...    │ ──▶ │ size │ NIL   │ ... │
//!   └──────────────┴─────────┘     └──────────────┴─────┘
//!   offset 0                        offset 0x240
//! ```
//!
//! Each span header lives at the start of the span it describes. Links are byte
//! offsets into the [`Region`], never pointers.

use std::fmt;

use tracing::trace;

use crate::{
  block::{HEADER_SIZE, SpanHeader},
  region::Region,
};

/// A free span as reported by [`RegionAllocator::free_spans`].
///
/// [`RegionAllocator::free_spans`]: crate::RegionAllocator::free_spans
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeSpan {
  /// Byte offset from the start of the region.
  pub offset: usize,
  /// Length in bytes, header included.
  pub size: usize,
}

impl FreeSpan {
  pub fn end(&self) -> usize {
    self.offset + self.size
  }
}

impl fmt::Display for FreeSpan {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{:#08x}, {:#08x}) {} bytes", self.offset, self.end(), self.size)
  }
}

/// First span large enough for a request, and where it hangs in the list.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Fit {
  pub prev: Option<usize>,
  pub offset: usize,
  pub span: SpanHeader,
}

#[derive(Debug)]
pub(crate) struct FreeList {
  head: Option<usize>,
}

impl FreeList {
  pub const fn empty() -> Self {
    Self { head: None }
  }

  /// Starts a list holding one span.
  pub fn with_span(
    region: &mut Region,
    offset: usize,
    size: usize,
  ) -> Self {
    debug_assert!(size >= HEADER_SIZE);
    region.write(offset, SpanHeader::new(size, None));

    Self { head: Some(offset) }
  }

  /// Links a span in front of the first entry that starts at or after its end.
  pub fn insert(
    &mut self,
    region: &mut Region,
    offset: usize,
    size: usize,
  ) {
    debug_assert!(size >= HEADER_SIZE);

    let end = offset + size;
    let mut prev = None;
    let mut current = self.head;

    while let Some(curr_offset) = current {
      if end <= curr_offset {
        break;
      }
      prev = Some(curr_offset);
      current = region.read::<SpanHeader>(curr_offset).next();
    }

    region.write(offset, SpanHeader::new(size, current));
    self.relink(region, prev, Some(offset));
  }

  /// Coalesces touching neighbours in one sweep and returns how many spans
  /// were absorbed.
  pub fn merge(
    &mut self,
    region: &mut Region,
  ) -> usize {
    let Some(mut current) = self.head else {
      return 0;
    };

    let mut span = region.read::<SpanHeader>(current);
    let mut absorbed = 0;

    while let Some(next) = span.next() {
      if current + span.size == next {
        // Stay on `current`: the grown span may now touch its new neighbour.
        let neighbour = region.read::<SpanHeader>(next);
        span.size += neighbour.size;
        span.next = neighbour.next;
        region.write(current, span);

        trace!(offset = current, size = span.size, absorbed = next, "merged spans");
        absorbed += 1;
      } else {
        current = next;
        span = region.read(next);
      }
    }

    absorbed
  }

  /// Finds the first span, in address order, of at least `required` bytes.
  pub fn first_fit(
    &self,
    region: &Region,
    required: usize,
  ) -> Option<Fit> {
    let mut prev = None;
    let mut current = self.head;

    while let Some(offset) = current {
      let span = region.read::<SpanHeader>(offset);
      if span.size >= required {
        return Some(Fit { prev, offset, span });
      }
      prev = Some(offset);
      current = span.next();
    }

    None
  }

  /// Points `prev`'s link, or the head when `prev` is `None`, at `next`.
  pub fn relink(
    &mut self,
    region: &mut Region,
    prev: Option<usize>,
    next: Option<usize>,
  ) {
    match prev {
      Some(prev) => {
        let mut span = region.read::<SpanHeader>(prev);
        span.set_next(next);
        region.write(prev, span);
      }
      None => self.head = next,
    }
  }

  pub fn iter<'a>(
    &self,
    region: &'a Region,
  ) -> Spans<'a> {
    Spans {
      region,
      next: self.head,
    }
  }
}

/// Iterator over the free list in address order.
#[derive(Debug)]
pub(crate) struct Spans<'a> {
  region: &'a Region,
  next: Option<usize>,
}

impl Iterator for Spans<'_> {
  type Item = FreeSpan;

  fn next(&mut self) -> Option<Self::Item> {
    let offset = self.next?;
    let span = self.region.read::<SpanHeader>(offset);
    self.next = span.next();

    Some(FreeSpan {
      offset,
      size: span.size,
    })
  }
}
