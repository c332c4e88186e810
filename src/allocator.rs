use std::{alloc::Layout, mem, ptr::NonNull};

use tracing::{debug, trace, warn};

use crate::{
  align::align_forward,
  block::{BOOKKEEPING_OVERHEAD, BlockHeader, HEADER_SIZE, SpanHeader},
  error::{Error, Result},
  free_list::{FreeList, FreeSpan},
  region::Region,
};

/// Alignment used by callers that do not ask for one.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Largest supported alignment. The alignment shift is stored in a single byte,
/// so it must stay below 256.
pub const MAX_ALIGNMENT: usize = 256;

/// Snapshot of how the region is carved up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
  pub region_size: usize,
  pub free_bytes: usize,
  pub free_spans: usize,
  /// Header-inclusive size of all live blocks.
  pub allocated_bytes: usize,
  pub allocated_blocks: usize,
}

impl RegionStats {
  /// Bytes covered by free spans and live blocks together. Equals
  /// `region_size - BOOKKEEPING_OVERHEAD` for a live allocator.
  pub fn accounted_bytes(&self) -> usize {
    self.free_bytes + self.allocated_bytes
  }
}

/// A first-fit allocator serving from one OS mapping.
///
/// The mapping is acquired once in [`RegionAllocator::new`] and released when
/// the allocator is dropped. Pointers handed out by [`alloc`] must not be used
/// after that.
///
/// [`alloc`]: RegionAllocator::alloc
#[derive(Debug)]
pub struct RegionAllocator {
  region: Region,
  free_list: FreeList,
  allocated_bytes: usize,
  allocated_blocks: usize,
}

impl Default for RegionAllocator {
  /// An inert allocator that owns no memory.
  fn default() -> Self {
    Self {
      region: Region::empty(),
      free_list: FreeList::empty(),
      allocated_bytes: 0,
      allocated_blocks: 0,
    }
  }
}

impl RegionAllocator {
  /// Maps at least `requested_size` bytes, rounded up to the page size.
  pub fn new(requested_size: usize) -> Result<Self> {
    let mut region = Region::map(requested_size)?;
    let initial = region.size() - BOOKKEEPING_OVERHEAD;
    let free_list = FreeList::with_span(&mut region, 0, initial);

    debug!(region_size = region.size(), initial, "allocator ready");

    Ok(Self {
      region,
      free_list,
      allocated_bytes: 0,
      allocated_blocks: 0,
    })
  }

  /// Size of the mapping, which may exceed the size that was requested.
  /// Zero once the allocator has been moved out of.
  pub fn region_size(&self) -> usize {
    self.region.size()
  }

  /// Moves the region out, leaving `self` inert with a region size of 0.
  pub fn take(&mut self) -> Self {
    mem::take(self)
  }

  /// Allocates `size` bytes aligned to `alignment`.
  ///
  /// Returns `Ok(None)` when no free span is large enough. The allocator is
  /// left untouched in that case and on every error.
  ///
  /// Every request reserves a full `alignment` of slack on top of the header
  /// and alignment byte, even when the block happens to start aligned.
  pub fn alloc(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if size == 0 {
      return Err(Error::ZeroSize);
    }
    if !alignment.is_power_of_two() || alignment > MAX_ALIGNMENT {
      return Err(Error::InvalidAlignment { alignment });
    }

    let Some(required) = size.checked_add(HEADER_SIZE + alignment + 1) else {
      return Ok(None);
    };

    let Some(fit) = self.free_list.first_fit(&self.region, required) else {
      trace!(size, alignment, required, "no span large enough");
      return Ok(None);
    };

    // A remainder that cannot hold a span header stays with the block.
    let remainder = fit.span.size - required;
    let split = remainder >= HEADER_SIZE;
    let block_size = if split { required } else { fit.span.size };
    let capacity = block_size - HEADER_SIZE;

    // One byte past the header is kept for the alignment shift.
    let raw = fit.offset + HEADER_SIZE + 1;
    let raw_addr = self.region.addr_of(raw);
    let (aligned_addr, _) = align_forward(raw_addr, alignment, capacity - 1);
    let user = raw + (aligned_addr - raw_addr);
    let shift =
      u8::try_from(aligned_addr - raw_addr).map_err(|_| Error::InvalidAlignment { alignment })?;

    if split {
      let tail = fit.offset + required;
      self.region.write(tail, SpanHeader::new(remainder, fit.span.next()));
      self.free_list.relink(&mut self.region, fit.prev, Some(tail));
      trace!(offset = fit.offset, tail, remainder, "split span");
    } else {
      self.free_list.relink(&mut self.region, fit.prev, fit.span.next());
      trace!(offset = fit.offset, size = fit.span.size, "consumed span");
    }

    self.region.write(fit.offset, BlockHeader::new(capacity));
    self.region.write(user - 1, shift);

    self.allocated_bytes += block_size;
    self.allocated_blocks += 1;

    trace!(offset = fit.offset, block_size, user, shift, "allocated block");

    Ok(Some(self.region.ptr_at(user)))
  }

  /// Allocates a block for `layout`.
  pub fn alloc_layout(
    &mut self,
    layout: Layout,
  ) -> Result<Option<NonNull<u8>>> {
    self.alloc(layout.size(), layout.align())
  }

  /// Returns a block to the free list and coalesces it with its neighbours.
  ///
  /// The header check is best-effort. A stray pointer can pass it by landing
  /// on bytes that happen to look like a live header.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`alloc`](Self::alloc) on this allocator
  /// and must not have been freed since. The caller must not touch the block
  /// afterwards.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    let ptr = NonNull::new(ptr).ok_or(Error::NullPointer)?;
    let corrupt = || Error::CorruptBlock {
      addr: ptr.as_ptr().addr(),
    };

    let user = self
      .region
      .offset_of(ptr)
      .filter(|&offset| offset > HEADER_SIZE)
      .ok_or_else(corrupt)?;

    let shift = usize::from(self.region.read::<u8>(user - 1));
    let header_offset = user.checked_sub(HEADER_SIZE + shift + 1).ok_or_else(corrupt)?;

    let header = self.region.read::<BlockHeader>(header_offset);
    let block_size = header.size.checked_add(HEADER_SIZE);
    let fits = block_size
      .and_then(|size| size.checked_add(header_offset))
      .is_some_and(|end| end <= self.region.size() - BOOKKEEPING_OVERHEAD);

    let block_size = match block_size {
      Some(size) if header.is_valid() && fits => size,
      _ => {
        warn!(
          addr = ptr.as_ptr().addr(),
          header_offset,
          magic = header.magic,
          "rejected free of invalid block"
        );
        return Err(corrupt());
      }
    };

    self.free_list.insert(&mut self.region, header_offset, block_size);
    self.free_list.merge(&mut self.region);

    self.allocated_bytes = self.allocated_bytes.saturating_sub(block_size);
    self.allocated_blocks = self.allocated_blocks.saturating_sub(1);

    trace!(offset = header_offset, block_size, "freed block");

    Ok(())
  }

  /// Free spans in address order.
  pub fn free_spans(&self) -> impl Iterator<Item = FreeSpan> + '_ {
    self.free_list.iter(&self.region)
  }

  pub fn stats(&self) -> RegionStats {
    let (free_spans, free_bytes) = self
      .free_spans()
      .fold((0, 0), |(count, bytes), span| (count + 1, bytes + span.size));

    RegionStats {
      region_size: self.region_size(),
      free_bytes,
      free_spans,
      allocated_bytes: self.allocated_bytes,
      allocated_blocks: self.allocated_blocks,
    }
  }

  /// Prints the free list to stdout.
  pub fn print_free_blocks(&self) {
    println!("free blocks (region = {} bytes):", self.region_size());
    for span in self.free_spans() {
      println!("  {span}");
    }
  }
}

#[cfg(test)]
mod tests {
  use static_assertions::{assert_impl_all, assert_not_impl_any};

  use super::*;

  assert_impl_all!(RegionAllocator: Send, Default);
  assert_not_impl_any!(RegionAllocator: Sync, Clone);

  fn allocator() -> RegionAllocator {
    RegionAllocator::new(4096).unwrap()
  }

  fn spans(allocator: &RegionAllocator) -> Vec<(usize, usize)> {
    allocator.free_spans().map(|s| (s.offset, s.size)).collect()
  }

  fn assert_accounted(allocator: &RegionAllocator) {
    let stats = allocator.stats();
    assert_eq!(stats.accounted_bytes(), stats.region_size - BOOKKEEPING_OVERHEAD);
  }

  #[test]
  fn test_initial_span() {
    let allocator = allocator();
    let size = allocator.region_size();

    assert_eq!(spans(&allocator), [(0, size - HEADER_SIZE)]);
    assert_accounted(&allocator);
  }

  #[test]
  fn test_alloc_splits_first_span() {
    let mut allocator = allocator();
    let size = allocator.region_size();

    let ptr = allocator.alloc(100, 8).unwrap().unwrap();
    let required = 100 + HEADER_SIZE + 8 + 1;

    assert_eq!(spans(&allocator), [(required, size - HEADER_SIZE - required)]);
    assert_eq!(ptr.as_ptr().addr() % 8, 0);

    let header: BlockHeader = allocator.region.read(0);
    assert_eq!(header, BlockHeader::new(required - HEADER_SIZE));
    assert_accounted(&allocator);
  }

  #[test]
  fn test_alignment_byte_records_shift() {
    let mut allocator = allocator();

    let ptr = allocator.alloc(10, 64).unwrap().unwrap();
    let user = allocator.region.offset_of(ptr).unwrap();

    // Page-aligned base: the raw candidate sits at offset HEADER_SIZE + 1.
    assert_eq!(user, 64);
    let shift = allocator.region.read::<u8>(user - 1);
    assert_eq!(usize::from(shift), 64 - (HEADER_SIZE + 1));
  }

  #[test]
  fn test_alloc_consumes_span_with_small_remainder() {
    let mut allocator = allocator();
    let available = allocator.region_size() - HEADER_SIZE;

    // Leave a remainder too small to hold a span header.
    let size = available - (HEADER_SIZE + 8 + 1) - (HEADER_SIZE - 1);
    let ptr = allocator.alloc(size, 8).unwrap();

    assert!(ptr.is_some());
    assert!(spans(&allocator).is_empty());
    assert_eq!(allocator.stats().allocated_bytes, available);
    assert_accounted(&allocator);

    unsafe { allocator.free(ptr.unwrap().as_ptr()).unwrap() };
    assert_eq!(spans(&allocator), [(0, available)]);
  }

  #[test]
  fn test_alloc_exact_fit_removes_span() {
    let mut allocator = allocator();
    let available = allocator.region_size() - HEADER_SIZE;

    let size = available - (HEADER_SIZE + 8 + 1);
    assert!(allocator.alloc(size, 8).unwrap().is_some());

    assert!(spans(&allocator).is_empty());
    assert_eq!(allocator.alloc(1, 1).unwrap(), None);
  }

  #[test]
  fn test_rejects_oversized_alignment() {
    let mut allocator = allocator();

    assert!(matches!(
      allocator.alloc(8, MAX_ALIGNMENT * 2),
      Err(Error::InvalidAlignment { alignment: 512 })
    ));
    assert!(allocator.alloc(8, MAX_ALIGNMENT).unwrap().is_some());
  }

  #[test]
  fn test_huge_size_is_no_memory() {
    let mut allocator = allocator();

    assert_eq!(allocator.alloc(usize::MAX, 8).unwrap(), None);
    assert_accounted(&allocator);
  }

  #[test]
  fn test_free_coalesces_with_both_neighbours() {
    let mut allocator = allocator();
    let a = allocator.alloc(40, 8).unwrap().unwrap();
    let b = allocator.alloc(40, 8).unwrap().unwrap();
    let c = allocator.alloc(40, 8).unwrap().unwrap();
    let _d = allocator.alloc(40, 8).unwrap().unwrap();
    let block = 40 + HEADER_SIZE + 8 + 1;

    unsafe {
      allocator.free(a.as_ptr()).unwrap();
      allocator.free(c.as_ptr()).unwrap();
    }
    assert_eq!(spans(&allocator)[..2], [(0, block), (2 * block, block)]);

    unsafe { allocator.free(b.as_ptr()).unwrap() };
    assert_eq!(spans(&allocator)[0], (0, 3 * block));
    assert_eq!(allocator.stats().free_spans, 2);
    assert_accounted(&allocator);
  }

  #[test]
  fn test_free_rejects_pointer_at_region_start() {
    let mut allocator = allocator();
    let start = allocator.region.ptr_at(0);

    let result = unsafe { allocator.free(start.as_ptr()) };

    assert!(matches!(result, Err(Error::CorruptBlock { .. })));
    assert_accounted(&allocator);
  }

  #[test]
  fn test_free_rejects_forged_oversized_header() {
    let mut allocator = allocator();
    let ptr = allocator.alloc(32, 8).unwrap().unwrap();

    let mut header: BlockHeader = allocator.region.read(0);
    header.size = allocator.region_size();
    allocator.region.write(0, header);

    let result = unsafe { allocator.free(ptr.as_ptr()) };
    assert!(matches!(result, Err(Error::CorruptBlock { .. })));
  }

  #[test]
  fn test_take_leaves_inert_allocator() {
    let mut source = allocator();
    let size = source.region_size();

    let mut target = source.take();

    assert_eq!(target.region_size(), size);
    assert_eq!(source.region_size(), 0);
    assert_eq!(source.stats(), RegionStats::default());
    assert_eq!(source.alloc(8, 8).unwrap(), None);
    assert!(target.alloc(8, 8).unwrap().is_some());
  }
}
