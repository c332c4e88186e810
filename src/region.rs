//! The OS-backed byte range an allocator serves from.
//!
//! Everything else in the crate addresses the region by byte offset. Raw
//! pointers are only formed here, when translating offsets for callers and
//! when reading or writing the in-band headers.

use std::{
  io, mem,
  ptr::{self, NonNull},
};

use tracing::{debug, error, warn};

use crate::{
  block::{BlockHeader, SpanHeader},
  error::{Error, Result},
};

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the platform page size.
pub fn page_size() -> usize {
  let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

  match usize::try_from(raw) {
    Ok(size) if size > 0 => size,
    _ => {
      warn!(raw, fallback = FALLBACK_PAGE_SIZE, "sysconf(_SC_PAGESIZE) failed");
      FALLBACK_PAGE_SIZE
    }
  }
}

/// Types that can be read back from arbitrary region bytes.
///
/// # Safety
///
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`.
pub(crate) unsafe trait Plain: Copy {}

unsafe impl Plain for u8 {}
unsafe impl Plain for usize {}
unsafe impl Plain for BlockHeader {}
unsafe impl Plain for SpanHeader {}

/// One anonymous, private, read-write mapping.
///
/// An empty region has size 0, owns nothing and does nothing on drop.
#[derive(Debug)]
pub(crate) struct Region {
  base: NonNull<u8>,
  size: usize,
}

// The mapping is owned exclusively by this value.
unsafe impl Send for Region {}

impl Region {
  pub const fn empty() -> Self {
    Self {
      base: NonNull::dangling(),
      size: 0,
    }
  }

  /// Maps `requested_size` bytes rounded up to the page size.
  pub fn map(requested_size: usize) -> Result<Self> {
    if requested_size == 0 {
      return Err(Error::ZeroSize);
    }

    let size = requested_size
      .checked_next_multiple_of(page_size())
      .ok_or_else(|| Error::RegionUnavailable {
        size: requested_size,
        source: io::Error::from(io::ErrorKind::OutOfMemory),
      })?;

    let addr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == libc::MAP_FAILED {
      return Err(Error::RegionUnavailable {
        size,
        source: io::Error::last_os_error(),
      });
    }

    let base = NonNull::new(addr.cast::<u8>()).ok_or_else(|| Error::RegionUnavailable {
      size,
      source: io::Error::other("mmap returned null"),
    })?;

    debug!(requested_size, size, base = ?base, "mapped region");

    Ok(Self { base, size })
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn base_addr(&self) -> usize {
    self.base.as_ptr().addr()
  }

  /// Absolute address of `offset`.
  pub fn addr_of(
    &self,
    offset: usize,
  ) -> usize {
    self.base_addr() + offset
  }

  /// Caller-facing pointer to `offset`.
  pub fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    assert!(offset < self.size, "offset {offset} outside region of {} bytes", self.size);
    unsafe { self.base.add(offset) }
  }

  /// Translates a pointer back to an offset, or `None` if it lies outside the
  /// region.
  pub fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<usize> {
    let offset = ptr.as_ptr().addr().checked_sub(self.base_addr())?;
    (offset < self.size).then_some(offset)
  }

  pub fn read<T: Plain>(
    &self,
    offset: usize,
  ) -> T {
    let src = self.checked_ptr(offset, mem::size_of::<T>());
    unsafe { src.cast::<T>().read_unaligned() }
  }

  pub fn write<T: Plain>(
    &mut self,
    offset: usize,
    value: T,
  ) {
    let dst = self.checked_ptr(offset, mem::size_of::<T>());
    unsafe { dst.cast::<T>().write_unaligned(value) }
  }

  fn checked_ptr(
    &self,
    offset: usize,
    len: usize,
  ) -> *mut u8 {
    let in_bounds = offset.checked_add(len).is_some_and(|end| end <= self.size);
    assert!(
      in_bounds,
      "access of {len} bytes at offset {offset} outside region of {} bytes",
      self.size
    );

    unsafe { self.base.as_ptr().add(offset) }
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    if self.size == 0 {
      return;
    }

    let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.size) };
    if rc != 0 {
      error!(
        error = %io::Error::last_os_error(),
        size = self.size,
        "failed to unmap region"
      );
    } else {
      debug!(size = self.size, "unmapped region");
    }
  }
}
