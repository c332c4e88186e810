use std::io;

use thiserror::Error;

/// Errors reported by a [`RegionAllocator`](crate::RegionAllocator).
///
/// Running out of space is not an error: `alloc` signals it with `Ok(None)`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
  /// A zero-byte region or allocation was requested.
  #[error("size must be a positive integer")]
  ZeroSize,

  /// The alignment is zero, not a power of two, or above
  /// [`MAX_ALIGNMENT`](crate::MAX_ALIGNMENT).
  #[error("alignment {alignment} must be a power of two no greater than {max}", max = crate::MAX_ALIGNMENT)]
  InvalidAlignment { alignment: usize },

  /// The operating system refused to map the backing region.
  #[error("unable to map a {size} byte region")]
  RegionUnavailable {
    size: usize,
    #[source]
    source: io::Error,
  },

  /// `free` was handed a null pointer.
  #[error("cannot free a null block")]
  NullPointer,

  /// `free` was handed a pointer whose block header does not check out.
  #[error("invalid block header for pointer {addr:#x}")]
  CorruptBlock { addr: usize },
}

impl Error {
  /// Returns `true` for errors caused by invalid caller arguments.
  #[must_use]
  pub fn is_configuration(&self) -> bool {
    matches!(self, Self::ZeroSize | Self::InvalidAlignment { .. })
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use static_assertions::assert_impl_all;

  use super::*;

  assert_impl_all!(Error: Send, Sync, std::error::Error);

  #[test]
  fn test_configuration_grouping() {
    assert!(Error::ZeroSize.is_configuration());
    assert!(Error::InvalidAlignment { alignment: 7 }.is_configuration());
    assert!(!Error::NullPointer.is_configuration());
    assert!(!Error::CorruptBlock { addr: 0x10 }.is_configuration());
  }

  #[test]
  fn test_region_unavailable_keeps_source() {
    let error = Error::RegionUnavailable {
      size: 4096,
      source: io::Error::from(io::ErrorKind::OutOfMemory),
    };

    assert!(std::error::Error::source(&error).is_some());
    assert_eq!(error.to_string(), "unable to map a 4096 byte region");
  }

  #[test]
  fn test_corrupt_block_message() {
    let error = Error::CorruptBlock { addr: 0xbeef };
    assert_eq!(error.to_string(), "invalid block header for pointer 0xbeef");
  }
}
