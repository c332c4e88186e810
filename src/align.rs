/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
///
/// # Examples
///
/// ```rust
/// use regionalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(17, 64), 64);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Moves `addr` forward to the next multiple of `alignment`, shrinking
/// `available` by the number of bytes skipped.
///
/// Returns `(aligned_addr, remaining)`. The caller must have reserved at least
/// `alignment - 1` bytes of slack in `available`; the allocator always does.
///
/// ```rust
/// use regionalloc::align::align_forward;
///
/// assert_eq!(align_forward(0x1011, 16, 64), (0x1020, 49));
/// ```
pub fn align_forward(
  addr: usize,
  alignment: usize,
  available: usize,
) -> (usize, usize) {
  debug_assert!(alignment.is_power_of_two());

  let aligned = align_to!(addr, alignment);
  let shift = aligned - addr;
  debug_assert!(shift <= available, "alignment slack exhausted");

  (aligned, available - shift)
}
