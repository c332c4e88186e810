use std::ptr::NonNull;

use regionalloc::{DEFAULT_ALIGNMENT, RegionAllocator};
use tracing_subscriber::EnvFilter;

/// One byte past a page, so the region rounds up to two pages.
const REQUESTED_BYTES: usize = 4097;

fn main() -> Result<(), regionalloc::Error> {
  // Run with RUST_LOG=regionalloc=trace to watch splits and merges.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut allocator = RegionAllocator::new(REQUESTED_BYTES)?;
  println!(
    "requested {REQUESTED_BYTES} bytes, mapped {} bytes",
    allocator.region_size()
  );
  allocator.print_free_blocks();

  // --------------------------------------------------------------------
  // 1) Carve five odd-sized blocks off the front of the region.
  // --------------------------------------------------------------------
  let mut ptrs: Vec<NonNull<u8>> = Vec::new();
  for i in 0..5 {
    match allocator.alloc(101, DEFAULT_ALIGNMENT)? {
      Some(ptr) => {
        println!("ptr{i} = {ptr:?}");
        ptrs.push(ptr);
      }
      None => println!("ptr{i} = <no memory>"),
    }
  }
  allocator.print_free_blocks();

  // --------------------------------------------------------------------
  // 2) Give them back. Each free merges with its neighbours, so the list
  //    ends up as a single span again.
  // --------------------------------------------------------------------
  for ptr in ptrs {
    unsafe { allocator.free(ptr.as_ptr())? };
  }
  allocator.print_free_blocks();

  let stats = allocator.stats();
  println!(
    "free = {} bytes in {} span(s), allocated = {} bytes",
    stats.free_bytes, stats.free_spans, stats.allocated_bytes
  );

  Ok(())
}
