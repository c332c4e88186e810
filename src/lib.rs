//! # regionalloc - A Fixed-Region Memory Allocator
//!
//! This crate provides a **first-fit free-list allocator** that maps one block of
//! memory from the OS up front and serves every allocation from it, without
//! going back to the OS until the allocator is dropped.
//!
//! ## Overview
//!
//! ```text
//!   Region Allocator Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                       MAPPED REGION (mmap)                           │
//!   │                                                                      │
//!   │   ┌─────┬───────┬─────┬──────────┬─────┬──────────────────────┬──┐   │
//!   │   │ A1  │ free  │ A2  │   free   │ A3  │        free          │//│   │
//!   │   └─────┴───────┴─────┴──────────┴─────┴──────────────────────┴──┘   │
//!   │            │               │                 ▲                 ▲     │
//!   │            └──── next ─────┴───── next ──────┘                 │     │
//!   │                                                         bookkeeping  │
//!   │                                                          overhead    │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Free spans form a list sorted by address.
//!   Allocation: O(n) first fit.  Free: O(n) insert + coalesce.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   regionalloc
//!   ├── align      - Alignment helpers (align_to!, align_forward)
//!   ├── allocator  - RegionAllocator: alloc, free, stats
//!   ├── block      - In-band block and span headers (internal)
//!   ├── error      - Error type
//!   ├── free_list  - Address-ordered free list (internal)
//!   └── region     - mmap/munmap and offset-based access (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use regionalloc::{DEFAULT_ALIGNMENT, RegionAllocator};
//!
//! let mut allocator = RegionAllocator::new(4096)?;
//!
//! if let Some(ptr) = allocator.alloc(64, DEFAULT_ALIGNMENT)? {
//!     unsafe {
//!         ptr.as_ptr().write_bytes(0x2a, 64);
//!         allocator.free(ptr.as_ptr())?;
//!     }
//! }
//! # Ok::<(), regionalloc::Error>(())
//! ```
//!
//! ## How It Works
//!
//! Every allocation carves a block off the front of the first free span that
//! is large enough. The block carries a header, one byte recording the
//! alignment shift, and the caller's bytes:
//!
//! ```text
//!   Single Allocation:
//!   ┌──────────────────────┬───┬─────────┬──────────────────────────┬──────┐
//!   │    Block Header      │ s │ padding │        User Data         │ tail │
//!   │  ┌────────────────┐  │   │ (s - 1) │                          │      │
//!   │  │ magic: 0xDEAD… │  │   │         │  ≥ size bytes usable     │      │
//!   │  │ size: N        │  │   │         │                          │      │
//!   │  └────────────────┘  │   │         │                          │      │
//!   │      16 bytes        │ 1 │         │                          │      │
//!   └──────────────────────┴───┴─────────┴──────────────────────────┴──────┘
//!                                        ▲
//!                                        └── aligned pointer returned
//! ```
//!
//! The byte just before the returned pointer holds the alignment shift, so
//! [`RegionAllocator::free`] can walk back to the header and check its magic.
//! A freed block is turned back into a span, linked in address order and merged
//! with any neighbour it touches.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronisation; `Send` but not `Sync`
//! - **Fixed capacity**: the region never grows
//! - **Alignment**: at most [`MAX_ALIGNMENT`] bytes
//! - **Best-effort checks**: the magic check catches a plain double free, not
//!   every misuse
//! - **Unix-only**: requires `libc` and `mmap(2)`
//!
//! ## Safety
//!
//! Allocation is safe; freeing is `unsafe` because the allocator has to trust
//! that the pointer came from it and is no longer in use.

pub mod align;
mod allocator;
mod block;
mod error;
mod free_list;
mod region;

pub use allocator::{DEFAULT_ALIGNMENT, MAX_ALIGNMENT, RegionAllocator, RegionStats};
pub use block::{BLOCK_MAGIC, BOOKKEEPING_OVERHEAD, HEADER_SIZE};
pub use error::{Error, Result};
pub use free_list::FreeSpan;
pub use region::page_size;
