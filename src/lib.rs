//! # tagalloc - An Explicit Free-List Heap Allocator
//!
//! This crate manages a single contiguous, growable heap region and serves
//! `allocate` / `release` / `resize` requests out of it, much like `malloc`,
//! `free` and `realloc`.
//!
//! ## Overview
//!
//! Every block carries a boundary tag (size + allocated bit) at both ends,
//! and every free block is threaded onto a doubly linked free list whose
//! links live inside the free block itself:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────┬───────┬──────────┬───────┬──────────┬──────────┐
//!   │ pad │ prologue │  A1   │   free   │  A2   │   free   │ epilogue │
//!   └─────┴──────────┴───────┴──────────┴───────┴──────────┴──────────┘
//!                                 ▲                  ▲
//!                                 │    ┌──────────┐  │
//!                   free list ────┴────┤ prev/next├──┘
//!                   (LIFO)             └──────────┘
//! ```
//!
//! - **Allocation** scans the free list first-fit, splits the chosen block
//!   when the remainder can stand on its own, and grows the heap in chunks
//!   when nothing fits.
//! - **Release** coalesces immediately with free neighbors on both sides,
//!   found in O(1) through the boundary tags.
//! - **Resize** grows in place by absorbing a free successor (extending the
//!   heap when the block sits at its end) and only copies as a last resort.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Boundary tags and block addressing (internal)
//!   ├── free_list  - Intrusive explicit free list (internal)
//!   ├── provider   - HeapProvider trait, SbrkProvider, ArenaProvider
//!   ├── config     - HeapConfig, FitStrategy
//!   ├── error      - HeapError
//!   └── heap       - Heap: allocate, release, resize, check
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::Heap;
//!
//! let mut heap = Heap::arena(1 << 20).unwrap();
//!
//! let ptr = heap.allocate(64) as *mut u64;
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     ptr.write(42);
//!
//!     let ptr = heap.resize(ptr as *mut u8, 4096) as *mut u64;
//!     assert_eq!(ptr.read(), 42);
//!
//!     heap.release(ptr as *mut u8);
//! }
//!
//! assert!(heap.check_consistency());
//! ```
//!
//! ## Heap Providers
//!
//! The heap never obtains memory on its own. A [`HeapProvider`] hands out
//! contiguous space at the high end of the region:
//!
//! - [`SbrkProvider`] moves the program break with `sbrk(2)`.
//! - [`ArenaProvider`] carves a fixed-size arena reserved up front, which
//!   allows any number of independent heaps.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **Grow only**: memory is never returned to the provider
//! - **No validation**: releasing a foreign or already released pointer is
//!   undefined behavior; [`Heap::check`] can detect the damage afterwards
//!
//! ## Safety
//!
//! `release` and `resize` take raw pointers and are `unsafe`: the pointer
//! must be a live allocation of the same heap.

#[macro_use]
pub mod align;
mod block;
mod config;
mod error;
mod free_list;
mod heap;
mod provider;

pub use block::{DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Tag, WSIZE};
pub use config::{FitStrategy, HeapConfig};
pub use error::HeapError;
pub use heap::{BlockInfo, Blocks, Heap, HeapStats, Violation};
pub use provider::{ArenaProvider, HeapProvider, SbrkProvider};
