//! The allocator instance.
//!
//! ```text
//!   begin                                                        end
//!   ┌───────┬───────────┬───────────┬────────────────────┬──────────┐
//!   │  pad  │ hdr(D:a)  │ ftr(D:a)  │ zero or more blocks │ hdr(0:a) │
//!   └───────┴───────────┴───────────┴────────────────────┴──────────┘
//!           │       prologue        │                    │ epilogue │
//! ```
//!
//! The prologue and epilogue are permanently allocated so that every real
//! block has a neighbor on both sides to inspect.

mod allocate;
mod check;
mod coalesce;
mod resize;

use std::marker::PhantomData;

use log::{debug, warn};

pub use check::Violation;

use crate::{
  align::padding_for,
  block::{Block, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Tag, WSIZE},
  config::HeapConfig,
  error::HeapError,
  free_list::FreeList,
  provider::{ArenaProvider, HeapProvider, SbrkProvider},
};

/// Explicit free-list allocator over a single growable region.
///
/// Not thread safe: every operation takes `&mut self`, and the type is
/// neither `Send` nor `Sync`.
pub struct Heap<P: HeapProvider> {
  provider: P,
  prologue: Block,
  free_list: FreeList,
  config: HeapConfig,
}

/// A block as seen by heap traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub payload: *mut u8,
  /// Total size including header and footer.
  pub size: usize,
  pub allocated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes granted by the provider, including sentinels and padding.
  pub heap_size: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl<P: HeapProvider> Heap<P> {
  /// Lays down the sentinels and makes the initial grant of
  /// `config.chunk_size` bytes.
  pub fn init(
    mut provider: P,
    config: HeapConfig,
  ) -> Result<Self, HeapError> {
    if config.chunk_size == 0 || config.chunk_size > isize::MAX as usize {
      return Err(HeapError::InvalidChunkSize(config.chunk_size));
    }

    let config = HeapConfig {
      chunk_size: align!(config.chunk_size),
      ..config
    };

    let pad = padding_for(provider.end() as usize, DSIZE);
    let bootstrap = pad + 2 * DSIZE;

    let base = provider
      .grow(bootstrap)
      .ok_or(HeapError::Exhausted { requested: bootstrap })?;

    let prologue = Block::new(unsafe { base.add(pad + DSIZE) });

    unsafe {
      prologue.payload().sub(DSIZE).cast::<usize>().write(0);
      prologue.set_tags(Tag::used(DSIZE));
      prologue.next().set_header(Tag::used(0));
    }

    let mut heap = Self {
      provider,
      prologue,
      free_list: FreeList::new(),
      config,
    };

    heap
      .extend(config.chunk_size)
      .ok_or(HeapError::Exhausted { requested: config.chunk_size })?;

    debug!(
      "heap initialized at {:?} with {} bytes ({:?})",
      heap.prologue.payload(),
      heap.provider.end() as usize - heap.prologue.addr(),
      heap.config.fit,
    );

    Ok(heap)
  }

  /// Grows the heap by at least `bytes` and returns the resulting free
  /// block, already coalesced with a free block that ended the heap.
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<Block> {
    let size = bytes.checked_add(DSIZE - 1)? & !(DSIZE - 1);
    let size = size.max(MIN_BLOCK_SIZE);

    let Some(old_end) = self.provider.grow(size) else {
      warn!("heap provider refused to grow by {size} bytes");
      return None;
    };

    debug!("heap extended by {size} bytes at {:?}", old_end);

    let block = Block::new(old_end);

    unsafe {
      block.set_tags(Tag::free(size));
      block.next().set_header(Tag::used(0));

      Some(self.coalesce(block))
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Bytes the caller may use behind `ptr`, which can exceed the size
  /// originally requested.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live allocation from this heap.
  pub unsafe fn usable_size(
    &self,
    ptr: *mut u8,
  ) -> usize {
    Block::from_payload(ptr).map_or(0, |block| unsafe { block.size() } - OVERHEAD)
  }

  /// Every real block in address order, sentinels excluded.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: unsafe { self.prologue.next() },
      _heap: PhantomData,
    }
  }

  /// Free blocks in free-list order.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    unsafe { self.free_list.iter() }.map(|block| unsafe { BlockInfo::of(block) })
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_size: self.provider.end() as usize - self.provider.start() as usize,
      ..HeapStats::default()
    };

    for block in self.blocks() {
      if block.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += block.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
        stats.largest_free = stats.largest_free.max(block.size);
      }
    }

    stats
  }
}

impl Heap<ArenaProvider> {
  /// Heap over a private arena of `capacity` bytes with default settings.
  pub fn arena(capacity: usize) -> Result<Self, HeapError> {
    Self::init(ArenaProvider::new(capacity)?, HeapConfig::default())
  }
}

impl Heap<SbrkProvider> {
  /// Heap over the process data segment with default settings.
  pub fn sbrk() -> Result<Self, HeapError> {
    Self::init(SbrkProvider::new(), HeapConfig::default())
  }
}

impl BlockInfo {
  unsafe fn of(block: Block) -> Self {
    let tag = unsafe { block.header() };

    Self {
      payload: block.payload(),
      size: tag.size,
      allocated: tag.allocated,
    }
  }
}

/// Iterator returned by [`Heap::blocks`].
pub struct Blocks<'a> {
  current: Block,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let info = unsafe { BlockInfo::of(self.current) };

    if info.size == 0 {
      return None;
    }

    self.current = unsafe { self.current.next() };

    Some(info)
  }
}

const _: () = assert!(DSIZE == 2 * WSIZE && MIN_BLOCK_SIZE % DSIZE == 0);
