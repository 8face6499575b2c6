use std::ptr;

use log::{trace, warn};

use super::Heap;
use crate::{
  block::{Block, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Tag},
  config::FitStrategy,
  provider::HeapProvider,
};

/// Block size needed to serve a `size` byte request, or `None` if the
/// request cannot be represented.
pub(super) fn adjust(size: usize) -> Option<usize> {
  if size <= DSIZE {
    return Some(MIN_BLOCK_SIZE);
  }

  let padded = size.checked_add(OVERHEAD)?.checked_add(DSIZE - 1)?;

  Some(padded & !(DSIZE - 1))
}

impl<P: HeapProvider> Heap<P> {
  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// Returns null for a zero-sized request or when the provider cannot
  /// supply more memory. The payload is aligned to two machine words and
  /// its contents are unspecified.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let Some(asize) = adjust(size) else {
      warn!("allocate({size}): request too large");
      return ptr::null_mut();
    };

    let block = match self.find_fit(asize) {
      Some(block) => block,
      None => {
        let Some(block) = self.extend(asize.max(self.config.chunk_size)) else {
          warn!("allocate({size}): out of memory");
          return ptr::null_mut();
        };
        block
      }
    };

    unsafe { self.place(block, asize) };

    trace!("allocate({size}) -> {:?} ({asize} byte block)", block.payload());

    block.payload()
  }

  pub(super) fn find_fit(
    &self,
    asize: usize,
  ) -> Option<Block> {
    let mut candidates = unsafe { self.free_list.iter() }.map(|block| (block, unsafe { block.size() }));

    match self.config.fit {
      FitStrategy::FirstFit => candidates.find(|&(_, size)| size >= asize).map(|(block, _)| block),
      FitStrategy::BestFit => {
        let mut best: Option<(Block, usize)> = None;

        for (block, size) in candidates {
          if size == asize {
            return Some(block);
          }

          if size > asize && best.is_none_or(|(_, best_size)| size < best_size) {
            best = Some((block, size));
          }
        }

        best.map(|(block, _)| block)
      }
    }
  }

  /// Marks `asize` bytes at the start of the free `block` allocated,
  /// returning the remainder to the free list when it can stand as a block.
  pub(super) unsafe fn place(
    &mut self,
    block: Block,
    asize: usize,
  ) {
    unsafe {
      let csize = block.size();

      self.free_list.remove(block);

      if csize - asize >= MIN_BLOCK_SIZE {
        block.set_tags(Tag::used(asize));

        let rest = block.next();
        rest.set_tags(Tag::free(csize - asize));
        self.free_list.insert(rest);

        trace!("split {csize} byte block at {:?}", block.payload());
      } else {
        block.set_tags(Tag::used(csize));
      }
    }
  }
}
