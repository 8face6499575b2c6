use std::ptr;

use log::{error, trace, warn};

use super::{Heap, allocate::adjust};
use crate::{
  block::{Block, MIN_BLOCK_SIZE, OVERHEAD, Tag},
  provider::HeapProvider,
};

impl<P: HeapProvider> Heap<P> {
  /// Changes the payload behind `ptr` to `size` bytes.
  ///
  /// A null `ptr` allocates and a zero `size` releases (returning null).
  /// Growth first tries to absorb the following block, extending the heap
  /// when `ptr`'s block or its free successor ends the heap. Only when that
  /// is impossible is the payload moved to a fresh block.
  ///
  /// A `size` too large to describe as a block returns null before anything
  /// is touched, so `ptr` stays live and unchanged. That is the only null
  /// return for a non-null `ptr` and non-zero `size`.
  ///
  /// # Panics
  ///
  /// Panics if the payload has to move and no block can be allocated for
  /// it. At that point the heap could not even hold a copy, and returning
  /// would leave the caller with a block of the wrong size.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live allocation from this heap. After a
  /// non-null return the old pointer must no longer be used unless it is
  /// the one returned.
  pub unsafe fn resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    let Some(block) = Block::from_payload(ptr) else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.release(ptr) };
      return ptr::null_mut();
    }

    let Some(asize) = adjust(size) else {
      warn!("resize({ptr:?}, {size}): request too large");
      return ptr::null_mut();
    };

    unsafe {
      let old = block.size();

      if asize <= old {
        self.shrink(block, asize);
        return ptr;
      }

      if self.grow_in_place(block, asize) {
        trace!("resize({ptr:?}, {size}) grew in place from {old} bytes");
        return ptr;
      }

      self.relocate(block, size)
    }
  }

  /// Splits the tail off an allocated block when it can stand as a block.
  unsafe fn shrink(
    &mut self,
    block: Block,
    asize: usize,
  ) {
    unsafe {
      let old = block.size();

      if old - asize < MIN_BLOCK_SIZE {
        return;
      }

      block.set_tags(Tag::used(asize));

      let rest = block.next();
      rest.set_tags(Tag::free(old - asize));
      self.coalesce(rest);

      trace!("shrank {:?} from {old} to {asize} bytes", block.payload());
    }
  }

  unsafe fn grow_in_place(
    &mut self,
    block: Block,
    asize: usize,
  ) -> bool {
    unsafe {
      let old = block.size();
      let next = block.next();
      let next_tag = next.header();

      if next_tag.allocated {
        // Only the epilogue can be replaced with fresh space.
        if next_tag.size != 0 || self.extend(asize - old).is_none() {
          return false;
        }
      } else if old + next_tag.size < asize {
        let last = next.next().header().size == 0;

        if !last || self.extend(asize - old - next_tag.size).is_none() {
          return false;
        }
      }

      // Either way `next` now heads a free block that covers the shortfall.
      let total = old + next.size();
      self.free_list.remove(next);

      if total - asize >= MIN_BLOCK_SIZE {
        block.set_tags(Tag::used(asize));

        let rest = block.next();
        rest.set_tags(Tag::free(total - asize));
        self.free_list.insert(rest);
      } else {
        block.set_tags(Tag::used(total));
      }

      true
    }
  }

  unsafe fn relocate(
    &mut self,
    block: Block,
    size: usize,
  ) -> *mut u8 {
    let new = self.allocate(size);

    if new.is_null() {
      error!("resize({:?}, {size}): no room to move the block", block.payload());
      panic!("resize to {size} bytes failed: heap exhausted");
    }

    unsafe {
      let copy = (block.size() - OVERHEAD).min(size);
      ptr::copy_nonoverlapping(block.payload(), new, copy);
      self.release(block.payload());
    }

    trace!("resize moved {:?} to {new:?}", block.payload());

    new
  }
}
