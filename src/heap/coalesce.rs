use log::trace;

use super::Heap;
use crate::{
  block::{Block, Tag},
  provider::HeapProvider,
};

impl<P: HeapProvider> Heap<P> {
  /// Returns the block behind `ptr` to the heap. A null `ptr` is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live allocation returned by
  /// [`allocate`](Self::allocate) or [`resize`](Self::resize) on this heap.
  pub unsafe fn release(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(block) = Block::from_payload(ptr) else {
      return;
    };

    unsafe {
      let size = block.size();

      trace!("release({ptr:?}) ({size} byte block)");

      block.set_tags(Tag::free(size));
      self.coalesce(block);
    }
  }

  /// Merges the free `block` with free physical neighbors and puts the
  /// result on the free list.
  ///
  /// `block` must carry free tags and must not be on the free list yet.
  pub(super) unsafe fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    unsafe {
      let prev_allocated = block.prev_tag().allocated;
      let next = block.next();
      let next_allocated = next.is_allocated();

      let mut size = block.size();

      let merged = match (prev_allocated, next_allocated) {
        (true, true) => block,
        (true, false) => {
          self.free_list.remove(next);
          size += next.size();
          block
        }
        (false, true) => {
          let prev = block.prev();
          self.free_list.remove(prev);
          size += prev.size();
          prev
        }
        (false, false) => {
          let prev = block.prev();
          self.free_list.remove(prev);
          self.free_list.remove(next);
          size += prev.size() + next.size();
          prev
        }
      };

      if merged != block || size != block.size() {
        trace!("coalesced {:?} into {size} byte block at {:?}", block.payload(), merged.payload());
      }

      merged.set_tags(Tag::free(size));
      self.free_list.insert(merged);

      merged
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    block::{MIN_BLOCK_SIZE, OVERHEAD},
    heap::{BlockInfo, allocate::adjust},
    provider::ArenaProvider,
  };

  fn arena_heap() -> Heap<ArenaProvider> {
    let _ = env_logger::try_init();
    Heap::arena(1 << 16).unwrap()
  }

  fn shape(heap: &Heap<ArenaProvider>) -> Vec<(usize, bool)> {
    heap
      .blocks()
      .map(|BlockInfo { size, allocated, .. }| (size, allocated))
      .collect()
  }

  /// Four adjacent `BLOCK` byte blocks followed by the rest of the chunk.
  fn four_blocks(heap: &mut Heap<ArenaProvider>) -> [*mut u8; 4] {
    [heap.allocate(32), heap.allocate(32), heap.allocate(32), heap.allocate(32)]
  }

  const BLOCK: usize = align!(32 + OVERHEAD);

  #[test]
  fn test_no_merge() {
    let mut heap = arena_heap();
    let [_a, b, _c, _d] = four_blocks(&mut heap);
    let rest = 4096 - 4 * BLOCK;

    unsafe { heap.release(b) };

    assert_eq!(shape(&heap), vec![(BLOCK, true), (BLOCK, false), (BLOCK, true), (BLOCK, true), (rest, false)]);
    assert_eq!(heap.free_list.head().map(Block::payload), Some(b));
    assert!(heap.check_consistency());
  }

  #[test]
  fn test_merge_with_next() {
    let mut heap = arena_heap();
    let [_a, b, c, _d] = four_blocks(&mut heap);
    let rest = 4096 - 4 * BLOCK;

    unsafe {
      heap.release(c);
      heap.release(b);
    }

    assert_eq!(shape(&heap), vec![(BLOCK, true), (2 * BLOCK, false), (BLOCK, true), (rest, false)]);
    assert_eq!(heap.free_list.head().map(Block::payload), Some(b));
    assert_eq!(heap.free_list.len(), 2);
    assert!(heap.check_consistency());
  }

  #[test]
  fn test_merge_with_prev() {
    let mut heap = arena_heap();
    let [_a, b, c, _d] = four_blocks(&mut heap);
    let rest = 4096 - 4 * BLOCK;

    unsafe {
      heap.release(b);
      heap.release(c);
    }

    assert_eq!(shape(&heap), vec![(BLOCK, true), (2 * BLOCK, false), (BLOCK, true), (rest, false)]);
    assert_eq!(heap.free_list.head().map(Block::payload), Some(b));
    assert!(heap.check_consistency());
  }

  #[test]
  fn test_merge_both_sides() {
    let mut heap = arena_heap();
    let [a, b, c, _d] = four_blocks(&mut heap);
    let rest = 4096 - 4 * BLOCK;

    unsafe {
      heap.release(a);
      heap.release(c);
      heap.release(b);
    }

    assert_eq!(shape(&heap), vec![(3 * BLOCK, false), (BLOCK, true), (rest, false)]);
    assert_eq!(heap.free_list.len(), 2);
    assert_eq!(heap.free_list.head().map(Block::payload), Some(a));
    assert!(heap.check_consistency());
  }

  #[test]
  fn test_release_everything_restores_single_block() {
    let mut heap = arena_heap();
    let blocks = four_blocks(&mut heap);

    for p in [blocks[2], blocks[0], blocks[3], blocks[1]] {
      unsafe { heap.release(p) };
      assert!(heap.check_consistency());
    }

    assert_eq!(shape(&heap), vec![(4096, false)]);
    assert_eq!(heap.free_list.len(), 1);
  }

  #[test]
  fn test_release_null_is_noop() {
    let mut heap = arena_heap();

    unsafe { heap.release(std::ptr::null_mut()) };

    assert_eq!(shape(&heap), vec![(4096, false)]);
  }

  #[test]
  fn test_block_size_assumption() {
    assert_eq!(adjust(32), Some(BLOCK));
    assert!(BLOCK >= MIN_BLOCK_SIZE);
  }
}
