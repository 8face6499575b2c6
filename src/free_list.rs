use crate::block::Block;

/// Explicit free list threaded through the payloads of free blocks.
///
/// Insertion is at the head (LIFO). Both ends are terminated by a null
/// link: the head has no `prev` and the tail has no `next`.
pub(crate) struct FreeList {
  head: Option<Block>,
  len: usize,
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None, len: 0 }
  }

  pub fn head(&self) -> Option<Block> {
    self.head
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Pushes `block` onto the head of the list.
  ///
  /// # Safety
  ///
  /// `block` must be a free block with room for both links that is not
  /// already on the list.
  pub unsafe fn insert(
    &mut self,
    block: Block,
  ) {
    unsafe {
      block.set_next_free(self.head);
      block.set_prev_free(None);

      if let Some(head) = self.head {
        head.set_prev_free(Some(block));
      }
    }

    self.head = Some(block);
    self.len += 1;
  }

  /// Unlinks `block` using its own stored links.
  ///
  /// # Safety
  ///
  /// `block` must currently be on this list.
  pub unsafe fn remove(
    &mut self,
    block: Block,
  ) {
    unsafe {
      let prev = block.prev_free();
      let next = block.next_free();

      match prev {
        None => self.head = next,
        Some(prev) => prev.set_next_free(next),
      }

      if let Some(next) = next {
        next.set_prev_free(prev);
      }
    }

    self.len -= 1;
  }

  /// Walks the list from the head.
  ///
  /// # Safety
  ///
  /// The links must not be mutated while the iterator is alive.
  pub unsafe fn iter(&self) -> Iter {
    Iter { current: self.head }
  }
}

pub(crate) struct Iter {
  current: Option<Block>,
}

impl Iterator for Iter {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.current?;
    self.current = unsafe { block.next_free() };
    Some(block)
  }
}
