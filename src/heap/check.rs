use std::{collections::BTreeSet, fmt};

use log::warn;

use super::Heap;
use crate::{
  block::{Block, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  provider::HeapProvider,
};

/// A broken heap invariant found by [`Heap::check`].
///
/// Addresses are payload addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
  BadPrologue { header: Tag, footer: Tag },
  BadEpilogue { addr: usize, tag: Tag },
  Misaligned { addr: usize },
  BadSize { addr: usize, size: usize },
  OutOfBounds { addr: usize, size: usize },
  TagMismatch { addr: usize, header: Tag, footer: Tag },
  /// The free block at `addr` is directly followed by another free block.
  Uncoalesced { addr: usize },
  AllocatedInFreeList { addr: usize },
  /// The free list points somewhere that is not a block of this heap.
  UnknownFreeListEntry { addr: usize },
  MissingFromFreeList { addr: usize },
  BrokenBackLink { addr: usize },
  FreeListCycle { addr: usize },
  FreeListLength { recorded: usize, actual: usize },
}

impl fmt::Display for Violation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::BadPrologue { header, footer } => write!(f, "bad prologue: header {header:?}, footer {footer:?}"),
      Self::BadEpilogue { addr, tag } => write!(f, "bad epilogue at {addr:#x}: {tag:?}"),
      Self::Misaligned { addr } => write!(f, "block {addr:#x} is not double-word aligned"),
      Self::BadSize { addr, size } => write!(f, "block {addr:#x} has invalid size {size}"),
      Self::OutOfBounds { addr, size } => write!(f, "block {addr:#x} of size {size} runs past the heap"),
      Self::TagMismatch { addr, header, footer } => {
        write!(f, "block {addr:#x}: header {header:?} does not match footer {footer:?}")
      }
      Self::Uncoalesced { addr } => write!(f, "free block {addr:#x} is followed by a free block"),
      Self::AllocatedInFreeList { addr } => write!(f, "allocated block {addr:#x} is on the free list"),
      Self::UnknownFreeListEntry { addr } => write!(f, "free list entry {addr:#x} is not a free heap block"),
      Self::MissingFromFreeList { addr } => write!(f, "free block {addr:#x} is not on the free list"),
      Self::BrokenBackLink { addr } => write!(f, "free list entry {addr:#x} has a wrong prev link"),
      Self::FreeListCycle { addr } => write!(f, "free list revisits {addr:#x}"),
      Self::FreeListLength { recorded, actual } => {
        write!(f, "free list records {recorded} entries but holds {actual}")
      }
    }
  }
}

impl<P: HeapProvider> Heap<P> {
  /// Walks the heap and the free list independently and reports every
  /// broken invariant found.
  pub fn check(&self) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    let free = unsafe { self.check_blocks(&mut violations) };
    unsafe { self.check_free_list(&free, &mut violations) };

    if violations.is_empty() { Ok(()) } else { Err(violations) }
  }

  /// Same as [`check`](Self::check), logging each violation as a warning.
  pub fn check_consistency(&self) -> bool {
    match self.check() {
      Ok(()) => true,
      Err(violations) => {
        for violation in &violations {
          warn!("heap check: {violation}");
        }
        false
      }
    }
  }

  /// Heap-order walk. Returns the addresses of free blocks seen.
  unsafe fn check_blocks(
    &self,
    violations: &mut Vec<Violation>,
  ) -> BTreeSet<usize> {
    let end = self.provider.end() as usize;
    let mut free = BTreeSet::new();

    unsafe {
      let header = self.prologue.header();
      let footer = self.prologue.footer();

      if header != Tag::used(DSIZE) || footer != header {
        violations.push(Violation::BadPrologue { header, footer });
      }

      let mut block = self.prologue.next();
      let mut previous_free = false;

      loop {
        let addr = block.addr();

        if addr > end {
          violations.push(Violation::OutOfBounds { addr, size: 0 });
          break;
        }

        let header = block.header();

        if header.size == 0 {
          if !header.allocated || addr != end {
            violations.push(Violation::BadEpilogue { addr, tag: header });
          }
          break;
        }

        if addr % DSIZE != 0 {
          violations.push(Violation::Misaligned { addr });
        }

        if addr.checked_add(header.size).is_none_or(|block_end| block_end > end) {
          violations.push(Violation::OutOfBounds { addr, size: header.size });
          break;
        }

        if header.size % DSIZE != 0 || header.size < MIN_BLOCK_SIZE {
          violations.push(Violation::BadSize { addr, size: header.size });
        }

        let footer = block.footer();
        if footer != header {
          violations.push(Violation::TagMismatch { addr, header, footer });
        }

        if !header.allocated {
          if previous_free {
            violations.push(Violation::Uncoalesced { addr: block.prev().addr() });
          }
          free.insert(addr);
        }

        previous_free = !header.allocated;
        block = block.next();
      }
    }

    free
  }

  /// Free-list walk, cross-checked against the free blocks found in the heap.
  unsafe fn check_free_list(
    &self,
    free: &BTreeSet<usize>,
    violations: &mut Vec<Violation>,
  ) {
    let start = self.prologue.addr();
    let end = self.provider.end() as usize;

    let mut seen = BTreeSet::new();
    let mut expected_prev: Option<Block> = None;
    let mut cursor = self.free_list.head();

    unsafe {
      while let Some(node) = cursor {
        let addr = node.addr();

        if !seen.insert(addr) {
          violations.push(Violation::FreeListCycle { addr });
          break;
        }

        if !free.contains(&addr) {
          let in_heap = addr > start && addr < end && addr % WSIZE == 0;

          if in_heap && node.is_allocated() {
            violations.push(Violation::AllocatedInFreeList { addr });
          } else {
            violations.push(Violation::UnknownFreeListEntry { addr });
          }
          break;
        }

        if node.prev_free() != expected_prev {
          violations.push(Violation::BrokenBackLink { addr });
        }

        expected_prev = Some(node);
        cursor = node.next_free();
      }
    }

    for &addr in free.difference(&seen) {
      violations.push(Violation::MissingFromFreeList { addr });
    }

    if seen.len() != self.free_list.len() {
      violations.push(Violation::FreeListLength {
        recorded: self.free_list.len(),
        actual: seen.len(),
      });
    }
  }
}
