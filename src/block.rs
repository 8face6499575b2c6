//! Block layout codec.
//!
//! Every block on the heap is framed by two identical boundary tags:
//!
//! ```text
//!   Allocated block:
//!   ┌──────────────┬──────────────────────────────┬──────────────┐
//!   │ header: s|1  │      payload + padding       │ footer: s|1  │
//!   └──────────────┴──────────────────────────────┴──────────────┘
//!                  ▲
//!                  └── block pointer (what the caller sees)
//!
//!   Free block:
//!   ┌──────────────┬────────┬────────┬───────────┬──────────────┐
//!   │ header: s|0  │  prev  │  next  │  unused   │ footer: s|0  │
//!   └──────────────┴────────┴────────┴───────────┴──────────────┘
//! ```
//!
//! This is the only module that touches raw heap words. The rest of the
//! engine works with [`Block`] handles and [`Tag`] values.

use std::{mem, ptr::NonNull};

/// Machine word, the width of one boundary tag.
pub const WSIZE: usize = mem::size_of::<usize>();

/// Double word: alignment unit for payloads and block sizes.
pub const DSIZE: usize = 2 * WSIZE;

/// Header plus footer.
pub const OVERHEAD: usize = 2 * WSIZE;

/// Smallest block that can hold both free-list links once released.
pub const MIN_BLOCK_SIZE: usize = OVERHEAD + 2 * WSIZE;

const ALLOCATED_BIT: usize = 0x1;
const SIZE_MASK: usize = !0x7;

const PREV_LINK: usize = 0;
const NEXT_LINK: usize = 1;

/// Decoded boundary tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub const fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  pub const fn free(size: usize) -> Self {
    Self::new(size, false)
  }

  pub const fn used(size: usize) -> Self {
    Self::new(size, true)
  }

  /// Packs the tag into the word persisted in headers and footers.
  pub const fn pack(self) -> usize {
    debug_assert!(self.size & !SIZE_MASK == 0);
    self.size | (self.allocated as usize)
  }

  pub const fn unpack(word: usize) -> Self {
    Self {
      size: word & SIZE_MASK,
      allocated: word & ALLOCATED_BIT != 0,
    }
  }
}

/// Handle to a block, addressed by its payload pointer.
///
/// A handle is only a position; all reads and writes go through the unsafe
/// accessors below and are valid only while the position lies inside a
/// live heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Block(NonNull<u8>);

impl Block {
  pub const fn new(payload: NonNull<u8>) -> Self {
    Self(payload)
  }

  pub fn from_payload(payload: *mut u8) -> Option<Self> {
    NonNull::new(payload).map(Self)
  }

  pub fn payload(self) -> *mut u8 {
    self.0.as_ptr()
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  fn header_ptr(self) -> *mut usize {
    self.0.as_ptr().wrapping_sub(WSIZE).cast()
  }

  unsafe fn footer_ptr(self) -> *mut usize {
    unsafe {
      let size = self.header().size;
      self.0.as_ptr().add(size).sub(DSIZE).cast()
    }
  }

  fn link_ptr(
    self,
    index: usize,
  ) -> *mut usize {
    self.0.as_ptr().cast::<usize>().wrapping_add(index)
  }

  pub unsafe fn header(self) -> Tag {
    unsafe { Tag::unpack(self.header_ptr().read()) }
  }

  pub unsafe fn footer(self) -> Tag {
    unsafe { Tag::unpack(self.footer_ptr().read()) }
  }

  pub unsafe fn size(self) -> usize {
    unsafe { self.header().size }
  }

  pub unsafe fn is_allocated(self) -> bool {
    unsafe { self.header().allocated }
  }

  /// Writes only the header. Used for the epilogue, which has no footer.
  pub unsafe fn set_header(
    self,
    tag: Tag,
  ) {
    unsafe { self.header_ptr().write(tag.pack()) }
  }

  /// Writes header and footer; the footer position follows from `tag.size`.
  pub unsafe fn set_tags(
    self,
    tag: Tag,
  ) {
    unsafe {
      self.set_header(tag);
      self.footer_ptr().write(tag.pack());
    }
  }

  /// Physically following block.
  pub unsafe fn next(self) -> Block {
    unsafe {
      let size = self.size();
      Block(self.0.add(size))
    }
  }

  /// Tag of the physically preceding block, read from its footer.
  pub unsafe fn prev_tag(self) -> Tag {
    unsafe { Tag::unpack(self.0.as_ptr().sub(DSIZE).cast::<usize>().read()) }
  }

  /// Physically preceding block.
  pub unsafe fn prev(self) -> Block {
    unsafe {
      let size = self.prev_tag().size;
      Block(self.0.sub(size))
    }
  }

  unsafe fn read_link(
    self,
    index: usize,
  ) -> Option<Block> {
    unsafe {
      let addr = self.link_ptr(index).read();
      Block::from_payload(self.0.as_ptr().with_addr(addr))
    }
  }

  unsafe fn write_link(
    self,
    index: usize,
    link: Option<Block>,
  ) {
    unsafe { self.link_ptr(index).write(link.map_or(0, Block::addr)) }
  }

  pub unsafe fn prev_free(self) -> Option<Block> {
    unsafe { self.read_link(PREV_LINK) }
  }

  pub unsafe fn next_free(self) -> Option<Block> {
    unsafe { self.read_link(NEXT_LINK) }
  }

  pub unsafe fn set_prev_free(
    self,
    link: Option<Block>,
  ) {
    unsafe { self.write_link(PREV_LINK, link) }
  }

  pub unsafe fn set_next_free(
    self,
    link: Option<Block>,
  ) {
    unsafe { self.write_link(NEXT_LINK, link) }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  /// Word buffer aligned to a double word, standing in for heap memory.
  #[repr(C, align(16))]
  pub(crate) struct Words<const N: usize>(pub [usize; N]);

  impl<const N: usize> Words<N> {
    pub fn new() -> Self {
      Self([0; N])
    }

    pub fn block_at(
      &mut self,
      word: usize,
    ) -> Block {
      Block::from_payload(self.0.as_mut_ptr().wrapping_add(word).cast()).unwrap()
    }
  }

  #[test]
  fn test_pack_unpack() {
    let tag = Tag::used(48);
    assert_eq!(tag.pack(), 49);
    assert_eq!(Tag::unpack(49), tag);

    let tag = Tag::free(4096);
    assert_eq!(tag.pack(), 4096);
    assert_eq!(Tag::unpack(4096), tag);

    // Bits 1 and 2 are reserved and ignored when decoding.
    assert_eq!(Tag::unpack(0b1110_0111), Tag::used(0b1110_0000));
  }

  #[test]
  fn test_header_footer_and_neighbors() {
    let mut words = Words::<32>::new();

    let words_per_block = MIN_BLOCK_SIZE / WSIZE;
    let first = words.block_at(1);
    let second = words.block_at(1 + words_per_block);

    unsafe {
      first.set_tags(Tag::used(MIN_BLOCK_SIZE));
      second.set_tags(Tag::free(2 * MIN_BLOCK_SIZE));

      assert_eq!(first.header(), first.footer());
      assert_eq!(second.header(), Tag::free(2 * MIN_BLOCK_SIZE));
      assert_eq!(second.footer(), second.header());

      assert_eq!(first.next(), second);
      assert_eq!(second.prev(), first);
      assert_eq!(second.prev_tag(), Tag::used(MIN_BLOCK_SIZE));
      assert!(first.is_allocated());
      assert!(!second.is_allocated());
      assert_eq!(second.size(), 2 * MIN_BLOCK_SIZE);
    }

    // Header and footer occupy the words around the payload.
    assert_eq!(words.0[0], MIN_BLOCK_SIZE | 1);
    assert_eq!(words.0[words_per_block - 1], MIN_BLOCK_SIZE | 1);
  }

  #[test]
  fn test_free_links() {
    let mut words = Words::<16>::new();

    let a = words.block_at(2);
    let b = words.block_at(8);

    unsafe {
      a.set_prev_free(None);
      a.set_next_free(Some(b));
      b.set_prev_free(Some(a));
      b.set_next_free(None);

      assert_eq!(a.prev_free(), None);
      assert_eq!(a.next_free(), Some(b));
      assert_eq!(b.prev_free(), Some(a));
      assert_eq!(b.next_free(), None);
    }

    assert_eq!(words.0[2], 0);
    assert_eq!(words.0[9], 0);
  }
}
