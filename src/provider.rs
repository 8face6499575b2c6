//! Sources of raw heap memory.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};
use log::{debug, warn};

use crate::{block::DSIZE, error::HeapError};

/// Supplies the contiguous region a [`Heap`](crate::Heap) lives in.
///
/// The region only ever grows at its high end. Every grant must start
/// exactly where the previous one ended.
pub trait HeapProvider {
  /// Extends the region by `delta` bytes and returns the old end, or
  /// `None` if the region cannot grow.
  fn grow(
    &mut self,
    delta: usize,
  ) -> Option<NonNull<u8>>;

  /// First byte of the region.
  fn start(&self) -> *mut u8;

  /// One past the last byte granted so far.
  fn end(&self) -> *mut u8;
}

/// Grows the process data segment with `sbrk(2)`.
///
/// The program break is shared with anything else in the process that calls
/// `sbrk`. If the break has moved since the last grant, the request fails
/// rather than handing out a region that is not contiguous with the heap.
pub struct SbrkProvider {
  start: *mut u8,
  end: *mut u8,
}

impl SbrkProvider {
  pub fn new() -> Self {
    let brk = unsafe { sbrk(0) } as *mut u8;

    Self { start: brk, end: brk }
  }
}

impl Default for SbrkProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapProvider for SbrkProvider {
  fn grow(
    &mut self,
    delta: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(delta).ok()?;

    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      warn!("sbrk({delta}) failed");
      return None;
    }

    let address = address as *mut u8;

    if address != self.end {
      warn!(
        "program break moved from {:?} to {:?} behind the heap's back",
        self.end, address
      );

      unsafe {
        if sbrk(0) as *mut u8 == address.wrapping_add(delta) {
          sbrk(-increment);
        }
      }

      return None;
    }

    self.end = address.wrapping_add(delta);

    NonNull::new(address)
  }

  fn start(&self) -> *mut u8 {
    self.start
  }

  fn end(&self) -> *mut u8 {
    self.end
  }
}

/// Fixed-capacity region reserved up front from the global allocator.
///
/// Behaves like a bounded `sbrk`: grants are carved off the front of the
/// arena and requests past its capacity fail. Each arena is independent, so
/// any number of heaps can coexist.
pub struct ArenaProvider {
  base: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  brk: usize,
}

impl ArenaProvider {
  pub fn new(capacity: usize) -> Result<Self, HeapError> {
    let layout =
      Layout::from_size_align(capacity.max(1), DSIZE).map_err(|_| HeapError::ArenaLayout { capacity })?;

    let base = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(HeapError::ArenaLayout { capacity })?;

    debug!("reserved {capacity} byte arena at {:?}", base);

    Ok(Self {
      base,
      layout,
      capacity,
      brk: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes still available for future grants.
  pub fn remaining(&self) -> usize {
    self.capacity() - self.brk
  }
}

impl HeapProvider for ArenaProvider {
  fn grow(
    &mut self,
    delta: usize,
  ) -> Option<NonNull<u8>> {
    if delta > self.remaining() {
      warn!("arena exhausted: {delta} bytes requested, {} remaining", self.remaining());
      return None;
    }

    let address = unsafe { self.base.add(self.brk) };
    self.brk += delta;

    Some(address)
  }

  fn start(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  fn end(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk)
  }
}

impl Drop for ArenaProvider {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}
