use std::fmt;

/// Errors reported while setting up a heap.
///
/// Once a heap is running, exhaustion is reported as a null pointer from
/// [`Heap::allocate`](crate::Heap::allocate) and
/// [`Heap::resize`](crate::Heap::resize) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  /// The provider could not grant `requested` more bytes.
  Exhausted { requested: usize },
  /// The configured chunk size cannot grow the heap.
  InvalidChunkSize(usize),
  /// No arena of `capacity` bytes could be reserved.
  ArenaLayout { capacity: usize },
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Exhausted { requested } => write!(f, "heap provider exhausted ({requested} bytes requested)"),
      Self::InvalidChunkSize(size) => write!(f, "invalid heap chunk size {size}"),
      Self::ArenaLayout { capacity } => write!(f, "cannot reserve a {capacity} byte arena"),
    }
  }
}

impl std::error::Error for HeapError {}
