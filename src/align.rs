/// Rounds `value` up to the next multiple of a power of two.
///
/// With a single argument the boundary is the allocator's double word
/// (two machine words), which is the granularity of every block size and
/// payload address on the heap.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use tagalloc::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(13), 16), // 32 bit machine.
///     _ => {},
/// };
///
/// assert_eq!(align!(13, 4), 16);
/// assert_eq!(align!(4096, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align!($value, 2 * ::core::mem::size_of::<usize>())
  };
  ($value:expr, $to:expr) => {
    ($value + ($to - 1)) & !($to - 1)
  };
}

/// Number of bytes needed to move `addr` up to the next multiple of `to`.
pub(crate) const fn padding_for(
  addr: usize,
  to: usize,
) -> usize {
  (to - (addr & (to - 1))) & (to - 1)
}

#[cfg(test)]
mod tests {
  use std::mem;

  use super::padding_for;

  #[test]
  fn test_align() {
    let dsize = 2 * mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (dsize * i + 1)..=(dsize * (i + 1));

      let expected_alignment = dsize * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to() {
    assert_eq!(align!(0, 8), 0);
    assert_eq!(align!(1, 8), 8);
    assert_eq!(align!(9, 8), 16);
    assert_eq!(align!(4095, 4096), 4096);
  }

  #[test]
  fn test_padding_for() {
    assert_eq!(padding_for(0x1000, 16), 0);
    assert_eq!(padding_for(0x1001, 16), 15);
    assert_eq!(padding_for(0x1008, 16), 8);
    assert_eq!(padding_for(0x100f, 16), 1);
  }
}
