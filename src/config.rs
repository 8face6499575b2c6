/// How the allocator picks a free block for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStrategy {
  /// First block in free-list order that is large enough.
  #[default]
  FirstFit,
  /// Smallest block that is large enough; stops early on an exact fit.
  BestFit,
}

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the provider when no free block
  /// fits. Also the size of the initial grant made by `init`.
  pub chunk_size: usize,
  pub fit: FitStrategy,
}

impl HeapConfig {
  pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

  pub const fn new() -> Self {
    Self {
      chunk_size: Self::DEFAULT_CHUNK_SIZE,
      fit: FitStrategy::FirstFit,
    }
  }

  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub const fn with_fit(
    mut self,
    fit: FitStrategy,
  ) -> Self {
    self.fit = fit;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = HeapConfig::default();
    assert_eq!(config.chunk_size, 4096);
    assert_eq!(config.fit, FitStrategy::FirstFit);
  }

  #[test]
  fn test_builder() {
    let config = HeapConfig::new().with_chunk_size(256).with_fit(FitStrategy::BestFit);
    assert_eq!(config.chunk_size, 256);
    assert_eq!(config.fit, FitStrategy::BestFit);
  }
}
