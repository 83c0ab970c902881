//! Interfaces of experience and replay buffers.
use anyhow::Result;

/// Interface for buffers into which experiences from environments are written.
pub trait ExperienceBufferBase {
    /// Items pushed into the buffer.
    type Item;

    /// Pushes a slab of experiences into the buffer.
    ///
    /// Returns the absolute time indices that were written, in write order.
    fn push(&mut self, tr: Self::Item) -> Result<Vec<usize>>;

    /// The number of transitions currently stored.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer stores no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// Batches generated for training.
    type Batch;

    /// Builds the buffer from its configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of the given size from the currently valid indices.
    ///
    /// Fails if the buffer has not yet accumulated enough rows for any index
    /// to lie outside the exclusion zones. Callers are expected to gate
    /// training behind a warm-up threshold rather than rely on this error.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;
}
