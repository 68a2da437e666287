//! In-memory pending change set for one edit session.

/// Staging buffer, drained batch, and staging errors.
pub mod buffer;

pub use buffer::{DrainedBatch, StagingBuffer, StagingError};
