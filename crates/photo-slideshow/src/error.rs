use thiserror::Error;

/// Guard conditions hit by the sequencing engine.
///
/// These never cross the engine's public operations: each one is logged and
/// converted into a no-op or a safe fallback so the display keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencingError {
    /// The active list has no images to show.
    #[error("no images in the active list")]
    EmptySource,

    /// A direct-play target is not part of the active list.
    #[error("image {id} is not in the active list")]
    ImageNotFound { id: u64 },

    /// The random permutation no longer matches the active list.
    #[error("random order covers {found} images but the active list has {expected}")]
    StaleRandomState { expected: usize, found: usize },

    /// An interval that cannot drive the auto-advance timer.
    #[error("interval must be a positive, finite number of seconds (got {seconds})")]
    InvalidInterval { seconds: f64 },
}
