//! Error type shared across all pipeline components.
//!
//! Errors propagate through a pipeline unwrapped: whichever stage fails
//! terminates its output stream with the originating error, and downstream
//! completion handles settle with that same value.

/// Terminal error of a pipeline, sink, or partition completion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source, destination, or process channel I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An external filter process could not be launched. Surfaces on the
    /// downstream pipeline, never synchronously from `spawn`.
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid regex handed to `grep`, `sed`, or a pattern boundary.
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// `divide(0, …)` — a section size of zero never crosses a boundary.
    #[error("invalid section size: {0} (must be at least 1)")]
    SectionSize(u64),

    /// A section handler task panicked before its completion settled.
    #[error("section handler panicked: {0}")]
    Handler(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
