//! Error types for node construction.

use thiserror::Error;

/// Configuration errors detected while building a node.
///
/// Construction either returns a fully working node or one of these,
/// never a partially initialized node. Nothing on the per-block compute
/// path produces errors; contract violations there degrade to logged
/// no-ops instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The module's JSON description did not parse.
    #[error("failed to parse module metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The supplied arena cannot hold the computed layout.
    #[error("memory arena too small: layout needs {needed} bytes, arena holds {available}")]
    ArenaTooSmall {
        /// Bytes the computed layout requires.
        needed: u32,
        /// Bytes the supplied arena actually holds.
        available: usize,
    },

    /// A polyphonic node was configured with zero voices.
    #[error("polyphonic node requires at least one voice")]
    NoVoices,

    /// The block size was zero.
    #[error("buffer size must be non-zero")]
    ZeroBufferSize,
}
