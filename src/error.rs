//! Crate-wide error type.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhysicsError>;

/// Errors the adaptive core can surface to its caller.
///
/// Hot paths (the pre/post/lookup hooks in [`crate::hooks`]) never return
/// this type: per spec they set an internal error flag and continue. This
/// type is reserved for initialization, the metrics exporter, and the CLI.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// The host allocator or host mutex could not be initialized.
    #[error("host services failed to initialize: {0}")]
    HostInit(String),

    /// A capsule (content-addressed init image) failed to load.
    #[error("capsule load failed: {0}")]
    CapsuleLoad(String),

    /// I/O failure, generally from the CSV metrics exporter or config load.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV row failed to serialize or write.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The dictionary is at capacity; no more word IDs are available.
    #[error("dictionary is full (capacity {0})")]
    DictionaryFull(usize),

    /// An operation was attempted on a VM already marked errored.
    #[error("VM is in an errored state: {0}")]
    VmErrored(String),
}
