/// Errors returned by store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key has no live entry in the store.
    #[error("key not found")]
    NotFound,
}

/// A specialized `Result` for store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
