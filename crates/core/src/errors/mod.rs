pub mod core;

pub use self::core::CoreError;

/// Result alias used throughout the container
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
