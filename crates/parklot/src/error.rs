use thiserror::Error;

/// Slot pool construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("slot pool capacity must be greater than zero")]
    InvalidCapacity,
}

/// Why a blocking acquire ended without a slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("acquire cancelled while waiting for a slot")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capacity must be greater than zero, got {0}")]
    InvalidCapacity(usize),

    #[error("car count must be greater than zero, got {0}")]
    InvalidCarCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LauncherError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
