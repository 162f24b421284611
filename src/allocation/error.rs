use thiserror::Error;

/// Engine failures. The engine either returns a full result or one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// Administrative settings are malformed. Carries every problem found.
    #[error("invalid allocation config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// The completion event itself is malformed.
    #[error("invalid allocation request: {0}")]
    InvalidRequest(String),
}

impl AllocationError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        AllocationError::InvalidConfig(vec![message.into()])
    }
}
