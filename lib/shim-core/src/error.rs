use shim_backend_traits::BackendError;

/// Legacy-ABI-compatible error kinds.
///
/// Each variant is one of the three legacy error kinds that must stay
/// distinguishable at the ABI boundary: invalid argument, out of memory,
/// backend failure. Internal helpers that aren't reachable from the ABI use
/// `anyhow::Result` instead and get folded into `Backend` at the point they
/// cross into a façade method.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("out of memory")]
    OutOfMemory,
    #[error("backend failure: {0}")]
    Backend(String),
}

impl ShimError {
    /// Legacy numeric error code, matching the convention that every
    /// surfaced error is a distinguishable code rather than an exception.
    pub fn code(&self) -> i32 {
        match self {
            ShimError::InvalidArgument(_) => -1,
            ShimError::OutOfMemory => -2,
            ShimError::Backend(_) => -3,
        }
    }
}

impl From<BackendError> for ShimError {
    fn from(value: BackendError) -> Self {
        ShimError::Backend(value.to_string())
    }
}

impl From<anyhow::Error> for ShimError {
    fn from(value: anyhow::Error) -> Self {
        ShimError::Backend(value.to_string())
    }
}

pub type ShimResult<T> = Result<T, ShimError>;
