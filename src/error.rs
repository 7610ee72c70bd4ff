use thiserror::Error;

/// Errors raised while discovering roads or running the signal cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A collaborator could not be reached or returned a failure status.
    #[error("transport error: {0}")]
    Transport(String),
    /// A collaborator responded without the expected fields.
    #[error("no data: {0}")]
    NoData(String),
    /// The controller cannot start with the given parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An external shutdown was requested.
    #[error("terminated")]
    Terminated,
}

pub type Result<T> = std::result::Result<T, Error>;
