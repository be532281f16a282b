use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `start` was called while the acquisition loop is active
    #[error("receiver is already streaming, stop it first")]
    AlreadyRunning,
    #[error("failed to open transport: {0}")]
    Transport(#[from] std::io::Error),
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(std::io::Error),
    /// A previous acquisition thread died and took the sample sink with it
    #[error("no sample sink available, the previous acquisition thread was lost")]
    SinkUnavailable,
    #[error("acquisition thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
