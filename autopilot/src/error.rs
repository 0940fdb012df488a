use thiserror::Error;

/// Failures reported by a transport while establishing or running a connection.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle misuse and wiring failures of a [`crate::ControlLoop`].
#[derive(Error, Debug)]
pub enum ControlLoopError {
    #[error("Control loop is already running")]
    AlreadyStarted,

    #[error("Control loop was never started")]
    NotStarted,

    #[error("Control loop has no simulator connection")]
    NotConnected,

    #[error("Control loop is already connected")]
    AlreadyConnected,

    #[error("Cannot swap the brain while connected")]
    Busy,

    #[error("Control loop thread panicked")]
    ThreadPanicked,

    #[error("Failed to spawn control loop thread: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
