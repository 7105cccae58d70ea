use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("port must be between 1 and 65535")]
    InvalidPort,

    #[error("serving process failed to start: {0}")]
    SpawnFailed(String),

    #[error("serving process exited unexpectedly ({0})")]
    ProcessCrash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShareError>;
