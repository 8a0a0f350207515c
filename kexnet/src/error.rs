use kextrust::KexError;
use thiserror::Error;

/// Errors raised while configuring or starting a KexNet process.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("invalid assignment {0:?}: expected ID=VALUE")]
    InvalidAssignment(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Kex(#[from] KexError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetError>;
