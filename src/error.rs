use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Failed to read file: {0}")]
    Read(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Certificate rendering failed: {0}")]
    Certificate(String),

    #[error("A file is already being processed")]
    Busy,

    #[error("Cannot {action} while in {from} state")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("No file selected")]
    NoFileSelected,

    #[error("Hashing cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProofError {
    fn from(e: reqwest::Error) -> Self {
        ProofError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProofError>;
