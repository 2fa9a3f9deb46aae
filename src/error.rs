use thiserror::Error;

/// Error taxonomy of the engine. Every interpreter primitive either
/// returns a value or one of these; the binary turns them into a single
/// diagnostic line.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("grammar error: {0}")]
    Grammar(String),

    #[error("domain error: {0}")]
    Domain(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
