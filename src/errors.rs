/// Service-boundary error types.
/// The pricing math itself never fails: degenerate inputs price to 0.0 and
/// non-finite results are sanitized. These errors only arise around it
/// (configuration, transport, malformed edits).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
