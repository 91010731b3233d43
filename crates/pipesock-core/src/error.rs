use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipesockError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hub is no longer running")]
    HubClosed,
}

impl PipesockError {
    /// Short error code string, reported in logs and the health payload.
    pub fn code(&self) -> &'static str {
        match self {
            PipesockError::Config(_) => "CONFIG_ERROR",
            PipesockError::Serialization(_) => "SERIALIZATION_ERROR",
            PipesockError::Io(_) => "IO_ERROR",
            PipesockError::HubClosed => "HUB_CLOSED",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipesockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_with_code() {
        let err: PipesockError = std::io::Error::other("boom").into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn config_error_message() {
        let err = PipesockError::Config("delay_ms must be > 0".into());
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(err.to_string(), "Configuration error: delay_ms must be > 0");
    }
}
