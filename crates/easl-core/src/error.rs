//! Core error types for the EASL toolchain.

/// A specialized Result type for EASL operations.
pub type EaslResult<T> = Result<T, EaslError>;

/// Top-level error type encompassing every EASL subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EaslError {
    #[error("lex error: {message} at {line}:{column}")]
    Lex {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("parse error: {message} at {line}:{column}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("type error: {message} at {line}:{column}")]
    Type {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("codegen error: {0}")]
    CodeGen(String),

    #[error("runner error: {0}")]
    Runner(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EaslError {
    /// Create a lex error with source location.
    pub fn lex(message: impl Into<String>, line: usize, column: usize) -> Self {
        EaslError::Lex {
            message: message.into(),
            line,
            column,
        }
    }

    /// Create a parse error with source location.
    pub fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
        EaslError::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    /// Create a type error with source location.
    pub fn type_error(message: impl Into<String>, line: usize, column: usize) -> Self {
        EaslError::Type {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        EaslError::Config(message.into())
    }

    pub fn runner(message: impl Into<String>) -> Self {
        EaslError::Runner(message.into())
    }

    pub fn watch(message: impl Into<String>) -> Self {
        EaslError::Watch(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_display() {
        let err = EaslError::lex("unexpected character '§'", 3, 7);
        assert_eq!(err.to_string(), "lex error: unexpected character '§' at 3:7");
    }

    #[test]
    fn test_config_error_display() {
        let err = EaslError::config("triangle count must be positive");
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.easl");
        let err: EaslError = io.into();
        assert!(matches!(err, EaslError::Io(_)));
    }
}
