//! Error types for Turtle parsing and serialization

/// Error type for Turtle operations
#[derive(Debug, thiserror::Error)]
pub enum TurtleError {
    /// Lexer error (invalid token)
    #[error("Lexer error at position {position}: {message}")]
    Lexer { position: usize, message: String },

    /// Parser error (unexpected token or invalid structure)
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Prefix not defined by any @prefix directive
    #[error("Undefined prefix: {0}")]
    UndefinedPrefix(String),

    /// Relative IRI with no base to resolve against
    #[error("IRI resolution error: {0}")]
    IriResolution(String),

    /// Turtle construct outside the supported subset
    #[error("Unsupported Turtle construct at position {position}: {construct}")]
    Unsupported { position: usize, construct: String },
}

/// Result type for Turtle operations
pub type Result<T> = std::result::Result<T, TurtleError>;

impl TurtleError {
    /// Create a lexer error
    pub fn lexer(position: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            position,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an unsupported-construct error
    pub fn unsupported(position: usize, construct: impl Into<String>) -> Self {
        Self::Unsupported {
            position,
            construct: construct.into(),
        }
    }
}
