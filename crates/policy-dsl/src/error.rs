//! Errors produced while loading, parsing, or compiling policy files.

use thiserror::Error;

/// Result alias for DSL operations.
pub type DslResult<T> = Result<T, DslError>;

/// Errors from the policy language pipeline. Lex and parse errors carry the
/// 1-based source position.
#[derive(Debug, Error)]
pub enum DslError {
    /// The lexer rejected the input.
    #[error("lexer error at {line}:{col}: {message}")]
    Lex {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        col: usize,
        /// What went wrong.
        message: String,
    },

    /// The parser rejected the token stream.
    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        col: usize,
        /// What went wrong.
        message: String,
    },

    /// The compiler rejected a structurally valid file.
    #[error("compile error: {0}")]
    Compile(String),

    /// Filesystem failure while loading.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl DslError {
    /// Stable sentinel kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "lexer_error",
            Self::Parse { .. } => "parse_error",
            Self::Compile(_) => "compile_error",
            Self::Io(_) => "io_error",
        }
    }
}
