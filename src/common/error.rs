//! Error types for the analysis pipeline.

use thiserror::Error;

use crate::common::source::SourceLocation;

/// Analysis error type.
///
/// None of these abort a whole run from within the analysis: the forest
/// builder surfaces `ExpansionCorrupt`/`TokenGapDetected` to the caller, and
/// frontend errors carry the location the frontend stopped at.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A macro-expansion end event arrived without a matching begin event.
    #[error("expansion end without matching begin for macro '{0}'")]
    ExpansionCorrupt(String),

    /// The spelled tokens of a macro definition could not be contiguously
    /// recovered from the source (spans out of order or crossing files).
    #[error("token gap detected in definition of macro '{0}'")]
    TokenGapDetected(String),

    #[error("{loc}: lex error: {message}")]
    Lex { loc: SourceLocation, message: String },

    #[error("{loc}: parse error: {message}")]
    Parse { loc: SourceLocation, message: String },

    #[error("{loc}: preprocessor error: {message}")]
    Preprocess { loc: SourceLocation, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the analysis pipeline.
pub type Result<T> = std::result::Result<T, AnalysisError>;
