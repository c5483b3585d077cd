//! macrolens: expansion-to-AST alignment analysis for C macros.
//!
//! For every top-level preprocessor macro expansion in a translation unit,
//! the analyzer reconstructs the macro invocation tree from preprocessor
//! callbacks, aligns each expansion's tokens against the AST, and derives
//! the property set that answers: could this macro be an ordinary
//! function, constant, or type alias instead?
//!
//! The pipeline is `preprocess → parse → analyze`: a token-based
//! preprocessor with observer callbacks feeds an arena AST and semantic
//! tables, and the analysis layer turns both into one report record per
//! expansion.

pub mod analysis;
pub mod common;
pub mod frontend;

pub use analysis::{analyze_source, AnalysisOutput, ReportLine};
pub use common::error::{AnalysisError, Result};
pub use frontend::preprocessor::{FsLoader, VirtualLoader};
