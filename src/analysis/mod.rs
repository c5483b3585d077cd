pub mod alignment;
pub mod analyzer;
pub mod collectors;
pub mod forest;
pub mod include_check;
pub mod index;
pub mod properties;
pub mod report;

pub use analyzer::{analyze_source, AnalysisOutput};
pub use forest::{MacroExpansionArgument, MacroExpansionNode, MacroForest};
pub use report::{InvocationRecord, ReportLine};
