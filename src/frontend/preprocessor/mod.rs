pub mod expr_eval;
pub mod includes;
pub mod macro_defs;
pub mod preprocessor;

pub use includes::{FileLoader, FsLoader, LoadedFile, VirtualLoader};
pub use macro_defs::{parse_define, MacroDef, MacroTable};
pub use preprocessor::{
    ArgRecord, ExpCtx, ExpansionBeginEvent, ExpansionId, PpCallbacks, PpToken, Preprocessor,
};
