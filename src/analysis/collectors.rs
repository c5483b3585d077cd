//! Auxiliary preprocessor observers: macro definition information and
//! include-directive collection. Registered alongside the macro forest,
//! the way the original consumer stacks several callback objects on one
//! preprocessor.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::source::Span;
use crate::frontend::preprocessor::{MacroDef, PpCallbacks};

/// Records macro definitions and the macro names the preprocessor itself
/// inspected in conditionals.
///
/// Sorted containers make report output deterministic across runs.
#[derive(Debug, Default)]
pub struct DefinitionInfoCollector {
    /// Macro name -> location of its most recent definition's name token.
    pub macro_names_definitions: BTreeMap<String, Span>,
    /// Names inspected by `#ifdef`, `#ifndef`, or `defined(...)`.
    pub inspected_macro_names: BTreeSet<String>,
}

impl DefinitionInfoCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PpCallbacks for DefinitionInfoCollector {
    fn macro_defined(&mut self, name: &str, def: &MacroDef) {
        self.macro_names_definitions.insert(name.to_string(), def.name_span);
    }

    fn macro_name_inspected(&mut self, name: &str) {
        self.inspected_macro_names.insert(name.to_string());
    }
}

/// Records one entry per `#include` directive, in directive order:
/// the resolved file (when resolution succeeded) and the location of the
/// `#` that introduced it.
#[derive(Debug, Default)]
pub struct IncludeCollector {
    pub include_entries_locs: Vec<(Option<u32>, Span)>,
}

impl IncludeCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PpCallbacks for IncludeCollector {
    fn include_directive(&mut self, hash_span: Span, file_id: Option<u32>) {
        self.include_entries_locs.push((file_id, hash_span));
    }
}
