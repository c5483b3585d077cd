//! Macro forest builder.
//!
//! Listens to preprocessor callbacks and reconstructs the tree of macro
//! invocations: who expanded under whom, at which depth, spelled where,
//! with which definition tokens and which argument token streams. The
//! forest is the left half of the expansion-to-AST alignment; the arena
//! AST is the right half.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::common::error::AnalysisError;
use crate::common::source::Span;
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::preprocessor::{
    ArgRecord, ExpansionBeginEvent, ExpansionId, PpCallbacks, PpToken,
};

use super::alignment::DeclStmtTypeLoc;

/// One argument of a recorded invocation.
#[derive(Debug, Clone)]
pub struct MacroExpansionArgument {
    /// Formal parameter name (`__VA_ARGS__` for the variadic tail).
    pub name: String,
    /// Token sequence spelling this argument at the call site.
    pub tokens: Vec<PpToken>,
    /// Count of substitutions of this argument into the callee body.
    pub num_expansions: usize,
    /// AST nodes whose spelling matches `tokens`; filled by the alignment
    /// matcher. Empty or of size `num_expansions`.
    pub aligned_roots: Vec<DeclStmtTypeLoc>,
}

impl MacroExpansionArgument {
    /// An argument is aligned when each of its substitutions found its node.
    pub fn is_aligned(&self) -> bool {
        self.aligned_roots.len() == self.num_expansions
    }
}

/// One node of the macro forest.
#[derive(Debug)]
pub struct MacroExpansionNode {
    pub id: ExpansionId,
    /// The name of the expanded macro.
    pub name: String,
    /// Content-addressing hash of the macro this expansion expands:
    /// the macro name plus its definition source location.
    pub macro_hash: String,
    /// Location of the macro name in its `#define` (invalid for builtins).
    pub definition_loc: Span,
    /// The source range the definition of the expanded macro spans.
    pub definition_range: Span,
    /// The tokens in the definition of the expanded macro.
    pub definition_tokens: Vec<Token>,
    pub is_object_like: bool,
    pub has_stringification: bool,
    pub has_token_pasting: bool,
    /// The range of text the developer wrote for this invocation. For
    /// nested expansions this lies inside the parent's definition.
    pub spelling_range: Span,
    /// How deeply nested this expansion is; 0 for roots.
    pub depth: u32,
    /// Index of the parent node in the forest, if any.
    pub parent: Option<usize>,
    /// Direct children, ordered by expansion time.
    pub children: Vec<usize>,
    /// The expansion occurred while an enclosing invocation was expanding
    /// one of its arguments.
    pub in_macro_arg: bool,
    /// All AST nodes whose spelling matches this expansion.
    pub ast_roots: Vec<DeclStmtTypeLoc>,
    /// Set iff `ast_roots` is a clean singleton.
    pub aligned_root: Option<DeclStmtTypeLoc>,
    pub arguments: Vec<MacroExpansionArgument>,
}

/// Builds the expansion forest from preprocessor events.
#[derive(Debug, Default)]
pub struct MacroForest {
    pub nodes: Vec<MacroExpansionNode>,
    /// Indexes of depth-0 nodes, in expansion order.
    pub roots: Vec<usize>,
    index_by_id: FxHashMap<ExpansionId, usize>,
    open_stack: Vec<usize>,
    error: Option<AnalysisError>,
}

impl MacroForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first structural error observed, if any.
    pub fn take_error(&mut self) -> Option<AnalysisError> {
        self.error.take()
    }

    pub fn node_index(&self, id: ExpansionId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    /// All transitive descendants of `idx`, by BFS over children.
    pub fn descendants(&self, idx: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.nodes[idx].children.clone();
        let mut i = 0;
        while i < out.len() {
            let cur = out[i];
            i += 1;
            out.extend(self.nodes[cur].children.iter().copied());
        }
        out
    }

    /// Check that definition tokens are contiguously recoverable: one file,
    /// non-decreasing offsets.
    fn check_definition_tokens(name: &str, tokens: &[Token]) -> Option<AnalysisError> {
        let mut prev_end = None;
        for t in tokens {
            if let Some((file, end)) = prev_end {
                if t.span.file_id != file || t.span.start < end {
                    return Some(AnalysisError::TokenGapDetected(name.to_string()));
                }
            }
            prev_end = Some((t.span.file_id, t.span.end));
        }
        None
    }

    fn span_contains(outer: Span, inner: Span) -> bool {
        outer.is_valid()
            && inner.is_valid()
            && outer.file_id == inner.file_id
            && outer.start <= inner.start
            && inner.end <= outer.end
    }
}

impl PpCallbacks for MacroForest {
    fn expansion_begin(&mut self, event: &ExpansionBeginEvent<'_>) {
        trace!(name = event.name, id = ?event.id, "expansion begin");
        if self.error.is_none() {
            if let Some(err) = Self::check_definition_tokens(event.name, &event.def.body) {
                self.error = Some(err);
            }
        }

        // The parent is the nearest open expansion whose definition range
        // spells this invocation. Argument-phase expansions are spelled at
        // the call site, not in any open definition, and so become roots.
        let parent = self
            .open_stack
            .iter()
            .rev()
            .copied()
            .find(|&i| Self::span_contains(self.nodes[i].definition_range, event.spelling_span));

        let depth = match parent {
            Some(p) => self.nodes[p].depth + 1,
            None => 0,
        };

        let idx = self.nodes.len();
        self.nodes.push(MacroExpansionNode {
            id: event.id,
            name: event.name.to_string(),
            macro_hash: String::new(),
            definition_loc: event.def.name_span,
            definition_range: event.def.definition_range,
            definition_tokens: event.def.body.clone(),
            is_object_like: !event.def.is_function_like,
            has_stringification: event
                .def
                .body
                .iter()
                .any(|t| t.kind == TokenKind::Hash),
            has_token_pasting: event
                .def
                .body
                .iter()
                .any(|t| t.kind == TokenKind::HashHash),
            spelling_range: event.spelling_span,
            depth,
            parent,
            children: Vec::new(),
            in_macro_arg: event.in_macro_arg,
            ast_roots: Vec::new(),
            aligned_root: None,
            arguments: Vec::new(),
        });

        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        self.index_by_id.insert(event.id, idx);
        self.open_stack.push(idx);
    }

    fn expansion_end(&mut self, id: ExpansionId, args: &[ArgRecord]) {
        match self.open_stack.pop() {
            Some(top) if self.nodes[top].id == id => {
                self.nodes[top].arguments = args
                    .iter()
                    .map(|a| MacroExpansionArgument {
                        name: a.name.clone(),
                        tokens: a.tokens.clone(),
                        num_expansions: a.num_expansions,
                        aligned_roots: Vec::new(),
                    })
                    .collect();
                debug!(
                    name = %self.nodes[top].name,
                    depth = self.nodes[top].depth,
                    args = args.len(),
                    "expansion recorded"
                );
            }
            other => {
                if let Some(idx) = other {
                    // Mismatched end event; put the frame back so later
                    // ends still see their begins.
                    self.open_stack.push(idx);
                }
                if self.error.is_none() {
                    let name = self
                        .index_by_id
                        .get(&id)
                        .map(|&i| self.nodes[i].name.clone())
                        .unwrap_or_else(|| format!("<expansion {}>", id.0));
                    self.error = Some(AnalysisError::ExpansionCorrupt(name));
                }
            }
        }
    }
}
