//! Recursive-descent parser core: token access, keyword folding, and the
//! translation-unit entry point. Declaration, statement, and expression
//! grammars live in their own files.

use rustc_hash::FxHashSet;

use crate::common::error::{AnalysisError, Result};
use crate::common::source::SourceManager;
use crate::frontend::lexer::TokenKind;
use crate::frontend::preprocessor::PpToken;

use super::ast::{Ast, NodeId, NodeKind};

pub struct Parser<'a> {
    pub(super) toks: &'a [PpToken],
    /// Keywordized token kinds, parallel to `toks`. Identifiers become
    /// keywords only here, after preprocessing, so macros may share
    /// spellings with keywords.
    pub(super) kinds: Vec<TokenKind>,
    pub(super) pos: usize,
    pub(super) ast: Ast,
    pub(super) typedef_names: FxHashSet<String>,
    pub(super) block_depth: usize,
    sm: &'a SourceManager,
}

/// Parse a preprocessed token stream into an AST arena.
pub fn parse_translation_unit(toks: &[PpToken], sm: &SourceManager) -> Result<Ast> {
    let mut parser = Parser::new(toks, sm);
    while !parser.at_end() {
        let decls = parser.parse_external_decl()?;
        parser.ast.top_level.extend(decls);
    }
    parser.ast.fixup_parents();
    Ok(parser.ast)
}

impl<'a> Parser<'a> {
    fn new(toks: &'a [PpToken], sm: &'a SourceManager) -> Self {
        let kinds = toks
            .iter()
            .map(|t| match t.tok.ident() {
                Some(word) => TokenKind::from_keyword(word).unwrap_or_else(|| t.tok.kind.clone()),
                None => t.tok.kind.clone(),
            })
            .collect();
        Self {
            toks,
            kinds,
            pos: 0,
            ast: Ast::new(),
            typedef_names: FxHashSet::default(),
            block_depth: 0,
            sm,
        }
    }

    pub(super) fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    pub(super) fn kind(&self) -> &TokenKind {
        self.kinds.get(self.pos).unwrap_or(&TokenKind::Eof)
    }

    pub(super) fn kind_at(&self, n: usize) -> &TokenKind {
        self.kinds.get(self.pos + n).unwrap_or(&TokenKind::Eof)
    }

    pub(super) fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    pub(super) fn bump(&mut self) -> usize {
        let i = self.pos;
        self.pos += 1;
        i
    }

    pub(super) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<usize> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {}, got '{}'", what, self.kind().text())))
        }
    }

    pub(super) fn error(&self, message: impl Into<String>) -> AnalysisError {
        let loc = match self.toks.get(self.pos.min(self.toks.len().saturating_sub(1))) {
            Some(t) => self.sm.resolve_span(t.file_span()),
            None => self.sm.resolve_span(crate::common::source::Span::invalid()),
        };
        AnalysisError::Parse { loc, message: message.into() }
    }

    /// The current identifier text, ignoring keyword folding.
    pub(super) fn ident_text(&self) -> Option<&str> {
        match self.kind() {
            TokenKind::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Add a node covering tokens `[first, current)`.
    pub(super) fn finish(&mut self, kind: NodeKind, first_tok: usize) -> NodeId {
        let last = self.pos.saturating_sub(1).max(first_tok);
        self.ast.add(kind, first_tok as u32, last as u32)
    }

    pub(super) fn span_of(&self, tok_idx: usize) -> crate::common::source::Span {
        self.toks
            .get(tok_idx)
            .map(|t| t.tok.span)
            .unwrap_or_else(crate::common::source::Span::invalid)
    }
}
