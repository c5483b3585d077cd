//! Expansion-to-AST alignment matcher.
//!
//! An AST node aligns with an expansion when the node was spelled exactly
//! by the expansion's definition tokens: its first token begin-matches the
//! first definition token and its last token end-matches the last one, as
//! seen from inside that expansion instance. Arguments align the same way
//! against their call-site token sequences.
//!
//! Three passes run over the arena (statements with expressions included,
//! declarations, type locations), appending every match. Only a clean
//! singleton yields an aligned root; parenthesization ties and cross-kind
//! coincidences stay ambiguous by design.

use tracing::{debug, trace};

use crate::common::source::Span;
use crate::frontend::lexer::Token;
use crate::frontend::parser::{Ast, NodeClass, NodeId};
use crate::frontend::preprocessor::{ExpansionId, PpToken};

use super::forest::MacroExpansionNode;

/// A tagged reference to one of {statement, declaration, type location};
/// exactly one variant holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclStmtTypeLoc {
    Stmt(NodeId),
    Decl(NodeId),
    TypeLoc(NodeId),
}

impl DeclStmtTypeLoc {
    pub fn node_id(self) -> NodeId {
        match self {
            DeclStmtTypeLoc::Stmt(id) | DeclStmtTypeLoc::Decl(id) | DeclStmtTypeLoc::TypeLoc(id) => {
                id
            }
        }
    }

    /// The statement slot, when set. Expressions are statements here, as in
    /// the underlying AST model.
    pub fn stmt(self) -> Option<NodeId> {
        match self {
            DeclStmtTypeLoc::Stmt(id) => Some(id),
            _ => None,
        }
    }
}

/// Find all AST nodes aligned with `exp` and with each of its arguments.
/// Fills `ast_roots`, `aligned_root`, and per-argument `aligned_roots`.
pub fn find_aligned_ast_nodes_for_expansion(
    exp: &mut MacroExpansionNode,
    ast: &Ast,
    toks: &[PpToken],
) {
    debug!(name = %exp.name, "aligning expansion");
    exp.ast_roots = collect_aligned(ast, toks, exp.id, &SpelledTokens::Definition(&exp.definition_tokens));
    exp.aligned_root = match exp.ast_roots.as_slice() {
        [single] => Some(*single),
        _ => None,
    };
    trace!(name = %exp.name, roots = exp.ast_roots.len(), "alignment roots");

    for arg in &mut exp.arguments {
        arg.aligned_roots =
            collect_aligned(ast, toks, exp.id, &SpelledTokens::Argument(&arg.tokens));
    }
}

/// The token sequence a node is matched against: a macro's definition
/// tokens (spelled in the defining file) or an argument's call-site tokens.
enum SpelledTokens<'a> {
    Definition(&'a [Token]),
    Argument(&'a [PpToken]),
}

impl SpelledTokens<'_> {
    fn first_span(&self) -> Option<Span> {
        match self {
            SpelledTokens::Definition(toks) => toks.first().map(|t| t.span),
            SpelledTokens::Argument(toks) => toks.first().map(|t| t.tok.span),
        }
    }

    fn last_span(&self) -> Option<Span> {
        match self {
            SpelledTokens::Definition(toks) => toks.last().map(|t| t.span),
            SpelledTokens::Argument(toks) => toks.last().map(|t| t.tok.span),
        }
    }
}

fn collect_aligned(
    ast: &Ast,
    toks: &[PpToken],
    exp: ExpansionId,
    spelled: &SpelledTokens<'_>,
) -> Vec<DeclStmtTypeLoc> {
    let mut out = Vec::new();
    // An expansion with no tokens (an empty replacement list) aligns with
    // nothing.
    let (Some(first_span), Some(last_span)) = (spelled.first_span(), spelled.last_span()) else {
        return out;
    };

    for class in [NodeClass::Stmt, NodeClass::Decl, NodeClass::TypeLoc] {
        for id in ast.ids() {
            let node = ast.node(id);
            let node_class = node.kind.class();
            let in_pass = match class {
                // The statements pass covers expressions as well.
                NodeClass::Stmt => matches!(node_class, NodeClass::Stmt | NodeClass::Expr),
                other => node_class == other,
            };
            if !in_pass {
                continue;
            }
            if is_spelled_from(node.first_tok, node.last_tok, toks, exp, first_span, last_span) {
                out.push(match class {
                    NodeClass::Stmt => DeclStmtTypeLoc::Stmt(id),
                    NodeClass::Decl => DeclStmtTypeLoc::Decl(id),
                    _ => DeclStmtTypeLoc::TypeLoc(id),
                });
            }
        }
    }
    out
}

/// Whether the node covering stream tokens `[first_tok, last_tok]` was
/// spelled exactly by a token sequence running from `first_span` to
/// `last_span`, as seen from inside expansion `exp`.
fn is_spelled_from(
    first_tok: u32,
    last_tok: u32,
    toks: &[PpToken],
    exp: ExpansionId,
    first_span: Span,
    last_span: Span,
) -> bool {
    let (Some(first), Some(last)) = (toks.get(first_tok as usize), toks.get(last_tok as usize))
    else {
        return false;
    };
    let (Some(begin), Some(end)) = (first.spelling_within(exp), last.spelling_within(exp)) else {
        return false;
    };
    begin.file_id == first_span.file_id
        && begin.start == first_span.start
        && end.file_id == last_span.file_id
        && end.end == last_span.end
}
