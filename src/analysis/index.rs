//! AST auxiliary index: node sets consulted repeatedly by the property
//! evaluator, computed in one pass over the arena once the translation
//! unit is complete.

use rustc_hash::FxHashSet;

use crate::common::source::{SourceManager, Span};
use crate::common::types::{CType, TypeDeclTable};
use crate::frontend::parser::ast::{BinOp, NodeKind, UnaryOp};
use crate::frontend::parser::{Ast, NodeId};
use crate::frontend::preprocessor::PpToken;
use crate::frontend::sema::Sema;

/// Precomputed node sets for property derivation.
#[derive(Debug, Default)]
pub struct AuxiliaryIndex {
    /// Every expression that references a declaration.
    pub all_decl_refs: FxHashSet<NodeId>,
    /// Subset whose referenced declaration has function-local storage.
    pub local_decl_refs: FxHashSet<NodeId>,
    /// Assignments and pre/post increment/decrement.
    pub side_effect_exprs: FxHashSet<NodeId>,
    /// The modified sub-expression of each side-effect expression.
    pub side_effect_lhss: FxHashSet<NodeId>,
    /// Unary `&` expressions.
    pub addr_of_exprs: FxHashSet<NodeId>,
    /// Branches of `?:` and operands of `&&` / `||`.
    pub short_circuit_operands: FxHashSet<NodeId>,
    /// Expressions whose type resolves to a locally-defined tag.
    pub local_type_exprs: FxHashSet<NodeId>,
    /// File-level ranges of every declaration, extended to the next token
    /// to swallow a trailing `;`.
    pub decl_ranges: Vec<(NodeId, Span)>,
}

impl AuxiliaryIndex {
    pub fn build(ast: &Ast, toks: &[PpToken], sema: &Sema) -> Self {
        let mut index = AuxiliaryIndex::default();

        for id in ast.ids() {
            match &ast.node(id).kind {
                NodeKind::DeclRef(_) => {
                    index.all_decl_refs.insert(id);
                    if let Some(decl) = sema.resolved_refs.get(&id) {
                        if has_local_storage(ast, *decl) {
                            index.local_decl_refs.insert(id);
                        }
                    }
                }
                NodeKind::Assign(lhs, _) | NodeKind::CompoundAssign(_, lhs, _) => {
                    index.side_effect_exprs.insert(id);
                    index.side_effect_lhss.insert(*lhs);
                }
                NodeKind::UnaryOp(UnaryOp::PreInc | UnaryOp::PreDec, operand) => {
                    index.side_effect_exprs.insert(id);
                    index.side_effect_lhss.insert(*operand);
                }
                NodeKind::PostfixOp(_, operand) => {
                    index.side_effect_exprs.insert(id);
                    index.side_effect_lhss.insert(*operand);
                }
                NodeKind::AddressOf(_) => {
                    index.addr_of_exprs.insert(id);
                }
                NodeKind::Conditional(_, then, other) => {
                    index.short_circuit_operands.insert(*then);
                    index.short_circuit_operands.insert(*other);
                }
                NodeKind::BinaryOp(op, lhs, rhs)
                    if matches!(op, BinOp::LogicalAnd | BinOp::LogicalOr) =>
                {
                    index.short_circuit_operands.insert(*lhs);
                    index.short_circuit_operands.insert(*rhs);
                }
                _ => {}
            }

            let node = ast.node(id);
            if node.kind.is_expr() {
                if let Some(ty) = sema.expr_types.get(&id) {
                    if has_local_type(ty, &sema.type_decls) {
                        index.local_type_exprs.insert(id);
                    }
                }
            }

            if node.kind.is_decl() {
                if let Some(range) = decl_file_range(ast, toks, id) {
                    index.decl_ranges.push((id, range));
                }
            }
        }

        index
    }
}

/// Whether a declaration has function-local storage: parameters and
/// block-scope variables that are neither static nor extern.
pub fn has_local_storage(ast: &Ast, decl: NodeId) -> bool {
    match &ast.node(decl).kind {
        NodeKind::ParamDecl(_) => true,
        NodeKind::VarDecl(d) => d.is_local && !d.is_static && !d.is_extern,
        _ => false,
    }
}

/// File-level range of a declaration, extended past its last token to the
/// end of the following token so a trailing `;` is swallowed.
fn decl_file_range(ast: &Ast, toks: &[PpToken], id: NodeId) -> Option<Span> {
    let node = ast.node(id);
    let first = toks.get(node.first_tok as usize)?;
    let last = toks.get(node.last_tok as usize)?;
    let mut range = first.file_span().merge(last.file_span());
    if let Some(next) = toks.get(node.last_tok as usize + 1) {
        let next_span = next.file_span();
        if next_span.file_id == range.file_id {
            range.end = range.end.max(next_span.end);
        }
    }
    Some(range)
}

// ---- type descent ---------------------------------------------------------

/// Type descent rule: peel pointer and array layers, then inspect the tag
/// or typedef declaration underneath. A layer with no known declaration
/// fails every predicate.
fn peeled_decl_info<'a>(
    ty: &CType,
    decls: &'a TypeDeclTable,
) -> Option<&'a crate::common::types::TypeDeclInfo> {
    ty.peeled().type_decl().map(|id| decls.get(id))
}

/// True if the type resolves to a tag declared outside the translation
/// unit's file scope.
pub fn has_local_type(ty: &CType, decls: &TypeDeclTable) -> bool {
    peeled_decl_info(ty, decls).is_some_and(|info| info.is_local)
}

/// True if the type resolves to a tag whose named declaration has an empty
/// name.
pub fn has_anonymous_type(ty: &CType, decls: &TypeDeclTable) -> bool {
    peeled_decl_info(ty, decls).is_some_and(|info| info.name.is_none())
}

/// True if the type resolves to a declaration spelled strictly after `loc`
/// in translation-unit order.
pub fn has_type_defined_after(
    ty: &CType,
    decls: &TypeDeclTable,
    sm: &SourceManager,
    loc: Span,
) -> bool {
    peeled_decl_info(ty, decls)
        .is_some_and(|info| info.name_loc.is_valid() && sm.is_before_in_tu(loc, info.name_loc))
}
