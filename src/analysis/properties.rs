//! Property evaluator: derives the full per-expansion property set from the
//! aligned AST, the auxiliary index, and the macro forest.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::common::source::SourceManager;
use crate::frontend::parser::ast::{DerivedDeclarator, NodeKind};
use crate::frontend::parser::{Ast, NodeId};
use crate::frontend::preprocessor::PpToken;
use crate::frontend::sema::{const_eval, Sema};

use super::forest::MacroForest;
use super::index::{has_anonymous_type, has_local_type, has_type_defined_after, AuxiliaryIndex};
use super::report::InvocationRecord;

/// Borrowed state shared by every property evaluation in one translation
/// unit.
pub struct EvalContext<'a> {
    pub ast: &'a Ast,
    pub toks: &'a [PpToken],
    pub sema: &'a Sema,
    pub sm: &'a SourceManager,
    pub index: &'a AuxiliaryIndex,
    /// Macro names inspected by conditional directives.
    pub inspected: &'a BTreeSet<String>,
}

/// The logical expression of a node: unwrap parenthesized expressions.
/// Applied at every equality comparison against an AST node.
fn logical_expr(ast: &Ast, mut id: NodeId) -> NodeId {
    while let NodeKind::Paren(inner) = &ast.node(id).kind {
        id = *inner;
    }
    id
}

/// The modified sub-expression of a side-effect expression.
fn side_effect_lhs(ast: &Ast, id: NodeId) -> Option<NodeId> {
    match &ast.node(id).kind {
        NodeKind::Assign(lhs, _) | NodeKind::CompoundAssign(_, lhs, _) => Some(*lhs),
        NodeKind::UnaryOp(_, operand) | NodeKind::PostfixOp(_, operand) => Some(*operand),
        _ => None,
    }
}

/// Whether an ancestor of `id` requires an integral constant expression:
/// a case label, an enumerator initializer, a bit-field width, or an array
/// size in a variable declaration.
fn is_descendant_of_node_requiring_ice(ast: &Ast, id: NodeId) -> bool {
    let mut cur = ast.node(id).parent;
    while let Some(p) = cur {
        match &ast.node(p).kind {
            NodeKind::Case(..) | NodeKind::EnumConstantDecl(_) | NodeKind::EnumDecl(_) => {
                return true;
            }
            NodeKind::FieldDecl(d) if d.bit_width.is_some() => return true,
            NodeKind::VarDecl(d)
                if d.derived.iter().any(|x| matches!(x, DerivedDeclarator::Array(_))) =>
            {
                return true;
            }
            _ => {}
        }
        cur = ast.node(p).parent;
    }
    false
}

/// Evaluate the full property set for the top-level expansion at `idx`.
/// Alignment must already have run for that node.
pub fn evaluate_top_level(forest: &MacroForest, idx: usize, ctx: &EvalContext<'_>) -> InvocationRecord {
    let exp = &forest.nodes[idx];
    let ast = ctx.ast;
    debug!(name = %exp.name, "checking expansion properties");

    let mut rec = InvocationRecord {
        name: exp.name.clone(),
        invocation_depth: exp.depth,
        num_arguments: exp.arguments.len(),
        has_stringification: exp.has_stringification,
        has_token_pasting: exp.has_token_pasting,
        is_object_like: exp.is_object_like,
        is_invoked_in_macro_argument: exp.in_macro_arg,
        is_name_present_in_cpp_conditional: ctx.inspected.contains(&exp.name),
        has_same_name_as_other_declaration: ctx.sema.decl_names.contains(&exp.name),
        ..InvocationRecord::default()
    };

    // Definition and invocation locations.
    match ctx.sm.try_get_full_source_loc(exp.definition_loc) {
        Ok(loc) => {
            rec.is_definition_location_valid = true;
            rec.definition_location = loc;
        }
        Err(_) => rec.is_definition_location_valid = false,
    }
    match ctx.sm.try_get_full_source_loc(exp.spelling_range) {
        Ok(loc) => {
            rec.is_invocation_location_valid = true;
            rec.invocation_location = loc;
        }
        Err(_) => rec.is_invocation_location_valid = false,
    }

    let def_loc = exp.definition_loc;

    // Whether any macro this macro invokes was defined after this macro.
    rec.does_body_reference_macro_defined_after_macro =
        forest.descendants(idx).into_iter().any(|d| {
            let desc = &forest.nodes[d];
            ctx.sm.is_before_in_tu(def_loc, desc.definition_loc)
        });

    rec.num_ast_roots = exp.ast_roots.len();

    // Determine the AST kind of the expansion.
    if let Some(root) = exp.aligned_root {
        match root {
            super::alignment::DeclStmtTypeLoc::Stmt(_) => rec.ast_kind = "Stmt".to_string(),
            super::alignment::DeclStmtTypeLoc::Decl(_) => rec.ast_kind = "Decl".to_string(),
            super::alignment::DeclStmtTypeLoc::TypeLoc(tl) => {
                rec.ast_kind = "TypeLoc".to_string();
                // A type-specifier expansion still answers the timing and
                // nullability questions about its written type.
                let ty = ctx.sema.typeloc_types.get(&tl);
                rec.is_expansion_type_null = ty.is_none();
                if let Some(ty) = ty {
                    rec.is_expansion_type_defined_after_macro =
                        has_type_defined_after(ty, &ctx.sema.type_decls, ctx.sm, def_loc);
                }
            }
        }
    }

    // The number of AST nodes aligned with each argument must equal the
    // number of times that argument was expanded.
    rec.has_aligned_arguments = exp.arguments.iter().all(|a| a.is_aligned());

    // Subtrees expanded from arguments.
    let mut stmts_from_args: FxHashSet<NodeId> = FxHashSet::default();
    if rec.has_aligned_arguments {
        for arg in &exp.arguments {
            for root in &arg.aligned_roots {
                if let Some(st) = root.stmt() {
                    stmts_from_args.extend(ast.subtree(st));
                }
            }
        }
        let expanded_from_argument = |id: NodeId| stmts_from_args.contains(&id);

        rec.does_any_argument_have_side_effects =
            ctx.index.side_effect_exprs.iter().any(|&e| expanded_from_argument(e));

        rec.does_any_argument_contain_decl_ref_expr =
            ctx.index.all_decl_refs.iter().any(|&e| expanded_from_argument(e));

        // Only side-effect expressions which were not themselves expanded
        // from an argument of this macro count as outside contexts.
        rec.is_any_argument_expanded_where_modifiable_value_required =
            ctx.index.side_effect_exprs.iter().any(|&e| {
                if expanded_from_argument(e) {
                    return false;
                }
                side_effect_lhs(ast, e)
                    .map(|lhs| expanded_from_argument(logical_expr(ast, lhs)))
                    .unwrap_or(false)
            });

        rec.is_any_argument_expanded_where_addressable_value_required =
            ctx.index.addr_of_exprs.iter().any(|&e| {
                if expanded_from_argument(e) {
                    return false;
                }
                match &ast.node(e).kind {
                    NodeKind::AddressOf(operand) => {
                        expanded_from_argument(logical_expr(ast, *operand))
                    }
                    _ => false,
                }
            });

        debug!("checking if any argument is conditionally evaluated");
        rec.is_any_argument_conditionally_evaluated = stmts_from_args.iter().any(|&arg_stmt| {
            ctx.index
                .short_circuit_operands
                .iter()
                .any(|&operand| ast.in_tree(arg_stmt, operand))
        });
    }

    // Semantic properties of the macro body.
    let body_root = exp.aligned_root.and_then(|r| r.stmt());
    if let Some(root) = body_root {
        if rec.has_aligned_arguments {
            let mut stmts_from_body: FxHashSet<NodeId> =
                ast.subtree(root).into_iter().collect();
            for id in &stmts_from_args {
                stmts_from_body.remove(id);
            }
            let expanded_from_body = |id: NodeId| stmts_from_body.contains(&id);

            rec.does_body_reference_decl_declared_after_macro =
                ctx.index.all_decl_refs.iter().any(|&dre| {
                    if !expanded_from_body(dre) {
                        return false;
                    }
                    ctx.sema
                        .resolved_refs
                        .get(&dre)
                        .map(|decl| {
                            let decl_loc = decl_name_file_span(ctx, *decl);
                            ctx.sm.is_before_in_tu(def_loc, decl_loc)
                        })
                        .unwrap_or(false)
                });

            rec.does_body_contain_decl_ref_expr =
                ctx.index.all_decl_refs.iter().any(|&e| expanded_from_body(e));

            rec.does_subexpression_expanded_from_body_have_local_type =
                ctx.index.local_type_exprs.iter().any(|&e| expanded_from_body(e));

            rec.does_subexpression_expanded_from_body_have_type_defined_after_macro =
                stmts_from_body.iter().any(|&st| {
                    ctx.sema
                        .expr_types
                        .get(&st)
                        .map(|ty| {
                            has_type_defined_after(ty, &ctx.sema.type_decls, ctx.sm, def_loc)
                        })
                        .unwrap_or(false)
                });

            rec.is_hygienic =
                !ctx.index.local_decl_refs.iter().any(|&e| expanded_from_body(e));

            rec.is_invoked_where_modifiable_value_required = ctx
                .index
                .side_effect_lhss
                .iter()
                .any(|&lhs| logical_expr(ast, lhs) == root);

            rec.is_invoked_where_addressable_value_required =
                ctx.index.addr_of_exprs.iter().any(|&e| match &ast.node(e).kind {
                    NodeKind::AddressOf(operand) => logical_expr(ast, *operand) == root,
                    _ => false,
                });

            rec.is_invoked_where_ice_required = is_descendant_of_node_requiring_ice(ast, root);

            // Type signature of the whole expansion.
            rec.type_signature = "void".to_string();
            if ast.node(root).kind.is_expr() {
                rec.ast_kind = "Expr".to_string();

                let ty = ctx.sema.expr_types.get(&root);
                // The name is the contract: null means unretrievable.
                rec.is_expansion_type_null = ty.is_none();
                if let Some(ty) = ty {
                    rec.is_expansion_type_void = ty.is_void();
                    rec.is_expansion_type_anonymous =
                        has_anonymous_type(ty, &ctx.sema.type_decls);
                    rec.is_expansion_type_local_type = has_local_type(ty, &ctx.sema.type_decls);
                    rec.is_expansion_type_defined_after_macro =
                        has_type_defined_after(ty, &ctx.sema.type_decls, ctx.sm, def_loc);
                    rec.type_signature = ty.canonical_string(&ctx.sema.type_decls);
                }

                rec.is_expansion_ice = const_eval::eval_ice(ast, ctx.sema, root).is_some();
            }

            // Argument type information.
            let function_like_sig =
                !exp.is_object_like && matches!(rec.ast_kind.as_str(), "Stmt" | "Expr");
            if function_like_sig {
                rec.type_signature.push('(');
            }
            debug!("iterating arguments");
            for (arg_num, arg) in exp.arguments.iter().enumerate() {
                if arg_num != 0 {
                    rec.type_signature.push_str(", ");
                }

                rec.is_any_argument_never_expanded |= arg.aligned_roots.is_empty();

                let first_expr = arg
                    .aligned_roots
                    .first()
                    .and_then(|r| r.stmt())
                    .filter(|&st| ast.node(st).kind.is_expr());

                let mut arg_type_str = "<Null>".to_string();
                match first_expr {
                    None => {
                        if !arg.aligned_roots.is_empty() {
                            rec.is_any_argument_not_an_expression = true;
                        }
                    }
                    Some(e) => {
                        let ty = ctx.sema.expr_types.get(&e);
                        rec.is_any_argument_type_null |= ty.is_none();
                        if let Some(ty) = ty {
                            rec.is_any_argument_type_void |= ty.is_void();
                            rec.is_any_argument_type_anonymous |=
                                has_anonymous_type(ty, &ctx.sema.type_decls);
                            rec.is_any_argument_type_local_type |=
                                has_local_type(ty, &ctx.sema.type_decls);
                            rec.is_any_argument_type_defined_after_macro |=
                                has_type_defined_after(ty, &ctx.sema.type_decls, ctx.sm, def_loc);
                            arg_type_str = ty.canonical_string(&ctx.sema.type_decls);
                        }
                    }
                }
                if function_like_sig {
                    rec.type_signature.push_str(&arg_type_str);
                }
            }
            debug!("finished iterating arguments");
            if function_like_sig {
                rec.type_signature.push(')');
            }

            // Control-flow statements anywhere in the expansion.
            rec.does_expansion_have_control_flow_stmt = stmts_from_body
                .iter()
                .chain(stmts_from_args.iter())
                .any(|&st| {
                    matches!(
                        ast.node(st).kind,
                        NodeKind::Return(_)
                            | NodeKind::Continue
                            | NodeKind::Break
                            | NodeKind::Goto(_)
                    )
                });
        }
    } else {
        rec.does_expansion_have_control_flow_stmt = stmts_from_args.iter().any(|&st| {
            matches!(
                ast.node(st).kind,
                NodeKind::Return(_) | NodeKind::Continue | NodeKind::Break | NodeKind::Goto(_)
            )
        });
    }

    rec
}

/// File-level location of a declaration's name, for declared-after
/// comparisons.
fn decl_name_file_span(ctx: &EvalContext<'_>, decl: NodeId) -> crate::common::source::Span {
    let node = ctx.ast.node(decl);
    let name_span = match &node.kind {
        NodeKind::VarDecl(d) => d.name_span,
        NodeKind::ParamDecl(d) => d.name_span,
        NodeKind::FunctionDecl(d) => d.name_span,
        NodeKind::TypedefDecl(d) => d.name_span,
        NodeKind::RecordDecl(d) => d.name_span,
        NodeKind::FieldDecl(d) => d.name_span,
        NodeKind::EnumDecl(d) => d.name_span,
        NodeKind::EnumConstantDecl(d) => d.name_span,
        _ => return crate::common::source::Span::invalid(),
    };
    let first = node.first_tok as usize;
    let last = (node.last_tok as usize).min(ctx.toks.len().saturating_sub(1));
    for t in &ctx.toks[first..=last.max(first)] {
        if t.tok.span == name_span {
            return t.file_span();
        }
    }
    name_span
}
