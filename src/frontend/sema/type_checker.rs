//! Expression type inference.
//!
//! Runs after the scope walk: the arena is in post-order (children have
//! smaller ids than their parents), so one ascending pass types every
//! expression from its children's types, resolved references, and declared
//! types. Expressions whose type cannot be recovered simply stay untyped;
//! the property evaluator reports those as null-typed.

use crate::common::types::CType;
use crate::frontend::parser::ast::{BinOp, NodeKind, UnaryOp};
use crate::frontend::parser::{Ast, NodeId};

use super::sema::Sema;

pub(super) fn infer_types(ast: &Ast, sema: &mut Sema) {
    for id in ast.ids() {
        if ast.node(id).kind.is_expr() {
            if let Some(ty) = infer_expr(ast, sema, id) {
                sema.expr_types.insert(id, ty);
            }
        }
    }
}

fn infer_expr(ast: &Ast, sema: &Sema, id: NodeId) -> Option<CType> {
    let ty_of = |n: NodeId| sema.expr_types.get(&n).cloned();
    match &ast.node(id).kind {
        NodeKind::IntLiteral(_) => Some(CType::Int),
        NodeKind::UIntLiteral(_) => Some(CType::UInt),
        NodeKind::FloatLiteral(_) => Some(CType::Double),
        // String literals decay in almost every context the analysis cares
        // about, so model them as char pointers directly.
        NodeKind::StringLiteral(_) => Some(CType::Pointer(Box::new(CType::Char))),
        NodeKind::CharLiteral(_) => Some(CType::Int),
        NodeKind::DeclRef(_) => {
            let decl = sema.resolved_refs.get(&id)?;
            sema.decl_types.get(decl).cloned()
        }
        NodeKind::Paren(inner) => ty_of(*inner),
        NodeKind::BinaryOp(op, lhs, rhs) => {
            use BinOp::*;
            match op {
                Eq | Ne | Lt | Le | Gt | Ge | LogicalAnd | LogicalOr => Some(CType::Int),
                Shl | Shr => Some(ty_of(*lhs)?.integer_promoted()),
                _ => {
                    let l = ty_of(*lhs)?;
                    let r = ty_of(*rhs)?;
                    // Pointer arithmetic keeps the pointer; pointer
                    // difference is ptrdiff_t (long here).
                    match (l.is_pointer() || matches!(l.desugared(), CType::Array(..)),
                           r.is_pointer() || matches!(r.desugared(), CType::Array(..))) {
                        (true, true) if *op == Sub => Some(CType::Long),
                        (true, _) => Some(decay(l)),
                        (_, true) => Some(decay(r)),
                        _ => Some(CType::usual_arithmetic(&l, &r)),
                    }
                }
            }
        }
        NodeKind::UnaryOp(op, operand) => match op {
            UnaryOp::LogicalNot => Some(CType::Int),
            UnaryOp::Plus | UnaryOp::Neg | UnaryOp::BitNot => {
                let t = ty_of(*operand)?;
                if t.is_floating() {
                    Some(t)
                } else {
                    Some(t.integer_promoted())
                }
            }
            UnaryOp::PreInc | UnaryOp::PreDec => ty_of(*operand),
        },
        NodeKind::PostfixOp(_, operand) => ty_of(*operand),
        NodeKind::Assign(lhs, _) | NodeKind::CompoundAssign(_, lhs, _) => ty_of(*lhs),
        NodeKind::Conditional(_, then, other) => {
            let t = ty_of(*then)?;
            let e = ty_of(*other)?;
            if t.is_arithmetic() && e.is_arithmetic() {
                Some(CType::usual_arithmetic(&t, &e))
            } else if t.is_pointer() {
                Some(t)
            } else if e.is_pointer() {
                Some(e)
            } else {
                Some(t)
            }
        }
        NodeKind::Call(callee, _) => {
            let ct = ty_of(*callee)?;
            match ct.desugared() {
                CType::Function(f) => Some(f.return_type.clone()),
                CType::Pointer(inner) => match inner.desugared() {
                    CType::Function(f) => Some(f.return_type.clone()),
                    _ => None,
                },
                _ => None,
            }
        }
        NodeKind::Index(base, _) => {
            let bt = ty_of(*base)?;
            match bt.desugared() {
                CType::Pointer(inner) | CType::Array(inner, _) => Some((**inner).clone()),
                _ => None,
            }
        }
        NodeKind::Member(object, field) => {
            let ot = ty_of(*object)?;
            field_type(sema, &ot, field)
        }
        NodeKind::ArrowMember(object, field) => {
            let ot = ty_of(*object)?;
            match ot.desugared() {
                CType::Pointer(inner) => field_type(sema, inner, field),
                _ => None,
            }
        }
        NodeKind::Cast(type_loc, _) => sema.typeloc_types.get(type_loc).cloned(),
        NodeKind::SizeofExpr(_) | NodeKind::SizeofType(_) => Some(CType::ULong),
        NodeKind::AddressOf(operand) => Some(CType::Pointer(Box::new(ty_of(*operand)?))),
        NodeKind::Deref(operand) => {
            let ot = ty_of(*operand)?;
            match ot.desugared() {
                CType::Pointer(inner) | CType::Array(inner, _) => Some((**inner).clone()),
                _ => None,
            }
        }
        NodeKind::Comma(_, rhs) => ty_of(*rhs),
        NodeKind::InitList(_) => None,
        _ => None,
    }
}

fn decay(ty: CType) -> CType {
    match ty.desugared() {
        CType::Array(elem, _) => CType::Pointer(elem.clone()),
        _ => ty,
    }
}

/// Look a field up in a struct/union type, descending through anonymous
/// struct/union members one level the way C member lookup does.
fn field_type(sema: &Sema, ty: &CType, field: &str) -> Option<CType> {
    let tid = match ty.desugared() {
        CType::Struct(id) | CType::Union(id) => *id,
        _ => return None,
    };
    let fields = sema.record_fields.get(&tid)?;
    for (name, fty) in fields {
        match name {
            Some(n) if n == field => return Some(fty.clone()),
            None => {
                if let Some(found) = field_type(sema, fty, field) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}
