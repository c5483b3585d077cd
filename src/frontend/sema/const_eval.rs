//! Integral-constant-expression evaluation.
//!
//! Answers the language-level question "is this expression an integral
//! constant expression, and what is its value": literals, enumeration
//! constants, `sizeof`, casts to integer types, and the usual operators
//! over those. Anything else (floats, variables, calls, side effects)
//! yields None.

use crate::common::types::CType;
use crate::frontend::parser::ast::{BinOp, NodeKind, UnaryOp};
use crate::frontend::parser::{Ast, NodeId};

use super::sema::Sema;

pub fn eval_ice(ast: &Ast, sema: &Sema, id: NodeId) -> Option<i64> {
    match &ast.node(id).kind {
        NodeKind::IntLiteral(v) => Some(*v),
        NodeKind::UIntLiteral(v) => Some(*v as i64),
        NodeKind::CharLiteral(c) => Some(*c as i64),
        NodeKind::DeclRef(_) => {
            let decl = sema.resolved_refs.get(&id)?;
            sema.enum_values.get(decl).copied()
        }
        NodeKind::Paren(inner) => eval_ice(ast, sema, *inner),
        NodeKind::UnaryOp(op, operand) => {
            let v = eval_ice(ast, sema, *operand)?;
            match op {
                UnaryOp::Plus => Some(v),
                UnaryOp::Neg => Some(v.wrapping_neg()),
                UnaryOp::BitNot => Some(!v),
                UnaryOp::LogicalNot => Some((v == 0) as i64),
                UnaryOp::PreInc | UnaryOp::PreDec => None,
            }
        }
        NodeKind::BinaryOp(op, lhs, rhs) => {
            use BinOp::*;
            // Short-circuit operators can skip an unevaluated, non-constant
            // operand, matching the language definition.
            if *op == LogicalAnd {
                let l = eval_ice(ast, sema, *lhs)?;
                if l == 0 {
                    return Some(0);
                }
                return eval_ice(ast, sema, *rhs).map(|r| (r != 0) as i64);
            }
            if *op == LogicalOr {
                let l = eval_ice(ast, sema, *lhs)?;
                if l != 0 {
                    return Some(1);
                }
                return eval_ice(ast, sema, *rhs).map(|r| (r != 0) as i64);
            }
            let l = eval_ice(ast, sema, *lhs)?;
            let r = eval_ice(ast, sema, *rhs)?;
            match op {
                Add => Some(l.wrapping_add(r)),
                Sub => Some(l.wrapping_sub(r)),
                Mul => Some(l.wrapping_mul(r)),
                Div => (r != 0).then(|| l.wrapping_div(r)),
                Mod => (r != 0).then(|| l.wrapping_rem(r)),
                BitAnd => Some(l & r),
                BitOr => Some(l | r),
                BitXor => Some(l ^ r),
                Shl => Some(l.wrapping_shl(r as u32)),
                Shr => Some(l.wrapping_shr(r as u32)),
                Eq => Some((l == r) as i64),
                Ne => Some((l != r) as i64),
                Lt => Some((l < r) as i64),
                Le => Some((l <= r) as i64),
                Gt => Some((l > r) as i64),
                Ge => Some((l >= r) as i64),
                LogicalAnd | LogicalOr => unreachable!("handled above"),
            }
        }
        NodeKind::Conditional(cond, then, other) => {
            let c = eval_ice(ast, sema, *cond)?;
            if c != 0 {
                eval_ice(ast, sema, *then)
            } else {
                eval_ice(ast, sema, *other)
            }
        }
        NodeKind::Cast(type_loc, operand) => {
            let ty = sema.typeloc_types.get(type_loc)?;
            if !ty.is_integer() {
                return None;
            }
            eval_ice(ast, sema, *operand)
        }
        NodeKind::SizeofExpr(operand) => {
            let ty = sema.expr_types.get(operand)?;
            ty.size_of(&sema.type_decls).map(|s| s as i64)
        }
        NodeKind::SizeofType(type_loc) => {
            let ty = sema.typeloc_types.get(type_loc)?;
            ty.size_of(&sema.type_decls).map(|s| s as i64)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::source::SourceManager;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::parse_translation_unit;
    use crate::frontend::preprocessor::PpToken;
    use crate::frontend::sema;

    fn eval_init(src: &str) -> Option<i64> {
        let mut sm = SourceManager::new();
        let fid = sm.add_file("t.c".into(), Some("/t.c".into()), src.to_string());
        let toks: Vec<PpToken> = Lexer::new(src, fid)
            .lex()
            .unwrap()
            .into_iter()
            .map(PpToken::from_file)
            .collect();
        let ast = parse_translation_unit(&toks, &sm).unwrap();
        let out = sema::run(&ast, &toks, &sm);
        // Find the initializer of the last variable declaration.
        let init = ast
            .ids()
            .filter_map(|id| match &ast.node(id).kind {
                NodeKind::VarDecl(d) => d.init,
                _ => None,
            })
            .last()?;
        eval_ice(&ast, &out, init)
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(eval_init("int x = (1 + 2) * 3;"), Some(9));
        assert_eq!(eval_init("int x = 1 ? 10 : 20;"), Some(10));
        assert_eq!(eval_init("int x = 'a';"), Some(97));
    }

    #[test]
    fn enum_constants_are_constant() {
        assert_eq!(eval_init("enum e { A = 4, B }; int x = B;"), Some(5));
    }

    #[test]
    fn sizeof_is_constant() {
        assert_eq!(eval_init("int x = sizeof(long);"), Some(8));
    }

    #[test]
    fn variables_are_not_constant() {
        assert_eq!(eval_init("int y; int x = y + 1;"), None);
        assert_eq!(eval_init("int x = 1.5;"), None);
    }
}
