//! Expression parsing with C precedence.

use crate::common::error::Result;
use crate::frontend::lexer::TokenKind;

use super::ast::{BinOp, NodeId, NodeKind, PostfixOp, UnaryOp};
use super::parser::Parser;

fn bin_prec(kind: &TokenKind) -> Option<(BinOp, u8)> {
    use TokenKind::*;
    Some(match kind {
        PipePipe => (BinOp::LogicalOr, 0),
        AmpAmp => (BinOp::LogicalAnd, 1),
        Pipe => (BinOp::BitOr, 2),
        Caret => (BinOp::BitXor, 3),
        Amp => (BinOp::BitAnd, 4),
        EqualEqual => (BinOp::Eq, 5),
        BangEqual => (BinOp::Ne, 5),
        Less => (BinOp::Lt, 6),
        LessEqual => (BinOp::Le, 6),
        Greater => (BinOp::Gt, 6),
        GreaterEqual => (BinOp::Ge, 6),
        LessLess => (BinOp::Shl, 7),
        GreaterGreater => (BinOp::Shr, 7),
        Plus => (BinOp::Add, 8),
        Minus => (BinOp::Sub, 8),
        Star => (BinOp::Mul, 9),
        Slash => (BinOp::Div, 9),
        Percent => (BinOp::Mod, 9),
        _ => return None,
    })
}

fn compound_assign_op(kind: &TokenKind) -> Option<BinOp> {
    use TokenKind::*;
    Some(match kind {
        PlusAssign => BinOp::Add,
        MinusAssign => BinOp::Sub,
        StarAssign => BinOp::Mul,
        SlashAssign => BinOp::Div,
        PercentAssign => BinOp::Mod,
        AmpAssign => BinOp::BitAnd,
        PipeAssign => BinOp::BitOr,
        CaretAssign => BinOp::BitXor,
        LessLessAssign => BinOp::Shl,
        GreaterGreaterAssign => BinOp::Shr,
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    /// Full expression (comma level).
    pub(super) fn parse_expr(&mut self) -> Result<NodeId> {
        let first = self.pos;
        let mut lhs = self.parse_assignment()?;
        while self.eat(&TokenKind::Comma) {
            let rhs = self.parse_assignment()?;
            lhs = self.finish(NodeKind::Comma(lhs, rhs), first);
        }
        Ok(lhs)
    }

    pub(super) fn parse_assignment(&mut self) -> Result<NodeId> {
        let first = self.pos;
        let lhs = self.parse_conditional()?;
        if self.eat(&TokenKind::Assign) {
            let rhs = self.parse_assignment()?;
            return Ok(self.finish(NodeKind::Assign(lhs, rhs), first));
        }
        if let Some(op) = compound_assign_op(self.kind()) {
            self.bump();
            let rhs = self.parse_assignment()?;
            return Ok(self.finish(NodeKind::CompoundAssign(op, lhs, rhs), first));
        }
        Ok(lhs)
    }

    pub(super) fn parse_conditional(&mut self) -> Result<NodeId> {
        let first = self.pos;
        let cond = self.parse_binary(0)?;
        if self.eat(&TokenKind::Question) {
            let then = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "':' in conditional")?;
            let other = self.parse_conditional()?;
            return Ok(self.finish(NodeKind::Conditional(cond, then, other), first));
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId> {
        let first = self.pos;
        let mut lhs = self.parse_cast_expr()?;
        while let Some((op, prec)) = bin_prec(self.kind()) {
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.finish(NodeKind::BinaryOp(op, lhs, rhs), first);
        }
        Ok(lhs)
    }

    fn parse_cast_expr(&mut self) -> Result<NodeId> {
        if self.at(&TokenKind::LParen) {
            // A parenthesized type name is a cast (or compound literal).
            let saved = self.pos;
            self.bump();
            if self.is_type_name_start() {
                let first = saved;
                let type_loc = self.parse_type_name()?;
                self.expect(&TokenKind::RParen, "')' after cast type")?;
                let operand = if self.at(&TokenKind::LBrace) {
                    self.parse_initializer()?
                } else {
                    self.parse_cast_expr()?
                };
                return Ok(self.finish(NodeKind::Cast(type_loc, operand), first));
            }
            self.pos = saved;
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let first = self.pos;
        match self.kind().clone() {
            PlusPlus => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::PreInc, e), first))
            }
            MinusMinus => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::PreDec, e), first))
            }
            Plus => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::Plus, e), first))
            }
            Minus => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::Neg, e), first))
            }
            Tilde => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::BitNot, e), first))
            }
            Bang => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::UnaryOp(UnaryOp::LogicalNot, e), first))
            }
            Star => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::Deref(e), first))
            }
            Amp => {
                self.bump();
                let e = self.parse_cast_expr()?;
                Ok(self.finish(NodeKind::AddressOf(e), first))
            }
            Sizeof => {
                self.bump();
                if self.at(&LParen) {
                    let saved = self.pos;
                    self.bump();
                    if self.is_type_name_start() {
                        let type_loc = self.parse_type_name()?;
                        self.expect(&RParen, "')' after sizeof type")?;
                        return Ok(self.finish(NodeKind::SizeofType(type_loc), first));
                    }
                    self.pos = saved;
                }
                let e = self.parse_unary()?;
                Ok(self.finish(NodeKind::SizeofExpr(e), first))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let first = self.pos;
        let mut e = self.parse_primary()?;
        loop {
            match self.kind().clone() {
                LBracket => {
                    self.bump();
                    let idx = self.parse_expr()?;
                    self.expect(&RBracket, "']' after subscript")?;
                    e = self.finish(NodeKind::Index(e, idx), first);
                }
                LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(&RParen) {
                        loop {
                            args.push(self.parse_assignment()?);
                            if !self.eat(&Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&RParen, "')' after call arguments")?;
                    e = self.finish(NodeKind::Call(e, args), first);
                }
                Dot => {
                    self.bump();
                    let Some(field) = self.ident_text().map(|s| s.to_string()) else {
                        return Err(self.error("expected field name after '.'"));
                    };
                    self.bump();
                    e = self.finish(NodeKind::Member(e, field), first);
                }
                Arrow => {
                    self.bump();
                    let Some(field) = self.ident_text().map(|s| s.to_string()) else {
                        return Err(self.error("expected field name after '->'"));
                    };
                    self.bump();
                    e = self.finish(NodeKind::ArrowMember(e, field), first);
                }
                PlusPlus => {
                    self.bump();
                    e = self.finish(NodeKind::PostfixOp(PostfixOp::PostInc, e), first);
                }
                MinusMinus => {
                    self.bump();
                    e = self.finish(NodeKind::PostfixOp(PostfixOp::PostDec, e), first);
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let first = self.pos;
        match self.kind().clone() {
            IntLiteral(v) => {
                self.bump();
                Ok(self.finish(NodeKind::IntLiteral(v), first))
            }
            UIntLiteral(v) => {
                self.bump();
                Ok(self.finish(NodeKind::UIntLiteral(v), first))
            }
            FloatLiteral(v) => {
                self.bump();
                Ok(self.finish(NodeKind::FloatLiteral(v), first))
            }
            StringLiteral(s) => {
                // Adjacent string literals concatenate into one node.
                let mut value = s;
                self.bump();
                while let StringLiteral(next) = self.kind().clone() {
                    value.push_str(&next);
                    self.bump();
                }
                Ok(self.finish(NodeKind::StringLiteral(value), first))
            }
            CharLiteral(c) => {
                self.bump();
                Ok(self.finish(NodeKind::CharLiteral(c), first))
            }
            Identifier(name) => {
                self.bump();
                Ok(self.finish(NodeKind::DeclRef(name), first))
            }
            LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(&RParen, "')'")?;
                Ok(self.finish(NodeKind::Paren(e), first))
            }
            other => Err(self.error(format!("expected expression, got '{}'", other.text()))),
        }
    }
}
