//! Statement parsing.

use crate::common::error::Result;
use crate::frontend::lexer::TokenKind;

use super::ast::{NodeId, NodeKind};
use super::parser::Parser;

impl<'a> Parser<'a> {
    pub(super) fn parse_compound_stmt(&mut self) -> Result<NodeId> {
        let first = self.pos;
        self.expect(&TokenKind::LBrace, "'{'")?;
        self.block_depth += 1;
        let mut items = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_end() {
            if self.is_declaration_start() {
                let d_first = self.pos;
                let decls = self.parse_declaration(true)?;
                items.push(self.finish(NodeKind::DeclStmt(decls), d_first));
            } else {
                items.push(self.parse_stmt()?);
            }
        }
        self.block_depth -= 1;
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(self.finish(NodeKind::Compound(items), first))
    }

    pub(super) fn parse_stmt(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let first = self.pos;
        match self.kind().clone() {
            LBrace => self.parse_compound_stmt(),
            If => {
                self.bump();
                self.expect(&LParen, "'(' after if")?;
                let cond = self.parse_expr()?;
                self.expect(&RParen, "')' after condition")?;
                let then = self.parse_stmt()?;
                let other = if self.eat(&Else) { Some(self.parse_stmt()?) } else { None };
                Ok(self.finish(NodeKind::If(cond, then, other), first))
            }
            While => {
                self.bump();
                self.expect(&LParen, "'(' after while")?;
                let cond = self.parse_expr()?;
                self.expect(&RParen, "')' after condition")?;
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::While(cond, body), first))
            }
            Do => {
                self.bump();
                let body = self.parse_stmt()?;
                self.expect(&While, "'while' after do body")?;
                self.expect(&LParen, "'(' after while")?;
                let cond = self.parse_expr()?;
                self.expect(&RParen, "')' after condition")?;
                self.expect(&Semicolon, "';' after do-while")?;
                Ok(self.finish(NodeKind::DoWhile(body, cond), first))
            }
            For => {
                self.bump();
                self.expect(&LParen, "'(' after for")?;
                let init = if self.eat(&Semicolon) {
                    None
                } else if self.is_declaration_start() {
                    let d_first = self.pos;
                    let decls = self.parse_declaration(true)?;
                    Some(self.finish(NodeKind::DeclStmt(decls), d_first))
                } else {
                    let e = self.parse_expr()?;
                    self.expect(&Semicolon, "';' after for initializer")?;
                    Some(e)
                };
                let cond = if self.at(&Semicolon) { None } else { Some(self.parse_expr()?) };
                self.expect(&Semicolon, "';' after for condition")?;
                let step = if self.at(&RParen) { None } else { Some(self.parse_expr()?) };
                self.expect(&RParen, "')' after for clauses")?;
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::For(init, cond, step, body), first))
            }
            Switch => {
                self.bump();
                self.expect(&LParen, "'(' after switch")?;
                let cond = self.parse_expr()?;
                self.expect(&RParen, "')' after switch expression")?;
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::Switch(cond, body), first))
            }
            Case => {
                self.bump();
                let value = self.parse_conditional()?;
                self.expect(&Colon, "':' after case value")?;
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::Case(value, body), first))
            }
            Default => {
                self.bump();
                self.expect(&Colon, "':' after default")?;
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::Default(body), first))
            }
            Break => {
                self.bump();
                self.expect(&Semicolon, "';' after break")?;
                Ok(self.finish(NodeKind::Break, first))
            }
            Continue => {
                self.bump();
                self.expect(&Semicolon, "';' after continue")?;
                Ok(self.finish(NodeKind::Continue, first))
            }
            Goto => {
                self.bump();
                let Some(label) = self.ident_text().map(|s| s.to_string()) else {
                    return Err(self.error("expected label after goto"));
                };
                self.bump();
                self.expect(&Semicolon, "';' after goto")?;
                Ok(self.finish(NodeKind::Goto(label), first))
            }
            Return => {
                self.bump();
                let value = if self.at(&Semicolon) { None } else { Some(self.parse_expr()?) };
                self.expect(&Semicolon, "';' after return")?;
                Ok(self.finish(NodeKind::Return(value), first))
            }
            Semicolon => {
                self.bump();
                Ok(self.finish(NodeKind::ExprStmt(None), first))
            }
            Identifier(name) if self.kind_at(1) == &Colon => {
                self.bump();
                self.bump();
                let body = self.parse_stmt()?;
                Ok(self.finish(NodeKind::Label(name, body), first))
            }
            _ => {
                let e = self.parse_expr()?;
                self.expect(&Semicolon, "';' after expression")?;
                Ok(self.finish(NodeKind::ExprStmt(Some(e)), first))
            }
        }
    }
}
