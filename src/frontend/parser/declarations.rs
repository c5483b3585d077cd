//! Declaration parsing: specifiers, declarators, struct/union/enum bodies,
//! typedefs, and function definitions.

use crate::common::error::Result;
use crate::common::source::Span;
use crate::frontend::lexer::TokenKind;

use super::ast::{
    DerivedDeclarator, EnumConstantDeclData, EnumDeclData, FieldDeclData, FunctionDeclData,
    NodeId, NodeKind, ParamDeclData, RecordDeclData, TypeLocData, TypeSpecifier, TypedefDeclData,
    VarDeclData,
};
use super::parser::Parser;

/// Storage-class and typedef flags gathered from declaration specifiers.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct SpecFlags {
    pub is_typedef: bool,
    pub is_static: bool,
    pub is_extern: bool,
}

pub(super) struct SpecInfo {
    pub spec: TypeSpecifier,
    pub flags: SpecFlags,
    pub first_tok: usize,
    pub last_tok: usize,
}

/// A parsed declarator before flattening: pointer count, optional nested
/// declarator (function pointers), name, and suffixes in source order.
struct DeclTree {
    pointers: usize,
    inner: Option<Box<DeclTree>>,
    name: Option<(String, Span)>,
    suffixes: Vec<Suffix>,
}

enum Suffix {
    Array(Option<NodeId>),
    Function(Vec<NodeId>, bool),
}

impl<'a> Parser<'a> {
    pub(super) fn parse_external_decl(&mut self) -> Result<Vec<NodeId>> {
        self.parse_declaration(false)
    }

    /// Whether the current token can begin a declaration.
    pub(super) fn is_declaration_start(&self) -> bool {
        use TokenKind::*;
        match self.kind() {
            Void | Bool | Char | Short | Int | Long | Float | Double | Signed | Unsigned
            | Struct | Union | Enum | Typedef | Static | Extern | Const | Volatile | Inline
            | Register | Auto | Restrict => true,
            Identifier(s) => self.typedef_names.contains(s),
            _ => false,
        }
    }

    /// Whether the current token can begin a type name (casts, sizeof).
    pub(super) fn is_type_name_start(&self) -> bool {
        use TokenKind::*;
        match self.kind() {
            Void | Bool | Char | Short | Int | Long | Float | Double | Signed | Unsigned
            | Struct | Union | Enum | Const | Volatile => true,
            Identifier(s) => self.typedef_names.contains(s),
            _ => false,
        }
    }

    /// Parse one declaration (or function definition) and return the decl
    /// nodes it introduces, in source order.
    pub(super) fn parse_declaration(&mut self, is_local: bool) -> Result<Vec<NodeId>> {
        let first = self.pos;
        let spec = self.parse_decl_specifiers()?;
        let type_loc = self.ast.add(
            NodeKind::TypeLoc(Box::new(TypeLocData { spec: spec.spec.clone(), derived: Vec::new() })),
            spec.first_tok as u32,
            spec.last_tok as u32,
        );

        // Tag-only declaration: `struct s { ... };`. The tag decl itself is
        // the declaration.
        if self.eat(&TokenKind::Semicolon) {
            return Ok(match &spec.spec {
                TypeSpecifier::Struct(_, Some(id))
                | TypeSpecifier::Union(_, Some(id))
                | TypeSpecifier::Enum(_, Some(id)) => vec![*id],
                _ => Vec::new(),
            });
        }

        let mut decls = Vec::new();
        let mut owns_type_loc = true;
        loop {
            let tree = self.parse_declarator(false)?;
            let (derived, name) = flatten_declarator(tree);
            let Some((name, name_span)) = name else {
                return Err(self.error("expected declarator name"));
            };

            if spec.flags.is_typedef {
                self.typedef_names.insert(name.clone());
                let node = NodeKind::TypedefDecl(Box::new(TypedefDeclData {
                    name,
                    name_span,
                    type_loc,
                    owns_type_loc,
                    derived,
                    is_local,
                }));
                decls.push(self.finish(node, first));
            } else if matches!(derived.last(), Some(DerivedDeclarator::Function(..))) {
                let mut return_derived = derived;
                let Some(DerivedDeclarator::Function(params, variadic)) = return_derived.pop()
                else {
                    unreachable!("checked above");
                };
                let body = if self.at(&TokenKind::LBrace) {
                    Some(self.parse_compound_stmt()?)
                } else {
                    None
                };
                let had_body = body.is_some();
                let node = NodeKind::FunctionDecl(Box::new(FunctionDeclData {
                    name,
                    name_span,
                    type_loc,
                    owns_type_loc,
                    return_derived,
                    params,
                    variadic,
                    body,
                    is_static: spec.flags.is_static,
                }));
                decls.push(self.finish(node, first));
                if had_body {
                    // Function definitions take no trailing semicolon and
                    // end the declarator list.
                    return Ok(decls);
                }
            } else {
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.parse_initializer()?)
                } else {
                    None
                };
                let node = NodeKind::VarDecl(Box::new(VarDeclData {
                    name,
                    name_span,
                    type_loc,
                    owns_type_loc,
                    derived,
                    init,
                    is_static: spec.flags.is_static,
                    is_extern: spec.flags.is_extern,
                    is_local,
                }));
                decls.push(self.finish(node, first));
            }

            owns_type_loc = false;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon, "';' after declaration")?;
        Ok(decls)
    }

    pub(super) fn parse_decl_specifiers(&mut self) -> Result<SpecInfo> {
        use TokenKind::*;
        let first = self.pos;
        let mut flags = SpecFlags::default();
        let mut base: Option<TokenKind> = None;
        let mut unsigned = false;
        let mut signed = false;
        let mut short = false;
        let mut long_count = 0usize;
        let mut tag: Option<TypeSpecifier> = None;
        let mut typedef_name: Option<String> = None;

        loop {
            match self.kind().clone() {
                Typedef => {
                    flags.is_typedef = true;
                    self.bump();
                }
                Static => {
                    flags.is_static = true;
                    self.bump();
                }
                Extern => {
                    flags.is_extern = true;
                    self.bump();
                }
                Const | Volatile | Inline | Register | Auto | Restrict => {
                    self.bump();
                }
                Void | Bool | Char | Int | Float | Double => {
                    base = Some(self.kind().clone());
                    self.bump();
                }
                Short => {
                    short = true;
                    self.bump();
                }
                Long => {
                    long_count += 1;
                    self.bump();
                }
                Signed => {
                    signed = true;
                    self.bump();
                }
                Unsigned => {
                    unsigned = true;
                    self.bump();
                }
                Struct => tag = Some(self.parse_record_spec(false)?),
                Union => tag = Some(self.parse_record_spec(true)?),
                Enum => tag = Some(self.parse_enum_spec()?),
                Identifier(name) => {
                    // A typedef name acts as the base type only when nothing
                    // else has claimed that role yet.
                    let nothing_yet = base.is_none()
                        && tag.is_none()
                        && typedef_name.is_none()
                        && !unsigned
                        && !signed
                        && !short
                        && long_count == 0;
                    if nothing_yet && self.typedef_names.contains(&name) {
                        typedef_name = Some(name);
                        self.bump();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        let spec = if let Some(tag_spec) = tag {
            tag_spec
        } else if let Some(name) = typedef_name {
            TypeSpecifier::TypedefName(name)
        } else {
            match (base.clone(), unsigned, signed, short, long_count) {
                (Some(Void), ..) => TypeSpecifier::Void,
                (Some(Bool), ..) => TypeSpecifier::Bool,
                (Some(Char), true, ..) => TypeSpecifier::UChar,
                (Some(Char), _, true, ..) => TypeSpecifier::SChar,
                (Some(Char), ..) => TypeSpecifier::Char,
                (Some(Float), ..) => TypeSpecifier::Float,
                (Some(Double), ..) => TypeSpecifier::Double,
                (_, u, _, true, _) => {
                    if u {
                        TypeSpecifier::UShort
                    } else {
                        TypeSpecifier::Short
                    }
                }
                (_, u, _, _, 1) => {
                    if u {
                        TypeSpecifier::ULong
                    } else {
                        TypeSpecifier::Long
                    }
                }
                (_, u, _, _, n) if n >= 2 => {
                    if u {
                        TypeSpecifier::ULongLong
                    } else {
                        TypeSpecifier::LongLong
                    }
                }
                (_, true, ..) => TypeSpecifier::UInt,
                _ => {
                    if base.is_none() && !signed && long_count == 0 && !short && !unsigned {
                        return Err(self.error("expected type specifier"));
                    }
                    TypeSpecifier::Int
                }
            }
        };

        Ok(SpecInfo { spec, flags, first_tok: first, last_tok: self.pos.saturating_sub(1) })
    }

    fn parse_record_spec(&mut self, is_union: bool) -> Result<TypeSpecifier> {
        let first = self.pos;
        self.bump(); // struct / union
        let (name, name_span) = match self.ident_text() {
            Some(s) => {
                let s = s.to_string();
                let span = self.span_of(self.pos);
                self.bump();
                (Some(s), span)
            }
            None => (None, self.span_of(first)),
        };

        if !self.at(&TokenKind::LBrace) {
            return Ok(if is_union {
                TypeSpecifier::Union(name, None)
            } else {
                TypeSpecifier::Struct(name, None)
            });
        }

        self.bump(); // {
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_end() {
            self.parse_struct_field_line(&mut fields)?;
        }
        self.expect(&TokenKind::RBrace, "'}' after struct fields")?;

        let node = NodeKind::RecordDecl(RecordDeclData {
            is_union,
            name: name.clone(),
            name_span,
            fields,
            is_local: self.block_depth > 0,
        });
        let rec = self.finish(node, first);
        Ok(if is_union {
            TypeSpecifier::Union(name, Some(rec))
        } else {
            TypeSpecifier::Struct(name, Some(rec))
        })
    }

    fn parse_struct_field_line(&mut self, fields: &mut Vec<NodeId>) -> Result<()> {
        let first = self.pos;
        let spec = self.parse_decl_specifiers()?;
        let type_loc = self.ast.add(
            NodeKind::TypeLoc(Box::new(TypeLocData { spec: spec.spec.clone(), derived: Vec::new() })),
            spec.first_tok as u32,
            spec.last_tok as u32,
        );

        // Anonymous nested struct/union member.
        if self.eat(&TokenKind::Semicolon) {
            let node = NodeKind::FieldDecl(Box::new(FieldDeclData {
                name: None,
                name_span: self.span_of(spec.first_tok),
                type_loc,
                owns_type_loc: true,
                derived: Vec::new(),
                bit_width: None,
            }));
            fields.push(self.finish(node, first));
            return Ok(());
        }

        let mut owns_type_loc = true;
        loop {
            let (name, name_span, derived) = if self.at(&TokenKind::Colon) {
                // Unnamed bit-field: `int : 3;`
                (None, self.span_of(self.pos), Vec::new())
            } else {
                let tree = self.parse_declarator(false)?;
                let (derived, name) = flatten_declarator(tree);
                match name {
                    Some((n, s)) => (Some(n), s, derived),
                    None => (None, self.span_of(first), derived),
                }
            };
            let bit_width = if self.eat(&TokenKind::Colon) {
                Some(self.parse_conditional()?)
            } else {
                None
            };
            let node = NodeKind::FieldDecl(Box::new(FieldDeclData {
                name,
                name_span,
                type_loc,
                owns_type_loc,
                derived,
                bit_width,
            }));
            fields.push(self.finish(node, first));
            owns_type_loc = false;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon, "';' after struct field")?;
        Ok(())
    }

    fn parse_enum_spec(&mut self) -> Result<TypeSpecifier> {
        let first = self.pos;
        self.bump(); // enum
        let (name, name_span) = match self.ident_text() {
            Some(s) => {
                let s = s.to_string();
                let span = self.span_of(self.pos);
                self.bump();
                (Some(s), span)
            }
            None => (None, self.span_of(first)),
        };

        if !self.at(&TokenKind::LBrace) {
            return Ok(TypeSpecifier::Enum(name, None));
        }

        self.bump(); // {
        let mut enumerators = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_end() {
            let e_first = self.pos;
            let Some(enum_name) = self.ident_text().map(|s| s.to_string()) else {
                return Err(self.error("expected enumerator name"));
            };
            let enum_span = self.span_of(self.pos);
            self.bump();
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_conditional()?)
            } else {
                None
            };
            let node = NodeKind::EnumConstantDecl(Box::new(EnumConstantDeclData {
                name: enum_name,
                name_span: enum_span,
                init,
            }));
            enumerators.push(self.finish(node, e_first));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after enumerators")?;

        let node = NodeKind::EnumDecl(EnumDeclData {
            name: name.clone(),
            name_span,
            enumerators,
            is_local: self.block_depth > 0,
        });
        let id = self.finish(node, first);
        Ok(TypeSpecifier::Enum(name, Some(id)))
    }

    fn parse_declarator(&mut self, abstract_ok: bool) -> Result<DeclTree> {
        let mut pointers = 0usize;
        while self.at(&TokenKind::Star) {
            self.bump();
            pointers += 1;
            while matches!(
                self.kind(),
                TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict
            ) {
                self.bump();
            }
        }

        let mut inner = None;
        let mut name = None;
        if let Some(s) = self.ident_text() {
            name = Some((s.to_string(), self.span_of(self.pos)));
            self.bump();
        } else if self.at(&TokenKind::LParen)
            && matches!(self.kind_at(1), TokenKind::Star | TokenKind::LParen)
        {
            self.bump();
            inner = Some(Box::new(self.parse_declarator(abstract_ok)?));
            self.expect(&TokenKind::RParen, "')' after declarator")?;
        } else if !abstract_ok {
            return Err(self.error("expected declarator"));
        }

        let mut suffixes = Vec::new();
        loop {
            if self.eat(&TokenKind::LBracket) {
                let size = if self.at(&TokenKind::RBracket) {
                    None
                } else {
                    Some(self.parse_assignment()?)
                };
                self.expect(&TokenKind::RBracket, "']' after array size")?;
                suffixes.push(Suffix::Array(size));
            } else if self.at(&TokenKind::LParen) {
                self.bump();
                let (params, variadic) = self.parse_param_list()?;
                suffixes.push(Suffix::Function(params, variadic));
            } else {
                break;
            }
        }

        Ok(DeclTree { pointers, inner, name, suffixes })
    }

    fn parse_param_list(&mut self) -> Result<(Vec<NodeId>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;

        if self.eat(&TokenKind::RParen) {
            return Ok((params, variadic));
        }
        // `(void)` declares zero parameters.
        if self.at(&TokenKind::Void) && self.kind_at(1) == &TokenKind::RParen {
            self.bump();
            self.bump();
            return Ok((params, variadic));
        }

        loop {
            if self.eat(&TokenKind::Ellipsis) {
                variadic = true;
                break;
            }
            let p_first = self.pos;
            let spec = self.parse_decl_specifiers()?;
            let type_loc = self.ast.add(
                NodeKind::TypeLoc(Box::new(TypeLocData {
                    spec: spec.spec.clone(),
                    derived: Vec::new(),
                })),
                spec.first_tok as u32,
                spec.last_tok as u32,
            );
            let tree = self.parse_declarator(true)?;
            let (derived, name) = flatten_declarator(tree);
            let (name, name_span) = match name {
                Some((n, s)) => (Some(n), s),
                None => (None, self.span_of(p_first)),
            };
            let node = NodeKind::ParamDecl(Box::new(ParamDeclData {
                name,
                name_span,
                type_loc,
                derived,
            }));
            params.push(self.finish(node, p_first));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' after parameters")?;
        Ok((params, variadic))
    }

    /// Parse a type name (for casts and `sizeof`) into a TypeLoc node.
    pub(super) fn parse_type_name(&mut self) -> Result<NodeId> {
        let first = self.pos;
        let spec = self.parse_decl_specifiers()?;
        let tree = self.parse_declarator(true)?;
        let (derived, _) = flatten_declarator(tree);
        let node = NodeKind::TypeLoc(Box::new(TypeLocData { spec: spec.spec, derived }));
        Ok(self.finish(node, first))
    }

    pub(super) fn parse_initializer(&mut self) -> Result<NodeId> {
        if !self.at(&TokenKind::LBrace) {
            return self.parse_assignment();
        }
        let first = self.pos;
        self.bump(); // {
        let mut items = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_end() {
            // Designators are consumed but not modelled; the initializer
            // expression itself is what the analysis aligns against.
            while matches!(self.kind(), TokenKind::Dot | TokenKind::LBracket) {
                if self.eat(&TokenKind::Dot) {
                    self.bump(); // field name
                } else {
                    self.bump(); // [
                    self.parse_conditional()?;
                    self.expect(&TokenKind::RBracket, "']' after designator")?;
                }
            }
            self.eat(&TokenKind::Assign);
            items.push(self.parse_initializer()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after initializer list")?;
        Ok(self.finish(NodeKind::InitList(items), first))
    }
}

/// Flatten a declarator tree into type-application order: pointers, then
/// suffixes outermost-last, then the nested declarator's parts.
fn flatten_declarator(tree: DeclTree) -> (Vec<DerivedDeclarator>, Option<(String, Span)>) {
    let mut derived = Vec::new();
    let mut name = tree.name;
    for _ in 0..tree.pointers {
        derived.push(DerivedDeclarator::Pointer);
    }
    for suffix in tree.suffixes.into_iter().rev() {
        derived.push(match suffix {
            Suffix::Array(size) => DerivedDeclarator::Array(size),
            Suffix::Function(params, variadic) => DerivedDeclarator::Function(params, variadic),
        });
    }
    if let Some(inner) = tree.inner {
        let (inner_derived, inner_name) = flatten_declarator(*inner);
        derived.extend(inner_derived);
        if name.is_none() {
            name = inner_name;
        }
    }
    (derived, name)
}
