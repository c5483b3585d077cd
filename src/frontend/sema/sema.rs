//! Semantic analysis: scope-aware declaration processing.
//!
//! One walk over the AST in source order builds the type-declaration table
//! (tags and typedefs with their locations and contexts), declared types,
//! enum constant values, and declaration-reference resolution. Expression
//! typing runs afterwards as a bottom-up pass over the arena
//! (see `type_checker.rs`); resolution is the only scope-dependent part.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::common::source::{SourceManager, Span};
use crate::common::types::{
    CType, FunctionType, TypeDeclId, TypeDeclInfo, TypeDeclKind, TypeDeclTable,
};
use crate::frontend::parser::ast::{DerivedDeclarator, NodeKind, TypeSpecifier};
use crate::frontend::parser::{Ast, NodeId};
use crate::frontend::preprocessor::PpToken;

use super::const_eval;
use super::type_checker;

/// Results of semantic analysis, borrowed by the expansion analysis.
#[derive(Debug, Default)]
pub struct Sema {
    pub type_decls: TypeDeclTable,
    /// Struct/union member lists, for member-access typing.
    pub record_fields: FxHashMap<TypeDeclId, Vec<(Option<String>, CType)>>,
    /// Static type of each expression node that has one.
    pub expr_types: FxHashMap<NodeId, CType>,
    /// Type written by each TypeLoc node (specifier plus abstract parts).
    pub typeloc_types: FxHashMap<NodeId, CType>,
    /// Declared type of each value declaration (vars, params, functions,
    /// enum constants).
    pub decl_types: FxHashMap<NodeId, CType>,
    /// DeclRef expression -> the declaration it names.
    pub resolved_refs: FxHashMap<NodeId, NodeId>,
    /// EnumConstantDecl -> value.
    pub enum_values: FxHashMap<NodeId, i64>,
    /// Every declared name in the translation unit.
    pub decl_names: FxHashSet<String>,
}

impl Sema {
    /// The type a declaration binds its name to.
    pub fn decl_type(&self, decl: NodeId) -> Option<&CType> {
        self.decl_types.get(&decl)
    }
}

/// Run semantic analysis over a parsed translation unit.
pub fn run(ast: &Ast, toks: &[PpToken], sm: &SourceManager) -> Sema {
    let mut walker = Walker {
        ast,
        toks,
        _sm: sm,
        out: Sema::default(),
        value_scopes: vec![FxHashMap::default()],
        tag_scopes: vec![FxHashMap::default()],
        typedef_scopes: vec![FxHashMap::default()],
        record_ids: FxHashMap::default(),
        enum_ids: FxHashMap::default(),
        typedef_underlying: FxHashMap::default(),
    };
    for &decl in &ast.top_level {
        walker.walk_decl(decl);
    }
    let mut out = walker.out;
    type_checker::infer_types(ast, &mut out);
    out
}

struct Walker<'a> {
    ast: &'a Ast,
    toks: &'a [PpToken],
    _sm: &'a SourceManager,
    out: Sema,
    value_scopes: Vec<FxHashMap<String, NodeId>>,
    tag_scopes: Vec<FxHashMap<String, TypeDeclId>>,
    typedef_scopes: Vec<FxHashMap<String, TypeDeclId>>,
    /// RecordDecl / EnumDecl node -> registered table entry, so repeated
    /// TypeLoc references reuse one entry.
    record_ids: FxHashMap<NodeId, TypeDeclId>,
    enum_ids: FxHashMap<NodeId, TypeDeclId>,
    /// Typedef table entry -> underlying type.
    typedef_underlying: FxHashMap<TypeDeclId, CType>,
}

impl<'a> Walker<'a> {
    fn push_scopes(&mut self) {
        self.value_scopes.push(FxHashMap::default());
        self.tag_scopes.push(FxHashMap::default());
        self.typedef_scopes.push(FxHashMap::default());
    }

    fn pop_scopes(&mut self) {
        self.value_scopes.pop();
        self.tag_scopes.pop();
        self.typedef_scopes.pop();
    }

    fn in_block(&self) -> bool {
        self.value_scopes.len() > 1
    }

    fn declare_value(&mut self, name: &str, decl: NodeId) {
        self.out.decl_names.insert(name.to_string());
        if let Some(scope) = self.value_scopes.last_mut() {
            scope.insert(name.to_string(), decl);
        }
    }

    fn lookup_value(&self, name: &str) -> Option<NodeId> {
        self.value_scopes.iter().rev().find_map(|s| s.get(name)).copied()
    }

    fn lookup_tag(&self, name: &str) -> Option<TypeDeclId> {
        self.tag_scopes.iter().rev().find_map(|s| s.get(name)).copied()
    }

    fn lookup_typedef(&self, name: &str) -> Option<TypeDeclId> {
        self.typedef_scopes.iter().rev().find_map(|s| s.get(name)).copied()
    }

    /// File-level location of a declaration's name token. The stored
    /// name span is a spelling span; declared-after comparisons need the
    /// translation-unit-ordered file location instead.
    fn name_file_span(&self, node: NodeId, name_span: Span) -> Span {
        let n = self.ast.node(node);
        let first = n.first_tok as usize;
        let last = (n.last_tok as usize).min(self.toks.len().saturating_sub(1));
        for t in &self.toks[first..=last.max(first)] {
            if t.tok.span == name_span {
                return t.file_span();
            }
        }
        name_span
    }

    // ---- declarations ----------------------------------------------------

    fn walk_decl(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::VarDecl(d) => {
                let ty = self.build_type(d.type_loc, &d.derived);
                self.out.decl_types.insert(id, ty);
                self.declare_value(&d.name, id);
                if let Some(init) = d.init {
                    self.walk_expr(init);
                }
            }
            NodeKind::FunctionDecl(d) => {
                let ret = self.build_type(d.type_loc, &d.return_derived);
                let params: Vec<CType> =
                    d.params.iter().map(|&p| self.ensure_param(p)).collect();
                let fn_ty = CType::Function(Box::new(FunctionType {
                    return_type: ret,
                    params,
                    variadic: d.variadic,
                }));
                self.out.decl_types.insert(id, fn_ty);
                self.declare_value(&d.name, id);
                if let Some(body) = d.body {
                    self.push_scopes();
                    for &p in &d.params {
                        if let NodeKind::ParamDecl(pd) = &self.ast.node(p).kind {
                            if let Some(name) = pd.name.clone() {
                                self.declare_value(&name, p);
                            }
                        }
                    }
                    self.walk_stmt(body);
                    self.pop_scopes();
                }
            }
            NodeKind::TypedefDecl(d) => {
                let ty = self.build_type(d.type_loc, &d.derived);
                let loc = self.name_file_span(id, d.name_span);
                let tid = self.out.type_decls.add(TypeDeclInfo {
                    kind: TypeDeclKind::Typedef,
                    name: Some(d.name.clone()),
                    name_loc: loc,
                    is_local: d.is_local,
                    size: ty.size_of(&self.out.type_decls).unwrap_or(0),
                });
                self.out.decl_names.insert(d.name.clone());
                self.typedef_underlying.insert(tid, ty.clone());
                self.out.decl_types.insert(id, CType::Typedef(tid, Box::new(ty)));
                if let Some(scope) = self.typedef_scopes.last_mut() {
                    scope.insert(d.name.clone(), tid);
                }
            }
            NodeKind::RecordDecl(_) => {
                self.ensure_record(id);
            }
            NodeKind::EnumDecl(_) => {
                self.ensure_enum(id);
            }
            NodeKind::ParamDecl(_) => {
                self.ensure_param(id);
            }
            _ => {}
        }
    }

    /// Build (and cache) a parameter's declared type, with array and
    /// function types decaying to pointers.
    fn ensure_param(&mut self, id: NodeId) -> CType {
        if let Some(ty) = self.out.decl_types.get(&id) {
            return ty.clone();
        }
        let NodeKind::ParamDecl(d) = self.ast.node(id).kind.clone() else {
            return CType::Int;
        };
        let ty = self.build_type(d.type_loc, &d.derived);
        let ty = match ty.desugared() {
            CType::Array(elem, _) => CType::Pointer(elem.clone()),
            CType::Function(_) => CType::Pointer(Box::new(ty.clone())),
            _ => ty,
        };
        self.out.decl_types.insert(id, ty.clone());
        if let Some(name) = &d.name {
            self.out.decl_names.insert(name.clone());
        }
        ty
    }

    fn ensure_record(&mut self, rec: NodeId) -> TypeDeclId {
        if let Some(&tid) = self.record_ids.get(&rec) {
            return tid;
        }
        let NodeKind::RecordDecl(d) = self.ast.node(rec).kind.clone() else {
            unreachable!("ensure_record on non-record node");
        };
        let loc = self.name_file_span(rec, d.name_span);
        let tid = self.out.type_decls.add(TypeDeclInfo {
            kind: if d.is_union { TypeDeclKind::Union } else { TypeDeclKind::Struct },
            name: d.name.clone(),
            name_loc: loc,
            is_local: d.is_local,
            size: 0,
        });
        self.record_ids.insert(rec, tid);
        if let Some(name) = &d.name {
            self.out.decl_names.insert(name.clone());
            if let Some(scope) = self.tag_scopes.last_mut() {
                scope.insert(name.clone(), tid);
            }
        }

        // Fields come after the entry exists so self-referential structs
        // resolve their own tag.
        let mut fields = Vec::with_capacity(d.fields.len());
        for &f in &d.fields {
            let NodeKind::FieldDecl(fd) = self.ast.node(f).kind.clone() else { continue };
            let ty = self.build_type(fd.type_loc, &fd.derived);
            if let Some(width) = fd.bit_width {
                self.walk_expr(width);
            }
            if let Some(name) = &fd.name {
                self.out.decl_names.insert(name.clone());
            }
            fields.push((fd.name.clone(), ty));
        }
        let size = self.layout_size(&fields, d.is_union);
        self.out.record_fields.insert(tid, fields);
        self.out.type_decls.get_mut(tid).size = size;
        tid
    }

    fn ensure_enum(&mut self, en: NodeId) -> TypeDeclId {
        if let Some(&tid) = self.enum_ids.get(&en) {
            return tid;
        }
        let NodeKind::EnumDecl(d) = self.ast.node(en).kind.clone() else {
            unreachable!("ensure_enum on non-enum node");
        };
        let loc = self.name_file_span(en, d.name_span);
        let tid = self.out.type_decls.add(TypeDeclInfo {
            kind: TypeDeclKind::Enum,
            name: d.name.clone(),
            name_loc: loc,
            is_local: d.is_local,
            size: 4,
        });
        self.enum_ids.insert(en, tid);
        if let Some(name) = &d.name {
            self.out.decl_names.insert(name.clone());
            if let Some(scope) = self.tag_scopes.last_mut() {
                scope.insert(name.clone(), tid);
            }
        }

        let mut next = 0i64;
        for &e in &d.enumerators {
            let NodeKind::EnumConstantDecl(ed) = self.ast.node(e).kind.clone() else { continue };
            if let Some(init) = ed.init {
                self.walk_expr(init);
                if let Some(v) = const_eval::eval_ice(self.ast, &self.out, init) {
                    next = v;
                }
            }
            self.out.enum_values.insert(e, next);
            next = next.wrapping_add(1);
            self.out.decl_types.insert(e, CType::Int);
            self.declare_value(&ed.name, e);
        }
        tid
    }

    /// Naive layout for `sizeof` support: aligned struct sum or union max.
    fn layout_size(&self, fields: &[(Option<String>, CType)], is_union: bool) -> u64 {
        let mut size = 0u64;
        let mut max_align = 1u64;
        for (_, ty) in fields {
            let fsize = ty.size_of(&self.out.type_decls).unwrap_or(0);
            let align = self.align_of(ty).max(1);
            max_align = max_align.max(align);
            if is_union {
                size = size.max(fsize);
            } else {
                size = size.div_ceil(align) * align + fsize;
            }
        }
        if size == 0 {
            return 0;
        }
        size.div_ceil(max_align) * max_align
    }

    fn align_of(&self, ty: &CType) -> u64 {
        match ty.desugared() {
            CType::Array(elem, _) => self.align_of(elem),
            CType::Struct(id) | CType::Union(id) => self
                .out
                .record_fields
                .get(id)
                .map(|fs| fs.iter().map(|(_, t)| self.align_of(t)).max().unwrap_or(1))
                .unwrap_or(8),
            other => other.size_of(&self.out.type_decls).unwrap_or(8).min(8),
        }
    }

    // ---- types -----------------------------------------------------------

    /// The type written by a TypeLoc node, including its abstract parts.
    fn build_typeloc(&mut self, tl: NodeId) -> CType {
        if let Some(ty) = self.out.typeloc_types.get(&tl) {
            return ty.clone();
        }
        let NodeKind::TypeLoc(d) = self.ast.node(tl).kind.clone() else {
            return CType::Int;
        };
        let base = self.spec_type(&d.spec);
        let ty = self.fold_derived(base, &d.derived);
        self.out.typeloc_types.insert(tl, ty.clone());
        ty
    }

    /// A declarator's full type: the written specifier folded through the
    /// declarator's derived parts.
    fn build_type(&mut self, type_loc: NodeId, derived: &[DerivedDeclarator]) -> CType {
        let base = self.build_typeloc(type_loc);
        self.fold_derived(base, derived)
    }

    fn fold_derived(&mut self, mut ty: CType, derived: &[DerivedDeclarator]) -> CType {
        for d in derived {
            ty = match d {
                DerivedDeclarator::Pointer => CType::Pointer(Box::new(ty)),
                DerivedDeclarator::Array(size) => {
                    let mut n = None;
                    if let Some(s) = *size {
                        self.walk_expr(s);
                        n = const_eval::eval_ice(self.ast, &self.out, s);
                    }
                    CType::Array(Box::new(ty), n.map(|v| v.max(0) as u64))
                }
                DerivedDeclarator::Function(params, variadic) => {
                    let param_types: Vec<CType> =
                        params.iter().map(|&p| self.ensure_param(p)).collect();
                    CType::Function(Box::new(FunctionType {
                        return_type: ty,
                        params: param_types,
                        variadic: *variadic,
                    }))
                }
            };
        }
        ty
    }

    fn spec_type(&mut self, spec: &TypeSpecifier) -> CType {
        match spec {
            TypeSpecifier::Void => CType::Void,
            TypeSpecifier::Bool => CType::Bool,
            TypeSpecifier::Char | TypeSpecifier::SChar => CType::Char,
            TypeSpecifier::UChar => CType::UChar,
            TypeSpecifier::Short => CType::Short,
            TypeSpecifier::UShort => CType::UShort,
            TypeSpecifier::Int => CType::Int,
            TypeSpecifier::UInt => CType::UInt,
            TypeSpecifier::Long => CType::Long,
            TypeSpecifier::ULong => CType::ULong,
            TypeSpecifier::LongLong => CType::LongLong,
            TypeSpecifier::ULongLong => CType::ULongLong,
            TypeSpecifier::Float => CType::Float,
            TypeSpecifier::Double => CType::Double,
            TypeSpecifier::Struct(name, def) | TypeSpecifier::Union(name, def) => {
                let is_union = matches!(spec, TypeSpecifier::Union(..));
                let tid = match def {
                    Some(rec) => self.ensure_record(*rec),
                    None => match name.as_deref().and_then(|n| self.lookup_tag(n)) {
                        Some(tid) => tid,
                        None => self.forward_tag(
                            name.clone(),
                            if is_union { TypeDeclKind::Union } else { TypeDeclKind::Struct },
                        ),
                    },
                };
                if is_union {
                    CType::Union(tid)
                } else {
                    CType::Struct(tid)
                }
            }
            TypeSpecifier::Enum(name, def) => {
                let tid = match def {
                    Some(en) => self.ensure_enum(*en),
                    None => match name.as_deref().and_then(|n| self.lookup_tag(n)) {
                        Some(tid) => tid,
                        None => self.forward_tag(name.clone(), TypeDeclKind::Enum),
                    },
                };
                CType::Enum(tid)
            }
            TypeSpecifier::TypedefName(name) => match self.lookup_typedef(name) {
                Some(tid) => {
                    let underlying =
                        self.typedef_underlying.get(&tid).cloned().unwrap_or(CType::Int);
                    CType::Typedef(tid, Box::new(underlying))
                }
                None => CType::Int,
            },
        }
    }

    /// An implicit forward tag reference: `struct foo *p;` with no prior
    /// declaration of `foo`.
    fn forward_tag(&mut self, name: Option<String>, kind: TypeDeclKind) -> TypeDeclId {
        let tid = self.out.type_decls.add(TypeDeclInfo {
            kind,
            name: name.clone(),
            name_loc: Span::invalid(),
            is_local: self.in_block(),
            size: if kind == TypeDeclKind::Enum { 4 } else { 0 },
        });
        if let Some(name) = name {
            self.out.decl_names.insert(name.clone());
            if let Some(scope) = self.tag_scopes.last_mut() {
                scope.insert(name, tid);
            }
        }
        tid
    }

    // ---- statements and expressions -------------------------------------

    fn walk_stmt(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::Compound(items) => {
                self.push_scopes();
                for item in items {
                    self.walk_stmt(item);
                }
                self.pop_scopes();
            }
            NodeKind::DeclStmt(decls) => {
                for d in decls {
                    self.walk_decl(d);
                }
            }
            NodeKind::ExprStmt(e) => {
                if let Some(e) = e {
                    self.walk_expr(e);
                }
            }
            NodeKind::If(c, t, e) => {
                self.walk_expr(c);
                self.walk_stmt(t);
                if let Some(e) = e {
                    self.walk_stmt(e);
                }
            }
            NodeKind::While(c, b) => {
                self.walk_expr(c);
                self.walk_stmt(b);
            }
            NodeKind::DoWhile(b, c) => {
                self.walk_stmt(b);
                self.walk_expr(c);
            }
            NodeKind::For(init, cond, step, body) => {
                self.push_scopes();
                if let Some(init) = init {
                    match self.ast.node(init).kind.class() {
                        crate::frontend::parser::NodeClass::Stmt => self.walk_stmt(init),
                        _ => self.walk_expr(init),
                    }
                }
                if let Some(c) = cond {
                    self.walk_expr(c);
                }
                if let Some(s) = step {
                    self.walk_expr(s);
                }
                self.walk_stmt(body);
                self.pop_scopes();
            }
            NodeKind::Switch(c, b) => {
                self.walk_expr(c);
                self.walk_stmt(b);
            }
            NodeKind::Case(v, s) => {
                self.walk_expr(v);
                self.walk_stmt(s);
            }
            NodeKind::Default(s) | NodeKind::Label(_, s) => self.walk_stmt(s),
            NodeKind::Return(e) => {
                if let Some(e) = e {
                    self.walk_expr(e);
                }
            }
            NodeKind::Break | NodeKind::Continue | NodeKind::Goto(_) => {}
            _ => self.walk_expr(id),
        }
    }

    fn walk_expr(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::DeclRef(name) => {
                if let Some(decl) = self.lookup_value(&name) {
                    self.out.resolved_refs.insert(id, decl);
                }
            }
            NodeKind::Cast(tl, e) => {
                self.build_typeloc(tl);
                self.walk_expr(e);
            }
            NodeKind::SizeofType(tl) => {
                self.build_typeloc(tl);
            }
            _ => {
                for child in self.ast.children(id) {
                    match self.ast.node(child).kind.class() {
                        crate::frontend::parser::NodeClass::Expr => self.walk_expr(child),
                        crate::frontend::parser::NodeClass::Stmt => self.walk_stmt(child),
                        crate::frontend::parser::NodeClass::TypeLoc => {
                            self.build_typeloc(child);
                        }
                        crate::frontend::parser::NodeClass::Decl => self.walk_decl(child),
                    }
                }
            }
        }
    }
}
