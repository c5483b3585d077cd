//! AST node definitions.
//!
//! Nodes live in one flat arena indexed by [`NodeId`]; child references are
//! ids, enabling identity sets over nodes, BFS subtree walks, and parent
//! chains: the operations the expansion-to-AST analysis is built from.
//! Every node records the token-index range it was parsed from; those
//! indices point into the preprocessed token stream, which is where
//! spelling and expansion provenance live.

use crate::common::source::Span;

/// Index of a node in the [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Coarse classification used by the alignment matcher and the report's
/// `ASTKind` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Expr,
    Stmt,
    Decl,
    TypeLoc,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    BitNot,
    LogicalNot,
    PreInc,
    PreDec,
}

/// Postfix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    PostInc,
    PostDec,
}

/// Syntactic type specifiers, before sema turns them into `CType`s.
#[derive(Debug, Clone)]
pub enum TypeSpecifier {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    /// Struct reference or definition: tag name, RecordDecl node when the
    /// fields are written here.
    Struct(Option<String>, Option<NodeId>),
    Union(Option<String>, Option<NodeId>),
    /// Enum reference or definition: tag name, EnumDecl node when the
    /// enumerator list is written here.
    Enum(Option<String>, Option<NodeId>),
    TypedefName(String),
}

/// Derived parts of a declarator in type-application order: folding the
/// specifier type through this list left to right yields the declared type.
#[derive(Debug, Clone)]
pub enum DerivedDeclarator {
    Pointer,
    Array(Option<NodeId>),
    /// Function suffix: ParamDecl nodes and variadic flag.
    Function(Vec<NodeId>, bool),
}

#[derive(Debug, Clone)]
pub struct VarDeclData {
    pub name: String,
    pub name_span: Span,
    pub type_loc: NodeId,
    /// True for the declarator that carries the shared specifier TypeLoc as
    /// its child (`int a, b;` has one TypeLoc under the first declarator).
    pub owns_type_loc: bool,
    pub derived: Vec<DerivedDeclarator>,
    pub init: Option<NodeId>,
    pub is_static: bool,
    pub is_extern: bool,
    /// Declared at block scope.
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct ParamDeclData {
    pub name: Option<String>,
    pub name_span: Span,
    pub type_loc: NodeId,
    pub derived: Vec<DerivedDeclarator>,
}

#[derive(Debug, Clone)]
pub struct FunctionDeclData {
    pub name: String,
    pub name_span: Span,
    pub type_loc: NodeId,
    pub owns_type_loc: bool,
    /// Derived parts of the return type (pointers), after the Function
    /// suffix itself.
    pub return_derived: Vec<DerivedDeclarator>,
    pub params: Vec<NodeId>,
    pub variadic: bool,
    pub body: Option<NodeId>,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct TypedefDeclData {
    pub name: String,
    pub name_span: Span,
    pub type_loc: NodeId,
    pub owns_type_loc: bool,
    pub derived: Vec<DerivedDeclarator>,
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct RecordDeclData {
    pub is_union: bool,
    pub name: Option<String>,
    pub name_span: Span,
    pub fields: Vec<NodeId>,
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct FieldDeclData {
    pub name: Option<String>,
    pub name_span: Span,
    pub type_loc: NodeId,
    pub owns_type_loc: bool,
    pub derived: Vec<DerivedDeclarator>,
    pub bit_width: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct EnumDeclData {
    pub name: Option<String>,
    pub name_span: Span,
    pub enumerators: Vec<NodeId>,
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct EnumConstantDeclData {
    pub name: String,
    pub name_span: Span,
    pub init: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct TypeLocData {
    pub spec: TypeSpecifier,
    /// Abstract-declarator parts for type names in casts and `sizeof`.
    pub derived: Vec<DerivedDeclarator>,
}

/// The core enum defining all AST node kinds. Child references are
/// [`NodeId`]s into the flat arena.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // Expressions
    IntLiteral(i64),
    UIntLiteral(u64),
    FloatLiteral(f64),
    StringLiteral(String),
    CharLiteral(char),
    DeclRef(String),
    Paren(NodeId),
    BinaryOp(BinOp, NodeId, NodeId),
    UnaryOp(UnaryOp, NodeId),
    PostfixOp(PostfixOp, NodeId),
    Assign(NodeId, NodeId),
    CompoundAssign(BinOp, NodeId, NodeId),
    Conditional(NodeId, NodeId, NodeId),
    Call(NodeId, Vec<NodeId>),
    Index(NodeId, NodeId),
    Member(NodeId, String),
    ArrowMember(NodeId, String),
    Cast(NodeId, NodeId),
    SizeofExpr(NodeId),
    SizeofType(NodeId),
    AddressOf(NodeId),
    Deref(NodeId),
    Comma(NodeId, NodeId),
    InitList(Vec<NodeId>),

    // Statements
    ExprStmt(Option<NodeId>),
    Compound(Vec<NodeId>),
    If(NodeId, NodeId, Option<NodeId>),
    While(NodeId, NodeId),
    DoWhile(NodeId, NodeId),
    For(Option<NodeId>, Option<NodeId>, Option<NodeId>, NodeId),
    Switch(NodeId, NodeId),
    Case(NodeId, NodeId),
    Default(NodeId),
    Break,
    Continue,
    Goto(String),
    Label(String, NodeId),
    Return(Option<NodeId>),
    DeclStmt(Vec<NodeId>),

    // Declarations
    VarDecl(Box<VarDeclData>),
    ParamDecl(Box<ParamDeclData>),
    FunctionDecl(Box<FunctionDeclData>),
    TypedefDecl(Box<TypedefDeclData>),
    RecordDecl(RecordDeclData),
    FieldDecl(Box<FieldDeclData>),
    EnumDecl(EnumDeclData),
    EnumConstantDecl(Box<EnumConstantDeclData>),

    // Type locations
    TypeLoc(Box<TypeLocData>),
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        use NodeKind::*;
        match self {
            IntLiteral(..) | UIntLiteral(..) | FloatLiteral(..) | StringLiteral(..)
            | CharLiteral(..) | DeclRef(..) | Paren(..) | BinaryOp(..) | UnaryOp(..)
            | PostfixOp(..) | Assign(..) | CompoundAssign(..) | Conditional(..) | Call(..)
            | Index(..) | Member(..) | ArrowMember(..) | Cast(..) | SizeofExpr(..)
            | SizeofType(..) | AddressOf(..) | Deref(..) | Comma(..) | InitList(..) => {
                NodeClass::Expr
            }
            ExprStmt(..) | Compound(..) | If(..) | While(..) | DoWhile(..) | For(..)
            | Switch(..) | Case(..) | Default(..) | Break | Continue | Goto(..) | Label(..)
            | Return(..) | DeclStmt(..) => NodeClass::Stmt,
            VarDecl(..) | ParamDecl(..) | FunctionDecl(..) | TypedefDecl(..) | RecordDecl(..)
            | FieldDecl(..) | EnumDecl(..) | EnumConstantDecl(..) => NodeClass::Decl,
            TypeLoc(..) => NodeClass::TypeLoc,
        }
    }

    pub fn is_expr(&self) -> bool {
        self.class() == NodeClass::Expr
    }

    pub fn is_decl(&self) -> bool {
        self.class() == NodeClass::Decl
    }
}

/// One node of the arena: kind, parent back-reference, and the token-index
/// range it covers in the preprocessed stream.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub first_tok: u32,
    pub last_tok: u32,
}

/// A complete translation unit as a flat node arena.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    /// Top-level declarations in source order.
    pub top_level: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), top_level: Vec::new() }
    }

    pub fn add(&mut self, kind: NodeKind, first_tok: u32, last_tok: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, parent: None, first_tok, last_tok });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Append `id`'s direct children to `out`.
    ///
    /// TypeLoc children appear only under the declarator that owns the
    /// written specifier, so shared specifiers (`int a, b;`) keep a single
    /// parent.
    pub fn children_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        use NodeKind::*;
        let derived_children = |derived: &[DerivedDeclarator], out: &mut Vec<NodeId>| {
            for d in derived {
                match d {
                    DerivedDeclarator::Array(Some(size)) => out.push(*size),
                    DerivedDeclarator::Function(params, _) => out.extend(params.iter().copied()),
                    _ => {}
                }
            }
        };
        match &self.node(id).kind {
            IntLiteral(..) | UIntLiteral(..) | FloatLiteral(..) | StringLiteral(..)
            | CharLiteral(..) | DeclRef(..) | Break | Continue | Goto(..) => {}
            TypeLoc(d) => derived_children(&d.derived, out),
            Paren(a) | UnaryOp(_, a) | PostfixOp(_, a) | SizeofExpr(a) | SizeofType(a)
            | AddressOf(a) | Deref(a) | Default(a) | Label(_, a) => out.push(*a),
            BinaryOp(_, a, b) | Assign(a, b) | CompoundAssign(_, a, b) | Comma(a, b)
            | Index(a, b) | Cast(a, b) | While(a, b) | DoWhile(a, b) | Switch(a, b)
            | Case(a, b) => {
                out.push(*a);
                out.push(*b);
            }
            Member(a, _) | ArrowMember(a, _) => out.push(*a),
            Conditional(a, b, c) => {
                out.push(*a);
                out.push(*b);
                out.push(*c);
            }
            Call(f, args) => {
                out.push(*f);
                out.extend(args.iter().copied());
            }
            InitList(items) | Compound(items) | DeclStmt(items) => {
                out.extend(items.iter().copied());
            }
            ExprStmt(e) | Return(e) => out.extend(e.iter().copied()),
            If(c, t, e) => {
                out.push(*c);
                out.push(*t);
                out.extend(e.iter().copied());
            }
            For(init, cond, step, body) => {
                out.extend(init.iter().copied());
                out.extend(cond.iter().copied());
                out.extend(step.iter().copied());
                out.push(*body);
            }
            VarDecl(d) => {
                if d.owns_type_loc {
                    out.push(d.type_loc);
                }
                derived_children(&d.derived, out);
                out.extend(d.init.iter().copied());
            }
            ParamDecl(d) => {
                out.push(d.type_loc);
                derived_children(&d.derived, out);
            }
            FunctionDecl(d) => {
                if d.owns_type_loc {
                    out.push(d.type_loc);
                }
                derived_children(&d.return_derived, out);
                out.extend(d.params.iter().copied());
                out.extend(d.body.iter().copied());
            }
            TypedefDecl(d) => {
                if d.owns_type_loc {
                    out.push(d.type_loc);
                }
                derived_children(&d.derived, out);
            }
            RecordDecl(d) => out.extend(d.fields.iter().copied()),
            FieldDecl(d) => {
                if d.owns_type_loc {
                    out.push(d.type_loc);
                }
                derived_children(&d.derived, out);
                out.extend(d.bit_width.iter().copied());
            }
            EnumDecl(d) => out.extend(d.enumerators.iter().copied()),
            EnumConstantDecl(d) => out.extend(d.init.iter().copied()),
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.children_into(id, &mut out);
        out
    }

    /// Fill in parent back-references from the child edges. Called once
    /// after parsing; nodes referenced by more than one declarator (shared
    /// TypeLocs) keep the owning declarator as parent.
    pub fn fixup_parents(&mut self) {
        let mut edges: Vec<(NodeId, NodeId)> = Vec::with_capacity(self.nodes.len());
        let mut buf = Vec::new();
        for id in self.ids() {
            buf.clear();
            self.children_into(id, &mut buf);
            for &child in &buf {
                edges.push((child, id));
            }
        }
        for (child, parent) in edges {
            self.node_mut(child).parent = Some(parent);
        }
    }

    /// Collect all nodes of `root`'s subtree (root included) using BFS.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            let cur = out[i];
            i += 1;
            self.children_into(cur, &mut out);
        }
        out
    }

    /// True if `needle` is inside `root`'s subtree (BFS, not lexical
    /// containment).
    pub fn in_tree(&self, needle: NodeId, root: NodeId) -> bool {
        let mut queue = vec![root];
        let mut i = 0;
        while i < queue.len() {
            if queue[i] == needle {
                return true;
            }
            let cur = queue[i];
            i += 1;
            self.children_into(cur, &mut queue);
        }
        false
    }
}
