use crate::common::source::Span;

/// Identifies a type-introducing declaration (struct/union/enum tag or
/// typedef) in the [`TypeDeclTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDeclId(pub u32);

/// What kind of declaration a [`TypeDeclInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Struct,
    Union,
    Enum,
    Typedef,
}

/// Declaration-side facts about a tag or typedef, recorded by sema.
///
/// The property evaluator needs where a type was declared and in which
/// context, not its layout; layout is reduced to a cached byte size for
/// `sizeof` constant evaluation.
#[derive(Debug, Clone)]
pub struct TypeDeclInfo {
    pub kind: TypeDeclKind,
    /// None for anonymous tags (`struct { ... } x;`).
    pub name: Option<String>,
    /// Location of the tag/typedef name (or of the keyword for anonymous
    /// tags). Invalid for types with no written declaration.
    pub name_loc: Span,
    /// True when the declaring context is not the translation unit, i.e.
    /// the tag was declared inside a function body.
    pub is_local: bool,
    /// Byte size of the completed type; 0 until the definition is seen.
    pub size: u64,
}

/// Table of type-introducing declarations, owned by sema and borrowed by
/// the analysis for the type-descent checks.
#[derive(Debug, Default)]
pub struct TypeDeclTable {
    decls: Vec<TypeDeclInfo>,
}

impl TypeDeclTable {
    pub fn new() -> Self {
        Self { decls: Vec::new() }
    }

    pub fn add(&mut self, info: TypeDeclInfo) -> TypeDeclId {
        let id = TypeDeclId(self.decls.len() as u32);
        self.decls.push(info);
        id
    }

    pub fn get(&self, id: TypeDeclId) -> &TypeDeclInfo {
        &self.decls[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeDeclId) -> &mut TypeDeclInfo {
        &mut self.decls[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDeclInfo> {
        self.decls.iter()
    }
}

/// Represents C types as the analysis sees them.
///
/// Typedefs keep their sugar: the declaration they point at matters for the
/// defined-after and locality checks, while canonical operations look
/// through to the underlying type.
#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Void,
    Bool,
    Char,
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
    Pointer(Box<CType>),
    Array(Box<CType>, Option<u64>),
    Function(Box<FunctionType>),
    Struct(TypeDeclId),
    Union(TypeDeclId),
    Enum(TypeDeclId),
    /// A typedef use: the declaration it names and the underlying type.
    Typedef(TypeDeclId, Box<CType>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub return_type: CType,
    pub params: Vec<CType>,
    pub variadic: bool,
}

impl CType {
    /// Strip typedef sugar down to the underlying type.
    pub fn desugared(&self) -> &CType {
        let mut t = self;
        while let CType::Typedef(_, inner) = t {
            t = inner;
        }
        t
    }

    /// Descent through pointers and arrays: peel layers until a
    /// non-pointer/non-array type is reached. Typedef sugar is kept on the
    /// final layer so its declaration stays inspectable, but is looked
    /// through when deciding whether to keep peeling.
    pub fn peeled(&self) -> &CType {
        let mut t = self;
        loop {
            match t.desugared() {
                CType::Pointer(inner) | CType::Array(inner, _) => t = inner,
                _ => return t,
            }
        }
    }

    /// The type-introducing declaration this type names, if any.
    /// A typedef reports its own declaration, not the underlying tag's,
    /// matching how a written `typedef` name is the thing spelled in source.
    pub fn type_decl(&self) -> Option<TypeDeclId> {
        match self {
            CType::Typedef(id, _) => Some(*id),
            CType::Struct(id) | CType::Union(id) | CType::Enum(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.desugared(), CType::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.desugared(),
            CType::Bool
                | CType::Char
                | CType::UChar
                | CType::Short
                | CType::UShort
                | CType::Int
                | CType::UInt
                | CType::Long
                | CType::ULong
                | CType::LongLong
                | CType::ULongLong
                | CType::Enum(_)
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self.desugared(), CType::Float | CType::Double)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.desugared(), CType::Pointer(_))
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self.desugared(),
            CType::Bool | CType::UChar | CType::UShort | CType::UInt | CType::ULong | CType::ULongLong
        )
    }

    /// Integer promotion: types narrower than int promote to int.
    pub fn integer_promoted(&self) -> CType {
        match self.desugared() {
            CType::Bool | CType::Char | CType::UChar | CType::Short | CType::UShort => CType::Int,
            CType::Enum(_) => CType::Int,
            other => other.clone(),
        }
    }

    /// Conversion rank for the usual arithmetic conversions.
    fn rank(&self) -> u32 {
        match self.desugared() {
            CType::Bool => 0,
            CType::Char | CType::UChar => 1,
            CType::Short | CType::UShort => 2,
            CType::Int | CType::UInt | CType::Enum(_) => 3,
            CType::Long | CType::ULong => 4,
            CType::LongLong | CType::ULongLong => 5,
            _ => 0,
        }
    }

    /// The usual arithmetic conversions, reduced to what integer/float
    /// property derivation needs.
    pub fn usual_arithmetic(lhs: &CType, rhs: &CType) -> CType {
        if matches!(lhs.desugared(), CType::Double) || matches!(rhs.desugared(), CType::Double) {
            return CType::Double;
        }
        if matches!(lhs.desugared(), CType::Float) || matches!(rhs.desugared(), CType::Float) {
            return CType::Float;
        }
        let l = lhs.integer_promoted();
        let r = rhs.integer_promoted();
        let (hi, lo) = if l.rank() >= r.rank() { (l, r) } else { (r, l) };
        if hi.is_unsigned() || !lo.is_unsigned() {
            hi
        } else if lo.rank() == hi.rank() {
            // Same rank, signed vs unsigned: unsigned wins.
            match hi.desugared() {
                CType::Int => CType::UInt,
                CType::Long => CType::ULong,
                CType::LongLong => CType::ULongLong,
                other => other.clone(),
            }
        } else {
            hi
        }
    }

    /// Byte size, for `sizeof` in constant evaluation. LP64 model.
    pub fn size_of(&self, decls: &TypeDeclTable) -> Option<u64> {
        match self.desugared() {
            CType::Void => None,
            CType::Bool | CType::Char | CType::UChar => Some(1),
            CType::Short | CType::UShort => Some(2),
            CType::Int | CType::UInt | CType::Float => Some(4),
            CType::Long | CType::ULong | CType::LongLong | CType::ULongLong | CType::Double => {
                Some(8)
            }
            CType::Pointer(_) => Some(8),
            CType::Array(elem, Some(n)) => elem.size_of(decls).map(|s| s * n),
            CType::Array(_, None) => None,
            CType::Function(_) => None,
            CType::Struct(id) | CType::Union(id) => {
                let size = decls.get(*id).size;
                (size > 0).then_some(size)
            }
            CType::Enum(_) => Some(4),
            CType::Typedef(..) => unreachable!("desugared"),
        }
    }

    /// The desugared, unqualified, canonical textual form used in type
    /// signatures: `int`, `unsigned int`, `int *`, `struct foo`, ...
    pub fn canonical_string(&self, decls: &TypeDeclTable) -> String {
        match self.desugared() {
            CType::Void => "void".to_string(),
            CType::Bool => "_Bool".to_string(),
            CType::Char => "char".to_string(),
            CType::UChar => "unsigned char".to_string(),
            CType::Short => "short".to_string(),
            CType::UShort => "unsigned short".to_string(),
            CType::Int => "int".to_string(),
            CType::UInt => "unsigned int".to_string(),
            CType::Long => "long".to_string(),
            CType::ULong => "unsigned long".to_string(),
            CType::LongLong => "long long".to_string(),
            CType::ULongLong => "unsigned long long".to_string(),
            CType::Float => "float".to_string(),
            CType::Double => "double".to_string(),
            CType::Pointer(inner) => format!("{} *", inner.canonical_string(decls)),
            CType::Array(elem, Some(n)) => {
                format!("{} [{}]", elem.canonical_string(decls), n)
            }
            CType::Array(elem, None) => format!("{} []", elem.canonical_string(decls)),
            CType::Function(f) => {
                let params = f
                    .params
                    .iter()
                    .map(|p| p.canonical_string(decls))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} ({})", f.return_type.canonical_string(decls), params)
            }
            CType::Struct(id) => match &decls.get(*id).name {
                Some(name) => format!("struct {}", name),
                None => "struct (anonymous)".to_string(),
            },
            CType::Union(id) => match &decls.get(*id).name {
                Some(name) => format!("union {}", name),
                None => "union (anonymous)".to_string(),
            },
            CType::Enum(id) => match &decls.get(*id).name {
                Some(name) => format!("enum {}", name),
                None => "enum (anonymous)".to_string(),
            },
            CType::Typedef(..) => unreachable!("desugared"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usual_arithmetic_prefers_wider_and_unsigned() {
        assert_eq!(CType::usual_arithmetic(&CType::Char, &CType::Int), CType::Int);
        assert_eq!(CType::usual_arithmetic(&CType::UInt, &CType::Int), CType::UInt);
        assert_eq!(CType::usual_arithmetic(&CType::Long, &CType::Int), CType::Long);
        assert_eq!(CType::usual_arithmetic(&CType::Float, &CType::Int), CType::Float);
    }

    #[test]
    fn peel_reaches_the_element_type() {
        let t = CType::Pointer(Box::new(CType::Array(Box::new(CType::Int), Some(4))));
        assert_eq!(t.peeled(), &CType::Int);
    }

    #[test]
    fn canonical_strings() {
        let decls = TypeDeclTable::new();
        assert_eq!(CType::UInt.canonical_string(&decls), "unsigned int");
        let p = CType::Pointer(Box::new(CType::Char));
        assert_eq!(p.canonical_string(&decls), "char *");
    }
}
