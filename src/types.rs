use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Offset of a debug-info entry relative to its compilation unit's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeOffset(pub u64);

impl fmt::Display for TypeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<0x{:x}>", self.0)
    }
}

/// Index of a node inside its unit's [`TypeTable`](crate::TypeTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A reference from one type to another.
///
/// Loading produces `Offset` references only. Finalization rewrites every
/// reference it walks into a `Node` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Offset(TypeOffset),
    Node(NodeId),
}

impl TypeRef {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            TypeRef::Node(id) => Some(*id),
            TypeRef::Offset(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Initial,
    InProgress,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u64,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    pub offset: TypeOffset,
    pub name: Option<String>,
    /// Known once `state` is `Finalized` (and `None` for unsized kinds).
    pub byte_size: Option<u64>,
    pub state: Lifecycle,
    /// Where the entry was declared. Diagnostics only, never identity.
    pub location: Option<SourceLocation>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive { encoding: Encoding, size: u64 },
    Struct(StructType),
    Array(ArrayType),
    /// `None` aliases void.
    Typedef(Option<TypeRef>),
    Pointer(PointerType),
    Qualified(Qualifier, Option<TypeRef>),
    Enum(EnumType),
    Union(UnionType),
    /// Any entry kind that is not modeled. The tag is kept for messages.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Signed,
    Unsigned,
    Boolean,
    Float,
}

impl Encoding {
    /// Encoding guess for base types that carry no `DW_AT_encoding`.
    pub fn from_name(name: &str) -> Self {
        if name.contains("float") || name.contains("double") {
            Encoding::Float
        } else if name.contains("unsigned") {
            Encoding::Unsigned
        } else {
            Encoding::Signed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Const,
    Volatile,
    Restrict,
    Atomic,
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Qualifier::Const => "const",
            Qualifier::Volatile => "volatile",
            Qualifier::Restrict => "restrict",
            Qualifier::Atomic => "_Atomic",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructType {
    /// `None` for forward declarations.
    pub declared_size: Option<u64>,
    /// Declaration order, not offset order.
    pub members: Vec<Member>,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub offset: Option<u64>,
    pub ty: TypeRef,
    pub bit_size: Option<u64>,
    pub is_base: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, offset: u64, ty: TypeRef) -> Self {
        Self { name: name.into(), offset: Some(offset), ty, bit_size: None, is_base: false }
    }
}

#[derive(Debug, Clone)]
pub struct ArrayType {
    pub element: TypeRef,
    /// Outermost dimension first. `None` marks a dimension without a bound.
    pub dimensions: Vec<Option<u64>>,
}

#[derive(Debug, Clone)]
pub struct PointerType {
    pub size: u64,
    /// `None` points to void.
    pub pointee: Option<TypeRef>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumType {
    pub literals: IndexMap<String, i64>,
    pub underlying: Option<TypeRef>,
    pub declared_size: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct UnionType {
    pub declared_size: Option<u64>,
    pub variants: IndexMap<String, TypeRef>,
}

impl TypeNode {
    pub fn new(offset: TypeOffset, name: Option<String>, kind: TypeKind) -> Self {
        Self { offset, name, byte_size: None, state: Lifecycle::Initial, location: None, kind }
    }

    pub fn is_finalized(&self) -> bool {
        self.state == Lifecycle::Finalized
    }

    pub fn kind_name(&self) -> &str {
        match &self.kind {
            TypeKind::Primitive { .. } => "primitive",
            TypeKind::Struct(_) => "struct",
            TypeKind::Array(_) => "array",
            TypeKind::Typedef(_) => "typedef",
            TypeKind::Pointer(_) => "pointer",
            TypeKind::Qualified(..) => "qualified type",
            TypeKind::Enum(_) => "enum",
            TypeKind::Union(_) => "union",
            TypeKind::Unsupported(tag) => tag,
        }
    }

    /// Name for diagnostics: the declared name, or a description of the entry.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<anonymous {} at {}>", self.kind_name(), self.offset),
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// References walked (and finalized) before this node can be sized.
    /// Pointees are left out: pointer indirection never requires a sized target.
    pub fn dependencies(&self) -> Vec<TypeRef> {
        match &self.kind {
            TypeKind::Struct(s) => s.members.iter().map(|m| m.ty).collect(),
            TypeKind::Array(a) => vec![a.element],
            TypeKind::Typedef(target) | TypeKind::Qualified(_, target) => {
                target.iter().copied().collect()
            }
            TypeKind::Enum(e) => e.underlying.iter().copied().collect(),
            TypeKind::Union(u) => u.variants.values().copied().collect(),
            TypeKind::Primitive { .. } | TypeKind::Pointer(_) | TypeKind::Unsupported(_) => {
                Vec::new()
            }
        }
    }

    /// Every reference held by this node, pointees included.
    pub(crate) fn references_mut(&mut self) -> Vec<&mut TypeRef> {
        match &mut self.kind {
            TypeKind::Struct(s) => s.members.iter_mut().map(|m| &mut m.ty).collect(),
            TypeKind::Array(a) => vec![&mut a.element],
            TypeKind::Typedef(target) | TypeKind::Qualified(_, target) => {
                target.iter_mut().collect()
            }
            TypeKind::Pointer(p) => p.pointee.iter_mut().collect(),
            TypeKind::Enum(e) => e.underlying.iter_mut().collect(),
            TypeKind::Union(u) => u.variants.values_mut().collect(),
            TypeKind::Primitive { .. } | TypeKind::Unsupported(_) => Vec::new(),
        }
    }
}

/// A gap inside a struct not covered by any member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaddingHole {
    pub offset: u64,
    pub size: u64,
    pub after_member: Option<String>,
    /// Start of the preceding member, for the `spans a:b` wording.
    pub after_member_offset: u64,
    /// `None` for trailing padding.
    pub before_member: Option<String>,
}

impl PaddingHole {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl fmt::Display for PaddingHole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(after) = &self.after_member else {
            let (start, end) = (self.offset, self.end());
            return write!(f, "Padding at start of struct, which spans {}:{}", start, end);
        };
        match &self.before_member {
            Some(before) => write!(
                f,
                "Padding between '{}', which spans {}:{}, and '{}', which starts at {}",
                after,
                self.after_member_offset,
                self.offset,
                before,
                self.end()
            ),
            None => write!(
                f,
                "Trailing padding after member '{}', which spans {}:{}",
                after, self.after_member_offset, self.offset
            ),
        }
    }
}

/// Serializable view of one finalized struct, used by the padding report.
#[derive(Debug, Clone, Serialize)]
pub struct StructLayout {
    pub name: String,
    pub size: u64,
    pub members: Vec<MemberLayout>,
    pub has_padding: bool,
    pub padding_bytes: u64,
    pub padding_holes: Vec<PaddingHole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberLayout {
    pub name: String,
    pub type_name: String,
    pub offset: u64,
    pub size: u64,
}
