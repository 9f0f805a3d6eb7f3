//! Hand-built unit tables for tests.

use crate::table::TypeTable;
use crate::types::{
    ArrayType, Encoding, EnumType, Member, PointerType, Qualifier, StructType, TypeKind, TypeNode,
    TypeOffset, TypeRef, UnionType,
};

pub struct TableBuilder {
    table: TypeTable,
}

fn at(offset: u64) -> TypeRef {
    TypeRef::Offset(TypeOffset(offset))
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::named("test.c")
    }

    pub fn named(unit: &str) -> Self {
        Self { table: TypeTable::new(unit) }
    }

    fn push(&mut self, offset: u64, name: Option<&str>, kind: TypeKind) -> &mut Self {
        let node = TypeNode::new(TypeOffset(offset), name.map(str::to_string), kind);
        self.table.insert(node).expect("unique test offset");
        self
    }

    pub fn primitive(&mut self, offset: u64, name: &str, size: u64, enc: Encoding) -> &mut Self {
        self.push(offset, Some(name), TypeKind::Primitive { encoding: enc, size })
    }

    /// Members are `(offset, type offset, field name)` in declaration order.
    pub fn structure(
        &mut self,
        offset: u64,
        name: Option<&str>,
        size: u64,
        members: &[(u64, u64, &str)],
    ) -> &mut Self {
        let members =
            members.iter().map(|&(off, ty, field)| Member::new(field, off, at(ty))).collect();
        self.push(offset, name, TypeKind::Struct(StructType { declared_size: Some(size), members }))
    }

    pub fn raw_struct(&mut self, offset: u64, name: Option<&str>, ty: StructType) -> &mut Self {
        self.push(offset, name, TypeKind::Struct(ty))
    }

    pub fn array(&mut self, offset: u64, element: u64, dims: &[Option<u64>]) -> &mut Self {
        let ty = ArrayType { element: at(element), dimensions: dims.to_vec() };
        self.push(offset, None, TypeKind::Array(ty))
    }

    pub fn typedef(&mut self, offset: u64, name: &str, target: Option<u64>) -> &mut Self {
        self.push(offset, Some(name), TypeKind::Typedef(target.map(at)))
    }

    pub fn pointer(&mut self, offset: u64, size: u64, pointee: Option<u64>) -> &mut Self {
        let ty = PointerType { size, pointee: pointee.map(at) };
        self.push(offset, None, TypeKind::Pointer(ty))
    }

    pub fn constant(&mut self, offset: u64, target: Option<u64>) -> &mut Self {
        self.push(offset, None, TypeKind::Qualified(Qualifier::Const, target.map(at)))
    }

    pub fn enumeration(
        &mut self,
        offset: u64,
        name: Option<&str>,
        underlying: u64,
        literals: &[(&str, i64)],
    ) -> &mut Self {
        let ty = EnumType {
            literals: literals.iter().map(|&(n, v)| (n.to_string(), v)).collect(),
            underlying: Some(at(underlying)),
            declared_size: None,
        };
        self.push(offset, name, TypeKind::Enum(ty))
    }

    pub fn union(
        &mut self,
        offset: u64,
        name: Option<&str>,
        size: u64,
        variants: &[(&str, u64)],
    ) -> &mut Self {
        let ty = UnionType {
            declared_size: Some(size),
            variants: variants.iter().map(|&(n, ty)| (n.to_string(), at(ty))).collect(),
        };
        self.push(offset, name, TypeKind::Union(ty))
    }

    pub fn unsupported(&mut self, offset: u64, tag: &str) -> &mut Self {
        self.push(offset, None, TypeKind::Unsupported(tag.to_string()))
    }

    pub fn build(self) -> TypeTable {
        self.table
    }
}

/// A unit defining `Point { int32 x @0; int32 y @4 }` (size 8) at offset 0x30.
pub fn point_unit(unit: &str) -> TypeTable {
    let mut b = TableBuilder::named(unit);
    b.primitive(0x10, "int", 4, Encoding::Signed);
    b.structure(0x30, Some("Point"), 8, &[(0, 0x10, "x"), (4, 0x10, "y")]);
    b.build()
}
