use crate::error::{Error, Result};
use crate::types::{NodeId, TypeKind, TypeNode, TypeOffset, TypeRef};
use std::collections::HashMap;

/// All type nodes of one compilation unit, keyed by unit-relative offset.
#[derive(Debug, Default)]
pub struct TypeTable {
    unit_name: String,
    nodes: Vec<TypeNode>,
    index: HashMap<TypeOffset, NodeId>,
}

impl TypeTable {
    pub fn new(unit_name: impl Into<String>) -> Self {
        Self { unit_name: unit_name.into(), nodes: Vec::new(), index: HashMap::new() }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Registers the node for one debug-info entry.
    ///
    /// An offset seen twice means the entry tree is not shaped the way the
    /// loader expects; the whole run stops.
    pub fn insert(&mut self, node: TypeNode) -> Result<NodeId> {
        if self.index.contains_key(&node.offset) {
            return Err(Error::DuplicateOffset {
                unit: self.unit_name.clone(),
                offset: node.offset,
            });
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.offset, id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, offset: TypeOffset) -> Option<NodeId> {
        self.index.get(&offset).copied()
    }

    pub fn node(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TypeNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TypeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// The node a reference points at, whether or not it was rewritten yet.
    pub fn target(&self, r: TypeRef) -> Option<NodeId> {
        match r {
            TypeRef::Node(id) => Some(id),
            TypeRef::Offset(offset) => self.lookup(offset),
        }
    }

    /// Rewrites every offset reference held by `id` into a node handle.
    pub(crate) fn resolve_references(&mut self, id: NodeId) -> Result<()> {
        let Self { nodes, index, .. } = self;
        let node = &mut nodes[id.0];
        let from = node.display_name();
        for r in node.references_mut() {
            if let TypeRef::Offset(offset) = *r {
                let target = index
                    .get(&offset)
                    .copied()
                    .ok_or_else(|| Error::DanglingReference { from: from.clone(), offset })?;
                *r = TypeRef::Node(target);
            }
        }
        Ok(())
    }

    /// Looks through qualifiers (`const`, `volatile`, ...) to the underlying node.
    pub fn strip_qualifiers(&self, mut id: NodeId) -> NodeId {
        while let TypeKind::Qualified(_, Some(target)) = &self.node(id).kind {
            match self.target(*target) {
                Some(next) => id = next,
                None => break,
            }
        }
        id
    }

    /// Size of a referenced node, if it has one.
    pub fn size_of(&self, r: TypeRef) -> Option<u64> {
        self.target(r).and_then(|id| self.node(id).byte_size)
    }

    /// Declared name (or description) of the referenced node.
    pub fn name_of(&self, r: TypeRef) -> String {
        match self.target(r) {
            Some(id) => self.node(id).display_name(),
            None => "<missing>".to_string(),
        }
    }

    /// C spelling of the referenced type, e.g. `double[2][3]` or `const char *`.
    pub fn type_name(&self, r: TypeRef) -> String {
        match self.target(r) {
            Some(id) => self.spell(id),
            None => "<missing>".to_string(),
        }
    }

    pub fn spell(&self, id: NodeId) -> String {
        let node = self.node(id);
        let or_void =
            |r: Option<TypeRef>| r.map_or_else(|| "void".to_string(), |r| self.type_name(r));
        match &node.kind {
            TypeKind::Array(a) => {
                let mut text = self.type_name(a.element);
                for dim in &a.dimensions {
                    match dim {
                        Some(n) => text.push_str(&format!("[{}]", n)),
                        None => text.push_str("[]"),
                    }
                }
                text
            }
            TypeKind::Pointer(p) => format!("{} *", or_void(p.pointee)),
            TypeKind::Qualified(q, inner) => format!("{} {}", q, or_void(*inner)),
            _ => node.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TableBuilder;
    use crate::types::Encoding;

    #[test]
    fn derived_types_are_spelled_like_c() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "double", 8, Encoding::Float);
        b.primitive(0x11, "char", 1, Encoding::Signed);
        b.array(0x18, 0x10, &[Some(2), Some(3)]);
        b.constant(0x20, Some(0x11));
        b.pointer(0x28, 8, Some(0x20));
        b.pointer(0x30, 8, None);
        let table = b.build();
        let spell = |o| table.spell(table.lookup(TypeOffset(o)).unwrap());

        assert_eq!(spell(0x18), "double[2][3]");
        assert_eq!(spell(0x28), "const char *");
        assert_eq!(spell(0x30), "void *");
        assert_eq!(spell(0x10), "double");
    }

    #[test]
    fn duplicate_offset_is_malformed_input() {
        let mut table = TypeTable::new("dup.c");
        let int = TypeKind::Primitive { encoding: Encoding::Signed, size: 4 };
        table.insert(TypeNode::new(TypeOffset(0x10), None, int)).expect("first insert");
        let err = table
            .insert(TypeNode::new(TypeOffset(0x10), None, TypeKind::Unsupported("x".into())))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateOffset { offset: TypeOffset(0x10), .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn resolve_rewrites_offsets_in_place() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.pointer(0x20, 8, Some(0x10));
        let mut table = b.build();

        let ptr = table.lookup(TypeOffset(0x20)).unwrap();
        table.resolve_references(ptr).expect("resolves");

        let TypeKind::Pointer(p) = &table.node(ptr).kind else { panic!("not a pointer") };
        assert_eq!(p.pointee, Some(TypeRef::Node(table.lookup(TypeOffset(0x10)).unwrap())));
    }

    #[test]
    fn dangling_reference_names_the_referrer() {
        let mut b = TableBuilder::new();
        b.typedef(0x10, "broken_t", Some(0x99));
        let mut table = b.build();

        let id = table.lookup(TypeOffset(0x10)).unwrap();
        let err = table.resolve_references(id).unwrap_err();
        assert!(err.to_string().contains("broken_t"));
    }

    #[test]
    fn strip_qualifiers_reaches_base() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.constant(0x20, Some(0x10));
        b.constant(0x30, Some(0x20));
        let table = b.build();

        let outer = table.lookup(TypeOffset(0x30)).unwrap();
        assert_eq!(table.strip_qualifiers(outer), table.lookup(TypeOffset(0x10)).unwrap());
    }
}
