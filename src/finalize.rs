//! Depth-first finalization of a unit's type graph.
//!
//! Each node is colored by its [`Lifecycle`]: `InProgress` marks nodes on
//! the current DFS stack, so meeting one again means the graph has a cycle
//! that no sized leaf breaks. Finished nodes are appended to an order record,
//! which therefore lists dependencies before their dependents.

use crate::error::{Error, Result};
use crate::table::TypeTable;
use crate::types::{Lifecycle, Member, NodeId, TypeKind};

impl TypeTable {
    /// Finalizes `id` and everything it needs, pushing newly finalized nodes
    /// onto `order`. Returns the node's byte size (`None` for void and
    /// unsupported kinds). Finalizing a finalized node is a no-op.
    pub fn finalize(&mut self, id: NodeId, order: &mut Vec<NodeId>) -> Result<Option<u64>> {
        match self.node(id).state {
            Lifecycle::Finalized => return Ok(self.node(id).byte_size),
            Lifecycle::InProgress => {
                return Err(Error::TypeCycle { name: self.node(id).display_name() });
            }
            Lifecycle::Initial => {}
        }

        self.node_mut(id).state = Lifecycle::InProgress;
        self.resolve_references(id)?;

        for dep in self.node(id).dependencies() {
            if let Some(dep) = dep.node() {
                self.finalize(dep, order)?;
            }
        }

        let size = self.compute_size(id)?;
        let node = self.node_mut(id);
        node.byte_size = size;
        node.state = Lifecycle::Finalized;
        order.push(id);
        log::trace!("finalized {} ({:?} bytes)", self.node(id).display_name(), size);
        Ok(size)
    }

    /// Size of `id` from its already finalized dependencies.
    fn compute_size(&self, id: NodeId) -> Result<Option<u64>> {
        let node = self.node(id);
        let missing = || Error::MissingSize { name: node.display_name() };

        match &node.kind {
            TypeKind::Primitive { size, .. } => Ok(Some(*size)),
            TypeKind::Pointer(p) => Ok(Some(p.size)),
            TypeKind::Struct(s) => {
                let size = s.declared_size.ok_or_else(missing)?;
                for member in &s.members {
                    self.check_member(node.display_name(), member)?;
                }
                Ok(Some(size))
            }
            TypeKind::Array(a) => {
                let element_size =
                    self.size_of(a.element).ok_or_else(|| Error::UnsizedElement {
                        name: node.display_name(),
                        element: self.type_name(a.element),
                    })?;
                let mut size = element_size;
                for dim in &a.dimensions {
                    let count = dim.ok_or_else(|| Error::UnboundedArray {
                        name: self.spell(id),
                    })?;
                    size = size.saturating_mul(count);
                }
                Ok(Some(size))
            }
            TypeKind::Typedef(target) | TypeKind::Qualified(_, target) => {
                Ok(target.and_then(|t| self.size_of(t)))
            }
            TypeKind::Enum(e) => {
                let size = e.underlying.and_then(|t| self.size_of(t)).or(e.declared_size);
                size.map(Some).ok_or_else(missing)
            }
            TypeKind::Union(u) => u.declared_size.map(Some).ok_or_else(missing),
            TypeKind::Unsupported(_) => Ok(None),
        }
    }

    fn check_member(&self, owner: String, member: &Member) -> Result<()> {
        if member.bit_size.is_some() {
            return Err(Error::UnsupportedMember {
                owner,
                member: member.name.clone(),
                reason: "bit-fields are not modeled",
            });
        }
        if member.offset.is_none() {
            return Err(Error::UnsupportedMember {
                owner,
                member: member.name.clone(),
                reason: "member has no byte offset",
            });
        }
        if self.size_of(member.ty).is_none() {
            return Err(Error::UnsizedMember {
                owner,
                member: member.name.clone(),
                type_name: self.name_of(member.ty),
            });
        }
        Ok(())
    }

    /// Finalizes every root in turn, returning the combined dependency order.
    pub fn finalize_all(&mut self, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        for &root in roots {
            self.finalize(root, &mut order)?;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TableBuilder, point_unit};
    use crate::types::{Encoding, StructType, TypeOffset, TypeRef};

    fn id(table: &TypeTable, offset: u64) -> NodeId {
        table.lookup(TypeOffset(offset)).expect("offset registered")
    }

    #[test]
    fn finalize_struct_resolves_members() {
        let mut table = point_unit("a.c");
        let point = id(&table, 0x30);

        let order = table.finalize_all(&[point]).expect("finalizes");

        assert_eq!(order, vec![id(&table, 0x10), point]);
        let node = table.node(point);
        assert!(node.is_finalized());
        assert_eq!(node.byte_size, Some(8));
        let s = node.as_struct().unwrap();
        assert!(s.members.iter().all(|m| matches!(m.ty, TypeRef::Node(_))));
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut table = point_unit("a.c");
        let point = id(&table, 0x30);
        let mut order = Vec::new();

        let first = table.finalize(point, &mut order).unwrap();
        let second = table.finalize(point, &mut order).unwrap();

        assert_eq!(first, Some(8));
        assert_eq!(first, second);
        // Nothing new was finalized by the second call.
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn self_containing_struct_is_a_cycle() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.structure(0x20, Some("Loop"), 8, &[(0, 0x10, "a"), (4, 0x30, "inner")]);
        b.structure(0x30, Some("Inner"), 4, &[(0, 0x20, "back")]);
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x20)]).unwrap_err();
        match err {
            Error::TypeCycle { name } => assert_eq!(name, "Loop"),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn typedef_cycle_is_detected() {
        let mut b = TableBuilder::new();
        b.typedef(0x10, "a_t", Some(0x20));
        b.typedef(0x20, "b_t", Some(0x10));
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x10)]).unwrap_err();
        assert!(matches!(err, Error::TypeCycle { .. }));
    }

    #[test]
    fn pointer_breaks_cycles() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.pointer(0x18, 8, Some(0x20));
        b.structure(0x20, Some("Node"), 16, &[(0, 0x10, "value"), (8, 0x18, "next")]);
        let mut table = b.build();

        let node = id(&table, 0x20);
        let order = table.finalize_all(&[node]).expect("linked list is fine");

        assert_eq!(table.node(node).byte_size, Some(16));
        assert_eq!(order.last(), Some(&node));
    }

    #[test]
    fn array_size_is_product_of_extents() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "short", 2, Encoding::Signed);
        b.array(0x20, 0x10, &[Some(3), Some(4)]);
        let mut table = b.build();

        let arr = id(&table, 0x20);
        table.finalize_all(&[arr]).unwrap();
        assert_eq!(table.node(arr).byte_size, Some(24));
    }

    #[test]
    fn unbounded_array_is_rejected() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "char", 1, Encoding::Signed);
        b.array(0x20, 0x10, &[None]);
        b.structure(0x30, Some("Packet"), 4, &[(0, 0x10, "len"), (1, 0x20, "data")]);
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x30)]).unwrap_err();
        match err {
            Error::UnboundedArray { name } => assert_eq!(name, "char[]"),
            other => panic!("expected unbounded array, got {other}"),
        }
    }

    #[test]
    fn void_typedef_has_no_size() {
        let mut b = TableBuilder::new();
        b.typedef(0x10, "nothing_t", None);
        let mut table = b.build();

        let t = id(&table, 0x10);
        assert_eq!(table.finalize(t, &mut Vec::new()).unwrap(), None);
        assert!(table.node(t).is_finalized());
    }

    #[test]
    fn typedef_const_and_enum_inherit_sizes() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "unsigned int", 4, Encoding::Unsigned);
        b.typedef(0x20, "uint_t", Some(0x10));
        b.constant(0x30, Some(0x20));
        b.enumeration(0x40, Some("Color"), 0x10, &[("RED", 0), ("GREEN", 1)]);
        let mut table = b.build();

        let roots = [id(&table, 0x30), id(&table, 0x40)];
        table.finalize_all(&roots).unwrap();

        for offset in [0x20, 0x30, 0x40] {
            assert_eq!(table.node(id(&table, offset)).byte_size, Some(4));
        }
    }

    #[test]
    fn member_of_unsupported_kind_is_rejected() {
        let mut b = TableBuilder::new();
        b.unsupported(0x10, "DW_TAG_ptr_to_member_type");
        b.structure(0x20, Some("Holder"), 8, &[(0, 0x10, "pm")]);
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x20)]).unwrap_err();
        assert!(matches!(err, Error::UnsizedMember { ref member, .. } if member == "pm"));
    }

    #[test]
    fn bitfield_member_is_rejected() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "unsigned int", 4, Encoding::Unsigned);
        let mut flags = Member::new("flags", 0, TypeRef::Offset(TypeOffset(0x10)));
        flags.bit_size = Some(3);
        b.raw_struct(
            0x20,
            Some("Bits"),
            StructType { declared_size: Some(4), members: vec![flags] },
        );
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x20)]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMember { .. }));
    }

    #[test]
    fn forward_declared_struct_by_value_has_no_size() {
        let mut b = TableBuilder::new();
        b.raw_struct(0x10, Some("Opaque"), StructType::default());
        b.structure(0x20, Some("User"), 8, &[(0, 0x10, "o")]);
        let mut table = b.build();

        let err = table.finalize_all(&[id(&table, 0x20)]).unwrap_err();
        assert!(matches!(err, Error::MissingSize { ref name } if name == "Opaque"));
    }

    #[test]
    fn unrelated_nodes_stay_initial() {
        let mut b = TableBuilder::new();
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.structure(0x20, Some("Wanted"), 4, &[(0, 0x10, "v")]);
        b.typedef(0x30, "loop_a", Some(0x40));
        b.typedef(0x40, "loop_b", Some(0x30));
        let mut table = b.build();

        table.finalize_all(&[id(&table, 0x20)]).expect("cycle elsewhere is never visited");
        assert_eq!(table.node(id(&table, 0x30)).state, Lifecycle::Initial);
    }
}
