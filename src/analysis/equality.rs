use crate::table::TypeTable;
use crate::types::{NodeId, TypeKind, TypeRef};

/// Deep structural comparison of two finalized nodes, possibly from
/// different units.
///
/// Finalized graphs are acyclic once pointers are taken out, and pointers
/// compare shallowly (size and pointee name), so the recursion terminates.
pub fn structurally_equal(a: &TypeTable, a_id: NodeId, b: &TypeTable, b_id: NodeId) -> bool {
    nodes_equal(a, a_id, b, b_id, true)
}

/// Like [`structurally_equal`], but ignores the names of the two roots.
/// Used when an anonymous struct is known by a typedef name.
pub fn same_layout(a: &TypeTable, a_id: NodeId, b: &TypeTable, b_id: NodeId) -> bool {
    nodes_equal(a, a_id, b, b_id, false)
}

fn nodes_equal(a: &TypeTable, a_id: NodeId, b: &TypeTable, b_id: NodeId, names: bool) -> bool {
    let (x, y) = (a.node(a_id), b.node(b_id));
    if (names && x.name != y.name) || x.byte_size != y.byte_size {
        return false;
    }

    let refs_equal = |ra: TypeRef, rb: TypeRef| match (a.target(ra), b.target(rb)) {
        (Some(ta), Some(tb)) => structurally_equal(a, ta, b, tb),
        _ => false,
    };
    let opt_refs_equal = |ra: Option<TypeRef>, rb: Option<TypeRef>| match (ra, rb) {
        (Some(ra), Some(rb)) => refs_equal(ra, rb),
        (None, None) => true,
        _ => false,
    };

    match (&x.kind, &y.kind) {
        (
            TypeKind::Primitive { encoding: ea, size: sa },
            TypeKind::Primitive { encoding: eb, size: sb },
        ) => ea == eb && sa == sb,
        (TypeKind::Struct(sa), TypeKind::Struct(sb)) => {
            sa.declared_size == sb.declared_size
                && sa.members.len() == sb.members.len()
                && sa.members.iter().zip(&sb.members).all(|(ma, mb)| {
                    ma.offset == mb.offset
                        && ma.name == mb.name
                        && ma.is_base == mb.is_base
                        && refs_equal(ma.ty, mb.ty)
                })
        }
        (TypeKind::Array(aa), TypeKind::Array(ab)) => {
            aa.dimensions == ab.dimensions && refs_equal(aa.element, ab.element)
        }
        (TypeKind::Typedef(ta), TypeKind::Typedef(tb)) => opt_refs_equal(*ta, *tb),
        (TypeKind::Qualified(qa, ta), TypeKind::Qualified(qb, tb)) => {
            qa == qb && opt_refs_equal(*ta, *tb)
        }
        (TypeKind::Pointer(pa), TypeKind::Pointer(pb)) => {
            let pointee = |t: &TypeTable, p: Option<TypeRef>| {
                p.and_then(|r| t.target(r)).map(|id| t.node(id).name.clone())
            };
            pa.size == pb.size && pointee(a, pa.pointee) == pointee(b, pb.pointee)
        }
        (TypeKind::Enum(ea), TypeKind::Enum(eb)) => {
            ea.literals == eb.literals && opt_refs_equal(ea.underlying, eb.underlying)
        }
        (TypeKind::Union(ua), TypeKind::Union(ub)) => {
            ua.declared_size == ub.declared_size
                && ua.variants.len() == ub.variants.len()
                && ua
                    .variants
                    .iter()
                    .zip(&ub.variants)
                    .all(|((na, ra), (nb, rb))| na == nb && refs_equal(*ra, *rb))
        }
        (TypeKind::Unsupported(ta), TypeKind::Unsupported(tb)) => ta == tb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TableBuilder, point_unit};
    use crate::types::{Encoding, TypeOffset};

    fn finalize(mut table: TypeTable, root: u64) -> (TypeTable, NodeId) {
        let id = table.lookup(TypeOffset(root)).unwrap();
        table.finalize_all(&[id]).unwrap();
        (table, id)
    }

    #[test]
    fn same_point_in_two_units_is_equal() {
        let (a, pa) = finalize(point_unit("a.c"), 0x30);

        // Same layout, different offsets in the second unit.
        let mut b = TableBuilder::named("b.c");
        b.primitive(0x50, "int", 4, Encoding::Signed);
        b.structure(0x90, Some("Point"), 8, &[(0, 0x50, "x"), (4, 0x50, "y")]);
        let (b, pb) = finalize(b.build(), 0x90);

        assert!(structurally_equal(&a, pa, &b, pb));
    }

    #[test]
    fn swapped_fields_differ() {
        let (a, pa) = finalize(point_unit("a.c"), 0x30);

        let mut b = TableBuilder::named("b.c");
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.structure(0x30, Some("Point"), 8, &[(0, 0x10, "y"), (4, 0x10, "x")]);
        let (b, pb) = finalize(b.build(), 0x30);

        assert!(!structurally_equal(&a, pa, &b, pb));
    }

    #[test]
    fn member_types_compare_recursively() {
        let mut a = TableBuilder::named("a.c");
        a.primitive(0x10, "int", 4, Encoding::Signed);
        a.typedef(0x20, "coord_t", Some(0x10));
        a.structure(0x30, Some("Point"), 8, &[(0, 0x20, "x"), (4, 0x20, "y")]);
        let (a, pa) = finalize(a.build(), 0x30);

        let mut b = TableBuilder::named("b.c");
        b.primitive(0x10, "float", 4, Encoding::Float);
        b.typedef(0x20, "coord_t", Some(0x10));
        b.structure(0x30, Some("Point"), 8, &[(0, 0x20, "x"), (4, 0x20, "y")]);
        let (b, pb) = finalize(b.build(), 0x30);

        assert!(!structurally_equal(&a, pa, &b, pb));
    }

    #[test]
    fn linked_structs_compare_pointers_shallowly() {
        let build = |unit: &str| {
            let mut t = TableBuilder::named(unit);
            t.primitive(0x10, "int", 4, Encoding::Signed);
            t.pointer(0x18, 8, Some(0x20));
            t.structure(0x20, Some("Node"), 16, &[(0, 0x10, "v"), (8, 0x18, "next")]);
            finalize(t.build(), 0x20)
        };
        let (a, na) = build("a.c");
        let (b, nb) = build("b.c");

        assert!(structurally_equal(&a, na, &b, nb));
    }

    #[test]
    fn same_layout_ignores_root_name() {
        let (a, pa) = finalize(point_unit("a.c"), 0x30);

        let mut b = TableBuilder::named("b.c");
        b.primitive(0x10, "int", 4, Encoding::Signed);
        b.structure(0x30, None, 8, &[(0, 0x10, "x"), (4, 0x10, "y")]);
        let (b, pb) = finalize(b.build(), 0x30);

        assert!(!structurally_equal(&a, pa, &b, pb));
        assert!(same_layout(&a, pa, &b, pb));
    }
}
