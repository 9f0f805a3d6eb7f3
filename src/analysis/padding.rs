use crate::merge::LayoutSet;
use crate::table::TypeTable;
use crate::types::{MemberLayout, NodeId, PaddingHole, StructLayout, TypeKind};

/// Whether a finalized type contains compiler-inserted padding.
///
/// Padding is contagious: a dense struct holding a padded one is padded too.
pub fn has_padding(table: &TypeTable, id: NodeId) -> bool {
    let child = |r| table.target(r).is_some_and(|t| has_padding(table, t));

    match &table.node(id).kind {
        TypeKind::Struct(s) => {
            let used: u64 = s.members.iter().filter_map(|m| table.size_of(m.ty)).sum();
            s.declared_size != Some(used) || s.members.iter().any(|m| child(m.ty))
        }
        TypeKind::Array(a) => child(a.element),
        TypeKind::Typedef(target) | TypeKind::Qualified(_, target) => target.is_some_and(child),
        TypeKind::Union(u) => u.variants.values().any(|&v| child(v)),
        TypeKind::Primitive { .. }
        | TypeKind::Pointer(_)
        | TypeKind::Enum(_)
        | TypeKind::Unsupported(_) => false,
    }
}

/// Gaps between consecutive members (declaration order) and after the last one.
/// Returns nothing for non-struct nodes.
pub fn padding_holes(table: &TypeTable, id: NodeId) -> Vec<PaddingHole> {
    let Some(s) = table.node(id).as_struct() else {
        return Vec::new();
    };

    let mut holes = Vec::new();
    let mut prev: Option<(&str, u64)> = None;
    let mut cursor = 0u64;

    for member in &s.members {
        let offset = member.offset.unwrap_or(cursor);
        let size = table.size_of(member.ty).unwrap_or(0);

        if offset > cursor {
            holes.push(PaddingHole {
                offset: cursor,
                size: offset - cursor,
                after_member: prev.map(|(name, _)| name.to_string()),
                after_member_offset: prev.map_or(0, |(_, start)| start),
                before_member: Some(member.name.clone()),
            });
        }

        prev = Some((member.name.as_str(), offset));
        cursor = offset.saturating_add(size);
    }

    let declared = s.declared_size.unwrap_or(cursor);
    if declared > cursor {
        holes.push(PaddingHole {
            offset: cursor,
            size: declared - cursor,
            after_member: prev.map(|(name, _)| name.to_string()),
            after_member_offset: prev.map_or(0, |(_, start)| start),
            before_member: None,
        });
    }

    holes
}

/// Builds the report view of a finalized struct. `name` overrides the
/// struct's own name (anonymous structs named through a typedef).
pub fn analyze_layout(table: &TypeTable, id: NodeId, name: &str) -> StructLayout {
    let node = table.node(id);
    let members = node
        .as_struct()
        .map(|s| {
            s.members
                .iter()
                .map(|m| MemberLayout {
                    name: m.name.clone(),
                    type_name: table.type_name(m.ty),
                    offset: m.offset.unwrap_or(0),
                    size: table.size_of(m.ty).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();

    let padding_holes = padding_holes(table, id);
    StructLayout {
        name: name.to_string(),
        size: node.byte_size.unwrap_or(0),
        members,
        has_padding: has_padding(table, id),
        padding_bytes: padding_holes.iter().map(|h| h.size).sum(),
        padding_holes,
        source_location: node.location.clone(),
    }
}

/// Report view of every struct definition in the set, in emission order.
pub fn struct_layouts(set: &LayoutSet) -> Vec<StructLayout> {
    set.structs().map(|def| analyze_layout(set.table(def), def.node, &def.name)).collect()
}
