use crate::error::Result;
use crate::loader::DwarfSlice;
use crate::table::TypeTable;
use crate::types::{
    ArrayType, Encoding, EnumType, Member, PointerType, Qualifier, SourceLocation, StructType,
    TypeKind, TypeNode, TypeOffset, TypeRef, UnionType,
};
use gimli::{AttributeValue, DebuggingInformationEntry, Dwarf, Unit, UnitOffset};

use super::expr::member_offset;
use super::{attr, gimli_err, has_flag, read_i64, read_u64};

/// Stands in for references that cannot be expressed relative to the unit.
/// Never registered, so finalization reports it as dangling.
const UNREACHABLE: TypeOffset = TypeOffset(u64::MAX);

/// Builds the unfinalized [`TypeTable`] of one compilation unit.
pub struct UnitLoader<'a, 'u> {
    dwarf: &'u Dwarf<DwarfSlice<'a>>,
    unit: &'u Unit<DwarfSlice<'a>>,
    address_size: u8,
}

impl<'a, 'u> UnitLoader<'a, 'u> {
    pub fn new(dwarf: &'u Dwarf<DwarfSlice<'a>>, unit: &'u Unit<DwarfSlice<'a>>) -> Self {
        Self { dwarf, unit, address_size: unit.encoding().address_size }
    }

    /// Registers one node per entry in the unit. Kinds that are not modeled
    /// (subprograms, variables, members themselves) become `Unsupported`, so
    /// any reference into the unit resolves.
    pub fn load(&self, unit_name: &str) -> Result<TypeTable> {
        let mut table = TypeTable::new(unit_name);
        let mut entries = self.unit.entries();

        while let Some((_, entry)) = entries.next_dfs().map_err(gimli_err("read DIE"))? {
            let kind = self.load_kind(entry)?;
            let mut node =
                TypeNode::new(TypeOffset(entry.offset().0 as u64), self.name(entry)?, kind);
            if !matches!(node.kind, TypeKind::Unsupported(_)) {
                node.location = self.source_location(entry)?;
            }
            table.insert(node)?;
        }

        log::debug!("{}: {} entries loaded", unit_name, table.len());
        Ok(table)
    }

    fn load_kind(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<TypeKind> {
        let kind = match entry.tag() {
            gimli::DW_TAG_base_type => {
                let encoding = match attr(entry, gimli::DW_AT_encoding)? {
                    Some(AttributeValue::Encoding(ate)) => encoding_of(ate),
                    _ => None,
                };
                let encoding = match encoding {
                    Some(encoding) => encoding,
                    None => Encoding::from_name(self.name(entry)?.as_deref().unwrap_or("")),
                };
                let size = read_u64(entry, gimli::DW_AT_byte_size)?.unwrap_or(0);
                TypeKind::Primitive { encoding, size }
            }
            gimli::DW_TAG_structure_type | gimli::DW_TAG_class_type => {
                TypeKind::Struct(self.load_struct(entry)?)
            }
            gimli::DW_TAG_union_type => TypeKind::Union(self.load_union(entry)?),
            gimli::DW_TAG_enumeration_type => TypeKind::Enum(self.load_enum(entry)?),
            gimli::DW_TAG_typedef => TypeKind::Typedef(self.type_ref(entry)?),
            gimli::DW_TAG_array_type => match self.type_ref(entry)? {
                Some(element) => TypeKind::Array(ArrayType {
                    element,
                    dimensions: self.dimensions(entry)?,
                }),
                None => TypeKind::Unsupported("DW_TAG_array_type without element".to_string()),
            },
            gimli::DW_TAG_pointer_type
            | gimli::DW_TAG_reference_type
            | gimli::DW_TAG_rvalue_reference_type => TypeKind::Pointer(PointerType {
                size: read_u64(entry, gimli::DW_AT_byte_size)?
                    .unwrap_or(u64::from(self.address_size)),
                pointee: self.type_ref(entry)?,
            }),
            gimli::DW_TAG_const_type => {
                TypeKind::Qualified(Qualifier::Const, self.type_ref(entry)?)
            }
            gimli::DW_TAG_volatile_type => {
                TypeKind::Qualified(Qualifier::Volatile, self.type_ref(entry)?)
            }
            gimli::DW_TAG_restrict_type => {
                TypeKind::Qualified(Qualifier::Restrict, self.type_ref(entry)?)
            }
            gimli::DW_TAG_atomic_type => {
                TypeKind::Qualified(Qualifier::Atomic, self.type_ref(entry)?)
            }
            other => TypeKind::Unsupported(other.to_string()),
        };
        Ok(kind)
    }

    fn load_struct(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<StructType> {
        let declared_size = read_u64(entry, gimli::DW_AT_byte_size)?;
        let mut members = Vec::new();
        let (mut bases, mut unnamed) = (0, 0);

        self.for_each_child(entry, |child| {
            match child.tag() {
                gimli::DW_TAG_inheritance => {
                    let mut base = self.member(child, format!("_base_{}", bases))?;
                    base.is_base = true;
                    bases += 1;
                    members.push(base);
                }
                // Static data members carry DW_AT_declaration and take no space.
                gimli::DW_TAG_member if !has_flag(child, gimli::DW_AT_declaration)? => {
                    let name = match self.name(child)? {
                        Some(name) => name,
                        None => {
                            unnamed += 1;
                            format!("_unnamed_{}", unnamed - 1)
                        }
                    };
                    members.push(self.member(child, name)?);
                }
                _ => {}
            }
            Ok(())
        })?;

        Ok(StructType { declared_size, members })
    }

    fn member(
        &self,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        name: String,
    ) -> Result<Member> {
        let offset = match attr(entry, gimli::DW_AT_data_member_location)? {
            Some(AttributeValue::Exprloc(expr)) => member_offset(expr, self.unit.encoding()),
            value => super::read_u64_from_attr(value),
        };
        Ok(Member {
            name,
            offset,
            ty: self.type_ref(entry)?.unwrap_or(TypeRef::Offset(UNREACHABLE)),
            bit_size: read_u64(entry, gimli::DW_AT_bit_size)?,
            is_base: false,
        })
    }

    fn load_union(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<UnionType> {
        let declared_size = read_u64(entry, gimli::DW_AT_byte_size)?;
        let mut union = UnionType { declared_size, ..Default::default() };
        let mut unnamed = 0;

        self.for_each_child(entry, |child| {
            if child.tag() != gimli::DW_TAG_member {
                return Ok(());
            }
            let name = self.name(child)?.unwrap_or_else(|| {
                unnamed += 1;
                format!("_unnamed_{}", unnamed - 1)
            });
            let ty = self.type_ref(child)?.unwrap_or(TypeRef::Offset(UNREACHABLE));
            union.variants.insert(name, ty);
            Ok(())
        })?;

        Ok(union)
    }

    fn load_enum(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<EnumType> {
        let mut ty = EnumType {
            underlying: self.type_ref(entry)?,
            declared_size: read_u64(entry, gimli::DW_AT_byte_size)?,
            ..Default::default()
        };

        self.for_each_child(entry, |child| {
            if child.tag() == gimli::DW_TAG_enumerator {
                if let (Some(name), Some(value)) =
                    (self.name(child)?, read_i64(child, gimli::DW_AT_const_value)?)
                {
                    ty.literals.insert(name, value);
                }
            }
            Ok(())
        })?;

        Ok(ty)
    }

    /// Per-subrange extents, outermost first. `DW_AT_count` wins over
    /// `DW_AT_upper_bound`; a subrange with neither is unbounded.
    fn dimensions(
        &self,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Vec<Option<u64>>> {
        let mut dims = Vec::new();
        self.for_each_child(entry, |child| {
            if child.tag() == gimli::DW_TAG_subrange_type {
                let count = match read_u64(child, gimli::DW_AT_count)? {
                    Some(count) => Some(count),
                    None => read_u64(child, gimli::DW_AT_upper_bound)?.map(|ub| ub + 1),
                };
                dims.push(count);
            }
            Ok(())
        })?;
        Ok(dims)
    }

    fn for_each_child<F>(
        &self,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(&DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<()>,
    {
        let mut tree =
            self.unit.entries_tree(Some(entry.offset())).map_err(gimli_err("create entries tree"))?;
        let root = tree.root().map_err(gimli_err("get tree root"))?;
        let mut children = root.children();
        while let Some(child) = children.next().map_err(gimli_err("iterate children"))? {
            f(child.entry())?;
        }
        Ok(())
    }

    /// `DW_AT_type` as a unit-relative offset. Section-relative references
    /// are rebased onto this unit.
    fn type_ref(
        &self,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Option<TypeRef>> {
        let offset = match attr(entry, gimli::DW_AT_type)? {
            Some(AttributeValue::UnitRef(UnitOffset(offset))) => TypeOffset(offset as u64),
            Some(AttributeValue::DebugInfoRef(target)) => self
                .unit
                .header
                .offset()
                .as_debug_info_offset()
                .and_then(|base| target.0.checked_sub(base.0))
                .map_or(UNREACHABLE, |rel| TypeOffset(rel as u64)),
            Some(_) => UNREACHABLE,
            None => return Ok(None),
        };
        Ok(Some(TypeRef::Offset(offset)))
    }

    fn name(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<Option<String>> {
        match attr(entry, gimli::DW_AT_name)? {
            Some(value) => {
                let name =
                    self.dwarf.attr_string(self.unit, value).map_err(gimli_err("read name"))?;
                Ok(Some(name.to_string_lossy().into_owned()))
            }
            None => Ok(None),
        }
    }

    fn source_location(
        &self,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Option<SourceLocation>> {
        let (Some(file_index), Some(line)) =
            (read_u64(entry, gimli::DW_AT_decl_file)?, read_u64(entry, gimli::DW_AT_decl_line)?)
        else {
            return Ok(None);
        };
        let file = self.file_name(file_index).unwrap_or_else(|| format!("file#{}", file_index));
        Ok(Some(SourceLocation { file, line }))
    }

    /// Resolves a `DW_AT_decl_file` index through the unit's line program.
    fn file_name(&self, file_index: u64) -> Option<String> {
        let program = self.unit.line_program.as_ref()?;
        let header = program.header();
        let file = header.file(file_index)?;
        let name = self.dwarf.attr_string(self.unit, file.path_name()).ok()?;
        let name = name.to_string_lossy().into_owned();

        let dir = file
            .directory(header)
            .and_then(|dir| self.dwarf.attr_string(self.unit, dir).ok())
            .map(|dir| dir.to_string_lossy().into_owned())
            .filter(|dir| !dir.is_empty());
        Some(match dir {
            Some(dir) => format!("{}/{}", dir, name),
            None => name,
        })
    }
}

fn encoding_of(ate: gimli::DwAte) -> Option<Encoding> {
    match ate {
        gimli::DW_ATE_signed | gimli::DW_ATE_signed_char => Some(Encoding::Signed),
        gimli::DW_ATE_unsigned | gimli::DW_ATE_unsigned_char | gimli::DW_ATE_UTF => {
            Some(Encoding::Unsigned)
        }
        gimli::DW_ATE_boolean => Some(Encoding::Boolean),
        gimli::DW_ATE_float => Some(Encoding::Float),
        _ => None,
    }
}
