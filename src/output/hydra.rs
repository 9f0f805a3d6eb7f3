//! Emits a [`LayoutSet`] as a Python module for the `hydras` binary-parsing
//! library.

use crate::error::{Error, Result};
use crate::merge::{Definition, DefinitionKind, LayoutSet};
use crate::table::TypeTable;
use crate::types::{Encoding, NodeId, TypeKind, TypeRef};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

pub const PREAMBLE: &str = "from hydras import *";

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// `name` as a Python identifier. Characters outside `[A-Za-z0-9_]` become
/// `_` (`_vptr.Base` -> `_vptr_Base`, `Pair<int>` -> `Pair_int_`); a leading
/// digit gets a `_` prefix and a keyword a `_` suffix.
pub fn python_identifier(name: &str) -> Cow<'_, str> {
    let valid = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let leading_digit = name.starts_with(|c: char| c.is_ascii_digit());
    let keyword = PYTHON_KEYWORDS.contains(&name);
    if !name.is_empty() && name.chars().all(valid) && !leading_digit && !keyword {
        return Cow::Borrowed(name);
    }

    let mut ident: String = name.chars().map(|c| if valid(c) { c } else { '_' }).collect();
    if ident.is_empty() || leading_digit {
        ident.insert(0, '_');
    }
    if keyword {
        ident.push('_');
    }
    Cow::Owned(ident)
}

/// The right-hand side of a hydras field or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutExpr {
    Int { signed: bool, bits: u64 },
    Float,
    Double,
    /// `Array(count, element)`.
    Array(u64, Box<LayoutExpr>),
    Named(String),
    Pad(u64),
}

impl fmt::Display for LayoutExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutExpr::Int { signed: true, bits } => write!(f, "int{}_t", bits),
            LayoutExpr::Int { signed: false, bits } => write!(f, "uint{}_t", bits),
            LayoutExpr::Float => f.write_str("Float"),
            LayoutExpr::Double => f.write_str("Double"),
            LayoutExpr::Array(count, element) => write!(f, "Array({}, {})", count, element),
            LayoutExpr::Named(name) => f.write_str(&python_identifier(name)),
            LayoutExpr::Pad(size) => write!(f, "Pad({})", size),
        }
    }
}

fn int_tag(signed: bool, bytes: u64) -> Option<LayoutExpr> {
    matches!(bytes, 1 | 2 | 4 | 8).then(|| LayoutExpr::Int { signed, bits: bytes * 8 })
}

/// How a reference to `id` is written. `None` when hydras has no spelling
/// for it (unsupported kinds, anonymous aggregates, odd float widths).
pub fn layout_expr(table: &TypeTable, id: NodeId) -> Option<LayoutExpr> {
    let node = table.node(id);
    let target = |r: Option<TypeRef>| r.and_then(|r| table.target(r));

    match &node.kind {
        TypeKind::Primitive { encoding, size } => match encoding {
            Encoding::Float => match size {
                4 => Some(LayoutExpr::Float),
                8 => Some(LayoutExpr::Double),
                _ => None,
            },
            Encoding::Signed => int_tag(true, *size),
            Encoding::Unsigned | Encoding::Boolean => int_tag(false, *size),
        },
        TypeKind::Pointer(p) => int_tag(false, p.size),
        TypeKind::Array(a) => {
            let mut expr = layout_expr(table, table.target(a.element)?)?;
            for dim in a.dimensions.iter().rev() {
                expr = LayoutExpr::Array((*dim)?, Box::new(expr));
            }
            Some(expr)
        }
        TypeKind::Qualified(_, inner) => layout_expr(table, target(*inner)?),
        TypeKind::Enum(e) => match &node.name {
            Some(name) => Some(LayoutExpr::Named(name.clone())),
            None => match target(e.underlying) {
                Some(underlying) => layout_expr(table, underlying),
                None => int_tag(true, e.declared_size?),
            },
        },
        TypeKind::Struct(_) | TypeKind::Union(_) | TypeKind::Typedef(_) => {
            node.name.clone().map(LayoutExpr::Named)
        }
        TypeKind::Unsupported(_) => None,
    }
}

pub struct HydraFormatter {
    preamble: bool,
}

impl HydraFormatter {
    pub fn new(preamble: bool) -> Self {
        Self { preamble }
    }

    /// Renders every definition in order. Consecutive aliases are kept
    /// together; every other pair of blocks is separated by one blank line.
    pub fn format(&self, set: &LayoutSet) -> Result<String> {
        let mut output = String::new();
        if self.preamble {
            output.push_str(PREAMBLE);
            output.push('\n');
            if !set.is_empty() {
                output.push('\n');
            }
        }

        let mut idents: HashMap<Cow<'_, str>, &str> = HashMap::new();
        let mut prev: Option<DefinitionKind> = None;
        for def in set.definitions() {
            let ident = python_identifier(&def.name);
            if let Some(first) = idents.insert(ident.clone(), &def.name) {
                return Err(Error::IdentifierClash {
                    ident: ident.into_owned(),
                    first: first.to_string(),
                    second: def.name.clone(),
                });
            }

            let grouped = prev == Some(DefinitionKind::Alias) && def.kind == DefinitionKind::Alias;
            if prev.is_some() && !grouped {
                output.push('\n');
            }
            match def.kind {
                DefinitionKind::Alias => self.format_alias(set.table(def), def, &mut output)?,
                DefinitionKind::Struct => self.format_struct(set.table(def), def, &mut output)?,
            }
            prev = Some(def.kind);
        }

        Ok(output)
    }

    fn format_alias(&self, table: &TypeTable, def: &Definition, out: &mut String) -> Result<()> {
        let TypeKind::Typedef(target) = &table.node(def.node).kind else {
            return Err(unrepresentable(def, "<alias>", table.node(def.node).display_name()));
        };
        let expr = target
            .and_then(|t| table.target(t))
            .and_then(|t| layout_expr(table, t))
            .ok_or_else(|| {
                let target_name = target.map_or_else(|| "void".to_string(), |t| table.name_of(t));
                unrepresentable(def, "<alias>", target_name)
            })?;
        out.push_str(&format!("{} = {}\n", python_identifier(&def.name), expr));
        Ok(())
    }

    /// Fields in declaration order, with `Pad` fields covering every gap so
    /// that the field sizes add up to the declared size.
    fn format_struct(&self, table: &TypeTable, def: &Definition, out: &mut String) -> Result<()> {
        let node = table.node(def.node);
        let Some(s) = node.as_struct() else {
            return Err(unrepresentable(def, "<struct>", node.display_name()));
        };

        let mut lines = Vec::new();
        let mut padding = 0;
        let mut cursor = 0u64;
        for member in &s.members {
            let offset = member.offset.unwrap_or(cursor);
            if offset > cursor {
                lines.push(format!("_padding_{} = {}", padding, LayoutExpr::Pad(offset - cursor)));
                padding += 1;
            } else if offset < cursor {
                return Err(Error::OverlappingMember {
                    owner: def.name.clone(),
                    member: member.name.clone(),
                    offset,
                });
            }

            let expr = table
                .target(member.ty)
                .and_then(|t| layout_expr(table, t))
                .ok_or_else(|| unrepresentable(def, &member.name, table.name_of(member.ty)))?;
            lines.push(format!("{} = {}", python_identifier(&member.name), expr));
            cursor = offset.saturating_add(table.size_of(member.ty).unwrap_or(0));
        }

        let size = node.byte_size.unwrap_or(cursor);
        if size > cursor {
            lines.push(format!("_padding_{} = {}", padding, LayoutExpr::Pad(size - cursor)));
        }
        if lines.is_empty() {
            lines.push("pass".to_string());
        }

        out.push_str(&format!("class {}(Struct):\n", python_identifier(&def.name)));
        for line in lines {
            out.push_str("    ");
            out.push_str(&line);
            out.push('\n');
        }
        Ok(())
    }
}

fn unrepresentable(def: &Definition, field: &str, type_name: String) -> Error {
    Error::Unrepresentable { owner: def.name.clone(), field: field.to_string(), type_name }
}
