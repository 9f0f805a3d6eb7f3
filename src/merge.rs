//! Selection of requested structs per unit, and merging of the definitions
//! found across units into one deduplicated, dependency-ordered set.

use crate::analysis::same_layout;
use crate::error::{Error, Result};
use crate::table::TypeTable;
use crate::types::{NodeId, TypeKind, TypeRef};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Struct-name allow-list. Each pattern is a regular expression anchored at
/// the start of the name. No patterns select nothing.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    patterns: Vec<Regex>,
}

impl Selector {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(&format!("^(?:{})", p.as_ref())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Named, fully defined structs of `table` whose name is allowed.
    /// Forward declarations never qualify.
    pub fn select(&self, table: &TypeTable) -> Vec<NodeId> {
        if self.is_empty() {
            return Vec::new();
        }
        table
            .nodes()
            .filter(|(_, node)| {
                node.as_struct().is_some_and(|s| s.declared_size.is_some())
                    && node.name.as_deref().is_some_and(|name| self.matches(name))
            })
            .map(|(id, _)| id)
            .collect()
    }
}

/// `int8_t` .. `uint64_t` style names the output environment already defines.
pub fn is_standard_int_alias(name: &str) -> bool {
    let rest = name.strip_prefix('u').unwrap_or(name);
    let Some(bits) = rest.strip_prefix("int").and_then(|r| r.strip_suffix("_t")) else {
        return false;
    };
    (1..=2).contains(&bits.len()) && bits.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// Aggregate block. `node` is the struct itself.
    Struct,
    /// `Name = Expr`. `node` is the typedef.
    Alias,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub unit: usize,
    pub node: NodeId,
}

/// Everything selected across all units, in emission order.
#[derive(Debug, Default)]
pub struct LayoutSet {
    units: Vec<TypeTable>,
    definitions: Vec<Definition>,
    by_name: HashMap<String, usize>,
}

impl LayoutSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects, finalizes and merges one unit. Returns how many new
    /// definitions it contributed; a unit contributing none is dropped.
    pub fn add_unit(&mut self, mut table: TypeTable, selector: &Selector) -> Result<usize> {
        let roots = selector.select(&table);
        if roots.is_empty() {
            return Ok(0);
        }
        log::debug!("{}: {} struct(s) selected", table.unit_name(), roots.len());

        let order = table.finalize_all(&roots)?;
        let used = named_by_output(&table, &roots);
        let unit = self.units.len();
        let mut added = 0;

        for id in order.into_iter().filter(|id| used.contains(id)) {
            let Some((name, kind, node)) = classify(&table, id) else {
                continue;
            };
            if let Some(&existing) = self.by_name.get(&name) {
                self.check_duplicate(existing, &table, kind, node)?;
                continue;
            }
            self.by_name.insert(name.clone(), self.definitions.len());
            self.definitions.push(Definition { name, kind, unit, node });
            added += 1;
        }

        if added > 0 {
            self.units.push(table);
        }
        Ok(added)
    }

    fn check_duplicate(
        &self,
        existing: usize,
        table: &TypeTable,
        kind: DefinitionKind,
        node: NodeId,
    ) -> Result<()> {
        let def = &self.definitions[existing];
        let first = &self.units[def.unit];
        let consistent = match (def.kind, kind) {
            (DefinitionKind::Struct, DefinitionKind::Struct) => {
                same_layout(first, def.node, table, node)
            }
            // Aliases are only checked by name.
            (DefinitionKind::Alias, DefinitionKind::Alias) => true,
            _ => false,
        };
        if consistent {
            log::trace!("'{}' seen again in {}, identical", def.name, table.unit_name());
            return Ok(());
        }
        Err(Error::ConflictingDefinition {
            name: def.name.clone(),
            first: first.node(def.node).location.clone(),
            second: table.node(node).location.clone(),
        })
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn table(&self, def: &Definition) -> &TypeTable {
        &self.units[def.unit]
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    pub fn structs(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter().filter(|d| d.kind == DefinitionKind::Struct)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Nodes whose rendering the output of `roots` depends on. A typedef reached
/// only through a pointer, or hidden behind a standard integer alias, is
/// never written out and so is not included.
fn named_by_output(table: &TypeTable, roots: &[NodeId]) -> HashSet<NodeId> {
    let mut used = HashSet::new();
    let mut stack = roots.to_vec();
    while let Some(id) = stack.pop() {
        if used.insert(id) {
            stack.extend(rendered_deps(table, id).into_iter().filter_map(|r| table.target(r)));
        }
    }
    used
}

fn rendered_deps(table: &TypeTable, id: NodeId) -> Vec<TypeRef> {
    let node = table.node(id);
    match &node.kind {
        TypeKind::Struct(s) => s.members.iter().map(|m| m.ty).collect(),
        TypeKind::Array(a) => vec![a.element],
        TypeKind::Qualified(_, inner) => inner.iter().copied().collect(),
        TypeKind::Typedef(target) => match &node.name {
            Some(name) if is_standard_int_alias(name) => Vec::new(),
            _ => target.iter().copied().collect(),
        },
        TypeKind::Enum(e) if node.name.is_none() => e.underlying.iter().copied().collect(),
        _ => Vec::new(),
    }
}

/// What, if anything, a finalized node contributes to the output namespace.
fn classify(table: &TypeTable, id: NodeId) -> Option<(String, DefinitionKind, NodeId)> {
    let node = table.node(id);
    match &node.kind {
        TypeKind::Struct(_) => node.name.clone().map(|n| (n, DefinitionKind::Struct, id)),
        TypeKind::Typedef(target) => {
            let name = node.name.clone()?;
            if let Some(target) = target.and_then(|t| table.target(t)) {
                let base = table.strip_qualifiers(target);
                if table.node(base).as_struct().is_some() {
                    match &table.node(base).name {
                        // typedef struct Foo Foo;
                        Some(struct_name) if *struct_name == name => return None,
                        // typedef struct { ... } Foo;
                        None => return Some((name, DefinitionKind::Struct, base)),
                        Some(_) => {}
                    }
                }
            }
            if is_standard_int_alias(&name) {
                return None;
            }
            Some((name, DefinitionKind::Alias, id))
        }
        _ => None,
    }
}
