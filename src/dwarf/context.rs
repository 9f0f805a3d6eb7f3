use crate::error::Result;
use crate::loader::{DwarfSlice, LoadedDwarf};
use crate::merge::{LayoutSet, Selector};
use gimli::{Dwarf, Unit};

use super::UnitLoader;
use super::gimli_err;

pub struct DwarfContext<'a> {
    dwarf: Dwarf<DwarfSlice<'a>>,
}

impl<'a> DwarfContext<'a> {
    pub fn new(loaded: &'a LoadedDwarf<'_>) -> Self {
        Self { dwarf: loaded.dwarf() }
    }

    /// Loads, selects and merges every compilation unit in turn. Each unit
    /// is finished before the next one is read.
    pub fn collect(&self, selector: &Selector) -> Result<LayoutSet> {
        let mut set = LayoutSet::new();
        let mut units = self.dwarf.units();
        let mut processed = 0usize;

        while let Some(header) = units.next().map_err(gimli_err("read unit header"))? {
            let unit = self.dwarf.unit(header).map_err(gimli_err("parse unit"))?;
            let name = unit_name(&unit, processed);
            log::info!("Processing {}", name);

            let table = UnitLoader::new(&self.dwarf, &unit).load(&name)?;
            let added = set.add_unit(table, selector)?;
            if added > 0 {
                log::debug!("{}: {} new definition(s)", name, added);
            }
            processed += 1;
        }

        log::info!(
            "{} unit(s) processed, {} definition(s) collected",
            processed,
            set.definitions().len()
        );
        Ok(set)
    }
}

fn unit_name(unit: &Unit<DwarfSlice<'_>>, index: usize) -> String {
    match unit.name {
        Some(name) => name.to_string_lossy().into_owned(),
        None => format!("<unit #{}>", index),
    }
}
