use crate::error::{Error, Result};
use gimli::{Dwarf, EndianSlice, RunTimeEndian, SectionId};
use memmap2::Mmap;
use object::{Object, ObjectSection};
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

/// A memory-mapped binary.
pub struct BinaryData {
    pub mmap: Mmap,
}

pub type DwarfSlice<'a> = EndianSlice<'a, RunTimeEndian>;

/// The debug sections of one binary. Uncompressed sections borrow from the
/// mapping; compressed ones (`SHF_COMPRESSED` or `.zdebug_*`) are owned.
pub struct LoadedDwarf<'data> {
    sections: Dwarf<Cow<'data, [u8]>>,
    endian: RunTimeEndian,
}

impl BinaryData {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only and the mapping lives as long
        // as BinaryData.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    pub fn load_dwarf(&self) -> Result<LoadedDwarf<'_>> {
        let object = object::File::parse(&*self.mmap)?;

        if !matches!(
            object.format(),
            object::BinaryFormat::Elf | object::BinaryFormat::MachO | object::BinaryFormat::Pe
        ) {
            return Err(Error::UnsupportedFormat);
        }

        let endian =
            if object.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        // A missing section is empty; a section that fails to decompress is an error.
        let load_section = |id: SectionId| -> Result<Cow<[u8]>> {
            let name = id.name();
            let zname = name.replacen(".debug_", ".zdebug_", 1);
            match object.section_by_name(name).or_else(|| object.section_by_name(&zname)) {
                Some(section) => Ok(section.uncompressed_data()?),
                None => Ok(Cow::Borrowed(&[])),
            }
        };

        let sections = Dwarf::load(load_section)?;
        let loaded = LoadedDwarf { sections, endian };

        let has_units = {
            let dwarf = loaded.dwarf();
            dwarf.units().next().map_err(|e| Error::Dwarf(e.to_string()))?.is_some()
        };
        if !has_units {
            return Err(Error::NoDebugInfo);
        }
        Ok(loaded)
    }
}

impl<'data> LoadedDwarf<'data> {
    /// A gimli view over the loaded sections.
    pub fn dwarf(&self) -> Dwarf<DwarfSlice<'_>> {
        self.sections.borrow(|section| EndianSlice::new(section, self.endian))
    }
}
