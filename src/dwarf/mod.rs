mod context;
mod expr;
mod unit;

pub use context::DwarfContext;
pub use unit::UnitLoader;

use crate::error::{Error, Result};
use crate::loader::DwarfSlice;
use gimli::{AttributeValue, DebuggingInformationEntry, DwAt};

/// Wraps a gimli failure with what was being read.
pub(crate) fn gimli_err(what: &'static str) -> impl FnOnce(gimli::Error) -> Error {
    move |e| Error::Dwarf(format!("Failed to {}: {}", what, e))
}

pub(crate) fn attr<'a>(
    entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    name: DwAt,
) -> Result<Option<AttributeValue<DwarfSlice<'a>>>> {
    entry.attr_value(name).map_err(|e| Error::Dwarf(format!("Failed to read {}: {}", name, e)))
}

/// Extract a u64 value from a DWARF attribute, handling the constant forms.
/// Negative `Sdata` is not a valid size, offset or index.
pub(crate) fn read_u64_from_attr(attr: Option<AttributeValue<DwarfSlice<'_>>>) -> Option<u64> {
    match attr? {
        AttributeValue::FileIndex(idx) => Some(idx),
        AttributeValue::Udata(v) => Some(v),
        AttributeValue::Data1(v) => Some(v as u64),
        AttributeValue::Data2(v) => Some(v as u64),
        AttributeValue::Data4(v) => Some(v as u64),
        AttributeValue::Data8(v) => Some(v),
        AttributeValue::Sdata(v) if v >= 0 => Some(v as u64),
        _ => None,
    }
}

pub(crate) fn read_u64(
    entry: &DebuggingInformationEntry<DwarfSlice<'_>>,
    name: DwAt,
) -> Result<Option<u64>> {
    Ok(read_u64_from_attr(attr(entry, name)?))
}

/// Enumerator values. Compilers use `Sdata` for negative literals, so
/// fixed-size data forms are read as unsigned.
pub(crate) fn read_i64(
    entry: &DebuggingInformationEntry<DwarfSlice<'_>>,
    name: DwAt,
) -> Result<Option<i64>> {
    Ok(match attr(entry, name)? {
        Some(AttributeValue::Sdata(v)) => Some(v),
        Some(AttributeValue::Udata(v)) => Some(v as i64),
        Some(AttributeValue::Data1(v)) => Some(v as i64),
        Some(AttributeValue::Data2(v)) => Some(v as i64),
        Some(AttributeValue::Data4(v)) => Some(v as i64),
        Some(AttributeValue::Data8(v)) => Some(v as i64),
        _ => None,
    })
}

pub(crate) fn has_flag(
    entry: &DebuggingInformationEntry<DwarfSlice<'_>>,
    name: DwAt,
) -> Result<bool> {
    Ok(matches!(attr(entry, name)?, Some(AttributeValue::Flag(true))))
}
