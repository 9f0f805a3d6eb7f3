use gimli::{EvaluationResult, Expression, Location, Operation};

use crate::loader::DwarfSlice;

/// Byte offset encoded by a `DW_AT_data_member_location` expression,
/// evaluated against a zero base address.
///
/// Returns `None` for anything that needs runtime state (registers, memory,
/// virtual base lookups).
pub fn member_offset(expr: Expression<DwarfSlice<'_>>, encoding: gimli::Encoding) -> Option<u64> {
    constant_offset(expr.clone(), encoding).or_else(|| evaluate(expr, encoding))
}

/// `DW_OP_plus_uconst N` or `DW_OP_constu N` on its own.
fn constant_offset(expr: Expression<DwarfSlice<'_>>, encoding: gimli::Encoding) -> Option<u64> {
    let mut ops = expr.operations(encoding);
    let value = match ops.next().ok().flatten()? {
        Operation::PlusConstant { value } | Operation::UnsignedConstant { value } => value,
        _ => return None,
    };
    match ops.next() {
        Ok(None) => Some(value),
        _ => None,
    }
}

fn evaluate(expr: Expression<DwarfSlice<'_>>, encoding: gimli::Encoding) -> Option<u64> {
    let mask = match encoding.address_size {
        8 => u64::MAX,
        size @ 1..=7 => (1u64 << (u64::from(size) * 8)) - 1,
        _ => return None,
    };

    let mut eval = expr.evaluation(encoding);
    eval.set_initial_value(0);
    let mut state = eval.evaluate().ok()?;
    loop {
        match state {
            EvaluationResult::Complete => break,
            EvaluationResult::RequiresRelocatedAddress(addr) => {
                state = eval.resume_with_relocated_address(addr).ok()?;
            }
            _ => return None,
        }
    }

    match eval.result().into_iter().next()?.location {
        Location::Address { address } => Some(address),
        Location::Value { value } => value.to_u64(mask).ok(),
        _ => None,
    }
}
