use core::num::IntErrorKind;

use crate::assembler::AssemblerErrorKind;
use crate::{
    AxisOpcode, AxisOpcodeBinary, Mnemonic, OpcodeBlockFourAxis, OpcodeBlockFourAxisBinary,
};

/// Instruction register code for a mnemonic.
pub fn opcode_symbol_to_binary(symbol: &str) -> Result<u32, AssemblerErrorKind> {
    let mnemonic = Mnemonic::from_symbol(symbol).ok_or(AssemblerErrorKind::UnknownOpcode)?;
    Ok(mnemonic.instruction().into())
}

/// Parse a numeric argument with C `strtoul` base 0 rules: `0x` prefix for
/// hex, a leading `0` for octal, decimal otherwise. A missing argument is
/// zero so `NOP` and `DWELL` lines can leave trailing fields out.
pub fn string_to_number(symbol: Option<&str>) -> Result<u32, AssemblerErrorKind> {
    let Some(symbol) = symbol else {
        return Ok(0);
    };
    let symbol = symbol.trim();
    if symbol.starts_with('-') {
        return Err(AssemblerErrorKind::NegativeNumber);
    }
    let (digits, radix) = if let Some(hex) = symbol
        .strip_prefix("0x")
        .or_else(|| symbol.strip_prefix("0X"))
    {
        (hex, 16)
    } else if symbol.len() > 1 && symbol.starts_with('0') {
        (symbol.trim_start_matches('0'), 8)
    } else {
        (symbol, 10)
    };
    // `from_str_radix` takes a leading '+', the hardware tools never did.
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(AssemblerErrorKind::MalformedNumber);
    }
    if digits.is_empty() {
        // "0x" alone is malformed but "00" is a valid octal zero.
        return if radix == 8 {
            Ok(0)
        } else {
            Err(AssemblerErrorKind::MalformedNumber)
        };
    }
    u32::from_str_radix(digits, radix).map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow => AssemblerErrorKind::NumberOutOfRange,
        _ => AssemblerErrorKind::MalformedNumber,
    })
}

pub fn compile_axis_opcode(opcode: &AxisOpcode) -> Result<AxisOpcodeBinary, AssemblerErrorKind> {
    let Some(symbol) = opcode.opcode.as_ref() else {
        return Ok(AxisOpcodeBinary::NOP);
    };
    let instruction = opcode_symbol_to_binary(symbol)?;
    let [rate, count, width] = &opcode.args;
    Ok(AxisOpcodeBinary {
        instruction,
        pulse_rate: string_to_number(rate.as_deref())?,
        pulse_count: string_to_number(count.as_deref())?,
        pulse_width: string_to_number(width.as_deref())?,
    })
}

/// Compile the X, Y, Z and A slots in that order. Axes the block never
/// named come out as `NOP` with zero pulse parameters. The `INFO` slot is
/// file metadata and does not appear in the binary block.
pub fn compile_block(
    block: &OpcodeBlockFourAxis,
) -> Result<OpcodeBlockFourAxisBinary, AssemblerErrorKind> {
    Ok(OpcodeBlockFourAxisBinary {
        x: compile_motion(&block.x)?,
        y: compile_motion(&block.y)?,
        z: compile_motion(&block.z)?,
        a: compile_motion(&block.a)?,
    })
}

fn compile_motion(opcode: &AxisOpcode) -> Result<AxisOpcodeBinary, AssemblerErrorKind> {
    if let Some(symbol) = opcode.opcode.as_ref() {
        if Mnemonic::from_symbol(symbol).is_some_and(|mnemonic| mnemonic.is_pseudo()) {
            return Err(AssemblerErrorKind::PseudoInstructionInBlock);
        }
    }
    compile_axis_opcode(opcode)
}
