use alloc::string::String;
use core::fmt::Write;

use crate::assembler::Program;
use crate::{AxisOpcode, AxisOpcodeBinary, Instruction, InstructionError, OpcodeBlockFourAxisBinary};

fn mnemonic(axis: &AxisOpcodeBinary) -> Result<&'static str, InstructionError> {
    let name = match Instruction::try_from(axis.instruction)? {
        Instruction::Nop if axis.has_pulses() => "DWELL",
        Instruction::Nop => "NOP",
        Instruction::Cw => "CW",
        Instruction::Ccw => "CCW",
        Instruction::Header => "HEADER",
        Instruction::Config => "CONFIG",
    };
    Ok(name)
}

/// Render a compiled block back to source as an explicit one line block.
pub fn disassemble_block(block: &OpcodeBlockFourAxisBinary) -> Result<String, InstructionError> {
    let mut out = String::from("begin");
    for (axis, value) in block.axes() {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            ", {}, {}, {}, {}, {}",
            axis.name(),
            mnemonic(value)?,
            value.pulse_rate,
            value.pulse_count,
            value.pulse_width
        );
    }
    out.push_str(", end");
    Ok(out)
}

fn info_line(out: &mut String, opcode: &AxisOpcode) {
    let _ = write!(out, "INFO, {}", opcode.opcode.as_deref().unwrap_or("NOP"));
    for arg in opcode.args.iter() {
        let _ = write!(out, ", {}", arg.as_deref().unwrap_or("0"));
    }
    out.push('\n');
}

/// Render a whole program, `INFO` lines first, one block per line.
pub fn disassemble_program(program: &Program) -> Result<String, InstructionError> {
    let mut out = String::new();
    if let Some(header) = program.info.header.as_ref() {
        info_line(&mut out, header);
    }
    if let Some(config) = program.info.config.as_ref() {
        info_line(&mut out, config);
    }
    for block in program.blocks.iter() {
        out.push_str(&disassemble_block(block)?);
        out.push('\n');
    }
    Ok(out)
}
