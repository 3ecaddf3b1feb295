#![no_std]

#![cfg_attr(
    not(test),
    deny(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing,
        clippy::string_slice,
        clippy::arithmetic_side_effects,
        clippy::panicking_unwrap,
        clippy::out_of_bounds_indexing,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
    )
)]
#![cfg_attr(not(test), warn(clippy::missing_panics_doc))]

extern crate alloc;

use core::mem::transmute;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;
use variant_count::VariantCount;

pub mod assembler;
pub mod block_array;
pub mod compiler;
pub mod disasm;
pub mod image;
pub mod timing;

#[cfg(test)]
mod assembler_test;

pub use assembler::{Assembler, AssemblerError, AssemblerErrorKind, ErrorCategory, Program, ProgramInfo};
pub use block_array::{BlockArray, BlockArrayError};

/// An owned copy of one symbol from the source text.
pub type Symbol = alloc::string::String;

/// Motion channels the assembler knows about. `Info` is the virtual axis
/// that carries the file level `HEADER` and `CONFIG` pseudo-instructions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisState {
    #[default]
    Idle,
    X,
    Y,
    Z,
    A,
    B,
    C,
    U,
    V,
    W,
    Info,
    Unknown,
}

impl AxisState {
    pub fn from_symbol(symbol: &str) -> Self {
        const NAMES: [(&str, AxisState); 10] = [
            ("X", AxisState::X),
            ("Y", AxisState::Y),
            ("Z", AxisState::Z),
            ("A", AxisState::A),
            ("B", AxisState::B),
            ("C", AxisState::C),
            ("U", AxisState::U),
            ("V", AxisState::V),
            ("W", AxisState::W),
            ("INFO", AxisState::Info),
        ];
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .map(|(_, axis)| *axis)
            .unwrap_or(AxisState::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AxisState::Idle => "IDLE",
            AxisState::X => "X",
            AxisState::Y => "Y",
            AxisState::Z => "Z",
            AxisState::A => "A",
            AxisState::B => "B",
            AxisState::C => "C",
            AxisState::U => "U",
            AxisState::V => "V",
            AxisState::W => "W",
            AxisState::Info => "INFO",
            AxisState::Unknown => "?",
        }
    }

    /// Slot of this axis inside a four axis block, if it has one.
    pub fn block_slot(&self) -> Option<usize> {
        match self {
            AxisState::X => Some(0),
            AxisState::Y => Some(1),
            AxisState::Z => Some(2),
            AxisState::A => Some(3),
            _ => None,
        }
    }
}

/// Order the four block axes are compiled, staged and disassembled in.
pub const BLOCK_AXES: [AxisState; 4] = [AxisState::X, AxisState::Y, AxisState::Z, AxisState::A];

/// Opcode mnemonics as written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Nop,
    Cw,
    Ccw,
    Dwell,
    Header,
    Config,
}

impl Mnemonic {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        const NAMES: [(&str, Mnemonic); 6] = [
            ("NOP", Mnemonic::Nop),
            ("CW", Mnemonic::Cw),
            ("CCW", Mnemonic::Ccw),
            ("DWELL", Mnemonic::Dwell),
            ("HEADER", Mnemonic::Header),
            ("CONFIG", Mnemonic::Config),
        ];
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .map(|(_, mnemonic)| *mnemonic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mnemonic::Nop => "NOP",
            Mnemonic::Cw => "CW",
            Mnemonic::Ccw => "CCW",
            Mnemonic::Dwell => "DWELL",
            Mnemonic::Header => "HEADER",
            Mnemonic::Config => "CONFIG",
        }
    }

    pub fn instruction(&self) -> Instruction {
        match self {
            // The hardware tells a dwell from a no-op by its pulse
            // parameters, so both share one code.
            Mnemonic::Nop | Mnemonic::Dwell => Instruction::Nop,
            Mnemonic::Cw => Instruction::Cw,
            Mnemonic::Ccw => Instruction::Ccw,
            Mnemonic::Header => Instruction::Header,
            Mnemonic::Config => Instruction::Config,
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, Mnemonic::Header | Mnemonic::Config)
    }
}

/// Instruction codes as the pulse generator decodes them. Only the low
/// four bits of the instruction register are meaningful.
#[repr(u32)] // Must match the instruction register width
#[derive(VariantCount, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Cw,
    Ccw,
    Header,
    Config,
}

pub const INSTRUCTION_MASK: u32 = 0xF;

impl From<Instruction> for u32 {
    fn from(instruction: Instruction) -> u32 {
        instruction as u32
    }
}

impl TryFrom<u32> for Instruction {
    type Error = InstructionError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let code = value & INSTRUCTION_MASK;
        if code >= Instruction::VARIANT_COUNT as u32 {
            return Err(InstructionError::InvalidCode(value));
        }

        // SAFTY: `repr(u32)` with implicit discriminants starting at zero
        // and we just checked the code is in range.
        let instruction = unsafe { transmute::<u32, Self>(code) };
        Ok(instruction)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionError {
    #[error("the value {0:#x} is not a valid instruction code")]
    InvalidCode(u32),
}

/// One symbolic per axis instruction exactly as it appeared in the source.
/// Arguments are kept as text; the compiler interprets them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AxisOpcode {
    pub axis: AxisState,
    pub opcode: Option<Symbol>,
    pub args: [Option<Symbol>; 3],
}

impl AxisOpcode {
    pub fn new(axis: AxisState) -> Self {
        Self {
            axis,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opcode.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The symbolic form of one block while it is being assembled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpcodeBlockFourAxis {
    pub x: AxisOpcode,
    pub y: AxisOpcode,
    pub z: AxisOpcode,
    pub a: AxisOpcode,
    pub info: AxisOpcode,
}

impl OpcodeBlockFourAxis {
    pub fn slot(&self, axis: AxisState) -> Option<&AxisOpcode> {
        match axis {
            AxisState::X => Some(&self.x),
            AxisState::Y => Some(&self.y),
            AxisState::Z => Some(&self.z),
            AxisState::A => Some(&self.a),
            AxisState::Info => Some(&self.info),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self, axis: AxisState) -> Option<&mut AxisOpcode> {
        match axis {
            AxisState::X => Some(&mut self.x),
            AxisState::Y => Some(&mut self.y),
            AxisState::Z => Some(&mut self.z),
            AxisState::A => Some(&mut self.a),
            AxisState::Info => Some(&mut self.info),
            _ => None,
        }
    }
}

/// One axis worth of staging register values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisOpcodeBinary {
    pub instruction: u32,
    pub pulse_rate: u32,
    pub pulse_count: u32,
    pub pulse_width: u32,
}

impl AxisOpcodeBinary {
    pub const NOP: Self = Self {
        instruction: Instruction::Nop as u32,
        pulse_rate: 0,
        pulse_count: 0,
        pulse_width: 0,
    };

    pub fn has_pulses(&self) -> bool {
        self.pulse_rate != 0 || self.pulse_count != 0 || self.pulse_width != 0
    }
}

/// The atomic unit the hardware executes: all four axes start together and
/// the block retires only when every axis has finished.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpcodeBlockFourAxisBinary {
    pub x: AxisOpcodeBinary,
    pub y: AxisOpcodeBinary,
    pub z: AxisOpcodeBinary,
    pub a: AxisOpcodeBinary,
}

impl OpcodeBlockFourAxisBinary {
    pub fn axis(&self, axis: AxisState) -> Option<&AxisOpcodeBinary> {
        match axis {
            AxisState::X => Some(&self.x),
            AxisState::Y => Some(&self.y),
            AxisState::Z => Some(&self.z),
            AxisState::A => Some(&self.a),
            _ => None,
        }
    }

    pub fn axis_mut(&mut self, axis: AxisState) -> Option<&mut AxisOpcodeBinary> {
        match axis {
            AxisState::X => Some(&mut self.x),
            AxisState::Y => Some(&mut self.y),
            AxisState::Z => Some(&mut self.z),
            AxisState::A => Some(&mut self.a),
            _ => None,
        }
    }

    /// Axes paired with their values in staging order.
    pub fn axes(&self) -> [(AxisState, &AxisOpcodeBinary); 4] {
        [
            (AxisState::X, &self.x),
            (AxisState::Y, &self.y),
            (AxisState::Z, &self.z),
            (AxisState::A, &self.a),
        ]
    }
}
