//! Memory mapped register file of the pulse generator.
//!
//! `MenloCncRegisters` is a wire format: the field order and widths match
//! the FPGA bridge and must not be reordered. Word offsets from the base:
//!
//! | Offset | Contents |
//! |---|---|
//! | 0x00 | status |
//! | 0x04 | command |
//! | 0x08 | interface version |
//! | 0x10 + 0x10 * n | staging for X, Y, Z, A, B, C, U, V, W, spindle |
//! | 0xB0 | gpio inputs 0-3 |
//! | 0xC0 | gpio outputs 0-3 |
//! | 0xD0 | expansion inputs 0-3 |
//! | 0xE0 | expansion outputs 0-3 |
//! | 0xF0 | sentinels `0xA5A5A5A5`, `0x5A5A5A5A` |
use core::fmt;
use core::mem::{offset_of, size_of};

use menlo_cnc::AxisState;

pub const STATUS_FBF: u32 = 1 << 0;
pub const STATUS_FBE: u32 = 1 << 1;
pub const STATUS_ERR: u32 = 1 << 2;
pub const STATUS_BSY: u32 = 1 << 3;
pub const STATUS_IDL: u32 = 1 << 4;
pub const STATUS_EMS: u32 = 1 << 5;
pub const STATUS_SFE: u32 = 1 << 6;

/// Reset the timing engine and flush the FIFO.
pub const COMMAND_RST: u32 = 1 << 0;
/// Clear buffer flags, which releases the sticky FIFO empty latch.
pub const COMMAND_CBF: u32 = 1 << 1;
/// Enable axis motion now.
pub const COMMAND_EAN: u32 = 1 << 2;
/// Software emergency stop.
pub const COMMAND_EMS: u32 = 1 << 3;
/// Commit the staged X, Y, Z and A registers to the FIFO as one block.
pub const COMMAND_CMD: u32 = 1 << 4;

pub const SENTINEL0_VALUE: u32 = 0xA5A5_A5A5;
pub const SENTINEL1_VALUE: u32 = 0x5A5A_5A5A;
pub const INTERFACE_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisRegisters {
    pub pulse_rate: u32,
    pub pulse_count: u32,
    pub pulse_width: u32,
    pub instruction: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MenloCncRegisters {
    pub status: u32,
    pub command: u32,
    pub interface_version: u32,
    pub reserved0: u32,
    pub x: AxisRegisters,
    pub y: AxisRegisters,
    pub z: AxisRegisters,
    pub a: AxisRegisters,
    pub b: AxisRegisters,
    pub c: AxisRegisters,
    pub u: AxisRegisters,
    pub v: AxisRegisters,
    pub w: AxisRegisters,
    pub spindle: AxisRegisters,
    pub gpio_input: [u32; 4],
    pub gpio_output: [u32; 4],
    pub expansion_input: [u32; 4],
    pub expansion_output: [u32; 4],
    pub sentinel0: u32,
    pub sentinel1: u32,
    pub reserved1: [u32; 2],
}

pub const REGISTER_FILE_BYTES: usize = size_of::<MenloCncRegisters>();
pub const REGISTER_WORDS: usize = REGISTER_FILE_BYTES / size_of::<u32>();

const _: () = assert!(offset_of!(MenloCncRegisters, command) == 0x04);
const _: () = assert!(offset_of!(MenloCncRegisters, x) == 0x10);
const _: () = assert!(offset_of!(MenloCncRegisters, y) == 0x20);
const _: () = assert!(offset_of!(MenloCncRegisters, z) == 0x30);
const _: () = assert!(offset_of!(MenloCncRegisters, a) == 0x40);
const _: () = assert!(offset_of!(AxisRegisters, instruction) == 0x0C);
const _: () = assert!(offset_of!(MenloCncRegisters, gpio_input) == 0xB0);
const _: () = assert!(offset_of!(MenloCncRegisters, sentinel0) == 0xF0);
const _: () = assert!(REGISTER_FILE_BYTES == 0x100);

/// Axes with a staging register group, in register file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwAxis {
    X,
    Y,
    Z,
    A,
    B,
    C,
    U,
    V,
    W,
    Spindle,
}

impl HwAxis {
    pub const ALL: [HwAxis; 10] = [
        HwAxis::X,
        HwAxis::Y,
        HwAxis::Z,
        HwAxis::A,
        HwAxis::B,
        HwAxis::C,
        HwAxis::U,
        HwAxis::V,
        HwAxis::W,
        HwAxis::Spindle,
    ];

    pub fn from_axis(axis: AxisState) -> Option<Self> {
        match axis {
            AxisState::X => Some(HwAxis::X),
            AxisState::Y => Some(HwAxis::Y),
            AxisState::Z => Some(HwAxis::Z),
            AxisState::A => Some(HwAxis::A),
            AxisState::B => Some(HwAxis::B),
            AxisState::C => Some(HwAxis::C),
            AxisState::U => Some(HwAxis::U),
            AxisState::V => Some(HwAxis::V),
            AxisState::W => Some(HwAxis::W),
            _ => None,
        }
    }

    const fn base(self) -> usize {
        match self {
            HwAxis::X => offset_of!(MenloCncRegisters, x),
            HwAxis::Y => offset_of!(MenloCncRegisters, y),
            HwAxis::Z => offset_of!(MenloCncRegisters, z),
            HwAxis::A => offset_of!(MenloCncRegisters, a),
            HwAxis::B => offset_of!(MenloCncRegisters, b),
            HwAxis::C => offset_of!(MenloCncRegisters, c),
            HwAxis::U => offset_of!(MenloCncRegisters, u),
            HwAxis::V => offset_of!(MenloCncRegisters, v),
            HwAxis::W => offset_of!(MenloCncRegisters, w),
            HwAxis::Spindle => offset_of!(MenloCncRegisters, spindle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisField {
    PulseRate,
    PulseCount,
    PulseWidth,
    Instruction,
}

impl AxisField {
    pub const ALL: [AxisField; 4] = [
        AxisField::PulseRate,
        AxisField::PulseCount,
        AxisField::PulseWidth,
        AxisField::Instruction,
    ];

    const fn offset(self) -> usize {
        match self {
            AxisField::PulseRate => offset_of!(AxisRegisters, pulse_rate),
            AxisField::PulseCount => offset_of!(AxisRegisters, pulse_count),
            AxisField::PulseWidth => offset_of!(AxisRegisters, pulse_width),
            AxisField::Instruction => offset_of!(AxisRegisters, instruction),
        }
    }
}

/// One of the four words of a 128 bit I/O group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Bank0,
    Bank1,
    Bank2,
    Bank3,
}

impl Bank {
    pub const ALL: [Bank; 4] = [Bank::Bank0, Bank::Bank1, Bank::Bank2, Bank::Bank3];

    const fn offset(self) -> usize {
        match self {
            Bank::Bank0 => 0,
            Bank::Bank1 => 4,
            Bank::Bank2 => 8,
            Bank::Bank3 => 12,
        }
    }
}

/// A single 32 bit register in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Status,
    Command,
    InterfaceVersion,
    Axis(HwAxis, AxisField),
    GpioInput(Bank),
    GpioOutput(Bank),
    ExpansionInput(Bank),
    ExpansionOutput(Bank),
    Sentinel0,
    Sentinel1,
}

impl Register {
    /// Byte offset from the register file base.
    pub const fn offset(self) -> usize {
        match self {
            Register::Status => offset_of!(MenloCncRegisters, status),
            Register::Command => offset_of!(MenloCncRegisters, command),
            Register::InterfaceVersion => offset_of!(MenloCncRegisters, interface_version),
            Register::Axis(axis, field) => axis.base().saturating_add(field.offset()),
            Register::GpioInput(bank) => {
                offset_of!(MenloCncRegisters, gpio_input).saturating_add(bank.offset())
            }
            Register::GpioOutput(bank) => {
                offset_of!(MenloCncRegisters, gpio_output).saturating_add(bank.offset())
            }
            Register::ExpansionInput(bank) => {
                offset_of!(MenloCncRegisters, expansion_input).saturating_add(bank.offset())
            }
            Register::ExpansionOutput(bank) => {
                offset_of!(MenloCncRegisters, expansion_output).saturating_add(bank.offset())
            }
            Register::Sentinel0 => offset_of!(MenloCncRegisters, sentinel0),
            Register::Sentinel1 => offset_of!(MenloCncRegisters, sentinel1),
        }
    }

    /// Word index from the register file base.
    pub const fn word(self) -> usize {
        self.offset() / size_of::<u32>()
    }

    /// Every staging register in register file order. The position in this
    /// sequence is the ordinal the self test reports.
    pub fn axis_registers() -> impl Iterator<Item = Register> {
        HwAxis::ALL.into_iter().flat_map(|axis| {
            AxisField::ALL
                .into_iter()
                .map(move |field| Register::Axis(axis, field))
        })
    }

    /// Registers software may write. `initialize` zeroes these.
    pub fn writable() -> impl Iterator<Item = Register> {
        core::iter::once(Register::Command)
            .chain(Self::axis_registers())
            .chain(Bank::ALL.into_iter().map(Register::GpioOutput))
            .chain(Bank::ALL.into_iter().map(Register::ExpansionOutput))
    }
}

/// Decoded view of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status(pub u32);

impl Status {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn fifo_full(&self) -> bool {
        self.0 & STATUS_FBF != 0
    }

    pub fn fifo_empty(&self) -> bool {
        self.0 & STATUS_FBE != 0
    }

    pub fn error(&self) -> bool {
        self.0 & STATUS_ERR != 0
    }

    pub fn busy(&self) -> bool {
        self.0 & STATUS_BSY != 0
    }

    pub fn idle(&self) -> bool {
        self.0 & STATUS_IDL != 0
    }

    pub fn emergency_stop(&self) -> bool {
        self.0 & STATUS_EMS != 0
    }

    /// The FIFO ran dry at some point since the last `CBF`.
    pub fn sticky_fifo_empty(&self) -> bool {
        self.0 & STATUS_SFE != 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u32, &str); 7] = [
            (STATUS_FBF, "FBF"),
            (STATUS_FBE, "FBE"),
            (STATUS_ERR, "ERR"),
            (STATUS_BSY, "BSY"),
            (STATUS_IDL, "IDL"),
            (STATUS_EMS, "EMS"),
            (STATUS_SFE, "SFE"),
        ];
        write!(f, "{:#010x} [", self.0)?;
        let mut first = true;
        for (bit, name) in NAMES {
            if self.0 & bit != 0 {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        f.write_str("]")
    }
}
