//! In memory stand-in for the pulse generator, used for `--simulate` runs
//! and protocol tests.
use heapless::Deque;
use menlo_cnc::{AxisOpcodeBinary, OpcodeBlockFourAxisBinary};

use crate::registers::{
    AxisField, Bank, HwAxis, Register, COMMAND_CBF, COMMAND_CMD, COMMAND_EAN, COMMAND_EMS,
    COMMAND_RST, INTERFACE_VERSION, REGISTER_WORDS, SENTINEL0_VALUE, SENTINEL1_VALUE, STATUS_BSY,
    STATUS_EMS, STATUS_ERR, STATUS_FBE, STATUS_FBF, STATUS_IDL, STATUS_SFE,
};
use crate::RegisterFile;

pub const SIM_FIFO_CAP: usize = 16;

/// Wiring faults the simulator can be told to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderFault {
    /// Reads of `register` come back with `high` bits set and `low` bits
    /// cleared, whatever was written.
    StuckBits { register: Register, high: u32, low: u32 },
    /// Accesses to `register` land on `target` instead.
    Alias { register: Register, target: Register },
}

pub struct SimRegisters {
    words: [u32; REGISTER_WORDS],
    fifo: Deque<OpcodeBlockFourAxisBinary, SIM_FIFO_CAP>,
    depth: usize,
    running: bool,
    auto_drain: bool,
    forced_error: bool,
    overflow: bool,
    emergency: bool,
    sticky_empty: bool,
    fault: Option<DecoderFault>,
    committed: usize,
    retired: usize,
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisters {
    pub fn new() -> Self {
        let mut sim = Self {
            words: [0; REGISTER_WORDS],
            fifo: Deque::new(),
            depth: SIM_FIFO_CAP,
            running: false,
            auto_drain: true,
            forced_error: false,
            overflow: false,
            emergency: false,
            sticky_empty: false,
            fault: None,
            committed: 0,
            retired: 0,
        };
        sim.set_word(Register::Sentinel0, SENTINEL0_VALUE);
        sim.set_word(Register::Sentinel1, SENTINEL1_VALUE);
        sim.set_word(Register::InterfaceVersion, INTERFACE_VERSION);
        sim
    }

    /// Limit the FIFO to `depth` blocks, at most [`SIM_FIFO_CAP`].
    pub fn with_fifo_depth(mut self, depth: usize) -> Self {
        self.depth = depth.clamp(1, SIM_FIFO_CAP);
        self
    }

    /// When set, each status read while motion is enabled retires one block.
    pub fn set_auto_drain(&mut self, auto_drain: bool) {
        self.auto_drain = auto_drain;
    }

    pub fn set_fault(&mut self, fault: Option<DecoderFault>) {
        self.fault = fault;
    }

    pub fn force_error(&mut self, error: bool) {
        self.forced_error = error;
    }

    /// Latch an emergency stop as if the hardware input had tripped.
    pub fn trip_emergency_stop(&mut self) {
        self.emergency = true;
        self.running = false;
    }

    /// Write a register image word directly, bypassing faults and
    /// read-only rules.
    pub fn set_word(&mut self, register: Register, value: u32) {
        if let Some(word) = self.words.get_mut(register.word()) {
            *word = value;
        }
    }

    pub fn word(&self, register: Register) -> u32 {
        self.words.get(register.word()).copied().unwrap_or(0)
    }

    pub fn set_gpio_input(&mut self, bank: Bank, value: u32) {
        self.set_word(Register::GpioInput(bank), value);
    }

    /// Retire up to `count` blocks. Returns how many were retired.
    pub fn drain(&mut self, count: usize) -> usize {
        let mut drained: usize = 0;
        while drained < count && self.retire_one() {
            drained = drained.saturating_add(1);
        }
        drained
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    pub fn fifo(&self) -> impl Iterator<Item = &OpcodeBlockFourAxisBinary> {
        self.fifo.iter()
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn retired(&self) -> usize {
        self.retired
    }

    pub fn running(&self) -> bool {
        self.running
    }

    fn retire_one(&mut self) -> bool {
        if self.fifo.pop_front().is_none() {
            return false;
        }
        self.retired = self.retired.saturating_add(1);
        if self.fifo.is_empty() && self.running {
            self.sticky_empty = true;
        }
        true
    }

    fn status_bits(&self) -> u32 {
        let mut bits = 0;
        if self.fifo.len() >= self.depth {
            bits |= STATUS_FBF;
        }
        if self.fifo.is_empty() {
            bits |= STATUS_FBE;
        }
        if self.forced_error || self.overflow {
            bits |= STATUS_ERR;
        }
        if self.running && !self.fifo.is_empty() {
            bits |= STATUS_BSY;
        } else {
            bits |= STATUS_IDL;
        }
        if self.emergency {
            bits |= STATUS_EMS;
        }
        if self.sticky_empty {
            bits |= STATUS_SFE;
        }
        bits
    }

    fn staged_axis(&self, axis: HwAxis) -> AxisOpcodeBinary {
        let word = |field| self.word(Register::Axis(axis, field));
        AxisOpcodeBinary {
            instruction: word(AxisField::Instruction),
            pulse_rate: word(AxisField::PulseRate),
            pulse_count: word(AxisField::PulseCount),
            pulse_width: word(AxisField::PulseWidth),
        }
    }

    fn command(&mut self, value: u32) {
        if value & COMMAND_RST != 0 {
            self.fifo.clear();
            self.running = false;
            self.overflow = false;
            self.emergency = false;
            self.sticky_empty = false;
        }
        if value & COMMAND_CBF != 0 {
            self.sticky_empty = false;
        }
        if value & COMMAND_EMS != 0 {
            self.trip_emergency_stop();
        }
        if value & COMMAND_CMD != 0 && !self.emergency {
            let block = OpcodeBlockFourAxisBinary {
                x: self.staged_axis(HwAxis::X),
                y: self.staged_axis(HwAxis::Y),
                z: self.staged_axis(HwAxis::Z),
                a: self.staged_axis(HwAxis::A),
            };
            if self.fifo.len() >= self.depth || self.fifo.push_back(block).is_err() {
                self.overflow = true;
            } else {
                self.committed = self.committed.saturating_add(1);
            }
        }
        if value & COMMAND_EAN != 0 && !self.emergency {
            self.running = true;
        }
        self.set_word(Register::Command, value);
    }

    fn resolve(&self, register: Register) -> Register {
        match self.fault {
            Some(DecoderFault::Alias { register: from, target }) if from == register => target,
            _ => register,
        }
    }
}

impl RegisterFile for SimRegisters {
    fn read(&mut self, register: Register) -> u32 {
        let register = self.resolve(register);
        let value = match register {
            Register::Status => {
                if self.running && self.auto_drain {
                    self.retire_one();
                }
                self.status_bits()
            }
            _ => self.word(register),
        };
        match self.fault {
            Some(DecoderFault::StuckBits {
                register: stuck,
                high,
                low,
            }) if stuck == register => (value | high) & !low,
            _ => value,
        }
    }

    fn write(&mut self, register: Register, value: u32) {
        let register = self.resolve(register);
        match register {
            Register::Command => self.command(value),
            Register::Axis(..) | Register::GpioOutput(_) | Register::ExpansionOutput(_) => {
                self.set_word(register, value)
            }
            // Read only.
            Register::Status
            | Register::InterfaceVersion
            | Register::GpioInput(_)
            | Register::ExpansionInput(_)
            | Register::Sentinel0
            | Register::Sentinel1 => {}
        }
    }
}
