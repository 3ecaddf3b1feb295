use menlo_cnc::{BlockArray, OpcodeBlockFourAxisBinary};
use serde::{Deserialize, Serialize};

use crate::registers::{
    AxisField, Bank, HwAxis, Register, Status, COMMAND_CBF, COMMAND_CMD, COMMAND_EAN,
    COMMAND_EMS, COMMAND_RST, INTERFACE_VERSION, SENTINEL0_VALUE, SENTINEL1_VALUE,
};
use crate::{HardwareError, RegisterFile};

pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;

const TEST_PATTERNS: [u32; 4] = [0x0000_0000, 0xFFFF_FFFF, 0x5555_5555, 0xAAAA_AAAA];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Status reads a spin wait may make before giving up.
    pub poll_limit: u32,
    /// Set `EAN` together with `CMD` so blocks start as soon as they land.
    pub start_on_commit: bool,
    /// Read status after every staging write and stop on `ERR`.
    pub check_status_on_stage: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_limit: DEFAULT_POLL_LIMIT,
            start_on_commit: true,
            check_status_on_stage: true,
        }
    }
}

/// Handle on one pulse generator. Owns the register access for its whole
/// lifetime; nothing else may touch the registers while it exists.
pub struct Controller<R: RegisterFile> {
    registers: R,
    config: ControllerConfig,
}

impl<R: RegisterFile> Controller<R> {
    pub fn new(registers: R, config: ControllerConfig) -> Self {
        Self { registers, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.registers
    }

    pub fn into_inner(self) -> R {
        self.registers
    }

    pub fn status(&mut self) -> Status {
        Status(self.registers.read(Register::Status))
    }

    /// Check the register map is the one this code was written for, then
    /// zero every writable register.
    pub fn initialize(&mut self) -> Result<(), HardwareError> {
        for (register, expected) in [
            (Register::Sentinel0, SENTINEL0_VALUE),
            (Register::Sentinel1, SENTINEL1_VALUE),
        ] {
            let actual = self.registers.read(register);
            if actual != expected {
                log::warn!("sentinel {:?} read {:#010x}", register, actual);
                return Err(HardwareError::SentinelMismatch {
                    offset: register.offset(),
                    expected,
                    actual,
                });
            }
        }
        let version = self.registers.read(Register::InterfaceVersion);
        if version != INTERFACE_VERSION {
            return Err(HardwareError::InterfaceVersion {
                expected: INTERFACE_VERSION,
                actual: version,
            });
        }
        self.zero_writable();
        log::debug!("controller initialized, status {}", self.status());
        Ok(())
    }

    fn zero_writable(&mut self) {
        for register in Register::writable() {
            self.registers.write(register, 0);
        }
    }

    /// Write and read back every staging register with fixed patterns, then
    /// with each register's own ordinal to catch address decoder faults.
    /// The first mismatch is returned; wiring faults are not retried.
    pub fn register_test(&mut self) -> Result<(), HardwareError> {
        for pattern in TEST_PATTERNS {
            log::debug!("register test pattern {:#010x}", pattern);
            for (ordinal, register) in Register::axis_registers().enumerate() {
                self.registers.write(register, pattern);
                self.expect_register(ordinal, register, pattern)?;
            }
        }

        // Everything is written before anything is read back, otherwise two
        // registers sharing an address would still read back correctly.
        for (ordinal, register) in Register::axis_registers().enumerate() {
            self.registers.write(register, ordinal as u32);
        }
        for (ordinal, register) in Register::axis_registers().enumerate() {
            self.expect_register(ordinal, register, ordinal as u32)?;
        }

        self.zero_writable();
        Ok(())
    }

    fn expect_register(
        &mut self,
        ordinal: usize,
        register: Register,
        expected: u32,
    ) -> Result<(), HardwareError> {
        let actual = self.registers.read(register);
        if actual != expected {
            log::warn!(
                "register {} ({:?}) wrote {:#010x} read {:#010x}",
                ordinal,
                register,
                expected,
                actual
            );
            return Err(HardwareError::RegisterTest {
                ordinal,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Reset the timing engine and flush the FIFO.
    pub fn reset(&mut self) {
        self.registers.write(Register::Command, COMMAND_RST);
    }

    pub fn emergency_stop(&mut self) -> Status {
        self.registers.write(Register::Command, COMMAND_EMS);
        let status = self.status();
        log::warn!("emergency stop requested, status {}", status);
        status
    }

    pub fn clear_sticky_empty(&mut self) {
        self.registers.write(Register::Command, COMMAND_CBF);
    }

    pub fn enable_motion(&mut self) -> Result<Status, HardwareError> {
        self.registers.write(Register::Command, COMMAND_EAN);
        check_status(self.status())
    }

    /// Write the four axis staging groups, X first.
    pub fn stage_block(&mut self, block: &OpcodeBlockFourAxisBinary) -> Result<(), HardwareError> {
        for (axis, value) in block.axes() {
            let Some(axis) = HwAxis::from_axis(axis) else {
                continue;
            };
            for (field, word) in [
                (AxisField::PulseRate, value.pulse_rate),
                (AxisField::PulseCount, value.pulse_count),
                (AxisField::PulseWidth, value.pulse_width),
                (AxisField::Instruction, value.instruction),
            ] {
                self.registers.write(Register::Axis(axis, field), word);
                if self.config.check_status_on_stage {
                    let status = self.status();
                    if status.error() {
                        log::warn!("error while staging {:?} {:?}, status {}", axis, field, status);
                        return Err(HardwareError::Fault { status });
                    }
                }
            }
        }
        Ok(())
    }

    /// Spin until the FIFO can take another block.
    pub fn wait_for_fifo_ready(&mut self) -> Result<Status, HardwareError> {
        self.poll_until(|status| !status.fifo_full())
    }

    /// Spin until every committed block has retired.
    pub fn wait_for_idle(&mut self) -> Result<Status, HardwareError> {
        self.poll_until(|status| status.idle())
    }

    fn poll_until(&mut self, ready: impl Fn(Status) -> bool) -> Result<Status, HardwareError> {
        let mut polls: u32 = 0;
        loop {
            let status = self.status();
            log::trace!("poll {} status {}", polls, status);
            if status.emergency_stop() {
                log::warn!("emergency stop while waiting, status {}", status);
                return Err(HardwareError::EmergencyStop { status });
            }
            if status.error() {
                log::warn!("error while waiting, status {}", status);
                return Err(HardwareError::Fault { status });
            }
            if ready(status) {
                return Ok(status);
            }
            polls = polls.saturating_add(1);
            if polls >= self.config.poll_limit {
                log::warn!("gave up after {} polls, status {}", polls, status);
                return Err(HardwareError::Timeout { status, polls });
            }
            core::hint::spin_loop();
        }
    }

    /// Stage a block, wait for FIFO room and commit it.
    pub fn load_block(
        &mut self,
        block: &OpcodeBlockFourAxisBinary,
        start: bool,
    ) -> Result<Status, HardwareError> {
        self.stage_block(block)?;
        self.wait_for_fifo_ready()?;
        self.commit(start);
        let status = check_status(self.status())?;
        log::debug!("block committed, status {}", status);
        Ok(status)
    }

    fn commit(&mut self, start: bool) {
        let command = if start {
            COMMAND_CMD | COMMAND_EAN
        } else {
            COMMAND_CMD
        };
        self.registers.write(Register::Command, command);
    }

    /// Stream blocks into the FIFO from the cursor of `blocks` to the end.
    /// Returns the number of blocks committed by this call.
    ///
    /// The cursor moves past a block once its command is written. On error
    /// it rests on the first block not yet committed, so calling again
    /// after the fault clears resumes without replaying anything. Use
    /// [`BlockArray::rewind`] to run a program again from the top.
    pub fn execute(
        &mut self,
        blocks: &mut BlockArray<OpcodeBlockFourAxisBinary>,
    ) -> Result<usize, HardwareError> {
        let start = self.config.start_on_commit;
        let mut committed: usize = 0;
        while let Some(&block) = blocks.peek() {
            self.stage_block(&block)?;
            self.wait_for_fifo_ready()?;
            self.commit(start);
            blocks.next();
            committed = committed.saturating_add(1);
            check_status(self.status())?;
        }
        log::debug!("executed {} blocks, {} in program", committed, blocks.len());
        Ok(committed)
    }

    pub fn write_gpio_outputs(&mut self, outputs: [u32; 4]) {
        for (bank, value) in Bank::ALL.into_iter().zip(outputs) {
            self.registers.write(Register::GpioOutput(bank), value);
        }
    }

    pub fn read_gpio_inputs(&mut self) -> [u32; 4] {
        Bank::ALL.map(|bank| self.registers.read(Register::GpioInput(bank)))
    }
}

fn check_status(status: Status) -> Result<Status, HardwareError> {
    if status.emergency_stop() {
        return Err(HardwareError::EmergencyStop { status });
    }
    if status.error() {
        return Err(HardwareError::Fault { status });
    }
    Ok(status)
}
