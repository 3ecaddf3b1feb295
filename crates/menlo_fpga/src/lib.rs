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

pub mod controller;
pub mod registers;
pub mod sim;

#[cfg(test)]
mod test;

use thiserror_no_std::Error;

pub use controller::{Controller, ControllerConfig};
pub use registers::{Register, Status};
pub use sim::{DecoderFault, SimRegisters};

/// Access to the register file. Implementations own whatever makes the
/// registers reachable (a `/dev/mem` mapping, a simulator) and must perform
/// every read and write as a single 32 bit access.
pub trait RegisterFile {
    fn read(&mut self, register: Register) -> u32;
    fn write(&mut self, register: Register, value: u32);
}

impl<R: RegisterFile + ?Sized> RegisterFile for &mut R {
    fn read(&mut self, register: Register) -> u32 {
        (**self).read(register)
    }

    fn write(&mut self, register: Register, value: u32) {
        (**self).write(register, value)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    #[error("hardware reported an error, status {status}")]
    Fault { status: Status },
    #[error("emergency stop asserted, status {status}")]
    EmergencyStop { status: Status },
    #[error("no response after {polls} status polls, status {status}")]
    Timeout { status: Status, polls: u32 },
    #[error("sentinel at offset {offset:#04x} read {actual:#010x}, expected {expected:#010x}")]
    SentinelMismatch {
        offset: usize,
        expected: u32,
        actual: u32,
    },
    #[error("interface version {actual}, expected {expected}")]
    InterfaceVersion { expected: u32, actual: u32 },
    #[error("register {ordinal} failed self test: wrote {expected:#010x}, read {actual:#010x}")]
    RegisterTest {
        ordinal: usize,
        expected: u32,
        actual: u32,
    },
}

impl HardwareError {
    /// Status word captured with the error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            HardwareError::Fault { status }
            | HardwareError::EmergencyStop { status }
            | HardwareError::Timeout { status, .. } => Some(*status),
            _ => None,
        }
    }
}
