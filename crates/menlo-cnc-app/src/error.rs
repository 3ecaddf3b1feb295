use menlo_cnc::image::ImageError;
use menlo_cnc::timing::TimingError;
use menlo_cnc::{AssemblerError, InstructionError};
use menlo_fpga::HardwareError;
use thiserror_no_std::Error;

use crate::devmem::DevMemError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{path}: {err}")]
    Io { path: String, err: std::io::Error },
    #[error("bad configuration: {0}")]
    Config(serde_yaml::Error),
    #[error("{0}")]
    Assembler(AssemblerError),
    #[error("{0}")]
    Image(ImageError),
    #[error("cannot disassemble: {0}")]
    Disassembly(InstructionError),
    #[error("{0}")]
    Timing(TimingError),
    #[error("{0}")]
    DevMem(DevMemError),
    #[error("{0}")]
    Hardware(HardwareError),
}

impl AppError {
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        AppError::Io {
            path: path.display().to_string(),
            err,
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(err)
    }
}

impl From<AssemblerError> for AppError {
    fn from(err: AssemblerError) -> Self {
        AppError::Assembler(err)
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        AppError::Image(err)
    }
}

impl From<InstructionError> for AppError {
    fn from(err: InstructionError) -> Self {
        AppError::Disassembly(err)
    }
}

impl From<TimingError> for AppError {
    fn from(err: TimingError) -> Self {
        AppError::Timing(err)
    }
}

impl From<DevMemError> for AppError {
    fn from(err: DevMemError) -> Self {
        AppError::DevMem(err)
    }
}

impl From<HardwareError> for AppError {
    fn from(err: HardwareError) -> Self {
        AppError::Hardware(err)
    }
}
