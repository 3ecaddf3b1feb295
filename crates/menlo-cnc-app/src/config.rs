use std::fs::File;
use std::path::Path;

use menlo_cnc::timing::TimingConfig;
use menlo_fpga::registers::REGISTER_FILE_BYTES;
use menlo_fpga::ControllerConfig;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lightweight HPS-to-FPGA bridge on the Cyclone V SoC.
pub const LW_BRIDGE_BASE: u64 = 0xFF20_0000;

/// Where the register file sits in physical memory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MapConfig {
    pub device: String,
    pub physical_base: u64,
    /// Offset of the pulse generator within the bridge window.
    pub bridge_offset: u64,
    pub span: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            device: "/dev/mem".to_string(),
            physical_base: LW_BRIDGE_BASE,
            bridge_offset: 0,
            span: REGISTER_FILE_BYTES,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapConfig,
    pub controller: ControllerConfig,
    pub timing: TimingConfig,
}

impl AppConfig {
    pub fn read(file: &mut File) -> Result<AppConfig, serde_yaml::Error> {
        let config: AppConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Load `path`, or the built in defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
        let Some(path) = path else {
            return Ok(AppConfig::default());
        };
        let mut file = File::open(path).map_err(|err| AppError::io(path, err))?;
        let config = Self::read(&mut file)?;
        log::debug!("loaded {}: {:?}", path.display(), config);
        Ok(config)
    }
}
