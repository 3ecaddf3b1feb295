//! Register access through a `/dev/mem` mapping of the FPGA bridge.
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr;

use menlo_fpga::registers::REGISTER_FILE_BYTES;
use menlo_fpga::{Register, RegisterFile};
use thiserror_no_std::Error;

use crate::config::MapConfig;

#[derive(Error, Debug)]
pub enum DevMemError {
    #[error("cannot open {device}: {err}")]
    Open { device: String, err: std::io::Error },
    #[error("mmap of {span:#x} bytes at {address:#x} failed: {err}")]
    Map {
        address: u64,
        span: usize,
        err: std::io::Error,
    },
    #[error("window of {span:#x} bytes is smaller than the register file")]
    SpanTooSmall { span: usize },
    #[error("address {address:#x} is not word aligned or out of range")]
    BadAddress { address: u64 },
}

/// A live mapping of the register file. Unmapped on drop.
pub struct DevMem {
    map: *mut libc::c_void,
    map_len: usize,
    registers: *mut u32,
    _file: File,
}

impl DevMem {
    pub fn open(config: &MapConfig) -> Result<Self, DevMemError> {
        if config.span < REGISTER_FILE_BYTES {
            return Err(DevMemError::SpanTooSmall { span: config.span });
        }
        let address = config
            .physical_base
            .checked_add(config.bridge_offset)
            .ok_or(DevMemError::BadAddress {
                address: config.physical_base,
            })?;
        if address % 4 != 0 {
            return Err(DevMemError::BadAddress { address });
        }

        // mmap wants a page aligned offset.
        // SAFETY: sysconf only reads a configuration value.
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page = u64::try_from(page).unwrap_or(4096).max(1);
        let page_base = address - address % page;
        let delta = usize::try_from(address - page_base)
            .map_err(|_| DevMemError::BadAddress { address })?;
        let map_len = delta
            .checked_add(config.span)
            .ok_or(DevMemError::BadAddress { address })?;
        // off_t is 32 bits on the SoC's ARM core, too small for the bridge.
        let offset =
            libc::off64_t::try_from(page_base).map_err(|_| DevMemError::BadAddress { address })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&config.device)
            .map_err(|err| DevMemError::Open {
                device: config.device.clone(),
                err,
            })?;

        let map = unsafe {
            libc::mmap64(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if map == libc::MAP_FAILED {
            return Err(DevMemError::Map {
                address,
                span: config.span,
                err: std::io::Error::last_os_error(),
            });
        }
        log::debug!(
            "mapped {:#x} bytes of {} at {:#x}",
            config.span,
            config.device,
            address
        );

        // SAFETY: delta is inside the mapping just created.
        let registers = unsafe { map.cast::<u8>().add(delta).cast::<u32>() };
        Ok(Self {
            map,
            map_len,
            registers,
            _file: file,
        })
    }
}

impl RegisterFile for DevMem {
    fn read(&mut self, register: Register) -> u32 {
        // SAFETY: every register word lies inside the mapped span, which
        // `open` checked covers the whole register file.
        unsafe { ptr::read_volatile(self.registers.add(register.word())) }
    }

    fn write(&mut self, register: Register, value: u32) {
        // SAFETY: as for `read`.
        unsafe { ptr::write_volatile(self.registers.add(register.word()), value) }
    }
}

impl Drop for DevMem {
    fn drop(&mut self) {
        // SAFETY: map and map_len are exactly what mmap returned and took,
        // and no register pointer outlives self.
        unsafe {
            libc::munmap(self.map, self.map_len);
        }
    }
}
