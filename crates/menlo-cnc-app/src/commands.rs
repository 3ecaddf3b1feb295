use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use menlo_cnc::disasm::disassemble_program;
use menlo_cnc::{image, Assembler, AxisOpcodeBinary, Instruction, OpcodeBlockFourAxisBinary, Program};
use menlo_fpga::{Controller, RegisterFile, SimRegisters};

use crate::config::AppConfig;
use crate::devmem::DevMem;
use crate::error::AppError;

/// Files with this extension are read as program images, anything else as
/// source text.
pub const IMAGE_EXTENSION: &str = "mcnc";

const GPIO_BITS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    DevMem,
    Simulator,
}

type Cnc<'a> = Controller<&'a mut dyn RegisterFile>;

fn with_controller<T>(
    config: &AppConfig,
    target: Target,
    run: impl FnOnce(&mut Cnc<'_>) -> Result<T, AppError>,
) -> Result<T, AppError> {
    match target {
        Target::Simulator => {
            log::info!("using the register simulator");
            let mut sim = SimRegisters::new();
            let mut cnc = Controller::new(&mut sim as &mut dyn RegisterFile, config.controller);
            run(&mut cnc)
        }
        Target::DevMem => {
            let mut mem = DevMem::open(&config.map)?;
            let mut cnc = Controller::new(&mut mem as &mut dyn RegisterFile, config.controller);
            run(&mut cnc)
        }
    }
}

pub fn load_program(path: &Path) -> Result<Program, AppError> {
    if path.extension().is_some_and(|ext| ext == IMAGE_EXTENSION) {
        let bytes = fs::read(path).map_err(|err| AppError::io(path, err))?;
        return Ok(image::decode(&bytes)?);
    }
    let source = fs::read_to_string(path).map_err(|err| AppError::io(path, err))?;
    Ok(Assembler::assemble_str(&source)?)
}

pub fn assemble(source: &Path, output: Option<&Path>) -> Result<(), AppError> {
    let program = load_program(source)?;
    log::info!("{}: {} blocks", source.display(), program.blocks.len());
    match output {
        Some(output) => {
            let bytes = image::encode(&program)?;
            fs::write(output, &bytes).map_err(|err| AppError::io(output, err))?;
            log::info!("wrote {} bytes to {}", bytes.len(), output.display());
        }
        None => print!("{}", disassemble_program(&program)?),
    }
    Ok(())
}

pub fn disasm(image_path: &Path) -> Result<(), AppError> {
    let bytes = fs::read(image_path).map_err(|err| AppError::io(image_path, err))?;
    let program = image::decode(&bytes)?;
    print!("{}", disassemble_program(&program)?);
    Ok(())
}

pub fn run(config: &AppConfig, target: Target, path: &Path) -> Result<(), AppError> {
    let program = load_program(path)?;
    let mut blocks = program.blocks;
    with_controller(config, target, |cnc| {
        cnc.initialize()?;
        cnc.reset();
        let committed = cnc.execute(&mut blocks)?;
        let status = cnc.wait_for_idle()?;
        log::info!("{} blocks executed, status {}", committed, status);
        Ok(())
    })
}

pub fn test_cnc(config: &AppConfig, target: Target) -> Result<(), AppError> {
    with_controller(config, target, |cnc| {
        cnc.initialize()?;
        log::info!("register map found, status {}", cnc.status());
        cnc.register_test()?;
        log::info!("register test passed");
        Ok(())
    })
}

pub fn pulse_block(
    config: &AppConfig,
    frequency: f64,
    count: u32,
    width_ns: u32,
) -> Result<OpcodeBlockFourAxisBinary, AppError> {
    let x = AxisOpcodeBinary {
        instruction: u32::from(Instruction::Cw),
        pulse_rate: config.timing.pulse_rate_for_hz(frequency)?,
        pulse_count: count,
        pulse_width: config.timing.pulse_width_for_ns(width_ns)?,
    };
    Ok(OpcodeBlockFourAxisBinary {
        x,
        ..OpcodeBlockFourAxisBinary::default()
    })
}

pub fn test_pulse(
    config: &AppConfig,
    target: Target,
    frequency: f64,
    count: u32,
    width_ns: u32,
) -> Result<(), AppError> {
    let block = pulse_block(config, frequency, count, width_ns)?;
    log::info!(
        "{} Hz: rate {}, width {}, {} pulses",
        frequency,
        block.x.pulse_rate,
        block.x.pulse_width,
        count
    );
    with_controller(config, target, |cnc| {
        cnc.initialize()?;
        cnc.reset();
        cnc.load_block(&block, true)?;
        let status = cnc.wait_for_idle()?;
        log::info!("pulse train done, status {}", status);
        Ok(())
    })
}

fn walking_bit(bit: usize) -> [u32; 4] {
    let mut outputs = [0; 4];
    if let Some(word) = outputs.get_mut(bit / 32) {
        *word = 1 << (bit % 32);
    }
    outputs
}

pub fn test_leds(config: &AppConfig, target: Target, delay_ms: u64) -> Result<(), AppError> {
    with_controller(config, target, |cnc| {
        cnc.initialize()?;
        for bit in 0..GPIO_BITS {
            cnc.write_gpio_outputs(walking_bit(bit));
            thread::sleep(Duration::from_millis(delay_ms));
        }
        cnc.write_gpio_outputs([0; 4]);
        log::info!("inputs {:08x?}", cnc.read_gpio_inputs());
        Ok(())
    })
}
