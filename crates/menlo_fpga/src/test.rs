use super::*;
use crate::registers::*;
use crate::sim::SIM_FIFO_CAP;
use menlo_cnc::{Assembler, AxisOpcodeBinary, OpcodeBlockFourAxisBinary};

extern crate std;
use std::string::ToString;

const PROGRAM: &str = "
INFO, HEADER, 1, 0, 0
INFO, CONFIG, 4, 0, 0
X, CW, 12500, 400, 25
begin, X, CCW, 12500, 400, 25, Y, CW, 6250, 200, 25, end
begin
Z, CW, 100, 10, 5
A, DWELL, 1000
end
";

fn controller(sim: SimRegisters) -> Controller<SimRegisters> {
    Controller::new(sim, ControllerConfig::default())
}

fn held(mut sim: SimRegisters) -> Controller<SimRegisters> {
    sim.set_auto_drain(false);
    Controller::new(
        sim,
        ControllerConfig {
            poll_limit: 5,
            start_on_commit: false,
            ..ControllerConfig::default()
        },
    )
}

/// Like [`held`] but status is only read while waiting.
fn unchecked(mut sim: SimRegisters) -> Controller<SimRegisters> {
    sim.set_auto_drain(false);
    Controller::new(
        sim,
        ControllerConfig {
            poll_limit: 5,
            start_on_commit: false,
            check_status_on_stage: false,
        },
    )
}

fn sample_block() -> OpcodeBlockFourAxisBinary {
    OpcodeBlockFourAxisBinary {
        x: AxisOpcodeBinary {
            instruction: 1,
            pulse_rate: 12_500,
            pulse_count: 400,
            pulse_width: 25,
        },
        y: AxisOpcodeBinary {
            instruction: 2,
            pulse_rate: 6_250,
            pulse_count: 200,
            pulse_width: 25,
        },
        z: AxisOpcodeBinary::NOP,
        a: AxisOpcodeBinary {
            instruction: 0,
            pulse_rate: 0,
            pulse_count: 1_000,
            pulse_width: 0,
        },
    }
}

#[test]
fn register_layout() {
    assert_eq!(REGISTER_FILE_BYTES, 0x100);
    assert_eq!(Register::Status.offset(), 0x00);
    assert_eq!(Register::Command.offset(), 0x04);
    assert_eq!(Register::InterfaceVersion.offset(), 0x08);
    assert_eq!(Register::Axis(HwAxis::X, AxisField::PulseRate).offset(), 0x10);
    assert_eq!(Register::Axis(HwAxis::A, AxisField::Instruction).offset(), 0x4C);
    assert_eq!(Register::Axis(HwAxis::Spindle, AxisField::Instruction).offset(), 0xAC);
    assert_eq!(Register::GpioOutput(Bank::Bank1).offset(), 0xC4);
    assert_eq!(Register::ExpansionOutput(Bank::Bank3).offset(), 0xEC);
    assert_eq!(Register::Sentinel1.offset(), 0xF4);
    assert_eq!(Register::Sentinel1.word(), 61);
    assert_eq!(Register::axis_registers().count(), 40);
    assert_eq!(Register::writable().count(), 49);
}

#[test]
fn status_display_lists_set_bits() {
    assert_eq!(Status(STATUS_FBE | STATUS_IDL).to_string(), "0x00000012 [FBE IDL]");
    assert_eq!(Status(0).to_string(), "0x00000000 []");
    let status = Status(STATUS_ERR | STATUS_EMS | STATUS_SFE);
    assert!(status.error());
    assert!(status.emergency_stop());
    assert!(status.sticky_fifo_empty());
    assert!(!status.busy());
}

#[test]
fn initialize_checks_identity() {
    let mut cnc = controller(SimRegisters::new());
    cnc.registers_mut()
        .write(Register::Axis(HwAxis::Z, AxisField::PulseCount), 77);
    assert_eq!(cnc.initialize(), Ok(()));
    assert_eq!(
        cnc.registers().word(Register::Axis(HwAxis::Z, AxisField::PulseCount)),
        0
    );

    let mut sim = SimRegisters::new();
    sim.set_word(Register::Sentinel1, 0);
    assert_eq!(
        controller(sim).initialize(),
        Err(HardwareError::SentinelMismatch {
            offset: 0xF4,
            expected: SENTINEL1_VALUE,
            actual: 0,
        })
    );

    let mut sim = SimRegisters::new();
    sim.set_word(Register::InterfaceVersion, 2);
    assert_eq!(
        controller(sim).initialize(),
        Err(HardwareError::InterfaceVersion {
            expected: INTERFACE_VERSION,
            actual: 2,
        })
    );
}

#[test]
fn read_only_registers_ignore_writes() {
    let mut sim = SimRegisters::new();
    sim.write(Register::Sentinel0, 0);
    sim.write(Register::GpioInput(Bank::Bank0), 0xFFFF);
    assert_eq!(sim.read(Register::Sentinel0), SENTINEL0_VALUE);
    assert_eq!(sim.read(Register::GpioInput(Bank::Bank0)), 0);
}

#[test]
fn register_test_passes_on_good_hardware() {
    let mut cnc = controller(SimRegisters::new());
    assert_eq!(cnc.register_test(), Ok(()));
    for register in Register::axis_registers() {
        assert_eq!(cnc.registers().word(register), 0);
    }
}

#[test]
fn register_test_reports_stuck_high_bit() {
    let mut sim = SimRegisters::new();
    sim.set_fault(Some(DecoderFault::StuckBits {
        register: Register::Axis(HwAxis::Y, AxisField::PulseCount),
        high: 0x100,
        low: 0,
    }));
    assert_eq!(
        controller(sim).register_test(),
        Err(HardwareError::RegisterTest {
            ordinal: 5,
            expected: 0,
            actual: 0x100,
        })
    );
}

#[test]
fn register_test_reports_stuck_low_bit() {
    let mut sim = SimRegisters::new();
    sim.set_fault(Some(DecoderFault::StuckBits {
        register: Register::Axis(HwAxis::B, AxisField::PulseWidth),
        high: 0,
        low: 1,
    }));
    assert_eq!(
        controller(sim).register_test(),
        Err(HardwareError::RegisterTest {
            ordinal: 18,
            expected: 0xFFFF_FFFF,
            actual: 0xFFFF_FFFE,
        })
    );
}

#[test]
fn register_test_reports_aliased_address() {
    let mut sim = SimRegisters::new();
    sim.set_fault(Some(DecoderFault::Alias {
        register: Register::Axis(HwAxis::X, AxisField::PulseRate),
        target: Register::Axis(HwAxis::W, AxisField::Instruction),
    }));
    assert_eq!(
        controller(sim).register_test(),
        Err(HardwareError::RegisterTest {
            ordinal: 0,
            expected: 0,
            actual: 35,
        })
    );
}

#[test]
fn load_block_stages_and_commits() {
    let mut cnc = held(SimRegisters::new());
    let block = sample_block();
    let status = cnc.load_block(&block, false).unwrap();
    assert!(!status.fifo_empty());

    let sim = cnc.registers();
    assert_eq!(sim.word(Register::Axis(HwAxis::X, AxisField::Instruction)), 1);
    assert_eq!(sim.word(Register::Axis(HwAxis::Y, AxisField::PulseRate)), 6_250);
    assert_eq!(sim.word(Register::Axis(HwAxis::A, AxisField::PulseCount)), 1_000);
    assert_eq!(sim.committed(), 1);
    assert_eq!(sim.fifo().next(), Some(&block));
    assert!(!sim.running());
}

#[test]
fn error_while_staging_aborts_block() {
    let mut sim = SimRegisters::new();
    sim.force_error(true);
    let mut cnc = held(sim);
    let err = cnc.load_block(&sample_block(), false).unwrap_err();
    assert!(matches!(err, HardwareError::Fault { status } if status.error()));

    // Only the first staging write happened.
    let sim = cnc.registers();
    assert_eq!(sim.word(Register::Axis(HwAxis::X, AxisField::PulseRate)), 12_500);
    assert_eq!(sim.word(Register::Axis(HwAxis::X, AxisField::PulseCount)), 0);
    assert_eq!(sim.committed(), 0);
}

#[test]
fn unchecked_staging_writes_whole_block() {
    let mut sim = SimRegisters::new();
    sim.force_error(true);
    let mut cnc = unchecked(sim);
    let err = cnc.load_block(&sample_block(), false).unwrap_err();
    assert!(matches!(err, HardwareError::Fault { status } if status.error()));

    // The error only shows up once the FIFO wait reads status.
    let sim = cnc.registers();
    assert_eq!(sim.word(Register::Axis(HwAxis::X, AxisField::PulseCount)), 400);
    assert_eq!(sim.word(Register::Axis(HwAxis::Y, AxisField::Instruction)), 2);
    assert_eq!(sim.word(Register::Axis(HwAxis::A, AxisField::PulseCount)), 1_000);
    assert_eq!(sim.committed(), 0);
}

#[test]
fn error_while_waiting_for_room() {
    let mut cnc = unchecked(SimRegisters::new().with_fifo_depth(1));
    cnc.load_block(&sample_block(), false).unwrap();
    cnc.registers_mut().force_error(true);
    let err = cnc.load_block(&sample_block(), false).unwrap_err();
    match err {
        HardwareError::Fault { status } => {
            assert!(status.error());
            assert!(status.fifo_full());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(cnc.registers().committed(), 1);
    assert_eq!(cnc.registers().fifo_len(), 1);
}

#[test]
fn emergency_stop_while_waiting() {
    let mut cnc = held(SimRegisters::new().with_fifo_depth(1));
    cnc.load_block(&sample_block(), false).unwrap();
    cnc.registers_mut().trip_emergency_stop();
    let err = cnc.load_block(&sample_block(), false).unwrap_err();
    assert!(matches!(err, HardwareError::EmergencyStop { .. }));
    assert_eq!(cnc.registers().committed(), 1);
}

#[test]
fn full_fifo_times_out() {
    let mut cnc = held(SimRegisters::new().with_fifo_depth(1));
    cnc.load_block(&sample_block(), false).unwrap();
    let err = cnc.load_block(&sample_block(), false).unwrap_err();
    match err {
        HardwareError::Timeout { status, polls } => {
            assert_eq!(polls, 5);
            assert!(status.fifo_full());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.status().is_some());
    assert_eq!(cnc.registers().committed(), 1);
}

#[test]
fn commit_into_full_fifo_sets_error() {
    let mut sim = SimRegisters::new().with_fifo_depth(1);
    sim.write(Register::Command, COMMAND_CMD);
    sim.write(Register::Command, COMMAND_CMD);
    assert_eq!(sim.committed(), 1);
    assert!(Status(sim.read(Register::Status)).error());
    sim.write(Register::Command, COMMAND_RST);
    let status = Status(sim.read(Register::Status));
    assert!(!status.error());
    assert!(status.fifo_empty());
}

#[test]
fn execute_streams_program() {
    let program = Assembler::assemble_str(PROGRAM).unwrap();
    let mut blocks = program.blocks;
    assert_eq!(blocks.len(), 3);
    blocks.seek(2);

    let mut cnc = controller(SimRegisters::new().with_fifo_depth(2));
    cnc.initialize().unwrap();
    // Streaming starts at the cursor.
    assert_eq!(cnc.execute(&mut blocks), Ok(1));
    assert_eq!(cnc.registers().committed(), 1);
    assert_eq!(cnc.execute(&mut blocks), Ok(0));

    blocks.rewind();
    assert_eq!(cnc.execute(&mut blocks), Ok(3));
    assert_eq!(blocks.remaining(), 0);
    assert_eq!(cnc.registers().committed(), 4);

    let status = cnc.wait_for_idle().unwrap();
    assert!(status.idle());
    assert!(status.sticky_fifo_empty());
    assert_eq!(cnc.registers().retired(), 4);

    cnc.clear_sticky_empty();
    assert!(!cnc.status().sticky_fifo_empty());
}

#[test]
fn execute_resumes_after_timeout() {
    let program = Assembler::assemble_str(PROGRAM).unwrap();
    let mut blocks = program.blocks;
    let mut cnc = held(SimRegisters::new().with_fifo_depth(1));

    let err = cnc.execute(&mut blocks).unwrap_err();
    assert!(matches!(err, HardwareError::Timeout { .. }));
    assert_eq!(blocks.position(), 1);
    assert_eq!(cnc.registers().committed(), 1);

    cnc.registers_mut().drain(1);
    let err = cnc.execute(&mut blocks).unwrap_err();
    assert!(matches!(err, HardwareError::Timeout { .. }));
    assert_eq!(blocks.position(), 2);
    assert_eq!(cnc.registers().fifo().next(), blocks.get(1));

    cnc.registers_mut().drain(1);
    assert_eq!(cnc.execute(&mut blocks), Ok(1));
    assert_eq!(blocks.remaining(), 0);
    assert_eq!(cnc.registers().committed(), 3);
    assert_eq!(cnc.registers().retired(), 2);
    assert_eq!(cnc.registers().fifo().next(), blocks.get(2));
}

#[test]
fn execute_keeps_order() {
    let program = Assembler::assemble_str(PROGRAM).unwrap();
    let mut blocks = program.blocks;
    let mut sim = SimRegisters::new();
    sim.set_auto_drain(false);
    let mut cnc = controller(sim);
    assert_eq!(cnc.execute(&mut blocks), Ok(3));
    let sim = cnc.registers();
    assert!(sim.running());
    assert!(sim.fifo().eq(blocks.iter()));
}

#[test]
fn idle_wait_times_out_when_never_draining() {
    let mut cnc = held(SimRegisters::new());
    cnc.load_block(&sample_block(), true).unwrap();
    assert!(cnc.registers().running());
    assert!(matches!(
        cnc.wait_for_idle(),
        Err(HardwareError::Timeout { status, .. }) if status.busy()
    ));
    assert_eq!(cnc.registers_mut().drain(4), 1);
    assert!(cnc.wait_for_idle().is_ok());
}

#[test]
fn emergency_stop_latches_until_reset() {
    let mut cnc = controller(SimRegisters::new());
    assert!(cnc.emergency_stop().emergency_stop());
    assert!(matches!(
        cnc.enable_motion(),
        Err(HardwareError::EmergencyStop { .. })
    ));
    assert!(matches!(
        cnc.load_block(&sample_block(), true),
        Err(HardwareError::EmergencyStop { .. })
    ));
    assert_eq!(cnc.registers().committed(), 0);

    cnc.reset();
    let status = cnc.enable_motion().unwrap();
    assert!(!status.emergency_stop());
    assert!(cnc.registers().running());
}

#[test]
fn gpio_banks() {
    let mut cnc = controller(SimRegisters::new());
    cnc.write_gpio_outputs([1, 2, 3, 4]);
    assert_eq!(cnc.registers().word(Register::GpioOutput(Bank::Bank2)), 3);
    cnc.registers_mut().set_gpio_input(Bank::Bank1, 0xDEAD);
    assert_eq!(cnc.read_gpio_inputs(), [0, 0xDEAD, 0, 0]);
}

#[test]
fn fifo_depth_is_bounded() {
    let mut sim = SimRegisters::new().with_fifo_depth(SIM_FIFO_CAP + 10);
    for _ in 0..SIM_FIFO_CAP {
        sim.write(Register::Command, COMMAND_CMD);
    }
    assert!(Status(sim.read(Register::Status)).fifo_full());
    assert_eq!(sim.fifo_len(), SIM_FIFO_CAP);
}
