use crate::assembler::{Assembler, AssemblerError, AssemblerErrorKind, ErrorCategory, OpCodeState};
use crate::disasm::{disassemble_block, disassemble_program};
use crate::{AxisOpcodeBinary, AxisState, OpcodeBlockFourAxisBinary};

extern crate std;
use std::format;
use std::vec::Vec as StdVec;

const PREAMBLE: [&str; 2] = ["INFO, HEADER, 1, 0, 0", "INFO, CONFIG, 4, 0, 0"];

fn assembler() -> Assembler {
    let mut asm = Assembler::new().unwrap();
    for line in PREAMBLE {
        asm.process_line(line).unwrap();
    }
    asm
}

fn axis(instruction: u32, pulse_rate: u32, pulse_count: u32, pulse_width: u32) -> AxisOpcodeBinary {
    AxisOpcodeBinary {
        instruction,
        pulse_rate,
        pulse_count,
        pulse_width,
    }
}

fn sample_block() -> OpcodeBlockFourAxisBinary {
    OpcodeBlockFourAxisBinary {
        x: axis(1, 100, 16, 4),
        y: axis(2, 50, 8, 2),
        z: axis(0, 75, 12, 0),
        a: axis(0, 0, 0, 0),
    }
}

fn blocks_of(asm: &Assembler) -> StdVec<OpcodeBlockFourAxisBinary> {
    asm.blocks().iter().copied().collect()
}

/// Error from the first line after the preamble of a fresh assembler.
fn first_line_error(line: &str) -> AssemblerError {
    assembler().process_line(line).unwrap_err()
}

fn expect_kind(err: AssemblerError, line: u32, kind: AssemblerErrorKind) {
    match err {
        AssemblerError::WithLine { line: got, kind: got_kind } => {
            assert_eq!(got, line);
            assert_eq!(got_kind, kind);
        }
        _ => panic!("expected line-numbered error"),
    }
}

#[test]
fn assembles_explicit_block() {
    let mut asm = assembler();
    for line in [
        "begin",
        "  X, CW,    100, 16, 4",
        "  Y, CCW,    50,  8, 2",
        "  Z, DWELL,  75, 12, 0",
        "  A, NOP,     0,  0, 0",
        "end",
    ] {
        asm.process_line(line).unwrap();
    }
    assert_eq!(blocks_of(&asm), [sample_block()]);
    let program = asm.finish().unwrap();
    assert_eq!(program.blocks.len(), 1);
    assert!(program.info.header.is_some());
    assert!(program.info.config.is_some());
}

#[test]
fn single_line_forms_match_explicit_block() {
    let mut implicit = assembler();
    implicit
        .process_line("X,CW,100,16,4, Y,CCW,50,8,2, Z,DWELL,75,12,0, A,NOP,0,0,0")
        .unwrap();
    assert!(!implicit.block_open());

    let mut explicit = assembler();
    explicit
        .process_line("begin, X,CW,100,16,4, Y,CCW,50,8,2, Z,DWELL,75,12,0, A,NOP,0,0,0, end")
        .unwrap();

    assert_eq!(blocks_of(&implicit), [sample_block()]);
    assert_eq!(blocks_of(&explicit), [sample_block()]);
}

#[test]
fn missing_axis_compiles_to_nop() {
    let mut asm = assembler();
    asm.process_line("X, CW, 0x10, 010, 3").unwrap();
    let blocks = blocks_of(&asm);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].x, axis(1, 16, 8, 3));
    assert_eq!(blocks[0].a, AxisOpcodeBinary::NOP);
    assert_eq!(blocks[0].a, axis(0, 0, 0, 0));
}

#[test]
fn omitted_arguments_before_end() {
    let mut asm = assembler();
    asm.process_line("begin, A, NOP, end").unwrap();
    asm.process_line("begin, Z, DWELL, 75, end").unwrap();
    let blocks = blocks_of(&asm);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].a, AxisOpcodeBinary::NOP);
    assert_eq!(blocks[1].z, axis(0, 75, 0, 0));
}

#[test]
fn multiline_block_with_omitted_arguments() {
    let mut asm = assembler();
    for line in ["begin", "A, NOP", "Z, DWELL, 75", "Y, CW, 5, , 2", "end"] {
        asm.process_line(line).unwrap();
    }
    let blocks = blocks_of(&asm);
    assert_eq!(blocks[0].y, axis(1, 5, 0, 2));
    assert_eq!(blocks[0].z, axis(0, 75, 0, 0));
    assert_eq!(blocks[0].a, AxisOpcodeBinary::NOP);
}

#[test]
fn end_without_begin_leaves_array_unchanged() {
    let mut asm = assembler();
    asm.process_line("X, CW, 1, 2, 3").unwrap();
    let before = blocks_of(&asm);
    let err = asm.process_line("end").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Syntax);
    expect_kind(err, 4, AssemblerErrorKind::EndWithoutBegin);
    assert_eq!(blocks_of(&asm), before);
}

#[test]
fn begin_requires_header_and_config() {
    let mut asm = Assembler::new().unwrap();
    let err = asm.process_line("begin").unwrap_err();
    expect_kind(err, 1, AssemblerErrorKind::BeginBeforeHeader);

    let mut asm = Assembler::new().unwrap();
    asm.process_line("INFO, HEADER, 1, 0, 0").unwrap();
    let err = asm.process_line("X, CW, 1, 1, 1").unwrap_err();
    expect_kind(err, 2, AssemblerErrorKind::BeginBeforeHeader);
    assert!(asm.blocks().is_empty());
}

#[test]
fn nested_begin_is_rejected() {
    let mut asm = assembler();
    asm.process_line("begin").unwrap();
    let err = asm.process_line("begin").unwrap_err();
    expect_kind(err, 4, AssemblerErrorKind::NestedBegin);
}

#[test]
fn header_and_config_only_once() {
    let err = first_line_error("INFO, HEADER, 2, 0, 0");
    expect_kind(err, 3, AssemblerErrorKind::DuplicateHeader);
    let err = first_line_error("info, config");
    expect_kind(err, 3, AssemblerErrorKind::DuplicateConfig);
}

#[test]
fn info_rules() {
    let mut asm = assembler();
    asm.process_line("begin").unwrap();
    let err = asm.process_line("INFO, HEADER, 1, 0, 0").unwrap_err();
    expect_kind(err, 4, AssemblerErrorKind::InfoInsideBlock);

    let mut asm = Assembler::new().unwrap();
    let err = asm.process_line("INFO, CW, 1, 0, 0").unwrap_err();
    expect_kind(err, 1, AssemblerErrorKind::InvalidInfoInstruction);

    let mut asm = assembler();
    let err = asm.process_line("X, HEADER, 1, 0, 0").unwrap_err();
    expect_kind(err, 3, AssemblerErrorKind::PseudoInstructionInBlock);
}

#[test]
fn unknown_axis_and_opcode() {
    expect_kind(first_line_error("Q, CW, 1, 2, 3"), 3, AssemblerErrorKind::UnknownAxis);
    expect_kind(first_line_error("X, JUMP, 1, 2, 3"), 3, AssemblerErrorKind::UnknownOpcode);
    expect_kind(first_line_error("B, CW, 1, 2, 3"), 3, AssemblerErrorKind::UnsupportedAxis);

    let mut asm = assembler();
    let err = asm.process_line("X, CW, 1, 2, 3, 4").unwrap_err();
    expect_kind(err, 3, AssemblerErrorKind::UnknownAxis);
    assert!(asm.blocks().is_empty());
}

#[test]
fn axis_without_opcode() {
    expect_kind(first_line_error("begin, X, end"), 3, AssemblerErrorKind::MissingOpcode);
    expect_kind(first_line_error("Y"), 3, AssemblerErrorKind::MissingOpcode);
}

#[test]
fn duplicate_axis_in_block() {
    let mut asm = assembler();
    let err = asm
        .process_line("X, CW, 1, 2, 3, X, CCW, 1, 2, 3")
        .unwrap_err();
    expect_kind(err, 3, AssemblerErrorKind::DuplicateAxis);
    assert!(asm.blocks().is_empty());

    // The same axis in the next block is fine.
    let mut asm = assembler();
    asm.process_line("X, CW, 1, 2, 3").unwrap();
    asm.process_line("X, CCW, 1, 2, 3").unwrap();
    assert_eq!(asm.blocks().len(), 2);
}

#[test]
fn numeric_errors_drop_the_block() {
    let mut asm = assembler();
    asm.process_line("begin").unwrap();
    asm.process_line("X, CW, -1, 2, 3").unwrap();
    let err = asm.process_line("end").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Numeric);
    expect_kind(err, 5, AssemblerErrorKind::NegativeNumber);
    assert!(asm.blocks().is_empty());
    assert!(!asm.block_open());
    assert_eq!(asm.opcode_state(), OpCodeState::Idle);

    let err = first_line_error("X, CW, 0x100000000, 2, 3");
    expect_kind(err, 3, AssemblerErrorKind::NumberOutOfRange);
    let err = first_line_error("X, CW, 12ab, 2, 3");
    expect_kind(err, 3, AssemblerErrorKind::MalformedNumber);
}

#[test]
fn error_stops_the_file() {
    let mut asm = assembler();
    asm.process_line("X, CW, 1, 1, 1").unwrap();
    let err = asm.process_line("X, CW, -5, 1, 1").unwrap_err();
    expect_kind(err.clone(), 4, AssemblerErrorKind::NegativeNumber);

    // Later lines are not assembled, even good ones.
    assert_eq!(asm.process_line("X, CW, 3, 1, 1"), Err(err.clone()));
    assert_eq!(asm.line_number(), 4);
    assert_eq!(asm.blocks().len(), 1);
    assert_eq!(asm.failed(), Some(&err));
    assert_eq!(asm.finish().unwrap_err(), err);

    let source = "INFO, HEADER, 1, 0, 0\nINFO, CONFIG, 4, 0, 0\nX, CW, 1, 1, 1\nend\nX, CW, 2, 1, 1\n";
    let err = Assembler::assemble_str(source).unwrap_err();
    expect_kind(err, 4, AssemblerErrorKind::EndWithoutBegin);
}

#[test]
fn long_literals_are_accepted() {
    let mut asm = assembler();
    let hex = format!("0x{}10", "0".repeat(60));
    let octal = format!("{}17", "0".repeat(60));
    asm.process_line(&format!("X, CW, {}, {}, 1", hex, octal))
        .unwrap();
    assert_eq!(blocks_of(&asm)[0].x, axis(1, 16, 15, 1));
    assert_eq!(AssemblerErrorKind::OutOfMemory.category(), ErrorCategory::Resource);
}

#[test]
fn comments_and_blank_lines() {
    let mut asm = Assembler::new().unwrap();
    asm.process_line("; a motion program").unwrap();
    asm.process_line("").unwrap();
    asm.process_line("    ").unwrap();
    asm.process_line("INFO, HEADER, 1, 0, 0 ; version").unwrap();
    asm.process_line("INFO, CONFIG, 4, 0, 0").unwrap();
    asm.process_line("x, cw, 1, 1, 1, ; trailing comma").unwrap();
    assert_eq!(asm.line_number(), 6);
    assert_eq!(asm.blocks().len(), 1);
}

#[test]
fn finish_rejects_open_block() {
    let mut asm = assembler();
    asm.process_line("begin").unwrap();
    asm.process_line("X, CW, 1, 2, 3").unwrap();
    let err = asm.finish().unwrap_err();
    expect_kind(err, 4, AssemblerErrorKind::UnterminatedBlock);
}

#[test]
fn finish_requires_header_and_config() {
    let asm = Assembler::new().unwrap();
    let err = asm.finish().unwrap_err();
    assert_eq!(err.error_kind(), &AssemblerErrorKind::MissingHeader);

    let mut asm = Assembler::new().unwrap();
    asm.process_line("INFO, HEADER, 1, 0, 0").unwrap();
    let err = asm.finish().unwrap_err();
    assert_eq!(err.error_kind(), &AssemblerErrorKind::MissingConfig);
    assert_eq!(err.line_number(), None);
}

#[test]
fn many_blocks_keep_file_order() {
    let mut source = std::string::String::from("INFO, HEADER, 1, 0, 0\nINFO, CONFIG, 4, 0, 0\n");
    for rate in 1..=40u32 {
        source.push_str(&format!("X, CW, {}, 1, 1\n", rate));
    }
    let mut program = Assembler::assemble_str(&source).unwrap();
    assert_eq!(program.blocks.len(), 40);
    assert!(program.blocks.growths() >= 1);
    let mut rate = 1;
    while let Some(block) = program.blocks.next() {
        assert_eq!(block.x.pulse_rate, rate);
        rate += 1;
    }
}

#[test]
fn block_round_trips_through_text() {
    let mut asm = assembler();
    asm.process_line("X,CW,100,16,4, Y,CCW,50,8,2, Z,DWELL,75,12,0").unwrap();
    let first = blocks_of(&asm)[0];

    let text = disassemble_block(&first).unwrap();
    assert_eq!(
        text,
        "begin, X, CW, 100, 16, 4, Y, CCW, 50, 8, 2, Z, DWELL, 75, 12, 0, A, NOP, 0, 0, 0, end"
    );

    let mut again = assembler();
    again.process_line(&text).unwrap();
    assert_eq!(blocks_of(&again), [first]);
}

#[test]
fn program_round_trips_through_text() {
    let source = "INFO, HEADER, 1, 0, 0\nINFO, CONFIG, 4, 0, 0\nbegin\nX, CW, 100, 16, 4\nend\nY, CCW, 0x20, 3, 1\n";
    let program = Assembler::assemble_str(source).unwrap();
    let text = disassemble_program(&program).unwrap();
    let again = Assembler::assemble_str(&text).unwrap();
    assert_eq!(again.info, program.info);
    assert_eq!(again.blocks.as_slice(), program.blocks.as_slice());
    assert_eq!(
        again.info.header.as_ref().map(|header| header.axis),
        Some(AxisState::Info)
    );
}
