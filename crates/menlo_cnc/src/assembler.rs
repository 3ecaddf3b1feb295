// Assembler for the motion block language.
//
//     INFO, HEADER, 1, 0, 0
//     INFO, CONFIG, 4, 0, 0
//     begin
//       X, CW,    100, 16, 4
//       Y, CCW,    50,  8, 2
//     end
//     X, CW, 100, 16, 4, Y, CCW, 50, 8, 2
//
// Lines are split on ',' and the symbols drive a two level state machine:
// the block state (closed, explicit `begin`/`end`, or an implicit single
// line block) and the per axis tuple state (axis, opcode, three args).

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::block_array::{BlockArray, BlockArrayError};
use crate::compiler::{compile_axis_opcode, compile_block};
use crate::{AxisOpcode, AxisState, Mnemonic, OpcodeBlockFourAxis, OpcodeBlockFourAxisBinary, Symbol};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("{0}")]
    Kind(AssemblerErrorKind),
    #[error("line {line}: {kind}")]
    WithLine { line: u32, kind: AssemblerErrorKind },
}

impl AssemblerError {
    fn with_line(self, line: u32) -> Self {
        match self {
            AssemblerError::WithLine { .. } => self,
            AssemblerError::Kind(kind) => AssemblerError::WithLine { line, kind },
        }
    }

    pub fn line_number(&self) -> Option<u32> {
        match self {
            Self::Kind(_) => None,
            Self::WithLine { line, .. } => Some(*line),
        }
    }

    pub fn error_kind(&self) -> &AssemblerErrorKind {
        match self {
            Self::Kind(kind) => kind,
            Self::WithLine { kind, .. } => kind,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.error_kind().category()
    }
}

impl From<BlockArrayError> for AssemblerError {
    fn from(err: BlockArrayError) -> Self {
        AssemblerError::Kind(AssemblerErrorKind::BlockArray(err))
    }
}

impl From<BlockArrayError> for AssemblerErrorKind {
    fn from(err: BlockArrayError) -> Self {
        AssemblerErrorKind::BlockArray(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Numeric,
    Resource,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerErrorKind {
    #[error("begin before both HEADER and CONFIG were given")]
    BeginBeforeHeader,
    #[error("begin while a block is already open")]
    NestedBegin,
    #[error("end without an open block")]
    EndWithoutBegin,
    #[error("unknown axis symbol")]
    UnknownAxis,
    #[error("axis is not part of a four axis block")]
    UnsupportedAxis,
    #[error("opcode without a selected axis")]
    MalformedAxisState,
    #[error("axis without an opcode")]
    MissingOpcode,
    #[error("unknown opcode mnemonic")]
    UnknownOpcode,
    #[error("axis given twice in one block")]
    DuplicateAxis,
    #[error("HEADER given more than once")]
    DuplicateHeader,
    #[error("CONFIG given more than once")]
    DuplicateConfig,
    #[error("INFO lines are only allowed outside a block")]
    InfoInsideBlock,
    #[error("INFO only takes HEADER or CONFIG")]
    InvalidInfoInstruction,
    #[error("HEADER and CONFIG are not motion instructions")]
    PseudoInstructionInBlock,
    #[error("block still open at end of input")]
    UnterminatedBlock,
    #[error("program has no HEADER")]
    MissingHeader,
    #[error("program has no CONFIG")]
    MissingConfig,
    #[error("negative numbers are not allowed")]
    NegativeNumber,
    #[error("malformed number")]
    MalformedNumber,
    #[error("number does not fit in 32 bits")]
    NumberOutOfRange,
    #[error("out of memory copying a symbol")]
    OutOfMemory,
    #[error("too many lines")]
    LineNumberOverflow,
    #[error("{0}")]
    BlockArray(BlockArrayError),
}

impl AssemblerErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AssemblerErrorKind::NegativeNumber
            | AssemblerErrorKind::MalformedNumber
            | AssemblerErrorKind::NumberOutOfRange => ErrorCategory::Numeric,
            AssemblerErrorKind::OutOfMemory
            | AssemblerErrorKind::LineNumberOverflow
            | AssemblerErrorKind::BlockArray(_) => ErrorCategory::Resource,
            _ => ErrorCategory::Syntax,
        }
    }
}

/// Progress through one `axis, opcode, arg0, arg1, arg2` tuple. Each state
/// names the last field consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCodeState {
    Idle,
    Axis,
    Instruction,
    Arg0,
    Arg1,
    Arg2,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Closed,
    Explicit,
    /// Opened by a bare axis tuple, closed at end of line.
    Implicit,
}

#[derive(Debug, Clone, Copy)]
enum Keyword {
    Begin,
    End,
}

impl Keyword {
    fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol.eq_ignore_ascii_case("begin") {
            Some(Keyword::Begin)
        } else if symbol.eq_ignore_ascii_case("end") {
            Some(Keyword::End)
        } else {
            None
        }
    }
}

/// Axes already given in the open block.
#[derive(Debug, Default, Clone, Copy)]
struct AxisSet([bool; 4]);

impl AxisSet {
    fn contains(&self, axis: AxisState) -> bool {
        axis.block_slot()
            .and_then(|slot| self.0.get(slot).copied())
            .unwrap_or(false)
    }

    fn insert(&mut self, axis: AxisState) {
        if let Some(seen) = axis.block_slot().and_then(|slot| self.0.get_mut(slot)) {
            *seen = true;
        }
    }

    fn clear(&mut self) {
        self.0 = [false; 4];
    }
}

/// File level pseudo-instructions. Parsed and checked, not yet part of the
/// binary block format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramInfo {
    pub header: Option<AxisOpcode>,
    pub config: Option<AxisOpcode>,
}

/// Output of a successful assembly.
#[derive(Debug, Clone)]
pub struct Program {
    pub info: ProgramInfo,
    pub blocks: BlockArray<OpcodeBlockFourAxisBinary>,
}

pub struct Assembler {
    line_number: u32,
    opcode_state: OpCodeState,
    axis_state: AxisState,
    block_state: BlockState,
    assigned: AxisSet,
    block: OpcodeBlockFourAxis,
    info: ProgramInfo,
    blocks: BlockArray<OpcodeBlockFourAxisBinary>,
    /// First error seen. Once set, the file is rejected as a whole.
    failed: Option<AssemblerError>,
}

impl Assembler {
    pub fn new() -> Result<Self, AssemblerError> {
        Ok(Self::with_block_array(BlockArray::new()?))
    }

    pub fn with_block_array(blocks: BlockArray<OpcodeBlockFourAxisBinary>) -> Self {
        Self {
            line_number: 0,
            opcode_state: OpCodeState::Idle,
            axis_state: AxisState::Idle,
            block_state: BlockState::Closed,
            assigned: AxisSet::default(),
            block: OpcodeBlockFourAxis::default(),
            info: ProgramInfo::default(),
            blocks,
            failed: None,
        }
    }

    /// Assemble a whole source text.
    pub fn assemble_str(source: &str) -> Result<Program, AssemblerError> {
        let mut asm = Self::new()?;
        for line in source.lines() {
            asm.process_line(line)?;
        }
        asm.finish()
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn opcode_state(&self) -> OpCodeState {
        self.opcode_state
    }

    pub fn block_open(&self) -> bool {
        self.block_state != BlockState::Closed
    }

    pub fn blocks(&self) -> &BlockArray<OpcodeBlockFourAxisBinary> {
        &self.blocks
    }

    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }

    /// Feed one source line. On error the partially built block is dropped,
    /// so the block array only ever holds complete blocks, and every later
    /// call returns the same error: there is no resynchronization.
    pub fn process_line(&mut self, line: &str) -> Result<(), AssemblerError> {
        if let Some(err) = self.failed.as_ref() {
            return Err(err.clone());
        }
        let Some(line_number) = self.line_number.checked_add(1) else {
            return Err(self.fail(AssemblerError::Kind(AssemblerErrorKind::LineNumberOverflow)));
        };
        self.line_number = line_number;
        self.process_symbols(line)
            .map_err(|kind| self.fail(AssemblerError::Kind(kind).with_line(line_number)))
    }

    fn fail(&mut self, err: AssemblerError) -> AssemblerError {
        self.discard_block();
        self.failed = Some(err.clone());
        err
    }

    /// The error that stopped this file, if any.
    pub fn failed(&self) -> Option<&AssemblerError> {
        self.failed.as_ref()
    }

    pub fn finish(self) -> Result<Program, AssemblerError> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        let line = self.line_number;
        if self.block_state != BlockState::Closed || self.opcode_state != OpCodeState::Idle {
            return Err(AssemblerError::Kind(AssemblerErrorKind::UnterminatedBlock).with_line(line));
        }
        if self.info.header.is_none() {
            return Err(AssemblerError::Kind(AssemblerErrorKind::MissingHeader));
        }
        if self.info.config.is_none() {
            return Err(AssemblerError::Kind(AssemblerErrorKind::MissingConfig));
        }
        log::debug!("assembled {} blocks from {} lines", self.blocks.len(), line);
        Ok(Program {
            info: self.info,
            blocks: self.blocks,
        })
    }

    fn process_symbols(&mut self, line: &str) -> Result<(), AssemblerErrorKind> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }
        for symbol in line.split(',') {
            self.process_symbol(symbol.trim())?;
        }
        self.end_of_line()
    }

    fn process_symbol(&mut self, symbol: &str) -> Result<(), AssemblerErrorKind> {
        log::trace!("line {} symbol {:?} in {:?}", self.line_number, symbol, self.opcode_state);
        let keyword = Keyword::from_symbol(symbol);
        match (self.opcode_state, keyword) {
            (OpCodeState::Idle, Some(Keyword::Begin)) => self.open_block(BlockState::Explicit),
            (OpCodeState::Idle, Some(Keyword::End)) => self.end(),
            // Tolerate trailing commas.
            (OpCodeState::Idle, None) if symbol.is_empty() => Ok(()),
            (OpCodeState::Idle, None) => self.start_axis(symbol),
            (OpCodeState::Axis, Some(_)) => Err(AssemblerErrorKind::MissingOpcode),
            (OpCodeState::Axis, None) => self.set_opcode(symbol),
            // Trailing arguments may be left off before `end`.
            (OpCodeState::Instruction | OpCodeState::Arg0 | OpCodeState::Arg1, Some(Keyword::End)) => {
                self.complete_axis()?;
                self.end()
            }
            (OpCodeState::Instruction | OpCodeState::Arg0 | OpCodeState::Arg1, Some(Keyword::Begin)) => {
                Err(AssemblerErrorKind::NestedBegin)
            }
            (OpCodeState::Instruction, None) => self.set_argument(0, symbol, OpCodeState::Arg0),
            (OpCodeState::Arg0, None) => self.set_argument(1, symbol, OpCodeState::Arg1),
            (OpCodeState::Arg1, None) => {
                self.set_argument(2, symbol, OpCodeState::Arg2)?;
                self.complete_axis()
            }
            (OpCodeState::Arg2 | OpCodeState::Complete, _) => {
                Err(AssemblerErrorKind::MalformedAxisState)
            }
        }
    }

    fn end_of_line(&mut self) -> Result<(), AssemblerErrorKind> {
        match self.opcode_state {
            OpCodeState::Idle => {}
            OpCodeState::Axis => return Err(AssemblerErrorKind::MissingOpcode),
            OpCodeState::Instruction | OpCodeState::Arg0 | OpCodeState::Arg1 => {
                self.complete_axis()?
            }
            OpCodeState::Arg2 | OpCodeState::Complete => {
                return Err(AssemblerErrorKind::MalformedAxisState);
            }
        }
        if self.block_state == BlockState::Implicit {
            self.close_block()?;
        }
        Ok(())
    }

    fn open_block(&mut self, kind: BlockState) -> Result<(), AssemblerErrorKind> {
        if self.info.header.is_none() || self.info.config.is_none() {
            return Err(AssemblerErrorKind::BeginBeforeHeader);
        }
        if self.block_state != BlockState::Closed {
            return Err(AssemblerErrorKind::NestedBegin);
        }
        self.reset_block();
        self.block_state = kind;
        Ok(())
    }

    fn end(&mut self) -> Result<(), AssemblerErrorKind> {
        if self.block_state == BlockState::Closed {
            return Err(AssemblerErrorKind::EndWithoutBegin);
        }
        self.close_block()
    }

    fn close_block(&mut self) -> Result<(), AssemblerErrorKind> {
        let binary = compile_block(&self.block)?;
        self.blocks.push(binary)?;
        log::debug!(
            "line {}: block {} compiled",
            self.line_number,
            self.blocks.len()
        );
        self.discard_block();
        Ok(())
    }

    fn start_axis(&mut self, symbol: &str) -> Result<(), AssemblerErrorKind> {
        let axis = AxisState::from_symbol(symbol);
        match axis {
            AxisState::X | AxisState::Y | AxisState::Z | AxisState::A => {
                if self.block_state == BlockState::Closed {
                    self.open_block(BlockState::Implicit)?;
                }
                if self.assigned.contains(axis) {
                    return Err(AssemblerErrorKind::DuplicateAxis);
                }
            }
            AxisState::Info => {
                if self.block_state != BlockState::Closed {
                    return Err(AssemblerErrorKind::InfoInsideBlock);
                }
            }
            AxisState::B | AxisState::C | AxisState::U | AxisState::V | AxisState::W => {
                return Err(AssemblerErrorKind::UnsupportedAxis);
            }
            AxisState::Unknown => return Err(AssemblerErrorKind::UnknownAxis),
            AxisState::Idle => return Err(AssemblerErrorKind::MalformedAxisState),
        }
        self.axis_state = axis;
        *self.current_slot()? = AxisOpcode::new(axis);
        self.opcode_state = OpCodeState::Axis;
        Ok(())
    }

    fn set_opcode(&mut self, symbol: &str) -> Result<(), AssemblerErrorKind> {
        let mnemonic = Mnemonic::from_symbol(symbol).ok_or(AssemblerErrorKind::UnknownOpcode)?;
        match (self.axis_state, mnemonic.is_pseudo()) {
            (AxisState::Info, false) => return Err(AssemblerErrorKind::InvalidInfoInstruction),
            (AxisState::Info, true) => {}
            (AxisState::X | AxisState::Y | AxisState::Z | AxisState::A, true) => {
                return Err(AssemblerErrorKind::PseudoInstructionInBlock);
            }
            (AxisState::X | AxisState::Y | AxisState::Z | AxisState::A, false) => {}
            _ => return Err(AssemblerErrorKind::MalformedAxisState),
        }
        let opcode = to_symbol(symbol)?;
        self.current_slot()?.opcode = Some(opcode);
        self.opcode_state = OpCodeState::Instruction;
        Ok(())
    }

    fn set_argument(
        &mut self,
        index: usize,
        symbol: &str,
        next: OpCodeState,
    ) -> Result<(), AssemblerErrorKind> {
        // An empty field is an omitted argument and compiles to zero.
        let value = if symbol.is_empty() {
            None
        } else {
            Some(to_symbol(symbol)?)
        };
        let slot = self.current_slot()?;
        let arg = slot
            .args
            .get_mut(index)
            .ok_or(AssemblerErrorKind::MalformedAxisState)?;
        *arg = value;
        self.opcode_state = next;
        Ok(())
    }

    fn complete_axis(&mut self) -> Result<(), AssemblerErrorKind> {
        self.opcode_state = OpCodeState::Complete;
        match self.axis_state {
            AxisState::Info => {
                let opcode = core::mem::take(&mut self.block.info);
                // Catch bad numbers now even though INFO is not compiled
                // into a block.
                compile_axis_opcode(&opcode)?;
                let mnemonic = opcode.opcode.as_deref().and_then(Mnemonic::from_symbol);
                match mnemonic {
                    Some(Mnemonic::Header) => {
                        if self.info.header.is_some() {
                            return Err(AssemblerErrorKind::DuplicateHeader);
                        }
                        self.info.header = Some(opcode);
                    }
                    Some(Mnemonic::Config) => {
                        if self.info.config.is_some() {
                            return Err(AssemblerErrorKind::DuplicateConfig);
                        }
                        self.info.config = Some(opcode);
                    }
                    _ => return Err(AssemblerErrorKind::InvalidInfoInstruction),
                }
            }
            axis @ (AxisState::X | AxisState::Y | AxisState::Z | AxisState::A) => {
                self.assigned.insert(axis);
            }
            _ => return Err(AssemblerErrorKind::MalformedAxisState),
        }
        self.axis_state = AxisState::Idle;
        self.opcode_state = OpCodeState::Idle;
        Ok(())
    }

    fn current_slot(&mut self) -> Result<&mut AxisOpcode, AssemblerErrorKind> {
        self.block
            .slot_mut(self.axis_state)
            .ok_or(AssemblerErrorKind::MalformedAxisState)
    }

    fn reset_block(&mut self) {
        self.block = OpcodeBlockFourAxis::default();
        self.assigned.clear();
        self.axis_state = AxisState::Idle;
        self.opcode_state = OpCodeState::Idle;
    }

    fn discard_block(&mut self) {
        self.reset_block();
        self.block_state = BlockState::Closed;
    }
}

fn strip_comment(line: &str) -> &str {
    match line.split(';').next() {
        Some(part) => part,
        None => line,
    }
}

fn to_symbol(symbol: &str) -> Result<Symbol, AssemblerErrorKind> {
    let mut out = Symbol::new();
    out.try_reserve_exact(symbol.len())
        .map_err(|_| AssemblerErrorKind::OutOfMemory)?;
    out.push_str(symbol);
    Ok(out)
}
