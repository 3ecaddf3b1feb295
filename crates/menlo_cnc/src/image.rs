//! On disk form of an assembled program, so compiling and running can be
//! separate steps.
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::assembler::{Program, ProgramInfo};
use crate::block_array::{BlockArray, BlockArrayError};
use crate::OpcodeBlockFourAxisBinary;

pub const IMAGE_MAGIC: u32 = u32::from_le_bytes(*b"MCNC");
pub const IMAGE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image encoding failed: {0}")]
    Codec(postcard::Error),
    #[error("not a program image")]
    BadMagic,
    #[error("image version {0} is not supported")]
    UnsupportedVersion(u32),
    #[error("{0}")]
    BlockArray(BlockArrayError),
}

impl From<postcard::Error> for ImageError {
    fn from(err: postcard::Error) -> Self {
        ImageError::Codec(err)
    }
}

impl From<BlockArrayError> for ImageError {
    fn from(err: BlockArrayError) -> Self {
        ImageError::BlockArray(err)
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct ProgramImage {
    magic: u32,
    version: u32,
    info: ProgramInfo,
    blocks: Vec<OpcodeBlockFourAxisBinary>,
}

pub fn encode(program: &Program) -> Result<Vec<u8>, ImageError> {
    let image = ProgramImage {
        magic: IMAGE_MAGIC,
        version: IMAGE_VERSION,
        info: program.info.clone(),
        blocks: program.blocks.as_slice().to_vec(),
    };
    Ok(postcard::to_allocvec(&image)?)
}

pub fn decode(bytes: &[u8]) -> Result<Program, ImageError> {
    let image: ProgramImage = postcard::from_bytes(bytes)?;
    if image.magic != IMAGE_MAGIC {
        return Err(ImageError::BadMagic);
    }
    if image.version != IMAGE_VERSION {
        return Err(ImageError::UnsupportedVersion(image.version));
    }
    let mut blocks = BlockArray::new()?;
    for block in image.blocks {
        blocks.push(block)?;
    }
    Ok(Program {
        info: image.info,
        blocks,
    })
}
