use alloc::vec::Vec;
use core::mem::size_of;
use thiserror_no_std::Error;


pub const DEFAULT_INITIAL_CAPACITY: usize = 16;
pub const DEFAULT_GROWTH_INCREMENT: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockArrayError {
    #[error("could not grow the block array past {0} entries")]
    OutOfMemory(usize),
}

/// Append only store of compiled entries with a streaming read cursor.
///
/// The compiler pushes entries in file order and the hardware loader reads
/// them back in the same order with [`BlockArray::next`]. Random access
/// through [`BlockArray::get`] does not move the cursor.
///
/// Capacity grows by a fixed increment rather than doubling so the
/// footprint stays predictable on small targets.
#[derive(Debug, Clone)]
pub struct BlockArray<T> {
    entries: Vec<T>,
    capacity: usize,
    increment: usize,
    cursor: usize,
    growths: usize,
}

impl<T> BlockArray<T> {
    pub fn new() -> Result<Self, BlockArrayError> {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY, DEFAULT_GROWTH_INCREMENT)
    }

    pub fn with_capacity(initial: usize, increment: usize) -> Result<Self, BlockArrayError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(initial)
            .map_err(|_| BlockArrayError::OutOfMemory(initial))?;
        Ok(Self {
            entries,
            capacity: initial,
            increment: increment.max(1),
            cursor: 0,
            growths: 0,
        })
    }

    /// Size in bytes of every entry. Fixed by the element type.
    pub fn entry_size(&self) -> usize {
        size_of::<T>()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    /// Number of times the array has had to grow.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn push(&mut self, entry: T) -> Result<(), BlockArrayError> {
        if self.entries.len() >= self.capacity {
            self.grow()?;
        }
        self.entries.push(entry);
        Ok(())
    }

    fn grow(&mut self) -> Result<(), BlockArrayError> {
        let capacity = self
            .capacity
            .checked_add(self.increment)
            .ok_or(BlockArrayError::OutOfMemory(self.capacity))?;
        let additional = capacity.saturating_sub(self.entries.len());
        self.entries
            .try_reserve_exact(additional)
            .map_err(|_| BlockArrayError::OutOfMemory(capacity))?;
        self.capacity = capacity;
        self.growths = self.growths.saturating_add(1);
        log::trace!("block array grew to {} entries", capacity);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Move the read cursor. Seeking past the end is allowed and leaves
    /// [`BlockArray::next`] returning `None`.
    pub fn seek(&mut self, index: usize) {
        self.cursor = index;
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.cursor)
    }

    /// The entry under the cursor, without moving it.
    pub fn peek(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&T> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor = self.cursor.saturating_add(1);
        Some(entry)
    }

    pub fn as_slice(&self) -> &[T] {
        self.entries.as_slice()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl<'a, T> IntoIterator for &'a BlockArray<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
