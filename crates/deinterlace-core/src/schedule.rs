use std::ops::Range;

use crate::config::DeinterlaceConfig;
use crate::error::Result;

/// Half-open range of frame indices `[start, stop)` sharing one offset estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: usize,
    pub stop: usize,
}

impl Block {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }
}

/// Partition of `[0, frame_count)` into estimation blocks.
///
/// The first `unstable` frames each form their own block; the remainder is
/// cut into `block_size` chunks with a shorter final chunk when the division
/// is not exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSchedule {
    frame_count: usize,
    block_size: usize,
    unstable: usize,
}

impl BlockSchedule {
    /// `block_size` defaults to the whole stack.
    pub fn new(frame_count: usize, block_size: Option<usize>, unstable: Option<usize>) -> Result<Self> {
        let config = DeinterlaceConfig {
            block_size,
            subsample: false,
            unstable,
        };
        Self::from_config(frame_count, &config)
    }

    pub fn from_config(frame_count: usize, config: &DeinterlaceConfig) -> Result<Self> {
        config.validate(frame_count)?;
        Ok(Self {
            frame_count,
            block_size: config.block_size.unwrap_or(frame_count).max(1),
            unstable: config.unstable.unwrap_or(0),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn unstable(&self) -> usize {
        self.unstable
    }

    /// Number of blocks [`iter`](Self::iter) yields.
    pub fn len(&self) -> usize {
        let stable = self.frame_count - self.unstable;
        self.unstable + stable.div_ceil(self.block_size)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn iter(&self) -> Blocks {
        Blocks {
            next: 0,
            remaining: self.len(),
            frame_count: self.frame_count,
            block_size: self.block_size,
            unstable: self.unstable,
        }
    }
}

impl IntoIterator for &BlockSchedule {
    type Item = Block;
    type IntoIter = Blocks;

    fn into_iter(self) -> Blocks {
        self.iter()
    }
}

/// Iterator over the blocks of a [`BlockSchedule`], in ascending order.
#[derive(Clone, Debug)]
pub struct Blocks {
    next: usize,
    remaining: usize,
    frame_count: usize,
    block_size: usize,
    unstable: usize,
}

impl Iterator for Blocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.next >= self.frame_count {
            return None;
        }
        let start = self.next;
        let stop = if start < self.unstable {
            start + 1
        } else {
            (start + self.block_size).min(self.frame_count)
        };
        self.next = stop;
        self.remaining -= 1;
        Some(Block { start, stop })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Blocks {}
