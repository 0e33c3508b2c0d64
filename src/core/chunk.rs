/*!
Chunk planning for fixed-capacity primitive calls.

The element works on a fixed-size working buffer, so a message of any length
is fed to it as a walk of `(offset_in, offset_out, length)` chunks. The
planner is a pure function of the total length, the capacity and the number
of bytes already consumed.
*/

use crate::core::error::Result;
use crate::param_err;

/// One primitive call's worth of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset of the chunk in the input buffer
    pub offset_in: usize,
    /// Offset the chunk's output starts at in the output buffer
    pub offset_out: usize,
    /// Number of input bytes in the chunk
    pub length: usize,
}

impl Chunk {
    /// Input range covered by the chunk
    pub fn input_range(&self) -> std::ops::Range<usize> {
        self.offset_in..self.offset_in + self.length
    }

    /// Whether this is the terminal chunk of an empty message
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Computes how a message is split into fixed-capacity primitive calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    total_length: usize,
    chunk_capacity: usize,
}

impl ChunkPlanner {
    /// Create a planner for a message of `total_length` bytes
    pub fn new(total_length: usize, chunk_capacity: usize) -> Result<Self> {
        if chunk_capacity == 0 {
            return param_err!("chunk capacity must be non-zero");
        }
        Ok(Self {
            total_length,
            chunk_capacity,
        })
    }

    /// Total message length
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Capacity of one primitive call
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Number of primitive calls needed for the whole message
    pub fn chunk_count(&self) -> usize {
        if self.total_length == 0 {
            1
        } else {
            self.total_length.div_ceil(self.chunk_capacity)
        }
    }

    /// Next chunk after `consumed` input bytes, `None` when the walk is over
    ///
    /// Output offsets track input offsets one-to-one. An empty message yields
    /// a single zero-length chunk at `consumed == 0`.
    pub fn next_chunk(&self, consumed: usize) -> Option<Chunk> {
        if consumed > self.total_length {
            return None;
        }
        let remaining = self.total_length - consumed;
        if remaining == 0 && !(self.total_length == 0 && consumed == 0) {
            return None;
        }
        Some(Chunk {
            offset_in: consumed,
            offset_out: consumed,
            length: remaining.min(self.chunk_capacity),
        })
    }

    /// Iterate over every chunk of the message
    pub fn chunks(&self) -> Chunks {
        Chunks {
            planner: *self,
            consumed: 0,
            done: false,
        }
    }
}

/// Iterator over a [`ChunkPlanner`] walk
#[derive(Debug, Clone)]
pub struct Chunks {
    planner: ChunkPlanner,
    consumed: usize,
    done: bool,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.planner.next_chunk(self.consumed) {
            Some(chunk) => {
                self.consumed += chunk.length;
                if chunk.length == 0 {
                    self.done = true;
                }
                Some(chunk)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
