//! L0: the untyped block store (§2, §5).
//!
//! The "disk" is a contiguous, in-memory array of fixed-size blocks. This
//! mirrors the teacher's `keos::fs::Disk` handle — every layer above reads
//! and writes through it rather than touching memory directly — but since
//! this crate's disk genuinely lives only in memory (§1: durability across
//! restart is a non-goal), the trait has no I/O error path of its own;
//! out-of-range access is a programmer error (`panic`), not a runtime one,
//! because every caller above L0 computes block numbers from the bitmap and
//! superblock and never passes one it invented.

use crate::layout::BLKSIZE;

/// A flat, block-addressed backing store.
///
/// Implementations need not be in-memory forever (a host could back this
/// with an mmap'd file), but this crate ships only the in-memory kind,
/// matching spec §1's framing of the disk as "a contiguous byte region".
pub trait BlockDevice {
    /// Total number of blocks in the device.
    fn block_count(&self) -> u32;
    /// Read block `b` into `buf`.
    fn read_block(&self, b: u32, buf: &mut [u8; BLKSIZE]);
    /// Overwrite block `b` with `buf`.
    fn write_block(&mut self, b: u32, buf: &[u8; BLKSIZE]);
}

/// An in-memory block device: a `Vec` of fixed-size blocks.
pub struct MemBlockDevice {
    blocks: Vec<[u8; BLKSIZE]>,
}

impl MemBlockDevice {
    /// Allocates a new, zero-filled block device of `total_blocks` blocks.
    pub fn new(total_blocks: u32) -> Self {
        MemBlockDevice {
            blocks: vec![[0u8; BLKSIZE]; total_blocks as usize],
        }
    }
}

impl BlockDevice for MemBlockDevice {
    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    fn read_block(&self, b: u32, buf: &mut [u8; BLKSIZE]) {
        *buf = self.blocks[b as usize];
    }

    fn write_block(&mut self, b: u32, buf: &[u8; BLKSIZE]) {
        self.blocks[b as usize] = *buf;
    }
}
