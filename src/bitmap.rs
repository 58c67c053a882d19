//! L1: free-space bitmap allocator (§4.2).
//!
//! One bit per block, starting at the first data block; bit = 1 means free.
//! Blocks below the first data block (boot, super, bitmap, inode table)
//! are never visited: the scan starts at `first_data_block`, resolving the
//! allocator-boundary bug the spec's Open Questions flag in the original
//! ("`allocate_block` iterates in a way that skips past the first bitmap
//! block boundary incorrectly on very large disks; the correct scheme is
//! one bit per block, indexed linearly").

use crate::disk::BlockDevice;
use crate::layout::{BLKSIZE, FREEMAP_BLK};

/// Bitmap allocator over a region of the disk.
///
/// Holds the block range it owns (bitmap blocks) and the first data block
/// it may hand out, so `alloc_block`/`free_block` can refuse to touch
/// reserved blocks.
pub struct Bitmap {
    pub bitmap_start: u32,
    pub bitmap_blocks: u32,
    pub first_data_block: u32,
    pub total_blocks: u32,
}

impl Bitmap {
    pub fn new(total_blocks: u32, total_inodes: u32) -> Self {
        let bits_per_block = (BLKSIZE * 8) as u32;
        let bitmap_blocks = total_blocks.div_ceil(bits_per_block);
        let inode_bytes = total_inodes as usize * crate::layout::INODE_SIZE;
        let inode_blocks = inode_bytes.div_ceil(BLKSIZE) as u32;
        let first_inode_block = FREEMAP_BLK + bitmap_blocks;
        let first_data_block = first_inode_block + inode_blocks;
        Bitmap {
            bitmap_start: FREEMAP_BLK,
            bitmap_blocks,
            first_data_block,
            total_blocks,
        }
    }

    fn bit_location(&self, block: u32) -> (u32, usize) {
        let bits_per_block = (BLKSIZE * 8) as u32;
        let blk = self.bitmap_start + block / bits_per_block;
        let off = (block % bits_per_block) as usize;
        (blk, off)
    }

    fn get_bit(&self, dev: &dyn BlockDevice, block: u32) -> bool {
        let (blk, off) = self.bit_location(block);
        let mut buf = [0u8; BLKSIZE];
        dev.read_block(blk, &mut buf);
        (buf[off / 8] >> (off % 8)) & 1 == 1
    }

    fn set_bit(&self, dev: &mut dyn BlockDevice, block: u32, free: bool) {
        let (blk, off) = self.bit_location(block);
        let mut buf = [0u8; BLKSIZE];
        dev.read_block(blk, &mut buf);
        if free {
            buf[off / 8] |= 1 << (off % 8);
        } else {
            buf[off / 8] &= !(1 << (off % 8));
        }
        dev.write_block(blk, &buf);
    }

    /// Initializes the bitmap so every data block is marked free and every
    /// reserved block (boot/super/bitmap/inode-table) reads as in-use.
    pub fn format(&self, dev: &mut dyn BlockDevice) {
        for blk in self.bitmap_start..self.bitmap_start + self.bitmap_blocks {
            dev.write_block(blk, &[0u8; BLKSIZE]);
        }
        for b in self.first_data_block..self.total_blocks {
            self.set_bit(dev, b, true);
        }
    }

    /// Scans from the first data block onward and returns the first free
    /// block, marking it in-use. Returns `None` ("no space") if exhausted.
    pub fn alloc_block(&self, dev: &mut dyn BlockDevice) -> Option<u32> {
        for b in self.first_data_block..self.total_blocks {
            if self.get_bit(dev, b) {
                self.set_bit(dev, b, false);
                log::trace!("ospfs: allocated block {b}");
                return Some(b);
            }
        }
        log::warn!("ospfs: block allocation failed, bitmap exhausted");
        None
    }

    /// Marks block `b` free again. Refuses to free a reserved block (boot,
    /// super, bitmap, or inode table) or block 0; callers must not
    /// double-free a data block, which this component does not detect, per
    /// spec §4.2.
    pub fn free_block(&self, dev: &mut dyn BlockDevice, b: u32) {
        if b < self.first_data_block || b >= self.total_blocks {
            log::error!("ospfs: refusing to free reserved or out-of-range block {b}");
            return;
        }
        self.set_bit(dev, b, true);
        log::trace!("ospfs: freed block {b}");
    }
}
