//! The filesystem handle gluing L0–L7 together (§2).
//!
//! `Ospfs` owns the block device, the decoded superblock, and the bitmap
//! allocator's region bookkeeping, the way the teacher's
//! `FastFileSystemInner` owns a `Disk` plus cached region ranges. Unlike the
//! teacher, there is no inode cache and no locking here: spec §5 states the
//! host serializes all entry points per inode (and often per mount) before
//! calling in, so this crate performs no internal synchronization and reads
//! the inode table directly on every access.

use crate::bitmap::Bitmap;
use crate::disk::BlockDevice;
use crate::error::{FsError, Result};
use crate::inode::{blocks_for_size, doubly_indirect_coords, ind_idx, MAX_FILE_BLOCKS};
use crate::layout::{
    indirect_block_from_bytes, raw_inode_from_bytes, raw_inode_to_bytes, FileType, RawInode,
    SuperBlock, BLKSIZE, INODE_SIZE, JOURNAL_INO, ROOT_INO, SUPERBLOCK_MAGIC,
};

/// An in-memory, block-structured filesystem instance.
pub struct Ospfs {
    pub(crate) dev: Box<dyn BlockDevice>,
    pub(crate) sb: SuperBlock,
    pub(crate) bitmap: Bitmap,
}

impl Ospfs {
    /// Formats a fresh block device: writes the superblock, zeroes the
    /// bitmap and marks data blocks free, zeroes the inode table, and
    /// creates the root directory inode with `.`/`..` entries pointing at
    /// itself (I9, I6).
    ///
    /// This is this crate's analogue of the "initial filesystem image
    /// builder" spec §1 scopes out as an external collaborator for a real
    /// deployment, kept here because there is no other way to construct a
    /// usable `Ospfs` for a library consumer or for tests.
    pub fn format(mut dev: Box<dyn BlockDevice>, total_inodes: u32) -> Result<Self> {
        let total_blocks = dev.block_count();
        let bitmap = Bitmap::new(total_blocks, total_inodes);
        if bitmap.first_data_block >= total_blocks {
            return Err(FsError::NoSpace);
        }

        let sb = SuperBlock {
            magic: SUPERBLOCK_MAGIC,
            total_blocks,
            total_inodes,
            first_inode_block: bitmap.bitmap_start + bitmap.bitmap_blocks,
        };
        dev.write_block(1, &sb_to_block(&sb));

        bitmap.format(dev.as_mut());

        for i in 0..total_inodes {
            write_raw_inode(dev.as_mut(), sb.first_inode_block, total_inodes, i + 1, &RawInode::default());
        }

        let mut fs = Ospfs { dev, sb, bitmap };

        let mut root = RawInode::default();
        root.ftype = FileType::Directory as u32;
        root.nlink = 1;
        root.mode = 0o755;
        fs.put_raw_inode(ROOT_INO, &root)?;
        fs.dir_init(ROOT_INO, ROOT_INO)?;

        // Reserve the journal-replay inode so `allocate_inode_slot` never
        // hands it out to a regular `create`/`symlink` (§6 diagnostic hook).
        // It starts empty; nothing in this crate ever writes to it.
        let mut journal = RawInode::default();
        journal.ftype = FileType::Regular as u32;
        journal.nlink = 1;
        journal.mode = 0o600;
        fs.put_raw_inode(JOURNAL_INO, &journal)?;

        log::info!(
            "ospfs: formatted {} blocks / {} inodes, data starts at block {}",
            total_blocks,
            total_inodes,
            fs.bitmap.first_data_block
        );
        Ok(fs)
    }

    /// Loads an already-formatted device by reading back its superblock.
    pub fn mount(dev: Box<dyn BlockDevice>) -> Result<Self> {
        let mut buf = [0u8; BLKSIZE];
        dev.read_block(1, &mut buf);
        let sb = sb_from_block(&buf);
        if sb.magic != SUPERBLOCK_MAGIC {
            return Err(FsError::Io);
        }
        let bitmap = Bitmap::new(sb.total_blocks, sb.total_inodes);
        Ok(Ospfs { dev, sb, bitmap })
    }

    pub fn total_inodes(&self) -> u32 {
        self.sb.total_inodes
    }

    // ---- inode table access -------------------------------------------------

    pub(crate) fn get_raw_inode(&self, ino: u32) -> Result<RawInode> {
        if ino == 0 || ino > self.sb.total_inodes {
            return Err(FsError::NotFound);
        }
        Ok(read_raw_inode(
            self.dev.as_ref(),
            self.sb.first_inode_block,
            self.sb.total_inodes,
            ino,
        ))
    }

    pub(crate) fn put_raw_inode(&mut self, ino: u32, inode: &RawInode) -> Result<()> {
        if ino == 0 || ino > self.sb.total_inodes {
            return Err(FsError::NotFound);
        }
        write_raw_inode(
            self.dev.as_mut(),
            self.sb.first_inode_block,
            self.sb.total_inodes,
            ino,
            inode,
        );
        Ok(())
    }

    /// Finds the first inode slot with `nlink == 0` (free), not counting
    /// inode 0 (unused by convention; slots are 1-indexed). Per spec §4.5,
    /// the returned inode is zeroed before the caller initializes it.
    pub(crate) fn allocate_inode_slot(&mut self) -> Result<u32> {
        for ino in 1..=self.sb.total_inodes {
            let raw = self.get_raw_inode(ino)?;
            if raw.nlink == 0 {
                let mut fresh = RawInode::default();
                fresh.zero();
                self.put_raw_inode(ino, &fresh)?;
                return Ok(ino);
            }
        }
        log::warn!("ospfs: inode table full");
        Err(FsError::NoSpace)
    }

    // ---- block store passthroughs -------------------------------------------

    pub(crate) fn read_block(&self, b: u32) -> [u8; BLKSIZE] {
        let mut buf = [0u8; BLKSIZE];
        self.dev.read_block(b, &mut buf);
        buf
    }

    pub(crate) fn write_block(&mut self, b: u32, buf: &[u8; BLKSIZE]) {
        self.dev.write_block(b, buf);
    }

    pub(crate) fn alloc_block(&mut self) -> Option<u32> {
        self.bitmap.alloc_block(self.dev.as_mut())
    }

    pub(crate) fn free_block(&mut self, b: u32) {
        self.bitmap.free_block(self.dev.as_mut(), b)
    }

    // ---- L2: offset -> block number ----------------------------------------

    /// Resolves file-block `b` of `inode` to a physical block number.
    /// Returns `Ok(None)` ("no block") if `b` is past `inode.size` in block
    /// terms or `inode` is a symlink (§4.1): symlink contents live inline,
    /// not in data blocks.
    pub(crate) fn block_no(&self, inode: &RawInode, b: usize) -> Result<Option<u32>> {
        if inode.file_type() == Some(FileType::Symlink) {
            return Ok(None);
        }
        if b >= blocks_for_size(inode.size as usize) || b >= MAX_FILE_BLOCKS {
            return Ok(None);
        }
        if let Some(slot) = crate::inode::dir_idx(b) {
            let p = inode.direct(slot);
            return Ok((p != 0).then_some(p));
        }
        if b < crate::layout::NDIRECT + crate::layout::NINDIRECT {
            let ind = inode.indirect();
            if ind == 0 {
                return Ok(None);
            }
            let slot = b - crate::layout::NDIRECT;
            let block = indirect_block_from_bytes(&self.read_block(ind));
            let p = block[slot];
            return Ok((p != 0).then_some(p));
        }
        let di = inode.indirect2();
        if di == 0 {
            return Ok(None);
        }
        let (outer, inner) = doubly_indirect_coords(b);
        let outer_block = indirect_block_from_bytes(&self.read_block(di));
        let ind = outer_block[outer];
        if ind == 0 {
            return Ok(None);
        }
        let inner_block = indirect_block_from_bytes(&self.read_block(ind));
        let p = inner_block[inner];
        Ok((p != 0).then_some(p))
    }

    /// How many new structural blocks (beyond the data block itself) adding
    /// file-block `n` (the `n`-th block, 0-indexed, so current count is
    /// `n`) requires, per §4.3 step 1.
    pub(crate) fn new_structural_blocks_needed(n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let mut extra = 0;
        if ind_idx(n) != ind_idx(n - 1) {
            extra += 1;
        }
        if crate::inode::dbl_idx(n) != crate::inode::dbl_idx(n - 1) {
            extra += 1;
        }
        extra
    }
}

fn region_offset(first_inode_block: u32, total_inodes: u32, ino: u32) -> (u32, usize) {
    let per_block = BLKSIZE / INODE_SIZE;
    let idx = (ino - 1) as usize;
    (first_inode_block + (idx / per_block) as u32, idx % per_block)
}

fn read_raw_inode(dev: &dyn BlockDevice, first_inode_block: u32, total_inodes: u32, ino: u32) -> RawInode {
    let (blk, slot) = region_offset(first_inode_block, total_inodes, ino);
    let mut buf = [0u8; BLKSIZE];
    dev.read_block(blk, &mut buf);
    raw_inode_from_bytes(&buf[slot * INODE_SIZE..(slot + 1) * INODE_SIZE])
}

fn write_raw_inode(
    dev: &mut dyn BlockDevice,
    first_inode_block: u32,
    total_inodes: u32,
    ino: u32,
    inode: &RawInode,
) {
    let (blk, slot) = region_offset(first_inode_block, total_inodes, ino);
    let mut buf = [0u8; BLKSIZE];
    dev.read_block(blk, &mut buf);
    let bytes = raw_inode_to_bytes(inode);
    buf[slot * INODE_SIZE..(slot + 1) * INODE_SIZE].copy_from_slice(&bytes);
    dev.write_block(blk, &buf);
}

fn sb_to_block(sb: &SuperBlock) -> [u8; BLKSIZE] {
    let mut buf = [0u8; BLKSIZE];
    buf[0..4].copy_from_slice(&sb.magic.to_le_bytes());
    buf[4..8].copy_from_slice(&sb.total_blocks.to_le_bytes());
    buf[8..12].copy_from_slice(&sb.total_inodes.to_le_bytes());
    buf[12..16].copy_from_slice(&sb.first_inode_block.to_le_bytes());
    buf
}

fn sb_from_block(buf: &[u8; BLKSIZE]) -> SuperBlock {
    SuperBlock {
        magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
        total_blocks: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
        total_inodes: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
        first_inode_block: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
    }
}
