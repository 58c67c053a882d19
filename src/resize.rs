//! L3: the resize engine — growing and shrinking files one block at a time
//! (§4.3).
//!
//! This is the only layer that composes the bitmap allocator (L1) with
//! inode addressing (L2), matching spec §2's data-flow note. `add_block`
//! allocates every structural block a single append needs up front and
//! rolls every one of them back on failure, so a caller never observes a
//! partially-grown file after an ENOSPC — the same rollback discipline the
//! teacher's journal gives it for free (via `RunningTransaction`) but which
//! this crate, having no journal, must do explicitly.

use crate::error::{FsError, Result};
use crate::inode::{blocks_for_size, dbl_idx, doubly_indirect_coords, dir_idx, ind_idx};
use crate::layout::{
    indirect_block_from_bytes, indirect_block_to_bytes, FileType, RawInode, BLKSIZE, NDIRECT,
    NINDIRECT,
};
use crate::Ospfs;

impl Ospfs {
    /// Appends one zero-filled data block to `inode`, allocating whatever
    /// indirect/doubly-indirect structure is newly required. On any
    /// allocation failure partway through, every block allocated during
    /// this call is freed before returning `NoSpace`, so the inode is left
    /// exactly as it was (§4.3 step 2).
    pub(crate) fn add_block(&mut self, inode: &mut RawInode) -> Result<()> {
        let n = blocks_for_size(inode.size as usize);
        if n >= crate::inode::MAX_FILE_BLOCKS {
            return Err(FsError::NoSpace);
        }
        let needed = Self::new_structural_blocks_needed(n) + 1;
        let mut allocated = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.alloc_block() {
                Some(b) => allocated.push(b),
                None => {
                    for b in allocated {
                        self.free_block(b);
                    }
                    return Err(FsError::NoSpace);
                }
            }
        }
        for &b in &allocated {
            self.write_block(b, &[0u8; BLKSIZE]);
        }

        // `allocated` is ordered [data, (indirect)?, (doubly-indirect)?] by
        // construction above; the data block is always `allocated[0]`.
        let data_block = allocated[0];
        let mut extra = allocated.into_iter().skip(1);

        if let Some(slot) = dir_idx(n) {
            inode.set_direct(slot, data_block);
        } else if n < NDIRECT + NINDIRECT {
            // Single-indirect region: the indirect block is new exactly
            // when this is the first block past the direct pointers.
            let needs_new_indirect = n == NDIRECT;
            let ind_lba = if needs_new_indirect {
                extra.next().expect("indirect block allocated")
            } else {
                inode.indirect()
            };
            let mut block = if needs_new_indirect {
                [0u32; NINDIRECT]
            } else {
                indirect_block_from_bytes(&self.read_block(ind_lba))
            };
            block[n - NDIRECT] = data_block;
            self.write_block(ind_lba, &indirect_block_to_bytes(&block));
            inode.set_indirect(ind_lba);
        } else {
            // Doubly-indirect region.
            let (outer, inner) = doubly_indirect_coords(n);
            let needs_new_double = n == NDIRECT + NINDIRECT;
            let needs_new_indirect = inner == 0;

            let di_lba = if needs_new_double {
                extra.next().expect("doubly-indirect block allocated")
            } else {
                inode.indirect2()
            };
            let mut outer_block = if needs_new_double {
                [0u32; NINDIRECT]
            } else {
                indirect_block_from_bytes(&self.read_block(di_lba))
            };

            let ind_lba = if needs_new_indirect {
                let lba = extra.next().expect("indirect block allocated");
                outer_block[outer] = lba;
                lba
            } else {
                outer_block[outer]
            };
            let mut inner_block = if needs_new_indirect {
                [0u32; NINDIRECT]
            } else {
                indirect_block_from_bytes(&self.read_block(ind_lba))
            };
            inner_block[inner] = data_block;

            self.write_block(ind_lba, &indirect_block_to_bytes(&inner_block));
            self.write_block(di_lba, &indirect_block_to_bytes(&outer_block));
            inode.set_indirect2(di_lba);
        }

        inode.size += BLKSIZE as u32;
        Ok(())
    }

    /// Removes the last data block of `inode`, freeing the indirect and/or
    /// doubly-indirect blocks that become empty as a result (§4.3).
    pub(crate) fn remove_block(&mut self, inode: &mut RawInode) -> Result<()> {
        let n = blocks_for_size(inode.size as usize);
        if n == 0 {
            return Ok(());
        }
        let last = n - 1;
        let data_block = self.block_no(inode, last)?.ok_or(FsError::Io)?;
        self.free_block(data_block);

        if let Some(slot) = dir_idx(last) {
            inode.set_direct(slot, 0);
        } else if last < NDIRECT + NINDIRECT {
            let ind_lba = inode.indirect();
            let mut block = indirect_block_from_bytes(&self.read_block(ind_lba));
            block[last - NDIRECT] = 0;
            if ind_idx(n) != ind_idx(last) {
                self.free_block(ind_lba);
                inode.set_indirect(0);
            } else {
                self.write_block(ind_lba, &indirect_block_to_bytes(&block));
            }
        } else {
            let (outer, inner) = doubly_indirect_coords(last);
            let di_lba = inode.indirect2();
            let mut outer_block = indirect_block_from_bytes(&self.read_block(di_lba));
            let ind_lba = outer_block[outer];
            let mut inner_block = indirect_block_from_bytes(&self.read_block(ind_lba));
            inner_block[inner] = 0;

            if ind_idx(n) != ind_idx(last) {
                self.free_block(ind_lba);
                outer_block[outer] = 0;
            } else {
                self.write_block(ind_lba, &indirect_block_to_bytes(&inner_block));
            }

            if dbl_idx(n) != dbl_idx(last) {
                self.free_block(di_lba);
                inode.set_indirect2(0);
            } else {
                self.write_block(di_lba, &indirect_block_to_bytes(&outer_block));
            }
        }

        inode.size -= BLKSIZE as u32;
        Ok(())
    }

    /// Grows or shrinks `inode` to exactly `want` bytes, one block at a
    /// time, finally pinning `size` to `want` (which need not be a multiple
    /// of `BLKSIZE`). If growth fails partway through, shrinks back to the
    /// original size before returning the error, preserving I3 (§4.3).
    /// Directories cannot be shrunk (truncation of a directory is
    /// `NotPermitted`); they can still be grown by `create_blank_direntry`.
    pub fn change_size(&mut self, ino: u32, want: usize) -> Result<()> {
        let mut inode = self.get_raw_inode(ino)?;
        if inode.file_type() == Some(FileType::Directory) && want < inode.size as usize {
            return Err(FsError::NotPermitted);
        }
        let original_size = inode.size;
        let target_blocks = blocks_for_size(want);

        let mut grow_err = None;
        while blocks_for_size(inode.size as usize) < target_blocks {
            if let Err(e) = self.add_block(&mut inode) {
                grow_err = Some(e);
                break;
            }
        }

        if let Some(e) = grow_err {
            while inode.size > original_size {
                self.remove_block(&mut inode)?;
            }
            inode.size = original_size;
            self.put_raw_inode(ino, &inode)?;
            return Err(e);
        }

        while blocks_for_size(inode.size as usize) > target_blocks {
            self.remove_block(&mut inode)?;
        }

        inode.size = want as u32;
        self.put_raw_inode(ino, &inode)?;
        Ok(())
    }
}
