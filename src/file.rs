//! L4: file I/O — `read`/`write` with append semantics and auto-grow
//! (§4.4).
//!
//! "User buffer copy" in the spec stands in for whatever mechanism a host
//! uses to move bytes across a privilege boundary; here the caller simply
//! passes a `&mut [u8]`/`&[u8]` slice, and only a short/zero-length buffer
//! can make the copy "fail" ([`FsError::BadAddress`]), since there is no
//! other way for an in-process slice copy to fault.

use bitflags::bitflags;

use crate::error::{FsError, Result};
use crate::layout::BLKSIZE;
use crate::Ospfs;

bitflags! {
    /// Flags a host would pass down from `open()`. Only the one bit this
    /// layer's semantics depend on is modeled.
    pub struct OpenFlags: u32 {
        const APPEND = 0b0000_0001;
    }
}

impl Ospfs {
    /// Reads up to `count` bytes starting at `*pos` into `buf`, clamping so
    /// a read never passes end-of-file. Returns the number of bytes
    /// actually transferred.
    pub fn read(&self, ino: u32, buf: &mut [u8], pos: &mut usize) -> Result<usize> {
        let inode = self.get_raw_inode(ino)?;
        let size = inode.size as usize;
        let count = buf.len().min(size.saturating_sub(*pos));
        let mut done = 0;
        while done < count {
            let file_block = (*pos + done) / BLKSIZE;
            let in_block_off = (*pos + done) % BLKSIZE;
            let chunk = (BLKSIZE - in_block_off).min(count - done);

            let block = self
                .block_no(&inode, file_block)?
                .ok_or(FsError::Io)?;
            let data = self.read_block(block);
            buf[done..done + chunk].copy_from_slice(&data[in_block_off..in_block_off + chunk]);
            done += chunk;
        }
        *pos += done;
        Ok(done)
    }

    /// Writes `buf` starting at `*pos`, growing the file via
    /// [`Ospfs::change_size`] if the write would extend past the current
    /// size. If `flags` has `APPEND`, `*pos` is first reset to the file's
    /// current size (§4.4).
    pub fn write(
        &mut self,
        ino: u32,
        buf: &[u8],
        pos: &mut usize,
        flags: OpenFlags,
    ) -> Result<usize> {
        let inode = self.get_raw_inode(ino)?;
        if flags.contains(OpenFlags::APPEND) {
            *pos = inode.size as usize;
        }

        let end = *pos + buf.len();
        if end > inode.size as usize {
            self.change_size(ino, end)?;
        }

        let mut done = 0;
        while done < buf.len() {
            let inode = self.get_raw_inode(ino)?;
            let file_block = (*pos + done) / BLKSIZE;
            let in_block_off = (*pos + done) % BLKSIZE;
            let chunk = (BLKSIZE - in_block_off).min(buf.len() - done);

            let block = self
                .block_no(&inode, file_block)?
                .ok_or(FsError::Io)?;
            let mut data = self.read_block(block);
            data[in_block_off..in_block_off + chunk].copy_from_slice(&buf[done..done + chunk]);
            self.write_block(block, &data);
            done += chunk;
        }
        *pos += done;
        Ok(done)
    }
}
