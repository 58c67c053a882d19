//! On-disk layout constants and packed wire structs (§3/§6).
//!
//! These are fixed and compatibility-critical: any change to a constant or
//! struct layout here changes the bytes a formatted image produces. Sizes
//! are pinned with `const` assertions in the style of the teacher's
//! `disk_layout.rs` (`const_assert!(size_of::<Inode>() == 256)`), adapted
//! to this crate's narrower on-disk types.
//!
//! Regular/directory and symlink inodes share one fixed-size record
//! (`RawInode`) whose tail bytes are interpreted two different ways
//! depending on `ftype` — the "tagged variant sharing a header" shape the
//! design notes ask for. Rather than an unsafe union, the tail is plain
//! bytes with typed accessors, since both interpretations are small enough
//! to be cheap to encode/decode on every access.

use crate::error::{FsError, Result};

/// Block size in bytes.
pub const BLKSIZE: usize = 1024;
/// Direct block pointers held inline in an inode.
pub const NDIRECT: usize = 10;
/// Block numbers held in one indirect block.
pub const NINDIRECT: usize = BLKSIZE / 4;
/// Maximum filename length, excluding any terminator.
pub const MAXNAMELEN: usize = 58;
/// Maximum inline symlink target length.
pub const MAXSYMLINKLEN: usize = 60;
/// Size in bytes of one directory entry.
pub const DIRENTSIZE: usize = 64;
/// First block of the free bitmap.
pub const FREEMAP_BLK: u32 = 2;
/// Inode number of the root directory.
pub const ROOT_INO: u32 = 1;
/// Inode number reserved for the diagnostic journal-replay log (§6). This
/// crate never writes to it (there is no journal writer, §9); it exists so
/// `replay_journal` has a concrete, reserved place to read from rather than
/// being pure no-op.
pub const JOURNAL_INO: u32 = 2;

/// Size of the interpretation-dependent tail of a [`RawInode`]: large
/// enough for either `NDIRECT` direct pointers + indirect + indirect2 (48
/// bytes), or an inline symlink path of up to `MAXSYMLINKLEN` bytes plus a
/// NUL terminator (61 bytes), rounded up to a 4-byte multiple.
const INODE_TAIL_SIZE: usize = 64;

const fn const_assert_eq(a: usize, b: usize) {
    assert!(a == b);
}

const _: () = const_assert_eq(NDIRECT * 4 + 4 + 4, 48);
const _: () = assert!(INODE_TAIL_SIZE >= 48);
const _: () = assert!(INODE_TAIL_SIZE >= MAXSYMLINKLEN + 1);

/// File type tag stored in an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Free = 0,
    Regular = 1,
    Directory = 2,
    Symlink = 3,
}

impl FileType {
    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(FileType::Free),
            1 => Some(FileType::Regular),
            2 => Some(FileType::Directory),
            3 => Some(FileType::Symlink),
            _ => None,
        }
    }
}

/// On-disk superblock (§3), occupying block 1.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SuperBlock {
    pub magic: u32,
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub first_inode_block: u32,
}

pub const SUPERBLOCK_MAGIC: u32 = 0x0550_7066;

/// On-disk inode (§3/§6). Header is `(size, ftype, nlink, mode)`, matching
/// the common fields spec.md lists for every variant; the tail is
/// interpreted as `(direct[10], indirect, indirect2)` for regular/directory
/// inodes or as an inline path for symlinks.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawInode {
    pub size: u32,
    pub ftype: u32,
    pub nlink: u32,
    pub mode: u32,
    tail: [u8; INODE_TAIL_SIZE],
}

const _: () = const_assert_eq(core::mem::size_of::<RawInode>(), 16 + INODE_TAIL_SIZE);

impl Default for RawInode {
    fn default() -> Self {
        RawInode {
            size: 0,
            ftype: FileType::Free as u32,
            nlink: 0,
            mode: 0,
            tail: [0; INODE_TAIL_SIZE],
        }
    }
}

impl RawInode {
    /// Zero every field, including the pointer tree / inline path. Used
    /// before reusing a free inode slot (§9 open question: a reused inode
    /// must not retain a stale pointer tree).
    pub fn zero(&mut self) {
        *self = RawInode::default();
    }

    pub fn direct(&self, i: usize) -> u32 {
        u32::from_le_bytes(self.tail[i * 4..i * 4 + 4].try_into().unwrap())
    }

    pub fn set_direct(&mut self, i: usize, b: u32) {
        self.tail[i * 4..i * 4 + 4].copy_from_slice(&b.to_le_bytes());
    }

    pub fn indirect(&self) -> u32 {
        let o = NDIRECT * 4;
        u32::from_le_bytes(self.tail[o..o + 4].try_into().unwrap())
    }

    pub fn set_indirect(&mut self, b: u32) {
        let o = NDIRECT * 4;
        self.tail[o..o + 4].copy_from_slice(&b.to_le_bytes());
    }

    pub fn indirect2(&self) -> u32 {
        let o = NDIRECT * 4 + 4;
        u32::from_le_bytes(self.tail[o..o + 4].try_into().unwrap())
    }

    pub fn set_indirect2(&mut self, b: u32) {
        let o = NDIRECT * 4 + 4;
        self.tail[o..o + 4].copy_from_slice(&b.to_le_bytes());
    }

    pub fn inline_path(&self) -> &str {
        let len = self.tail[..=MAXSYMLINKLEN]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAXSYMLINKLEN);
        core::str::from_utf8(&self.tail[..len]).unwrap_or("")
    }

    pub fn set_inline_path(&mut self, target: &str) -> Result<()> {
        if target.len() > MAXSYMLINKLEN {
            return Err(FsError::NameTooLong);
        }
        self.tail = [0; INODE_TAIL_SIZE];
        self.tail[..target.len()].copy_from_slice(target.as_bytes());
        Ok(())
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_u32(self.ftype)
    }
}

/// One slot of an indirect block: `NINDIRECT` raw block numbers.
pub type IndirectBlock = [u32; NINDIRECT];

pub fn indirect_block_from_bytes(b: &[u8; BLKSIZE]) -> IndirectBlock {
    let mut out = [0u32; NINDIRECT];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u32::from_le_bytes(b[i * 4..i * 4 + 4].try_into().unwrap());
    }
    out
}

pub fn indirect_block_to_bytes(ib: &IndirectBlock) -> [u8; BLKSIZE] {
    let mut out = [0u8; BLKSIZE];
    for (i, &v) in ib.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    out
}

/// One directory entry (§3/§6): an inode number (0 = tombstone) followed by
/// a fixed-length name buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub ino: u32,
    name: [u8; DIRENTSIZE - 4],
}

const _: () = const_assert_eq(core::mem::size_of::<DirEntry>(), DIRENTSIZE);
const _: () = assert!(DIRENTSIZE - 4 > MAXNAMELEN);

impl Default for DirEntry {
    fn default() -> Self {
        DirEntry {
            ino: 0,
            name: [0; DIRENTSIZE - 4],
        }
    }
}

impl DirEntry {
    pub fn is_free(&self) -> bool {
        self.ino == 0
    }

    /// Byte length of the stored name, i.e. up to the first NUL.
    pub fn name_len(&self) -> usize {
        self.name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len())
    }

    pub fn name_str(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len()]).unwrap_or("")
    }

    pub fn set(&mut self, ino: u32, name: &str) -> Result<()> {
        if name.len() > MAXNAMELEN {
            return Err(FsError::NameTooLong);
        }
        self.ino = ino;
        self.name = [0; DIRENTSIZE - 4];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = DirEntry::default();
    }

    pub fn to_bytes(&self) -> [u8; DIRENTSIZE] {
        let mut out = [0u8; DIRENTSIZE];
        out[..4].copy_from_slice(&self.ino.to_le_bytes());
        out[4..].copy_from_slice(&self.name);
        out
    }

    pub fn from_bytes(b: &[u8; DIRENTSIZE]) -> Self {
        let ino = u32::from_le_bytes(b[..4].try_into().unwrap());
        let mut name = [0u8; DIRENTSIZE - 4];
        name.copy_from_slice(&b[4..]);
        DirEntry { ino, name }
    }
}

pub fn raw_inode_to_bytes(inode: &RawInode) -> [u8; 16 + INODE_TAIL_SIZE] {
    let mut out = [0u8; 16 + INODE_TAIL_SIZE];
    out[0..4].copy_from_slice(&inode.size.to_le_bytes());
    out[4..8].copy_from_slice(&inode.ftype.to_le_bytes());
    out[8..12].copy_from_slice(&inode.nlink.to_le_bytes());
    out[12..16].copy_from_slice(&inode.mode.to_le_bytes());
    out[16..].copy_from_slice(&inode.tail);
    out
}

pub fn raw_inode_from_bytes(b: &[u8]) -> RawInode {
    let mut tail = [0u8; INODE_TAIL_SIZE];
    tail.copy_from_slice(&b[16..16 + INODE_TAIL_SIZE]);
    RawInode {
        size: u32::from_le_bytes(b[0..4].try_into().unwrap()),
        ftype: u32::from_le_bytes(b[4..8].try_into().unwrap()),
        nlink: u32::from_le_bytes(b[8..12].try_into().unwrap()),
        mode: u32::from_le_bytes(b[12..16].try_into().unwrap()),
        tail,
    }
}

/// Size in bytes of one [`RawInode`] record on disk.
pub const INODE_SIZE: usize = 16 + INODE_TAIL_SIZE;
