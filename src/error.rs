//! The error taxonomy surfaced to a host VFS.
//!
//! Every public operation in this crate returns `Result<T, FsError>`. The
//! variant set mirrors the symbolic taxonomy in the specification: each
//! variant corresponds to a POSIX errno a host VFS would translate it to,
//! plus a corruption variant used when the block-pointer tree itself is
//! found to be inconsistent (an I3 violation).

use core::fmt;

/// An error produced by a filesystem operation.
///
/// These are intentionally symbolic rather than wrapping an underlying OS
/// error: this crate has no OS beneath it, only a block array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The free bitmap is exhausted, or the inode table has no free slot.
    /// (ENOSPC)
    NoSpace,
    /// A filename or symlink target exceeds its fixed-size buffer. (ENAMETOOLONG)
    NameTooLong,
    /// A directory entry with that name already exists. (EEXIST)
    Exists,
    /// The requested name, inode, or block was not found. (ENOENT)
    NotFound,
    /// The caller-supplied buffer could not be copied to/from. (EFAULT)
    BadAddress,
    /// Addressing reached an unallocated block within a range the inode's
    /// `size` claims is valid: the pointer tree violates I3. (EIO)
    Io,
    /// The operation is not permitted on this inode (e.g. truncating a
    /// directory). (EPERM)
    NotPermitted,
    /// The host failed to allocate an in-memory handle for an operation
    /// that otherwise succeeded at the block level. (ENOMEM)
    OutOfMemory,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NoSpace => "no space left on device",
            FsError::NameTooLong => "name too long",
            FsError::Exists => "file exists",
            FsError::NotFound => "no such file or directory",
            FsError::BadAddress => "bad address",
            FsError::Io => "I/O error: pointer tree inconsistent with size",
            FsError::NotPermitted => "operation not permitted",
            FsError::OutOfMemory => "out of memory",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for FsError {}

pub type Result<T> = core::result::Result<T, FsError>;
