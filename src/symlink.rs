//! L6: symbolic links, including conditional symlinks (§4.6).
//!
//! A symlink's target is stored inline in the inode tail (`RawInode`'s
//! `inline_path`), never in data blocks — `size` still tracks the target's
//! byte length (I8) so generic size-based tooling keeps working, but
//! `block_no` always returns `None` for a symlink inode.
//!
//! A conditional symlink's target has the form `root?<a>:<b>`: a process
//! resolving it as uid 0 is redirected to `<a>`, any other uid to `<b>`.
//! This is the one piece of this format with no counterpart in a plain
//! POSIX symlink; it exists so a single dentry can serve different content
//! depending on who's asking, e.g. so `/etc/passwd` can point root at the
//! real file and everyone else at a sanitized copy.

use crate::error::{FsError, Result};
use crate::layout::{FileType, RawInode, MAXSYMLINKLEN};
use crate::Ospfs;

const CONDITIONAL_PREFIX: &str = "root?";

impl Ospfs {
    /// Creates a symlink named `name` in `dir_ino` whose target is
    /// `target` verbatim (conditional or not — this layer only stores the
    /// string, parsing happens on resolution).
    pub fn symlink(&mut self, dir_ino: u32, name: &str, target: &str) -> Result<u32> {
        if target.len() > MAXSYMLINKLEN {
            return Err(FsError::NameTooLong);
        }
        if self.find_direntry(dir_ino, name)?.is_some() {
            return Err(FsError::Exists);
        }

        let ino = self.allocate_inode_slot()?;
        let mut inode = RawInode::default();
        inode.ftype = FileType::Symlink as u32;
        inode.nlink = 1;
        inode.size = target.len() as u32;
        inode.set_inline_path(target)?;
        self.put_raw_inode(ino, &inode)?;

        let idx = self.create_blank_direntry(dir_ino)?;
        let mut entry = crate::layout::DirEntry::default();
        entry.set(ino, name)?;
        self.write_dirent(dir_ino, idx, &entry)?;
        Ok(ino)
    }

    /// Reads the raw (unresolved) target string stored at `ino`.
    pub fn read_link(&self, ino: u32) -> Result<String> {
        let inode = self.get_raw_inode(ino)?;
        if inode.file_type() != Some(FileType::Symlink) {
            return Err(FsError::NotPermitted);
        }
        Ok(inode.inline_path().to_string())
    }

    /// Resolves `ino` (which must be a symlink) to the path a reader with
    /// the given `uid` should follow, evaluating the `root?a:b` form when
    /// present. A plain (non-conditional) target is returned unchanged
    /// regardless of `uid`.
    pub fn follow_link(&self, ino: u32, uid: u32) -> Result<String> {
        let raw = self.read_link(ino)?;
        Ok(resolve_conditional(&raw, uid))
    }
}

fn resolve_conditional(target: &str, uid: u32) -> String {
    match target.strip_prefix(CONDITIONAL_PREFIX) {
        Some(rest) => match rest.split_once(':') {
            Some((for_root, for_other)) => {
                if uid == 0 {
                    for_root.to_string()
                } else {
                    for_other.to_string()
                }
            }
            None => rest.to_string(),
        },
        None => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_target_is_literal() {
        assert_eq!(resolve_conditional("/etc/real", 0), "/etc/real");
        assert_eq!(resolve_conditional("/etc/real", 1000), "/etc/real");
    }

    #[test]
    fn conditional_target_branches_on_uid() {
        let target = "root?/etc/shadow:/etc/shadow.denied";
        assert_eq!(resolve_conditional(target, 0), "/etc/shadow");
        assert_eq!(resolve_conditional(target, 1000), "/etc/shadow.denied");
    }

    #[test]
    fn malformed_conditional_without_colon_is_returned_whole() {
        assert_eq!(resolve_conditional("root?nope", 0), "nope");
    }
}
