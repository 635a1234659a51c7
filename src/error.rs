//! The closed set of failure kinds a TinyFS operation can return.
//!
//! Each variant also carries a historical negative-integer code, retrievable through
//! [`Error::code`], for a caller or conformance test that wants the classic C-style
//! return-value contract alongside the typed `Result`.

use std::fmt;
use std::io;

/// A TinyFS operation failure.
#[derive(Debug)]
pub enum Error {
    /// `fd` is out of range or refers to an empty open-file-table slot.
    BadFd,
    /// The free chain is empty when a block is required.
    NoSpace,
    /// A write would exceed an implementation-defined size ceiling.
    FileTooBig,
    /// `mkfs` failed: bad size, or the underlying disk could not be created.
    CreateFs(String),
    /// `mount` failed: already mounted, bad magic/kind tag, or the disk could not be opened.
    MountFs(String),
    /// `unmount` failed: no disk is currently mounted.
    UnmountFs,
    /// `open_file` found the name already referenced by an open-file-table entry.
    AlreadyOpen,
    /// `close_file` could not validate the close.
    Close,
    /// Inode chain traversal or block rewrite failed while deleting a file.
    Delete,
    /// The deallocator could not read or write one of the blocks involved.
    Dealloc,
    /// Underlying block I/O failed on a read.
    Read(io::Error),
    /// Underlying block I/O failed on a write, or the free list ran out mid-write.
    Write(io::Error),
    /// A read was attempted at or past end-of-file.
    ReadPastEof,
    /// The proposed name does not fit in the name field.
    Rename,
}

impl Error {
    /// Returns the negative integer code associated with this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::BadFd => -1,
            Self::NoSpace => -2,
            Self::FileTooBig => -3,
            Self::CreateFs(_) => -4,
            Self::MountFs(_) => -5,
            Self::UnmountFs => -6,
            Self::AlreadyOpen => -7,
            Self::Close => -8,
            Self::Delete => -9,
            Self::Dealloc => -10,
            Self::Read(_) => -11,
            Self::Write(_) => -12,
            Self::ReadPastEof => -13,
            Self::Rename => -14,
        }
    }

    /// Returns the short mnemonic historically associated with this error (`EBADFD`,
    /// `ENOSPC`, ...), handy for diagnostics or logs that want the terse form.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::BadFd => "EBADFD",
            Self::NoSpace => "ENOSPC",
            Self::FileTooBig => "EFBIG",
            Self::CreateFs(_) => "ECREATFS",
            Self::MountFs(_) => "EMOUNTFS",
            Self::UnmountFs => "EUNMOUNTFS",
            Self::AlreadyOpen => "EOPEN",
            Self::Close => "ECLOSE",
            Self::Delete => "EDELETE",
            Self::Dealloc => "EDEALLOC",
            Self::Read(_) => "EFREAD",
            Self::Write(_) => "EFWRITE",
            Self::ReadPastEof => "EBREAD",
            Self::Rename => "ERENAME",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFd => write!(f, "invalid file descriptor"),
            Self::NoSpace => write!(f, "no free blocks available"),
            Self::FileTooBig => write!(f, "file exceeds the maximum supported size"),
            Self::CreateFs(msg) => write!(f, "could not create file system: {msg}"),
            Self::MountFs(msg) => write!(f, "could not mount file system: {msg}"),
            Self::UnmountFs => write!(f, "no file system is mounted"),
            Self::AlreadyOpen => write!(f, "file is already open"),
            Self::Close => write!(f, "could not close file"),
            Self::Delete => write!(f, "could not delete file"),
            Self::Dealloc => write!(f, "could not deallocate block"),
            Self::Read(e) => write!(f, "block read failed: {e}"),
            Self::Write(e) => write!(f, "block write failed: {e}"),
            Self::ReadPastEof => write!(f, "read past end of file"),
            Self::Rename => write!(f, "new name does not fit in the name field"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) | Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_are_negative_and_distinct() {
        let errs = [
            Error::BadFd,
            Error::NoSpace,
            Error::FileTooBig,
            Error::CreateFs(String::new()),
            Error::MountFs(String::new()),
            Error::UnmountFs,
            Error::AlreadyOpen,
            Error::Close,
            Error::Delete,
            Error::Dealloc,
            Error::Read(io::Error::other("x")),
            Error::Write(io::Error::other("x")),
            Error::ReadPastEof,
            Error::Rename,
        ];
        let mut codes: Vec<i32> = errs.iter().map(Error::code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }
}
