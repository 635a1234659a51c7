//! The file system engine: `mkfs`, `mount`/`unmount`, and the open/close/write/
//! read-byte/seek/delete/rename family, backed by an in-memory open-file table.
//!
//! [`TinyFs`] owns the "currently mounted disk" and "open-file table" globals as a
//! single `Option<Mounted>` — present exactly while a disk is mounted — rather than
//! process-wide statics, so the engine can be driven from a library caller or a test
//! without going through a CLI's global state.

mod alloc;
mod ops;

pub use ops::FileInfo;

use crate::disk::{BlockDevice, RawBlock, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::layout::{BlockKind, FreeBlock, Inode, Superblock};
use std::io;

/// The default backing-file size `mkfs` uses when the caller does not specify one.
pub const DEFAULT_DISK_SIZE: u64 = 10240;
/// The default backing-file name used by the demo CLI.
pub const DEFAULT_DISK_NAME: &str = "tinyFSDisk";
/// The largest volume size `mkfs` accepts: a signed 32-bit byte count, since the size
/// field in each inode is 32 bits wide.
pub const MAX_BYTES: u64 = i32::MAX as u64;

/// A file descriptor: an index into the mounted open-file table.
pub type Fd = usize;

/// A non-owning handle into an inode's data chain: which inode, and how far into its
/// byte stream the next `read_byte` will read.
#[derive(Debug, Clone, Copy)]
struct OpenFile {
    inode: u32,
    cursor: u64,
}

/// Everything that exists only while a disk is mounted.
struct Mounted {
    disk_id: u32,
    table: Vec<Option<OpenFile>>,
}

/// A TinyFS instance: a block device registry plus, optionally, one mounted volume.
///
/// The "currently mounted disk" and "open-file table" are owned state here rather than
/// process-wide globals, so a caller can run several independent instances (handy for
/// tests that mount more than one volume in the same process).
pub struct TinyFs {
    dev: BlockDevice,
    mounted: Option<Mounted>,
}

impl Default for TinyFs {
    fn default() -> Self {
        Self::new()
    }
}

impl TinyFs {
    /// Creates an unmounted instance.
    pub fn new() -> Self {
        Self {
            dev: BlockDevice::new(),
            mounted: None,
        }
    }

    /// Enables `eprintln!` diagnostics for block-level failures, the way the CLI wants
    /// but a test harness does not.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.dev.set_verbose(verbose);
    }

    /// Returns whether a disk is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Formats a new TinyFS volume of `n_bytes` bytes on the host file `name`.
    ///
    /// `num_blocks = n_bytes / BLOCK_SIZE - 1` (block 0 is reserved for the
    /// superblock); fails if that is less than 3, or if `n_bytes` is out of range.
    pub fn mkfs(&mut self, name: &str, n_bytes: u64) -> Result<()> {
        if n_bytes == 0 || n_bytes > MAX_BYTES {
            return Err(Error::CreateFs("size out of range".into()));
        }
        let disk_id = self
            .dev
            .open_disk(name, n_bytes)
            .map_err(|e| Error::CreateFs(e.to_string()))?;

        let result = (|| {
            let byte_size = self
                .dev
                .disk_byte_size(disk_id)
                .map_err(|e| Error::CreateFs(e.to_string()))?;
            let num_blocks = (byte_size / BLOCK_SIZE as u64) as u32 - 1;
            if num_blocks < 3 {
                return Err(Error::CreateFs("volume too small".into()));
            }

            let sb = Superblock {
                free_head: 1,
                inode_head: 0,
                max_open_files: num_blocks / 2,
            };
            self.write_raw_for_mkfs(disk_id, 0, &sb.serialize())?;

            for i in 1..=num_blocks {
                let next_free = if i < num_blocks { i + 1 } else { 0 };
                let fb = FreeBlock { next_free };
                self.write_raw_for_mkfs(disk_id, i, &fb.serialize())?;
            }
            Ok(())
        })();

        let _ = self.dev.close_disk(disk_id);
        result
    }

    fn write_raw_for_mkfs(&mut self, disk_id: u32, b: u32, raw: &RawBlock) -> Result<()> {
        self.dev
            .write_block(disk_id, b, raw)
            .map_err(|e| Error::CreateFs(e.to_string()))
    }

    /// Mounts the volume on host file `name`. Fails if a volume is already mounted, if
    /// the backing file cannot be opened as an existing disk, or if header validation
    /// (magic byte, kind tag) fails while walking the inode and free chains.
    pub fn mount(&mut self, name: &str) -> Result<u32> {
        if self.mounted.is_some() {
            return Err(Error::MountFs("a disk is already mounted".into()));
        }
        let disk_id = self
            .dev
            .open_disk(name, 0)
            .map_err(|e| Error::MountFs(e.to_string()))?;

        let result = (|| {
            let mut sb_raw = [0u8; BLOCK_SIZE];
            self.dev
                .read_block(disk_id, 0, &mut sb_raw)
                .map_err(|e| Error::MountFs(e.to_string()))?;
            let sb = Superblock::parse(&sb_raw)
                .map_err(|_| Error::MountFs("bad superblock header".into()))?;

            self.validate_chain(disk_id, sb.inode_head, BlockKind::Inode)?;
            self.validate_chain(disk_id, sb.free_head, BlockKind::Free)?;

            Ok(Mounted {
                disk_id,
                table: vec![None; sb.max_open_files as usize],
            })
        })();

        match result {
            Ok(mounted) => {
                self.mounted = Some(mounted);
                Ok(disk_id)
            }
            Err(e) => {
                let _ = self.dev.close_disk(disk_id);
                Err(e)
            }
        }
    }

    fn validate_chain(&mut self, disk_id: u32, mut head: u32, kind: BlockKind) -> Result<()> {
        while head != 0 {
            let mut raw = [0u8; BLOCK_SIZE];
            self.dev
                .read_block(disk_id, head, &mut raw)
                .map_err(|e| Error::MountFs(e.to_string()))?;
            if raw[1] != crate::layout::MAGIC {
                return Err(Error::MountFs(format!("block {head} has a bad magic byte")));
            }
            let Some(found) = BlockKind::from_u8(raw[0]) else {
                return Err(Error::MountFs(format!("block {head} has an unknown kind tag")));
            };
            if found != kind {
                return Err(Error::MountFs(format!(
                    "block {head} has the wrong kind tag for its chain"
                )));
            }
            head = match kind {
                BlockKind::Inode => Inode::parse(&raw).unwrap().next_inode,
                BlockKind::Free => FreeBlock::parse(&raw).unwrap().next_free,
                _ => unreachable!("only inode and free chains are validated"),
            };
        }
        Ok(())
    }

    /// Unmounts the current volume, discarding the open-file table. Fails if nothing is
    /// mounted.
    pub fn unmount(&mut self) -> Result<()> {
        let Some(mounted) = self.mounted.take() else {
            return Err(Error::UnmountFs);
        };
        self.dev
            .close_disk(mounted.disk_id)
            .map_err(|_| Error::UnmountFs)
    }

    fn require_disk(&self) -> Result<u32> {
        self.mounted.as_ref().map(|m| m.disk_id).ok_or(Error::BadFd)
    }

    fn table_entry(&self, fd: Fd) -> Result<OpenFile> {
        self.mounted
            .as_ref()
            .ok_or(Error::BadFd)?
            .table
            .get(fd)
            .and_then(|slot| slot.as_ref())
            .copied()
            .ok_or(Error::BadFd)
    }

    fn table_entry_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.mounted
            .as_mut()
            .ok_or(Error::BadFd)?
            .table
            .get_mut(fd)
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::BadFd)
    }

    fn read_raw(&mut self, disk_id: u32, b: u32) -> Result<RawBlock> {
        let mut raw = [0u8; BLOCK_SIZE];
        self.dev
            .read_block(disk_id, b, &mut raw)
            .map_err(|e| Error::Read(io::Error::other(e.to_string())))?;
        Ok(raw)
    }

    fn write_raw(&mut self, disk_id: u32, b: u32, raw: &RawBlock) -> Result<()> {
        self.dev
            .write_block(disk_id, b, raw)
            .map_err(|e| Error::Write(io::Error::other(e.to_string())))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let mut p = temp_dir();
        p.push(format!("tinyfs-fs-test-{tag}-{}", std::process::id()));
        p
    }

    #[test]
    fn mkfs_rejects_tiny_volumes() {
        let mut fs = TinyFs::new();
        let path = temp_path("mkfs-tiny");
        assert!(matches!(
            fs.mkfs(path.to_str().unwrap(), 512),
            Err(Error::CreateFs(_))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn mkfs_rejects_zero_size() {
        let mut fs = TinyFs::new();
        let path = temp_path("mkfs-zero");
        assert!(matches!(
            fs.mkfs(path.to_str().unwrap(), 0),
            Err(Error::CreateFs(_))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn mount_twice_fails() {
        let path = temp_path("mount-twice");
        let mut fs = TinyFs::new();
        fs.mkfs(path.to_str().unwrap(), DEFAULT_DISK_SIZE).unwrap();
        fs.mount(path.to_str().unwrap()).unwrap();
        assert!(matches!(
            fs.mount(path.to_str().unwrap()),
            Err(Error::MountFs(_))
        ));
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unmount_without_mount_fails() {
        let mut fs = TinyFs::new();
        assert!(matches!(fs.unmount(), Err(Error::UnmountFs)));
    }

    #[test]
    fn fresh_volume_has_no_inodes_and_all_blocks_free() {
        let path = temp_path("fresh");
        let mut fs = TinyFs::new();
        fs.mkfs(path.to_str().unwrap(), DEFAULT_DISK_SIZE).unwrap();
        fs.mount(path.to_str().unwrap()).unwrap();
        assert_eq!(fs.readdir().unwrap().len(), 0);
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }
}
