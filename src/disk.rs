//! The block device layer: translates `(disk-id, block-index)` pairs into byte-offset
//! I/O against a backing host file.
//!
//! This is the only layer that ever calls into [`std::fs::File`]. Every layer above it
//! addresses storage purely through disk numbers and block indices, never through a
//! path or a raw byte offset.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Size in bytes of every block on every TinyFS volume.
pub const BLOCK_SIZE: usize = 256;

/// A block-sized buffer, the unit every read/write transfers.
pub type RawBlock = [u8; BLOCK_SIZE];

/// Failures local to the block device layer, before a caller has enough context to
/// pick the most specific file-system-level error kind.
#[derive(Debug)]
pub enum DiskError {
    /// No disk is registered under the given number.
    NotOpen,
    /// `open_disk` was asked to create a volume smaller than one block.
    TooSmall,
    /// The block index is out of range for the addressed disk, or negative.
    OutOfRange,
    /// An existing backing file's length is not a positive multiple of `BLOCK_SIZE`.
    Misaligned,
    /// The host file system refused the operation.
    Io(io::Error),
}

impl From<io::Error> for DiskError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for DiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "no such open disk"),
            Self::TooSmall => write!(f, "disk size must be at least one block"),
            Self::OutOfRange => write!(f, "block index out of range"),
            Self::Misaligned => write!(f, "backing file length is not block-aligned"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

/// An open emulated disk: a backing host file plus the metadata needed to bounds-check
/// accesses to it.
struct OpenDisk {
    file: File,
    byte_size: u64,
    name: String,
}

/// The registry of currently open emulated disks.
///
/// Disk numbers are assigned monotonically starting at 1 and are never reused for the
/// lifetime of the registry.
pub struct BlockDevice {
    disks: HashMap<u32, OpenDisk>,
    next_id: u32,
    verbose: bool,
}

impl Default for BlockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            disks: HashMap::new(),
            next_id: 1,
            verbose: false,
        }
    }

    /// Enables diagnostic output on I/O failures, the way the CLI front-end wants but
    /// a library caller (e.g. a test) does not.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn log(&self, args: std::fmt::Arguments) {
        if self.verbose {
            eprintln!("tinyfs: disk: {args}");
        }
    }

    /// Opens an emulated disk backed by the host file `name`.
    ///
    /// If `n_bytes == 0`, opens an existing backing file for read/write; fails if it
    /// is absent or its length is not a positive multiple of [`BLOCK_SIZE`]. Otherwise
    /// creates (or truncates) the file, rounds `n_bytes` down to a multiple of
    /// `BLOCK_SIZE` (failing if that rounds to less than one block), and zero-fills it.
    pub fn open_disk(&mut self, name: &str, n_bytes: u64) -> Result<u32, DiskError> {
        let (file, byte_size) = if n_bytes == 0 {
            let file = OpenOptions::new().read(true).write(true).open(name)?;
            let len = file.metadata()?.len();
            if len == 0 || len % BLOCK_SIZE as u64 != 0 {
                return Err(DiskError::Misaligned);
            }
            (file, len)
        } else {
            let aligned = (n_bytes / BLOCK_SIZE as u64) * BLOCK_SIZE as u64;
            if aligned < BLOCK_SIZE as u64 {
                return Err(DiskError::TooSmall);
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(name)?;
            let zeroes = vec![0u8; BLOCK_SIZE];
            for _ in 0..(aligned / BLOCK_SIZE as u64) {
                file.write_all(&zeroes)?;
            }
            file.flush()?;
            (file, aligned)
        };

        let id = self.next_id;
        self.next_id += 1;
        self.log(format_args!("opened `{name}` as disk {id} ({byte_size} bytes)"));
        self.disks.insert(
            id,
            OpenDisk {
                file,
                byte_size,
                name: name.to_owned(),
            },
        );
        Ok(id)
    }

    /// Closes the disk `id`, releasing its backing file handle. A second close of the
    /// same disk number fails: idempotence is not guaranteed.
    pub fn close_disk(&mut self, id: u32) -> Result<(), DiskError> {
        match self.disks.remove(&id) {
            Some(disk) => {
                self.log(format_args!("closed disk {id} (`{}`)", disk.name));
                Ok(())
            }
            None => Err(DiskError::NotOpen),
        }
    }

    /// Returns the byte size of the backing file for `id`.
    pub fn disk_byte_size(&self, id: u32) -> Result<u64, DiskError> {
        self.disks.get(&id).map(|d| d.byte_size).ok_or(DiskError::NotOpen)
    }

    fn block_offset(&self, id: u32, b: u32) -> Result<u64, DiskError> {
        let disk = self.disks.get(&id).ok_or(DiskError::NotOpen)?;
        let offset = (b as u64) * BLOCK_SIZE as u64;
        if offset + BLOCK_SIZE as u64 > disk.byte_size {
            return Err(DiskError::OutOfRange);
        }
        Ok(offset)
    }

    /// Reads the block at index `b` of disk `id` into `buf`.
    pub fn read_block(&mut self, id: u32, b: u32, buf: &mut RawBlock) -> Result<(), DiskError> {
        let offset = self.block_offset(id, b)?;
        let disk = self.disks.get_mut(&id).ok_or(DiskError::NotOpen)?;
        disk.file.seek(SeekFrom::Start(offset))?;
        disk.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes `buf` to the block at index `b` of disk `id`.
    pub fn write_block(&mut self, id: u32, b: u32, buf: &RawBlock) -> Result<(), DiskError> {
        let offset = self.block_offset(id, b)?;
        let disk = self.disks.get_mut(&id).ok_or(DiskError::NotOpen)?;
        disk.file.seek(SeekFrom::Start(offset))?;
        disk.file.write_all(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let mut p = temp_dir();
        p.push(format!("tinyfs-disk-test-{tag}-{}", std::process::id()));
        p
    }

    #[test]
    fn create_rounds_down_and_zero_fills() {
        let path = temp_path("create");
        let mut dev = BlockDevice::new();
        let id = dev.open_disk(path.to_str().unwrap(), 1000).unwrap();
        assert_eq!(dev.disk_byte_size(id).unwrap(), 768); // 3 blocks of 256
        let mut buf = [0xffu8; BLOCK_SIZE];
        dev.read_block(id, 2, &mut buf).unwrap();
        assert_eq!(buf, [0u8; BLOCK_SIZE]);
        dev.close_disk(id).unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn too_small_is_rejected() {
        let path = temp_path("small");
        let mut dev = BlockDevice::new();
        assert!(matches!(
            dev.open_disk(path.to_str().unwrap(), 100),
            Err(DiskError::TooSmall)
        ));
    }

    #[test]
    fn reopen_existing_preserves_content() {
        let path = temp_path("reopen");
        let mut dev = BlockDevice::new();
        let id = dev.open_disk(path.to_str().unwrap(), 512).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0] = 42;
        dev.write_block(id, 1, &buf).unwrap();
        dev.close_disk(id).unwrap();

        let id2 = dev.open_disk(path.to_str().unwrap(), 0).unwrap();
        let mut readback = [0u8; BLOCK_SIZE];
        dev.read_block(id2, 1, &mut readback).unwrap();
        assert_eq!(readback[0], 42);
        dev.close_disk(id2).unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn out_of_range_block_fails() {
        let path = temp_path("oob");
        let mut dev = BlockDevice::new();
        let id = dev.open_disk(path.to_str().unwrap(), 512).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(matches!(
            dev.read_block(id, 2, &mut buf),
            Err(DiskError::OutOfRange)
        ));
        dev.close_disk(id).unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn double_close_fails() {
        let path = temp_path("doubleclose");
        let mut dev = BlockDevice::new();
        let id = dev.open_disk(path.to_str().unwrap(), 512).unwrap();
        dev.close_disk(id).unwrap();
        assert!(matches!(dev.close_disk(id), Err(DiskError::NotOpen)));
        let _ = fs::remove_file(&path);
    }
}
