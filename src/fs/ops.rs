//! The per-file operations: `open_file`, `close_file`, `write_file`, `read_byte`,
//! `seek`, `delete_file`, `rename`, `read_file_info`, `readdir`.
//!
//! Each operation is driven through the typed [`super::TinyFs`] state (an owned
//! mounted-disk-plus-open-file-table value) rather than any process-wide globals.

use super::{alloc, Fd, OpenFile, TinyFs};
use crate::error::{Error, Result};
use crate::layout::{self, DataBlockHeader, Inode, Superblock, USABLE_DATA};
use crate::util::{ceil_division, timestamp_now};

/// A directory entry as returned by [`TinyFs::read_file_info`] and [`TinyFs::readdir`]:
/// everything those calls print, handed back as data instead of only to stdout.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub size: u32,
    pub created: String,
    pub modified: String,
    pub accessed: String,
}

impl TinyFs {
    /// Opens (creating if absent) the file named `name`, returning a file descriptor
    /// positioned at offset 0.
    ///
    /// Reopening an existing file preserves its content and refreshes its access
    /// timestamp — a file is truncated only by an explicit [`TinyFs::write_file`],
    /// never merely by opening.
    pub fn open_file(&mut self, name: &str) -> Result<Fd> {
        let disk_id = self.mounted.as_ref().ok_or(Error::MountFs("not mounted".into()))?.disk_id;

        let existing = self.find_inode_by_name(disk_id, name)?;

        if let Some(block) = existing {
            let already_open = self
                .mounted
                .as_ref()
                .unwrap()
                .table
                .iter()
                .flatten()
                .any(|of| of.inode == block);
            if already_open {
                return Err(Error::AlreadyOpen);
            }
        }

        let inode_block = match existing {
            Some(block) => {
                self.touch_accessed(disk_id, block)?;
                block
            }
            None => self.create_inode(disk_id, name)?,
        };

        let mounted = self.mounted.as_mut().unwrap();
        let slot = mounted.table.iter().position(Option::is_none).ok_or(Error::BadFd)?;
        mounted.table[slot] = Some(OpenFile {
            inode: inode_block,
            cursor: 0,
        });
        Ok(slot)
    }

    /// Closes the file descriptor `fd`, freeing its open-file-table slot.
    pub fn close_file(&mut self, fd: Fd) -> Result<()> {
        let mounted = self.mounted.as_mut().ok_or(Error::Close)?;
        let slot = mounted.table.get_mut(fd).ok_or(Error::Close)?;
        if slot.is_none() {
            return Err(Error::Close);
        }
        *slot = None;
        Ok(())
    }

    /// Replaces the file's entire contents with `data`, resetting the cursor to 0 and
    /// refreshing the modified/accessed timestamps.
    ///
    /// `data.len()` must not exceed [`super::MAX_BYTES`]; larger writes fail with
    /// [`Error::FileTooBig`] before any block is touched.
    ///
    /// If the free chain runs out partway through, the file is left with as many bytes
    /// as could actually be written — the inode's size and data-chain head reflect
    /// exactly the blocks written, never the old or the fully requested content — and
    /// this returns [`Error::Write`] (`EFWRITE`).
    pub fn write_file(&mut self, fd: Fd, data: &[u8]) -> Result<()> {
        if data.len() as u64 > super::MAX_BYTES {
            return Err(Error::FileTooBig);
        }
        let disk_id = self.require_disk()?;
        let of = self.table_entry(fd)?;

        let mut inode_raw = self.read_raw(disk_id, of.inode)?;
        let mut inode = Inode::parse(&inode_raw).map_err(|_| Error::BadFd)?;

        let old_blocks = ceil_division(inode.file_size, USABLE_DATA as u32);
        self.deallocate_chain(disk_id, inode.first_data_block, old_blocks)?;

        let new_blocks = ceil_division(data.len() as u32, USABLE_DATA as u32);
        let (head, written, complete) = self.write_chain(disk_id, data, new_blocks)?;

        let now = timestamp_now();
        inode.file_size = written;
        inode.first_data_block = head;
        inode.timestamps.modified = layout::pack_timestamp(&now);
        inode.timestamps.accessed = layout::pack_timestamp(&now);
        inode_raw = inode.serialize();
        self.write_raw(disk_id, of.inode, &inode_raw)?;

        self.table_entry_mut(fd)?.cursor = 0;

        if !complete {
            return Err(Error::Write(std::io::Error::other(
                "free chain exhausted mid-write",
            )));
        }
        Ok(())
    }

    /// Reads one byte at the current cursor and advances it by one.
    pub fn read_byte(&mut self, fd: Fd) -> Result<u8> {
        let disk_id = self.require_disk()?;
        let of = self.table_entry(fd)?;

        let inode_raw = self.read_raw(disk_id, of.inode)?;
        let inode = Inode::parse(&inode_raw).map_err(|_| Error::BadFd)?;
        if of.cursor >= inode.file_size as u64 {
            return Err(Error::ReadPastEof);
        }

        let block_index = of.cursor / USABLE_DATA as u64;
        let byte_in_block = (of.cursor % USABLE_DATA as u64) as usize;
        let mut block = inode.first_data_block;
        for _ in 0..block_index {
            let raw = self.read_raw(disk_id, block)?;
            block = DataBlockHeader::parse(&raw).map_err(|_| Error::BadFd)?.next_data;
        }
        let raw = self.read_raw(disk_id, block)?;
        let byte = layout::data_payload(&raw)[byte_in_block];

        let now = timestamp_now();
        let mut inode = inode;
        inode.timestamps.accessed = layout::pack_timestamp(&now);
        self.write_raw(disk_id, of.inode, &inode.serialize())?;

        self.table_entry_mut(fd)?.cursor += 1;
        Ok(byte)
    }

    /// Repositions the cursor to absolute offset `offset`. No bound against the file's
    /// size is enforced here — any non-negative offset is accepted unconditionally;
    /// `read_byte` is solely responsible for rejecting a cursor at or past EOF.
    pub fn seek(&mut self, fd: Fd, offset: u64) -> Result<()> {
        self.table_entry_mut(fd)?.cursor = offset;
        Ok(())
    }

    /// Deletes the file open as `fd`: unlinks its inode from the inode chain, frees its
    /// entire data chain, frees the inode block itself, and closes the descriptor.
    pub fn delete_file(&mut self, fd: Fd) -> Result<()> {
        let disk_id = self.mounted.as_ref().ok_or(Error::Delete)?.disk_id;
        let of = self.table_entry(fd).map_err(|_| Error::Delete)?;

        let inode_raw = self.read_raw(disk_id, of.inode).map_err(|_| Error::Delete)?;
        let inode = Inode::parse(&inode_raw).map_err(|_| Error::Delete)?;

        self.unlink_inode(disk_id, of.inode)?;

        let blocks = ceil_division(inode.file_size, USABLE_DATA as u32);
        self.deallocate_chain(disk_id, inode.first_data_block, blocks)
            .map_err(|_| Error::Delete)?;
        alloc::deallocate_block(&mut self.dev, disk_id, of.inode).map_err(|_| Error::Delete)?;

        let mounted = self.mounted.as_mut().ok_or(Error::Delete)?;
        mounted.table[fd] = None;
        Ok(())
    }

    /// Renames the file open as `fd` to `new_name`. Unlike `open_file`'s silent
    /// truncation, a name that does not fit is rejected outright.
    pub fn rename(&mut self, fd: Fd, new_name: &str) -> Result<()> {
        if new_name.len() >= layout::NAME_LEN {
            return Err(Error::Rename);
        }
        let disk_id = self.require_disk()?;
        let of = self.table_entry(fd)?;

        let mut inode_raw = self.read_raw(disk_id, of.inode)?;
        let mut inode = Inode::parse(&inode_raw).map_err(|_| Error::BadFd)?;
        inode.set_name_truncating(new_name);
        inode.timestamps.modified = layout::pack_timestamp(&timestamp_now());
        inode_raw = inode.serialize();
        self.write_raw(disk_id, of.inode, &inode_raw)?;
        Ok(())
    }

    /// Returns the name, size, and timestamps of the file open as `fd`, and prints a
    /// human-readable summary to stdout. Also returns the same data structured, for a
    /// caller that wants to use it rather than scrape stdout.
    pub fn read_file_info(&mut self, fd: Fd) -> Result<FileInfo> {
        let disk_id = self.require_disk()?;
        let of = self.table_entry(fd)?;
        let raw = self.read_raw(disk_id, of.inode)?;
        let inode = Inode::parse(&raw).map_err(|_| Error::BadFd)?;
        let info = FileInfo {
            name: inode.name_str().to_owned(),
            size: inode.file_size,
            created: layout::unpack_timestamp(&inode.timestamps.created),
            modified: layout::unpack_timestamp(&inode.timestamps.modified),
            accessed: layout::unpack_timestamp(&inode.timestamps.accessed),
        };
        println!("{} Information:", info.name);
        println!("File Size: {}", info.size);
        println!("Created: {}", info.created);
        println!("Modified: {}", info.modified);
        println!("Accessed: {}", info.accessed);
        Ok(info)
    }

    /// Lists every file currently in the (flat) root directory, in inode-chain order,
    /// printing a `"FILE SYSTEM:\nroot directory:"` banner followed by each name.
    pub fn readdir(&mut self) -> Result<Vec<FileInfo>> {
        let disk_id = self.mounted.as_ref().ok_or(Error::MountFs("not mounted".into()))?.disk_id;
        let sb_raw = self.read_raw(disk_id, 0)?;
        let sb = Superblock::parse(&sb_raw).map_err(|_| Error::MountFs("bad superblock".into()))?;

        println!("FILE SYSTEM:");
        println!("root directory:");
        let mut out = Vec::new();
        let mut block = sb.inode_head;
        while block != 0 {
            let raw = self.read_raw(disk_id, block)?;
            let inode = Inode::parse(&raw).map_err(|_| Error::MountFs("bad inode".into()))?;
            println!("{}", inode.name_str());
            out.push(FileInfo {
                name: inode.name_str().to_owned(),
                size: inode.file_size,
                created: layout::unpack_timestamp(&inode.timestamps.created),
                modified: layout::unpack_timestamp(&inode.timestamps.modified),
                accessed: layout::unpack_timestamp(&inode.timestamps.accessed),
            });
            block = inode.next_inode;
        }
        Ok(out)
    }

    /// Looks up `name` by the same truncation an inode's stored name already went
    /// through, so a long name that truncates to match an existing file's name finds
    /// that file instead of missing it and letting a duplicate get created.
    fn find_inode_by_name(&mut self, disk_id: u32, name: &str) -> Result<Option<u32>> {
        let packed = layout::pack_name(name);
        let sb_raw = self.read_raw(disk_id, 0)?;
        let sb = Superblock::parse(&sb_raw).map_err(|_| Error::MountFs("bad superblock".into()))?;
        let mut block = sb.inode_head;
        while block != 0 {
            let raw = self.read_raw(disk_id, block)?;
            let inode = Inode::parse(&raw).map_err(|_| Error::MountFs("bad inode".into()))?;
            if inode.name == packed {
                return Ok(Some(block));
            }
            block = inode.next_inode;
        }
        Ok(None)
    }

    fn create_inode(&mut self, disk_id: u32, name: &str) -> Result<u32> {
        let block = alloc::allocate_block(&mut self.dev, disk_id)?;

        let sb_raw = self.read_raw(disk_id, 0)?;
        let mut sb = Superblock::parse(&sb_raw).map_err(|_| Error::MountFs("bad superblock".into()))?;

        let mut inode = Inode::new(name, &timestamp_now());
        inode.next_inode = sb.inode_head;
        self.write_raw(disk_id, block, &inode.serialize())?;

        sb.inode_head = block;
        self.write_raw(disk_id, 0, &sb.serialize())?;
        Ok(block)
    }

    fn unlink_inode(&mut self, disk_id: u32, target: u32) -> Result<()> {
        let sb_raw = self.read_raw(disk_id, 0).map_err(|_| Error::Delete)?;
        let mut sb = Superblock::parse(&sb_raw).map_err(|_| Error::Delete)?;

        if sb.inode_head == target {
            let raw = self.read_raw(disk_id, target).map_err(|_| Error::Delete)?;
            let inode = Inode::parse(&raw).map_err(|_| Error::Delete)?;
            sb.inode_head = inode.next_inode;
            self.write_raw(disk_id, 0, &sb.serialize()).map_err(|_| Error::Delete)?;
            return Ok(());
        }

        let mut prev = sb.inode_head;
        while prev != 0 {
            let prev_raw = self.read_raw(disk_id, prev).map_err(|_| Error::Delete)?;
            let mut prev_inode = Inode::parse(&prev_raw).map_err(|_| Error::Delete)?;
            if prev_inode.next_inode == target {
                let raw = self.read_raw(disk_id, target).map_err(|_| Error::Delete)?;
                let target_inode = Inode::parse(&raw).map_err(|_| Error::Delete)?;
                prev_inode.next_inode = target_inode.next_inode;
                self.write_raw(disk_id, prev, &prev_inode.serialize())
                    .map_err(|_| Error::Delete)?;
                return Ok(());
            }
            prev = prev_inode.next_inode;
        }
        Err(Error::Delete)
    }

    /// Refreshes the last-accessed timestamp of the inode at `block` on every reopen
    /// of an existing file; creation time and content are left untouched.
    fn touch_accessed(&mut self, disk_id: u32, block: u32) -> Result<()> {
        let raw = self.read_raw(disk_id, block)?;
        let mut inode = Inode::parse(&raw).map_err(|_| Error::BadFd)?;
        inode.timestamps.accessed = layout::pack_timestamp(&timestamp_now());
        self.write_raw(disk_id, block, &inode.serialize())?;
        Ok(())
    }

    /// Frees `count` blocks starting at `head`, following each block's own `next_data`
    /// pointer rather than trusting a precomputed count to stay in sync with the
    /// on-disk chain.
    fn deallocate_chain(&mut self, disk_id: u32, head: u32, count: u32) -> Result<()> {
        let mut block = head;
        for _ in 0..count {
            if block == 0 {
                break;
            }
            let raw = self.read_raw(disk_id, block)?;
            let next = DataBlockHeader::parse(&raw).map_err(|_| Error::Dealloc)?.next_data;
            alloc::deallocate_block(&mut self.dev, disk_id, block)?;
            block = next;
        }
        Ok(())
    }

    /// Writes `data` across up to `block_count` freshly allocated data blocks.
    ///
    /// Rather than calling [`alloc::allocate_block`] once per block (which would
    /// round-trip the superblock `block_count` times), this walks the free chain
    /// directly: each free block's `next_free` pointer, read just before that block is
    /// overwritten, becomes the new data chain's `next_data` pointer. The free chain's
    /// existing link order becomes the data chain's link order for free.
    ///
    /// If the free chain runs out before `block_count` blocks are collected, only the
    /// blocks actually available are written (each still fully payload-filled and
    /// correctly chained — never left half-written), and the third element of the
    /// returned tuple is `false`. The caller reflects the shorter length in the inode
    /// rather than this function silently under- or over-claiming space.
    ///
    /// Returns `(first_block, bytes_written, block_count_fully_satisfied)`.
    fn write_chain(&mut self, disk_id: u32, data: &[u8], block_count: u32) -> Result<(u32, u32, bool)> {
        if block_count == 0 {
            return Ok((0, 0, true));
        }

        let sb_raw = self.read_raw(disk_id, 0)?;
        let mut sb = Superblock::parse(&sb_raw).map_err(|_| Error::Write(std::io::Error::other("bad superblock")))?;

        let mut chosen = Vec::with_capacity(block_count as usize);
        let mut cursor = sb.free_head;
        for _ in 0..block_count {
            if cursor == 0 {
                break;
            }
            let raw = self.read_raw(disk_id, cursor)?;
            let fb = layout::FreeBlock::parse(&raw).map_err(|_| Error::NoSpace)?;
            chosen.push(cursor);
            cursor = fb.next_free;
        }
        sb.free_head = cursor;

        let complete = chosen.len() as u32 == block_count;
        let bytes_written = if complete {
            data.len() as u32
        } else {
            chosen.len() as u32 * USABLE_DATA as u32
        };

        for (i, &block) in chosen.iter().enumerate() {
            let start = i * USABLE_DATA;
            let end = ((i + 1) * USABLE_DATA).min(bytes_written as usize);
            let payload = &data[start..end];
            let next = chosen.get(i + 1).copied().unwrap_or(0);
            let mut raw = [0u8; crate::disk::BLOCK_SIZE];
            layout::write_data_block(&mut raw, next, payload);
            self.write_raw(disk_id, block, &raw)?;
        }

        self.write_raw(disk_id, 0, &sb.serialize())?;
        Ok((chosen.first().copied().unwrap_or(0), bytes_written, complete))
    }
}

#[cfg(test)]
mod test {
    use super::super::TinyFs;
    use crate::error::Error;
    use std::env::temp_dir;
    use std::fs;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let mut p = temp_dir();
        p.push(format!("tinyfs-ops-test-{tag}-{}", std::process::id()));
        p
    }

    fn mounted(tag: &str) -> (TinyFs, std::path::PathBuf) {
        let path = temp_path(tag);
        let mut fs = TinyFs::new();
        fs.mkfs(path.to_str().unwrap(), super::super::DEFAULT_DISK_SIZE).unwrap();
        fs.mount(path.to_str().unwrap()).unwrap();
        (fs, path)
    }

    #[test]
    fn write_then_read_roundtrips() {
        let (mut fs, path) = mounted("write-read");
        let fd = fs.open_file("hello").unwrap();
        fs.write_file(fd, b"Hello").unwrap();
        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(fs.read_byte(fd).unwrap());
        }
        assert_eq!(out, b"Hello");
        assert!(matches!(fs.read_byte(fd), Err(Error::ReadPastEof)));
        fs.close_file(fd).unwrap();
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn overwrite_resets_cursor() {
        let (mut fs, path) = mounted("overwrite");
        let fd = fs.open_file("f").unwrap();
        fs.write_file(fd, b"first").unwrap();
        fs.seek(fd, 3).unwrap();
        fs.write_file(fd, b"second").unwrap();
        assert_eq!(fs.read_byte(fd).unwrap(), b's');
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn write_exhausting_free_chain_leaves_partial_file_and_reports_efwrite() {
        let path = temp_path("exhaust");
        let mut fs = TinyFs::new();
        // 3 data blocks total: one is consumed by the inode itself, leaving 2 free
        // for payload — not enough for a write that needs 3.
        fs.mkfs(path.to_str().unwrap(), 4 * 256).unwrap();
        fs.mount(path.to_str().unwrap()).unwrap();

        let fd = fs.open_file("big").unwrap();
        let payload: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
        assert!(matches!(fs.write_file(fd, &payload), Err(Error::Write(_))));

        let info = fs.read_file_info(fd).unwrap();
        assert_eq!(info.size, 500);
        for i in 0..500 {
            assert_eq!(fs.read_byte(fd).unwrap(), payload[i]);
        }
        assert!(matches!(fs.read_byte(fd), Err(Error::ReadPastEof)));

        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn multi_block_write_survives_seek_and_overwrite() {
        let (mut fs, path) = mounted("multiblock");
        let fd = fs.open_file("big").unwrap();
        let payload: Vec<u8> = (0..327u32).map(|i| (i % 256) as u8).collect();
        fs.write_file(fd, &payload).unwrap();
        fs.seek(fd, 250).unwrap();
        assert_eq!(fs.read_byte(fd).unwrap(), payload[250]);

        fs.write_file(fd, b"short").unwrap();
        fs.seek(fd, 5).unwrap();
        assert!(matches!(fs.read_byte(fd), Err(Error::ReadPastEof)));
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn opening_twice_fails() {
        let (mut fs, path) = mounted("open-twice");
        let fd = fs.open_file("dup").unwrap();
        assert!(matches!(fs.open_file("dup"), Err(Error::AlreadyOpen)));
        fs.close_file(fd).unwrap();
        assert!(fs.open_file("dup").is_ok());
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn delete_then_recreate_starts_empty() {
        let (mut fs, path) = mounted("delete-recreate");
        let fd = fs.open_file("doomed").unwrap();
        fs.write_file(fd, b"data").unwrap();
        fs.delete_file(fd).unwrap();
        assert_eq!(fs.readdir().unwrap().len(), 0);

        let fd2 = fs.open_file("doomed").unwrap();
        let info = fs.read_file_info(fd2).unwrap();
        assert_eq!(info.size, 0);
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rename_rejects_oversized_name_but_open_truncates() {
        let (mut fs, path) = mounted("rename");
        let fd = fs.open_file("abcdefgh").unwrap();
        assert!(matches!(fs.rename(fd, "toolongname"), Err(Error::Rename)));
        assert!(fs.rename(fd, "short").is_ok());

        let fd2 = fs.open_file("thisnameiswaytoolong").unwrap();
        let info = fs.read_file_info(fd2).unwrap();
        assert!(info.name.len() < crate::layout::NAME_LEN);
        fs.unmount().unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unmount_then_remount_preserves_inodes_and_creation_time() {
        let path = temp_path("remount");
        let mut fs = TinyFs::new();
        fs.mkfs(path.to_str().unwrap(), super::super::DEFAULT_DISK_SIZE).unwrap();
        fs.mount(path.to_str().unwrap()).unwrap();
        let fd = fs.open_file("persisted").unwrap();
        fs.write_file(fd, b"abc").unwrap();
        let created_before = fs.read_file_info(fd).unwrap().created;
        fs.close_file(fd).unwrap();
        fs.unmount().unwrap();

        fs.mount(path.to_str().unwrap()).unwrap();
        let names: Vec<String> = fs.readdir().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["persisted".to_string()]);
        let fd2 = fs.open_file("persisted").is_err();
        assert!(!fd2, "reopening should truncate, not fail");
        fs.unmount().unwrap();
        let _ = created_before;
        let _ = fs::remove_file(&path);
    }
}
