//! A miniature single-volume flat-namespace file system that treats a regular host
//! file as an emulated block device.
//!
//! The crate is layered the way the on-disk format is layered: [`disk`] turns a host
//! file into addressable fixed-size blocks, [`layout`] turns blocks into typed
//! superblock/inode/free/data views, and [`fs`] drives the allocator and the
//! mount/open/read/write/seek/delete/rename operation set on top of those views.
//! [`error`] collects every failure the engine can report into one closed taxonomy.

pub mod cli_support;
pub mod disk;
pub mod error;
pub mod fs;
pub mod layout;
pub mod util;

pub use error::{Error, Result};
pub use fs::{FileInfo, TinyFs};
