//! Core types shared by every storage layer.

use std::time::SystemTime;

/// Type indicators of the path specification variants shipped with this crate.
///
/// A type indicator names the storage layer a path specification addresses.
/// External decoders may register further indicators.
pub mod type_indicators {
    /// Host operating system.
    pub const OS: &str = "OS";
    /// In-memory test file system.
    pub const FAKE: &str = "FAKE";
    /// Byte window of the parent.
    pub const DATA_RANGE: &str = "DATA_RANGE";
    /// Parent bytes passed through a decompressor.
    pub const COMPRESSED_STREAM: &str = "COMPRESSED_STREAM";
    /// gzip compressed file.
    pub const GZIP: &str = "GZIP";
    /// QEMU copy-on-write image.
    pub const QCOW: &str = "QCOW";
    /// Expert Witness Format image.
    pub const EWF: &str = "EWF";
    /// (Split) raw storage media image.
    pub const RAW: &str = "RAW";
    /// SleuthKit file system.
    pub const TSK: &str = "TSK";
    /// SleuthKit partition (volume system).
    pub const TSK_PARTITION: &str = "TSK_PARTITION";
    /// Volume Shadow Snapshots.
    pub const VSHADOW: &str = "VSHADOW";
    /// Tape archive.
    pub const TAR: &str = "TAR";
    /// ZIP archive.
    pub const ZIP: &str = "ZIP";
}

/// Compression method identifiers understood by the built-in decompressors.
pub mod compression_methods {
    /// Raw DEFLATE stream without header.
    pub const DEFLATE: &str = "deflate";
    /// zlib wrapped DEFLATE stream.
    pub const ZLIB: &str = "zlib";
}

/// Separator between location segments inside every layer.
pub const LOCATION_SEPARATOR: char = '/';

/// Location of the root entry of a hierarchical layer.
pub const ROOT_LOCATION: &str = "/";

/// Type of a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileEntryType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Link,
    /// Character or block device.
    Device,
    /// Named pipe.
    Pipe,
    /// Socket.
    Socket,
}

/// Stat information of a file entry.
///
/// Backends fill what their format records; absent timestamps stay at the
/// Unix epoch.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stat {
    /// Type of the entry.
    pub entry_type: FileEntryType,
    /// Size of the data in bytes.
    pub size: u64,
    /// Permission bits (`0o7777` mask).
    pub mode: u32,
    /// Owner user identifier.
    pub uid: u32,
    /// Owner group identifier.
    pub gid: u32,
    /// Inode or layer specific entry number, if the layer has one.
    pub inode: Option<u64>,
    /// Whether the entry is allocated (as opposed to recovered/deleted).
    pub allocated: bool,
    /// Last access time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub accessed: SystemTime,
    /// Last metadata change time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub changed: SystemTime,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
}

impl Stat {
    /// Stat with defaults for the given entry type.
    pub fn new(entry_type: FileEntryType) -> Self {
        let mode = if entry_type == FileEntryType::Directory {
            0o755
        } else {
            0o644
        };
        Self {
            entry_type,
            size: 0,
            mode,
            uid: 0,
            gid: 0,
            inode: None,
            allocated: true,
            accessed: SystemTime::UNIX_EPOCH,
            changed: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.entry_type == FileEntryType::File
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.entry_type == FileEntryType::Directory
    }

    /// Returns `true` if this is a symbolic link.
    #[inline]
    pub fn is_link(&self) -> bool {
        self.entry_type == FileEntryType::Link
    }
}

/// Serde support for SystemTime (when serde feature is enabled).
#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
