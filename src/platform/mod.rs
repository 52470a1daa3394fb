//! Host capabilities consumed by config-drive discovery.
//!
//! The extractor never talks to devices directly: it goes through the
//! [`Platform`] trait, which enumerates disks and optical drives, opens raw
//! block devices and copies mounted volumes. [`LinuxPlatform`] is the real
//! implementation; tests provide in-memory fakes.

use anyhow::Result;
use std::io::{Read, Seek};
use std::path::Path;

mod linux;
pub use self::linux::LinuxPlatform;

/// Kind of media backing a block device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    /// Non-removable disk.
    Fixed,
    /// Removable media (USB sticks, floppies, optical discs).
    Removable,
    Unknown,
}

/// Geometry of a physical disk, as reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiskGeometry {
    pub media_type: MediaType,
    pub cylinders: u64,
    pub tracks_per_cylinder: u32,
    pub sectors_per_track: u32,
    pub bytes_per_sector: u32,
}

impl DiskGeometry {
    /// Total addressable size of the disk, in bytes.
    pub fn total_disk_bytes(&self) -> u64 {
        self.cylinders
            .saturating_mul(u64::from(self.tracks_per_cylinder))
            .saturating_mul(u64::from(self.sectors_per_track))
            .saturating_mul(u64::from(self.bytes_per_sector))
    }
}

/// An open raw block device.
///
/// The device is released when the handle is dropped.
pub trait PhysicalDisk: Read + Seek {
    fn geometry(&self) -> Result<DiskGeometry>;
}

/// OS services used to locate a config drive.
pub trait Platform {
    type Disk: PhysicalDisk;

    /// Device paths of all physical disks, in enumeration order.
    fn physical_disks(&self) -> Result<Vec<String>>;

    fn open_physical_disk(&self, path: &str) -> Result<Self::Disk>;

    /// Identifiers of all optical (CD-ROM class) drives.
    fn optical_drives(&self) -> Result<Vec<String>>;

    /// Volume label of an optical drive, if it carries one.
    fn volume_label(&self, drive: &str) -> Result<Option<String>>;

    /// Recursively copy the whole content of an optical drive into `target`.
    fn copy_drive_tree(&self, drive: &str, target: &Path) -> Result<()>;
}
