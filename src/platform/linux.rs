//! Linux implementation of host capabilities, backed by sysfs and `/dev`.

use anyhow::{anyhow, Context, Result};
use slog_scope::{debug, trace, warn};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{DiskGeometry, MediaType, PhysicalDisk, Platform};
use crate::util;

/// sysfs always reports device sizes in 512-byte units.
const SYSFS_SECTOR_SIZE: u64 = 512;

/// Kernel block devices that are never physical disks.
const VIRTUAL_DEVICE_PREFIXES: [&str; 6] = ["loop", "ram", "zram", "sr", "dm-", "md"];

/// Filesystem type of config-drive volumes.
const OPTICAL_FS: &str = "iso9660";

#[derive(Clone, Debug)]
pub struct LinuxPlatform {
    sys_block: PathBuf,
    dev_dir: PathBuf,
    mount_retries: u8,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::with_roots("/sys/block", "/dev")
    }
}

impl LinuxPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a platform rooted at custom sysfs and device directories.
    pub fn with_roots(sys_block: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        LinuxPlatform {
            sys_block: sys_block.into(),
            dev_dir: dev_dir.into(),
            mount_retries: 3,
        }
    }

    /// Kernel names of all block devices, sorted for a stable scan order.
    fn block_devices(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.sys_block)
            .with_context(|| format!("failed to list '{}'", self.sys_block.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_sysfs_value(&self, name: &str, attr: &str) -> Result<u64> {
        let path = self.sys_block.join(name).join(attr);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        content
            .trim()
            .parse()
            .with_context(|| format!("invalid value in '{}': {:?}", path.display(), content))
    }

    fn geometry_for(&self, name: &str) -> Result<DiskGeometry> {
        let media_type = match self.read_sysfs_value(name, "removable")? {
            0 => MediaType::Fixed,
            1 => MediaType::Removable,
            _ => MediaType::Unknown,
        };
        let size_bytes = self
            .read_sysfs_value(name, "size")?
            .saturating_mul(SYSFS_SECTOR_SIZE);
        let bytes_per_sector = match self.read_sysfs_value(name, "queue/logical_block_size") {
            Ok(v) => u32::try_from(v).context("logical block size out of range")?,
            Err(e) => {
                debug!("falling back to 512-byte sectors for '{}': {:#}", name, e);
                SYSFS_SECTOR_SIZE as u32
            }
        };
        if bytes_per_sector == 0 {
            return Err(anyhow!("device '{}' reports a zero sector size", name));
        }

        // Linux has no meaningful CHS geometry; collapse it to a linear one.
        Ok(DiskGeometry {
            media_type,
            cylinders: size_bytes / u64::from(bytes_per_sector),
            tracks_per_cylinder: 1,
            sectors_per_track: 1,
            bytes_per_sector,
        })
    }

    fn kernel_name(path: &str) -> Result<&str> {
        Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid device path '{}'", path))
    }
}

impl Platform for LinuxPlatform {
    type Disk = LinuxDisk;

    fn physical_disks(&self) -> Result<Vec<String>> {
        let mut disks = Vec::new();
        for name in self.block_devices()? {
            if VIRTUAL_DEVICE_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
            {
                trace!("skipping virtual block device '{}'", name);
                continue;
            }
            disks.push(self.dev_dir.join(&name).to_string_lossy().into_owned());
        }
        debug!("physical disks - {:?}", disks);
        Ok(disks)
    }

    fn open_physical_disk(&self, path: &str) -> Result<LinuxDisk> {
        let name = Self::kernel_name(path)?;
        let geometry = self.geometry_for(name)?;
        let file =
            File::open(path).with_context(|| format!("failed to open disk '{}'", path))?;
        Ok(LinuxDisk { file, geometry })
    }

    fn optical_drives(&self) -> Result<Vec<String>> {
        let drives: Vec<String> = self
            .block_devices()?
            .into_iter()
            .filter(|name| name.starts_with("sr"))
            .map(|name| self.dev_dir.join(name).to_string_lossy().into_owned())
            .collect();
        debug!("optical drives - {:?}", drives);
        Ok(drives)
    }

    fn volume_label(&self, drive: &str) -> Result<Option<String>> {
        let output = Command::new("blkid")
            .args(["--cache-file", "/dev/null", "-s", "LABEL", "-o", "value", drive])
            .output()
            .context("failed to run blkid")?;

        // blkid exits with 2 when the device has no such tag.
        if !output.status.success() {
            trace!("blkid found no label on '{}'", drive);
            return Ok(None);
        }

        let label = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if label.is_empty() { None } else { Some(label) })
    }

    fn copy_drive_tree(&self, drive: &str, target: &Path) -> Result<()> {
        let mount_dir = tempfile::Builder::new()
            .prefix("bootseed-")
            .tempdir()
            .context("failed to create temporary directory")?;
        util::mount_ro(Path::new(drive), mount_dir.path(), OPTICAL_FS, self.mount_retries)?;

        let res = util::copy_tree(mount_dir.path(), target);

        if let Err(e) = util::unmount(mount_dir.path(), self.mount_retries) {
            warn!("failed to unmount config drive '{}': {:#}", drive, e);
        }
        res
    }
}

/// Raw block device opened read-only.
#[derive(Debug)]
pub struct LinuxDisk {
    file: File,
    geometry: DiskGeometry,
}

impl PhysicalDisk for LinuxDisk {
    fn geometry(&self) -> Result<DiskGeometry> {
        Ok(self.geometry)
    }
}

impl Read for LinuxDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for LinuxDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
