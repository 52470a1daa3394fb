//! Config-drive discovery and extraction.
//!
//! A config drive is located by any available means, in this order:
//!
//!  1. a raw ISO9660 image written directly on a fixed physical disk, which
//!     is dumped to a temporary file and unpacked with an external tool;
//!  2. an optical drive carrying the expected volume label, whose content
//!     is copied as-is.

use anyhow::{bail, Context, Result};
use slog_scope::{debug, info, warn};
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Command;
use tempfile::TempPath;

use crate::config::ConfigDriveConfig;
use crate::platform::{PhysicalDisk, Platform};

pub mod iso;
use self::iso::CandidateIsoImage;


/// Locates a config drive and places its files into a target directory.
#[derive(Debug)]
pub struct ConfigDriveManager<P> {
    platform: P,
    config: ConfigDriveConfig,
}

impl<P: Platform> ConfigDriveManager<P> {
    pub fn new(platform: P, config: ConfigDriveConfig) -> Self {
        ConfigDriveManager { platform, config }
    }

    /// Extract config-drive content into `target_path`.
    ///
    /// Returns `Ok(false)` when no config drive could be found. The optical
    /// drive lookup runs even if the raw disk one failed with an error; that
    /// error is only returned if no optical drive was found either.
    pub fn get_config_drive_files(&self, target_path: &Path) -> Result<bool> {
        let raw_err = match self.get_conf_drive_from_raw_hdd(target_path) {
            Ok(true) => return Ok(true),
            Ok(false) => None,
            Err(e) => {
                warn!("raw disk config drive extraction failed: {:#}", e);
                Some(e)
            }
        };

        if self.get_conf_drive_from_cdrom_drive(target_path)? {
            return Ok(true);
        }

        match raw_err {
            Some(e) => Err(e),
            None => {
                info!("no config drive found");
                Ok(false)
            }
        }
    }

    /// Look for a raw ISO image on physical disks and unpack it.
    fn get_conf_drive_from_raw_hdd(&self, target_path: &Path) -> Result<bool> {
        let iso_file = match self.extract_iso_disk_file()? {
            Some(iso_file) => iso_file,
            None => return Ok(false),
        };

        let res = self.extract_iso_files(&iso_file, target_path);

        let iso_path = iso_file.to_path_buf();
        if let Err(e) = iso_file.close() {
            warn!(
                "failed to remove temporary ISO file '{}': {}",
                iso_path.display(),
                e
            );
        }

        res.map(|_| true)
    }

    /// Scan all physical disks and dump the first ISO image found.
    ///
    /// Disks that cannot be opened, scanned or dumped are skipped. The returned
    /// temporary file is removed when dropped.
    fn extract_iso_disk_file(&self) -> Result<Option<TempPath>> {
        for path in self.platform.physical_disks()? {
            let mut disk = match self.platform.open_physical_disk(&path) {
                Ok(disk) => disk,
                Err(e) => {
                    warn!("failed to open physical disk '{}': {:#}", path, e);
                    continue;
                }
            };

            let candidate = match disk
                .geometry()
                .and_then(|geometry| iso::scan(&path, &mut disk, &geometry))
            {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(e) => {
                    warn!("failed to scan physical disk '{}': {:#}", path, e);
                    continue;
                }
            };

            info!(
                "found config drive image on '{}' ({} bytes)",
                candidate.source_disk_path(),
                candidate.size_bytes()
            );
            match self.write_iso_file(&mut disk, &candidate) {
                Ok(iso_file) => return Ok(Some(iso_file)),
                Err(e) => warn!("failed to dump ISO image from '{}': {:#}", path, e),
            }
        }
        Ok(None)
    }

    /// Copy the image bytes from the device into a uniquely named file.
    fn write_iso_file<D>(&self, disk: &mut D, candidate: &CandidateIsoImage) -> Result<TempPath>
    where
        D: PhysicalDisk,
    {
        let mut iso_file = tempfile::Builder::new()
            .prefix("bootseed-")
            .suffix(".iso")
            .rand_bytes(16)
            .tempfile_in(&self.config.temp_dir)
            .with_context(|| {
                format!(
                    "failed to create temporary ISO file in '{}'",
                    self.config.temp_dir.display()
                )
            })?;
        debug!("writing ISO image to '{}'", iso_file.path().display());

        disk.seek(SeekFrom::Start(candidate.byte_offset()))
            .with_context(|| format!("failed to seek '{}'", candidate.source_disk_path()))?;
        let copied = io::copy(&mut disk.by_ref().take(candidate.size_bytes()), &mut iso_file)
            .with_context(|| {
                format!(
                    "failed to copy ISO image from '{}'",
                    candidate.source_disk_path()
                )
            })?;
        if copied != candidate.size_bytes() {
            bail!(
                "truncated ISO image on '{}': expected {} bytes, read {}",
                candidate.source_disk_path(),
                candidate.size_bytes(),
                copied
            );
        }
        iso_file.flush().context("failed to flush temporary ISO file")?;

        Ok(iso_file.into_temp_path())
    }

    /// Unpack an ISO file into `target_path` with the external unpack tool.
    fn extract_iso_files(&self, iso_path: &Path, target_path: &Path) -> Result<()> {
        fs::create_dir_all(target_path)
            .with_context(|| format!("failed to create directory '{}'", target_path.display()))?;

        let tool = &self.config.unpack_tool;
        let output = Command::new(tool)
            .arg("-xf")
            .arg(iso_path)
            .arg("-C")
            .arg(target_path)
            .output()
            .with_context(|| format!("failed to run '{}'", tool.display()))?;

        if !output.status.success() {
            bail!(
                "failed to extract ISO file '{}' with '{}' ({}): {}",
                iso_path.display(),
                tool.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        debug!("extracted '{}' into '{}'", iso_path.display(), target_path.display());
        Ok(())
    }

    /// First optical drive whose volume label matches the config-drive label.
    fn get_config_drive_cdrom_mount_point(&self) -> Result<Option<String>> {
        for drive in self.platform.optical_drives()? {
            match self.platform.volume_label(&drive) {
                Ok(Some(label)) if label == self.config.volume_label => return Ok(Some(drive)),
                Ok(label) => debug!("skipping optical drive '{}' (label {:?})", drive, label),
                Err(e) => warn!("failed to read volume label of '{}': {:#}", drive, e),
            }
        }
        Ok(None)
    }

    /// Copy the content of a labelled optical drive into `target_path`.
    fn get_conf_drive_from_cdrom_drive(&self, target_path: &Path) -> Result<bool> {
        let drive = match self.get_config_drive_cdrom_mount_point()? {
            Some(drive) => drive,
            None => return Ok(false),
        };

        info!("copying config drive from optical drive '{}'", drive);
        self.platform
            .copy_drive_tree(&drive, target_path)
            .with_context(|| format!("failed to copy config drive '{}'", drive))?;
        Ok(true)
    }
}
