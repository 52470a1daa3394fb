//! `config-drive` CLI sub-command.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use bootseed::config::{ConfigDriveConfig, DEFAULT_CONFIG_DRIVE_LABEL, DEFAULT_UNPACK_TOOL};
use bootseed::configdrive::ConfigDriveManager;
use bootseed::platform::LinuxPlatform;

/// Extract config-drive content into a directory
#[derive(Debug, Parser)]
pub struct CliConfigDrive {
    /// The directory into which config-drive files are written
    #[arg(long, value_name = "path")]
    pub(super) target: PathBuf,
    /// The tool used to unpack raw ISO images
    #[arg(long, value_name = "path", default_value = DEFAULT_UNPACK_TOOL)]
    unpack_tool: PathBuf,
    /// The volume label of mounted config drives
    #[arg(long, value_name = "label", default_value = DEFAULT_CONFIG_DRIVE_LABEL)]
    label: String,
    /// The directory for temporary ISO images
    #[arg(long, value_name = "path")]
    temp_dir: Option<PathBuf>,
}

impl CliConfigDrive {
    pub(super) fn config(&self) -> ConfigDriveConfig {
        let mut config = ConfigDriveConfig {
            unpack_tool: self.unpack_tool.clone(),
            volume_label: self.label.clone(),
            ..ConfigDriveConfig::default()
        };
        if let Some(dir) = &self.temp_dir {
            config.temp_dir = dir.clone();
        }
        config
    }

    /// Run the `config-drive` sub-command.
    pub(crate) fn run(self) -> Result<()> {
        let manager = ConfigDriveManager::new(LinuxPlatform::new(), self.config());
        let found = manager
            .get_config_drive_files(&self.target)
            .context("extracting config drive")?;
        if !found {
            bail!("no config drive found");
        }
        slog_scope::info!("config drive extracted to '{}'", self.target.display());
        Ok(())
    }
}
