//! Helpers for mounting and unmounting config-drive volumes.

use anyhow::{Context, Result};
use nix::mount;
use slog_scope::{debug, warn};
use std::path::Path;
use std::process::Command;

use crate::retry;

/// Try to unmount an existing target mountpoint, retrying on transient errors.
pub(crate) fn unmount(target: &Path, retries: u8) -> Result<()> {
    retry::Retry::new().max_retries(retries).retry(|attempt| {
        debug!(
            "unmounting '{}': attempt #{}",
            target.display(),
            attempt + 1
        );
        mount::umount(target).with_context(|| format!("failed to unmount '{}'", target.display()))
    })
}

/// Mount a filesystem read-only.
///
/// Failed attempts wait for udev to settle before retrying, since optical
/// media can show up late at boot.
pub(crate) fn mount_ro(source: &Path, target: &Path, fstype: &str, retries: u8) -> Result<()> {
    retry::Retry::new().max_retries(retries).retry(|attempt| {
        debug!("mounting '{}': attempt #{}", source.display(), attempt + 1);
        let res = mount::mount(
            Some(source),
            target,
            Some(fstype),
            mount::MsFlags::MS_RDONLY,
            None::<&str>,
        )
        .with_context(|| {
            format!(
                "failed to mount (read-only) '{}' on '{}' as '{}'",
                source.display(),
                target.display(),
                fstype
            )
        });

        if res.is_err() {
            settle_udev(None)
        };

        res
    })
}

/// Wait for the udev queue to settle, ignoring any errors.
fn settle_udev(timeout: Option<u8>) {
    let mut cmd = Command::new("udevadm");
    cmd.arg("settle");
    // If none, udevadm default is 120s.
    if let Some(t) = timeout {
        cmd.arg(format!("--timeout={t}"));
    }

    match cmd.output() {
        Err(e) => warn!("failed to run udevadm settle: {}", e),
        Ok(out) => {
            if !out.status.success() {
                warn!(
                    "udevadm settle failed: {}",
                    String::from_utf8_lossy(&out.stderr)
                );
            }
        }
    };
}
