//! Command-line arguments parsing.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use slog_scope::trace;

mod configdrive;
mod dhcp;

/// Discover instance configuration at boot.
#[derive(Debug, Parser)]
#[clap(display_name = "bootseed")]
#[clap(version, propagate_version = true)]
pub(crate) struct CliConfig {
    /// Increase logging verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    ConfigDrive(configdrive::CliConfigDrive),
    DhcpOptions(dhcp::CliDhcpOptions),
}

impl CliConfig {
    /// Logging level selected by `-v` flags.
    pub fn log_level(&self) -> slog::Level {
        match self.verbose {
            0 => slog::Level::Warning,
            1 => slog::Level::Info,
            2 => slog::Level::Debug,
            _ => slog::Level::Trace,
        }
    }

    /// Run the relevant CLI sub-command.
    pub fn run(self) -> Result<()> {
        match self.cmd {
            CliCommand::ConfigDrive(cmd) => cmd.run(),
            CliCommand::DhcpOptions(cmd) => cmd.run(),
        }
    }
}

/// Parse command-line arguments into CLI configuration.
pub(crate) fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<CliConfig> {
    let cfg = match CliConfig::try_parse_from(argv) {
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => e.exit(),
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayVersion => e.exit(),
        v => v,
    }?;
    trace!("cli configuration - {:?}", cfg);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn args(argv: &[&str]) -> Vec<String> {
        argv.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn clap_tests() {
        use clap::CommandFactory;
        CliConfig::command().debug_assert();
    }

    #[test]
    fn test_no_args() {
        parse_args(args(&["bootseed"])).unwrap_err();
    }

    #[test]
    fn test_config_drive_cmd() {
        let cfg = parse_args(args(&["bootseed", "config-drive", "--target", "/run/cfg"])).unwrap();
        assert_eq!(cfg.log_level(), slog::Level::Warning);
        let cmd = match cfg.cmd {
            CliCommand::ConfigDrive(cmd) => cmd,
            x => panic!("unexpected cmd: {x:?}"),
        };
        assert_eq!(cmd.target, PathBuf::from("/run/cfg"));

        let config = cmd.config();
        assert_eq!(config.unpack_tool, PathBuf::from("bsdtar"));
        assert_eq!(config.volume_label, "config-2");
    }

    #[test]
    fn test_config_drive_overrides() {
        let cfg = parse_args(args(&[
            "bootseed",
            "-vv",
            "config-drive",
            "--target",
            "/run/cfg",
            "--unpack-tool",
            "/usr/local/bin/bsdtar",
            "--label",
            "CONFIG",
            "--temp-dir",
            "/var/tmp",
        ]))
        .unwrap();
        assert_eq!(cfg.log_level(), slog::Level::Debug);
        let cmd = match cfg.cmd {
            CliCommand::ConfigDrive(cmd) => cmd,
            x => panic!("unexpected cmd: {x:?}"),
        };

        let config = cmd.config();
        assert_eq!(config.unpack_tool, PathBuf::from("/usr/local/bin/bsdtar"));
        assert_eq!(config.volume_label, "CONFIG");
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp"));
    }

    #[test]
    fn test_config_drive_requires_target() {
        parse_args(args(&["bootseed", "config-drive"])).unwrap_err();
    }

    #[test]
    fn test_dhcp_cmd() {
        let cfg = parse_args(args(&[
            "bootseed",
            "dhcp-options",
            "--host",
            "10.0.0.1",
            "--option",
            "42",
            "--option",
            "3",
            "-v",
        ]))
        .unwrap();
        assert_eq!(cfg.log_level(), slog::Level::Info);
        let cmd = match cfg.cmd {
            CliCommand::DhcpOptions(cmd) => cmd,
            x => panic!("unexpected cmd: {x:?}"),
        };

        assert_eq!(cmd.requested_options(), vec![42, 3]);
        assert_eq!(cmd.timeout(), bootseed::config::DEFAULT_DHCP_TIMEOUT);
        assert_eq!(cmd.vendor_id(), Some("bootseed"));
        let config = cmd.config();
        assert_eq!(config.client_port, 68);
        assert_eq!(config.server_port, 67);
        assert_eq!(config.mac_address, None);
    }

    #[test]
    fn test_dhcp_defaults_to_ntp() {
        let cfg = parse_args(args(&["bootseed", "dhcp-options", "--host", "10.0.0.1"])).unwrap();
        let cmd = match cfg.cmd {
            CliCommand::DhcpOptions(cmd) => cmd,
            x => panic!("unexpected cmd: {x:?}"),
        };
        assert_eq!(cmd.requested_options(), vec![42]);
    }

    #[test]
    fn test_dhcp_overrides() {
        let cfg = parse_args(args(&[
            "bootseed",
            "dhcp-options",
            "--host",
            "192.168.0.1",
            "--timeout",
            "1.5",
            "--no-vendor-id",
            "--mac",
            "52:54:00:12:34:56",
            "--client-port",
            "6800",
            "--server-port",
            "6700",
        ]))
        .unwrap();
        let cmd = match cfg.cmd {
            CliCommand::DhcpOptions(cmd) => cmd,
            x => panic!("unexpected cmd: {x:?}"),
        };

        assert_eq!(cmd.timeout(), Duration::from_millis(1500));
        assert_eq!(cmd.vendor_id(), None);
        let config = cmd.config();
        assert_eq!(config.client_port, 6800);
        assert_eq!(config.server_port, 6700);
        assert_eq!(
            config.mac_address,
            Some(pnet_base::MacAddr(0x52, 0x54, 0x00, 0x12, 0x34, 0x56))
        );
    }

    #[test]
    fn test_dhcp_bad_args() {
        let cases = [
            vec!["bootseed", "dhcp-options"],
            vec!["bootseed", "dhcp-options", "--host", "not-an-ip"],
            vec!["bootseed", "dhcp-options", "--host", "10.0.0.1", "--option", "256"],
            vec!["bootseed", "dhcp-options", "--host", "10.0.0.1", "--mac", "zz"],
            vec!["bootseed", "dhcp-options", "--host", "10.0.0.1", "--timeout", "-1"],
            vec![
                "bootseed",
                "dhcp-options",
                "--host",
                "10.0.0.1",
                "--vendor-id",
                "x",
                "--no-vendor-id",
            ],
        ];
        for argv in cases {
            let input = format!("{argv:?}");
            parse_args(args(&argv)).expect_err(&input);
        }
    }
}
