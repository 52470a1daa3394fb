//! Runtime configuration for the config-drive extractor and the DHCP client.

use pnet_base::MacAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Volume label carried by OpenStack-style config drives.
pub const DEFAULT_CONFIG_DRIVE_LABEL: &str = "config-2";

/// Archive tool used to unpack raw ISO images.
pub const DEFAULT_UNPACK_TOOL: &str = "bsdtar";

/// Vendor class identifier sent along DHCP requests.
pub const DEFAULT_VENDOR_ID: &str = "bootseed";

pub const DHCP_CLIENT_PORT: u16 = 68;
pub const DHCP_SERVER_PORT: u16 = 67;

/// Default budget for waiting on a DHCP reply.
pub const DEFAULT_DHCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for [`ConfigDriveManager`](crate::configdrive::ConfigDriveManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigDriveConfig {
    /// Path (or bare name, looked up in `PATH`) of the unpack tool.
    pub unpack_tool: PathBuf,
    /// Expected volume label of a mounted config drive.
    pub volume_label: String,
    /// Directory where temporary ISO images are written.
    pub temp_dir: PathBuf,
}

impl Default for ConfigDriveConfig {
    fn default() -> Self {
        ConfigDriveConfig {
            unpack_tool: PathBuf::from(DEFAULT_UNPACK_TOOL),
            volume_label: DEFAULT_CONFIG_DRIVE_LABEL.to_string(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// Settings for [`DhcpClient`](crate::dhcp::DhcpClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpConfig {
    /// Local port the client socket binds to.
    pub client_port: u16,
    /// Remote port requests are sent to.
    pub server_port: u16,
    /// Hardware address to advertise, instead of looking it up from the
    /// interface carrying the outgoing route.
    pub mac_address: Option<MacAddr>,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        DhcpConfig {
            client_port: DHCP_CLIENT_PORT,
            server_port: DHCP_SERVER_PORT,
            mac_address: None,
        }
    }
}
