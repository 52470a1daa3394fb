// Copyright 2017 CoreOS, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Boot-time discovery of instance configuration.
//!
//! Two independent entry points are provided to a provisioning agent:
//!
//!  * [`configdrive::ConfigDriveManager::get_config_drive_files`] extracts a
//!    config drive, found either as a raw ISO9660 image on a physical disk or
//!    as a labelled optical volume;
//!  * [`dhcp::DhcpClient::get_dhcp_options`] retrieves options from a DHCP
//!    server in a single request/reply exchange.

pub mod config;
pub mod configdrive;
pub mod dhcp;
pub mod platform;
mod retry;
pub mod util;
