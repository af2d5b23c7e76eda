// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! Windows machine identity retrieval.
//!
//! This module provides functionality to retrieve machine-specific
//! identity information. During join provisioning it is used for:
//!
//! - Defaulting the name of the machine account being provisioned
//! - Detecting whether the local machine is already domain-joined
//! - Resolving `${COMPUTERNAME}`-style values in deployed configs
//!
//! # Example
//!
//! ```no_run,ignore
//! use usg_djoin_client::windows::identity::MachineIdentity;
//!
//! let identity = MachineIdentity::current()?;
//!
//! println!("Computer Name: {}", identity.computer_name);
//! println!("Already joined: {}", identity.is_domain_joined());
//! ```

use crate::error::Result;

#[cfg(not(windows))]
use crate::error::DjoinError;

#[cfg(windows)]
use windows::Win32::System::SystemInformation::{
    ComputerNameDnsDomain, ComputerNameDnsFullyQualified, ComputerNameDnsHostname,
    ComputerNameNetBIOS, GetComputerNameExW,
};

/// Machine identity information retrieved from the local system.
#[derive(Debug, Clone)]
pub struct MachineIdentity {
    /// The NetBIOS computer name (e.g., "NODE01").
    pub computer_name: String,
    /// The DNS hostname (e.g., "node01").
    pub dns_hostname: String,
    /// The fully qualified DNS name (e.g., "node01.contoso.com").
    pub fqdn: Option<String>,
    /// The Active Directory domain name, when already joined.
    pub domain: Option<String>,
    /// Whether the machine is domain-joined.
    domain_joined: bool,
}

impl MachineIdentity {
    /// Retrieve the current machine's identity.
    pub fn current() -> Result<Self> {
        #[cfg(windows)]
        {
            Self::current_windows()
        }

        #[cfg(not(windows))]
        {
            Self::current_fallback()
        }
    }

    /// Windows implementation of identity retrieval.
    #[cfg(windows)]
    fn current_windows() -> Result<Self> {
        let computer_name = Self::get_computer_name_ex(ComputerNameNetBIOS)?;
        let dns_hostname = Self::get_computer_name_ex(ComputerNameDnsHostname)
            .unwrap_or_else(|_| computer_name.clone());
        let fqdn = Self::get_computer_name_ex(ComputerNameDnsFullyQualified).ok();
        let domain = Self::get_computer_name_ex(ComputerNameDnsDomain)
            .ok()
            .filter(|d| !d.is_empty());

        let domain_joined = domain.is_some();

        Ok(Self {
            computer_name,
            dns_hostname,
            fqdn,
            domain,
            domain_joined,
        })
    }

    /// Fallback implementation for non-Windows platforms.
    ///
    /// Computer names follow the NetBIOS convention of the Windows path:
    /// uppercased, with any DNS suffix stripped.
    #[cfg(not(windows))]
    fn current_fallback() -> Result<Self> {
        let hostname = hostname::get()
            .map_err(|e| DjoinError::platform(format!("Failed to get hostname: {e}")))?
            .to_string_lossy()
            .to_string();

        let computer_name = hostname
            .split('.')
            .next()
            .unwrap_or(&hostname)
            .to_uppercase();

        Ok(Self {
            computer_name,
            dns_hostname: hostname,
            fqdn: None,
            domain: None,
            domain_joined: false,
        })
    }

    /// Get a computer name using GetComputerNameExW.
    #[cfg(windows)]
    fn get_computer_name_ex(
        name_type: windows::Win32::System::SystemInformation::COMPUTER_NAME_FORMAT,
    ) -> Result<String> {
        let mut size = 0u32;

        // First call to get required buffer size
        unsafe {
            let _ = GetComputerNameExW(name_type, windows::core::PWSTR::null(), &mut size);
        }

        if size == 0 {
            return Err(crate::windows::windows_api_error("GetComputerNameExW size"));
        }

        // Allocate buffer and get the name
        let mut buffer = vec![0u16; size as usize];
        let result = unsafe {
            GetComputerNameExW(
                name_type,
                windows::core::PWSTR(buffer.as_mut_ptr()),
                &mut size,
            )
        };

        if result.is_err() {
            return Err(crate::windows::windows_api_error("GetComputerNameExW"));
        }

        // Convert to String, removing null terminator
        let name = String::from_utf16_lossy(&buffer[..size as usize]);
        Ok(name)
    }

    /// Check if the machine is domain-joined.
    ///
    /// Provisioning a machine that is already joined usually wants the
    /// account-reuse option; callers can use this to surface a warning.
    pub fn is_domain_joined(&self) -> bool {
        self.domain_joined
    }
}
