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

//! Windows platform integration for offline domain join.
//!
//! This module provides the Win32-backed implementations of the crate's
//! platform traits, plus machine identity retrieval and Event Log
//! integration:
//!
//! - **Token lifecycle**: `LogonUserW` with the new-credentials logon
//!   type, `DuplicateToken` to the impersonation level, thread-scoped
//!   `ImpersonateLoggedOnUser`/`RevertToSelf`, and `CloseHandle` for
//!   release. See [`Win32TokenProvider`].
//!
//! - **Directory provisioning**: `NetProvisionComputerAccount` for the
//!   flat call shape and `NetCreateProvisioningPackage` for the
//!   structured shape, with API-owned output buffers copied out and
//!   freed via `NetApiBufferFree`. See [`Win32DirectoryService`].
//!
//! - **Machine Identity**: Computer name and DNS hostname retrieval for
//!   defaulting the machine name of the account being provisioned.
//!
//! - **Event Log**: Audit trail for join attempts, impersonation
//!   activations/reverts, and failures.
//!
//! # Platform Behavior
//!
//! The module compiles on all targets. On non-Windows targets the
//! providers return platform errors at run time, which keeps the
//! library's unit tests and the in-process test doubles usable during
//! cross-platform development.
//!
//! # Security Considerations
//!
//! - Provisioning requires a domain account with machine-account
//!   creation rights, not local elevation.
//! - Impersonation affects only the calling thread. The providers never
//!   alter process-wide identity.
//! - Passwords are wiped when the owning credential is dropped and are
//!   never written to the Event Log or trace output.
//!
//! # Example
//!
//! ```no_run,ignore
//! use usg_djoin_client::windows::MachineIdentity;
//! use usg_djoin_client::{Credential, JoinOrchestrator, ProvisioningRequest, SecureString};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = MachineIdentity::current()?;
//! let request = ProvisioningRequest::new("contoso.com", &identity.computer_name);
//!
//! let credential = Credential::new("CONTOSO\\svc-join", SecureString::from("P@ssw0rd"));
//! let orchestrator = JoinOrchestrator::with_platform_defaults();
//! let result = orchestrator.join_domain(&credential, &request)?;
//! println!("{}", result.blob);
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod eventlog;
pub mod identity;
pub mod token;

pub use directory::Win32DirectoryService;
pub use eventlog::{EventLog, EventType};
pub use identity::MachineIdentity;
pub use token::Win32TokenProvider;

use crate::error::DjoinError;

/// Check if this code is running on a Windows system.
///
/// The platform providers in this module return errors on other systems;
/// callers can use this for an up-front check with a clearer message.
#[inline]
pub fn is_windows() -> bool {
    cfg!(windows)
}

/// Get the calling thread's last Win32 error code.
#[cfg(windows)]
pub(crate) fn last_error_code() -> u32 {
    use windows::Win32::Foundation::GetLastError;
    unsafe { GetLastError().0 }
}

/// Create a DjoinError from a Windows API operation.
pub(crate) fn windows_api_error(operation: &str) -> DjoinError {
    #[cfg(windows)]
    {
        DjoinError::platform(format!(
            "{}: Windows error 0x{:08X}",
            operation,
            last_error_code()
        ))
    }
    #[cfg(not(windows))]
    {
        DjoinError::platform(format!("{operation}: Not running on Windows"))
    }
}

/// Encode a string as a NUL-terminated UTF-16 buffer for Win32 calls.
#[cfg(windows)]
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
