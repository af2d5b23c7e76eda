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

//! Win32 directory provisioning service.
//!
//! This module wraps the NetJoin provisioning APIs:
//!
//! - `NetProvisionComputerAccount` for the flat call shape, where the
//!   target fields are passed as individual arguments
//! - `NetCreateProvisioningPackage` for the structured shape, which
//!   marshals a `NETSETUP_PROVISIONING_PARAMS` aggregate with optional
//!   certificate template and machine policy arrays
//!
//! Both calls request the text form of the provisioning package (the
//! base64 blob consumed by `djoin /requestODJ` and unattend.xml). The
//! API allocates that buffer; it is copied into an owned `String` and
//! released with `NetApiBufferFree` before returning.

use crate::error::{DjoinError, Result};
use crate::provisioning::{DirectoryService, ServiceReply};
use crate::request::{FlatCall, PackageParams};

#[cfg(windows)]
use windows::Win32::NetworkManagement::NetManagement::{
    NETSETUP_PROVISIONING_PARAMS, NetApiBufferFree, NetCreateProvisioningPackage,
    NetProvisionComputerAccount,
};
#[cfg(windows)]
use windows::core::{PCWSTR, PWSTR};

/// Directory service backed by the Win32 NetJoin APIs.
///
/// Calls must run under an impersonated thread identity when the
/// process identity lacks machine-account creation rights; the
/// provisioning client enforces that ordering. On non-Windows targets
/// every operation returns a platform error.
#[derive(Debug, Default)]
pub struct Win32DirectoryService;

impl Win32DirectoryService {
    /// Create a new service.
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryService for Win32DirectoryService {
    fn provision_account(&self, call: &FlatCall) -> Result<ServiceReply> {
        #[cfg(windows)]
        {
            use crate::windows::to_wide;

            let domain = to_wide(&call.domain);
            let machine = to_wide(&call.machine_name);
            let ou = call.machine_account_ou.as_deref().map(to_wide);
            let dc = call.dc_name.as_deref().map(to_wide);

            let mut text = PWSTR::null();
            let status = unsafe {
                NetProvisionComputerAccount(
                    PCWSTR(domain.as_ptr()),
                    PCWSTR(machine.as_ptr()),
                    opt_pcwstr(&ou),
                    opt_pcwstr(&dc),
                    call.options,
                    None,
                    None,
                    Some(&mut text),
                )
            };
            tracing::debug!(status, "NetProvisionComputerAccount completed");

            let blob = copy_and_free_text(text)?;
            Ok(ServiceReply { status, blob })
        }

        #[cfg(not(windows))]
        {
            let _ = call;
            Err(DjoinError::platform(
                "Directory provisioning requires Windows",
            ))
        }
    }

    fn create_provisioning_package(&self, params: &PackageParams) -> Result<ServiceReply> {
        #[cfg(windows)]
        {
            use crate::windows::to_wide;

            let domain = to_wide(&params.domain);
            let host = to_wide(&params.host_name);
            let ou = params.machine_account_ou.as_deref().map(to_wide);
            let dc = params.dc_name.as_deref().map(to_wide);
            let netbios = params.netbios_name.as_deref().map(to_wide);
            let site = params.site_name.as_deref().map(to_wide);
            let primary_dns = params.primary_dns_domain.as_deref().map(to_wide);

            // The pointer arrays borrow the wide buffers; both must
            // stay alive until the call returns.
            let (_template_bufs, mut template_ptrs) = wide_array(&params.cert_templates);
            let (_policy_name_bufs, mut policy_name_ptrs) =
                wide_array(&params.machine_policy_names);
            let (_policy_path_bufs, mut policy_path_ptrs) =
                wide_array(&params.machine_policy_paths);

            let setup = NETSETUP_PROVISIONING_PARAMS {
                dwVersion: params.version,
                lpDomain: PCWSTR(domain.as_ptr()),
                lpHostName: PCWSTR(host.as_ptr()),
                lpMachineAccountOU: opt_pcwstr(&ou),
                lpDcName: opt_pcwstr(&dc),
                dwProvisionOptions: params.options,
                aCertTemplateNames: array_ptr(&mut template_ptrs),
                cCertTemplateNames: template_ptrs.len() as u32,
                aMachinePolicyNames: array_ptr(&mut policy_name_ptrs),
                cMachinePolicyNames: policy_name_ptrs.len() as u32,
                aMachinePolicyPaths: array_ptr(&mut policy_path_ptrs),
                cMachinePolicyPaths: policy_path_ptrs.len() as u32,
                lpNetbiosName: opt_pwstr(&netbios),
                lpSiteName: opt_pwstr(&site),
                lpPrimaryDNSDomain: opt_pwstr(&primary_dns),
            };

            let mut text = PWSTR::null();
            let status = unsafe { NetCreateProvisioningPackage(&setup, None, None, Some(&mut text)) };
            tracing::debug!(
                status,
                version = params.version,
                "NetCreateProvisioningPackage completed"
            );

            let blob = copy_and_free_text(text)?;
            Ok(ServiceReply { status, blob })
        }

        #[cfg(not(windows))]
        {
            let _ = params;
            Err(DjoinError::platform(
                "Directory provisioning requires Windows",
            ))
        }
    }
}

/// Encode a string slice as wide buffers plus a borrowed pointer array.
#[cfg(windows)]
fn wide_array(values: &[String]) -> (Vec<Vec<u16>>, Vec<PCWSTR>) {
    let buffers: Vec<Vec<u16>> = values.iter().map(|s| crate::windows::to_wide(s)).collect();
    let pointers = buffers.iter().map(|w| PCWSTR(w.as_ptr())).collect();
    (buffers, pointers)
}

#[cfg(windows)]
fn array_ptr(pointers: &mut Vec<PCWSTR>) -> *mut PCWSTR {
    if pointers.is_empty() {
        std::ptr::null_mut()
    } else {
        pointers.as_mut_ptr()
    }
}

#[cfg(windows)]
fn opt_pcwstr(buffer: &Option<Vec<u16>>) -> PCWSTR {
    buffer
        .as_ref()
        .map_or(PCWSTR::null(), |w| PCWSTR(w.as_ptr()))
}

#[cfg(windows)]
fn opt_pwstr(buffer: &Option<Vec<u16>>) -> PWSTR {
    buffer
        .as_ref()
        .map_or(PWSTR::null(), |w| PWSTR(w.as_ptr() as *mut u16))
}

/// Copy the API-owned text buffer into an owned string, then free it.
#[cfg(windows)]
fn copy_and_free_text(text: PWSTR) -> Result<String> {
    if text.is_null() {
        return Ok(String::new());
    }

    let value = unsafe { text.to_string() };
    unsafe {
        let _ = NetApiBufferFree(Some(text.0 as *const core::ffi::c_void));
    }

    value.map_err(|_| DjoinError::platform("Provisioning text is not valid UTF-16"))
}
