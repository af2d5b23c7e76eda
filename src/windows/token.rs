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

//! Win32 token lifecycle provider.
//!
//! This module implements credential logon, token duplication, and
//! thread impersonation on top of the Win32 security APIs:
//!
//! - `LogonUserW` with the new-credentials logon type, so the token
//!   carries the join credential for network access without changing
//!   the local security context
//! - `DuplicateToken` at the impersonation level, since primary tokens
//!   cannot be assigned to a thread directly
//! - `ImpersonateLoggedOnUser` / `RevertToSelf` for the thread-scoped
//!   identity switch
//! - `CloseHandle` for releasing both tokens
//!
//! Failures carry the raw `GetLastError` code so operators can match
//! them against Windows documentation (1326 is a bad password, 1355 an
//! unreachable domain, and so on).

use crate::credential::{QualifiedAccount, SecureString};
use crate::error::{DjoinError, Result};
use crate::session::{RawToken, TokenProvider};

#[cfg(windows)]
use windows::Win32::Foundation::{CloseHandle, HANDLE};
#[cfg(windows)]
use windows::Win32::Security::{
    DuplicateToken, ImpersonateLoggedOnUser, LOGON32_LOGON_NEW_CREDENTIALS,
    LOGON32_PROVIDER_WINNT50, LogonUserW, RevertToSelf, SecurityImpersonation,
};

/// Token provider backed by the Win32 security APIs.
///
/// The provider is stateless; token handles are owned by the session
/// and impersonation types that call it. On non-Windows targets every
/// operation returns a platform error.
#[derive(Debug, Default)]
pub struct Win32TokenProvider;

impl Win32TokenProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }
}

impl TokenProvider for Win32TokenProvider {
    fn logon(&self, account: &QualifiedAccount, password: &SecureString) -> Result<RawToken> {
        #[cfg(windows)]
        {
            use crate::windows::{last_error_code, to_wide};

            let account_wide = to_wide(&account.account);
            let domain_wide = to_wide(&account.domain);
            let mut password_wide = to_wide(password.expose());

            let mut handle = HANDLE::default();
            let result = unsafe {
                LogonUserW(
                    windows::core::PCWSTR(account_wide.as_ptr()),
                    windows::core::PCWSTR(domain_wide.as_ptr()),
                    windows::core::PCWSTR(password_wide.as_ptr()),
                    LOGON32_LOGON_NEW_CREDENTIALS,
                    LOGON32_PROVIDER_WINNT50,
                    &mut handle,
                )
            };

            // Wipe the transient UTF-16 copy of the password
            unsafe {
                std::ptr::write_bytes(password_wide.as_mut_ptr(), 0, password_wide.len());
            }

            match result {
                Ok(()) => Ok(RawToken::from_raw(handle.0 as isize)),
                Err(_) => Err(DjoinError::authentication(
                    account.to_string(),
                    last_error_code(),
                )),
            }
        }

        #[cfg(not(windows))]
        {
            let _ = password;
            Err(DjoinError::platform(format!(
                "Credential logon for '{account}' requires Windows"
            )))
        }
    }

    fn duplicate(&self, token: RawToken) -> Result<RawToken> {
        #[cfg(windows)]
        {
            use crate::windows::last_error_code;

            let source = HANDLE(token.as_raw() as *mut core::ffi::c_void);
            let mut duplicate = HANDLE::default();
            let result = unsafe { DuplicateToken(source, SecurityImpersonation, &mut duplicate) };

            match result {
                Ok(()) => Ok(RawToken::from_raw(duplicate.0 as isize)),
                Err(_) => Err(DjoinError::token_duplication(last_error_code())),
            }
        }

        #[cfg(not(windows))]
        {
            let _ = token;
            Err(DjoinError::platform("Token duplication requires Windows"))
        }
    }

    fn impersonate(&self, token: RawToken) -> Result<()> {
        #[cfg(windows)]
        {
            use crate::windows::last_error_code;

            let handle = HANDLE(token.as_raw() as *mut core::ffi::c_void);
            unsafe { ImpersonateLoggedOnUser(handle) }
                .map_err(|_| DjoinError::impersonation(last_error_code()))
        }

        #[cfg(not(windows))]
        {
            let _ = token;
            Err(DjoinError::platform("Impersonation requires Windows"))
        }
    }

    fn revert(&self) -> Result<()> {
        #[cfg(windows)]
        {
            unsafe { RevertToSelf() }
                .map_err(|_| crate::windows::windows_api_error("RevertToSelf"))
        }

        #[cfg(not(windows))]
        {
            Err(DjoinError::platform("Impersonation requires Windows"))
        }
    }

    fn release(&self, token: RawToken) {
        #[cfg(windows)]
        {
            let handle = HANDLE(token.as_raw() as *mut core::ffi::c_void);
            unsafe {
                let _ = CloseHandle(handle);
            }
        }

        #[cfg(not(windows))]
        {
            let _ = token;
        }
    }
}
