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

//! Credential handling for unattended provisioning.
//!
//! A join credential is a domain-qualified username (`DOMAIN\account`)
//! plus a password. The password is wrapped in [`SecureString`] so it is
//! never printed or logged, and can be sourced from an environment
//! variable or file via [`CredentialSource`] so deployment tooling never
//! has to put it on a command line.

use std::fmt;

use crate::error::{DjoinError, Result};

/// A username split into its NetBIOS domain and account parts.
///
/// Usernames must contain exactly one `\` separator with non-empty parts
/// on both sides. UPN-style names (`user@domain`) are not accepted; the
/// identity subsystem's new-credentials logon takes domain and account
/// separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedAccount {
    /// NetBIOS domain name (the part before the separator).
    pub domain: String,
    /// Account name within the domain.
    pub account: String,
}

impl QualifiedAccount {
    /// Parse a `DOMAIN\account` username.
    ///
    /// Fails with [`DjoinError::CredentialFormat`] if the separator is
    /// missing, repeated, or either part is empty.
    pub fn parse(username: &str) -> Result<Self> {
        let mut parts = username.split('\\');
        let domain = parts.next().unwrap_or_default();
        let account = match parts.next() {
            Some(account) => account,
            None => {
                return Err(DjoinError::credential_format(format!(
                    "username '{username}' is missing the domain separator (expected DOMAIN\\account)"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(DjoinError::credential_format(format!(
                "username '{username}' contains more than one domain separator"
            )));
        }
        if domain.is_empty() {
            return Err(DjoinError::credential_format(format!(
                "username '{username}' has an empty domain part"
            )));
        }
        if account.is_empty() {
            return Err(DjoinError::credential_format(format!(
                "username '{username}' has an empty account part"
            )));
        }
        Ok(Self {
            domain: domain.to_string(),
            account: account.to_string(),
        })
    }
}

impl fmt::Display for QualifiedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.domain, self.account)
    }
}

/// A join credential: domain-qualified username plus password.
pub struct Credential {
    username: String,
    password: SecureString,
}

impl Credential {
    /// Create a credential from a raw username and password.
    ///
    /// The username is not validated here; validation happens when the
    /// session is opened, so a malformed name fails the join before any
    /// OS resource is acquired.
    pub fn new(username: impl Into<String>, password: SecureString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// The raw username as supplied.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Split the username into its domain and account parts.
    pub fn account(&self) -> Result<QualifiedAccount> {
        QualifiedAccount::parse(&self.username)
    }

    /// The password. Use with care.
    pub fn password(&self) -> &SecureString {
        &self.password
    }
}

/// Where a password comes from in configuration.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Direct value (not recommended for production).
    Direct(String),
    /// Environment variable.
    Environment(String),
    /// File containing the secret.
    File(std::path::PathBuf),
}

impl CredentialSource {
    /// Parse a credential source string.
    ///
    /// Formats:
    /// - `env:VAR_NAME` - Environment variable
    /// - `file:/path/to/secret` - File containing secret
    /// - `raw_value` - Direct value (not recommended)
    pub fn parse(s: &str) -> Self {
        if let Some(var) = s.strip_prefix("env:") {
            Self::Environment(var.to_string())
        } else if let Some(path) = s.strip_prefix("file:") {
            Self::File(std::path::PathBuf::from(path))
        } else {
            Self::Direct(s.to_string())
        }
    }

    /// Resolve the source to the password it names.
    ///
    /// File contents are trimmed of trailing whitespace so a newline at
    /// the end of a secrets file does not become part of the password.
    pub fn resolve(&self) -> Result<SecureString> {
        match self {
            Self::Direct(value) => Ok(SecureString::new(value.clone())),
            Self::Environment(var) => std::env::var(var)
                .map(SecureString::new)
                .map_err(|_| DjoinError::platform(format!("Environment variable {} not set", var))),
            Self::File(path) => std::fs::read_to_string(path)
                .map(|s| SecureString::new(s.trim_end().to_string()))
                .map_err(DjoinError::Io),
        }
    }

    /// Check if this is a secure storage method.
    pub fn is_secure(&self) -> bool {
        !matches!(self, Self::Direct(_))
    }
}

/// Secure string wrapper that prevents accidental logging.
///
/// This type intentionally does not implement Display or Debug
/// to prevent passwords from being accidentally logged.
pub struct SecureString {
    value: String,
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the value. Use with care.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Get the length without exposing the value.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Check if empty without exposing the value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        // Zero out the memory (best effort)
        // Note: This may not be fully effective due to compiler optimizations
        // and the String's internal buffer management
        unsafe {
            let bytes = self.value.as_bytes_mut();
            std::ptr::write_bytes(bytes.as_mut_ptr(), 0, bytes.len());
        }
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Intentionally no Debug or Display implementation
