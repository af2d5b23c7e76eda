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

//! Credential sessions over the identity subsystem.
//!
//! This module defines the [`TokenProvider`] seam over the platform's
//! identity subsystem (logon, token duplication, thread impersonation,
//! token release) and [`CredentialSession`], the owner of the security
//! token produced by validating a credential. The session guarantees the
//! token is released exactly once, on every exit path, by tying release
//! to `close()` with a `Drop` backstop.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::credential::{Credential, QualifiedAccount, SecureString};
use crate::error::{DjoinError, Result};

/// Opaque handle to a security token held by the identity subsystem.
///
/// The handle value itself is meaningless outside the provider that
/// issued it. Copying the handle does not duplicate the underlying
/// token; ownership is tracked by [`CredentialSession`] and
/// [`ImpersonationScope`](crate::impersonation::ImpersonationScope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawToken(isize);

impl RawToken {
    /// Wrap a provider-specific handle value.
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    /// The provider-specific handle value.
    pub fn as_raw(&self) -> isize {
        self.0
    }
}

/// Operations the identity subsystem must supply.
///
/// Exactly the four capabilities the join lifecycle needs, plus release.
/// The production implementation is
/// [`Win32TokenProvider`](crate::windows::Win32TokenProvider); tests
/// substitute an in-process recording implementation.
pub trait TokenProvider: Send + Sync {
    /// Authenticate a credential and return a session token.
    ///
    /// The logon must be the non-interactive "new credentials" kind: the
    /// local process identity is unchanged and the credential is used for
    /// outbound network authentication only. Fails with
    /// [`DjoinError::Authentication`] carrying the platform error code.
    fn logon(&self, account: &QualifiedAccount, password: &SecureString) -> Result<RawToken>;

    /// Duplicate a token at impersonation level.
    ///
    /// The duplicate permits switching a thread's effective identity for
    /// local calls; it does not permit delegation. Fails with
    /// [`DjoinError::TokenDuplication`].
    fn duplicate(&self, token: RawToken) -> Result<RawToken>;

    /// Switch the calling thread's effective identity to the token.
    ///
    /// Fails with [`DjoinError::Impersonation`]. On failure the thread's
    /// identity is unchanged.
    fn impersonate(&self, token: RawToken) -> Result<()>;

    /// Restore the calling thread's original identity.
    fn revert(&self) -> Result<()>;

    /// Release a token handle.
    ///
    /// Infallible from the caller's perspective; implementations report
    /// release problems through their own diagnostics. Called exactly
    /// once per handle returned by [`logon`](Self::logon) or
    /// [`duplicate`](Self::duplicate).
    fn release(&self, token: RawToken);
}

/// An open authenticated session for one credential.
///
/// Owns the session token exclusively. `close()` releases it and is
/// idempotent; dropping an open session also releases it.
pub struct CredentialSession {
    provider: Arc<dyn TokenProvider>,
    account: QualifiedAccount,
    token: Option<RawToken>,
}

impl CredentialSession {
    /// Validate the credential and open a session.
    ///
    /// A malformed username fails with
    /// [`DjoinError::CredentialFormat`] before the identity subsystem is
    /// touched; a rejected credential fails with
    /// [`DjoinError::Authentication`] and leaves nothing to release.
    pub fn open(provider: Arc<dyn TokenProvider>, credential: &Credential) -> Result<Self> {
        let account = credential.account()?;
        debug!(account = %account, "opening credential session");
        let token = provider.logon(&account, credential.password())?;
        Ok(Self {
            provider,
            account,
            token: Some(token),
        })
    }

    /// The parsed account this session was opened for.
    pub fn account(&self) -> &QualifiedAccount {
        &self.account
    }

    /// The session token, while the session is open.
    pub fn token(&self) -> Option<RawToken> {
        self.token
    }

    /// Whether the session still holds its token.
    pub fn is_open(&self) -> bool {
        self.token.is_some()
    }

    /// The provider this session was opened against.
    pub(crate) fn provider(&self) -> &Arc<dyn TokenProvider> {
        &self.provider
    }

    /// The session token, or an error if the session was already closed.
    pub(crate) fn require_token(&self) -> Result<RawToken> {
        self.token
            .ok_or_else(|| DjoinError::platform("credential session is already closed"))
    }

    /// Release the session token. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(token) = self.token.take() {
            self.provider.release(token);
            debug!(account = %self.account, "credential session closed");
        }
    }
}

impl fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSession")
            .field("account", &self.account)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Drop for CredentialSession {
    fn drop(&mut self) {
        self.close();
    }
}
