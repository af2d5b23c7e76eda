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

//! Thread impersonation scopes.
//!
//! [`ImpersonationScope`] owns a token duplicated at impersonation level
//! from an open [`CredentialSession`]. Calling
//! [`activate`](ImpersonationScope::activate) switches the current
//! thread's effective identity to that token and returns an
//! [`ActiveImpersonation`] guard; the guard restores the original
//! identity when it is reverted or dropped, and while it lives the
//! borrow checker prevents the scope from being closed or re-activated.
//!
//! Impersonation is a per-thread property. A scope must be activated and
//! reverted on the same thread, and a thread holds at most one active
//! impersonation at a time; the guard's borrow enforces this for a
//! single scope, and callers must not interleave scopes on one thread.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DjoinError, Result};
use crate::session::{CredentialSession, RawToken, TokenProvider};

/// Owner of an impersonation-level duplicate of a session token.
///
/// The duplicate is released exactly once, by `close()` or drop,
/// whichever comes first. Duplication failure means no scope is created
/// and nothing new needs releasing; the source session still owns its
/// token and is closed by the caller as usual.
pub struct ImpersonationScope {
    provider: Arc<dyn TokenProvider>,
    duplicate: Option<RawToken>,
}

impl ImpersonationScope {
    /// Duplicate the session's token at impersonation level.
    ///
    /// Fails with [`DjoinError::TokenDuplication`] if the identity
    /// subsystem refuses; the session keeps its token either way.
    pub fn open(session: &CredentialSession) -> Result<Self> {
        let token = session.require_token()?;
        let provider = Arc::clone(session.provider());
        let duplicate = provider.duplicate(token)?;
        debug!("session token duplicated at impersonation level");
        Ok(Self {
            provider,
            duplicate: Some(duplicate),
        })
    }

    /// Whether the scope still holds its duplicate token.
    pub fn is_open(&self) -> bool {
        self.duplicate.is_some()
    }

    /// Switch the current thread's effective identity to the duplicate.
    ///
    /// On success the returned guard restores the original identity when
    /// reverted or dropped. On failure the thread's identity is
    /// unchanged and nothing needs reverting; the duplicate still needs
    /// `close()`.
    pub fn activate(&mut self) -> Result<ActiveImpersonation<'_>> {
        let token = self
            .duplicate
            .ok_or_else(|| DjoinError::platform("impersonation scope is already closed"))?;
        self.provider.impersonate(token)?;
        debug!("thread identity switched to impersonation token");
        Ok(ActiveImpersonation {
            scope: self,
            reverted: false,
        })
    }

    /// Release the duplicate token. Safe to call more than once.
    ///
    /// Callable only once any [`ActiveImpersonation`] guard is gone, so
    /// the identity is always restored before its token is released.
    pub fn close(&mut self) {
        if let Some(token) = self.duplicate.take() {
            self.provider.release(token);
            debug!("impersonation token released");
        }
    }
}

impl fmt::Debug for ImpersonationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonationScope")
            .field("duplicate", &self.duplicate)
            .finish_non_exhaustive()
    }
}

impl Drop for ImpersonationScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Proof that the current thread is executing under an impersonated
/// identity.
///
/// Privileged calls take a reference to this guard as a parameter, which
/// makes "provision without impersonation" unrepresentable rather than a
/// runtime check.
pub struct ActiveImpersonation<'a> {
    scope: &'a ImpersonationScope,
    reverted: bool,
}

impl ActiveImpersonation<'_> {
    /// Restore the thread's original identity, reporting the outcome.
    ///
    /// A failed revert is not fatal to the join: the caller logs it as a
    /// warning and the duplicate token is still released when the scope
    /// closes. Dropping the guard without calling this performs the same
    /// revert with a logged warning on failure.
    pub fn revert(mut self) -> Result<()> {
        self.reverted = true;
        let outcome = self.scope.provider.revert();
        if outcome.is_ok() {
            debug!("thread identity restored");
        }
        outcome
    }
}

impl fmt::Debug for ActiveImpersonation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveImpersonation")
            .field("reverted", &self.reverted)
            .finish_non_exhaustive()
    }
}

impl Drop for ActiveImpersonation<'_> {
    fn drop(&mut self) {
        if !self.reverted {
            match self.scope.provider.revert() {
                Ok(()) => debug!("thread identity restored"),
                Err(err) => warn!(error = %err, "failed to restore thread identity"),
            }
        }
    }
}
