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

//! End-to-end domain-join provisioning workflow.
//!
//! This module composes the credential session, the impersonation scope,
//! and the provisioning client into the single `join_domain` operation.
//! The orchestrator owns overall sequencing and the cleanup guarantee:
//! every acquired token is released on every exit path, in reverse
//! acquisition order, with the thread's identity restored before its
//! token is released.
//!
//! # Workflow
//!
//! 1. Validate the request fields
//! 2. Open a credential session (parses and validates the username)
//! 3. Duplicate the session token at impersonation level
//! 4. Switch the calling thread's identity to the duplicate
//! 5. Issue the single provisioning call
//! 6. Restore the thread's identity (failure here is a warning)
//! 7. Release the duplicate, then the session token
//!
//! Each join runs synchronously on the calling thread; impersonation is
//! a per-thread property, so concurrent joins must use separate threads
//! and separate orchestrator calls. The orchestrator itself holds no
//! per-join state and may be shared.
//!
//! # Example
//!
//! ```no_run
//! use usg_djoin_client::credential::{Credential, SecureString};
//! use usg_djoin_client::orchestrator::JoinOrchestrator;
//! use usg_djoin_client::request::ProvisioningRequest;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = JoinOrchestrator::with_platform_defaults();
//! let credential = Credential::new("CONTOSO\\svc-join", SecureString::from("P@ssw0rd"));
//! let request = ProvisioningRequest::new("contoso.com", "NODE01")
//!     .with_ou("OU=Servers,DC=contoso,DC=com")
//!     .with_dc("dc1.contoso.com");
//!
//! let result = orchestrator.join_domain(&credential, &request)?;
//! println!("{}", result.blob);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::credential::Credential;
use crate::error::{DjoinError, Result, describe_status};
use crate::impersonation::ImpersonationScope;
use crate::provisioning::{DirectoryService, ProvisioningClient};
use crate::request::{ProvisioningRequest, ProvisioningResult};
use crate::session::{CredentialSession, TokenProvider};
use crate::windows::eventlog::{EventData, EventId, EventLog};

/// Runs the end-to-end domain-join provisioning operation.
pub struct JoinOrchestrator {
    tokens: Arc<dyn TokenProvider>,
    client: ProvisioningClient,
    event_log: Option<EventLog>,
}

impl JoinOrchestrator {
    /// Create an orchestrator over explicit identity and directory
    /// implementations.
    pub fn new(tokens: Arc<dyn TokenProvider>, directory: Arc<dyn DirectoryService>) -> Self {
        Self {
            tokens,
            client: ProvisioningClient::new(directory),
            event_log: None,
        }
    }

    /// Create an orchestrator wired to the platform identity subsystem
    /// and directory service.
    pub fn with_platform_defaults() -> Self {
        Self::new(
            Arc::new(crate::windows::Win32TokenProvider::new()),
            Arc::new(crate::windows::Win32DirectoryService::new()),
        )
    }

    /// Attach an event log for audit records.
    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = Some(event_log);
        self
    }

    /// Perform one unattended domain-join provisioning operation.
    ///
    /// On success returns the directory service's status (zero) and a
    /// non-empty provisioning blob. On failure returns one of the five
    /// classified error kinds; in every case all acquired tokens have
    /// been released and the thread's identity restored before this
    /// returns.
    pub fn join_domain(
        &self,
        credential: &Credential,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningResult> {
        let start = std::time::Instant::now();

        tracing::info!(
            domain = %request.domain,
            machine = %request.machine_name,
            "Starting domain-join provisioning"
        );
        if let Some(ref log) = self.event_log {
            let _ = log.log_info(
                EventId::JOIN_STARTED,
                "Domain-join provisioning started",
                Some(&EventData::with_target(
                    &request.domain,
                    &request.machine_name,
                )),
            );
        }

        let result = self.run_join(credential, request);

        match &result {
            Ok(outcome) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::info!(
                    status = outcome.status,
                    blob_len = outcome.blob.len(),
                    duration_ms,
                    "Domain-join provisioning completed"
                );
                if let Some(ref log) = self.event_log {
                    let _ = log.log_audit(
                        EventId::ACCOUNT_PROVISIONED,
                        true,
                        "Machine account provisioned",
                        Some(&EventData::with_target(
                            &request.domain,
                            &request.machine_name,
                        )),
                    );
                    let _ = log.log_info(
                        EventId::JOIN_COMPLETED,
                        &format!("Domain-join provisioning completed in {duration_ms} ms"),
                        None,
                    );
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Domain-join provisioning failed");
                if let Some(ref log) = self.event_log {
                    let event_id = match err {
                        DjoinError::Authentication { .. } => Some(EventId::LOGON_FAILED),
                        DjoinError::TokenDuplication { .. } => {
                            Some(EventId::TOKEN_DUPLICATION_FAILED)
                        }
                        DjoinError::Impersonation { .. } => Some(EventId::IMPERSONATION_FAILED),
                        DjoinError::Provisioning { .. } => Some(EventId::PROVISION_FAILED),
                        _ => None,
                    };
                    if let Some(event_id) = event_id {
                        let _ = log.log_error(event_id, &err.to_string(), err.os_error_code());
                    }
                }
            }
        }

        result
    }

    fn run_join(
        &self,
        credential: &Credential,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningResult> {
        // Step 1: Validate request fields before touching the OS.
        request.validate()?;

        // Step 2: Open the credential session. A malformed username or a
        // rejected logon fails here with nothing acquired.
        let mut session = CredentialSession::open(Arc::clone(&self.tokens), credential)?;
        tracing::debug!(account = %session.account(), "credential session open");

        // Step 3: Duplicate the session token at impersonation level. On
        // failure the session token must still be released.
        let mut scope = match ImpersonationScope::open(&session) {
            Ok(scope) => scope,
            Err(err) => {
                session.close();
                return Err(err);
            }
        };

        // Step 4: Switch this thread's identity and, while it holds, make
        // the one provisioning call.
        let outcome = match scope.activate() {
            Ok(identity) => {
                if let Some(ref log) = self.event_log {
                    let _ = log.log_audit(
                        EventId::IMPERSONATION_ACTIVATED,
                        true,
                        "Thread identity switched to the join credential",
                        Some(&EventData::with_account(&session.account().to_string())),
                    );
                }

                // Step 5: Single provisioning call; never retried.
                let outcome = self.client.provision(&identity, request);

                // Step 6: Restore the thread's identity before any token
                // is released. A failed revert is a warning, not a new
                // failure kind.
                match identity.revert() {
                    Ok(()) => {
                        if let Some(ref log) = self.event_log {
                            let _ = log.log_audit(
                                EventId::IMPERSONATION_REVERTED,
                                true,
                                "Thread identity restored",
                                None,
                            );
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to restore thread identity");
                        if let Some(ref log) = self.event_log {
                            let _ = log.log_warning(
                                EventId::REVERT_FAILED,
                                "Failed to restore thread identity",
                                Some(&EventData::with_error(&err.to_string(), None)),
                            );
                        }
                    }
                }

                outcome
            }
            // Activation failed: identity unchanged, nothing to revert.
            Err(err) => Err(err),
        };

        // Step 7: Release in reverse acquisition order.
        scope.close();
        session.close();

        if let Err(ref err) = outcome {
            if let DjoinError::Provisioning { status } = err {
                if let Some(text) = describe_status(*status) {
                    tracing::debug!(status, "directory service status: {text}");
                }
            }
        }

        outcome
    }
}
