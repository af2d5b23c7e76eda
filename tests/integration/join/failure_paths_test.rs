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

//! Integration tests for cleanup on every failure path
//!
//! Each failure kind must leave zero open handles, no active
//! impersonation, and no provisioning call beyond the point of failure.

use std::sync::Arc;

use crate::integration::{
    Op, RecordingTokenProvider, ScriptedDirectory, TEST_BLOB, TEST_PASSWORD, test_credential,
    test_request,
};
use usg_djoin_client::{Credential, DjoinError, JoinOrchestrator, SecureString};

#[test]
fn test_rejected_logon_acquires_nothing() {
    let provider = Arc::new(RecordingTokenProvider::new().fail_logon(1326));
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    assert!(matches!(err, DjoinError::Authentication { code: 1326, .. }));
    assert_eq!(err.os_error_code(), Some(1326));

    // The logon was attempted; nothing was issued, so nothing to clean.
    assert_eq!(provider.ops().len(), 1);
    assert!(matches!(provider.ops()[0], Op::Logon { .. }));
    assert_eq!(provider.open_handles(), 0);
    assert!(directory.calls().is_empty());
}

#[test]
fn test_failed_duplication_releases_session_token() {
    let provider = Arc::new(RecordingTokenProvider::new().fail_duplicate(5));
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    assert!(matches!(err, DjoinError::TokenDuplication { code: 5 }));

    // The session token is released; impersonation is never attempted.
    let ops = provider.ops();
    assert_eq!(ops[1], Op::Duplicate { source: 101 });
    assert_eq!(*ops.last().unwrap(), Op::Release { token: 101 });
    assert!(!ops.iter().any(|op| matches!(op, Op::Impersonate { .. })));
    assert_eq!(provider.open_handles(), 0);
    assert!(directory.calls().is_empty());
}

#[test]
fn test_failed_impersonation_releases_both_tokens_without_revert() {
    let provider = Arc::new(RecordingTokenProvider::new().fail_impersonate(1346));
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    assert!(matches!(err, DjoinError::Impersonation { code: 1346 }));

    // The identity never switched, so there must be no revert, but both
    // tokens must still come back, duplicate first.
    assert_eq!(
        provider.ops(),
        vec![
            Op::Logon {
                account: "svc-join".to_string(),
                domain: "CONTOSO".to_string(),
                password: "P@ssw0rd".to_string(),
            },
            Op::Duplicate { source: 101 },
            Op::Impersonate { token: 102 },
            Op::Release { token: 102 },
            Op::Release { token: 101 },
        ]
    );
    assert_eq!(provider.open_handles(), 0);
    assert!(!provider.any_impersonating());
    assert!(directory.calls().is_empty());
}

#[test]
fn test_service_rejection_still_reverts_and_releases() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(
        ScriptedDirectory::failing(2224).verifying_identity(provider.clone()),
    );
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    // 2224: the account already exists.
    assert!(matches!(err, DjoinError::Provisioning { status: 2224 }));
    assert_eq!(err.os_error_code(), Some(2224));

    // The call was made once, under impersonation, and the full cleanup
    // sequence still ran.
    assert_eq!(directory.calls().len(), 1);
    assert_eq!(
        provider.ops()[3..],
        [
            Op::Revert,
            Op::Release { token: 102 },
            Op::Release { token: 101 },
        ]
    );
    assert_eq!(provider.open_handles(), 0);
    assert!(!provider.any_impersonating());
}

#[test]
fn test_empty_blob_on_success_status_is_an_error() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(ScriptedDirectory::succeeding(""));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    assert!(matches!(err, DjoinError::Platform(_)));
    assert!(err.to_string().contains("empty provisioning blob"));
    assert_eq!(provider.open_handles(), 0);
    assert!(!provider.any_impersonating());
}

#[test]
fn test_invalid_request_fails_before_any_call() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let request = usg_djoin_client::ProvisioningRequest::new("", "NODE01");
    let err = orchestrator
        .join_domain(&test_credential(), &request)
        .unwrap_err();

    assert!(matches!(err, DjoinError::Config(_)));
    assert!(err.is_input_error());
    assert!(provider.ops().is_empty());
    assert!(directory.calls().is_empty());
}

#[test]
fn test_malformed_username_fails_before_any_os_call() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    // No domain separator at all.
    let credential = Credential::new("svc-join", SecureString::from(TEST_PASSWORD));
    let err = orchestrator
        .join_domain(&credential, &test_request())
        .unwrap_err();

    assert!(matches!(err, DjoinError::CredentialFormat(_)));
    assert!(err.is_input_error());
    assert!(provider.ops().is_empty());
    assert!(directory.calls().is_empty());
}
