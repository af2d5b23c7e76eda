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

//! Integration tests for the successful join sequence

use std::sync::Arc;

use crate::integration::{
    Op, RecordingTokenProvider, ScriptedDirectory, TEST_BLOB, TEST_DC, TEST_DOMAIN, TEST_MACHINE,
    TEST_OU, TEST_PASSWORD, test_credential, test_request,
};
use usg_djoin_client::request::{PACKAGE_VERSION_2, PROVISION_REUSE_ACCOUNT};
use usg_djoin_client::{
    JoinOrchestrator, ProvisionOptions, ProvisioningRequest, StructuredOptions, WireRequest,
};

#[test]
fn test_flat_join_happy_path() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(
        ScriptedDirectory::succeeding(TEST_BLOB).verifying_identity(provider.clone()),
    );
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let result = orchestrator
        .join_domain(&test_credential(), &test_request())
        .expect("join should succeed");

    assert_eq!(result.status, 0);
    assert_eq!(result.blob, TEST_BLOB);
    assert!(result.is_success());

    // The credential reaches the identity subsystem split into its
    // parts, and every step runs exactly once, in order, with the
    // duplicate released before the session token.
    assert_eq!(
        provider.ops(),
        vec![
            Op::Logon {
                account: "svc-join".to_string(),
                domain: "CONTOSO".to_string(),
                password: TEST_PASSWORD.to_string(),
            },
            Op::Duplicate { source: 101 },
            Op::Impersonate { token: 102 },
            Op::Revert,
            Op::Release { token: 102 },
            Op::Release { token: 101 },
        ]
    );
    assert_eq!(provider.open_handles(), 0);
    assert!(!provider.any_impersonating());
}

#[test]
fn test_flat_join_maps_request_onto_wire_call() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider, directory.clone());

    orchestrator
        .join_domain(&test_credential(), &test_request())
        .expect("join should succeed");

    let calls = directory.calls();
    assert_eq!(calls.len(), 1, "provisioning must be called exactly once");
    match &calls[0] {
        WireRequest::Flat(call) => {
            assert_eq!(call.domain, TEST_DOMAIN);
            assert_eq!(call.machine_name, TEST_MACHINE);
            assert_eq!(call.machine_account_ou.as_deref(), Some(TEST_OU));
            assert_eq!(call.dc_name.as_deref(), Some(TEST_DC));
            assert_eq!(call.options, PROVISION_REUSE_ACCOUNT);
        }
        WireRequest::Package(_) => panic!("expected the flat call"),
    }
}

#[test]
fn test_options_flow_through_to_the_wire() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider, directory.clone());

    let request = test_request().with_options(ProvisionOptions {
        reuse_account: false,
        extra_flags: 0x400,
    });
    orchestrator
        .join_domain(&test_credential(), &request)
        .expect("join should succeed");

    match &directory.calls()[0] {
        WireRequest::Flat(call) => {
            // Reuse disabled drops its bit; extra bits pass unchanged.
            assert_eq!(call.options, 0x400);
        }
        WireRequest::Package(_) => panic!("expected the flat call"),
    }
}

#[test]
fn test_structured_join_uses_package_call() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(
        ScriptedDirectory::succeeding(TEST_BLOB).verifying_identity(provider.clone()),
    );
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let request = ProvisioningRequest::new(TEST_DOMAIN, TEST_MACHINE)
        .with_ou(TEST_OU)
        .with_structured(StructuredOptions {
            site_name: Some("Default-First-Site-Name".to_string()),
            cert_templates: vec!["Machine".to_string()],
            ..Default::default()
        });

    let result = orchestrator
        .join_domain(&test_credential(), &request)
        .expect("structured join should succeed");
    assert_eq!(result.blob, TEST_BLOB);

    let calls = directory.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        WireRequest::Package(params) => {
            // A site name is a version-2 field, so the aggregate version
            // must be raised.
            assert_eq!(params.version, PACKAGE_VERSION_2);
            assert_eq!(params.domain, TEST_DOMAIN);
            assert_eq!(params.host_name, TEST_MACHINE);
            assert_eq!(params.machine_account_ou.as_deref(), Some(TEST_OU));
            assert_eq!(params.site_name.as_deref(), Some("Default-First-Site-Name"));
            assert_eq!(params.cert_templates, vec!["Machine".to_string()]);
            assert_eq!(params.options, PROVISION_REUSE_ACCOUNT);
        }
        WireRequest::Flat(_) => panic!("expected the package call"),
    }
    assert_eq!(provider.open_handles(), 0);
}
