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

//! Integration tests for concurrent joins
//!
//! Impersonation is a per-thread property, so one shared orchestrator
//! must support joins running on separate threads with independent
//! sessions and no cross-thread interference.

use std::sync::{Arc, Barrier};

use crate::integration::{
    Op, RecordingTokenProvider, ScriptedDirectory, TEST_BLOB, TEST_DOMAIN, test_credential,
};
use usg_djoin_client::{JoinOrchestrator, ProvisioningRequest, WireRequest};

#[test]
fn test_concurrent_joins_use_independent_sessions() {
    let provider = Arc::new(RecordingTokenProvider::new());
    let directory = Arc::new(
        ScriptedDirectory::succeeding(TEST_BLOB).verifying_identity(provider.clone()),
    );
    let orchestrator = Arc::new(JoinOrchestrator::new(provider.clone(), directory.clone()));

    let barrier = Arc::new(Barrier::new(2));
    let mut workers = Vec::new();
    for machine in ["NODE01", "NODE02"] {
        let orchestrator = Arc::clone(&orchestrator);
        let barrier = Arc::clone(&barrier);
        workers.push(std::thread::spawn(move || {
            let request = ProvisioningRequest::new(TEST_DOMAIN, machine);
            barrier.wait();
            orchestrator.join_domain(&test_credential(), &request)
        }));
    }

    for worker in workers {
        let result = worker
            .join()
            .expect("worker thread panicked")
            .expect("concurrent join should succeed");
        assert_eq!(result.blob, TEST_BLOB);
    }

    // Two full sequences ran: every step twice, every handle returned,
    // no thread left impersonating.
    let ops = provider.ops();
    let count = |pred: fn(&Op) -> bool| ops.iter().filter(|op| pred(op)).count();
    assert_eq!(count(|op| matches!(op, Op::Logon { .. })), 2);
    assert_eq!(count(|op| matches!(op, Op::Duplicate { .. })), 2);
    assert_eq!(count(|op| matches!(op, Op::Impersonate { .. })), 2);
    assert_eq!(count(|op| matches!(op, Op::Revert)), 2);
    assert_eq!(count(|op| matches!(op, Op::Release { .. })), 4);
    assert_eq!(provider.open_handles(), 0);
    assert!(!provider.any_impersonating());

    // Both machines were provisioned, whichever order the threads ran.
    let mut machines: Vec<String> = directory
        .calls()
        .iter()
        .map(|call| match call {
            WireRequest::Flat(flat) => flat.machine_name.clone(),
            WireRequest::Package(params) => params.host_name.clone(),
        })
        .collect();
    machines.sort();
    assert_eq!(machines, vec!["NODE01".to_string(), "NODE02".to_string()]);
}
