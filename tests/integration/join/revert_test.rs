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

//! Integration tests for revert-failure handling
//!
//! A failed identity restore is reported as a warning, not a join
//! failure: the provisioning outcome stands and every token is still
//! released.

use std::sync::Arc;

use crate::integration::{
    Op, RecordingTokenProvider, ScriptedDirectory, TEST_BLOB, test_credential, test_request,
};
use usg_djoin_client::{DjoinError, JoinOrchestrator};

#[test]
fn test_failed_revert_does_not_fail_a_successful_join() {
    let provider = Arc::new(RecordingTokenProvider::new().fail_revert());
    let directory = Arc::new(ScriptedDirectory::succeeding(TEST_BLOB));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let result = orchestrator
        .join_domain(&test_credential(), &test_request())
        .expect("join should succeed despite the failed revert");

    assert_eq!(result.blob, TEST_BLOB);

    // The revert was attempted and both tokens still came back.
    let ops = provider.ops();
    assert_eq!(
        ops[3..],
        [
            Op::Revert,
            Op::Release { token: 102 },
            Op::Release { token: 101 },
        ]
    );
    assert_eq!(provider.open_handles(), 0);

    // The double keeps the stuck identity mark, proving the failure was
    // real rather than skipped.
    assert!(provider.any_impersonating());
}

#[test]
fn test_failed_revert_does_not_mask_a_provisioning_failure() {
    let provider = Arc::new(RecordingTokenProvider::new().fail_revert());
    let directory = Arc::new(ScriptedDirectory::failing(5));
    let orchestrator = JoinOrchestrator::new(provider.clone(), directory.clone());

    let err = orchestrator
        .join_domain(&test_credential(), &test_request())
        .unwrap_err();

    // The provisioning rejection is the reported failure; the revert
    // problem stays a warning.
    assert!(matches!(err, DjoinError::Provisioning { status: 5 }));
    assert!(provider.ops().contains(&Op::Revert));
    assert_eq!(provider.open_handles(), 0);
}
