//! Integration test utilities and helpers
//!
//! This module provides the in-process doubles for the join-sequence
//! integration tests: a recording token provider with injectable
//! failures and a scripted directory service, plus the standard
//! credential and request values the scenarios share.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use usg_djoin_client::credential::QualifiedAccount;
use usg_djoin_client::error::{DjoinError, Result};
use usg_djoin_client::provisioning::{DirectoryService, ServiceReply};
use usg_djoin_client::request::{FlatCall, PackageParams, WireRequest};
use usg_djoin_client::session::{RawToken, TokenProvider};
use usg_djoin_client::{Credential, ProvisioningRequest, SecureString};

/// Join-credential and target values shared by the scenarios.
pub const TEST_ACCOUNT: &str = "CONTOSO\\svc-join";
pub const TEST_PASSWORD: &str = "P@ssw0rd";
pub const TEST_DOMAIN: &str = "contoso.com";
pub const TEST_MACHINE: &str = "NODE01";
pub const TEST_OU: &str = "OU=Servers,DC=contoso,DC=com";
pub const TEST_DC: &str = "dc1.contoso.com";
pub const TEST_BLOB: &str = "b64:ODJ-PROVISIONING-DATA";

/// The standard join credential used by the scenarios.
pub fn test_credential() -> Credential {
    Credential::new(TEST_ACCOUNT, SecureString::from(TEST_PASSWORD))
}

/// The standard flat provisioning request used by the scenarios.
pub fn test_request() -> ProvisioningRequest {
    ProvisioningRequest::new(TEST_DOMAIN, TEST_MACHINE)
        .with_ou(TEST_OU)
        .with_dc(TEST_DC)
}

/// One recorded identity-subsystem call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Logon {
        account: String,
        domain: String,
        password: String,
    },
    Duplicate {
        source: isize,
    },
    Impersonate {
        token: isize,
    },
    Revert,
    Release {
        token: isize,
    },
}

#[derive(Default)]
struct ProviderState {
    ops: Vec<Op>,
    next_handle: isize,
    open_handles: HashSet<isize>,
    active: HashMap<ThreadId, isize>,
}

impl ProviderState {
    fn alloc(&mut self) -> isize {
        self.next_handle += 1;
        let handle = 100 + self.next_handle;
        self.open_handles.insert(handle);
        handle
    }
}

/// Recording token provider with injectable failures.
///
/// Records every call in order, tracks which handles are open and which
/// thread is currently impersonating, and panics on protocol misuse
/// (double release, impersonating an unknown handle) so a sequencing
/// bug fails the test at the point of misuse.
#[derive(Default)]
pub struct RecordingTokenProvider {
    state: Mutex<ProviderState>,
    fail_logon: Option<u32>,
    fail_duplicate: Option<u32>,
    fail_impersonate: Option<u32>,
    fail_revert: bool,
}

impl RecordingTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the logon call with the given platform error code.
    pub fn fail_logon(mut self, code: u32) -> Self {
        self.fail_logon = Some(code);
        self
    }

    /// Reject the duplication call with the given platform error code.
    pub fn fail_duplicate(mut self, code: u32) -> Self {
        self.fail_duplicate = Some(code);
        self
    }

    /// Reject the impersonation call with the given platform error code.
    pub fn fail_impersonate(mut self, code: u32) -> Self {
        self.fail_impersonate = Some(code);
        self
    }

    /// Make the revert call fail, leaving the thread marked as
    /// impersonating.
    pub fn fail_revert(mut self) -> Self {
        self.fail_revert = true;
        self
    }

    /// Every call recorded so far, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Number of handles issued but not yet released.
    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles.len()
    }

    /// Whether the calling thread is currently impersonating.
    pub fn is_impersonating(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .active
            .contains_key(&std::thread::current().id())
    }

    /// Whether any thread is currently impersonating.
    pub fn any_impersonating(&self) -> bool {
        !self.state.lock().unwrap().active.is_empty()
    }
}

impl TokenProvider for RecordingTokenProvider {
    fn logon(&self, account: &QualifiedAccount, password: &SecureString) -> Result<RawToken> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Logon {
            account: account.account.clone(),
            domain: account.domain.clone(),
            password: password.expose().to_string(),
        });
        if let Some(code) = self.fail_logon {
            return Err(DjoinError::authentication(account.to_string(), code));
        }
        Ok(RawToken::from_raw(state.alloc()))
    }

    fn duplicate(&self, token: RawToken) -> Result<RawToken> {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.open_handles.contains(&token.as_raw()),
            "duplicate of a handle that is not open: {}",
            token.as_raw()
        );
        state.ops.push(Op::Duplicate {
            source: token.as_raw(),
        });
        if let Some(code) = self.fail_duplicate {
            return Err(DjoinError::token_duplication(code));
        }
        Ok(RawToken::from_raw(state.alloc()))
    }

    fn impersonate(&self, token: RawToken) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.open_handles.contains(&token.as_raw()),
            "impersonation with a handle that is not open: {}",
            token.as_raw()
        );
        state.ops.push(Op::Impersonate {
            token: token.as_raw(),
        });
        if let Some(code) = self.fail_impersonate {
            return Err(DjoinError::impersonation(code));
        }
        let thread = std::thread::current().id();
        let previous = state.active.insert(thread, token.as_raw());
        assert!(previous.is_none(), "thread was already impersonating");
        Ok(())
    }

    fn revert(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Revert);
        if self.fail_revert {
            return Err(DjoinError::platform("RevertToSelf: Windows error 0x000005B4"));
        }
        let thread = std::thread::current().id();
        assert!(
            state.active.remove(&thread).is_some(),
            "revert without active impersonation"
        );
        Ok(())
    }

    fn release(&self, token: RawToken) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.open_handles.remove(&token.as_raw()),
            "release of a handle that is not open: {}",
            token.as_raw()
        );
        state.ops.push(Op::Release {
            token: token.as_raw(),
        });
    }
}

/// Directory service double returning a scripted reply.
///
/// Records every wire call; when linked to a [`RecordingTokenProvider`]
/// it also asserts each call arrives while the calling thread is
/// impersonating.
pub struct ScriptedDirectory {
    reply_status: u32,
    blob: String,
    calls: Mutex<Vec<WireRequest>>,
    identity: Option<Arc<RecordingTokenProvider>>,
}

impl ScriptedDirectory {
    /// Reply to every call with status 0 and the given blob.
    pub fn succeeding(blob: &str) -> Self {
        Self {
            reply_status: 0,
            blob: blob.to_string(),
            calls: Mutex::new(Vec::new()),
            identity: None,
        }
    }

    /// Reply to every call with the given non-zero status and no blob.
    pub fn failing(status: u32) -> Self {
        Self {
            reply_status: status,
            blob: String::new(),
            calls: Mutex::new(Vec::new()),
            identity: None,
        }
    }

    /// Assert every wire call arrives under thread impersonation on the
    /// given provider.
    pub fn verifying_identity(mut self, provider: Arc<RecordingTokenProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    /// Every wire call recorded so far, in order.
    pub fn calls(&self) -> Vec<WireRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn reply(&self) -> ServiceReply {
        ServiceReply {
            status: self.reply_status,
            blob: self.blob.clone(),
        }
    }

    fn check_identity(&self) {
        if let Some(ref provider) = self.identity {
            assert!(
                provider.is_impersonating(),
                "directory call arrived without thread impersonation"
            );
        }
    }
}

impl DirectoryService for ScriptedDirectory {
    fn provision_account(&self, call: &FlatCall) -> Result<ServiceReply> {
        self.check_identity();
        self.calls.lock().unwrap().push(WireRequest::Flat(call.clone()));
        Ok(self.reply())
    }

    fn create_provisioning_package(&self, params: &PackageParams) -> Result<ServiceReply> {
        self.check_identity();
        self.calls
            .lock()
            .unwrap()
            .push(WireRequest::Package(params.clone()));
        Ok(self.reply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tracks_handles_and_ops() {
        let provider = RecordingTokenProvider::new();
        let account = QualifiedAccount::parse(TEST_ACCOUNT).unwrap();

        let token = provider.logon(&account, &SecureString::from(TEST_PASSWORD)).unwrap();
        let dup = provider.duplicate(token).unwrap();
        assert_eq!(provider.open_handles(), 2);

        provider.release(dup);
        provider.release(token);
        assert_eq!(provider.open_handles(), 0);
        assert_eq!(provider.ops().len(), 4);
    }

    #[test]
    fn test_scripted_directory_replies() {
        let directory = ScriptedDirectory::succeeding(TEST_BLOB);
        let call = FlatCall {
            domain: TEST_DOMAIN.to_string(),
            machine_name: TEST_MACHINE.to_string(),
            machine_account_ou: None,
            dc_name: None,
            options: 0x2,
        };

        let reply = directory.provision_account(&call).unwrap();
        assert_eq!(reply.status, 0);
        assert_eq!(reply.blob, TEST_BLOB);
        assert_eq!(directory.calls(), vec![WireRequest::Flat(call)]);
    }
}
