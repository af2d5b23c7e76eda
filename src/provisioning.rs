//! Directory provisioning client.
//!
//! This module provides the `ProvisioningClient` for issuing the
//! machine-account provisioning call against a directory service while
//! thread impersonation is active, and the [`DirectoryService`] seam the
//! client routes through. The production implementation is
//! [`Win32DirectoryService`](crate::windows::Win32DirectoryService);
//! tests substitute an in-process implementation.

use std::sync::Arc;

use tracing::debug;

use crate::error::{DjoinError, Result};
use crate::impersonation::ActiveImpersonation;
use crate::request::{
    FlatCall, PackageParams, ProvisioningRequest, ProvisioningResult, WireRequest,
};

/// Raw reply from a directory-service wire call.
///
/// `status` is the service's own result code (0 means success); `blob`
/// is the provisioning data, meaningful only when the status is 0.
#[derive(Debug, Clone)]
pub struct ServiceReply {
    /// Service-reported status code.
    pub status: u32,
    /// Provisioning data returned by the service.
    pub blob: String,
}

/// The two wire entry points of the directory provisioning service.
///
/// Implementations return `Err` only for local failures (marshalling,
/// platform support); a service-side rejection is an `Ok` reply with a
/// non-zero status, which the client classifies.
pub trait DirectoryService: Send + Sync {
    /// Provision a machine account through the flat single-call form.
    fn provision_account(&self, call: &FlatCall) -> Result<ServiceReply>;

    /// Provision through the structured package-creation form.
    fn create_provisioning_package(&self, params: &PackageParams) -> Result<ServiceReply>;
}

/// Client for the directory provisioning operation.
///
/// One client may serve many requests; it holds no per-request state.
pub struct ProvisioningClient {
    service: Arc<dyn DirectoryService>,
}

impl ProvisioningClient {
    /// Create a client over a directory service implementation.
    pub fn new(service: Arc<dyn DirectoryService>) -> Self {
        Self { service }
    }

    /// Issue one provisioning call under an impersonated identity.
    ///
    /// The `_identity` guard is compile-time proof that the calling
    /// thread is impersonating; it is not otherwise used. The request is
    /// mapped onto its wire form, sent once (provisioning is not safe to
    /// blind-retry), and the reply classified: a non-zero status fails
    /// with [`DjoinError::Provisioning`] and the reply's blob is
    /// discarded as undefined.
    pub fn provision(
        &self,
        _identity: &ActiveImpersonation<'_>,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningResult> {
        request.validate()?;

        let reply = match request.to_wire() {
            WireRequest::Flat(call) => {
                debug!(
                    domain = %call.domain,
                    machine = %call.machine_name,
                    options = format_args!("{:#x}", call.options),
                    "provisioning machine account"
                );
                self.service.provision_account(&call)?
            }
            WireRequest::Package(params) => {
                debug!(
                    domain = %params.domain,
                    machine = %params.host_name,
                    version = params.version,
                    options = format_args!("{:#x}", params.options),
                    "creating provisioning package"
                );
                self.service.create_provisioning_package(&params)?
            }
        };

        if reply.status != 0 {
            return Err(DjoinError::provisioning(reply.status));
        }
        if reply.blob.is_empty() {
            return Err(DjoinError::platform(
                "directory service reported success but returned an empty provisioning blob",
            ));
        }

        Ok(ProvisioningResult {
            status: reply.status,
            blob: reply.blob,
        })
    }
}
