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

//! Provisioning request model.
//!
//! One request type covers both wire shapes of the directory provisioning
//! call: the flat single-call form (domain, machine, OU, DC, options) and
//! the structured aggregate form that additionally carries NetBIOS/site/
//! DNS overrides, certificate templates, and machine policy references.
//! The shape is a tagged variant on [`ProvisioningRequest`]; mapping a
//! request onto either wire form is a pure data transform with no OS
//! involvement, so the mappings are unit-testable on any platform.

use serde::Serialize;

use crate::error::{DjoinError, Result};

/// Account-reuse bit in the provisioning options bitmask.
///
/// Documented by the directory service as "reuse an existing machine
/// account". Passed through opaquely; the service decides what reuse
/// means for an existing account's attributes.
pub const PROVISION_REUSE_ACCOUNT: u32 = 0x0000_0002;

/// Options bitmask for the provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Reuse an existing machine account instead of failing on conflict.
    pub reuse_account: bool,
    /// Additional documented option bits, passed through unchanged.
    pub extra_flags: u32,
}

impl ProvisionOptions {
    /// Combine the named options and raw bits into the wire bitmask.
    pub fn flags(&self) -> u32 {
        let mut flags = self.extra_flags;
        if self.reuse_account {
            flags |= PROVISION_REUSE_ACCOUNT;
        }
        flags
    }
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            // Unattended re-imaging re-provisions the same machine name,
            // so reuse is the safe default for fleet deployment.
            reuse_account: true,
            extra_flags: 0,
        }
    }
}

/// Extra fields available only on the structured request shape.
///
/// All fields are optional; an empty value means "let the directory
/// service decide". The NetBIOS/site/DNS overrides require the version-2
/// aggregate; see [`PackageParams::version`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredOptions {
    /// Alternate NetBIOS name for the machine account.
    pub netbios_name: Option<String>,
    /// Directory site the machine should be associated with.
    pub site_name: Option<String>,
    /// Primary DNS domain to register under.
    pub primary_dns_domain: Option<String>,
    /// Certificate template names to include in the package.
    pub cert_templates: Vec<String>,
    /// Machine policy names to include in the package.
    pub machine_policy_names: Vec<String>,
    /// Machine policy registry-file paths to include in the package.
    pub machine_policy_paths: Vec<String>,
}

impl StructuredOptions {
    /// True when any version-2 aggregate field is populated.
    fn uses_v2_fields(&self) -> bool {
        self.netbios_name.is_some()
            || self.site_name.is_some()
            || self.primary_dns_domain.is_some()
    }
}

/// Which wire shape the provisioning call uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestShape {
    /// Flat single-call form. Sufficient for plain account provisioning.
    #[default]
    Simple,
    /// Structured aggregate form with the extra package fields.
    Structured(StructuredOptions),
}

/// A machine-account provisioning request.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    /// DNS name of the domain to join.
    pub domain: String,
    /// Short (NetBIOS) name of the machine being provisioned.
    pub machine_name: String,
    /// Distinguished-name path of the OU to create the account under.
    pub machine_account_ou: Option<String>,
    /// Specific domain controller to provision against.
    pub dc_name: Option<String>,
    /// Options bitmask.
    pub options: ProvisionOptions,
    /// Wire shape to use.
    pub shape: RequestShape,
}

impl ProvisioningRequest {
    /// Create a request for a domain and machine name with defaults for
    /// everything else (no OU, no DC hint, reuse enabled, simple shape).
    pub fn new(domain: impl Into<String>, machine_name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            machine_name: machine_name.into(),
            machine_account_ou: None,
            dc_name: None,
            options: ProvisionOptions::default(),
            shape: RequestShape::default(),
        }
    }

    /// Set the OU distinguished-name path.
    pub fn with_ou(mut self, ou: impl Into<String>) -> Self {
        self.machine_account_ou = Some(ou.into());
        self
    }

    /// Set the domain controller hint.
    pub fn with_dc(mut self, dc: impl Into<String>) -> Self {
        self.dc_name = Some(dc.into());
        self
    }

    /// Set the options bitmask.
    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    /// Switch to the structured shape with the given extra fields.
    pub fn with_structured(mut self, structured: StructuredOptions) -> Self {
        self.shape = RequestShape::Structured(structured);
        self
    }

    /// Validate the request fields that must be present for any shape.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(DjoinError::config("join domain must not be empty"));
        }
        if self.machine_name.trim().is_empty() {
            return Err(DjoinError::config("machine name must not be empty"));
        }
        Ok(())
    }

    /// Map the request onto its wire form.
    pub fn to_wire(&self) -> WireRequest {
        match &self.shape {
            RequestShape::Simple => WireRequest::Flat(FlatCall {
                domain: self.domain.clone(),
                machine_name: self.machine_name.clone(),
                machine_account_ou: self.machine_account_ou.clone(),
                dc_name: self.dc_name.clone(),
                options: self.options.flags(),
            }),
            RequestShape::Structured(structured) => {
                let version = if structured.uses_v2_fields() {
                    PACKAGE_VERSION_2
                } else {
                    PACKAGE_VERSION_1
                };
                WireRequest::Package(PackageParams {
                    version,
                    domain: self.domain.clone(),
                    host_name: self.machine_name.clone(),
                    machine_account_ou: self.machine_account_ou.clone(),
                    dc_name: self.dc_name.clone(),
                    options: self.options.flags(),
                    cert_templates: structured.cert_templates.clone(),
                    machine_policy_names: structured.machine_policy_names.clone(),
                    machine_policy_paths: structured.machine_policy_paths.clone(),
                    netbios_name: structured.netbios_name.clone(),
                    site_name: structured.site_name.clone(),
                    primary_dns_domain: structured.primary_dns_domain.clone(),
                })
            }
        }
    }
}

/// Version-1 aggregate: base fields only.
pub const PACKAGE_VERSION_1: u32 = 1;
/// Version-2 aggregate: adds NetBIOS name, site name, and primary DNS
/// domain. The service ignores those fields unless this version is set.
pub const PACKAGE_VERSION_2: u32 = 2;

/// The flat single-call wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCall {
    /// DNS name of the domain to join.
    pub domain: String,
    /// Short (NetBIOS) name of the machine being provisioned.
    pub machine_name: String,
    /// OU distinguished-name path, if any.
    pub machine_account_ou: Option<String>,
    /// Domain controller hint, if any.
    pub dc_name: Option<String>,
    /// Options bitmask.
    pub options: u32,
}

/// The structured aggregate wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageParams {
    /// Aggregate version; selected from field presence, never hardcoded.
    pub version: u32,
    /// DNS name of the domain to join.
    pub domain: String,
    /// Short (NetBIOS) name of the machine being provisioned.
    pub host_name: String,
    /// OU distinguished-name path, if any.
    pub machine_account_ou: Option<String>,
    /// Domain controller hint, if any.
    pub dc_name: Option<String>,
    /// Options bitmask.
    pub options: u32,
    /// Certificate template names.
    pub cert_templates: Vec<String>,
    /// Machine policy names.
    pub machine_policy_names: Vec<String>,
    /// Machine policy registry-file paths.
    pub machine_policy_paths: Vec<String>,
    /// Alternate NetBIOS name (version 2).
    pub netbios_name: Option<String>,
    /// Directory site name (version 2).
    pub site_name: Option<String>,
    /// Primary DNS domain (version 2).
    pub primary_dns_domain: Option<String>,
}

/// A request mapped onto one of the two wire entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireRequest {
    /// Route through the flat provisioning call.
    Flat(FlatCall),
    /// Route through the package-creation call.
    Package(PackageParams),
}

/// Outcome of a provisioning call.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningResult {
    /// Status code returned by the directory service (0 on success).
    pub status: u32,
    /// Opaque provisioning blob, consumable by a later offline join.
    pub blob: String,
}

impl ProvisioningResult {
    /// True when the directory service reported success.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}
