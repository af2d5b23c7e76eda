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

//! Domain-join configuration structures.
//!
//! This module defines the TOML configuration schema for unattended
//! domain-join provisioning, so one config file can be deployed
//! fleet-wide with per-machine values filled in by variable expansion
//! (for example `machine = "${COMPUTERNAME}"`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::credential::{Credential, CredentialSource, QualifiedAccount};
use crate::error::{DjoinError, Result};
use crate::expand::expand_variables;
use crate::request::{ProvisionOptions, ProvisioningRequest, StructuredOptions};

/// Complete domain-join configuration.
///
/// This struct represents the full TOML configuration file structure
/// for unattended machine-account provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    /// Join credential configuration.
    #[serde(default)]
    pub credential: Option<CredentialConfig>,

    /// Join target configuration.
    pub join: TargetConfig,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

impl JoinConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or missing required fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| DjoinError::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DjoinError::config(format!("TOML serialize: {e}")))
    }

    /// Expand all variable references in the configuration.
    ///
    /// Variables like `${COMPUTERNAME}` and `${USERDNSDOMAIN}` are
    /// replaced with their actual values from the environment or the
    /// machine identity.
    pub fn expand_variables(&mut self) -> Result<()> {
        if let Some(ref mut credential) = self.credential {
            credential.username = expand_variables(&credential.username)?;
        }

        self.join.domain = expand_variables(&self.join.domain)?;
        if let Some(ref mut machine) = self.join.machine {
            *machine = expand_variables(machine)?;
        }
        if let Some(ref mut ou) = self.join.ou {
            *ou = expand_variables(ou)?;
        }
        if let Some(ref mut dc) = self.join.dc {
            *dc = expand_variables(dc)?;
        }

        if let Some(ref mut structured) = self.join.structured {
            if let Some(ref mut name) = structured.netbios_name {
                *name = expand_variables(name)?;
            }
            if let Some(ref mut site) = structured.site_name {
                *site = expand_variables(site)?;
            }
            if let Some(ref mut dns) = structured.primary_dns_domain {
                *dns = expand_variables(dns)?;
            }
            structured.machine_policy_paths = structured
                .machine_policy_paths
                .iter()
                .map(|s| expand_variables(s))
                .collect::<Result<Vec<_>>>()?;
        }

        if let Some(ref mut path) = self.output.path {
            let expanded = expand_variables(&path.to_string_lossy())?;
            *path = PathBuf::from(expanded);
        }

        Ok(())
    }

    /// Validate the configuration for completeness and consistency.
    ///
    /// # Errors
    ///
    /// Returns an error describing any validation failures.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(ref credential) = self.credential {
            if credential.username.is_empty() {
                errors.push("credential.username is required".to_string());
            } else if let Err(err) = QualifiedAccount::parse(&credential.username) {
                errors.push(format!("credential.username: {err}"));
            }
            if credential.password_source.is_empty() {
                errors.push("credential.password_source is required".to_string());
            }
        }

        if self.join.domain.is_empty() {
            errors.push("join.domain is required".to_string());
        }
        if let Some(ref machine) = self.join.machine {
            if machine.trim().is_empty() {
                errors.push("join.machine must not be blank when set".to_string());
            }
        }
        if self.join.shape == ShapeConfig::Simple && self.join.structured.is_some() {
            errors.push("join.structured is only used when join.shape is 'structured'".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DjoinError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Convert to a provisioning request.
    ///
    /// The machine name must be present by this point; callers resolve
    /// the local-computer-name default before converting. Empty-string
    /// optional fields are treated as absent.
    pub fn to_request(&self) -> Result<ProvisioningRequest> {
        let machine = self
            .join
            .machine
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                DjoinError::config("join.machine is not set and could not be determined")
            })?;

        let mut request = ProvisioningRequest::new(&self.join.domain, machine);
        if let Some(ou) = nonempty(&self.join.ou) {
            request = request.with_ou(ou);
        }
        if let Some(dc) = nonempty(&self.join.dc) {
            request = request.with_dc(dc);
        }
        request = request.with_options(ProvisionOptions {
            reuse_account: self.join.reuse_existing_account,
            extra_flags: self.join.extra_option_flags,
        });

        if self.join.shape == ShapeConfig::Structured {
            let structured = self.join.structured.clone().unwrap_or_default();
            request = request.with_structured(StructuredOptions {
                netbios_name: nonempty_owned(structured.netbios_name),
                site_name: nonempty_owned(structured.site_name),
                primary_dns_domain: nonempty_owned(structured.primary_dns_domain),
                cert_templates: structured.cert_templates,
                machine_policy_names: structured.machine_policy_names,
                machine_policy_paths: structured.machine_policy_paths,
            });
        }

        Ok(request)
    }
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn nonempty_owned(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Join credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    /// Domain-qualified username (`DOMAIN\account`).
    /// Supports variable expansion (e.g., "${USERDOMAIN}\\svc-join").
    pub username: String,

    /// Password source: "env:VAR_NAME", "file:/path/to/file", or a raw
    /// value (not recommended).
    pub password_source: String,
}

impl CredentialConfig {
    /// Resolve this section into a usable credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the password source cannot be resolved.
    pub fn resolve(&self) -> Result<Credential> {
        let source = CredentialSource::parse(&self.password_source);
        if !source.is_secure() {
            tracing::warn!(
                "credential.password_source is a raw value; prefer env: or file: sources"
            );
        }
        let password = source.resolve()?;
        Ok(Credential::new(self.username.clone(), password))
    }
}

/// Join target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// DNS name of the domain to join.
    pub domain: String,

    /// Short (NetBIOS) name of the machine to provision.
    /// Defaults to the local computer name when omitted.
    #[serde(default)]
    pub machine: Option<String>,

    /// OU distinguished-name path for the machine account.
    #[serde(default)]
    pub ou: Option<String>,

    /// Specific domain controller to provision against.
    #[serde(default)]
    pub dc: Option<String>,

    /// Reuse an existing machine account instead of failing on conflict.
    #[serde(default = "default_true")]
    pub reuse_existing_account: bool,

    /// Additional documented option bits, passed through unchanged.
    #[serde(default)]
    pub extra_option_flags: u32,

    /// Wire shape: "simple" or "structured".
    #[serde(default)]
    pub shape: ShapeConfig,

    /// Extra fields for the structured shape.
    #[serde(default)]
    pub structured: Option<StructuredConfig>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            machine: None,
            ou: None,
            dc: None,
            reuse_existing_account: true,
            extra_option_flags: 0,
            shape: ShapeConfig::default(),
            structured: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Wire shape selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShapeConfig {
    /// Flat single-call form.
    #[default]
    Simple,

    /// Structured aggregate form.
    Structured,
}

/// Extra fields for the structured shape. All optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StructuredConfig {
    /// Alternate NetBIOS name for the machine account.
    #[serde(default)]
    pub netbios_name: Option<String>,

    /// Directory site the machine should be associated with.
    #[serde(default)]
    pub site_name: Option<String>,

    /// Primary DNS domain to register under.
    #[serde(default)]
    pub primary_dns_domain: Option<String>,

    /// Certificate template names to include in the package.
    #[serde(default)]
    pub cert_templates: Vec<String>,

    /// Machine policy names to include in the package.
    #[serde(default)]
    pub machine_policy_names: Vec<String>,

    /// Machine policy registry-file paths to include in the package.
    #[serde(default)]
    pub machine_policy_paths: Vec<String>,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Write the provisioning blob to this file instead of stdout.
    /// Supports variable expansion.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Output format for stdout.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for the provisioning result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Print the blob alone.
    #[default]
    Text,

    /// Print a JSON envelope with status, machine, domain, and blob.
    Json,
}
