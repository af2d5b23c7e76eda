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

//! # usg-djoin-client
//!
//! Unattended domain-join provisioning client for USG Windows fleets.
//!
//! This crate drives the machine-account provisioning sequence used when a
//! computer is joined to an Active Directory domain without an interactive
//! logon: authenticate a join credential against the domain, switch the
//! calling thread to that identity, ask the directory to provision (or
//! reuse) the machine account, and hand back the resulting provisioning
//! text for offline-join consumption. The thread identity is restored and
//! every token handle is released on all exit paths, success or failure.
//!
//! ## Features
//!
//! - **Credential sessions**: network-credential logon producing an
//!   impersonation-capable token, released deterministically
//! - **Scoped impersonation**: thread identity switch that is always
//!   reverted, even when provisioning fails
//! - **Flat and structured provisioning**: plain account provisioning or a
//!   full provisioning package with site, policy, and DNS parameters
//! - **Account reuse**: rejoin an existing machine account instead of
//!   failing on a name collision
//! - **TOML configuration**: fleet-deployable config files with
//!   `${COMPUTERNAME}`-style variable expansion
//! - **Event Log integration**: audit records for identity switches and
//!   provisioning outcomes
//! - **Testable seams**: token acquisition and directory calls sit behind
//!   traits, so the full join sequence runs under test doubles on any
//!   platform
//!
//! ## Quick Start
//!
//! ```no_run
//! use usg_djoin_client::{Credential, JoinOrchestrator, ProvisioningRequest, SecureString};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credential = Credential::new(
//!         "CONTOSO\\svc-join",
//!         SecureString::new(std::env::var("DJOIN_PASSWORD")?),
//!     );
//!
//!     let request = ProvisioningRequest::new("contoso.com", "NODE01")
//!         .with_ou("OU=Servers,DC=contoso,DC=com");
//!
//!     let orchestrator = JoinOrchestrator::with_platform_defaults();
//!     let result = orchestrator.join_domain(&credential, &request)?;
//!     println!("{}", result.blob);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Deployments normally load the request from a TOML file instead of
//! building it in code:
//!
//! ```no_run
//! use usg_djoin_client::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let request = config.to_request()?;
//! # Ok(())
//! # }
//! ```
//!
//! See [`loader::write_default_config`] for the documented template.
//!
//! ## Platform Behavior
//!
//! The crate compiles on every platform. The Win32-backed implementations
//! in [`windows`] perform the real token and provisioning calls on Windows
//! and return [`DjoinError::Platform`] at runtime elsewhere; the
//! orchestration, configuration, and request layers are platform-neutral
//! and fully exercised under test doubles.
//!
//! ## Security
//!
//! Join passwords live in [`SecureString`], which zeroes its contents on
//! drop, has no `Debug` or `Display` form, and never appears in logs or
//! Event Log records. The join credential confers rights in the domain,
//! not local elevation: only the provisioning call runs under the
//! impersonated identity.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod credential;
pub mod error;
pub mod expand;
pub mod impersonation;
pub mod loader;
pub mod orchestrator;
pub mod provisioning;
pub mod request;
pub mod session;
pub mod windows;

// Re-export main types at crate root for convenience
pub use config::{
    CredentialConfig, JoinConfig, OutputConfig, OutputFormat, ShapeConfig, StructuredConfig,
    TargetConfig,
};
pub use credential::{Credential, CredentialSource, QualifiedAccount, SecureString};
pub use error::{DjoinError, Result};
pub use impersonation::{ActiveImpersonation, ImpersonationScope};
pub use loader::ConfigLoader;
pub use orchestrator::JoinOrchestrator;
pub use provisioning::{DirectoryService, ProvisioningClient, ServiceReply};
pub use request::{
    FlatCall, PackageParams, ProvisionOptions, ProvisioningRequest, ProvisioningResult,
    RequestShape, StructuredOptions, WireRequest,
};
pub use session::{CredentialSession, RawToken, TokenProvider};
pub use windows::MachineIdentity;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
