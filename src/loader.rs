// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Configuration file discovery and loading.
//!
//! This module handles finding and loading join configuration files from
//! standard locations with proper precedence rules.

use std::path::{Path, PathBuf};

use crate::config::JoinConfig;
use crate::error::{DjoinError, Result};

/// Configuration file loader with discovery and precedence rules.
///
/// # Search Order
///
/// Configuration files are searched in the following order (first found wins):
///
/// 1. Explicit path (if set via `with_path()`)
/// 2. Environment variable `DJOIN_CONFIG_PATH`
/// 3. Windows: `%PROGRAMDATA%\Department of War\DomainJoin\config.toml`
/// 4. Unix: `/etc/djoin/config.toml`
/// 5. Current directory: `./djoin-config.toml`, `./config.toml`
///
/// There is no per-user search path; join provisioning runs in a machine
/// context, not a user one.
///
/// # Example
///
/// ```no_run
/// use usg_djoin_client::loader::ConfigLoader;
///
/// // Load from default locations
/// let config = ConfigLoader::new().load().unwrap();
///
/// // Load from a specific path
/// let config = ConfigLoader::new()
///     .with_path("/custom/path/config.toml")
///     .load()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Explicit configuration file path.
    explicit_path: Option<PathBuf>,

    /// Whether to expand variables after loading.
    expand_variables: bool,

    /// Whether to validate after loading.
    validate: bool,

    /// Environment variable name for config path override.
    env_var_name: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            explicit_path: None,
            expand_variables: true,
            validate: true,
            env_var_name: "DJOIN_CONFIG_PATH".to_string(),
        }
    }

    /// Set an explicit configuration file path.
    ///
    /// When set, only this path will be checked (no discovery).
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable variable expansion.
    ///
    /// Default: `true`
    pub fn with_expand_variables(mut self, expand: bool) -> Self {
        self.expand_variables = expand;
        self
    }

    /// Enable or disable validation after loading.
    ///
    /// Default: `true`
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Set the environment variable name for path override.
    ///
    /// Default: `DJOIN_CONFIG_PATH`
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Load the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No configuration file is found
    /// - The file cannot be read
    /// - The TOML is invalid
    /// - Validation fails (if enabled)
    pub fn load(&self) -> Result<JoinConfig> {
        // Find the configuration file
        let config_path = self.find_config_file()?;

        // Read and parse
        let toml_content = std::fs::read_to_string(&config_path).map_err(|e| {
            DjoinError::config(format!("Failed to read {}: {e}", config_path.display()))
        })?;

        let mut config = JoinConfig::from_toml(&toml_content)?;

        // Expand variables if enabled
        if self.expand_variables {
            config.expand_variables()?;
        }

        // Validate if enabled
        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Load configuration from a TOML string.
    ///
    /// Useful for testing or when config is provided programmatically.
    pub fn load_from_str(&self, toml_content: &str) -> Result<JoinConfig> {
        let mut config = JoinConfig::from_toml(toml_content)?;

        if self.expand_variables {
            config.expand_variables()?;
        }

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Find the configuration file path.
    ///
    /// Returns the path to use, or an error if no config file is found.
    pub fn find_config_file(&self) -> Result<PathBuf> {
        // 1. Check explicit path
        if let Some(ref path) = self.explicit_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(DjoinError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        // 2. Check environment variable
        if let Ok(env_path) = std::env::var(&self.env_var_name) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok(path);
            }
            // If explicitly set but doesn't exist, that's an error
            return Err(DjoinError::config(format!(
                "Configuration file from {} not found: {}",
                self.env_var_name, env_path
            )));
        }

        // 3. Search standard locations
        for path in self.get_search_paths() {
            if path.exists() {
                return Ok(path);
            }
        }

        Err(DjoinError::config(format!(
            "No configuration file found. Searched:\n  - {}",
            self.get_search_paths()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n  - ")
        )))
    }

    /// Get the list of paths to search for configuration files.
    pub fn get_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(windows)]
        {
            if let Some(program_data) = std::env::var_os("PROGRAMDATA") {
                let mut path = PathBuf::from(program_data);
                path.push("Department of War");
                path.push("DomainJoin");
                path.push("config.toml");
                paths.push(path);
            }
        }

        #[cfg(unix)]
        {
            paths.push(PathBuf::from("/etc/djoin/config.toml"));
        }

        // Current directory
        paths.push(PathBuf::from("djoin-config.toml"));
        paths.push(PathBuf::from("config.toml"));

        paths
    }

    /// Check if a configuration file exists in any standard location.
    pub fn config_exists(&self) -> bool {
        self.find_config_file().is_ok()
    }
}

/// Write a default configuration file to a path.
///
/// This creates a well-documented example configuration file that can be
/// customized for the target environment.
pub fn write_default_config(path: impl AsRef<Path>) -> Result<()> {
    let default_config = r#"# Offline Domain Join Configuration
# This file configures unattended machine-account provisioning against
# an Active Directory domain.

[credential]
# Domain-qualified account with rights to create machine accounts (required)
# Format: DOMAIN\account (the backslash must be escaped in TOML)
username = "CONTOSO\\svc-join"

# Password source: "env:VAR_NAME" or "file:/path/to/file"
# A raw value is also accepted but discouraged.
password_source = "env:DJOIN_PASSWORD"

[join]
# DNS name of the domain to join (required)
domain = "contoso.com"

# Machine name to provision. Defaults to the local computer name.
# Supports variables: ${COMPUTERNAME}, ${USERDNSDOMAIN}
# machine = "${COMPUTERNAME}"

# OU distinguished name for the machine account
# ou = "OU=Servers,DC=contoso,DC=com"

# Specific domain controller to provision against
# dc = "dc1.contoso.com"

# Reuse an existing machine account instead of failing on conflict (default: true)
reuse_existing_account = true

# Wire shape: "simple" (single provisioning call) or "structured"
# (aggregate package with site/template/policy fields)
shape = "simple"

# Extra fields for the structured shape:
# [join.structured]
# netbios_name = "NODE01"
# site_name = "Default-First-Site-Name"
# primary_dns_domain = "contoso.com"
# cert_templates = ["Machine"]
# machine_policy_names = []
# machine_policy_paths = []

[output]
# Write the provisioning blob to this file instead of stdout
# path = "${PROGRAMDATA}/DomainJoin/blob.txt"

# Output format for stdout: "text" (blob alone) or "json"
format = "text"
"#;

    let path = path.as_ref();

    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DjoinError::config(format!("Failed to create directory: {e}")))?;
    }

    std::fs::write(path, default_config)
        .map_err(|e| DjoinError::config(format!("Failed to write config file: {e}")))?;

    Ok(())
}
