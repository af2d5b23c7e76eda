// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Variable expansion for configuration values.
//!
//! This module handles expansion of variables like `${COMPUTERNAME}` and
//! `${USERDNSDOMAIN}` in configuration strings, so one join config can be
//! deployed fleet-wide with per-machine values filled in at run time.

use crate::error::Result;

/// Expand variables in a string.
///
/// Variables are in the format `${VARIABLE_NAME}`. Supported variables:
///
/// - `${COMPUTERNAME}` - Computer/hostname, uppercased
/// - `${USERDNSDOMAIN}` - DNS domain suffix (Windows)
/// - `${USERDOMAIN}` - NetBIOS domain name (Windows)
/// - `${PROGRAMDATA}` - ProgramData directory (Windows)
/// - `${TEMP}` - Temporary directory
///
/// Any other name falls back to the process environment. Unknown
/// variables are left unchanged.
///
/// # Examples
///
/// ```
/// use usg_djoin_client::expand::expand_variables;
///
/// // Simple expansion
/// let result = expand_variables("${COMPUTERNAME}.contoso.com").unwrap();
/// // Returns something like "NODE01.contoso.com"
/// ```
pub fn expand_variables(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut start = 0;

    // Find all ${...} patterns and replace them
    while let Some(var_start) = result[start..].find("${") {
        let absolute_start = start + var_start;

        if let Some(var_end) = result[absolute_start..].find('}') {
            let absolute_end = absolute_start + var_end;
            let var_name = &result[absolute_start + 2..absolute_end];

            if let Some(value) = get_variable_value(var_name) {
                result.replace_range(absolute_start..absolute_end + 1, &value);
                // Continue searching after the replacement
                start = absolute_start + value.len();
            } else {
                // Variable not found, skip past it
                start = absolute_end + 1;
            }
        } else {
            // No closing brace, skip past ${
            start = absolute_start + 2;
        }
    }

    Ok(result)
}

/// Get the value of a variable.
///
/// Returns `None` for unknown variables.
fn get_variable_value(name: &str) -> Option<String> {
    match name {
        "COMPUTERNAME" => get_computer_name(),
        "USERDNSDOMAIN" => get_dns_domain(),
        "USERDOMAIN" => std::env::var("USERDOMAIN").ok(),
        "PROGRAMDATA" => get_program_data(),
        "TEMP" | "TMP" => Some(std::env::temp_dir().to_string_lossy().into_owned()),
        _ => {
            // Fall back to environment variable
            std::env::var(name).ok()
        }
    }
}

/// Get the local computer name, uppercased with any domain suffix removed.
fn get_computer_name() -> Option<String> {
    // The environment variable is authoritative on Windows
    if let Ok(name) = std::env::var("COMPUTERNAME") {
        return Some(name);
    }

    crate::windows::MachineIdentity::current()
        .ok()
        .map(|identity| identity.computer_name)
}

/// Get the DNS domain suffix.
fn get_dns_domain() -> Option<String> {
    // Try environment variable first (Windows)
    if let Ok(domain) = std::env::var("USERDNSDOMAIN") {
        return Some(domain);
    }

    // On Unix, try to extract from FQDN
    #[cfg(unix)]
    {
        if let Ok(Some(fqdn)) = hostname::get().map(|h| h.into_string().ok())
            && let Some(dot_pos) = fqdn.find('.')
        {
            return Some(fqdn[dot_pos + 1..].to_string());
        }
    }

    None
}

/// Get the ProgramData directory (Windows) or /var/lib equivalent.
fn get_program_data() -> Option<String> {
    std::env::var("PROGRAMDATA").ok().or_else(|| {
        #[cfg(unix)]
        {
            Some("/var/lib".to_string())
        }
        #[cfg(not(unix))]
        {
            None
        }
    })
}
