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

//! Windows Event Log integration for domain-join provisioning.
//!
//! This module provides Windows Event Log support for recording join
//! attempts, impersonation activity, and failures. Events are logged to
//! the Application log under the "Offline Domain Join" source.
//!
//! # Event Categories
//!
//! Events are organized into categories by ID range:
//!
//! - **1000-1099**: Informational events (join started, completed, config loaded)
//! - **2000-2099**: Warning events (thread identity not restored)
//! - **3000-3099**: Error events (logon, duplication, impersonation, provisioning failures)
//! - **4000-4099**: Audit events (impersonation activated/reverted, account provisioned)
//!
//! # Event Data
//!
//! Each event may include structured data such as the join account, the
//! target domain and machine, and OS error codes. Credential secrets are
//! never included.
//!
//! # Example
//!
//! ```no_run,ignore
//! use usg_djoin_client::windows::eventlog::{EventData, EventId, EventLog, EventType};
//!
//! let log = EventLog::open()?;
//!
//! // Log a completed join
//! log.log_event(
//!     EventId::JOIN_COMPLETED,
//!     EventType::Information,
//!     "Domain-join provisioning completed",
//!     Some(&EventData::with_target("contoso.com", "NODE01")),
//! )?;
//!
//! // Log a failed logon
//! log.log_error(
//!     EventId::LOGON_FAILED,
//!     "Logon failed for 'CONTOSO\\svc-join'",
//!     Some(1326),
//! )?;
//! ```

use crate::error::{DjoinError, Result};
use std::fmt;

/// Event source name for the Windows Event Log.
pub const EVENT_SOURCE: &str = "Offline Domain Join";

/// Event log name (Application log).
pub const EVENT_LOG_NAME: &str = "Application";

/// Event ID constants.
///
/// Event IDs are organized by category:
/// - 1000-1099: Informational
/// - 2000-2099: Warnings
/// - 3000-3099: Errors
/// - 4000-4099: Audit
#[allow(non_snake_case)]
pub mod EventId {
    // Informational events (1000-1099)
    /// Join provisioning started.
    pub const JOIN_STARTED: u32 = 1000;
    /// Join provisioning completed successfully.
    pub const JOIN_COMPLETED: u32 = 1001;
    /// Configuration loaded.
    pub const CONFIG_LOADED: u32 = 1040;

    // Warning events (2000-2099)
    /// Thread identity could not be restored after provisioning.
    pub const REVERT_FAILED: u32 = 2000;

    // Error events (3000-3099)
    /// Credential logon failed.
    pub const LOGON_FAILED: u32 = 3000;
    /// Token duplication failed.
    pub const TOKEN_DUPLICATION_FAILED: u32 = 3010;
    /// Thread impersonation failed.
    pub const IMPERSONATION_FAILED: u32 = 3020;
    /// Directory provisioning call failed.
    pub const PROVISION_FAILED: u32 = 3030;

    // Audit events (4000-4099)
    /// Thread identity switched to the join credential.
    pub const IMPERSONATION_ACTIVATED: u32 = 4000;
    /// Thread identity restored.
    pub const IMPERSONATION_REVERTED: u32 = 4001;
    /// Machine account provisioned.
    pub const ACCOUNT_PROVISIONED: u32 = 4010;
}

/// Event type/severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Informational event.
    Information,
    /// Warning event.
    Warning,
    /// Error event.
    Error,
    /// Audit success.
    AuditSuccess,
    /// Audit failure.
    AuditFailure,
}

impl EventType {
    /// Get the Windows event type value.
    #[cfg(windows)]
    pub fn to_windows_type(self) -> windows::Win32::System::EventLog::REPORT_EVENT_TYPE {
        use windows::Win32::System::EventLog::{
            EVENTLOG_AUDIT_FAILURE, EVENTLOG_AUDIT_SUCCESS, EVENTLOG_ERROR_TYPE,
            EVENTLOG_INFORMATION_TYPE, EVENTLOG_WARNING_TYPE,
        };

        match self {
            Self::Information => EVENTLOG_INFORMATION_TYPE,
            Self::Warning => EVENTLOG_WARNING_TYPE,
            Self::Error => EVENTLOG_ERROR_TYPE,
            Self::AuditSuccess => EVENTLOG_AUDIT_SUCCESS,
            Self::AuditFailure => EVENTLOG_AUDIT_FAILURE,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Information => write!(f, "Information"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::AuditSuccess => write!(f, "Audit Success"),
            Self::AuditFailure => write!(f, "Audit Failure"),
        }
    }
}

/// Structured event data for logging.
///
/// Credential secrets are never carried here; the password has no
/// representation in event data at all.
#[derive(Debug, Clone, Default)]
pub struct EventData {
    /// Join account in DOMAIN\account form.
    pub account: Option<String>,
    /// Target domain DNS name.
    pub domain: Option<String>,
    /// Machine name being provisioned.
    pub machine: Option<String>,
    /// Machine account OU path.
    pub ou: Option<String>,
    /// Domain controller name.
    pub dc: Option<String>,
    /// OS error or directory status code.
    pub os_error: Option<u32>,
    /// Error message or details.
    pub detail: Option<String>,
}

impl EventData {
    /// Create new event data for a join target.
    pub fn with_target(domain: &str, machine: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            machine: Some(machine.to_string()),
            ..Default::default()
        }
    }

    /// Create new event data with the join account.
    pub fn with_account(account: &str) -> Self {
        Self {
            account: Some(account.to_string()),
            ..Default::default()
        }
    }

    /// Create new event data for an error.
    pub fn with_error(detail: &str, os_error: Option<u32>) -> Self {
        Self {
            detail: Some(detail.to_string()),
            os_error,
            ..Default::default()
        }
    }

    /// Format as a multi-line string for event description.
    pub fn format_description(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref account) = self.account {
            parts.push(format!("Account: {}", account));
        }
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain: {}", domain));
        }
        if let Some(ref machine) = self.machine {
            parts.push(format!("Machine: {}", machine));
        }
        if let Some(ref ou) = self.ou {
            parts.push(format!("OU: {}", ou));
        }
        if let Some(ref dc) = self.dc {
            parts.push(format!("DC: {}", dc));
        }
        if let Some(code) = self.os_error {
            parts.push(format!("OS error: {}", code));
        }
        if let Some(ref detail) = self.detail {
            parts.push(format!("Details: {}", detail));
        }

        parts.join("\n")
    }
}

/// Windows Event Log handle.
pub struct EventLog {
    /// Event source name.
    source: String,
    #[cfg(windows)]
    handle: windows::Win32::System::EventLog::EventSourceHandle,
}

// SAFETY: Event log handles are process-global; ReportEventW is safe to
// call on the same handle from any thread.
#[cfg(windows)]
unsafe impl Send for EventLog {}
#[cfg(windows)]
unsafe impl Sync for EventLog {}

impl EventLog {
    /// Open the event log with the default source.
    pub fn open() -> Result<Self> {
        Self::open_source(EVENT_SOURCE)
    }

    /// Open the event log with a custom source.
    pub fn open_source(source: &str) -> Result<Self> {
        #[cfg(windows)]
        {
            use windows::Win32::System::EventLog::RegisterEventSourceW;

            let wide_source = crate::windows::to_wide(source);

            let handle = unsafe {
                RegisterEventSourceW(
                    windows::core::PCWSTR::null(),
                    windows::core::PCWSTR(wide_source.as_ptr()),
                )
            };

            match handle {
                Ok(h) if !h.is_invalid() => Ok(Self {
                    source: source.to_string(),
                    handle: h,
                }),
                _ => Err(DjoinError::platform(format!(
                    "Failed to register event source: {source}"
                ))),
            }
        }

        #[cfg(not(windows))]
        {
            Ok(Self {
                source: source.to_string(),
            })
        }
    }

    /// Log an event to the Windows Event Log.
    pub fn log_event(
        &self,
        event_id: u32,
        event_type: EventType,
        message: &str,
        data: Option<&EventData>,
    ) -> Result<()> {
        #[cfg(windows)]
        {
            use windows::Win32::System::EventLog::ReportEventW;

            // Build the full message
            let full_message = if let Some(d) = data {
                format!("{}\n\n{}", message, d.format_description())
            } else {
                message.to_string()
            };

            let wide_message = crate::windows::to_wide(&full_message);
            let strings = [windows::core::PCWSTR(wide_message.as_ptr())];

            let result = unsafe {
                ReportEventW(
                    self.handle,
                    event_type.to_windows_type(),
                    0, // Category
                    event_id,
                    None, // User SID
                    Some(&strings),
                    None, // Raw data
                )
            };

            if result.is_err() {
                Err(DjoinError::platform(format!(
                    "Failed to report event {event_id}: {result:?}"
                )))
            } else {
                Ok(())
            }
        }

        #[cfg(not(windows))]
        {
            // On non-Windows, log to tracing
            let level = match event_type {
                EventType::Error | EventType::AuditFailure => tracing::Level::ERROR,
                EventType::Warning => tracing::Level::WARN,
                _ => tracing::Level::INFO,
            };

            let data_str = data.map(|d| d.format_description()).unwrap_or_default();

            match level {
                tracing::Level::ERROR => tracing::error!(
                    source = %self.source,
                    event_id = event_id,
                    event_type = %event_type,
                    data = %data_str,
                    "{}", message
                ),
                tracing::Level::WARN => tracing::warn!(
                    source = %self.source,
                    event_id = event_id,
                    event_type = %event_type,
                    data = %data_str,
                    "{}", message
                ),
                _ => tracing::info!(
                    source = %self.source,
                    event_id = event_id,
                    event_type = %event_type,
                    data = %data_str,
                    "{}", message
                ),
            }

            Ok(())
        }
    }

    /// Log an informational event.
    pub fn log_info(&self, event_id: u32, message: &str, data: Option<&EventData>) -> Result<()> {
        self.log_event(event_id, EventType::Information, message, data)
    }

    /// Log a warning event.
    pub fn log_warning(
        &self,
        event_id: u32,
        message: &str,
        data: Option<&EventData>,
    ) -> Result<()> {
        self.log_event(event_id, EventType::Warning, message, data)
    }

    /// Log an error event.
    pub fn log_error(&self, event_id: u32, message: &str, os_error: Option<u32>) -> Result<()> {
        let data = os_error.map(|code| EventData {
            os_error: Some(code),
            ..Default::default()
        });
        self.log_event(event_id, EventType::Error, message, data.as_ref())
    }

    /// Log an audit event.
    pub fn log_audit(
        &self,
        event_id: u32,
        success: bool,
        message: &str,
        data: Option<&EventData>,
    ) -> Result<()> {
        let event_type = if success {
            EventType::AuditSuccess
        } else {
            EventType::AuditFailure
        };
        self.log_event(event_id, event_type, message, data)
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        #[cfg(windows)]
        {
            use windows::Win32::System::EventLog::DeregisterEventSource;
            unsafe {
                let _ = DeregisterEventSource(self.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(format!("{}", EventType::Information), "Information");
        assert_eq!(format!("{}", EventType::Warning), "Warning");
        assert_eq!(format!("{}", EventType::Error), "Error");
    }

    #[test]
    fn test_event_data_with_target() {
        let data = EventData::with_target("contoso.com", "NODE01");
        assert_eq!(data.domain, Some("contoso.com".to_string()));
        assert_eq!(data.machine, Some("NODE01".to_string()));
        assert!(data.account.is_none());
    }

    #[test]
    fn test_event_data_with_error() {
        let data = EventData::with_error("Logon failure", Some(1326));
        assert_eq!(data.detail, Some("Logon failure".to_string()));
        assert_eq!(data.os_error, Some(1326));
    }

    #[test]
    fn test_event_data_format_description() {
        let data = EventData {
            account: Some("CONTOSO\\svc-join".to_string()),
            domain: Some("contoso.com".to_string()),
            machine: Some("NODE01".to_string()),
            ou: None,
            dc: None,
            os_error: Some(1326),
            detail: None,
        };

        let desc = data.format_description();
        assert!(desc.contains("Account: CONTOSO\\svc-join"));
        assert!(desc.contains("Domain: contoso.com"));
        assert!(desc.contains("Machine: NODE01"));
        assert!(desc.contains("OS error: 1326"));
    }

    #[test]
    fn test_event_ids() {
        // Verify event ID ranges
        assert!(EventId::JOIN_STARTED >= 1000 && EventId::JOIN_STARTED < 1100);
        assert!(EventId::REVERT_FAILED >= 2000 && EventId::REVERT_FAILED < 2100);
        assert!(EventId::LOGON_FAILED >= 3000 && EventId::LOGON_FAILED < 3100);
        assert!(EventId::ACCOUNT_PROVISIONED >= 4000 && EventId::ACCOUNT_PROVISIONED < 4100);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_event_log_non_windows() {
        // On non-Windows, should successfully create an EventLog
        let log = EventLog::open().unwrap();
        assert_eq!(log.source, EVENT_SOURCE);

        // Logging should not fail (logs to tracing)
        log.log_info(EventId::JOIN_STARTED, "Test message", None)
            .unwrap();
        log.log_audit(
            EventId::ACCOUNT_PROVISIONED,
            true,
            "Test audit",
            Some(&EventData::with_target("contoso.com", "NODE01")),
        )
        .unwrap();
    }
}
