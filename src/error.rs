//! Error types for the domain-join client.
//!
//! This module defines all error types that can occur during offline
//! domain-join provisioning, covering credential validation, the token
//! lifecycle (logon, duplication, impersonation), and the directory
//! provisioning call itself.

use thiserror::Error;

/// Result type alias using [`DjoinError`].
pub type Result<T> = std::result::Result<T, DjoinError>;

/// Errors that can occur during domain-join provisioning operations.
#[derive(Debug, Error)]
pub enum DjoinError {
    /// Username is not in the required `DOMAIN\account` form.
    #[error("Invalid credential format: {0}")]
    CredentialFormat(String),

    /// The identity subsystem rejected the credential.
    #[error("Logon failed for '{account}' (OS error {code})")]
    Authentication {
        /// Domain-qualified account the logon was attempted for.
        account: String,
        /// Platform error code from the failed logon.
        code: u32,
    },

    /// The session token could not be duplicated at impersonation level.
    #[error("Token duplication failed (OS error {code})")]
    TokenDuplication {
        /// Platform error code from the failed duplication.
        code: u32,
    },

    /// The calling thread's identity could not be switched to the token.
    #[error("Impersonation failed (OS error {code})")]
    Impersonation {
        /// Platform error code from the failed identity switch.
        code: u32,
    },

    /// The directory service returned a non-zero provisioning status.
    #[error("Provisioning failed with status {status}")]
    Provisioning {
        /// Status code returned by the directory service.
        status: u32,
    },

    /// Configuration file or validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform integration error outside the token/provisioning kinds.
    #[error("Platform error: {0}")]
    Platform(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DjoinError {
    /// Create a credential format error with the given message.
    pub fn credential_format(msg: impl Into<String>) -> Self {
        Self::CredentialFormat(msg.into())
    }

    /// Create an authentication error for an account with an OS error code.
    pub fn authentication(account: impl Into<String>, code: u32) -> Self {
        Self::Authentication {
            account: account.into(),
            code,
        }
    }

    /// Create a token duplication error with an OS error code.
    pub fn token_duplication(code: u32) -> Self {
        Self::TokenDuplication { code }
    }

    /// Create an impersonation error with an OS error code.
    pub fn impersonation(code: u32) -> Self {
        Self::Impersonation { code }
    }

    /// Create a provisioning error with a directory-service status code.
    pub fn provisioning(status: u32) -> Self {
        Self::Provisioning { status }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a platform error with the given message.
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Returns the underlying platform error code, if this kind carries one.
    pub fn os_error_code(&self) -> Option<u32> {
        match self {
            Self::Authentication { code, .. }
            | Self::TokenDuplication { code }
            | Self::Impersonation { code } => Some(*code),
            Self::Provisioning { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the failure happened before any OS resource was
    /// acquired (pure input validation).
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::CredentialFormat(_) | Self::Config(_))
    }
}

/// Returns a short description for well-known provisioning status codes.
///
/// Covers the documented return values of the directory provisioning
/// calls; unrecognized codes return `None` and should be reported
/// numerically.
pub fn describe_status(status: u32) -> Option<&'static str> {
    match status {
        0 => Some("success"),
        5 => Some("access denied"),
        50 => Some("request not supported by the directory service"),
        87 => Some("invalid parameter"),
        1326 => Some("unknown user name or bad password"),
        1355 => Some("the specified domain does not exist or could not be contacted"),
        2224 => Some("the account already exists"),
        _ => None,
    }
}
