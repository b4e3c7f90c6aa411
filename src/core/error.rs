//! Error types for the WiFi onboarding controller

use thiserror::Error;

/// Result type for command execution
pub type CommandResult<T> = Result<T, CommandError>;

/// Result type for scan data handling
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type for state and error persistence
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type for onboarding operations
pub type OnboardingResult<T> = Result<T, OnboardingError>;

/// Faults raised while launching or waiting for an external command
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    #[error("Failed to spawn command: {0}")]
    SpawnFailed(String),

    #[error("Command terminated abnormally: {0}")]
    Abnormal(String),
}

/// Errors reading the scan data source
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("Scan data unreadable: {0}")]
    Unreadable(String),

    #[error("Scan data malformed: {0}")]
    Malformed(String),
}

/// Errors reading or writing persisted state
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported synchronously by onboarding operations
#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("Invalid SSID: {0}")]
    InvalidSsid(String),

    #[error("Unrecognized authentication type: {0}")]
    InvalidAuthType(i16),

    #[error("Invalid passphrase for {0}")]
    InvalidPassphrase(String),

    #[error("No pending credentials, call ConfigureWiFi first")]
    NoPendingCredentials,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl OnboardingError {
    /// True for malformed `configure_wifi` input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OnboardingError::InvalidSsid(_)
                | OnboardingError::InvalidAuthType(_)
                | OnboardingError::InvalidPassphrase(_)
        )
    }

    /// Error name reported to remote callers
    pub fn name(&self) -> &'static str {
        match self {
            OnboardingError::InvalidSsid(_)
            | OnboardingError::InvalidAuthType(_)
            | OnboardingError::InvalidPassphrase(_) => "InvalidValue",
            OnboardingError::NoPendingCredentials => "NoPendingCredentials",
            OnboardingError::Persistence(_) => "PersistenceFailure",
        }
    }
}
