//! Operations exposed to the transport layer

use serde::Serialize;
use trait_variant::make;

use crate::core::{
    error::OnboardingResult,
    types::{ConfigureStatus, LastError, OnboardingState, ScanInfo},
};

/// Onboarding operations consumed by a remote-facing transport
///
/// `connect` and `offboard` never report command failures; callers poll
/// `state` and `last_error` to learn the outcome.
#[make(Send)]
pub trait OnboardingApi: Sync {
    /// Validate and stage credentials for the next `connect`
    async fn configure_wifi(
        &self,
        ssid: &str,
        passphrase: &str,
        auth_type: i16,
    ) -> OnboardingResult<ConfigureStatus>;

    /// Apply the staged credentials
    ///
    /// Fails only if nothing is staged.
    async fn connect(&self) -> OnboardingResult<()>;

    /// Drop the current network configuration
    async fn offboard(&self);

    async fn state(&self) -> OnboardingState;

    async fn last_error(&self) -> LastError;

    /// Age and deduplicated entries of the latest scan
    async fn scan_info(&self) -> ScanInfo;
}

/// `ConfigureWiFi` reply as a (status, error, message) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureReply {
    pub status: i16,
    pub error: String,
    pub message: String,
}

impl From<OnboardingResult<ConfigureStatus>> for ConfigureReply {
    fn from(result: OnboardingResult<ConfigureStatus>) -> Self {
        match result {
            Ok(status) => Self {
                status: status as i16,
                error: String::new(),
                message: String::new(),
            },
            Err(e) => Self {
                status: 0,
                error: e.name().to_string(),
                message: e.to_string(),
            },
        }
    }
}
