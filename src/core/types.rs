//! Domain types for WiFi onboarding

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum SSID length in bytes
pub const SSID_MAX_LENGTH: usize = 32;

/// Onboarding state machine states
///
/// The discriminants are the values persisted in the state file and reported
/// to remote callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum OnboardingState {
    NotConfigured = 0,
    ConfiguredNotValidated = 1,
    Connected = 3,
    Error = 4,
}

impl TryFrom<i16> for OnboardingState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, <Self as TryFrom<i16>>::Error> {
        match value {
            0 => Ok(OnboardingState::NotConfigured),
            1 => Ok(OnboardingState::ConfiguredNotValidated),
            3 => Ok(OnboardingState::Connected),
            4 => Ok(OnboardingState::Error),
            _ => Err(()),
        }
    }
}

impl From<OnboardingState> for i16 {
    fn from(state: OnboardingState) -> Self {
        state as i16
    }
}

/// WiFi authentication types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum AuthType {
    Wpa2Auto = -3,
    WpaAuto = -2,
    Any = -1,
    Open = 0,
    Wep = 1,
    WpaTkip = 2,
    WpaCcmp = 3,
    Wpa2Tkip = 4,
    Wpa2Ccmp = 5,
    Wps = 6,
}

impl AuthType {
    /// Name handed to the configure command
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Wpa2Auto => "WPA2_AUTO",
            AuthType::WpaAuto => "WPA_AUTO",
            // The configure command needs a concrete value
            AuthType::Any | AuthType::Open => "OPEN",
            AuthType::Wep => "WEP",
            AuthType::WpaTkip => "WPA_TKIP",
            AuthType::WpaCcmp => "WPA_CCMP",
            AuthType::Wpa2Tkip => "WPA2_TKIP",
            AuthType::Wpa2Ccmp => "WPA2_CCMP",
            AuthType::Wps => "WPS",
        }
    }

    /// True for every WPA/WPA2 variant
    pub fn is_wpa(&self) -> bool {
        matches!(
            self,
            AuthType::Wpa2Auto
                | AuthType::WpaAuto
                | AuthType::WpaTkip
                | AuthType::WpaCcmp
                | AuthType::Wpa2Tkip
                | AuthType::Wpa2Ccmp
        )
    }
}

impl TryFrom<i16> for AuthType {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, <Self as TryFrom<i16>>::Error> {
        match value {
            -3 => Ok(AuthType::Wpa2Auto),
            -2 => Ok(AuthType::WpaAuto),
            -1 => Ok(AuthType::Any),
            0 => Ok(AuthType::Open),
            1 => Ok(AuthType::Wep),
            2 => Ok(AuthType::WpaTkip),
            3 => Ok(AuthType::WpaCcmp),
            4 => Ok(AuthType::Wpa2Tkip),
            5 => Ok(AuthType::Wpa2Ccmp),
            6 => Ok(AuthType::Wps),
            _ => Err(()),
        }
    }
}

impl From<AuthType> for i16 {
    fn from(auth: AuthType) -> Self {
        auth as i16
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ErrorCode {
    Validated = 0,
    Unreachable = 1,
    UnsupportedProtocol = 2,
    Unauthorized = 3,
    ErrorMessage = 4,
}

impl TryFrom<i16> for ErrorCode {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, <Self as TryFrom<i16>>::Error> {
        match value {
            0 => Ok(ErrorCode::Validated),
            1 => Ok(ErrorCode::Unreachable),
            2 => Ok(ErrorCode::UnsupportedProtocol),
            3 => Ok(ErrorCode::Unauthorized),
            4 => Ok(ErrorCode::ErrorMessage),
            _ => Err(()),
        }
    }
}

impl From<ErrorCode> for i16 {
    fn from(code: ErrorCode) -> Self {
        code as i16
    }
}

/// Outcome record of the most recent onboarding operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub code: ErrorCode,
    pub message: String,
}

impl LastError {
    /// The "no error" record
    pub fn none() -> Self {
        Self {
            code: ErrorCode::Validated,
            message: String::new(),
        }
    }

    /// Generic command failure carrying the command's diagnostic text
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ErrorMessage,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code != ErrorCode::Validated
    }
}

impl Default for LastError {
    fn default() -> Self {
        Self::none()
    }
}

/// Whether WiFi transitions block the caller or run in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ConcurrencyMode {
    SingleThreaded = 1,
    MultiThreaded = 2,
}

/// Status returned by a successful `configure_wifi`
///
/// Tells the caller whether the device keeps the current link while it
/// validates the new credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ConfigureStatus {
    Regular = 1,
    FastChannelSwitching = 2,
}

impl From<ConcurrencyMode> for ConfigureStatus {
    fn from(mode: ConcurrencyMode) -> Self {
        match mode {
            ConcurrencyMode::SingleThreaded => ConfigureStatus::Regular,
            ConcurrencyMode::MultiThreaded => ConfigureStatus::FastChannelSwitching,
        }
    }
}

/// Credentials staged by `configure_wifi` and consumed by `connect`
#[derive(Clone, PartialEq, Eq)]
pub struct PendingCredentials {
    pub ssid: String,
    pub passphrase: String,
    pub auth_type: AuthType,
}

// Keep the passphrase out of logs
impl fmt::Debug for PendingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCredentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"***")
            .field("auth_type", &self.auth_type)
            .finish()
    }
}

/// One observed access point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanEntry {
    /// Network SSID
    pub ssid: String,
    /// Signal quality, higher is better (dBm for wpa_supplicant data)
    pub quality: i32,
    /// Authentication type advertised by the access point
    pub auth_type: AuthType,
    /// Channel number (0 if unknown)
    pub channel: u16,
    /// Frequency in MHz (0 if unknown)
    pub frequency: u32,
}

/// Snapshot returned by `scan_info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanInfo {
    /// Minutes since the scan data was refreshed
    pub age_minutes: u16,
    pub entries: Vec<ScanEntry>,
}
