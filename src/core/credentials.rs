//! Validation of credentials passed to `configure_wifi`

use crate::core::{
    error::{OnboardingError, OnboardingResult},
    types::{AuthType, PendingCredentials, SSID_MAX_LENGTH},
};

const WEP_ASCII_LENGTHS: [usize; 4] = [5, 13, 16, 29];
const WEP_HEX_LENGTHS: [usize; 4] = [10, 26, 32, 58];

fn is_printable_ascii(key: &str) -> bool {
    key.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

fn is_hex(key: &str) -> bool {
    hex::decode(key).is_ok()
}

/// WPA passphrase (8..63 printable characters) or raw 64 digit hex PSK
pub fn is_valid_wpa_key(key: &str) -> bool {
    match key.len() {
        8..=63 => is_printable_ascii(key),
        64 => is_hex(key),
        _ => false,
    }
}

/// WEP key in ASCII (5, 13, 16, 29 characters) or hex (10, 26, 32, 58 digits)
pub fn is_valid_wep_key(key: &str) -> bool {
    let len = key.len();
    (WEP_ASCII_LENGTHS.contains(&len) && is_printable_ascii(key))
        || (WEP_HEX_LENGTHS.contains(&len) && is_hex(key))
}

pub fn validate_ssid(ssid: &str) -> OnboardingResult<()> {
    if ssid.is_empty() {
        return Err(OnboardingError::InvalidSsid("SSID must not be empty".into()));
    }
    if ssid.len() > SSID_MAX_LENGTH {
        return Err(OnboardingError::InvalidSsid(format!(
            "SSID exceeds {} bytes",
            SSID_MAX_LENGTH
        )));
    }
    Ok(())
}

pub fn parse_auth_type(value: i16) -> OnboardingResult<AuthType> {
    AuthType::try_from(value).map_err(|_| OnboardingError::InvalidAuthType(value))
}

/// Build the credentials to stage, resolving `Any` to a concrete type
///
/// `scanned` is the authentication type last seen for the SSID. Without it
/// the type is guessed from the passphrase: open, then WPA2, then WEP.
pub fn resolve(
    ssid: &str,
    passphrase: &str,
    auth_type: AuthType,
    scanned: Option<AuthType>,
) -> OnboardingResult<PendingCredentials> {
    validate_ssid(ssid)?;

    let auth_type = match (auth_type, scanned) {
        (AuthType::Any, Some(scanned)) => scanned,
        (AuthType::Any, None) if passphrase.is_empty() => AuthType::Open,
        (AuthType::Any, None) if is_valid_wpa_key(passphrase) => AuthType::Wpa2Auto,
        (AuthType::Any, None) if is_valid_wep_key(passphrase) => AuthType::Wep,
        (AuthType::Any, None) => {
            return Err(OnboardingError::InvalidPassphrase(
                "any supported authentication type".into(),
            ));
        }
        (auth_type, _) => auth_type,
    };

    let valid = if auth_type.is_wpa() {
        is_valid_wpa_key(passphrase)
    } else if auth_type == AuthType::Wep {
        is_valid_wep_key(passphrase)
    } else {
        true
    };
    if !valid {
        return Err(OnboardingError::InvalidPassphrase(auth_type.to_string()));
    }

    Ok(PendingCredentials {
        ssid: ssid.to_string(),
        passphrase: passphrase.to_string(),
        auth_type,
    })
}
