//! Command-line argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::types::ConcurrencyMode;

#[derive(Parser, Debug, Clone)]
#[clap(name = "wifi-onboarding-controller", version, author)]
#[clap(about = "Device side WiFi onboarding with command hooks")]
pub struct CliArgs {
    /// Scan results written by the platform (JSON or wpa_cli format)
    #[clap(long, default_value = "/var/run/wifi-onboarding/scan_results")]
    pub scan_file: PathBuf,

    /// File holding the persisted onboarding state
    #[clap(long, default_value = "/var/lib/wifi-onboarding/last_state")]
    pub state_file: PathBuf,

    /// File holding the persisted last error
    #[clap(long, default_value = "/var/lib/wifi-onboarding/last_error")]
    pub error_file: PathBuf,

    /// Configure command; {ssid}, {auth} and {passphrase} are substituted
    #[clap(long)]
    pub configure_cmd: Option<String>,

    /// Connect command
    #[clap(long)]
    pub connect_cmd: Option<String>,

    /// Offboard command
    #[clap(long)]
    pub offboard_cmd: Option<String>,

    /// Run WiFi transitions inline or in the background
    #[clap(long, value_enum, default_value = "single")]
    pub concurrency: Concurrency,

    /// Name used when logging advertisement changes
    #[clap(long, default_value = "WiFi-Setup")]
    pub device_name: String,

    #[clap(subcommand)]
    pub command: CliCommand,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Single,
    Multi,
}

impl From<Concurrency> for ConcurrencyMode {
    fn from(concurrency: Concurrency) -> Self {
        match concurrency {
            Concurrency::Single => ConcurrencyMode::SingleThreaded,
            Concurrency::Multi => ConcurrencyMode::MultiThreaded,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Stage credentials and connect
    Onboard {
        #[clap(long)]
        ssid: String,

        #[clap(long, default_value = "")]
        passphrase: String,

        /// Authentication type code, -1 picks one automatically
        #[clap(long, default_value_t = -1, allow_negative_numbers = true)]
        auth_type: i16,
    },
    /// Drop the network configuration
    Offboard,
    /// Print the onboarding state
    State,
    /// Print the last error
    LastError,
    /// Print the deduplicated scan results
    ScanInfo,
}
