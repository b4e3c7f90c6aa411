//! WiFi Onboarding Controller
//!
//! Drives a device from unconfigured to connected through externally supplied
//! configure/connect/offboard commands, suspending the device's presence
//! announcement while the WiFi link changes.

pub mod backend;
pub mod config;
pub mod core;

pub use crate::core::{
    api::OnboardingApi,
    controller::{ControllerConfig, OnboardingController},
    error::{CommandError, OnboardingError, PersistenceError, ScanError},
    types::{AuthType, ConcurrencyMode, LastError, OnboardingState, ScanEntry, ScanInfo},
};
