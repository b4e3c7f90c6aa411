//! Runtime settings

use crate::{
    config::{CliArgs, cli::CliCommand},
    core::{command::CommandTemplates, controller::ControllerConfig},
};

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub controller: ControllerConfig,
    pub device_name: String,
    pub command: CliCommand,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        Settings {
            controller: ControllerConfig {
                scan_file: Some(args.scan_file),
                state_file: Some(args.state_file),
                error_file: Some(args.error_file),
                commands: CommandTemplates {
                    configure: args.configure_cmd,
                    connect: args.connect_cmd,
                    offboard: args.offboard_cmd,
                },
                concurrency: args.concurrency.into(),
            },
            device_name: args.device_name,
            command: args.command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ConcurrencyMode;
    use clap::Parser;

    #[test]
    fn test_settings_from_args() {
        let args = CliArgs::parse_from([
            "wifi-onboarding-controller",
            "--state-file",
            "/tmp/state",
            "--configure-cmd",
            "cfg {ssid}",
            "--concurrency",
            "multi",
            "state",
        ]);
        let settings = Settings::from(args);

        assert_eq!(
            settings.controller.state_file.as_deref(),
            Some(std::path::Path::new("/tmp/state"))
        );
        assert_eq!(
            settings.controller.commands.configure.as_deref(),
            Some("cfg {ssid}")
        );
        assert_eq!(settings.controller.commands.offboard, None);
        assert_eq!(
            settings.controller.concurrency,
            ConcurrencyMode::MultiThreaded
        );
        assert_eq!(settings.command, CliCommand::State);
    }
}
