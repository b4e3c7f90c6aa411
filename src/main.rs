//! WiFi Onboarding Controller - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_onboarding_controller::{
    LastError, OnboardingApi, OnboardingController, OnboardingState,
    backend::{ShellExecutor, TracingAnnouncer},
    config::{CliArgs, Settings, cli::CliCommand},
    core::api::ConfigureReply,
};

#[derive(Serialize)]
struct Outcome {
    state: OnboardingState,
    last_error: LastError,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr, stdout carries the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wifi_onboarding_controller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    info!(command = ?args.command, "Starting WiFi onboarding controller");
    let settings = Settings::from(args);

    let executor = Arc::new(ShellExecutor::new());
    let announcer = Arc::new(TracingAnnouncer::new(settings.device_name.clone()));
    let controller = OnboardingController::new(settings.controller, executor, announcer).await?;

    match settings.command {
        CliCommand::Onboard {
            ssid,
            passphrase,
            auth_type,
        } => {
            let result = controller
                .configure_wifi(&ssid, &passphrase, auth_type)
                .await;
            let reply = ConfigureReply::from(result);
            if !reply.error.is_empty() {
                error!("ConfigureWiFi rejected: {}", reply.message);
                println!("{}", serde_json::to_string_pretty(&reply)?);
                return Err(reply.message.into());
            }

            controller.connect().await?;
            controller.wait_idle().await;
            print_outcome(&controller).await?;
        }
        CliCommand::Offboard => {
            controller.offboard().await;
            controller.wait_idle().await;
            print_outcome(&controller).await?;
        }
        CliCommand::State => {
            println!("{}", serde_json::to_string(&controller.state().await)?);
        }
        CliCommand::LastError => {
            println!(
                "{}",
                serde_json::to_string_pretty(&controller.last_error().await)?
            );
        }
        CliCommand::ScanInfo => {
            println!(
                "{}",
                serde_json::to_string_pretty(&controller.scan_info().await)?
            );
        }
    }

    Ok(())
}

async fn print_outcome<C: OnboardingApi>(controller: &C) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = Outcome {
        state: controller.state().await,
        last_error: controller.last_error().await,
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.state == OnboardingState::Error {
        return Err(outcome.last_error.message.into());
    }
    Ok(())
}
