use aggregator::env::{ConfigSource, ProcessEnv, ResolverConfig};
use aggregator::types::ResourceType;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod logging;
mod telemetry;

use config::Config;

#[derive(Parser)]
#[command(version, about = "Aggregation proxy for real-time sports and news APIs")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the public API, the manual data endpoints and the admin probes
    Run(ConfigArgs),
    /// Validate the config file and show which upstream tiers are configured
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value = "sportswire.yaml")]
    config_file: PathBuf,
}

fn main() -> ExitCode {
    // A .env file is optional; real environment variables take precedence.
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        CliCommand::Run(args) => run(&args.config_file),
        CliCommand::CheckConfig(args) => check_config(&args.config_file, &ProcessEnv),
    }
}

fn load_config(path: &Path) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(err) => {
            eprintln!("Failed to load {}: {err}", path.display());
            None
        }
    }
}

fn run(path: &Path) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let _sentry = logging::init(config.common.logging.as_ref());

    if let Some(metrics_config) = &config.common.metrics
        && let Err(err) = telemetry::init(metrics_config)
    {
        tracing::error!(error = %err, "could not initialize metrics");
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(error = %err, "could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(config = %path.display(), "starting sportswire");
    match rt.block_on(aggregator::run(config.service, Arc::new(ProcessEnv))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "sportswire stopped");
            ExitCode::FAILURE
        }
    }
}

fn check_config(path: &Path, env: &dyn ConfigSource) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    if let Err(err) = config.service.validate() {
        eprintln!("Invalid config: {err}");
        return ExitCode::FAILURE;
    }

    println!("{} is valid", path.display());
    for resource in ResourceType::ALL {
        let upstreams = ResolverConfig::load(resource, env);
        println!("{}", describe(resource, &upstreams));
    }
    ExitCode::SUCCESS
}

/// One line per resource. Only hosts are printed, never tokens or keys.
fn describe(resource: ResourceType, config: &ResolverConfig) -> String {
    let primary = config
        .primary_url
        .as_ref()
        .and_then(|url| url.host_str())
        .unwrap_or("-");
    let token = if config.token.is_some() { "set" } else { "unset" };
    let secondary = config
        .secondary
        .as_ref()
        .and_then(|api| api.url.host_str())
        .unwrap_or("-");

    format!("{resource:<14} primary={primary} token={token} secondary={secondary}")
}
