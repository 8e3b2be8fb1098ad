//! CLI entrypoint for butlerd-client
//!
//! This is the main binary that wires together all layers: it loads the
//! configuration, spawns the daemon, waits for the global session and runs
//! one subcommand on it.

use anyhow::{Context, Result, bail};
use butlerd_infrastructure::{ButlerClient, ButlerError, ConfigLoader, FileConfig};
use butlerd_presentation::{BootstrapReporter, Cli, Command, ConsoleFormatter, OutputFormatter};
use clap::Parser;
use serde_json::Value;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!(e))?
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let _guard = init_logging(cli.verbose, config.logging.file.as_deref())?;

    if let Command::Config = cli.command {
        ConfigLoader::print_config_sources();
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Starting butlerd-client");

    let progress = matches!(cli.command, Command::Run { progress: true });
    let client = if progress {
        ButlerClient::with_global_handlers(config, |builder| builder.with_progress_logging())
    } else {
        ButlerClient::new(config)
    };

    let reporter = (!cli.quiet).then(BootstrapReporter::new);
    let phases = client.subscribe_phase();
    let started = match &reporter {
        Some(reporter) => {
            let (started, _) = tokio::join!(client.start(), reporter.follow(phases));
            started
        }
        None => client.start().await,
    };
    let session = match started {
        Ok(session) => session,
        Err(e) => {
            client.shutdown().await;
            return Err(e).context("butlerd did not become ready");
        }
    };

    let formatter = ConsoleFormatter::new(cli.output);
    let outcome = match cli.command {
        Command::Run { .. } => {
            if let Some(endpoint) = client.endpoint() {
                println!("Connected to butlerd at {}", endpoint);
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
                _ = session.closed() => info!("Global session closed"),
            }
            Ok(())
        }
        Command::Call { method, params } => {
            let params = parse_params(params.as_deref())?.unwrap_or(Value::Null);
            match session.request::<Value, Value>(&method, &params).await {
                Ok(result) => {
                    println!("{}", formatter.format_result(&result));
                    Ok(())
                }
                Err(ButlerError::Rpc(fault)) => {
                    eprintln!("{}", formatter.format_fault(&fault));
                    Err(anyhow::anyhow!("{} failed", method))
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Notify { method, params } => match parse_params(params.as_deref())? {
            Some(params) => session.send_notification(&method, &params).await.map_err(Into::into),
            None => session.send_bare_notification(&method).await.map_err(Into::into),
        },
        Command::Config => Ok(()),
    };

    client.shutdown().await;
    outcome
}

/// Command-line flags take priority over every configuration source.
fn apply_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(binary) = &cli.butler {
        config.daemon.binary = binary.clone();
    }
    if let Some(db_path) = &cli.db_path {
        config.daemon.db_path = db_path.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.rpc.request_timeout_secs = Some(timeout);
    }
}

fn parse_params(raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("params must be valid JSON")?;
    if !value.is_object() {
        bail!("params must be a JSON object");
    }
    Ok(Some(value))
}

/// Initialize logging based on verbosity level, optionally teeing into a file.
fn init_logging(verbose: u8, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().context("logging.file must name a file")?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
