use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::config::Config;
use crate::{observability, warmup};

/// Sends synthetic requests to a freshly started service until it is warm.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Validate(ValidateCommand),
    Version(VersionCommand),
}

/// wait for the target to become ready, then warm it up
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// check the configuration and print all request templates
///
/// No request is sent to the target.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateCommand {}

/// print the prewarm version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("prewarm {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    match args.command {
        Command::Run(RunCommand {}) => run(config),
        Command::Validate(ValidateCommand {}) => validate(&config),
        Command::Version(VersionCommand {}) => unreachable!(),
    }
}

fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("prewarm-rt")
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async move {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                elegant_departure::tokio::depart()
                    .on_termination()
                    .on_sigint()
                    .await;
                cancel.cancel();
            }
        });

        warmup::run(&config, cancel).await
    })?;

    print!("{summary}");
    if summary.all_failed() {
        anyhow::bail!("all warmup requests failed");
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    let http = config.http_templates()?;
    let grpc = config.grpc_templates()?;
    config.target_options()?;

    if !http.is_empty() && config.http_url.is_none() {
        tracing::warn!("HTTP requests configured without `http_url`, they will be skipped");
    }
    if !grpc.is_empty() && config.grpc_url.is_none() {
        tracing::warn!("gRPC requests configured without `grpc_url`, they will be skipped");
    }

    for template in &http {
        println!("{} {template}", "http".cyan());
    }
    for template in &grpc {
        println!("{} {template}", "grpc".magenta());
    }
    println!(
        "{}",
        format!("{} HTTP and {} gRPC templates ok", http.len(), grpc.len()).green()
    );

    Ok(())
}
