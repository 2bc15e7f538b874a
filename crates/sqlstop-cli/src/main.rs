use std::net::IpAddr;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::StopOptions;

#[derive(Parser)]
#[command(
    name = "sqlstop",
    about = "Stop every running Cloud SQL instance in a project",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log line format on stderr.
    #[arg(long, global = true, env = "SQLSTOP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    /// One JSON object per line, for log collectors.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one stop pass and exit.
    ///
    /// Prints the status literal on stdout when the pass completes. Any
    /// fatal error exits non-zero.
    Run {
        #[command(flatten)]
        opts: StopOptions,
    },
    /// Serve an HTTP trigger. Every request runs one stop pass.
    Serve {
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[command(flatten)]
        opts: StopOptions,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Run { opts } => commands::run::run(opts).await,
        Commands::Serve { port, host, opts } => commands::serve::serve(host, port, opts).await,
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
