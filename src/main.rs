//! CLI entry point for `imapsave`.

use std::path::PathBuf;

use clap::Parser;

use imapsave::config::{self, FileConfig, Settings};
use imapsave::imap::client::ImapClient;

#[derive(Parser)]
#[command(name = "imapsave", version, about)]
struct Cli {
    /// IMAP server as host:port (port defaults to 993)
    #[arg(long, env = "IMAP_SERVER", value_name = "HOST:PORT")]
    server: String,

    /// Login user name
    #[arg(long, env = "IMAP_USERNAME")]
    username: String,

    /// Login password
    #[arg(long, env = "IMAP_PASSWORD", hide_env_values = true)]
    password: String,

    /// Mailbox to scan
    #[arg(long, env = "IMAP_FOLDER")]
    folder: String,

    /// Directory receiving attachments and the processed-UID ledger
    #[arg(long, env = "DESTINATION_DIR", value_name = "DIR")]
    dest: PathBuf,

    /// Messages per metadata fetch (overrides the config file)
    #[arg(long, value_name = "N")]
    batch_size: Option<u32>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values from .env only fill variables not already set
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let file_config = config::load_config();

    let log_level = match cli.verbose {
        0 => file_config.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &file_config);

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) => tracing::debug!(error = %e, "No .env loaded"),
    }

    let settings = Settings::new(
        &cli.server,
        cli.username,
        cli.password,
        cli.folder,
        cli.dest,
        cli.batch_size.unwrap_or(file_config.fetch.batch_size),
    )?;
    tracing::debug!(?settings, "Resolved settings");

    match imapsave::run(&settings, || ImapClient::connect(&settings)).await {
        Ok(summary) => {
            tracing::info!(
                batches = summary.batches,
                seen = summary.seen,
                skipped = summary.skipped,
                processed = summary.processed,
                attachments = summary.attachments,
                "Run complete"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &FileConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "imapsave.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
