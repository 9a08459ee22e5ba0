use background_service::{CoordinatorSettings, StreamCoordinator, StreamStats};
use notification_service::NotificationHub;
use notifier_core::{AppConfig, CoreError, ErrorExt, ErrorReporter, RuntimeSettings};
use reddit_client::{RedditClient, RedditOAuth2Config};
use std::future::Future;
use std::io;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "reddit_post_notifier=info,background_service=info,\
                                  reddit_client=info,notification_service=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Reddit Post Notifier");

    match run().await {
        Ok(stats) => {
            tracing::info!("Stopping application, bye bye");
            tracing::info!("{}", stats);
        }
        Err(e) => {
            ErrorReporter::new().report_error(&e);
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<StreamStats, CoreError> {
    let settings = RuntimeSettings::from_env();
    tracing::info!("Loading config from {}", settings.config_path.display());
    let config = AppConfig::load(&settings.config_path)?;

    let hub = NotificationHub::from_descriptors(&config.notifications)?;
    let client = RedditClient::new(RedditOAuth2Config::from_credentials(&config.reddit))?;

    let mut coordinator = StreamCoordinator::new(client.clone(), hub, config.subreddits)
        .with_settings(CoordinatorSettings::from(&settings));

    let stats = coordinator
        .run(wait_for_interrupt(tokio::signal::ctrl_c()))
        .await?;

    tracing::debug!("Reddit API: {}", client.api().metrics_summary().await);
    Ok(stats)
}

/// Resolves on Ctrl-C. A handler that cannot be installed is logged and
/// stops the service like an interrupt.
async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Unable to listen for the interrupt signal, stopping: {}", e);
    }
}
