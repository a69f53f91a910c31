//! moodtrack - find out what your music feels like.
//!
//! Uploads a track to an emotion analysis service and shows the moods it hears.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if moodtrack::cli::is_verbose() {
        "moodtrack=info"
    } else {
        "moodtrack=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    moodtrack::cli::run().await
}
