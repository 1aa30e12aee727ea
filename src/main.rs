/// Sightline - visibility and moderation decision service
///
/// Resolves, for a viewer and a content item, whether the item may be seen,
/// edited, deleted, or appealed: visibility levels, custom include/exclude
/// lists, blocks, moderation overrides, and the appeal workflow.

mod account;
mod admin;
mod api;
mod appeal;
mod config;
mod content;
mod context;
mod db;
mod error;
mod moderation;
mod policy;
mod post_tags;
mod relationship;
mod server;
mod tags;
mod visibility;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sightline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}
