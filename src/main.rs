use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gmail_counter::config::{Config, DEFAULT_CONFIG_PATH};
use gmail_counter::feed::FeedClient;
use gmail_counter::host::{watch_color, Preferences};
use gmail_counter::poller::{Intervals, Poller, UnloadReason};
use gmail_counter::routes::{self, AppState};
use gmail_counter::toolbar::ToolbarState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gmail_counter=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("GMAIL_COUNTER_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    let toolbar = Arc::new(ToolbarState::new(&config.color));
    let prefs = Arc::new(Preferences::new(config.color.clone()));

    // Keep badge and panel colors in step with the preference
    let color_changes = prefs.subscribe();
    let color_toolbar = toolbar.clone();
    tokio::spawn(async move {
        watch_color(color_changes, &*color_toolbar, &*color_toolbar).await;
    });

    // Start the poller
    let client = FeedClient::new(&config)?;
    let poller = Poller::new(
        client,
        toolbar.clone(),
        toolbar.clone(),
        Intervals::from_config(&config),
    );
    let (unload_tx, unload_rx) = mpsc::channel(1);
    let poller_task = tokio::spawn(poller.run(unload_rx));

    let state = Arc::new(AppState {
        toolbar,
        prefs,
        mail_url: config.mail_url.clone(),
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Server starting on http://{}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    if let Err(e) = unload_tx.send(Some(UnloadReason::Shutdown)).await {
        debug!("Poller already stopped: {}", e);
    }
    poller_task.await?;
    info!("Shut down");

    Ok(())
}
