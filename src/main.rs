mod remote;
mod store;
mod sync;

use std::sync::Arc;

use chrono::{Days, Utc};
use tracing::{error, info, warn};

use crate::remote::GraphCalendarClient;
use crate::store::{ConfigStore, FileConfigStore, FileEventStore, SyncConfig};
use crate::sync::{SyncEngine, SyncEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::time())
        .init();

    info!("Starting calendar sync service");

    let Ok(access_token) = std::env::var("CALSYNC_ACCESS_TOKEN") else {
        error!("CALSYNC_ACCESS_TOKEN is not set");
        return;
    };
    let base_url = std::env::var("CALSYNC_API_URL")
        .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string());
    let data_dir = std::env::var("CALSYNC_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let force_full = std::env::var("CALSYNC_FORCE_FULL").is_ok_and(|v| v == "1");

    let client = match GraphCalendarClient::new(base_url, access_token) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create calendar client: {e}");
            return;
        }
    };

    let config_store = Arc::new(FileConfigStore::new(&data_dir));
    let event_store = Arc::new(FileEventStore::new(&data_dir));

    if let Ok(timezone) = std::env::var("CALSYNC_TIMEZONE") {
        if let Err(e) = config_store.set_timezone(&timezone).await {
            error!("Failed to persist timezone: {e}");
            return;
        }
    }

    // First run without a configured window: sync a month back and two
    // months ahead.
    match config_store.sync_config().await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let today = Utc::now().date_naive();
            let default_window = SyncConfig {
                start_date: today - Days::new(30),
                end_date: today + Days::new(60),
            };
            info!(
                "No sync window configured, defaulting to {} - {}",
                default_window.start_date, default_window.end_date
            );
            if let Err(e) = config_store.set_sync_config(&default_window).await {
                error!("Failed to persist default sync window: {e}");
                return;
            }
        }
        Err(e) => {
            error!("Failed to read sync configuration: {e}");
            return;
        }
    }

    let engine = SyncEngine::new(Arc::new(client), event_store, config_store);

    let (subscriber, mut events) = engine.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SyncEvent::Progress { stage, completed, total, message } => {
                    if total > 0 {
                        info!("[{stage}] {message} ({completed}/{total})");
                    } else {
                        info!("[{stage}] {message}");
                    }
                }
                SyncEvent::Completed { .. } => break,
            }
        }
    });

    match engine.start_sync(force_full).await {
        Ok(result) => {
            info!(
                "Sync {:?} via {}: {}",
                result.status,
                result.strategy.as_str(),
                result.message
            );
            for item in &result.errors {
                warn!("Partial failure: {item}");
            }
        }
        Err(e) => error!("Sync failed to start: {e}"),
    }

    engine.unsubscribe(subscriber);
    let _ = printer.await;
}
