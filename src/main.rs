use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diskbot::bot::{self, Dispatcher, DispatcherSettings, Telegram, UpdateWorker};
use diskbot::config::BotConfig;
use diskbot::disk::yandex::YandexDisk;
use diskbot::disk::DiskApi;
use diskbot::index::ImageIndex;
use diskbot::likes::LikesStore;
use diskbot::loader::ContentLoader;

const UPDATE_QUEUE_SIZE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;
    info!(
        photo_root = config.disk.photo_root.as_str(),
        folder = config.disk.default_folder.as_str(),
        "starting disk photo bot"
    );

    // -----------------------------
    // Shared state / Dependencies
    // -----------------------------
    let disk: Arc<dyn DiskApi> = Arc::new(YandexDisk::new(&config.disk)?);
    let disk_config = Arc::new(config.disk.clone());

    let index = ImageIndex::new(disk.clone(), disk_config.clone());
    let loader = ContentLoader::new(disk.clone());
    let likes = Arc::new(LikesStore::new(disk, loader.clone(), disk_config));

    let telegram = Arc::new(Telegram::new(&config.telegram, config.disk.timeout)?);
    if let Some(url) = &config.telegram.webhook_url {
        telegram
            .set_webhook(url, config.telegram.webhook_secret.as_deref())
            .await?;
        info!(url = url.as_str(), "webhook registered");
    }

    // The rest of the folder keeps loading in the background.
    if let Err(err) = index.ensure_folder_loaded(&config.disk.default_folder).await {
        warn!(error = %err, "default folder not loaded at startup, will retry on demand");
    }

    let dispatcher = Arc::new(Dispatcher::new(
        index,
        loader,
        likes,
        telegram,
        DispatcherSettings {
            allowed_username: config.allowed_username.clone(),
            default_folder: config.disk.default_folder.clone(),
            open_in_browser_url: config.open_in_browser_url.clone(),
        },
    ));

    let state = bot::AppState {
        worker: UpdateWorker::new(dispatcher, UPDATE_QUEUE_SIZE),
        webhook_secret: config.telegram.webhook_secret.clone(),
    };

    // -----------------------------
    // Routers
    // -----------------------------
    let app = Router::new()
        .merge(bot::webhook::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(addr = config.bind_addr.as_str(), "HTTP listening");

    let listener = TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
