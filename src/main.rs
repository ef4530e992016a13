use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smartmall_notify::config::{CliConfig, FileConfig, NotifyConfig};
use smartmall_notify::notifier::TracingSurface;
use smartmall_notify::{NotificationFacade, Session};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Id of the user to watch notifications for.
    #[clap(long)]
    pub user_id: String,

    /// Bearer token used for the REST API and the push handshake.
    #[clap(long)]
    pub token: String,

    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Root of the REST API, e.g. http://localhost:8080/api/v1
    #[clap(long)]
    pub api_url: Option<String>,

    /// Push endpoint. Derived from --api-url when omitted.
    #[clap(long)]
    pub ws_url: Option<String>,

    /// Number of notifications per history page.
    #[clap(long)]
    pub page_size: Option<u32>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            api_base_url: self.api_url.clone(),
            ws_url: self.ws_url.clone(),
            page_size: self.page_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = NotifyConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    info!(
        "Using REST API at {} and push endpoint {}",
        config.api_base_url, config.ws_url
    );

    let session = Session::new(cli_args.user_id.clone(), cli_args.token.clone());
    let facade = Arc::new(
        NotificationFacade::from_config(&config, &session, Arc::new(TracingSurface))
            .context("Failed to build notification client")?,
    );

    let mut connection = facade.watch_connection();
    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let state = connection.borrow_and_update().clone();
            if state.is_offline() {
                warn!("Live updates unavailable: {}", state);
            } else {
                info!("Connection {}", state);
            }
        }
    });

    facade
        .mount(&session)
        .await
        .context("Failed to start notification watcher")?;

    let snapshot = facade.snapshot();
    info!(
        "{} notifications loaded, {} unread",
        snapshot.notifications.len(),
        snapshot.unread_count
    );
    for notification in &snapshot.notifications {
        println!(
            "{} [{:?}] {}: {}",
            notification.created_at, notification.status, notification.title, notification.message
        );
    }

    let mut store = facade.watch_store();
    let mut seen_head = snapshot.notifications.first().map(|n| n.id.clone());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = store.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.borrow_and_update().clone();
                let head = snapshot.notifications.first().map(|n| n.id.clone());
                if head != seen_head {
                    if let Some(n) = snapshot.notifications.first() {
                        println!("NEW {} [{}] {}: {}", n.created_at, n.notification_type, n.title, n.message);
                    }
                    seen_head = head;
                }
            }
        }
    }

    facade.teardown();
    Ok(())
}
