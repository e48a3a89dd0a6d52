use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fleetwatch::{
    anchors::AnchorStore,
    cache::StatusCache,
    config::{Config, StorageConfig, read_config_file},
    discord::{DiscordClient, DiscordPresenter},
    monitors::build_monitors,
    scheduler::{Scheduler, SchedulerSettings},
    storage::{UptimeStore, memory::MemoryUptimeStore},
    util::{
        get_channel_id, get_discord_token, get_log_level, get_update_interval,
        get_uptime_check_interval,
    },
};
use tracing::{error, info, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "hosts.json")]
    file: String,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("fleetwatch", get_log_level()),
        ("tower_http", get_log_level()),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let token = get_discord_token().context("DISCORD_TOKEN is not set")?;
    let channel_id = get_channel_id().context("CHANNEL_ID is not set")?;

    let mut config = read_config_file(&args.file)?;
    apply_env_overrides(&mut config);

    let monitors = build_monitors(&config.hosts, &config.monitor);
    let identities = monitors
        .iter()
        .map(|monitor| monitor.identity().clone())
        .collect::<Vec<_>>();
    info!("monitoring {} hosts", identities.len());

    let store = open_store(&config.storage).await?;
    let cache = Arc::new(StatusCache::new(&monitors));
    let anchors = Arc::new(AnchorStore::load(
        &config.discord.anchors_file,
        identities.iter().map(|identity| identity.name.as_str()),
    ));

    let client = DiscordClient::new(&config.discord.api_base, &token, &channel_id);
    let presenter = Arc::new(DiscordPresenter::new(client, config.monitor.history_hours));

    #[cfg(feature = "api")]
    if config.api.enabled {
        let state = fleetwatch::api::ApiState::new(
            identities.clone(),
            cache.clone(),
            store.clone(),
            config.monitor.refresh_interval(),
            config.monitor.history_hours,
        );
        fleetwatch::api::spawn_api_server(config.api.bind_addr, state).await?;
    }

    let scheduler = Arc::new(Scheduler::new(
        monitors,
        cache,
        store.clone(),
        presenter,
        anchors,
        SchedulerSettings::from(&config.monitor),
    ));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    let result = scheduler.run(shutdown).await;

    if let Err(e) = store.close().await {
        warn!("failed to close uptime store: {e}");
    }

    result.context("presenter failed")
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(secs) = get_update_interval() {
        info!("UPDATE_INTERVAL overrides refresh interval: {secs}s");
        config.monitor.refresh_interval_secs = secs;
    }
    if let Some(secs) = get_uptime_check_interval() {
        info!("UPTIME_CHECK_INTERVAL overrides liveness interval: {secs}s");
        config.monitor.liveness_interval_secs = secs;
    }
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn UptimeStore>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory uptime history");
            Ok(Arc::new(MemoryUptimeStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let store = fleetwatch::storage::sqlite::SqliteUptimeStore::new(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            info!("using sqlite uptime history at {}", path.display());
            match store.get_stats().await {
                Ok(stats) => info!("{stats}"),
                Err(e) => warn!("failed to collect storage stats: {e}"),
            }
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}
