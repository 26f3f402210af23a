//! # Marquee Player
//!
//! Headless display player. Runs the sync core and a stand-in renderer that
//! logs what it would show and reports every slide finished once its
//! duration has elapsed.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          RUST_LOG, default info,marquee_sync=debug   │
//! │  2. PlayerConfig::load      [path arg] or the platform config dir       │
//! │  3. token store             token_file ? JSON file : memory (env seed)  │
//! │  4. PlayerAgent::start      sync loop, scheduler, refresher             │
//! │  5. simulated renderer      until Ctrl+C                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use marquee_sync::{
    ChannelEmitter, JsonFileTokenStore, MemoryTokenStore, PlayerAgent, PlayerConfig, PlayerEvent,
    SchedulerHandle, TokenState, TokenStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PlayerConfig::load(config_path).context("loading player configuration")?;
    let tokens = token_store(&config).context("opening token store")?;

    let (emitter, events) = ChannelEmitter::new();
    let handle = match PlayerAgent::from_config(config, tokens, Arc::new(emitter))
        .and_then(PlayerAgent::start)
    {
        Ok(handle) => handle,
        Err(e) if e.is_config_error() => {
            error!(error = %e, "Fix the player configuration (or MARQUEE_* overrides) and restart");
            return Err(e.into());
        }
        Err(e) => return Err(anyhow::Error::new(e).context("starting player agent")),
    };

    let renderer = tokio::spawn(simulated_renderer(events, handle.scheduler().clone()));

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    info!("Shutdown requested");

    handle.shutdown().await?;
    renderer.abort();
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=marquee_sync=trace` - Trace the sync crate only
/// - Default: info, debug for marquee_sync
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,marquee_sync=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// A JSON file store when configured, otherwise memory seeded from
/// `MARQUEE_TOKEN` / `MARQUEE_REFRESH_TOKEN`.
fn token_store(config: &PlayerConfig) -> anyhow::Result<Arc<dyn TokenStore>> {
    if let Some(path) = &config.credentials.token_file {
        info!(path = %path.display(), "Using token file");
        let store = JsonFileTokenStore::new(path);
        // Fail early on an unreadable file.
        store.load()?;
        return Ok(Arc::new(store));
    }

    let refresh_token = std::env::var("MARQUEE_REFRESH_TOKEN").ok();
    let mut state = match std::env::var("MARQUEE_TOKEN") {
        // The refresher needs the token's iat/exp to know when to renew it.
        Ok(token) => TokenState::from_jwt(token, refresh_token).context("reading MARQUEE_TOKEN")?,
        Err(_) => {
            warn!("No token configured, requests will be unauthenticated");
            TokenState {
                refresh_token,
                ..Default::default()
            }
        }
    };
    state.tenant_key = config.api.tenant_key.clone();
    Ok(Arc::new(MemoryTokenStore::new(state)))
}

/// Stands in for the renderer: one timer per region for the slide on screen.
async fn simulated_renderer(mut events: UnboundedReceiver<PlayerEvent>, scheduler: SchedulerHandle) {
    let mut playing: HashMap<String, (String, JoinHandle<()>)> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            PlayerEvent::ScreenChanged(screen) => {
                info!(
                    screen_id = %screen.id,
                    regions = ?screen.region_ids,
                    campaign = screen.has_active_campaign,
                    "Screen layout"
                );
            }
            PlayerEvent::RegionReady { region_id } => {
                info!(region_id = %region_id, "Region ready");
            }
            PlayerEvent::RegionSlides { region_id, slides } => {
                let Some(head) = slides.first() else {
                    if let Some((_, timer)) = playing.remove(&region_id) {
                        timer.abort();
                    }
                    info!(region_id = %region_id, "Region idle");
                    continue;
                };
                if matches!(playing.get(&region_id), Some((id, _)) if *id == head.execution_id) {
                    continue;
                }
                if let Some((_, timer)) = playing.remove(&region_id) {
                    timer.abort();
                }

                info!(
                    region_id = %region_id,
                    slide_id = %head.slide.id,
                    duration_ms = head.duration_ms,
                    queued = slides.len() - 1,
                    "Now playing"
                );

                let timer = {
                    let scheduler = scheduler.clone();
                    let region_id = region_id.clone();
                    let execution_id = head.execution_id.clone();
                    let duration = Duration::from_millis(head.duration_ms);
                    tokio::spawn(async move {
                        tokio::time::sleep(duration).await;
                        if let Err(e) = scheduler.slide_done(region_id, execution_id).await {
                            error!(error = %e, "Failed to report slide finished");
                        }
                    })
                };
                playing.insert(region_id, (head.execution_id.clone(), timer));
            }
            PlayerEvent::RegionRemoved { region_id } => {
                if let Some((_, timer)) = playing.remove(&region_id) {
                    timer.abort();
                }
                info!(region_id = %region_id, "Region removed");
            }
            PlayerEvent::ReauthenticationRequired => {
                warn!("Credentials rejected, the player must be logged in again");
            }
            PlayerEvent::SyncFailed { message } => {
                warn!(message = %message, "Sync failed, showing last known content");
            }
        }
    }

    for (_, (_, timer)) in playing {
        timer.abort();
    }
}
