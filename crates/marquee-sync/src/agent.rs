//! # Player Agent
//!
//! Main orchestrator of the player core. Runs the sync loop, feeds the
//! region scheduler and relays everything the renderer must know.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PlayerAgent Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        sync loop                                 │  │
//! │  │                                                                  │  │
//! │  │  SyncEngine.run_cycle ──► ChangeGate.observe                     │  │
//! │  │        │                     │                                   │  │
//! │  │   failure: SyncFailed,       ├── ScreenChanged → renderer        │  │
//! │  │   previous tree kept         ├── removed regions → scheduler     │  │
//! │  │                              └── every region → scheduler        │  │
//! │  │                                                                  │  │
//! │  │  sleep(interval) ─── then the next cycle (never overlapping)     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │RegionScheduler │  │ auth listener  │  │ CredentialRefresher    │    │
//! │  │ (actor)        │  │ 401 → Reauth-  │  │ background half-life   │    │
//! │  │ slide_done ◄───┼──│ enticationReq. │  │ check                  │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{AuthSignal, HttpResourceClient, ResourceClient};
use crate::config::PlayerConfig;
use crate::credentials::CredentialRefresher;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, PlayerEvent, RendererEmitter};
use crate::gate::{ChangeGate, GateDecision};
use crate::scheduler::{RegionScheduler, SchedulerHandle};
use crate::token_store::TokenStore;

// =============================================================================
// Player Status
// =============================================================================

/// Current player status for external queries.
#[derive(Debug, Clone, Default)]
pub struct PlayerStatus {
    /// Screen id reported by the last successful cycle.
    pub screen_id: Option<String>,

    /// Successful cycles since start.
    pub cycles: u64,

    /// Failed cycles since the last success.
    pub consecutive_failures: u32,

    pub last_sync: Option<DateTime<Utc>>,

    pub last_error: Option<String>,

    pub has_active_campaign: bool,

    /// Set by a 401, cleared by the next successful cycle.
    pub reauthentication_required: bool,
}

// =============================================================================
// Player Agent
// =============================================================================

pub struct PlayerAgent {
    config: Arc<PlayerConfig>,
    client: Arc<dyn ResourceClient>,
    auth_signals: Option<broadcast::Receiver<AuthSignal>>,
    refresher: Option<CredentialRefresher>,
    emitter: Arc<dyn RendererEmitter>,
    status: Arc<RwLock<PlayerStatus>>,
}

impl PlayerAgent {
    /// Wires the HTTP client and credential refresher from configuration.
    pub fn from_config(
        config: PlayerConfig,
        tokens: Arc<dyn TokenStore>,
        emitter: Arc<dyn RendererEmitter>,
    ) -> SyncResult<Self> {
        let client = HttpResourceClient::from_config(&config, Arc::clone(&tokens))?;
        let refresh_url = client.url_for(&config.credentials.refresh_path)?;
        let refresher = CredentialRefresher::new(client.http().clone(), refresh_url, tokens);
        let auth_signals = client.subscribe();

        PlayerAgentBuilder::new(config)
            .with_client(Arc::new(client))
            .with_auth_signals(auth_signals)
            .with_refresher(refresher)
            .with_emitter(emitter)
            .build()
    }

    pub async fn status(&self) -> PlayerStatus {
        self.status.read().await.clone()
    }

    /// Starts every background task and returns the control handle.
    pub fn start(self) -> SyncResult<PlayerAgentHandle> {
        self.config.validate()?;

        let entry = self.config.screen_path().to_string();
        let interval = self.config.sync_interval();
        info!(
            screen_path = %entry,
            base_url = %self.config.api.base_url,
            interval_secs = interval.as_secs(),
            "Starting player agent"
        );

        let scheduler = RegionScheduler::new(
            self.config.scheduler.default_slide_duration_ms,
            Arc::clone(&self.emitter),
        )
        .start();

        if let Some(refresher) = &self.refresher {
            refresher.start_background(self.config.refresh_check_interval());
        }

        let auth_task = self.auth_signals.map(|signals| {
            tokio::spawn(Self::auth_listener(
                signals,
                Arc::clone(&self.emitter),
                Arc::clone(&self.status),
            ))
        });

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sync_task = tokio::spawn(Self::sync_loop(
            SyncEngine::new(self.client),
            scheduler.clone(),
            Arc::clone(&self.emitter),
            Arc::clone(&self.status),
            entry,
            interval,
            shutdown_rx,
        ));

        info!("Player agent started");
        Ok(PlayerAgentHandle {
            shutdown_tx,
            status: self.status,
            scheduler,
            refresher: self.refresher,
            sync_task,
            auth_task,
        })
    }

    /// Runs cycles until shutdown. A cycle always finishes (or is dropped by
    /// shutdown) before the interval timer starts.
    async fn sync_loop(
        mut engine: SyncEngine,
        scheduler: SchedulerHandle,
        emitter: Arc<dyn RendererEmitter>,
        status: Arc<RwLock<PlayerStatus>>,
        entry: String,
        interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut gate = ChangeGate::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = Self::run_once(&mut engine, &mut gate, &scheduler, &emitter, &status, &entry) => {}
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Sync loop stopped");
    }

    async fn run_once(
        engine: &mut SyncEngine,
        gate: &mut ChangeGate,
        scheduler: &SchedulerHandle,
        emitter: &Arc<dyn RendererEmitter>,
        status: &Arc<RwLock<PlayerStatus>>,
        entry: &str,
    ) {
        let tree = match engine.run_cycle(entry).await {
            Ok(tree) => tree,
            Err(e) => {
                if e.is_retryable() {
                    warn!(screen_path = entry, error = %e, "Sync cycle failed, retrying next interval");
                } else {
                    error!(screen_path = entry, error = %e, "Sync cycle failed, keeping previous content");
                }
                {
                    let mut s = status.write().await;
                    s.consecutive_failures += 1;
                    s.last_error = Some(e.to_string());
                }
                emitter.emit(PlayerEvent::SyncFailed {
                    message: e.to_string(),
                });
                return;
            }
        };

        {
            let mut s = status.write().await;
            s.screen_id = Some(tree.id.clone());
            s.cycles += 1;
            s.consecutive_failures = 0;
            s.last_sync = Some(Utc::now());
            s.last_error = None;
            s.has_active_campaign = tree.has_active_campaign;
            s.reauthentication_required = false;
        }

        match gate.observe(&tree) {
            Ok(GateDecision::ScreenChanged {
                coarse,
                removed_regions,
            }) => {
                info!(
                    screen_id = %tree.id,
                    regions = coarse.region_ids.len(),
                    campaign = coarse.has_active_campaign,
                    "Screen changed"
                );
                emitter.emit(PlayerEvent::ScreenChanged(coarse));
                for region_id in removed_regions {
                    if let Err(e) = scheduler.remove_region(region_id).await {
                        error!(error = %e, "Failed to remove region");
                    }
                }
            }
            Ok(GateDecision::RegionOnlyChanged) => {
                debug!(screen_id = %tree.id, "Region content changed");
            }
            Ok(GateDecision::Unchanged) => {
                debug!(screen_id = %tree.id, "Screen unchanged");
            }
            Err(e) => warn!(error = %e, "Change detection failed"),
        }

        // Always forwarded: publication windows move with the clock.
        for region in &tree.regions {
            if let Err(e) = scheduler
                .update_region(region.region_id.clone(), region.playlists.clone())
                .await
            {
                error!(region_id = %region.region_id, error = %e, "Failed to update region");
            }
        }
    }

    /// Forwards 401 signals to the renderer, once per episode.
    async fn auth_listener(
        mut signals: broadcast::Receiver<AuthSignal>,
        emitter: Arc<dyn RendererEmitter>,
        status: Arc<RwLock<PlayerStatus>>,
    ) {
        loop {
            match signals.recv().await {
                Ok(AuthSignal::Rejected { path }) => {
                    let first = {
                        let mut s = status.write().await;
                        !std::mem::replace(&mut s.reauthentication_required, true)
                    };
                    if first {
                        warn!(path = %path, "Credentials rejected, reauthentication required");
                        emitter.emit(PlayerEvent::ReauthenticationRequired);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Auth signals lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running PlayerAgent.
pub struct PlayerAgentHandle {
    shutdown_tx: mpsc::Sender<()>,
    status: Arc<RwLock<PlayerStatus>>,
    scheduler: SchedulerHandle,
    refresher: Option<CredentialRefresher>,
    sync_task: JoinHandle<()>,
    auth_task: Option<JoinHandle<()>>,
}

impl PlayerAgentHandle {
    pub async fn status(&self) -> PlayerStatus {
        self.status.read().await.clone()
    }

    /// Relays the renderer's "slide finished" report.
    pub async fn slide_done(&self, region_id: &str, execution_id: &str) -> SyncResult<()> {
        self.scheduler.slide_done(region_id, execution_id).await
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Stops the sync loop, the scheduler and the credential refresher.
    pub async fn shutdown(self) -> SyncResult<()> {
        info!("Shutting down player agent");

        // The loop may already have exited.
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.sync_task.await {
            warn!(error = %e, "Sync loop ended abnormally");
        }

        if let Some(task) = self.auth_task {
            task.abort();
        }
        if let Some(refresher) = &self.refresher {
            refresher.stop();
        }
        match self.scheduler.shutdown().await {
            Ok(()) | Err(SyncError::ChannelError(_)) => {}
            Err(e) => return Err(e),
        }

        info!("Player agent stopped");
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a PlayerAgent with options.
pub struct PlayerAgentBuilder {
    config: PlayerConfig,
    client: Option<Arc<dyn ResourceClient>>,
    auth_signals: Option<broadcast::Receiver<AuthSignal>>,
    refresher: Option<CredentialRefresher>,
    emitter: Option<Arc<dyn RendererEmitter>>,
}

impl PlayerAgentBuilder {
    pub fn new(config: PlayerConfig) -> Self {
        PlayerAgentBuilder {
            config,
            client: None,
            auth_signals: None,
            refresher: None,
            emitter: None,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Source of 401 signals, usually `HttpResourceClient::subscribe()`.
    pub fn with_auth_signals(mut self, signals: broadcast::Receiver<AuthSignal>) -> Self {
        self.auth_signals = Some(signals);
        self
    }

    pub fn with_refresher(mut self, refresher: CredentialRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn RendererEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn build(self) -> SyncResult<PlayerAgent> {
        let client = self
            .client
            .ok_or_else(|| SyncError::InvalidConfig("Resource client required".into()))?;

        Ok(PlayerAgent {
            config: Arc::new(self.config),
            client,
            auth_signals: self.auth_signals,
            refresher: self.refresher,
            emitter: self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter)),
            status: Arc::new(RwLock::new(PlayerStatus::default())),
        })
    }
}
