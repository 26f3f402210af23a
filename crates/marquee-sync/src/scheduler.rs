//! # Region Scheduler
//!
//! Actor owning one [`RegionRotation`] per region. All commands for all
//! regions go through one channel, so advances on a region are serialized
//! and always observe the latest content update.
//!
//! ## Message Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PlayerAgent ── UpdateRegion ──┐                                       │
//! │  PlayerAgent ── RemoveRegion ──┼──► ┌──────────────────────┐           │
//! │  Renderer ──── SlideDone ──────┘    │   RegionScheduler    │           │
//! │                                     │                      │           │
//! │                                     │  R1 → RegionRotation │           │
//! │                                     │  R2 → RegionRotation │           │
//! │                                     └──────────┬───────────┘           │
//! │                                                │                       │
//! │        RegionReady / RegionSlides / RegionRemoved                       │
//! │                                                ▼                       │
//! │                                        RendererEmitter                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use marquee_core::{
    PlaylistDescriptor, RegionRotation, RotationChange, RotationState, ScheduledSlide,
    SlideDescriptor,
};

use crate::error::{SyncError, SyncResult};
use crate::events::{PlayerEvent, RendererEmitter};

/// Command channel capacity.
const COMMAND_BUFFER: usize = 256;

/// Commands for the scheduler.
#[derive(Debug)]
enum SchedulerCommand {
    UpdateRegion {
        region_id: String,
        playlists: Vec<PlaylistDescriptor>,
    },
    SlideDone {
        region_id: String,
        execution_id: String,
    },
    RemoveRegion {
        region_id: String,
    },
    Scheduled {
        region_id: String,
        reply: oneshot::Sender<Vec<ScheduledSlide>>,
    },
    Shutdown,
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for sending commands to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Replaces a region's content, creating the region on first use.
    pub async fn update_region(
        &self,
        region_id: impl Into<String>,
        playlists: Vec<PlaylistDescriptor>,
    ) -> SyncResult<()> {
        self.send(SchedulerCommand::UpdateRegion {
            region_id: region_id.into(),
            playlists,
        })
        .await
    }

    /// Reports that the renderer finished showing a slide instance.
    pub async fn slide_done(
        &self,
        region_id: impl Into<String>,
        execution_id: impl Into<String>,
    ) -> SyncResult<()> {
        self.send(SchedulerCommand::SlideDone {
            region_id: region_id.into(),
            execution_id: execution_id.into(),
        })
        .await
    }

    /// Tears a region down, discarding its rotation state.
    pub async fn remove_region(&self, region_id: impl Into<String>) -> SyncResult<()> {
        self.send(SchedulerCommand::RemoveRegion {
            region_id: region_id.into(),
        })
        .await
    }

    /// The region's current rotation buffer.
    pub async fn scheduled(&self, region_id: impl Into<String>) -> SyncResult<Vec<ScheduledSlide>> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Scheduled {
            region_id: region_id.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| SyncError::ChannelError("Scheduler reply dropped".into()))
    }

    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(SchedulerCommand::Shutdown).await
    }

    async fn send(&self, cmd: SchedulerCommand) -> SyncResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SyncError::ChannelError("Scheduler channel closed".into()))
    }
}

// =============================================================================
// Region Scheduler
// =============================================================================

pub struct RegionScheduler {
    default_duration_ms: u64,
    emitter: Arc<dyn RendererEmitter>,
    regions: HashMap<String, RegionRotation>,
}

impl RegionScheduler {
    pub fn new(default_duration_ms: u64, emitter: Arc<dyn RendererEmitter>) -> Self {
        RegionScheduler {
            default_duration_ms,
            emitter,
            regions: HashMap::new(),
        }
    }

    /// Spawns the scheduler and returns its handle.
    pub fn start(self) -> SchedulerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        SchedulerHandle { cmd_tx }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SchedulerCommand>) {
        info!("Region scheduler started");

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SchedulerCommand::Shutdown => {
                    info!(regions = self.regions.len(), "Region scheduler shutting down");
                    break;
                }
                SchedulerCommand::UpdateRegion {
                    region_id,
                    playlists,
                } => self.handle_update(region_id, playlists),
                SchedulerCommand::SlideDone {
                    region_id,
                    execution_id,
                } => self.handle_slide_done(&region_id, &execution_id),
                SchedulerCommand::RemoveRegion { region_id } => self.handle_remove(&region_id),
                SchedulerCommand::Scheduled { region_id, reply } => {
                    let slides = self
                        .regions
                        .get(&region_id)
                        .map(RegionRotation::scheduled)
                        .unwrap_or_default();
                    // The caller may have given up waiting.
                    let _ = reply.send(slides);
                }
            }
        }

        self.regions.clear();
        info!("Region scheduler stopped");
    }

    fn handle_update(&mut self, region_id: String, playlists: Vec<PlaylistDescriptor>) {
        let default_duration_ms = self.default_duration_ms;
        let rotation = self
            .regions
            .entry(region_id.clone())
            .or_insert_with(|| RegionRotation::new(region_id.clone(), default_duration_ms));

        let was_empty = rotation.state() == RotationState::Empty;
        let before = slide_sequence(&rotation.scheduled());

        match rotation.update(playlists, &Local::now()) {
            RotationChange::Started(slides) => {
                info!(region_id = %region_id, count = slides.len(), "Region rotation started");
                self.emitter.emit(PlayerEvent::RegionReady {
                    region_id: region_id.clone(),
                });
                self.emitter.emit(PlayerEvent::RegionSlides { region_id, slides });
            }
            RotationChange::Rescheduled(slides) => {
                // Same slides in the same order: the renderer's queue is still right.
                if slide_sequence(&slides) == before {
                    debug!(region_id = %region_id, "Region content unchanged");
                    return;
                }
                debug!(region_id = %region_id, count = slides.len(), "Region rescheduled");
                self.emitter.emit(PlayerEvent::RegionSlides { region_id, slides });
            }
            RotationChange::Emptied => {
                if was_empty {
                    return;
                }
                info!(region_id = %region_id, "No schedulable slides in region");
                self.emitter.emit(PlayerEvent::RegionSlides {
                    region_id,
                    slides: Vec::new(),
                });
            }
        }
    }

    fn handle_slide_done(&mut self, region_id: &str, execution_id: &str) {
        let Some(rotation) = self.regions.get_mut(region_id) else {
            warn!(region_id, execution_id, "Slide finished in unknown region");
            return;
        };

        match rotation.advance(execution_id, &Local::now()) {
            None => {
                warn!(region_id, execution_id, "Ignoring stale slide-finished event");
            }
            Some(RotationChange::Emptied) => {
                info!(region_id, "No schedulable slides in region");
                self.emitter.emit(PlayerEvent::RegionSlides {
                    region_id: region_id.to_string(),
                    slides: Vec::new(),
                });
            }
            Some(RotationChange::Started(slides)) | Some(RotationChange::Rescheduled(slides)) => {
                debug!(
                    region_id,
                    execution_id = slides.first().map(|s| s.execution_id.as_str()).unwrap_or(""),
                    "Region advanced"
                );
                self.emitter.emit(PlayerEvent::RegionSlides {
                    region_id: region_id.to_string(),
                    slides,
                });
            }
        }
    }

    fn handle_remove(&mut self, region_id: &str) {
        if self.regions.remove(region_id).is_some() {
            info!(region_id, "Region removed");
            self.emitter.emit(PlayerEvent::RegionRemoved {
                region_id: region_id.to_string(),
            });
        }
    }
}

fn slide_sequence(slides: &[ScheduledSlide]) -> Vec<SlideDescriptor> {
    slides.iter().map(|s| s.slide.clone()).collect()
}
