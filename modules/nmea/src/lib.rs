// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! NMEA decoding module.
//!
//! Consumes the raw sentences the receiver module publishes, maintains the
//! canonical navigation fix and the link liveness state, and republishes
//! every real change as a typed event.

use async_trait::async_trait;
use chrono::Utc;
use common::config::{GpsConfig, LastFix};
use module_core::{EventKind, Module, ModuleCtx};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub mod decoder;
pub mod hot_start;
pub mod link;

#[cfg(test)]
mod tests;

use decoder::Decoder;
use link::{FIX_TIMEOUT, LinkMonitor};

pub struct NmeaModule {
    ctx: ModuleCtx,
    config: GpsConfig,
    config_path: Option<PathBuf>,
    decoder: Decoder,
    link: LinkMonitor,
    hot_start_pending: bool,
}

impl NmeaModule {
    pub fn new(ctx: ModuleCtx, config: GpsConfig) -> Self {
        let decoder = Decoder::new(&config);
        let hot_start_pending = config.hard_start || config.soft_start;
        NmeaModule {
            ctx,
            config,
            config_path: None,
            decoder,
            link: LinkMonitor::new(),
            hot_start_pending,
        }
    }

    /// Enables writing the last known fix back into the given config file
    /// on shutdown.
    pub fn with_config_path(ctx: ModuleCtx, config: GpsConfig, path: PathBuf) -> Self {
        let mut module = NmeaModule::new(ctx, config);
        module.config_path = Some(path);
        module
    }

    /// Decodes one raw sentence and publishes the resulting change events.
    /// Returns true when the fix timer must be restarted.
    fn on_sentence(&mut self, line: &str) -> bool {
        let changes = match self.decoder.decode(line) {
            Ok(changes) => changes,
            Err(e) => {
                warn!("Dropping sentence {line}: {e}");
                return false;
            }
        };

        if let Some(status) = self.link.on_data() {
            self.ctx.publish(EventKind::GpsStatusEvent(status));
        }
        if changes.fix_valid
            && let Some(status) = self.link.on_fix()
        {
            self.ctx.publish(EventKind::GpsStatusEvent(status));
        }

        let fix = self.decoder.fix();
        if changes.new_fix {
            self.ctx.publish(EventKind::NewFixEvent(fix.time));
        }
        if changes.position
            && let Some(point) = fix.position
        {
            self.ctx
                .publish(EventKind::PositionChangedEvent(Arc::new(point)));
        }
        if changes.altitude {
            self.ctx
                .publish(EventKind::AltitudeChangedEvent(Arc::new(fix.altitudes)));
        }
        if changes.velocity {
            self.ctx
                .publish(EventKind::VelocityChangedEvent(Arc::new(fix.velocity)));
        }
        if changes.constellation {
            self.ctx
                .publish(EventKind::SatConstellationEvent(Arc::new(
                    fix.sat_info.clone(),
                )));
        }
        if changes.sats_in_view {
            self.ctx.publish(EventKind::SatsInViewEvent(Arc::new(
                fix.sats_in_view.clone(),
            )));
        }
        if let Some(utc) = changes.clock_sync {
            info!("Requesting system clock sync to {utc} UTC");
            self.ctx.publish(EventKind::ClockSyncEvent(Arc::new(utc)));
            // The clock jump may fake a connection loss right after.
            self.link.suppress_next_connection_loss();
        }
        changes.fix_valid || changes.clock_sync.is_some()
    }

    /// First sign of life from the receiver; a configured hot start is
    /// sent exactly once per run.
    fn on_receiver_connected(&mut self) {
        if !self.hot_start_pending {
            return;
        }
        self.hot_start_pending = false;
        self.ctx.publish(EventKind::SendSentenceEvent(Arc::new(
            hot_start::debug_toggle(true),
        )));
        if let Some(init) = hot_start::initialization(&self.config, Utc::now().timestamp()) {
            info!("Sending receiver hot start");
            self.ctx
                .publish(EventKind::SendSentenceEvent(Arc::new(init)));
        }
    }

    fn on_connection_lost(&mut self) {
        if let Some(status) = self.link.on_connection_lost() {
            self.decoder.reset_fix();
            self.ctx.publish(EventKind::GpsStatusEvent(status));
        }
    }

    fn on_fix_timeout(&mut self) {
        if let Some(status) = self.link.on_fix_timeout() {
            self.decoder.reset_fix();
            self.ctx.publish(EventKind::GpsStatusEvent(status));
        }
    }

    /// Writes the last known fix back into the config file so the next run
    /// can hot-start the receiver.
    async fn persist_last_fix(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        let fix = self.decoder.fix();
        if let Some(point) = fix.position {
            let previous = self.config.last_fix.unwrap_or_default();
            self.config.last_fix = Some(LastFix {
                lat: point.lat,
                lon: point.lon,
                altitude: fix.altitudes.msl.meters().round() as i32,
                clock_offset: previous.clock_offset,
            });
        }
        match GpsConfig::to_json(&self.config) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&path, json).await {
                    warn!("Failed to write config {}: {e}", path.display());
                }
            }
            Err(e) => warn!("Failed to serialize config: {e}"),
        }
    }
}

#[async_trait]
impl Module for NmeaModule {
    async fn run(&mut self) -> Result<(), ()> {
        let fix_timer = tokio::time::sleep(FIX_TIMEOUT);
        tokio::pin!(fix_timer);
        // Disarmed until the first valid fix.
        let mut fix_timer_armed = false;
        loop {
            tokio::select! {
                event = self.ctx.receiver.recv() => {
                    match event {
                        Ok(event) => match &event.kind {
                            EventKind::QuitEvent => {
                                self.persist_last_fix().await;
                                return Ok(());
                            }
                            EventKind::RawSentenceEvent(sentence) => {
                                if self.on_sentence(sentence) {
                                    fix_timer.as_mut().reset(Instant::now() + FIX_TIMEOUT);
                                    fix_timer_armed = true;
                                }
                            }
                            EventKind::ReceiverConnectedEvent => {
                                self.on_receiver_connected();
                            }
                            EventKind::ReceiverDisconnectedEvent
                            | EventKind::AdapterCrashedEvent => {
                                self.on_connection_lost();
                            }
                            _ => {}
                        },
                        Err(e) => {
                            error!("NMEA module lost the event bus: {e}");
                            return Err(());
                        }
                    }
                }
                _ = &mut fix_timer, if fix_timer_armed => {
                    fix_timer_armed = false;
                    self.on_fix_timeout();
                }
            }
        }
    }
}
