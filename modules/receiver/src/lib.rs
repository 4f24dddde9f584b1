// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Receiver link module.
//!
//! Accepts the two channels of the GPS adapter process on a loopback
//! listener, supervises the adapter's lifetime and forwards every raw
//! NMEA sentence it delivers onto the event bus.

use async_trait::async_trait;
use common::config::GpsConfig;
use module_core::{Event, EventKind, Module, ModuleCtx, payload_ref};
use std::io;
use std::net::Ipv4Addr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub mod protocol;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod tests;

use protocol::{AcceptedChannel, AdapterClient, MSG_DA};
use supervisor::{AdapterSupervisor, SUPERVISION_INTERVAL, Supervision};

pub struct ReceiverModule {
    ctx: ModuleCtx,
    config: GpsConfig,
    listener: TcpListener,
    supervisor: AdapterSupervisor,
    client: AdapterClient,
}

impl ReceiverModule {
    /// Binds the loopback listener the adapter connects back to. With a
    /// configured port of 0 the OS picks one; [`Self::port`] reports it.
    pub async fn new(ctx: ModuleCtx, config: GpsConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, config.port)).await?;
        let port = listener.local_addr()?.port();
        let supervisor = AdapterSupervisor::new(&config, port);
        Ok(ReceiverModule {
            ctx,
            config,
            listener,
            supervisor,
            client: AdapterClient::new(),
        })
    }

    pub fn port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    async fn handle_event(&mut self, event: &Event) {
        if let Some(sentence) = payload_ref!(event.kind, EventKind::SendSentenceEvent) {
            if !self.client.is_connected() {
                warn!("Dropping sentence {sentence}, adapter not connected");
                return;
            }
            if let Err(e) = self.client.send_sentence(sentence).await {
                warn!("Failed to send sentence to the receiver: {e}");
            }
        }
    }

    async fn on_accept(&mut self, stream: TcpStream) {
        match self.client.accept(stream) {
            AcceptedChannel::Command => {
                debug!("Adapter command channel connected");
            }
            AcceptedChannel::Notification => {
                debug!("Adapter notification channel connected");
                if let Err(e) = self.client.handshake().await {
                    warn!("Adapter handshake failed: {e}");
                    return;
                }
                if let Err(e) = self.client.start_receiving(&self.config).await {
                    warn!("Failed to start the receiver: {e}");
                    self.ctx.publish(EventKind::ReceiverInitFailedEvent);
                    return;
                }
                info!("Receiver started on device {}", self.config.device);
            }
            AcceptedChannel::Rejected => {
                warn!("Rejected surplus adapter connection");
            }
        }
    }

    /// Periodic supervision pass. Restarts a dead adapter and, as a
    /// watchdog, polls the adapter when no data arrived for a whole
    /// supervision interval. The simulator device delivers data at its
    /// own pace, so it is exempt from the watchdog.
    async fn on_supervision_tick(&mut self) {
        match self.supervisor.ensure_running(&self.ctx.sender) {
            Supervision::Alive | Supervision::Down => {}
            Supervision::Spawned => {
                // Channels of a previous adapter process are stale; an
                // externally started adapter (spawning disabled) keeps
                // its session untouched.
                self.client.close();
                return;
            }
        }
        if self.client.is_connected()
            && !self.config.is_simulator()
            && self.client.last_query_elapsed() >= SUPERVISION_INTERVAL
        {
            debug!("No data from the adapter recently, polling");
            if let Err(e) = self.client.query_adapter(&self.ctx.sender).await {
                warn!("Watchdog poll failed: {e}");
            }
        }
    }

    async fn on_notification(&mut self, msg: String) {
        if msg != MSG_DA {
            warn!("Unexpected notification {msg}");
            return;
        }
        if let Err(e) = self.client.query_adapter(&self.ctx.sender).await {
            warn!("Polling the adapter failed: {e}");
        }
    }

    /// Orderly teardown: stop the receiver, ask the adapter to exit and
    /// reap it with a bounded wait.
    async fn shutdown(&mut self) {
        self.supervisor.request_shutdown();
        if self.client.is_connected() {
            let _ = self.client.stop_receiving().await;
            self.client.shutdown_adapter().await;
        }
        self.client.close();
        self.supervisor.shutdown().await;
    }
}

#[async_trait]
impl Module for ReceiverModule {
    async fn run(&mut self) -> Result<(), ()> {
        let mut supervision = tokio::time::interval(SUPERVISION_INTERVAL);
        supervision.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                event = self.ctx.receiver.recv() => {
                    match event {
                        Ok(event) => {
                            if event.kind == EventKind::QuitEvent {
                                self.shutdown().await;
                                return Ok(());
                            }
                            self.handle_event(&event).await;
                        }
                        Err(e) => {
                            error!("Receiver module lost the event bus: {e}");
                            return Err(());
                        }
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => self.on_accept(stream).await,
                        Err(e) => warn!("Accepting an adapter connection failed: {e}"),
                    }
                }
                msg = self.client.read_notification(),
                    if self.client.has_notification_channel() =>
                {
                    if let Some(msg) = msg {
                        self.on_notification(msg).await;
                    }
                }
                _ = supervision.tick() => {
                    self.on_supervision_tick().await;
                }
            }
        }
    }
}
