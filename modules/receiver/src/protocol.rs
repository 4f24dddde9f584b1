// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::transport::FrameCodec;
use common::config::GpsConfig;
use futures::{SinkExt, StreamExt};
use module_core::{Event, EventKind};
use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Handshake magic sent as `"<magic> <version>"` right after the
/// notification channel connects. A negative acknowledgement means the
/// adapter speaks an incompatible protocol version.
pub const MSG_MAGIC: &str = "#SNV#";
pub const MSG_PROTOCOL: &str = "1.1";

// Request tokens on the command channel.
pub const MSG_OPEN: &str = "OPEN";
pub const MSG_CLOSE: &str = "CLOSE";
pub const MSG_GM: &str = "GET_MESSAGES";
pub const MSG_SM: &str = "SEND_MESSAGE";
pub const MSG_NTY: &str = "NOTIFY";
pub const MSG_SHD: &str = "SHUTDOWN";

// Reply tokens.
pub const MSG_POS: &str = "POS";
pub const MSG_NEG: &str = "NEG";
pub const MSG_RM: &str = "RM";

// Notification channel message and the connectivity markers forwarded
// inside reply messages.
pub const MSG_DA: &str = "DA";
pub const MSG_CON_ON: &str = "#ConOn#";
pub const MSG_CON_OFF: &str = "#ConOff#";

/// Hard bound on the poll loop so a babbling adapter can not starve the
/// event loop forever.
const MAX_QUERY_LOOPS: u32 = 250;

type Channel = Framed<TcpStream, FrameCodec>;

/// Result of handing a fresh connection to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptedChannel {
    /// Bound as channel 0, the command/data channel.
    Command,
    /// Bound as channel 1, the notification channel. The caller performs
    /// the protocol handshake next.
    Notification,
    /// Both channels are occupied; the connection was dropped.
    Rejected,
}

/// Typed request/reply and notification API over the two adapter channels.
///
/// All request/reply exchanges block the caller until the adapter answers;
/// they are bounded only by the adapter itself. Transport errors close the
/// affected channel; reconnection is left to the supervisor restarting the
/// adapter.
pub struct AdapterClient {
    cmd: Option<Channel>,
    notify: Option<Channel>,
    last_query: Instant,
}

impl AdapterClient {
    pub fn new() -> Self {
        AdapterClient {
            cmd: None,
            notify: None,
            last_query: Instant::now(),
        }
    }

    /// Binds an accepted connection to the next free channel. The adapter
    /// always connects the command channel first, then the notification
    /// channel.
    pub fn accept(&mut self, stream: TcpStream) -> AcceptedChannel {
        if self.cmd.is_none() {
            self.cmd = Some(Framed::new(stream, FrameCodec));
            return AcceptedChannel::Command;
        }
        if self.notify.is_none() {
            self.notify = Some(Framed::new(stream, FrameCodec));
            return AcceptedChannel::Notification;
        }
        AcceptedChannel::Rejected
    }

    pub fn is_connected(&self) -> bool {
        self.cmd.is_some()
    }

    pub fn has_notification_channel(&self) -> bool {
        self.notify.is_some()
    }

    /// Drops both channels; a restarted adapter reconnects from scratch.
    pub fn close(&mut self) {
        self.cmd = None;
        self.notify = None;
    }

    pub fn last_query_elapsed(&self) -> Duration {
        self.last_query.elapsed()
    }

    /// One synchronous request/reply exchange on the command channel.
    /// Any transport error closes the channel and is propagated.
    pub async fn request(&mut self, msg: &str) -> io::Result<String> {
        let Some(channel) = self.cmd.as_mut() else {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "command channel not connected",
            ));
        };
        if let Err(e) = channel.send(msg.to_owned()).await {
            self.cmd = None;
            return Err(e);
        }
        match channel.next().await {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => {
                self.cmd = None;
                Err(e)
            }
            None => {
                self.cmd = None;
                Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "adapter closed the command channel",
                ))
            }
        }
    }

    /// Protocol version handshake, sent once after the notification channel
    /// connected. On a version mismatch the session is abandoned; no
    /// further requests go out until the supervisor restarts the adapter.
    pub async fn handshake(&mut self) -> io::Result<()> {
        let reply = self.request(&format!("{MSG_MAGIC} {MSG_PROTOCOL}")).await?;
        if reply == MSG_NEG {
            warn!("Adapter protocol version mismatch, abandoning session");
            self.close();
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "protocol version mismatch",
            ));
        }
        Ok(())
    }

    /// Opens the receiver device on the adapter and subscribes to data
    /// notifications. An empty device means a platform location service;
    /// the open request then carries no arguments.
    pub async fn start_receiving(&mut self, config: &GpsConfig) -> io::Result<()> {
        let open = if config.device.is_empty() {
            MSG_OPEN.to_owned()
        } else {
            format!("{MSG_OPEN} {} {}", config.device, config.baud)
        };
        let reply = self.request(&open).await?;
        if reply == MSG_NEG {
            return Err(io::Error::new(
                ErrorKind::ConnectionRefused,
                "receiver initialization failed",
            ));
        }
        self.request(MSG_NTY).await?;
        self.last_query = Instant::now();
        Ok(())
    }

    /// Stops the receiver on the adapter side.
    pub async fn stop_receiving(&mut self) -> io::Result<()> {
        let reply = self.request(MSG_CLOSE).await?;
        if reply != MSG_POS {
            warn!("Receiver stop not acknowledged");
            return Err(io::Error::new(ErrorKind::Other, "receiver stop failed"));
        }
        Ok(())
    }

    /// Fire-and-forget shutdown request; the adapter exits on its own.
    pub async fn shutdown_adapter(&mut self) {
        if let Some(channel) = self.cmd.as_mut() {
            let _ = channel.send(MSG_SHD.to_owned()).await;
        }
    }

    /// Sends an NMEA sentence to the GPS receiver. The checksum is appended
    /// here; the passed sentence must not carry one.
    pub async fn send_sentence(&mut self, sentence: &str) -> io::Result<()> {
        let framed = sentence_with_checksum(sentence);
        let reply = self.request(&format!("{MSG_SM} {framed}")).await?;
        if reply == MSG_NEG {
            warn!("Sending sentence {framed} to the receiver failed");
            return Err(io::Error::new(ErrorKind::Other, "send sentence failed"));
        }
        Ok(())
    }

    /// Drains all queued messages from the adapter after a notification.
    ///
    /// Reply messages carry either a connectivity marker or a raw NMEA
    /// sentence; both are published on the event bus. The loop ends on the
    /// no-more-data token or after [`MAX_QUERY_LOOPS`] iterations. The
    /// notification subscription is renewed afterwards so the adapter
    /// notifies again on the next data arrival.
    pub async fn query_adapter(
        &mut self,
        sender: &tokio::sync::broadcast::Sender<Event>,
    ) -> io::Result<()> {
        for _ in 0..MAX_QUERY_LOOPS {
            let reply = self.request(MSG_GM).await?;
            if let Some(body) = reply.strip_prefix(MSG_RM) {
                match body.trim_start() {
                    MSG_CON_OFF => {
                        debug!("Adapter reports receiver connection off");
                        let _ = sender.send(Event::new(EventKind::ReceiverDisconnectedEvent));
                    }
                    MSG_CON_ON => {
                        debug!("Adapter reports receiver connection on");
                        let _ = sender.send(Event::new(EventKind::ReceiverConnectedEvent));
                    }
                    sentence => {
                        let _ = sender.send(Event::new(EventKind::RawSentenceEvent(Arc::new(
                            sentence.to_owned(),
                        ))));
                    }
                }
                continue;
            }
            if reply.starts_with(MSG_NEG) {
                break;
            }
            warn!("Unexpected reply token {reply} while polling the adapter");
        }
        self.request(MSG_NTY).await?;
        self.last_query = Instant::now();
        Ok(())
    }

    /// Reads one message from the notification channel. `None` means the
    /// channel is gone; errors close it.
    pub async fn read_notification(&mut self) -> Option<String> {
        let channel = self.notify.as_mut()?;
        match channel.next().await {
            Some(Ok(msg)) => Some(msg),
            Some(Err(e)) => {
                warn!("Notification channel error: {e}");
                self.notify = None;
                None
            }
            None => {
                debug!("Adapter closed the notification channel");
                self.notify = None;
                None
            }
        }
    }
}

impl Default for AdapterClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends `*HH` to a sentence, the running XOR of all bytes between the
/// `$` start marker and the checksum separator.
pub fn sentence_with_checksum(sentence: &str) -> String {
    let body = sentence.strip_prefix('$').unwrap_or(sentence);
    let body = body.strip_suffix('*').unwrap_or(body);
    let sum = body.bytes().fold(0u8, |sum, byte| sum ^ byte);
    format!("${body}*{sum:02X}")
}
