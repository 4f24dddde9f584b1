// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::ReceiverModule;
use crate::protocol::sentence_with_checksum;
use crate::supervisor::{AdapterSupervisor, Supervision};
use crate::transport::{FrameCodec, MAX_FRAME_LEN};
use bytes::{BufMut, BytesMut};
use common::config::GpsConfig;
use module_core::{EventBus, EventKind, EventKindType};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn codec_roundtrips_a_message() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    codec
        .encode("OPEN /dev/ttyUSB0 4800".to_owned(), &mut buf)
        .unwrap();
    let decoded = codec.decode(&mut buf).unwrap();
    assert_eq!(decoded.as_deref(), Some("OPEN /dev/ttyUSB0 4800"));
    assert!(buf.is_empty());
}

#[test]
fn codec_waits_for_a_complete_frame() {
    let mut codec = FrameCodec;
    let mut full = BytesMut::new();
    codec.encode("NOTIFY".to_owned(), &mut full).unwrap();

    let mut buf = BytesMut::new();
    buf.put_slice(&full[..3]);
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    buf.put_slice(&full[3..7]);
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    buf.put_slice(&full[7..]);
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("NOTIFY"));
}

#[test]
fn codec_rejects_oversized_frames_in_both_directions() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    let oversized = "x".repeat(MAX_FRAME_LEN + 1);
    assert!(codec.encode(oversized, &mut buf).is_err());

    let mut buf = BytesMut::new();
    buf.put_u32_ne((MAX_FRAME_LEN + 1) as u32);
    assert!(codec.decode(&mut buf).is_err());
}

#[test]
fn codec_decodes_back_to_back_frames() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    codec.encode("GET_MESSAGES".to_owned(), &mut buf).unwrap();
    codec.encode("NOTIFY".to_owned(), &mut buf).unwrap();
    assert_eq!(
        codec.decode(&mut buf).unwrap().as_deref(),
        Some("GET_MESSAGES")
    );
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("NOTIFY"));
}

#[test]
fn checksum_matches_known_sentence() {
    assert_eq!(
        sentence_with_checksum("$GPGLL,5057.970,N,00146.110,E,142451,A"),
        "$GPGLL,5057.970,N,00146.110,E,142451,A*27"
    );
}

#[test]
fn checksum_accepts_sentence_without_start_marker() {
    assert_eq!(sentence_with_checksum("PSRF105,1"), "$PSRF105,1*3E");
}

/// Stages a fake adapter script in a fresh directory so the supervisor can
/// find and spawn it.
struct FakeAdapterDir {
    dir: PathBuf,
}

impl FakeAdapterDir {
    fn new(name: &str, script_body: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let exe = dir.join("gpsadapter");
        std::fs::write(&exe, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        FakeAdapterDir { dir }
    }

    fn empty(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        FakeAdapterDir { dir }
    }

    fn config(&self) -> GpsConfig {
        GpsConfig {
            adapter_search_path: self.dir.to_string_lossy().into_owned(),
            ..GpsConfig::default()
        }
    }
}

impl Drop for FakeAdapterDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[test_log::test(tokio::test)]
async fn supervisor_spawns_and_keeps_the_adapter_alive() {
    let stage = FakeAdapterDir::new("receiver-alive", "sleep 30");
    let (sender, _rx) = tokio::sync::broadcast::channel(16);
    let mut supervisor = AdapterSupervisor::new(&stage.config(), 4711);

    assert_eq!(supervisor.ensure_running(&sender), Supervision::Spawned);
    assert!(supervisor.pid().is_some());
    assert_eq!(supervisor.ensure_running(&sender), Supervision::Alive);

    supervisor.kill_adapter().await;
}

#[test_log::test(tokio::test)]
async fn supervisor_detects_a_crash_and_respawns() {
    let stage = FakeAdapterDir::new("receiver-crash", "exit 3");
    let (sender, mut rx) = tokio::sync::broadcast::channel(16);
    let mut supervisor = AdapterSupervisor::new(&stage.config(), 4711);

    assert_eq!(supervisor.ensure_running(&sender), Supervision::Spawned);
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(supervisor.ensure_running(&sender), Supervision::Spawned);

    let event = rx.recv().await.unwrap();
    assert_eq!(
        EventKindType::from(&event.kind),
        EventKindType::AdapterCrashedEvent
    );
    supervisor.kill_adapter().await;
}

#[test_log::test(tokio::test)]
async fn supervisor_reports_a_missing_executable_once() {
    let stage = FakeAdapterDir::empty("receiver-missing");
    let (sender, mut rx) = tokio::sync::broadcast::channel(16);
    let mut supervisor = AdapterSupervisor::new(&stage.config(), 4711);

    assert_eq!(supervisor.ensure_running(&sender), Supervision::Down);
    assert_eq!(supervisor.ensure_running(&sender), Supervision::Down);

    let event = rx.recv().await.unwrap();
    assert_eq!(
        EventKindType::from(&event.kind),
        EventKindType::AdapterSpawnFailedEvent
    );
    assert!(rx.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn supervisor_stays_down_when_disabled() {
    let stage = FakeAdapterDir::new("receiver-disabled", "sleep 30");
    let (sender, _rx) = tokio::sync::broadcast::channel(16);
    let mut config = stage.config();
    config.start_adapter = false;
    let mut supervisor = AdapterSupervisor::new(&config, 4711);

    assert_eq!(supervisor.ensure_running(&sender), Supervision::Down);
    assert!(supervisor.pid().is_none());
}

#[test_log::test(tokio::test)]
async fn supervision_tick_keeps_an_externally_started_session() {
    let bus = EventBus::new();
    let mut config = GpsConfig::default();
    config.start_adapter = false;
    let mut module = ReceiverModule::new(bus.context(), config).await.unwrap();
    let port = module.port().unwrap();

    let _cmd = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (stream, _) = module.listener.accept().await.unwrap();
    module.client.accept(stream);
    assert!(module.client.is_connected());

    // With spawning disabled the tick reports Down; the session of an
    // externally started adapter must survive it.
    module.on_supervision_tick().await;
    assert!(module.client.is_connected());
}

#[test]
fn send_sentence_event_payload_is_extracted() {
    let kind = EventKind::SendSentenceEvent(std::sync::Arc::new("$PSRF105,1".to_owned()));
    let payload = module_core::payload_ref!(kind, EventKind::SendSentenceEvent);
    assert_eq!(payload.map(|p| p.as_str()), Some("$PSRF105,1"));
}
