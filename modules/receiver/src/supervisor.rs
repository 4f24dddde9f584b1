// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use module_core::{Event, EventKind};
use common::config::GpsConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Cadence of the supervision tick. Doubles as the liveness poll interval
/// and the notification watchdog window.
pub const SUPERVISION_INTERVAL: Duration = Duration::from_secs(15);

/// Name of the receiver adapter executable.
pub const ADAPTER_EXECUTABLE: &str = "gpsadapter";

/// Bounded wait for the adapter process to exit on shutdown, polled at one
/// second granularity.
const REAP_TIMEOUT_SECS: u32 = 10;

/// Outcome of one supervision tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Supervision {
    /// The adapter process was already running.
    Alive,
    /// A fresh adapter process was spawned during this call. Any channels
    /// of a previous incarnation are stale and must be dropped.
    Spawned,
    /// No adapter is running and none could be started.
    Down,
}

/// Keeps exactly one adapter process alive while the subsystem is enabled
/// and guarantees that no zombie is left behind.
pub struct AdapterSupervisor {
    executable: String,
    search_path: String,
    port: u16,
    start_adapter: bool,
    shutdown_requested: bool,
    spawn_failure_reported: bool,
    child: Option<Child>,
}

impl AdapterSupervisor {
    pub fn new(config: &GpsConfig, port: u16) -> Self {
        AdapterSupervisor {
            executable: ADAPTER_EXECUTABLE.to_owned(),
            search_path: config.adapter_search_path.clone(),
            port,
            start_adapter: config.start_adapter,
            shutdown_requested: false,
            spawn_failure_reported: false,
            child: None,
        }
    }

    /// Suppresses any further spawns; called when the subsystem goes down.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    /// Ensures a live adapter process, probing, reaping and respawning as
    /// needed, all within this call.
    ///
    /// Runs on every supervision tick; spawn failures are therefore retried
    /// no faster than the tick cadence. Returns [`Supervision::Down`] when
    /// shutdown was requested or the adapter start is disabled.
    pub fn ensure_running(
        &mut self,
        sender: &tokio::sync::broadcast::Sender<Event>,
    ) -> Supervision {
        if self.shutdown_requested || !self.start_adapter {
            return Supervision::Down;
        }

        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return Supervision::Alive,
                Ok(Some(status)) => {
                    warn!("Adapter process died with {status}");
                    let _ = sender.send(Event::new(EventKind::AdapterCrashedEvent));
                    self.child = None;
                }
                Err(e) => {
                    warn!("Adapter liveness probe failed: {e}");
                    self.child = None;
                }
            }
        }

        let Some(exe) = self.locate_executable() else {
            if !self.spawn_failure_reported {
                error!(
                    "Adapter executable {} not found, cannot start it",
                    self.executable
                );
                let _ = sender.send(Event::new(EventKind::AdapterSpawnFailedEvent));
                self.spawn_failure_reported = true;
            }
            return Supervision::Down;
        };

        match Command::new(&exe)
            .arg("-port")
            .arg(self.port.to_string())
            .arg("-slave")
            .spawn()
        {
            Ok(child) => {
                info!(
                    "Started adapter {} with pid {:?}",
                    exe.to_string_lossy(),
                    child.id()
                );
                self.child = Some(child);
                self.spawn_failure_reported = false;
                Supervision::Spawned
            }
            Err(e) => {
                if !self.spawn_failure_reported {
                    error!("Starting adapter {} failed: {e}", exe.to_string_lossy());
                    let _ = sender.send(Event::new(EventKind::AdapterSpawnFailedEvent));
                    self.spawn_failure_reported = true;
                }
                Supervision::Down
            }
        }
    }

    /// Waits bounded for the adapter to exit, killing it as a last resort.
    ///
    /// The caller has already sent the graceful shutdown request over the
    /// command channel. Polls at one second granularity for up to ten
    /// seconds so a hanging adapter can never stall the subsystem teardown;
    /// the final kill-and-wait avoids leaving a zombie behind.
    pub async fn shutdown(&mut self) {
        self.shutdown_requested = true;
        let Some(child) = self.child.as_mut() else {
            return;
        };
        for _ in 0..REAP_TIMEOUT_SECS {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Adapter exited with {status}");
                    self.child = None;
                    return;
                }
                Ok(None) => tokio::time::sleep(Duration::from_secs(1)).await,
                Err(e) => {
                    warn!("Reaping the adapter failed: {e}");
                    break;
                }
            }
        }
        warn!("Adapter did not exit in time, killing it");
        if child.start_kill().is_ok() {
            let _ = child.wait().await;
        }
        self.child = None;
    }

    /// Immediate kill-and-reap for test teardown, skipping the bounded
    /// graceful wait.
    #[cfg(test)]
    pub(crate) async fn kill_adapter(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    /// Locates the adapter executable: the configured search path first,
    /// then an install-relative `bin` directory next to the own executable,
    /// then the `PATH` entries.
    fn locate_executable(&self) -> Option<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .search_path
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .collect();
        if let Ok(own_exe) = env::current_exe()
            && let Some(install_dir) = own_exe.parent()
        {
            dirs.push(install_dir.join("bin"));
            dirs.push(install_dir.to_path_buf());
        }
        if let Some(path_var) = env::var_os("PATH") {
            dirs.extend(env::split_paths(&path_var));
        }
        dirs.into_iter()
            .map(|dir| dir.join(&self.executable))
            .find(|candidate| is_executable(candidate))
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
