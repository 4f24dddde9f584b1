// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::fix::FixStatus;
use std::time::Duration;
use tracing::{debug, warn};

/// A fix older than this is considered lost and the link regresses to
/// [`FixStatus::NoFix`].
pub const FIX_TIMEOUT: Duration = Duration::from_secs(25);

/// Link liveness state machine.
///
/// Owns the [`FixStatus`] value; the `on_*` inputs are the only writers.
/// Each input returns the new status when it actually transitioned, so the
/// caller publishes exactly one status event per real change and resets the
/// fix data where a transition demands it.
pub struct LinkMonitor {
    status: FixStatus,
    ignore_connection_lost: bool,
}

impl LinkMonitor {
    pub fn new() -> Self {
        LinkMonitor {
            status: FixStatus::NotConnected,
            ignore_connection_lost: false,
        }
    }

    pub fn status(&self) -> FixStatus {
        self.status
    }

    /// Any accepted sentence establishes connectivity. Fix validity is
    /// reported separately via [`Self::on_fix`], never directly from
    /// `NotConnected`.
    pub fn on_data(&mut self) -> Option<FixStatus> {
        if self.status == FixStatus::NotConnected {
            debug!("GPS connection established");
            self.status = FixStatus::NoFix;
            return Some(self.status);
        }
        None
    }

    /// A sentence reported a valid fix. The caller restarts the fix timer
    /// on every call, transition or not.
    pub fn on_fix(&mut self) -> Option<FixStatus> {
        if self.status != FixStatus::ValidFix {
            debug!("GPS fix obtained");
            self.status = FixStatus::ValidFix;
            return Some(self.status);
        }
        None
    }

    /// The fix timer expired without a fix-valid sentence.
    pub fn on_fix_timeout(&mut self) -> Option<FixStatus> {
        if self.status == FixStatus::ValidFix {
            warn!("GPS fix lost");
            self.status = FixStatus::NoFix;
            return Some(self.status);
        }
        None
    }

    /// The receiver connection is gone. An already disconnected link does
    /// not re-notify, and a pending clock-sync suppression eats exactly one
    /// loss report.
    pub fn on_connection_lost(&mut self) -> Option<FixStatus> {
        if self.ignore_connection_lost {
            // Setting the system clock perturbs elapsed-time accounting;
            // the one loss report it may fake is swallowed here.
            self.ignore_connection_lost = false;
            return None;
        }
        if self.status != FixStatus::NotConnected {
            warn!("GPS connection seems to be lost");
            self.status = FixStatus::NotConnected;
            return Some(self.status);
        }
        None
    }

    /// Arms the one-shot suppression for the next loss report.
    pub fn suppress_next_connection_loss(&mut self) {
        self.ignore_connection_lost = true;
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        LinkMonitor::new()
    }
}
