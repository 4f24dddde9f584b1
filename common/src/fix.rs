// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::position::WgsPoint;
use crate::satellite::{SatInfo, SivInfo};
use crate::serde::{date, time};
use crate::units::{Altitude, Velocity};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection and fix state of the GPS subsystem.
///
/// There is no shortcut from `NotConnected` to `ValidFix`: connectivity is
/// always observed (an accepted sentence) before fix validity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    #[default]
    NotConnected,
    NoFix,
    ValidFix,
}

/// The four reconciled altitude readings of the current fix.
///
/// Whichever reference the receiver delivers, the decoder back-fills the
/// other readings so consumers never have to know the delivery mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AltitudeSet {
    /// Altitude above mean sea level.
    pub msl: Altitude,
    /// Height above the WGS84 ellipsoid.
    pub gnss: Altitude,
    /// Barometric standard-atmosphere altitude, QNH corrected.
    pub std_pressure: Altitude,
    /// Raw pressure altitude, when a pressure sensor delivers one.
    pub pressure: Altitude,
}

/// The canonical decoded navigation state.
///
/// Mutated in place by the NMEA decoder as sentences arrive and read by
/// display collaborators as a snapshot between events. The date defaults to
/// "today" until an RMC sentence delivers the real one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GnssFix {
    #[serde(with = "time")]
    pub time: NaiveTime,
    #[serde(with = "date")]
    pub date: NaiveDate,
    pub position: Option<WgsPoint>,
    pub altitudes: AltitudeSet,
    pub velocity: Velocity,
    pub sat_info: SatInfo,
    pub sats_in_view: Vec<SivInfo>,
    pub datum: String,
}

impl GnssFix {
    pub fn new() -> Self {
        GnssFix {
            time: NaiveTime::default(),
            date: Utc::now().date_naive(),
            position: None,
            altitudes: AltitudeSet::default(),
            velocity: Velocity::unknown(),
            sat_info: SatInfo::unknown(),
            sats_in_view: Vec::new(),
            datum: String::new(),
        }
    }

    /// Reverts all per-fix fields to their unknown sentinels.
    ///
    /// Called when the link regresses; time and date are kept, they stay
    /// meaningful as "time of the last good fix".
    pub fn reset(&mut self) {
        self.position = None;
        self.altitudes = AltitudeSet::default();
        self.velocity = Velocity::unknown();
        self.sat_info = SatInfo::unknown();
        self.sats_in_view.clear();
    }
}

impl Default for GnssFix {
    fn default() -> Self {
        GnssFix::new()
    }
}
