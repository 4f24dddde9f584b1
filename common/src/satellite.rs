// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::serde::time;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Fix validity and constellation summary as reported by GSA/GGA sentences.
///
/// `fix_validity` follows the GSA mode field: 1 = no fix, 2 = 2D, 3 = 3D.
/// `constellation` is the concatenation of the two-digit satellite ids used
/// in the solution; a change of this string means the receiver switched to a
/// different set of satellites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SatInfo {
    pub fix_validity: i32,
    pub fix_accuracy: i32,
    pub sat_count: i32,
    pub constellation: String,
    #[serde(with = "time")]
    pub constellation_time: NaiveTime,
}

impl SatInfo {
    /// The "nothing known" state: invalid fix, worst accuracy, no satellites.
    pub fn unknown() -> Self {
        SatInfo {
            fix_validity: 1,
            fix_accuracy: 999,
            sat_count: 0,
            constellation: String::new(),
            constellation_time: NaiveTime::default(),
        }
    }
}

impl Default for SatInfo {
    fn default() -> Self {
        SatInfo::unknown()
    }
}

/// One satellite-in-view entry from a GSV series.
///
/// `db` is the signal-to-noise ratio; -1 when the receiver left the SNR
/// field blank (satellite tracked but not used).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SivInfo {
    pub id: i32,
    pub elevation: i32,
    pub azimuth: i32,
    pub db: i32,
}
