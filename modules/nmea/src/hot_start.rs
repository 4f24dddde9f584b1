// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Builders for the SiRF proprietary sentences that warm up a receiver
//! with its last known fix. Checksums are appended by the sending side.

use common::config::GpsConfig;
use common::position::UNITS_PER_DEGREE;

/// 1999-08-22T00:00:00Z, the first GPS week-number rollover. Week counts
/// derived from it stay within 0..1024 until the next rollover.
const GPS_WEEK_ROLLOVER_UNIX: i64 = 935_280_000;

const SECONDS_PER_WEEK: i64 = 60 * 60 * 24 * 7;

const CHANNEL_COUNT: u32 = 12;
const HARD_RESET: u32 = 4;
const SOFT_RESET: u32 = 3;

/// `$PSRF105` switches the receiver's debug output on or off.
pub fn debug_toggle(on: bool) -> String {
    format!("$PSRF105,{}", u8::from(on))
}

/// `$PSRF104` factory reset, clearing all stored receiver state.
pub fn factory_reset() -> String {
    "$PSRF104,0.0,0.0,0,0,0,0,12,8".to_owned()
}

/// Builds the `$PSRF104` initialization for the configured start mode.
///
/// Without a stored fix and hard start enabled the receiver is reset from
/// zero; otherwise, with soft start enabled, it gets the stored position
/// and clock offset back, zero coordinates included. Returns `None` when
/// the configuration asks for neither.
pub fn initialization(config: &GpsConfig, now_unix: i64) -> Option<String> {
    let (week, seconds) = gps_week_and_seconds(now_unix);
    let fix = config.last_fix.unwrap_or_default();

    if fix.lat == 0 && fix.lon == 0 && config.hard_start {
        return Some(format!(
            "$PSRF104,{:.4},{:.4},{},{},{},{},{},{}",
            0.0, 0.0, 0, fix.clock_offset, seconds, week, CHANNEL_COUNT, HARD_RESET
        ));
    }
    if !config.soft_start {
        return None;
    }
    let lat = f64::from(fix.lat) / f64::from(UNITS_PER_DEGREE);
    let lon = f64::from(fix.lon) / f64::from(UNITS_PER_DEGREE);
    Some(format!(
        "$PSRF104,{lat:.4},{lon:.4},{},{},{seconds},{week},{CHANNEL_COUNT},{SOFT_RESET}",
        fix.altitude, fix.clock_offset
    ))
}

fn gps_week_and_seconds(now_unix: i64) -> (i64, i64) {
    let diff = now_unix - GPS_WEEK_ROLLOVER_UNIX;
    ((diff / SECONDS_PER_WEEK) % 1024, diff % SECONDS_PER_WEEK)
}
