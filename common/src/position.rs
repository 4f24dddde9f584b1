// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::{Deserialize, Serialize};

/// Number of fixed-point units per degree (one unit is 1/10000 minute).
pub const UNITS_PER_DEGREE: i32 = 600_000;

/// A WGS84 coordinate in 1/10000-minute fixed-point units.
///
/// One degree corresponds to 600000 units, one minute to 10000 units.
/// Northern latitudes and eastern longitudes are positive. An unknown
/// position is represented as `Option<WgsPoint>::None` by its owners, so a
/// legitimate fix on the equator/prime meridian is never mistaken for
/// "no position yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WgsPoint {
    pub lat: i32,
    pub lon: i32,
}

impl WgsPoint {
    pub fn new(lat: i32, lon: i32) -> Self {
        WgsPoint { lat, lon }
    }

    /// Converts an NMEA coordinate quartet into fixed-point units.
    ///
    /// `lat` comes as `ddmm.mmmm`, `lon` as `dddmm.mmmm`; the hemisphere
    /// fields `S` and `W` negate the respective axis. The fractional minutes
    /// are rounded to 1/1000 minute before scaling, matching the receiver's
    /// reporting resolution.
    pub fn from_nmea(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<Self> {
        let lat = axis_from_nmea(lat, 2)?;
        let lon = axis_from_nmea(lon, 3)?;
        Some(WgsPoint {
            lat: if ns == "S" { -lat } else { lat },
            lon: if ew == "W" { -lon } else { lon },
        })
    }

    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) / f64::from(UNITS_PER_DEGREE)
    }

    pub fn lon_degrees(&self) -> f64 {
        f64::from(self.lon) / f64::from(UNITS_PER_DEGREE)
    }
}

fn axis_from_nmea(field: &str, degree_digits: usize) -> Option<i32> {
    // Checked slicing, the degree boundary may fall inside a multi-byte
    // character of a garbled field.
    let degrees: i32 = field.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = field.get(degree_digits..)?.parse().ok()?;
    let milli_minutes = (minutes * 1000.0).round() as i32;
    Some(degrees * UNITS_PER_DEGREE + milli_minutes * 10)
}
