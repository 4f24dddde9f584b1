// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::{Deserialize, Serialize};

const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_SECOND_PER_KNOT: f64 = 0.514444;

/// An altitude reading stored in meters.
///
/// Receivers report altitudes either in meters or in feet, depending on the
/// unit field of the sentence. All internal processing happens in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Altitude {
    meters: f64,
}

impl Altitude {
    pub fn from_meters(meters: f64) -> Self {
        Altitude { meters }
    }

    pub fn from_feet(feet: f64) -> Self {
        Altitude {
            meters: feet * METERS_PER_FOOT,
        }
    }

    /// Builds an altitude from a value and the NMEA unit field
    /// (`M` for meters, `F`/`f` for feet, meters is the default).
    pub fn from_unit(value: f64, unit: &str) -> Self {
        if unit.eq_ignore_ascii_case("f") {
            Altitude::from_feet(value)
        } else {
            Altitude::from_meters(value)
        }
    }

    pub fn meters(&self) -> f64 {
        self.meters
    }
}

/// A ground speed stored in meters per second.
///
/// The sentinel [`Speed::UNKNOWN`] (-1 m/s) marks a speed that has not been
/// reported yet or that has become stale after a fix loss.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Speed {
    mps: f64,
}

impl Speed {
    /// Sentinel for an unknown or stale speed.
    pub const UNKNOWN: Speed = Speed { mps: -1.0 };

    pub fn from_mps(mps: f64) -> Self {
        Speed { mps }
    }

    pub fn from_knots(knots: f64) -> Self {
        Speed {
            mps: knots * METERS_PER_SECOND_PER_KNOT,
        }
    }

    pub fn mps(&self) -> f64 {
        self.mps
    }

    pub fn knots(&self) -> f64 {
        self.mps / METERS_PER_SECOND_PER_KNOT
    }

    pub fn is_unknown(&self) -> bool {
        self.mps < 0.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::UNKNOWN
    }
}

/// Ground speed and true heading of the last fix.
///
/// The heading sentinel is -1.0 degrees, analogous to [`Speed::UNKNOWN`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub speed: Speed,
    pub heading: f64,
}

impl Velocity {
    pub const UNKNOWN_HEADING: f64 = -1.0;

    pub fn unknown() -> Self {
        Velocity {
            speed: Speed::UNKNOWN,
            heading: Velocity::UNKNOWN_HEADING,
        }
    }
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity::unknown()
    }
}
