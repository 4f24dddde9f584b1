// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::units::Altitude;
use serde::{Deserialize, Serialize};

/// Device name of the built-in NMEA simulator.
///
/// When this device is configured the notification watchdog is disabled,
/// the simulator pushes data without real-world pauses.
pub const SIMULATOR_DEVICE: &str = "/dev/nmeasim";

/// Which altitude reference the configured receiver delivers in GGA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum AltitudeReference {
    /// Altitude above mean sea level, the NMEA default.
    #[default]
    Msl,
    /// Height above the WGS84 ellipsoid.
    Hae,
    /// A user-defined reference; the correction is subtracted to get MSL.
    User(Altitude),
}

/// Last known fix, persisted on shutdown for a receiver hot start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LastFix {
    /// Latitude in 1/10000-minute units.
    pub lat: i32,
    /// Longitude in 1/10000-minute units.
    pub lon: i32,
    /// MSL altitude in whole meters.
    pub altitude: i32,
    /// Receiver clock offset reported with the fix.
    pub clock_offset: i32,
}

/// Configuration of the GPS acquisition subsystem.
///
/// Read at startup and on explicit reconfiguration; the `last_fix` field is
/// written back on shutdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Serial device the adapter opens, e.g. `/dev/ttyUSB0`.
    pub device: String,
    /// Baud rate for the serial device.
    pub baud: u32,
    /// Colon-separated extra search path for the adapter executable.
    pub adapter_search_path: String,
    /// Listen port for the adapter IPC; 0 lets the OS pick a free one.
    pub port: u16,
    /// Debug option: when false no adapter process is spawned.
    pub start_adapter: bool,
    /// Set the system clock from the first valid RMC fix.
    pub sync_system_clock: bool,
    /// Local barometric pressure setting in hPa.
    pub qnh: i32,
    /// Altitude reference the receiver delivers.
    pub altitude_reference: AltitudeReference,
    /// Send a hard-reset initialization when no last fix is stored.
    pub hard_start: bool,
    /// Send the stored last fix to the receiver on startup.
    pub soft_start: bool,
    pub last_fix: Option<LastFix>,
}

impl Default for GpsConfig {
    fn default() -> Self {
        GpsConfig {
            device: "/dev/ttyUSB0".to_owned(),
            baud: 4800,
            adapter_search_path: String::new(),
            port: 0,
            start_adapter: true,
            sync_system_clock: false,
            qnh: 1013,
            altitude_reference: AltitudeReference::Msl,
            hard_start: false,
            soft_start: false,
            last_fix: None,
        }
    }
}

impl GpsConfig {
    pub fn from_json(json: &str) -> serde_json::Result<GpsConfig> {
        serde_json::from_str(json)
    }

    pub fn to_json(config: &GpsConfig) -> serde_json::Result<String> {
        serde_json::to_string_pretty(config)
    }

    /// True when the built-in NMEA simulator is the configured source.
    pub fn is_simulator(&self) -> bool {
        self.device == SIMULATOR_DEVICE
    }
}
