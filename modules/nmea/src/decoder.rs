// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::config::{AltitudeReference, GpsConfig};
use common::fix::{AltitudeSet, GnssFix};
use common::position::WgsPoint;
use common::satellite::SivInfo;
use common::units::{Altitude, Speed};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Standard atmosphere pressure setting in hPa.
const STD_QNH: i32 = 1013;

/// Meters of altitude per hPa of pressure difference, the linear
/// approximation of the standard atmosphere near sea level.
const METERS_PER_HPA: f64 = 8.6;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line does not start with the sentence marker")]
    NotASentence,
    #[error("sentence carries no checksum")]
    MissingChecksum,
    #[error("checksum mismatch, sentence carries {expected:02X}, payload computes to {computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },
    #[error("{id} sentence carries too few fields ({got})")]
    TooFewFields { id: String, got: usize },
}

/// The set of fields a single [`Decoder::decode`] call actually changed.
///
/// Each flag is raised at most once per call and only when the stored value
/// really differs, so every flag maps to exactly one change event on the
/// bus. `fix_valid` and `clock_sync` are decode outcomes rather than field
/// changes; `fix_valid` is set on every sentence that reports a valid fix,
/// changed or not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    /// The fix time advanced; all fields of the previous fix are final.
    pub new_fix: bool,
    pub position: bool,
    pub altitude: bool,
    pub velocity: bool,
    pub constellation: bool,
    /// A completed GSV series published a fresh satellites-in-view snapshot.
    pub sats_in_view: bool,
    /// The sentence reported a valid fix; the caller restarts the fix timer.
    pub fix_valid: bool,
    /// First valid RMC fix with clock sync enabled; carries the UTC
    /// timestamp the system clock should be set to. One-shot.
    pub clock_sync: Option<NaiveDateTime>,
}

impl Changes {
    /// True when no stored field changed. Decode outcomes do not count.
    pub fn is_empty(&self) -> bool {
        !(self.new_fix
            || self.position
            || self.altitude
            || self.velocity
            || self.constellation
            || self.sats_in_view)
    }
}

/// NMEA-0183 sentence decoder, mutating a [`GnssFix`] in place.
///
/// Handles RMC, GLL, GGA, GSA, GSV and DTM from any talker plus the
/// proprietary PGRMZ; everything else passes the checksum gate and is then
/// ignored, which keeps instruments emitting extra sentence types working.
pub struct Decoder {
    fix: GnssFix,
    qnh: i32,
    altitude_reference: AltitudeReference,
    sync_clock: bool,
    clock_synced: bool,
    /// Geoid separation of the last GGA, reused when PGRMZ delivers an
    /// altitude without one.
    geoid_separation: Altitude,
    siv_scratch: Vec<SivInfo>,
    siv_expected: u32,
}

impl Decoder {
    pub fn new(config: &GpsConfig) -> Self {
        Decoder {
            fix: GnssFix::new(),
            qnh: config.qnh,
            altitude_reference: config.altitude_reference,
            sync_clock: config.sync_system_clock,
            clock_synced: false,
            geoid_separation: Altitude::default(),
            siv_scratch: Vec::new(),
            siv_expected: 1,
        }
    }

    /// Snapshot access for collaborators; only `decode` mutates the fix.
    pub fn fix(&self) -> &GnssFix {
        &self.fix
    }

    /// Reverts the fix to its unknown sentinels and abandons any half
    /// accumulated GSV series. Called when the link regresses.
    pub fn reset_fix(&mut self) {
        self.fix.reset();
        self.siv_scratch.clear();
        self.siv_expected = 1;
    }

    /// Decodes one sentence and reports which fields changed.
    ///
    /// An `Ok` return means a checksum-valid sentence arrived, whether or
    /// not the identifier was recognized; the caller uses it as the data
    /// liveness signal.
    pub fn decode(&mut self, line: &str) -> Result<Changes, DecodeError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.starts_with('$') {
            return Err(DecodeError::NotASentence);
        }
        let star = line.rfind('*').ok_or(DecodeError::MissingChecksum)?;
        let hex = line
            .get(star + 1..star + 3)
            .ok_or(DecodeError::MissingChecksum)?;
        let expected =
            u8::from_str_radix(hex, 16).map_err(|_| DecodeError::MissingChecksum)?;
        let computed = line[1..star].bytes().fold(0u8, |sum, byte| sum ^ byte);
        if computed != expected {
            return Err(DecodeError::ChecksumMismatch { expected, computed });
        }

        let fields: Vec<&str> = line[..star].split([',', ':']).collect();
        let id = &fields[0][1..];

        let mut changes = Changes::default();
        if id == "PGRMZ" {
            self.on_pgrmz(&fields, &mut changes)?;
        } else if id.len() == 5 {
            // Standard sentences dispatch on the type, the two talker
            // characters are irrelevant. A non-ASCII identifier never
            // splits on a char boundary here and falls through unknown.
            match id.get(2..) {
                Some("RMC") => self.on_rmc(&fields, &mut changes)?,
                Some("GLL") => self.on_gll(&fields, &mut changes)?,
                Some("GGA") => self.on_gga(&fields, &mut changes)?,
                Some("GSA") => self.on_gsa(&fields, &mut changes)?,
                Some("GSV") => self.on_gsv(&fields, &mut changes)?,
                Some("DTM") => self.on_dtm(&fields)?,
                _ => {}
            }
        }
        Ok(changes)
    }

    fn on_rmc(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("RMC", fields, 10)?;
        // Status V means navigation receiver warning, no usable fix.
        if fields[2] == "V" {
            return Ok(());
        }
        changes.fix_valid = true;
        self.set_time(fields[1], changes);
        self.set_date(fields[9]);
        self.set_speed_knots(fields[7], changes);
        self.set_position(fields[3], fields[4], fields[5], fields[6], changes);
        self.set_heading(fields[8], changes);

        if self.sync_clock && !self.clock_synced {
            // One update only, repeated re-syncs would confuse every
            // running elapsed-time measurement.
            self.clock_synced = true;
            changes.clock_sync = Some(NaiveDateTime::new(self.fix.date, self.fix.time));
        }
        Ok(())
    }

    fn on_gll(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("GLL", fields, 7)?;
        if fields[6] != "A" {
            return Ok(());
        }
        changes.fix_valid = true;
        self.set_time(fields[5], changes);
        self.set_position(fields[1], fields[2], fields[3], fields[4], changes);
        Ok(())
    }

    fn on_gga(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("GGA", fields, 15)?;
        // Quality indicator 0 means no fix available.
        if fields[6] == "0" {
            return Ok(());
        }
        changes.fix_valid = true;
        self.set_time(fields[1], changes);
        self.set_position(fields[2], fields[3], fields[4], fields[5], changes);

        // A blank geoid separation defaults to zero meters.
        self.geoid_separation = if fields[11].is_empty() {
            Altitude::default()
        } else {
            Altitude::from_unit(parse_or(fields[11], 0.0), fields[12])
        };
        let delivered = Altitude::from_unit(parse_or(fields[9], 0.0), fields[10]);
        self.reconcile_altitude(delivered, changes);
        self.set_sat_count(fields[7], changes);
        Ok(())
    }

    fn on_pgrmz(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("PGRMZ", fields, 4)?;
        // Fix dimension 3 is a GPS-sourced altitude; 2 is a user/baro
        // value and is not taken over.
        if fields[3] != "3" {
            return Ok(());
        }
        let delivered = Altitude::from_unit(parse_or(fields[1], 0.0), fields[2]);
        self.reconcile_altitude(delivered, changes);
        Ok(())
    }

    fn on_gsa(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("GSA", fields, 18)?;
        // Mode 1 means no fix; the validity code is only taken over from
        // a fix-carrying sentence.
        if fields[2] != "1" {
            changes.fix_valid = true;
            self.fix.sat_info.fix_validity = parse_or(fields[2], 0);
        }
        let mut constellation = String::new();
        for id in &fields[3..=14] {
            if !id.is_empty() {
                constellation.push_str(&format!("{:02}", parse_or::<i32>(id, 0)));
            }
        }
        if constellation != self.fix.sat_info.constellation {
            self.fix.sat_info.constellation = constellation;
            self.fix.sat_info.constellation_time = self.fix.time;
            changes.constellation = true;
        }
        Ok(())
    }

    /// GSV detail arrives split across up to four sentences sharing a
    /// running sequence number. Sentences are accumulated until the stated
    /// total is reached; a sequence gap drops the series and re-arms for
    /// the next fresh start.
    fn on_gsv(&mut self, fields: &[&str], changes: &mut Changes) -> Result<(), DecodeError> {
        require_fields("GSV", fields, 8)?;
        let total: u32 = parse_or(fields[1], 0);
        let msgnum: u32 = parse_or(fields[2], 0);

        if msgnum == 1 {
            self.siv_scratch.clear();
            self.siv_expected = 1;
        }
        if msgnum != self.siv_expected {
            self.siv_scratch.clear();
            self.siv_expected = 1;
            return Ok(());
        }

        for start in [4usize, 8, 12, 16] {
            if fields.len() > start + 3 {
                self.push_sat_in_view(
                    fields[start],
                    fields[start + 1],
                    fields[start + 2],
                    fields[start + 3],
                );
            }
        }

        self.siv_expected += 1;
        if msgnum >= total {
            self.siv_expected = 1;
            self.fix.sats_in_view = self.siv_scratch.clone();
            changes.sats_in_view = true;
        }
        Ok(())
    }

    fn on_dtm(&mut self, fields: &[&str]) -> Result<(), DecodeError> {
        require_fields("DTM", fields, 9)?;
        // Datum changes carry no event, the value is picked up with the
        // next fix snapshot.
        self.fix.datum = fields[8].to_owned();
        Ok(())
    }

    fn push_sat_in_view(&mut self, id: &str, elevation: &str, azimuth: &str, snr: &str) {
        if id.is_empty() {
            return;
        }
        self.siv_scratch.push(SivInfo {
            id: parse_or(id, 0),
            elevation: parse_or(elevation, 0),
            azimuth: parse_or(azimuth, 0),
            // A blank SNR means tracked but not received.
            db: if snr.is_empty() { -1 } else { parse_or(snr, 0) },
        });
    }

    /// A changed fix time starts a new fix; all fields reported for the
    /// previous timestamp are final. Invalid time fields are ignored, they
    /// would poison the fix.
    fn set_time(&mut self, field: &str, changes: &mut Changes) {
        let Some(time) = parse_hms(field) else {
            warn!("Ignoring invalid time field {field}");
            return;
        };
        if time != self.fix.time {
            self.fix.time = time;
            changes.new_fix = true;
        }
    }

    fn set_date(&mut self, field: &str) {
        let Some(date) = parse_dmy(field) else {
            warn!("Ignoring invalid date field {field}");
            return;
        };
        self.fix.date = date;
    }

    fn set_speed_knots(&mut self, field: &str, changes: &mut Changes) {
        let speed = Speed::from_knots(parse_or(field, 0.0));
        if speed != self.fix.velocity.speed {
            self.fix.velocity.speed = speed;
            changes.velocity = true;
        }
    }

    fn set_heading(&mut self, field: &str, changes: &mut Changes) {
        let heading: f64 = parse_or(field, 0.0);
        if heading != self.fix.velocity.heading {
            self.fix.velocity.heading = heading;
            changes.velocity = true;
        }
    }

    fn set_position(
        &mut self,
        lat: &str,
        ns: &str,
        lon: &str,
        ew: &str,
        changes: &mut Changes,
    ) {
        let Some(point) = WgsPoint::from_nmea(lat, ns, lon, ew) else {
            warn!("Ignoring malformed coordinate {lat},{ns},{lon},{ew}");
            return;
        };
        if self.fix.position != Some(point) {
            self.fix.position = Some(point);
            changes.position = true;
        }
    }

    fn set_sat_count(&mut self, field: &str, changes: &mut Changes) {
        let count: i32 = parse_or(field, 0);
        if count != self.fix.sat_info.sat_count {
            self.fix.sat_info.sat_count = count;
            changes.constellation = true;
        }
    }

    /// Back-fills the altitude readings the receiver did not deliver.
    ///
    /// Depending on the configured reference the delivered value is MSL,
    /// height above the ellipsoid or user-referenced; the missing readings
    /// are derived via the geoid separation, and the standard pressure
    /// altitude gets the QNH correction on top.
    fn reconcile_altitude(&mut self, delivered: Altitude, changes: &mut Changes) {
        let (msl, gnss) = match self.altitude_reference {
            AltitudeReference::Msl => (
                delivered,
                Altitude::from_meters(delivered.meters() + self.geoid_separation.meters()),
            ),
            AltitudeReference::Hae => (
                Altitude::from_meters(delivered.meters() - self.geoid_separation.meters()),
                delivered,
            ),
            AltitudeReference::User(correction) => (
                Altitude::from_meters(delivered.meters() - correction.meters()),
                delivered,
            ),
        };
        let std_pressure = if self.qnh == STD_QNH {
            msl
        } else {
            let delta = (f64::from(STD_QNH - self.qnh) * METERS_PER_HPA).round();
            Altitude::from_meters(msl.meters() + delta)
        };
        let reconciled = AltitudeSet {
            msl,
            gnss,
            std_pressure,
            pressure: self.fix.altitudes.pressure,
        };
        if reconciled != self.fix.altitudes {
            self.fix.altitudes = reconciled;
            changes.altitude = true;
        }
    }
}

fn require_fields(id: &str, fields: &[&str], min: usize) -> Result<(), DecodeError> {
    if fields.len() < min {
        return Err(DecodeError::TooFewFields {
            id: id.to_owned(),
            got: fields.len(),
        });
    }
    Ok(())
}

/// Tolerant numeric parse; unavailable or garbled fields substitute the
/// given sentinel instead of dropping the whole sentence.
fn parse_or<T: FromStr + Copy>(field: &str, fallback: T) -> T {
    field.trim().parse().unwrap_or(fallback)
}

/// Parses `hhmmss[.sss]`; fractional seconds are dropped, sub-second fix
/// times would destabilize the new-fix detection. Checked slicing keeps a
/// non-ASCII digit from tearing the field apart mid-character.
fn parse_hms(field: &str) -> Option<NaiveTime> {
    let hour: u32 = field.get(0..2)?.parse().ok()?;
    let minute: u32 = field.get(2..4)?.parse().ok()?;
    let second: u32 = field.get(4..6)?.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Parses `ddmmyy`, mapping the two-digit year into the 2000s.
fn parse_dmy(field: &str) -> Option<NaiveDate> {
    let day: u32 = field.get(0..2)?.parse().ok()?;
    let month: u32 = field.get(2..4)?.parse().ok()?;
    let year: i32 = field.get(4..6)?.parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}
