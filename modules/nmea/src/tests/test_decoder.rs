// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::decoder::{DecodeError, Decoder};
use common::config::{AltitudeReference, GpsConfig};
use common::position::WgsPoint;
use common::units::Speed;
use chrono::NaiveTime;

const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

fn decoder() -> Decoder {
    Decoder::new(&GpsConfig::default())
}

fn decoder_with(config: GpsConfig) -> Decoder {
    Decoder::new(&config)
}

#[test]
fn rejects_a_line_without_start_marker() {
    let mut decoder = decoder();
    assert!(matches!(
        decoder.decode("GPGGA,123519*77"),
        Err(DecodeError::NotASentence)
    ));
}

#[test]
fn rejects_a_sentence_without_checksum() {
    let mut decoder = decoder();
    assert!(matches!(
        decoder.decode("$GPGGA,123519,4807.038,N"),
        Err(DecodeError::MissingChecksum)
    ));
}

#[test]
fn rejects_a_mutated_sentence() {
    // One payload character flipped against a valid checksum.
    let mutated = GGA.replace("545.4", "546.4");
    let mut decoder = decoder();
    assert!(matches!(
        decoder.decode(&mutated),
        Err(DecodeError::ChecksumMismatch { expected: 0x47, .. })
    ));
    assert!(decoder.fix().position.is_none());
}

#[test]
fn rejects_a_sentence_with_too_few_fields() {
    let mut decoder = decoder();
    assert!(matches!(
        decoder.decode("$GPGGA,123519*77"),
        Err(DecodeError::TooFewFields { got: 2, .. })
    ));
}

#[test]
fn multibyte_identifier_is_ignored() {
    // Five bytes long, but the talker boundary falls inside the euro sign.
    let mut decoder = decoder();
    let changes = decoder.decode("$A€C,1*D3").unwrap();
    assert!(changes.is_empty());
    assert!(!changes.fix_valid);
}

#[test]
fn multibyte_time_and_date_fields_keep_their_sentinels() {
    // Checksum-valid on the wire, but time and date carry a multi-byte
    // character where a digit pair is expected. The torn fields are
    // dropped, the intact ones are taken over.
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPRMC,€23519,A,4807.038,N,01131.000,E,022.4,084.4,€30394,003.1,W*69")
        .unwrap();
    assert!(changes.fix_valid);
    assert!(!changes.new_fix);
    assert!(changes.position);
}

#[test]
fn multibyte_coordinate_field_keeps_the_position_unset() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPGLL,€916.45,N,12311.12,W,225444,A*C9")
        .unwrap();
    assert!(changes.fix_valid);
    assert!(!changes.position);
    assert!(decoder.fix().position.is_none());
    assert_eq!(
        decoder.fix().time,
        NaiveTime::from_hms_opt(22, 54, 44).unwrap()
    );
}

#[test]
fn ignores_unknown_identifiers() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48")
        .unwrap();
    assert!(changes.is_empty());
    assert!(!changes.fix_valid);
}

#[test]
fn pgrmz_user_altitude_is_not_taken_over() {
    let mut decoder = decoder();
    let changes = decoder.decode("$PGRMZ,93,f,2*20").unwrap();
    assert!(changes.is_empty());
}

#[test]
fn decodes_the_gga_example_end_to_end() {
    let mut decoder = decoder();
    let changes = decoder.decode(GGA).unwrap();

    assert!(changes.fix_valid);
    assert!(changes.new_fix);
    assert!(changes.position);
    assert!(changes.altitude);
    assert!(changes.constellation);

    let fix = decoder.fix();
    assert_eq!(fix.time, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
    assert_eq!(fix.position, Some(WgsPoint::new(28_870_380, 6_910_000)));
    assert_eq!(fix.altitudes.msl.meters(), 545.4);
    assert!((fix.altitudes.gnss.meters() - 592.3).abs() < 1e-9);
    assert_eq!(fix.altitudes.std_pressure, fix.altitudes.msl);
    assert_eq!(fix.sat_info.sat_count, 8);
}

#[test]
fn decode_is_idempotent_on_field_values() {
    let mut decoder = decoder();
    let first = decoder.decode(RMC).unwrap();
    assert!(first.new_fix && first.position && first.velocity);

    let second = decoder.decode(RMC).unwrap();
    assert!(second.is_empty());
    // Fix validity is a per-sentence outcome, not a field change.
    assert!(second.fix_valid);
}

#[test]
fn rmc_extracts_date_speed_and_heading() {
    let mut decoder = decoder();
    decoder.decode(RMC).unwrap();
    let fix = decoder.fix();
    assert_eq!(
        fix.date,
        chrono::NaiveDate::from_ymd_opt(1994, 3, 23).unwrap()
    );
    assert_eq!(fix.velocity.speed, Speed::from_knots(22.4));
    assert_eq!(fix.velocity.heading, 84.4);
}

#[test]
fn rmc_with_void_status_changes_nothing() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPRMC,123520,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*77")
        .unwrap();
    assert!(changes.is_empty());
    assert!(!changes.fix_valid);
    assert!(decoder.fix().position.is_none());
}

#[test]
fn rmc_talker_prefix_is_irrelevant() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GNRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*74")
        .unwrap();
    assert!(changes.fix_valid);
    assert!(changes.position);
}

#[test]
fn rmc_requests_one_clock_sync_only() {
    let mut decoder = decoder_with(GpsConfig {
        sync_system_clock: true,
        ..GpsConfig::default()
    });
    let first = decoder.decode(RMC).unwrap();
    let expected = chrono::NaiveDate::from_ymd_opt(1994, 3, 23)
        .unwrap()
        .and_hms_opt(12, 35, 19)
        .unwrap();
    assert_eq!(first.clock_sync, Some(expected));

    let second = decoder.decode(RMC).unwrap();
    assert_eq!(second.clock_sync, None);
}

#[test]
fn gll_extracts_time_and_position_when_valid() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPGLL,4916.450,N,12311.120,W,225444,A*31")
        .unwrap();
    assert!(changes.fix_valid);
    let fix = decoder.fix();
    assert_eq!(fix.time, NaiveTime::from_hms_opt(22, 54, 44).unwrap());
    assert_eq!(fix.position, Some(WgsPoint::new(29_564_500, -73_911_200)));
}

#[test]
fn gll_with_invalid_status_is_dropped() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPGLL,4916.450,N,12311.120,W,225444,V*26")
        .unwrap();
    assert!(changes.is_empty());
    assert!(!changes.fix_valid);
}

#[test]
fn gga_without_fix_quality_changes_nothing() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPGGA,123520,4807.038,N,01131.000,E,0,00,99.9,,M,,M,,*4F")
        .unwrap();
    assert!(changes.is_empty());
    assert!(!changes.fix_valid);
}

#[test]
fn gsa_tracks_the_active_constellation() {
    let mut decoder = decoder();
    let changes = decoder
        .decode("$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39")
        .unwrap();
    assert!(changes.fix_valid);
    assert!(changes.constellation);
    assert_eq!(decoder.fix().sat_info.fix_validity, 3);
    assert_eq!(decoder.fix().sat_info.constellation, "0405091224");

    // Same set again, no change to report.
    let changes = decoder
        .decode("$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39")
        .unwrap();
    assert!(!changes.constellation);
}

#[test]
fn gsa_without_fix_keeps_the_validity_code() {
    let mut decoder = decoder();
    decoder
        .decode("$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39")
        .unwrap();
    let changes = decoder
        .decode("$GPGSA,A,1,,,,,,,,,,,,,6.0,6.0,6.0*36")
        .unwrap();
    assert!(!changes.fix_valid);
    assert_eq!(decoder.fix().sat_info.fix_validity, 3);
}

#[test]
fn gsv_series_publishes_one_snapshot() {
    let mut decoder = decoder();
    let first = decoder
        .decode("$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75")
        .unwrap();
    assert!(!first.sats_in_view);
    assert!(decoder.fix().sats_in_view.is_empty());

    let second = decoder
        .decode("$GPGSV,2,2,08,18,09,064,70,22,42,067,42,24,14,311,43,27,05,244,*70")
        .unwrap();
    assert!(second.sats_in_view);

    let sats = &decoder.fix().sats_in_view;
    assert_eq!(sats.len(), 8);
    assert_eq!(sats[0].id, 1);
    assert_eq!(sats[0].elevation, 40);
    assert_eq!(sats[0].azimuth, 83);
    assert_eq!(sats[0].db, 46);
    // Blank SNR means tracked but not received.
    assert_eq!(sats[7].id, 27);
    assert_eq!(sats[7].db, -1);
}

#[test]
fn gsv_sequence_gap_drops_the_series_and_rearms() {
    let mut decoder = decoder();
    decoder
        .decode("$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74")
        .unwrap();
    // Skipping sentence 2 of 3 invalidates the whole series.
    let skipped = decoder
        .decode("$GPGSV,3,3,11,22,42,067,42,24,14,311,43,27,05,244,00*4D")
        .unwrap();
    assert!(!skipped.sats_in_view);
    assert!(decoder.fix().sats_in_view.is_empty());

    // A fresh complete series is accepted afterwards.
    decoder
        .decode("$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74")
        .unwrap();
    decoder
        .decode("$GPGSV,3,2,11,14,25,170,00,16,57,208,39,18,67,296,40,19,40,246,00*74")
        .unwrap();
    let done = decoder
        .decode("$GPGSV,3,3,11,22,42,067,42,24,14,311,43,27,05,244,00*4D")
        .unwrap();
    assert!(done.sats_in_view);
    assert_eq!(decoder.fix().sats_in_view.len(), 11);
}

#[test]
fn qnh_correction_shifts_the_standard_altitude() {
    let mut decoder = decoder_with(GpsConfig {
        qnh: 993,
        ..GpsConfig::default()
    });
    decoder
        .decode("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,100.0,M,0.0,M,,*7D")
        .unwrap();
    let altitudes = decoder.fix().altitudes;
    assert_eq!(altitudes.msl.meters(), 100.0);
    // (1013 - 993) * 8.6 rounds to 172 meters.
    assert_eq!(altitudes.std_pressure.meters(), 272.0);
}

#[test]
fn standard_altitude_equals_msl_at_standard_pressure() {
    let mut decoder = decoder();
    decoder
        .decode("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,100.0,M,0.0,M,,*7D")
        .unwrap();
    let altitudes = decoder.fix().altitudes;
    assert_eq!(altitudes.std_pressure, altitudes.msl);
}

#[test]
fn hae_delivery_backfills_msl() {
    let mut decoder = decoder_with(GpsConfig {
        altitude_reference: AltitudeReference::Hae,
        ..GpsConfig::default()
    });
    decoder.decode(GGA).unwrap();
    let altitudes = decoder.fix().altitudes;
    assert_eq!(altitudes.gnss.meters(), 545.4);
    assert!((altitudes.msl.meters() - 498.5).abs() < 1e-9);
}

#[test]
fn pgrmz_gps_altitude_is_reconciled_in_feet() {
    let mut decoder = decoder();
    let changes = decoder.decode("$PGRMZ,1496,f,3*21").unwrap();
    assert!(changes.altitude);
    assert!((decoder.fix().altitudes.msl.meters() - 1496.0 * 0.3048).abs() < 1e-9);
}

#[test]
fn dtm_records_the_datum_silently() {
    let mut decoder = decoder();
    let changes = decoder.decode("$GPDTM,W84,,0.0,N,0.0,E,,W84*41").unwrap();
    assert!(changes.is_empty());
    assert_eq!(decoder.fix().datum, "W84");
}

#[test]
fn reset_reverts_to_unknown_sentinels() {
    let mut decoder = decoder();
    decoder.decode(GGA).unwrap();
    decoder.decode(RMC).unwrap();
    decoder.reset_fix();

    let fix = decoder.fix();
    assert!(fix.position.is_none());
    assert!(fix.velocity.speed.is_unknown());
    assert_eq!(fix.velocity.heading, -1.0);
    assert_eq!(fix.sat_info.fix_validity, 1);
    assert_eq!(fix.sat_info.fix_accuracy, 999);
    assert_eq!(fix.sat_info.sat_count, 0);
    // Time and date stay meaningful as "time of the last good fix".
    assert_eq!(fix.time, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
}
