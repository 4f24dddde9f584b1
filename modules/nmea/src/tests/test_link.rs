// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::link::LinkMonitor;
use common::fix::FixStatus;

#[test]
fn connectivity_is_observed_before_fix_validity() {
    let mut link = LinkMonitor::new();
    assert_eq!(link.status(), FixStatus::NotConnected);

    assert_eq!(link.on_data(), Some(FixStatus::NoFix));
    assert_eq!(link.on_data(), None);
    assert_eq!(link.on_fix(), Some(FixStatus::ValidFix));
    assert_eq!(link.on_fix(), None);
}

#[test]
fn fix_timeout_regresses_to_no_fix_once() {
    let mut link = LinkMonitor::new();
    link.on_data();
    link.on_fix();

    assert_eq!(link.on_fix_timeout(), Some(FixStatus::NoFix));
    assert_eq!(link.on_fix_timeout(), None);
    // Data still flowing, no connectivity transition to report.
    assert_eq!(link.on_data(), None);
}

#[test]
fn connection_loss_from_any_state_notifies_once() {
    let mut link = LinkMonitor::new();
    link.on_data();
    link.on_fix();

    assert_eq!(link.on_connection_lost(), Some(FixStatus::NotConnected));
    assert_eq!(link.on_connection_lost(), None);
    assert_eq!(link.status(), FixStatus::NotConnected);
}

#[test]
fn clock_sync_suppression_eats_exactly_one_loss() {
    let mut link = LinkMonitor::new();
    link.on_data();
    link.on_fix();
    link.suppress_next_connection_loss();

    assert_eq!(link.on_connection_lost(), None);
    assert_eq!(link.status(), FixStatus::ValidFix);
    assert_eq!(link.on_connection_lost(), Some(FixStatus::NotConnected));
}

#[test]
fn reconnect_walks_through_no_fix_again() {
    let mut link = LinkMonitor::new();
    link.on_data();
    link.on_fix();
    link.on_connection_lost();

    assert_eq!(link.on_data(), Some(FixStatus::NoFix));
    assert_eq!(link.on_fix(), Some(FixStatus::ValidFix));
}
