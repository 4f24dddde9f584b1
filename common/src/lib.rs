// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Common module of the GPS acquisition subsystem
//!
//! Provides the data types that are shared across every module: fixed-point
//! WGS84 coordinates, altitude and speed units, satellite information, the
//! decoded navigation fix and the subsystem configuration.

pub mod config;
pub mod fix;
pub mod position;
pub mod satellite;
pub mod serde;
pub mod units;

#[cfg(test)]
mod tests;
