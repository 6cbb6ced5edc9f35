//! Sun position and angle of incidence on a tilted plane.
//!
//! Uses the NOAA fractional-year series for declination and the equation
//! of time, which is accurate to a fraction of a degree and fully
//! deterministic for a given UTC timestamp.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::Serialize;

use super::types::ArrayConfig;

/// Sun angles for one timestamp and location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarPosition {
    pub timestamp: DateTime<Utc>,
    /// Solar zenith angle in degrees, [0, 180].
    pub zenith: f64,
    /// Solar azimuth in degrees clockwise from north, [0, 360).
    pub azimuth: f64,
    /// Angle of incidence on the array plane in degrees.
    /// `None` while the sun is at or below the horizon.
    pub aoi: Option<f64>,
}

impl SolarPosition {
    /// Computes the sun position for `timestamp` and the AOI on the array plane.
    pub fn for_array(array: &ArrayConfig, timestamp: DateTime<Utc>) -> Self {
        let (zenith, azimuth) = sun_angles(array.latitude, array.longitude, timestamp);
        let aoi = (zenith < 90.0)
            .then(|| angle_of_incidence(zenith, azimuth, array.tilt, array.azimuth));
        Self {
            timestamp,
            zenith,
            azimuth,
            aoi,
        }
    }

    /// Solar elevation above the horizon in degrees.
    pub fn elevation(&self) -> f64 {
        90.0 - self.zenith
    }

    pub fn is_daylight(&self) -> bool {
        self.zenith < 90.0
    }
}

/// Returns `(zenith, azimuth)` in degrees for a site and UTC instant.
///
/// # Arguments
///
/// * `latitude` - Site latitude in degrees (north positive)
/// * `longitude` - Site longitude in degrees (east positive)
/// * `timestamp` - UTC instant
pub fn sun_angles(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> (f64, f64) {
    let utc_hours = f64::from(timestamp.hour())
        + f64::from(timestamp.minute()) / 60.0
        + f64::from(timestamp.second()) / 3600.0;

    let gamma = 2.0 * std::f64::consts::PI / days_in_year(timestamp.year())
        * (f64::from(timestamp.ordinal()) - 1.0 + (utc_hours - 12.0) / 24.0);

    let decl = declination_rad(gamma);
    let true_solar_minutes = utc_hours * 60.0 + equation_of_time_min(gamma) + 4.0 * longitude;
    let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

    let lat = latitude.to_radians();
    let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos().to_degrees();

    // Measured from south, positive towards west; shifted to north-based below.
    let azimuth_from_south = hour_angle
        .sin()
        .atan2(hour_angle.cos() * lat.sin() - decl.tan() * lat.cos());
    let azimuth = (azimuth_from_south.to_degrees() + 180.0).rem_euclid(360.0);

    (zenith, azimuth)
}

/// Angle between the sun beam and the normal of a tilted plane, in degrees.
///
/// # Arguments
///
/// * `zenith` - Solar zenith in degrees
/// * `sun_azimuth` - Solar azimuth in degrees from north
/// * `tilt` - Plane tilt from horizontal in degrees
/// * `plane_azimuth` - Plane azimuth in degrees from north
pub fn angle_of_incidence(zenith: f64, sun_azimuth: f64, tilt: f64, plane_azimuth: f64) -> f64 {
    let z = zenith.to_radians();
    let t = tilt.to_radians();
    let cos_aoi = z.cos() * t.cos() + z.sin() * t.sin() * (sun_azimuth - plane_azimuth).to_radians().cos();
    cos_aoi.clamp(-1.0, 1.0).acos().to_degrees()
}

fn declination_rad(gamma: f64) -> f64 {
    0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin() - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin()
}

fn equation_of_time_min(gamma: f64) -> f64 {
    229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin())
}

fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}
