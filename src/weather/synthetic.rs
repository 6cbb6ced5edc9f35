use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{HourRange, WeatherSample, WeatherSource};
use crate::error::Result;
use crate::solar::geometry::sun_angles;

/// Lowest cloud multiplier (heavy overcast).
const MULTIPLIER_MIN: f64 = 0.2;
/// Highest cloud multiplier (clear sky).
const MULTIPLIER_MAX: f64 = 1.0;
/// Diffuse share of GHI under a clear sky.
const CLEAR_DIFFUSE_FRACTION: f64 = 0.15;
/// Below this cos(zenith) all irradiance is treated as diffuse.
const LOW_SUN_COS_ZENITH: f64 = 0.05;
/// Local solar hour of the daily temperature maximum.
const TEMP_PEAK_HOUR: f64 = 15.0;

/// Offline weather: Haurwitz clear-sky irradiance scaled by an AR(1) cloud
/// multiplier, plus a sinusoidal diurnal temperature.
///
/// The cloud multiplier evolves as
/// ```text
/// m(t) = alpha * m(t-1) + (1 - alpha) * mean + epsilon(t)
/// ```
/// and is clamped to \[0.2, 1.0\]. Output depends only on the seed, the
/// site and the requested range, so repeated fetches are identical.
#[derive(Debug, Clone)]
pub struct SyntheticWeather {
    seed: u64,
    /// AR(1) persistence (0 = uncorrelated, 1 = frozen).
    pub alpha: f64,
    /// Long-run mean of the cloud multiplier.
    pub mean_clearness: f64,
    /// Standard deviation of the innovation noise.
    pub cloud_noise_std: f64,
    /// Daily mean air temperature (°C).
    pub mean_temp_c: f64,
    /// Half the daily temperature swing (°C).
    pub temp_amplitude_c: f64,
}

impl SyntheticWeather {
    /// Creates a generator with moderate cloudiness and mild temperatures.
    ///
    /// # Arguments
    ///
    /// * `seed` - Random seed for reproducible cloud sequences
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            alpha: 0.85,
            mean_clearness: 0.75,
            cloud_noise_std: 0.08,
            mean_temp_c: 15.0,
            temp_amplitude_c: 6.0,
        }
    }

    /// Sets the cloud process parameters. Values are clamped to sensible ranges.
    pub fn with_clouds(mut self, alpha: f64, mean_clearness: f64, noise_std: f64) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self.mean_clearness = mean_clearness.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
        self.cloud_noise_std = noise_std.max(0.0);
        self
    }

    pub fn with_temperature(mut self, mean_c: f64, amplitude_c: f64) -> Self {
        self.mean_temp_c = mean_c;
        self.temp_amplitude_c = amplitude_c.abs();
        self
    }

    /// Generates one sample per hour of `range`.
    pub fn generate(&self, latitude: f64, longitude: f64, range: &HourRange) -> Vec<WeatherSample> {
        let mut rng = StdRng::seed_from_u64(self.stream_seed(latitude, longitude, range));
        let mut multiplier = self.mean_clearness;

        range
            .timestamps()
            .map(|timestamp| {
                multiplier = (self.alpha * multiplier
                    + (1.0 - self.alpha) * self.mean_clearness
                    + gaussian_noise(&mut rng, self.cloud_noise_std))
                .clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);

                let (zenith, _) = sun_angles(latitude, longitude, timestamp);
                let (ghi, dni, dhi) = split_irradiance(zenith.to_radians().cos(), multiplier);

                WeatherSample {
                    timestamp,
                    ghi,
                    dni,
                    dhi,
                    ambient_temp: self.temperature(longitude, timestamp),
                }
            })
            .collect()
    }

    fn temperature(&self, longitude: f64, ts: DateTime<Utc>) -> f64 {
        let solar_hour = f64::from(ts.hour()) + longitude / 15.0;
        let phase = 2.0 * std::f64::consts::PI * (solar_hour - TEMP_PEAK_HOUR) / 24.0;
        self.mean_temp_c + self.temp_amplitude_c * phase.cos()
    }

    fn stream_seed(&self, latitude: f64, longitude: f64, range: &HourRange) -> u64 {
        self.seed
            ^ latitude.to_bits().rotate_left(13)
            ^ longitude.to_bits().rotate_left(29)
            ^ range.start().timestamp() as u64
    }
}

/// Splits clear-sky GHI scaled by `multiplier` into (GHI, DNI, DHI).
fn split_irradiance(cos_zenith: f64, multiplier: f64) -> (f64, f64, f64) {
    if cos_zenith <= 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let ghi = haurwitz_ghi(cos_zenith) * multiplier;
    if cos_zenith <= LOW_SUN_COS_ZENITH {
        return (ghi, 0.0, ghi);
    }

    // m = 1.0 -> 0.15, m = 0.2 -> 1.0
    let overcast = (MULTIPLIER_MAX - multiplier) / (MULTIPLIER_MAX - MULTIPLIER_MIN);
    let diffuse_fraction =
        (CLEAR_DIFFUSE_FRACTION + overcast * (1.0 - CLEAR_DIFFUSE_FRACTION)).clamp(CLEAR_DIFFUSE_FRACTION, 1.0);
    let dhi = ghi * diffuse_fraction;
    let dni = (ghi - dhi) / cos_zenith;
    (ghi, dni, dhi)
}

/// Haurwitz clear-sky global horizontal irradiance (W/m²).
fn haurwitz_ghi(cos_zenith: f64) -> f64 {
    if cos_zenith <= 0.0 {
        return 0.0;
    }
    1098.0 * cos_zenith * (-0.059 / cos_zenith).exp()
}

/// Zero-mean Gaussian sample via Box-Muller.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

#[async_trait]
impl WeatherSource for SyntheticWeather {
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        Ok(self.generate(latitude, longitude, &range))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::validate_coverage;
    use chrono::TimeZone;

    fn june_day() -> HourRange {
        HourRange::new(Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap(), 24).unwrap()
    }

    #[test]
    fn covers_the_whole_range() {
        let samples = SyntheticWeather::new(7).generate(48.2, 16.37, &june_day());
        assert!(validate_coverage(&samples, &june_day()).is_ok());
    }

    #[test]
    fn same_seed_same_weather() {
        let a = SyntheticWeather::new(42).generate(48.2, 16.37, &june_day());
        let b = SyntheticWeather::new(42).generate(48.2, 16.37, &june_day());
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = SyntheticWeather::new(1).generate(48.2, 16.37, &june_day());
        let b = SyntheticWeather::new(2).generate(48.2, 16.37, &june_day());
        assert_ne!(a, b);
    }

    #[test]
    fn dark_at_night_bright_at_noon() {
        let samples = SyntheticWeather::new(3).generate(48.2, 16.37, &june_day());
        assert_eq!(samples[0].ghi, 0.0);
        assert_eq!(samples[23].ghi, 0.0);
        assert!(samples[11].ghi > 150.0);
    }

    #[test]
    fn components_are_consistent() {
        let samples = SyntheticWeather::new(9).generate(48.2, 16.37, &june_day());
        for s in &samples {
            assert!(s.dhi <= s.ghi + 1e-9);
            assert!(s.dni >= 0.0);
            let (zenith, _) = sun_angles(48.2, 16.37, s.timestamp);
            let cos_z = zenith.to_radians().cos();
            if cos_z > LOW_SUN_COS_ZENITH {
                assert!((s.dni * cos_z + s.dhi - s.ghi).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn clear_sky_matches_haurwitz() {
        let (ghi, dni, dhi) = split_irradiance(1.0, 1.0);
        assert!((ghi - 1098.0 * (-0.059f64).exp()).abs() < 1e-9);
        assert!((dhi / ghi - CLEAR_DIFFUSE_FRACTION).abs() < 1e-9);
        assert!(dni > 0.0);
    }

    #[test]
    fn afternoon_is_warmer_than_dawn() {
        let samples = SyntheticWeather::new(5).generate(48.2, 16.37, &june_day());
        // 14 UTC is about 15 local solar time at 16°E
        assert!(samples[14].ambient_temp > samples[2].ambient_temp);
    }
}
