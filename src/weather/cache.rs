//! Time-bounded memoisation of weather fetches.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{HourRange, SampleAveraging, WeatherSample, WeatherSource};
use crate::error::Result;

/// Weather depends on the site and the hours only, not on array orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    latitude_bits: u64,
    longitude_bits: u64,
    range: HourRange,
}

impl CacheKey {
    fn new(latitude: f64, longitude: f64, range: HourRange) -> Self {
        Self {
            latitude_bits: latitude.to_bits(),
            longitude_bits: longitude.to_bits(),
            range,
        }
    }
}

struct Entry {
    stored_at: Instant,
    samples: Vec<WeatherSample>,
}

/// Wraps a [`WeatherSource`] and reuses successful responses for `ttl`.
///
/// Failures are never cached. A zero `ttl` disables caching entirely.
pub struct CachedWeatherSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl<S: WeatherSource> CachedWeatherSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries currently held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey) -> Option<Vec<WeatherSample>> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.samples.clone())
    }

    fn store(&self, key: CacheKey, samples: &[WeatherSample]) {
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                samples: samples.to_vec(),
            },
        );
    }
}

#[async_trait]
impl<S: WeatherSource> WeatherSource for CachedWeatherSource<S> {
    async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
        if self.ttl.is_zero() {
            return self.inner.fetch(latitude, longitude, range).await;
        }

        let key = CacheKey::new(latitude, longitude, range);
        if let Some(samples) = self.lookup(&key) {
            debug!("weather cache hit for {} hours from {}", range.hours(), range.start());
            return Ok(samples);
        }

        let samples = self.inner.fetch(latitude, longitude, range).await?;
        self.store(key, &samples);
        Ok(samples)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn averaging(&self) -> SampleAveraging {
        self.inner.averaging()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::weather::SyntheticWeather;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl WeatherSource for Counting {
        async fn fetch(&self, latitude: f64, longitude: f64, range: HourRange) -> Result<Vec<WeatherSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ForecastError::upstream("down"));
            }
            SyntheticWeather::new(1).fetch(latitude, longitude, range).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn range(day: u32) -> HourRange {
        HourRange::new(Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap(), 24).unwrap()
    }

    #[tokio::test]
    async fn repeated_fetch_hits_cache() {
        let cached = CachedWeatherSource::new(Counting::new(false), Duration::from_secs(60));
        let a = cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        let b = cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn different_site_or_range_misses() {
        let cached = CachedWeatherSource::new(Counting::new(false), Duration::from_secs(60));
        cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        cached.fetch(48.3, 16.37, range(1)).await.unwrap();
        cached.fetch(48.2, 16.37, range(2)).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_ttl_passes_through() {
        let cached = CachedWeatherSource::new(Counting::new(false), Duration::ZERO);
        cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedWeatherSource::new(Counting::new(true), Duration::from_secs(60));
        assert!(cached.fetch(48.2, 16.37, range(1)).await.is_err());
        assert!(cached.fetch(48.2, 16.37, range(1)).await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn averaging_follows_inner_source() {
        let plain = CachedWeatherSource::new(Counting::new(false), Duration::from_secs(60));
        assert_eq!(plain.averaging(), SampleAveraging::Instant);

        let client = crate::weather::OpenMeteoClient::new(
            "http://127.0.0.1:9/v1/forecast",
            Duration::from_secs(1),
            crate::weather::RetryPolicy::default(),
        )
        .unwrap();
        let cached = CachedWeatherSource::new(client, Duration::from_secs(60));
        assert_eq!(cached.averaging(), SampleAveraging::PrecedingHour);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let cached = CachedWeatherSource::new(Counting::new(false), Duration::from_millis(20));
        cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cached.fetch(48.2, 16.37, range(1)).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
