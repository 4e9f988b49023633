//! Periodic sample-and-push loop.

use std::time::Duration;

use airq_types::{ParticulateSample, ReadingPayload};
use time::OffsetDateTime;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::client::PushClient;
use crate::config::SamplerConfig;
use crate::error::{Result, SamplerError};
use crate::reader;

/// Failures logged at warn before going quiet.
pub const WARN_ATTEMPTS: u32 = 3;

/// How to log the latest failure in a run of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLog {
    Warn(u32),
    /// The last message before going quiet.
    Error(u32),
    Silent,
}

/// Counts consecutive failures so a dead sensor or server does not flood
/// the log.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive: u32,
}

impl FailureTracker {
    pub fn failure(&mut self) -> FailureLog {
        self.consecutive = self.consecutive.saturating_add(1);
        match self.consecutive {
            n if n <= WARN_ATTEMPTS => FailureLog::Warn(n),
            n if n == WARN_ATTEMPTS + 1 => FailureLog::Error(n),
            _ => FailureLog::Silent,
        }
    }

    /// Reset the count. Returns the number of failures that preceded this
    /// success, if any.
    pub fn success(&mut self) -> Option<u32> {
        let previous = std::mem::take(&mut self.consecutive);
        (previous > 0).then_some(previous)
    }
}

/// Reads the sensor and pushes each sample to the API.
pub struct Sampler {
    config: SamplerConfig,
    client: PushClient,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Result<Self> {
        let client = PushClient::new(&config.endpoint, Duration::from_secs(10))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: SamplerConfig, client: PushClient) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Take one measurement from the serial port.
    pub async fn read_sensor(&self) -> Result<ParticulateSample> {
        let port = self.config.port.clone();
        let baud_rate = self.config.baud_rate;
        let timeout = self.config.read_timeout();

        tokio::task::spawn_blocking(move || reader::sample_port(&port, baud_rate, timeout))
            .await
            .map_err(|e| SamplerError::Task(e.to_string()))?
    }

    /// Push a sample taken at `at`.
    pub async fn push_sample(
        &self,
        sample: &ParticulateSample,
        at: OffsetDateTime,
    ) -> Result<ReadingPayload> {
        let payload = ReadingPayload::from_sample(&self.config.device_id, sample, at)?;
        let status = self.client.push(&payload).await?;
        info!(
            pm25 = payload.pm25,
            pm10 = payload.pm10,
            status = status.as_u16(),
            "Reading sent"
        );
        Ok(payload)
    }

    /// Read the sensor once and push the result.
    pub async fn sample_once(&self) -> Result<ReadingPayload> {
        let sample = self.read_sensor().await?;
        debug!(
            pm25 = sample.pm25(),
            pm10 = sample.pm10(),
            sensor_id = sample.sensor_id,
            "Read sample"
        );
        self.push_sample(&sample, OffsetDateTime::now_utc()).await
    }

    /// Sample forever at the configured interval.
    ///
    /// Failures never stop the loop; the sensor or server may come back.
    pub async fn run(&self) {
        info!(
            "Sampling {} every {}s for device {}, pushing to {}",
            self.config.port,
            self.config.interval_secs,
            self.config.device_id,
            self.client.endpoint()
        );

        let mut timer = interval(self.config.interval());
        let mut failures = FailureTracker::default();

        loop {
            timer.tick().await;

            match self.sample_once().await {
                Ok(_) => {
                    if let Some(n) = failures.success() {
                        info!("Sampling recovered after {} failed attempt(s)", n);
                    }
                }
                Err(e) => log_failure(&e, failures.failure()),
            }
        }
    }
}

fn log_failure(e: &SamplerError, log: FailureLog) {
    let what = match e {
        SamplerError::NotReachable { .. } => {
            "Failed to connect to the server; it might be down"
        }
        SamplerError::Rejected { .. } => "Server rejected the reading",
        _ => "Sampling failed",
    };

    match log {
        FailureLog::Warn(n) => warn!("{}: {} (attempt {})", what, e, n),
        FailureLog::Error(n) => error!(
            "{} after {} attempts, will continue trying silently: {}",
            what, n, e
        ),
        FailureLog::Silent => {}
    }
}
