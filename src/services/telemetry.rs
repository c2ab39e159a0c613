use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::constants;
use crate::error::{OssError, Result};
use crate::models::{ApiToken, MeterIdentifier, TelemetryReading};
use crate::services::vendor_client::{is_transient_status, VendorClient};

/// Reads the most recent complete telemetry bucket for a meter
#[derive(Clone, Debug)]
pub struct TelemetryClient {
    vendor: VendorClient,
}

/// The last complete minute before `now`: `end` is `now` truncated to the
/// minute minus one minute, `start` one minute before `end`.
pub fn latest_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let truncated = now
        .duration_trunc(ChronoDuration::minutes(1))
        .unwrap_or(now);
    let end = truncated - ChronoDuration::minutes(1);
    let start = end - ChronoDuration::minutes(1);
    (start, end)
}

impl TelemetryClient {
    pub fn new(vendor: VendorClient) -> Self {
        Self { vendor }
    }

    /// Latest reading for `meter`, relative to the current time
    pub async fn latest(&self, token: &ApiToken, meter: &MeterIdentifier) -> Result<TelemetryReading> {
        self.latest_at(token, meter, Utc::now()).await
    }

    #[instrument(skip(self, token, meter), fields(meter = %meter))]
    pub async fn latest_at(
        &self,
        token: &ApiToken,
        meter: &MeterIdentifier,
        now: DateTime<Utc>,
    ) -> Result<TelemetryReading> {
        let (start, end) = latest_window(now);
        let start = start.format(constants::telemetry::PATH_TIME_FORMAT).to_string();
        let end = end.format(constants::telemetry::PATH_TIME_FORMAT).to_string();
        let resolution = constants::telemetry::RESOLUTION_MINUTES.to_string();

        let url = self.vendor.endpoint(&[
            constants::api::TELEMETRY,
            meter.as_str(),
            start.as_str(),
            end.as_str(),
            resolution.as_str(),
        ])?;
        debug!(start = %start, end = %end, "Fetching telemetry");

        let response = self
            .vendor
            .send(self.vendor.get(url).bearer_auth(token.expose_secret()))
            .await?;

        let status = response.status();
        if status.is_success() {
            let readings: Vec<TelemetryReading> = VendorClient::decode(response).await?;
            return readings
                .into_iter()
                .next()
                .ok_or_else(|| OssError::NoTelemetry(meter.to_string()));
        }

        let detail = VendorClient::describe_failure(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(OssError::Unauthorized(detail))
            }
            s if is_transient_status(s) => Err(OssError::Transport(detail)),
            _ => Err(OssError::UnexpectedResponse(detail)),
        }
    }
}

/// Periodic telemetry poller for one meter
pub struct TelemetryWatcher {
    client: TelemetryClient,
    token: ApiToken,
    meter: MeterIdentifier,
    period: Duration,
}

impl TelemetryWatcher {
    pub fn new(client: TelemetryClient, token: ApiToken, meter: MeterIdentifier, period: Duration) -> Self {
        Self {
            client,
            token,
            meter,
            period,
        }
    }

    /// Poll until Ctrl-C or SIGTERM, handing each reading to `on_reading`
    pub async fn run<F>(&self, on_reading: F) -> Result<()>
    where
        F: FnMut(&MeterIdentifier, &TelemetryReading),
    {
        let stop = async {
            let signal = termination_signal().await;
            info!(signal, "Termination requested");
        };
        self.run_until(stop, on_reading).await
    }

    /// Poll until `shutdown` resolves, handing each reading to `on_reading`.
    ///
    /// Failed polls are logged and the loop continues, except for a rejected
    /// token which ends the loop with `Unauthorized`.
    pub async fn run_until<S, F>(&self, shutdown: S, mut on_reading: F) -> Result<()>
    where
        S: Future<Output = ()>,
        F: FnMut(&MeterIdentifier, &TelemetryReading),
    {
        info!(
            meter = %self.meter,
            "Starting telemetry watch with interval: {}s",
            self.period.as_secs()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(meter = %self.meter, "Telemetry watch stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.client.latest(&self.token, &self.meter).await {
                        Ok(reading) => on_reading(&self.meter, &reading),
                        Err(e @ OssError::Unauthorized(_)) => {
                            error!(meter = %self.meter, "Token rejected, stopping telemetry watch: {}", e);
                            return Err(e);
                        }
                        Err(e) => error!(meter = %self.meter, "Error fetching telemetry: {}", e),
                    }
                }
            }
        }
    }
}

/// Name of the first termination signal delivered to the process.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = interrupt() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable, only Ctrl-C stops the watch: {}", e);
                interrupt().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        interrupt().await;
        "SIGINT"
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
