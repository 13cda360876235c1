//! The measurement pipeline.
//!
//! Each sample runs `measure -> score -> record -> notify`, every stage
//! returning a `Result` the next one inspects. All departures are resolved
//! before the first network call, and a failed sample never leaves a
//! partial row behind.

use crate::config::{Config, Settings};
use crate::errors::JamError;
use crate::jam::{jam_score, Departure, DepartureResolver, JamScore};
use crate::models::JamRecord;
use crate::notify::{is_trigger, Notifier, WebhookNotifier};
use crate::provider::{DistanceMatrixClient, TravelTimeProvider};
use crate::report::render_notification;
use crate::sink::{AnySink, RecordSink};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// What happened to the summary notification for one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationStatus {
    /// No notifier configured, or this sample is not the trigger time.
    NotDue,
    Sent,
    /// Delivery failed; the record was still written.
    Failed(String),
    /// Dry run: nothing is sent.
    Skipped,
}

/// A sample that was measured and scored.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub record: JamRecord,
    pub score: JamScore,
    /// False for dry runs.
    pub written: bool,
    pub notification: NotificationStatus,
}

/// Result of one departure sample.
#[derive(Debug)]
pub struct SampleOutcome {
    pub departure: Departure,
    pub result: Result<Recorded, JamError>,
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub samples: Vec<SampleOutcome>,
}

impl RunOutcome {
    pub fn recorded(&self) -> impl Iterator<Item = &Recorded> {
        self.samples.iter().filter_map(|s| s.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Departure, &JamError)> {
        self.samples
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (&s.departure, e)))
    }

    /// 0 when every sample was recorded, otherwise the highest error code.
    pub fn exit_code(&self) -> i32 {
        self.failures()
            .map(|(_, e)| e.exit_code())
            .max()
            .unwrap_or(0)
    }
}

/// Run options that are not part of the persistent configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Measure and score without writing or notifying.
    pub dry_run: bool,
}

/// Linear fetch/score/record/notify pipeline over pluggable stages.
pub struct Pipeline<P, S, N> {
    settings: Settings,
    provider: P,
    sink: S,
    notifier: Option<N>,
    options: RunOptions,
}

impl<P, S, N> Pipeline<P, S, N>
where
    P: TravelTimeProvider,
    S: RecordSink,
    N: Notifier,
{
    pub fn new(
        settings: Settings,
        provider: P,
        sink: S,
        notifier: Option<N>,
        options: RunOptions,
    ) -> Self {
        Self {
            settings,
            provider,
            sink,
            notifier,
            options,
        }
    }

    /// Resolve every configured departure against `now`.
    pub fn resolve_departures(&self, now: DateTime<Utc>) -> Result<Vec<Departure>, JamError> {
        let resolver = DepartureResolver::new(self.settings.timezone);
        self.settings
            .departures
            .iter()
            .map(|request| resolver.resolve(*request, now))
            .collect()
    }

    /// Run all samples. Only resolution errors abort the run; per-sample
    /// failures are reported in the outcome.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, JamError> {
        let departures = self.resolve_departures(now)?;
        let mut outcome = RunOutcome::default();

        for departure in departures {
            let result = self.run_sample(&departure).await;
            if let Err(ref e) = result {
                error!("Sample for {} failed: {}", departure.clock_string(), e);
            }
            outcome.samples.push(SampleOutcome { departure, result });
        }

        Ok(outcome)
    }

    async fn run_sample(&self, departure: &Departure) -> Result<Recorded, JamError> {
        let measurement = self.provider.measure(departure).await?;

        let score = jam_score(measurement.travel_time_seconds, self.settings.baseline_minutes)?;
        let record = JamRecord::new(departure, &score);
        debug!("Built record {:?}", record);

        if self.options.dry_run {
            info!("Dry run: not writing to {}", self.sink.describe());
            return Ok(Recorded {
                record,
                score,
                written: false,
                notification: NotificationStatus::Skipped,
            });
        }

        self.sink.append(&record).await?;

        let notification = self.notify(departure).await;

        Ok(Recorded {
            record,
            score,
            written: true,
            notification,
        })
    }

    /// Send the summary if this departure is the trigger. Never fails the sample.
    async fn notify(&self, departure: &Departure) -> NotificationStatus {
        let (Some(notifier), Some(notify)) = (&self.notifier, &self.settings.notify) else {
            return NotificationStatus::NotDue;
        };
        if !is_trigger(departure, notify.trigger) {
            return NotificationStatus::NotDue;
        }

        let rows = match self.sink.recent(notify.rows).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not read recent rows for summary: {}", e);
                return NotificationStatus::Failed(e.to_string());
            }
        };

        let (subject, body) = render_notification(&rows);
        match notifier.send(&subject, &body).await {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => {
                warn!("Summary notification failed: {}", e);
                NotificationStatus::Failed(e.to_string())
            }
        }
    }
}

/// Validate `config`, build the real stages and run them.
///
/// Configuration problems are returned before any component touches the
/// network.
pub async fn run_configured(
    config: &Config,
    options: RunOptions,
    now: DateTime<Utc>,
) -> Result<RunOutcome, JamError> {
    let settings = config.settings()?;

    let provider = DistanceMatrixClient::new(&settings)?;
    let sink = AnySink::from_settings(&settings.sink, settings.request_timeout)?;
    let notifier = match settings.notify {
        Some(ref notify) => Some(WebhookNotifier::new(
            &notify.webhook_url,
            settings.request_timeout,
        )?),
        None => None,
    };

    info!(
        "Logging {} sample(s) to {}",
        settings.departures.len(),
        sink.describe()
    );

    Pipeline::new(settings, provider, sink, notifier, options)
        .run(now)
        .await
}
