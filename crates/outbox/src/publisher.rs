use std::time::{Duration, Instant};

use broker::EventPublisher;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{CycleOutcome, OutboxStore, Pacer, Result};

/// Tuning knobs for the publisher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Maximum entries read per cycle.
    pub batch_size: usize,
    /// Sleep when the outbox is empty or a cycle read a partial batch.
    pub idle_delay: Duration,
    /// Pause between back-to-back full batches.
    pub busy_yield: Duration,
    /// First backoff step after a failed cycle.
    pub backoff_base: Duration,
    /// Upper bound on the backoff step.
    pub backoff_max: Duration,
    /// Upper bound of the uniform jitter added to idle and backoff sleeps.
    pub jitter: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            idle_delay: Duration::from_secs(2),
            busy_yield: Duration::from_millis(1),
            backoff_base: Duration::from_millis(300),
            backoff_max: Duration::from_secs(10),
            jitter: Duration::from_millis(150),
        }
    }
}

impl PublisherConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    pub fn with_busy_yield(mut self, busy_yield: Duration) -> Self {
        self.busy_yield = busy_yield;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max.max(base);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Counts from one publisher cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries read from the store.
    pub fetched: usize,
    /// Entries the broker accepted.
    pub published: usize,
    /// Entries whose publish attempt failed.
    pub failed: usize,
}

impl CycleReport {
    pub fn outcome(&self) -> CycleOutcome {
        if self.fetched == 0 {
            CycleOutcome::Empty
        } else {
            CycleOutcome::Batch {
                fetched: self.fetched,
                published: self.published,
            }
        }
    }
}

/// Drains pending outbox entries into the broker.
///
/// Each cycle reads the oldest pending entries, publishes them one by one
/// in `occurred_at` order, and then writes every attempted outcome back in
/// a single store call. A failed publish never stops the rest of the batch.
/// If the outcome write fails the batch stays pending and is published
/// again on a later cycle; consumers absorb the duplicates.
pub struct OutboxPublisher<S, P> {
    store: S,
    publisher: P,
    config: PublisherConfig,
    pacer: Pacer,
}

impl<S, P> OutboxPublisher<S, P>
where
    S: OutboxStore,
    P: EventPublisher,
{
    pub fn new(store: S, publisher: P, config: PublisherConfig) -> Self {
        Self {
            store,
            publisher,
            pacer: Pacer::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.pacer.consecutive_failures()
    }

    /// Runs one read-publish-persist cycle.
    ///
    /// Entries not yet attempted when `shutdown` fires are left untouched.
    /// A publish interrupted by shutdown counts as a failed attempt.
    #[tracing::instrument(skip(self, shutdown), fields(batch_size = self.config.batch_size))]
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleReport> {
        let started = Instant::now();

        let pending = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(CycleReport::default()),
            result = self.store.fetch_pending(self.config.batch_size) => result?,
        };

        let mut report = CycleReport {
            fetched: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let mut attempted = Vec::with_capacity(pending.len());
        for mut entry in pending {
            if shutdown.is_cancelled() {
                break;
            }

            let envelope = entry.to_envelope();
            let result = tokio::select! {
                biased;
                result = self.publisher.publish(&envelope) => result.map_err(|e| e.to_string()),
                _ = shutdown.cancelled() => Err("publish interrupted by shutdown".to_string()),
            };

            match result {
                Ok(()) => {
                    entry.record_success(Utc::now());
                    report.published += 1;
                    metrics::counter!("outbox_messages_published_total").increment(1);
                }
                Err(reason) => {
                    tracing::error!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        attempts = entry.attempts + 1,
                        error = %reason,
                        "failed to publish outbox entry"
                    );
                    entry.record_failure(reason);
                    report.failed += 1;
                    metrics::counter!("outbox_publish_failures_total").increment(1);
                }
            }
            attempted.push(entry);
        }

        self.store.save_outcomes(&attempted).await?;

        metrics::histogram!("outbox_cycle_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            fetched = report.fetched,
            published = report.published,
            failed = report.failed,
            "outbox cycle complete"
        );

        Ok(report)
    }

    /// Runs cycles back to back until a cycle reads a partial batch or
    /// publishes nothing. Returns the number of entries published.
    pub async fn drain(&self, shutdown: &CancellationToken) -> Result<usize> {
        let mut total = 0;
        loop {
            let report = self.run_cycle(shutdown).await?;
            total += report.published;
            if report.fetched < self.config.batch_size
                || report.published == 0
                || shutdown.is_cancelled()
            {
                return Ok(total);
            }
        }
    }

    /// Loops until `shutdown` is cancelled, pacing cycles according to
    /// their outcome.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            idle_delay_ms = self.config.idle_delay.as_millis() as u64,
            "outbox publisher started"
        );

        while !shutdown.is_cancelled() {
            let outcome = match self.run_cycle(&shutdown).await {
                Ok(report) => report.outcome(),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        consecutive_failures = self.pacer.consecutive_failures() + 1,
                        "outbox cycle failed"
                    );
                    CycleOutcome::Failed
                }
            };

            let delay = self.pacer.next_delay(outcome);
            metrics::gauge!("outbox_consecutive_failures")
                .set(f64::from(self.pacer.consecutive_failures()));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("outbox publisher stopped");
    }
}
