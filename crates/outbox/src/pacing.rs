//! Inter-cycle pacing for the outbox publisher.
//!
//! After each cycle the publisher asks the [`Pacer`] how long to wait:
//!
//! | outcome                              | wait                      |
//! |--------------------------------------|---------------------------|
//! | nothing pending                      | idle delay + jitter       |
//! | partial batch (fetched < batch size) | idle delay + jitter       |
//! | full batch, at least one published   | busy yield                |
//! | full batch, nothing published        | backoff + jitter          |
//! | cycle failed                         | backoff + jitter          |
//!
//! Any cycle that published at least one entry, and any empty cycle,
//! resets the consecutive failure count.

use std::time::Duration;

use rand::Rng;

use crate::PublisherConfig;

/// Exponential backoff: `base * 2^(n-1)` for the `n`-th consecutive failure,
/// with the exponent capped at 10 and the result capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    const MAX_EXPONENT: u32 = 10;

    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay for the given number of consecutive failures. Zero failures
    /// means no backoff.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (consecutive_failures - 1).min(Self::MAX_EXPONENT);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// What a single publisher cycle observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending.
    Empty,
    /// A batch was read and every entry attempted.
    Batch { fetched: usize, published: usize },
    /// The cycle itself failed (store read or outcome write).
    Failed,
}

/// Tracks consecutive failures and turns cycle outcomes into delays.
#[derive(Debug, Clone)]
pub struct Pacer {
    batch_size: usize,
    idle_delay: Duration,
    busy_yield: Duration,
    max_jitter: Duration,
    backoff: Backoff,
    consecutive_failures: u32,
}

impl Pacer {
    pub fn new(config: &PublisherConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            idle_delay: config.idle_delay,
            busy_yield: config.busy_yield,
            max_jitter: config.jitter,
            backoff: Backoff::new(config.backoff_base, config.backoff_max),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Records `outcome` and returns how long to wait before the next cycle.
    pub fn next_delay(&mut self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Empty => {
                self.consecutive_failures = 0;
                self.idle_delay + self.jitter()
            }
            CycleOutcome::Batch { fetched, published } => {
                if published > 0 {
                    self.consecutive_failures = 0;
                }

                if fetched < self.batch_size {
                    self.idle_delay + self.jitter()
                } else if published > 0 {
                    self.busy_yield
                } else {
                    self.fail()
                }
            }
            CycleOutcome::Failed => self.fail(),
        }
    }

    fn fail(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.backoff.delay(self.consecutive_failures) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
