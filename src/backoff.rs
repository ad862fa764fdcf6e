use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule for polling and bounded retries.
///
/// `duration` is the initial delay in milliseconds; each step multiplies
/// it by `factor` and adds up to `jitter * delay` of random slack.
/// `steps` bounds the number of attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    /// Initial delay in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration: u64,

    /// Multiplier applied to the delay after every attempt
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Random slack added to each delay (0.0 - 1.0)
    #[serde(default)]
    pub jitter: f64,

    /// Maximum number of attempts
    #[serde(default = "default_steps")]
    pub steps: u32,
}

fn default_duration_ms() -> u64 {
    1000
}
fn default_factor() -> f64 {
    2.0
}
fn default_steps() -> u32 {
    5
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            duration: 1000,
            factor: 2.0,
            jitter: 0.1,
            steps: 5,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.duration as f64 * self.factor.powi(attempt as i32);

        let jittered = if self.jitter > 0.0 {
            let mut rng = rand::thread_rng();
            base + rng.gen::<f64>() * self.jitter * base
        } else {
            base
        };

        Duration::from_millis(jittered as u64)
    }

    /// Poll `probe` until it yields a value or the schedule is exhausted.
    ///
    /// The probe runs once per step; the backoff delay sleeps between
    /// steps, not after the last one.
    pub async fn poll<F, Fut, T>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Option<T>>,
    {
        for attempt in 0..self.steps {
            if let Some(value) = probe().await {
                return Some(value);
            }
            if attempt + 1 < self.steps {
                tokio::time::sleep(self.delay_for_attempt(attempt)).await;
            }
        }
        None
    }
}
