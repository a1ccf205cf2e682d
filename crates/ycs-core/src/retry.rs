//! Bounded retry with backoff
//!
//! Replaces "schedule myself again in N ms" loops with a helper that has a
//! fixed attempt ceiling and reports exhaustion as a value.

use serde::Deserialize;

use crate::types::Millis;

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "stepMs")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Millis),
    /// `step * n` before the n-th retry.
    Linear(Millis),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Player element polling: 25 attempts, 200 ms apart.
    pub const PLAYER_POLL: RetryPolicy = RetryPolicy {
        max_attempts: 25,
        backoff: Backoff::Fixed(200),
    };

    /// Player API calls that can throw while the player warms up.
    pub const PLAYER_CALL: RetryPolicy = RetryPolicy {
        max_attempts: 6,
        backoff: Backoff::Linear(50),
    };

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Millis {
        match self.backoff {
            Backoff::Fixed(ms) => ms,
            Backoff::Linear(step) => step.saturating_mul(u64::from(retry)),
        }
    }
}

/// Something that can wait (a `setTimeout` promise in the browser).
#[allow(async_fn_in_trait)]
pub trait Sleep {
    async fn sleep(&self, ms: Millis);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("Gave up after {attempts} attempts")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_last(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Z>(policy: RetryPolicy, sleeper: &Z, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    Z: Sleep,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(_) => {
                sleeper.sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}
