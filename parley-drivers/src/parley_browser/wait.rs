use async_trait::async_trait;
use parley_common::ParleyError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::surface::{ChatSurface, Condition, Selector};

/// Time source for poll loops. Production code uses [`TokioClock`]; tests
/// substitute a virtual clock so timeouts run without wall-clock delay.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded poll loop over a [`ChatSurface`].
///
/// One wait is one timeout window; there are no internal retries. A wait
/// never sleeps past its deadline by more than one poll interval.
#[derive(Clone)]
pub struct Waiter {
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl Waiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_clock(poll_interval, Arc::new(TokioClock))
    }

    pub fn with_clock(poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            poll_interval,
            clock,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Block until `selector` satisfies `condition`, or fail with
    /// [`ParleyError::ElementNotFound`] once `timeout` has elapsed.
    pub async fn wait_for<S>(
        &self,
        surface: &mut S,
        selector: &Selector,
        condition: Condition,
        timeout: Duration,
    ) -> parley_common::Result<()>
    where
        S: ChatSurface + ?Sized,
    {
        let started = self.clock.now();
        loop {
            if surface.probe(selector, condition).await? {
                return Ok(());
            }
            let elapsed = self.clock.now().duration_since(started);
            if elapsed >= timeout {
                return Err(ParleyError::ElementNotFound {
                    selector: selector.to_string(),
                    elapsed,
                });
            }
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
