use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Produces human-like pauses between DOM actions to reduce automation
/// signals. Prompt text itself goes in as one injection, never as emulated
/// keystrokes, so only inter-action pacing lives here.
#[derive(Debug, Clone)]
pub struct PacingEngine {}

impl PacingEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn pause(&self, min: u64, max: u64) {
        let mut rng = OsRng;
        let ms = rng.gen_range(min..=max);
        sleep(Duration::from_millis(ms)).await;
    }

    /// Short pre-action pause used before clicks and field fills.
    pub async fn settle(&self) {
        self.pause(90, 420).await;
    }
}

impl Default for PacingEngine {
    fn default() -> Self {
        Self::new()
    }
}
