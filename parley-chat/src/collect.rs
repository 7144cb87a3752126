//! Detects completion of a streamed reply and extracts it as plain text.
//!
//! The reply container is polled at the adapter's fixed interval; it counts
//! as finished once its markup has sat unchanged for the adapter's quiet
//! period and the adapter's authoritative signal (marker present, indicator
//! gone, or stability alone) agrees. A reply that never settles inside the
//! response window yields no partial text.
use parley_common::ParleyError;
use parley_drivers::parley_browser::surface::{ChatSurface, Condition};
use parley_drivers::parley_browser::wait::Waiter;
use regex::Regex;
use tracing::debug;

use crate::providers::{CompletionRule, ProviderAdapter};

pub(crate) async fn await_reply<S>(
    surface: &mut S,
    waiter: &Waiter,
    adapter: &ProviderAdapter,
    turn: usize,
) -> parley_common::Result<String>
where
    S: ChatSurface + ?Sized,
{
    let reply = adapter.chat.reply.for_turn(turn);
    let timing = &adapter.timing;
    let clock = waiter.clock().clone();

    let started = clock.now();
    clock.sleep(timing.response_grace).await;

    let mut last: Option<String> = None;
    let mut stable_run: u32 = 0;
    loop {
        if clock.now().duration_since(started) >= timing.response_timeout {
            return Err(ParleyError::ResponseTimeout(timing.response_timeout));
        }

        let snapshot = if surface.probe(&reply, Condition::Present).await? {
            Some(surface.html_of(&reply).await?)
        } else {
            None
        };

        stable_run = match (&snapshot, &last) {
            (Some(current), Some(previous)) if current == previous => stable_run + 1,
            (Some(_), _) => 1,
            (None, _) => 0,
        };
        last = snapshot;

        if stable_run >= adapter.completion.quiet_polls()
            && signal_agrees(surface, &adapter.completion).await?
        {
            let text = clean_reply(&surface.text_of(&reply).await?);
            debug!(
                target: "chat.collect",
                provider = adapter.name,
                turn,
                chars = text.len(),
                "reply stabilised"
            );
            return Ok(text);
        }

        clock.sleep(timing.poll_interval).await;
    }
}

async fn signal_agrees<S>(surface: &mut S, rule: &CompletionRule) -> anyhow::Result<bool>
where
    S: ChatSurface + ?Sized,
{
    Ok(match rule {
        CompletionRule::QuietPeriod { .. } => true,
        CompletionRule::MarkerAppears { marker, .. } => {
            surface.probe(marker, Condition::Present).await?
        }
        CompletionRule::IndicatorGone { indicator, .. } => {
            surface.probe(indicator, Condition::Gone).await?
        }
    })
}

/// Strip incidental markup artifacts from extracted reply text.
fn clean_reply(raw: &str) -> String {
    let unbroken = raw.replace('\u{a0}', " ");
    let squeezed = Regex::new(r"\n{3,}")
        .expect("static pattern")
        .replace_all(&unbroken, "\n\n");
    squeezed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_reply_collapses_blank_runs_and_trims() {
        let raw = "  The answer.\n\n\n\nSecond paragraph.\u{a0}done\n\n";
        assert_eq!(
            clean_reply(raw),
            "The answer.\n\nSecond paragraph. done"
        );
    }

    #[test]
    fn clean_reply_keeps_single_paragraph_breaks() {
        let raw = "one\n\ntwo";
        assert_eq!(clean_reply(raw), "one\n\ntwo");
    }
}
