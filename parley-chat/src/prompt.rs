//! Injects a prompt into the chat input and dispatches it.
//!
//! Submission advances the provider's remote conversation; there is no
//! local rollback once the send control fires.
use parley_common::ParleyError;
use parley_drivers::parley_browser::surface::{ChatSurface, Condition};
use parley_drivers::parley_browser::wait::Waiter;
use std::fmt;
use tracing::debug;

use crate::providers::{ProviderAdapter, SendControl};

pub(crate) async fn submit_prompt<S>(
    surface: &mut S,
    waiter: &Waiter,
    adapter: &ProviderAdapter,
    text: &str,
) -> parley_common::Result<()>
where
    S: ChatSurface + ?Sized,
{
    if text.trim().is_empty() {
        return Err(ParleyError::SubmissionFailed(
            "prompt text is empty".to_string(),
        ));
    }

    let controls = &adapter.chat;
    let timing = &adapter.timing;

    waiter
        .wait_for(
            surface,
            &controls.input,
            Condition::Interactable,
            timing.locate_timeout,
        )
        .await
        .map_err(submission)?;
    surface.clear(&controls.input).await.map_err(submission)?;
    // The whole prompt in one injection; keystroke emulation trips
    // provider-side rate heuristics.
    surface
        .fill(&controls.input, text)
        .await
        .map_err(submission)?;

    match &controls.send {
        SendControl::Enter => {
            surface
                .press_enter(&controls.input)
                .await
                .map_err(submission)?;
        }
        SendControl::Button(button) => {
            waiter
                .wait_for(surface, button, Condition::Interactable, timing.locate_timeout)
                .await
                .map_err(submission)?;
            surface.click(button).await.map_err(submission)?;
        }
    }

    debug!(
        target: "chat.prompt",
        provider = adapter.name,
        chars = text.len(),
        "prompt submitted"
    );
    Ok(())
}

fn submission(err: impl fmt::Display) -> ParleyError {
    ParleyError::SubmissionFailed(err.to_string())
}
