//! Drives a provider's login UI to a chat-ready state.
//!
//! One attempt per session open; a failed step reports which stage died
//! and the caller decides whether to re-open. Credentials never reach the
//! log stream.
use async_trait::async_trait;
use parley_common::{LoginStage, ParleyError};
use parley_drivers::parley_browser::surface::{ChatSurface, Condition, Selector};
use parley_drivers::parley_browser::wait::Waiter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::providers::{Confirm, LoginStep, ProviderAdapter, Timing};

/// Window in which an optional overlay gets a chance to show up before the
/// flow moves on without it.
const DISMISS_WINDOW: Duration = Duration::from_secs(3);

/// Retrieval hook for providers that email a one-time login code. The
/// caller decides where the code comes from — an inbox poller, a terminal
/// prompt, a test fixture.
#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn fetch_code(&self) -> anyhow::Result<String>;
}

/// Account credentials for a session. Both fields may be empty for
/// providers that need neither.
#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    code_source: Option<Arc<dyn CodeSource>>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            code_source: None,
        }
    }

    /// Credentials for providers that require no account at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach the one-time-code retrieval hook.
    pub fn with_code_source(mut self, source: Arc<dyn CodeSource>) -> Self {
        self.code_source = Some(source);
        self
    }

    pub(crate) fn code_source(&self) -> Option<&Arc<dyn CodeSource>> {
        self.code_source.as_ref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("code_source", &self.code_source.is_some())
            .finish()
    }
}

/// Walk the adapter's login steps, then wait for the chat input to confirm
/// the session is usable.
pub(crate) async fn authenticate<S>(
    surface: &mut S,
    waiter: &Waiter,
    adapter: &ProviderAdapter,
    credentials: &Credentials,
) -> parley_common::Result<()>
where
    S: ChatSurface + ?Sized,
{
    let timing = &adapter.timing;

    surface
        .navigate(adapter.entry_url)
        .await
        .map_err(|e| step_failure(LoginStage::Entry, e))?;

    for step in &adapter.login_steps {
        match step {
            LoginStep::Open(button) => {
                waiter
                    .wait_for(surface, button, Condition::Interactable, timing.locate_timeout)
                    .await
                    .map_err(|e| step_failure(LoginStage::Entry, e))?;
                surface
                    .click(button)
                    .await
                    .map_err(|e| step_failure(LoginStage::Entry, e))?;
            }
            LoginStep::Email { input, confirm } => {
                enter_field(
                    surface,
                    waiter,
                    timing,
                    input,
                    &credentials.email,
                    confirm,
                    LoginStage::Email,
                )
                .await?;
            }
            LoginStep::Password { input, confirm } => {
                enter_field(
                    surface,
                    waiter,
                    timing,
                    input,
                    &credentials.password,
                    confirm,
                    LoginStage::Password,
                )
                .await?;
            }
            LoginStep::Verification { input, confirm } => {
                let source = credentials.code_source().ok_or_else(|| ParleyError::LoginFailed {
                    stage: LoginStage::Verification,
                    reason: "provider requires a one-time code but no code source was supplied"
                        .to_string(),
                })?;
                waiter
                    .wait_for(surface, input, Condition::Interactable, timing.locate_timeout)
                    .await
                    .map_err(|e| step_failure(LoginStage::Verification, e))?;
                let code = source
                    .fetch_code()
                    .await
                    .map_err(|e| step_failure(LoginStage::Verification, e))?;
                surface
                    .fill(input, &code)
                    .await
                    .map_err(|e| step_failure(LoginStage::Verification, e))?;
                confirm_field(surface, waiter, timing, confirm, input, LoginStage::Verification)
                    .await?;
            }
            LoginStep::Dismiss(overlay) => {
                if waiter
                    .wait_for(surface, overlay, Condition::Present, DISMISS_WINDOW)
                    .await
                    .is_ok()
                {
                    if let Err(err) = surface.click(overlay).await {
                        debug!(
                            target: "chat.login",
                            provider = adapter.name,
                            error = %err,
                            "overlay would not dismiss; continuing"
                        );
                    }
                }
            }
        }
    }

    waiter
        .wait_for(
            surface,
            &adapter.chat.input,
            Condition::Present,
            timing.locate_timeout,
        )
        .await
        .map_err(|e| step_failure(LoginStage::ChatReady, e))?;

    info!(target: "chat.login", provider = adapter.name, "chat input ready");
    Ok(())
}

/// Fill one credential field and confirm it. A confirmed field must leave
/// the page within the locate timeout; a field that sticks around means
/// the provider rejected the value.
async fn enter_field<S>(
    surface: &mut S,
    waiter: &Waiter,
    timing: &Timing,
    input: &Selector,
    value: &str,
    confirm: &Confirm,
    stage: LoginStage,
) -> parley_common::Result<()>
where
    S: ChatSurface + ?Sized,
{
    waiter
        .wait_for(surface, input, Condition::Interactable, timing.locate_timeout)
        .await
        .map_err(|e| step_failure(stage, e))?;
    surface
        .clear(input)
        .await
        .map_err(|e| step_failure(stage, e))?;
    surface
        .fill(input, value)
        .await
        .map_err(|e| step_failure(stage, e))?;
    confirm_field(surface, waiter, timing, confirm, input, stage).await
}

async fn confirm_field<S>(
    surface: &mut S,
    waiter: &Waiter,
    timing: &Timing,
    confirm: &Confirm,
    input: &Selector,
    stage: LoginStage,
) -> parley_common::Result<()>
where
    S: ChatSurface + ?Sized,
{
    match confirm {
        Confirm::None => return Ok(()),
        Confirm::Enter => {
            surface
                .press_enter(input)
                .await
                .map_err(|e| step_failure(stage, e))?;
        }
        Confirm::Click(button) => {
            waiter
                .wait_for(surface, button, Condition::Interactable, timing.locate_timeout)
                .await
                .map_err(|e| step_failure(stage, e))?;
            surface
                .click(button)
                .await
                .map_err(|e| step_failure(stage, e))?;
        }
    }
    // The confirmed field unmounting is the acceptance signal.
    waiter
        .wait_for(surface, input, Condition::Gone, timing.locate_timeout)
        .await
        .map_err(|_| ParleyError::LoginFailed {
            stage,
            reason: format!("{input} still present after confirmation; value was rejected"),
        })
}

fn step_failure(stage: LoginStage, err: impl fmt::Display) -> ParleyError {
    ParleyError::LoginFailed {
        stage,
        reason: err.to_string(),
    }
}
