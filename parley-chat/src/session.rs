//! The externally visible session unit: scoped open → prompt loop → close,
//! with ordered conversation history.
use parley_common::{ParleyError, Provider, StealthLevel};
use parley_drivers::parley_browser::driver;
use parley_drivers::parley_browser::surface::{ChatSurface, WebDriverSurface};
use parley_drivers::parley_browser::wait::Waiter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::login::{self, Credentials};
use crate::providers::{self, ProviderAdapter};
use crate::{collect, prompt};

/// One completed round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub human: String,
    pub assistant: String,
}

/// An authenticated conversation with one provider, owning one browser
/// surface for its lifetime.
///
/// Operations are strictly sequential; callers must not interleave
/// `send_prompt` calls on the same session. `messages` only ever grows by
/// completed round trips — a prompt that fails anywhere before extraction
/// leaves no trace locally, though the remote conversation may already
/// have advanced.
pub struct Session<S: ChatSurface> {
    id: Uuid,
    surface: Option<S>,
    adapter: ProviderAdapter,
    waiter: Waiter,
    messages: Vec<Exchange>,
}

impl<S: ChatSurface> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl Session<WebDriverSurface> {
    /// Launch a stealth browser and authenticate against `provider`.
    ///
    /// `driver_config` flags are forwarded to the browser verbatim; the
    /// engine injects `--disable-gpu` and `--window-size` itself and
    /// rejects attempts to supply them again.
    pub async fn open(
        provider: Provider,
        credentials: Credentials,
        driver_config: &[String],
        headless: bool,
        stealth: StealthLevel,
    ) -> parley_common::Result<Self> {
        let adapter = providers::adapter(provider);
        let surface = match driver::launch(headless, stealth, driver_config).await {
            Ok(surface) => surface,
            Err(err @ ParleyError::Config(_)) => return Err(err),
            Err(err) => return Err(ParleyError::SessionOpen(Box::new(err))),
        };
        let waiter = Waiter::new(adapter.timing.poll_interval);
        Self::open_with(surface, adapter, credentials, waiter).await
    }
}

impl<S: ChatSurface> Session<S> {
    /// Authenticate over an already-launched surface. This is the whole
    /// session contract minus browser startup, and what tests drive with a
    /// scripted surface.
    pub async fn open_with(
        mut surface: S,
        adapter: ProviderAdapter,
        credentials: Credentials,
        waiter: Waiter,
    ) -> parley_common::Result<Self> {
        let id = Uuid::new_v4();
        info!(
            target: "chat.session",
            session = %id,
            provider = adapter.name,
            "opening session"
        );

        if let Err(err) = login::authenticate(&mut surface, &waiter, &adapter, &credentials).await {
            // The surface must not outlive a failed open.
            if let Err(close_err) = surface.close().await {
                warn!(
                    target: "chat.session",
                    session = %id,
                    error = %close_err,
                    "browser release after failed login also failed"
                );
            }
            return Err(ParleyError::SessionOpen(Box::new(err)));
        }

        Ok(Self {
            id,
            surface: Some(surface),
            adapter,
            waiter,
            messages: Vec::new(),
        })
    }

    /// Submit `text` and block until the reply stabilises; returns the
    /// extracted plain text and records the pair in history.
    pub async fn send_prompt(&mut self, text: &str) -> parley_common::Result<String> {
        let surface = self.surface.as_mut().ok_or_else(|| {
            ParleyError::SubmissionFailed("session is already closed".to_string())
        })?;

        let turn = self.messages.len();
        prompt::submit_prompt(surface, &self.waiter, &self.adapter, text).await?;
        let reply = collect::await_reply(surface, &self.waiter, &self.adapter, turn).await?;

        info!(
            target: "chat.session",
            session = %self.id,
            turn,
            reply_chars = reply.len(),
            "round trip complete"
        );
        self.messages.push(Exchange {
            human: text.to_string(),
            assistant: reply.clone(),
        });
        Ok(reply)
    }

    /// Ordered history of completed round trips.
    pub fn messages(&self) -> &[Exchange] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        self.surface.is_some()
    }

    /// Release the browser. Idempotent; never raises. A browser that was
    /// already killed externally is tolerated silently.
    pub async fn close(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            if let Err(err) = surface.close().await {
                warn!(
                    target: "chat.session",
                    session = %self.id,
                    error = %err,
                    "browser release failed; discarding"
                );
            }
        }
    }
}
