use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fantoccini::{elements::Element, Client, Locator};
use parley_common::StealthLevel;
use std::fmt;
use tracing::debug;
use url::Url;

use super::behavioral::PacingEngine;
use super::fingerprint::UserAgentProfile;
use super::stealth::StealthScripts;

/// WebDriver "enter" key, sent to trigger form submission on an input.
const ENTER_KEY: &str = "\u{e007}";

/// How a DOM node is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    Id(String),
    Name(String),
    XPath(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn id(value: impl Into<String>) -> Self {
        Selector::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Selector::Name(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::XPath(value.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(v) => write!(f, "css={v}"),
            Selector::Id(v) => write!(f, "id={v}"),
            Selector::Name(v) => write!(f, "name={v}"),
            Selector::XPath(v) => write!(f, "xpath={v}"),
        }
    }
}

/// Element condition a caller can probe or wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// The element exists in the DOM.
    Present,
    /// The element exists, is displayed, and is enabled.
    Interactable,
    /// No element matches the selector.
    Gone,
}

/// The DOM surface the chat engine drives.
///
/// The browser behind it is an external collaborator; this trait is the
/// whole contract — locate, inject, click, read. Everything above it is
/// testable against a scripted implementation.
#[async_trait]
pub trait ChatSurface: Send {
    /// Load `url` and apply whatever session preparation the surface needs.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Check whether `selector` currently satisfies `condition`. Absence is
    /// `Ok(false)` for `Present`/`Interactable`, not an error.
    async fn probe(&mut self, selector: &Selector, condition: Condition) -> Result<bool>;

    /// Clear any residual content from an input element.
    async fn clear(&mut self, selector: &Selector) -> Result<()>;

    /// Inject `text` into an input element as a single operation. Emulated
    /// per-keystroke typing is deliberately not part of this contract.
    async fn fill(&mut self, selector: &Selector, text: &str) -> Result<()>;

    /// Click an element.
    async fn click(&mut self, selector: &Selector) -> Result<()>;

    /// Send the enter key to an element, submitting its enclosing form.
    async fn press_enter(&mut self, selector: &Selector) -> Result<()>;

    /// Rendered (visible) text of an element.
    async fn text_of(&mut self, selector: &Selector) -> Result<String>;

    /// Inner markup of an element, used for change detection while a reply
    /// is still streaming.
    async fn html_of(&mut self, selector: &Selector) -> Result<String>;

    /// Release the underlying browser. Must tolerate a browser that has
    /// already gone away.
    async fn close(&mut self) -> Result<()>;
}

/// Fantoccini-backed [`ChatSurface`] with stealth scripts and human-like
/// pacing applied around the raw WebDriver verbs.
pub struct WebDriverSurface {
    client: Client,
    stealth: StealthLevel,
    profile: UserAgentProfile,
    pacing: PacingEngine,
}

impl WebDriverSurface {
    pub(crate) fn new(client: Client, stealth: StealthLevel, profile: UserAgentProfile) -> Self {
        Self {
            client,
            stealth,
            profile,
            pacing: PacingEngine::new(),
        }
    }

    async fn find_one(&self, selector: &Selector) -> Result<Option<Element>> {
        let mut found = match selector {
            Selector::Css(v) => self.client.find_all(Locator::Css(v)).await?,
            Selector::Id(v) => self.client.find_all(Locator::Id(v)).await?,
            Selector::Name(v) => {
                let css = format!("[name={v:?}]");
                self.client.find_all(Locator::Css(&css)).await?
            }
            Selector::XPath(v) => self.client.find_all(Locator::XPath(v)).await?,
        };
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.remove(0)))
        }
    }

    async fn require(&self, selector: &Selector) -> Result<Element> {
        self.find_one(selector)
            .await?
            .ok_or_else(|| anyhow!("no element matches {selector}"))
    }

    /// Stealth scripts re-run after every navigation; page loads reset them.
    async fn apply_evasions(&self) -> Result<()> {
        self.client
            .execute(StealthScripts::core_evasions(), vec![])
            .await?;

        match self.stealth {
            StealthLevel::Lightweight => {}
            StealthLevel::Balanced => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
            }
            StealthLevel::Maximum => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
                self.client
                    .execute(StealthScripts::webgl_evasions(), vec![])
                    .await?;
                self.client
                    .execute(
                        &format!(
                            "Object.defineProperty(navigator, 'platform', {{ get: () => '{}' }});",
                            self.profile.platform
                        ),
                        vec![],
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSurface for WebDriverSurface {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| anyhow!("invalid url `{url}`: {e}"))?;
        self.pacing.pause(300, 1200).await;
        self.client.goto(parsed.as_str()).await?;
        self.apply_evasions().await?;
        debug!(target: "browser.surface", %url, "navigated");
        Ok(())
    }

    async fn probe(&mut self, selector: &Selector, condition: Condition) -> Result<bool> {
        let element = self.find_one(selector).await?;
        Ok(match condition {
            Condition::Present => element.is_some(),
            Condition::Gone => element.is_none(),
            Condition::Interactable => match element {
                Some(el) => el.is_displayed().await? && el.is_enabled().await?,
                None => false,
            },
        })
    }

    async fn clear(&mut self, selector: &Selector) -> Result<()> {
        let element = self.require(selector).await?;
        element.clear().await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> Result<()> {
        self.pacing.settle().await;
        let element = self.require(selector).await?;
        element.click().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> Result<()> {
        self.pacing.settle().await;
        let element = self.require(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn press_enter(&mut self, selector: &Selector) -> Result<()> {
        let element = self.require(selector).await?;
        element.send_keys(ENTER_KEY).await?;
        Ok(())
    }

    async fn text_of(&mut self, selector: &Selector) -> Result<String> {
        let element = self.require(selector).await?;
        Ok(element.text().await?)
    }

    async fn html_of(&mut self, selector: &Selector) -> Result<String> {
        let element = self.require(selector).await?;
        Ok(element.html(true).await?)
    }

    async fn close(&mut self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}
