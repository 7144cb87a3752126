//! Per-provider configuration bundles.
//!
//! Each adapter is plain data: the entry URL, the ordered login steps, the
//! chat controls, and the rule for deciding a reply is finished. Remote DOM
//! changes are absorbed here and only here.
use parley_common::Provider;
use parley_drivers::parley_browser::surface::Selector;
use std::time::Duration;

/// Immutable per-provider configuration consumed by the login, prompt, and
/// collection flows. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    pub name: &'static str,
    pub entry_url: &'static str,
    pub login_steps: Vec<LoginStep>,
    pub chat: ChatControls,
    pub completion: CompletionRule,
    pub timing: Timing,
}

/// One step of a provider's login protocol. Steps a provider does not
/// declare are simply absent from its list.
#[derive(Debug, Clone)]
pub enum LoginStep {
    /// Click a login/continue button before any field appears.
    Open(Selector),
    /// Fill the account email.
    Email { input: Selector, confirm: Confirm },
    /// Fill the account password.
    Password { input: Selector, confirm: Confirm },
    /// Fill an out-of-band one-time code obtained through the caller's
    /// retrieval hook.
    Verification { input: Selector, confirm: Confirm },
    /// Best-effort dismissal of an overlay; skipped silently when absent.
    Dismiss(Selector),
}

/// How a filled field is confirmed.
#[derive(Debug, Clone)]
pub enum Confirm {
    /// Leave the field as-is; a later step confirms the whole form.
    None,
    /// Send the enter key to the field.
    Enter,
    /// Click a dedicated button.
    Click(Selector),
}

/// The chat page controls.
#[derive(Debug, Clone)]
pub struct ChatControls {
    pub input: Selector,
    pub send: SendControl,
    pub reply: ReplyLocator,
}

/// How a typed prompt is dispatched.
#[derive(Debug, Clone)]
pub enum SendControl {
    /// Enter key on the input itself.
    Enter,
    /// A dedicated send button.
    Button(Selector),
}

/// Where the assistant reply for a given turn renders.
#[derive(Debug, Clone)]
pub enum ReplyLocator {
    /// A single container that always holds the latest reply.
    Fixed(Selector),
    /// An XPath template addressing the `start + step * turn`-th
    /// conversation node; `{n}` is the index placeholder.
    IndexedXPath {
        template: &'static str,
        start: usize,
        step: usize,
    },
}

impl ReplyLocator {
    /// Resolve the reply selector for a zero-based turn index.
    pub fn for_turn(&self, turn: usize) -> Selector {
        match self {
            ReplyLocator::Fixed(selector) => selector.clone(),
            ReplyLocator::IndexedXPath {
                template,
                start,
                step,
            } => {
                let index = start + step * turn;
                Selector::XPath(template.replace("{n}", &index.to_string()))
            }
        }
    }
}

/// When a streamed reply counts as finished. All variants additionally
/// require the reply markup to sit unchanged for `quiet_polls` consecutive
/// polls, which keeps a half-streamed reply from being captured.
#[derive(Debug, Clone)]
pub enum CompletionRule {
    /// Stability alone is authoritative.
    QuietPeriod { quiet_polls: u32 },
    /// A provider element must have appeared (e.g. the follow-up block
    /// rendered under a finished answer).
    MarkerAppears {
        marker: Selector,
        quiet_polls: u32,
    },
    /// A "generating" indicator must have disappeared.
    IndicatorGone {
        indicator: Selector,
        quiet_polls: u32,
    },
}

impl CompletionRule {
    pub fn quiet_polls(&self) -> u32 {
        match self {
            CompletionRule::QuietPeriod { quiet_polls }
            | CompletionRule::MarkerAppears { quiet_polls, .. }
            | CompletionRule::IndicatorGone { quiet_polls, .. } => *quiet_polls,
        }
    }
}

/// Poll and timeout parameters. Per-wait, not per-session.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Fixed poll interval for every wait loop.
    pub poll_interval: Duration,
    /// How long a single element wait may take.
    pub locate_timeout: Duration,
    /// Pause between submission and the first reply poll.
    pub response_grace: Duration,
    /// Ceiling for the whole reply wait.
    pub response_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            locate_timeout: Duration::from_secs(10),
            response_grace: Duration::from_secs(8),
            response_timeout: Duration::from_secs(180),
        }
    }
}

/// Build the adapter for a provider.
pub fn adapter(provider: Provider) -> ProviderAdapter {
    match provider {
        Provider::ChatGpt => chatgpt(),
        Provider::Perplexity => perplexity(),
        Provider::Mistral => mistral(),
        Provider::Claude => claude(),
    }
}

fn chatgpt() -> ProviderAdapter {
    ProviderAdapter {
        name: "chatgpt",
        entry_url: "https://chatgpt.com/auth/login?sso=",
        login_steps: vec![
            LoginStep::Open(Selector::xpath(
                r#"//*[@id="__next"]/div[1]/div[2]/div[1]/div/div/button[1]"#,
            )),
            LoginStep::Email {
                input: Selector::id("username"),
                confirm: Confirm::Click(Selector::name("action")),
            },
            LoginStep::Password {
                input: Selector::xpath(r#"//*[@id="password"]"#),
                confirm: Confirm::Enter,
            },
        ],
        chat: ChatControls {
            input: Selector::id("prompt-textarea"),
            send: SendControl::Enter,
            reply: ReplyLocator::IndexedXPath {
                template: r#"//*[@id="__next"]/div[1]/div[2]/main/div[2]/div[1]/div/div/div/div/div[{n}]/div/div/div[2]/div[2]/div[1]/div/div"#,
                start: 3,
                step: 2,
            },
        },
        completion: CompletionRule::QuietPeriod { quiet_polls: 2 },
        timing: Timing::default(),
    }
}

fn perplexity() -> ProviderAdapter {
    ProviderAdapter {
        name: "perplexity",
        entry_url: "https://www.perplexity.ai/",
        // No account needed; only an app-download overlay stands in the way.
        login_steps: vec![LoginStep::Dismiss(Selector::xpath(
            "/html/body/div[1]/main/div[3]/div/div/div/div[2]/div[1]/div/div/button",
        ))],
        chat: ChatControls {
            input: Selector::xpath(
                "/html/body/div/main/div/div/div/div/div/div/div[1]/div[2]/div/div/span/div/div/textarea",
            ),
            send: SendControl::Button(Selector::css(
                r#"#__next > main button[aria-label="Submit"]"#,
            )),
            reply: ReplyLocator::Fixed(Selector::xpath(
                "/html/body/div/main/div/div/div/div/div/div[2]/div[1]/div/div/div[1]/div/div/div[3]/div/div[1]/div[2]/div/div[2]",
            )),
        },
        // The related-questions block only renders once the answer is done.
        completion: CompletionRule::MarkerAppears {
            marker: Selector::xpath(
                "/html/body/div/main/div/div/div/div/div/div[2]/div[1]/div/div/div[1]/div/div/div[3]/div/div[1]/div[3]/div/div",
            ),
            quiet_polls: 2,
        },
        timing: Timing::default(),
    }
}

fn mistral() -> ProviderAdapter {
    ProviderAdapter {
        name: "mistral",
        entry_url: "https://chat.mistral.ai/chat",
        login_steps: vec![
            LoginStep::Email {
                input: Selector::id(":Rclkn:"),
                confirm: Confirm::None,
            },
            LoginStep::Password {
                input: Selector::id(":Rklkn:"),
                confirm: Confirm::Click(Selector::xpath(
                    "/html/body/main/div/div[1]/div/div/div[2]/div/form[2]/div[3]/div[2]/div/button",
                )),
            },
        ],
        chat: ChatControls {
            input: Selector::xpath(
                "/html/body/div[1]/div[2]/div[2]/div/div[2]/div/div[1]/div/textarea",
            ),
            send: SendControl::Button(Selector::xpath(
                "/html/body/div[1]/div[2]/div[2]/div/div[2]/div/div[1]/div/button",
            )),
            reply: ReplyLocator::IndexedXPath {
                template: "/html/body/div[1]/div[2]/div[2]/div/div[1]/div[1]/div[{n}]/div[2]/div[1]",
                start: 2,
                step: 2,
            },
        },
        completion: CompletionRule::QuietPeriod { quiet_polls: 2 },
        timing: Timing::default(),
    }
}

fn claude() -> ProviderAdapter {
    ProviderAdapter {
        name: "claude",
        entry_url: "https://claude.ai/login",
        // No password; the account email receives a one-time code instead.
        login_steps: vec![
            LoginStep::Email {
                input: Selector::css(r#"input[autocomplete="email"]"#),
                confirm: Confirm::Click(Selector::css(r#"button[type="submit"]"#)),
            },
            LoginStep::Verification {
                input: Selector::css(r#"input[autocomplete="one-time-code"]"#),
                confirm: Confirm::Enter,
            },
        ],
        chat: ChatControls {
            input: Selector::css(r#"div.ProseMirror[contenteditable="true"]"#),
            send: SendControl::Button(Selector::css(r#"button[aria-label="Send Message"]"#)),
            reply: ReplyLocator::Fixed(Selector::css(
                "div[data-is-streaming] div.font-claude-message",
            )),
        },
        completion: CompletionRule::IndicatorGone {
            indicator: Selector::css(r#"div[data-is-streaming="true"]"#),
            quiet_polls: 2,
        },
        timing: Timing::default(),
    }
}
