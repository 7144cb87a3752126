//! End-to-end session scenarios over a scripted DOM.
//!
//! The fake surface stands in for a provider page: a login form gated on
//! the expected password (or one-time code), a chat input with a send
//! button, and a reply node whose markup replays a scripted frame
//! sequence. The virtual clock advances instantly on sleep so timeout
//! paths run without wall-clock delay.
use async_trait::async_trait;
use parley_chat::providers::{
    ChatControls, CompletionRule, Confirm, LoginStep, ProviderAdapter, ReplyLocator, SendControl,
    Timing,
};
use parley_chat::{CodeSource, Credentials, ParleyError, Session};
use parley_common::LoginStage;
use parley_drivers::parley_browser::surface::{ChatSurface, Condition, Selector};
use parley_drivers::parley_browser::wait::{Clock, Waiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct TestClock {
    origin: Instant,
    advanced: Mutex<Duration>,
}

impl TestClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            advanced: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.origin + *self.advanced.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.advanced.lock().unwrap() += duration;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Page {
    #[default]
    Blank,
    Login,
    Code,
    Chat,
}

#[derive(Default)]
struct State {
    login_required: bool,
    expected_password: Option<String>,
    expected_code: Option<String>,
    has_send_button: bool,
    overlay: bool,
    endless_reply: bool,
    scripted_frames: Vec<String>,

    page: Page,
    values: HashMap<String, String>,
    clicked: Vec<String>,
    reply_frames: Vec<String>,
    reply_started: bool,
    frame_cursor: usize,
    html_reads: usize,
    closes: usize,
}

/// Cloneable handle onto a scripted provider page.
#[derive(Clone)]
struct FakeSurface {
    state: Arc<Mutex<State>>,
}

impl FakeSurface {
    fn new(state: State) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn value_of(&self, key: &str) -> String {
        self.lock().values.get(key).cloned().unwrap_or_default()
    }
}

fn present(state: &State, key: &str) -> bool {
    match key {
        "css=#email" => state.page == Page::Login,
        "css=#password" => state.page == Page::Login && state.expected_password.is_some(),
        "css=#code" => state.page == Page::Code,
        "css=#overlay" => state.page == Page::Chat && state.overlay,
        "css=#prompt" => state.page == Page::Chat,
        "css=#send" => state.page == Page::Chat && state.has_send_button,
        "css=#reply" => {
            state.reply_started && (state.endless_reply || !state.reply_frames.is_empty())
        }
        _ => false,
    }
}

fn start_reply(state: &mut State) {
    let prompt = state
        .values
        .get("css=#prompt")
        .cloned()
        .unwrap_or_default();
    if prompt.is_empty() {
        return;
    }
    state.reply_frames = if state.scripted_frames.is_empty() {
        vec![format!("echo: {prompt}")]
    } else {
        std::mem::take(&mut state.scripted_frames)
    };
    state.frame_cursor = 0;
    state.reply_started = true;
}

fn confirm_input(state: &mut State, key: &str) {
    match key {
        "css=#password" => {
            let typed = state.values.get(key).cloned().unwrap_or_default();
            if state.expected_password.as_deref() == Some(typed.as_str()) {
                state.page = Page::Chat;
            }
        }
        "css=#code" => {
            let typed = state.values.get(key).cloned().unwrap_or_default();
            if state.expected_code.as_deref() == Some(typed.as_str()) {
                state.page = Page::Chat;
            }
        }
        "css=#prompt" => start_reply(state),
        _ => {}
    }
}

#[async_trait]
impl ChatSurface for FakeSurface {
    async fn navigate(&mut self, _url: &str) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.page = if state.login_required {
            Page::Login
        } else {
            Page::Chat
        };
        Ok(())
    }

    async fn probe(&mut self, selector: &Selector, condition: Condition) -> anyhow::Result<bool> {
        let state = self.lock();
        let key = selector.to_string();
        let found = present(&state, &key);
        Ok(match condition {
            Condition::Present | Condition::Interactable => found,
            Condition::Gone => !found,
        })
    }

    async fn clear(&mut self, selector: &Selector) -> anyhow::Result<()> {
        let mut state = self.lock();
        let key = selector.to_string();
        if !present(&state, &key) {
            anyhow::bail!("no element matches {key}");
        }
        state.values.insert(key, String::new());
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> anyhow::Result<()> {
        let mut state = self.lock();
        let key = selector.to_string();
        if !present(&state, &key) {
            anyhow::bail!("no element matches {key}");
        }
        state.values.insert(key, text.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &Selector) -> anyhow::Result<()> {
        let mut state = self.lock();
        let key = selector.to_string();
        if !present(&state, &key) {
            anyhow::bail!("no element matches {key}");
        }
        state.clicked.push(key.clone());
        match key.as_str() {
            "css=#overlay" => state.overlay = false,
            "css=#continue" => {
                let email = state.values.get("css=#email").cloned().unwrap_or_default();
                if !email.is_empty() && state.expected_code.is_some() {
                    state.page = Page::Code;
                }
            }
            "css=#send" => start_reply(&mut state),
            _ => {}
        }
        Ok(())
    }

    async fn press_enter(&mut self, selector: &Selector) -> anyhow::Result<()> {
        let mut state = self.lock();
        let key = selector.to_string();
        if !present(&state, &key) {
            anyhow::bail!("no element matches {key}");
        }
        confirm_input(&mut state, &key);
        Ok(())
    }

    async fn text_of(&mut self, selector: &Selector) -> anyhow::Result<String> {
        let state = self.lock();
        let key = selector.to_string();
        if key == "css=#reply" {
            return Ok(state.reply_frames.last().cloned().unwrap_or_default());
        }
        Ok(state.values.get(&key).cloned().unwrap_or_default())
    }

    async fn html_of(&mut self, selector: &Selector) -> anyhow::Result<String> {
        let mut state = self.lock();
        let key = selector.to_string();
        if key != "css=#reply" {
            anyhow::bail!("unexpected markup read from {key}");
        }
        state.html_reads += 1;
        if state.endless_reply {
            return Ok(format!("frame-{}", state.html_reads));
        }
        let index = state.frame_cursor.min(state.reply_frames.len() - 1);
        state.frame_cursor += 1;
        Ok(state.reply_frames[index].clone())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.lock().closes += 1;
        Ok(())
    }
}

fn css(value: &str) -> Selector {
    Selector::css(value)
}

fn test_timing() -> Timing {
    Timing {
        poll_interval: Duration::from_millis(100),
        locate_timeout: Duration::from_secs(1),
        response_grace: Duration::from_millis(200),
        response_timeout: Duration::from_secs(5),
    }
}

fn email_password_adapter() -> ProviderAdapter {
    ProviderAdapter {
        name: "fake",
        entry_url: "https://fake.example/login",
        login_steps: vec![
            LoginStep::Email {
                input: css("#email"),
                confirm: Confirm::None,
            },
            LoginStep::Password {
                input: css("#password"),
                confirm: Confirm::Enter,
            },
        ],
        chat: ChatControls {
            input: css("#prompt"),
            send: SendControl::Button(css("#send")),
            reply: ReplyLocator::Fixed(css("#reply")),
        },
        completion: CompletionRule::QuietPeriod { quiet_polls: 2 },
        timing: test_timing(),
    }
}

fn open_chat_adapter() -> ProviderAdapter {
    ProviderAdapter {
        login_steps: vec![],
        ..email_password_adapter()
    }
}

fn verification_adapter() -> ProviderAdapter {
    ProviderAdapter {
        login_steps: vec![
            LoginStep::Email {
                input: css("#email"),
                confirm: Confirm::Click(css("#continue")),
            },
            LoginStep::Verification {
                input: css("#code"),
                confirm: Confirm::Enter,
            },
        ],
        ..email_password_adapter()
    }
}

fn test_waiter() -> Waiter {
    Waiter::with_clock(Duration::from_millis(100), Arc::new(TestClock::new()))
}

struct FixedCode(&'static str);

#[async_trait]
impl CodeSource for FixedCode {
    async fn fetch_code(&self) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

fn login_surface() -> FakeSurface {
    FakeSurface::new(State {
        login_required: true,
        expected_password: Some("hunter2".to_string()),
        has_send_button: true,
        ..State::default()
    })
}

#[tokio::test]
async fn open_and_round_trip_records_history() {
    let surface = login_surface();
    let mut session = Session::open_with(
        surface.clone(),
        email_password_adapter(),
        Credentials::new("user@example.com", "hunter2"),
        test_waiter(),
    )
    .await
    .expect("login should succeed");

    let reply = session.send_prompt("ping").await.expect("round trip");
    assert_eq!(reply, "echo: ping");
    assert!(!reply.is_empty());

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].human, "ping");
    assert_eq!(messages[0].assistant, "echo: ping");

    session.close().await;
    assert_eq!(surface.lock().closes, 1);
}

#[tokio::test]
async fn multi_turn_history_stays_ordered() {
    let surface = login_surface();
    let mut session = Session::open_with(
        surface,
        email_password_adapter(),
        Credentials::new("user@example.com", "hunter2"),
        test_waiter(),
    )
    .await
    .unwrap();

    session.send_prompt("first question").await.unwrap();
    session.send_prompt("second question").await.unwrap();

    let humans: Vec<&str> = session.messages().iter().map(|m| m.human.as_str()).collect();
    assert_eq!(humans, ["first question", "second question"]);
    assert_eq!(session.messages()[1].assistant, "echo: second question");
}

#[tokio::test]
async fn wrong_password_fails_at_the_password_step_and_releases_the_browser() {
    let surface = login_surface();
    let err = Session::open_with(
        surface.clone(),
        email_password_adapter(),
        Credentials::new("user@example.com", "wrong"),
        test_waiter(),
    )
    .await
    .expect_err("login must fail");

    match err {
        ParleyError::SessionOpen(inner) => match *inner {
            ParleyError::LoginFailed { stage, .. } => assert_eq!(stage, LoginStage::Password),
            other => panic!("expected LoginFailed, got {other}"),
        },
        other => panic!("expected SessionOpen, got {other}"),
    }
    assert_eq!(surface.lock().closes, 1, "browser must be released");
}

#[tokio::test]
async fn missing_send_control_fails_submission_and_leaves_history_empty() {
    let surface = FakeSurface::new(State {
        has_send_button: false,
        ..State::default()
    });
    let mut session = Session::open_with(
        surface,
        open_chat_adapter(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();

    let err = session.send_prompt("anyone there?").await.unwrap_err();
    assert!(matches!(err, ParleyError::SubmissionFailed(_)));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_touching_the_page() {
    let surface = FakeSurface::new(State {
        has_send_button: true,
        ..State::default()
    });
    let mut session = Session::open_with(
        surface.clone(),
        open_chat_adapter(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();

    let err = session.send_prompt("   ").await.unwrap_err();
    assert!(matches!(err, ParleyError::SubmissionFailed(_)));
    assert!(session.messages().is_empty());
    assert_eq!(surface.value_of("css=#prompt"), "");
}

#[tokio::test]
async fn reply_capture_waits_for_the_quiet_period() {
    let surface = FakeSurface::new(State {
        has_send_button: true,
        scripted_frames: vec![
            "T".to_string(),
            "Th".to_string(),
            "The".to_string(),
            "The answer".to_string(),
        ],
        ..State::default()
    });
    let mut session = Session::open_with(
        surface.clone(),
        open_chat_adapter(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();

    let reply = session.send_prompt("stream one").await.unwrap();
    assert_eq!(reply, "The answer");
    // Four changing frames, then the frozen frame observed a second time:
    // the capture must not have fired while the markup was still moving.
    assert_eq!(surface.lock().html_reads, 5);
}

#[tokio::test]
async fn endless_stream_times_out_without_partial_text() {
    let surface = FakeSurface::new(State {
        has_send_button: true,
        endless_reply: true,
        ..State::default()
    });
    let mut session = Session::open_with(
        surface,
        open_chat_adapter(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();

    let err = session.send_prompt("never ends").await.unwrap_err();
    assert!(matches!(err, ParleyError::ResponseTimeout(_)));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn close_is_idempotent_and_send_after_close_fails_cleanly() {
    let surface = FakeSurface::new(State {
        has_send_button: true,
        ..State::default()
    });
    let mut session = Session::open_with(
        surface.clone(),
        open_chat_adapter(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();

    assert!(session.is_open());
    session.close().await;
    session.close().await;
    assert!(!session.is_open());
    assert_eq!(surface.lock().closes, 1);

    let err = session.send_prompt("hello?").await.unwrap_err();
    assert!(matches!(err, ParleyError::SubmissionFailed(_)));
}

#[tokio::test]
async fn verification_flow_fills_the_fetched_code() {
    let surface = FakeSurface::new(State {
        login_required: true,
        expected_code: Some("424242".to_string()),
        has_send_button: true,
        ..State::default()
    });
    let credentials =
        Credentials::new("user@example.com", "").with_code_source(Arc::new(FixedCode("424242")));

    let session = Session::open_with(
        surface.clone(),
        verification_adapter(),
        credentials,
        test_waiter(),
    )
    .await
    .expect("code login should succeed");

    assert!(session.is_open());
    assert_eq!(surface.value_of("css=#code"), "424242");
}

#[tokio::test]
async fn missing_code_source_fails_the_verification_step() {
    let surface = FakeSurface::new(State {
        login_required: true,
        expected_code: Some("424242".to_string()),
        has_send_button: true,
        ..State::default()
    });

    let err = Session::open_with(
        surface.clone(),
        verification_adapter(),
        Credentials::new("user@example.com", ""),
        test_waiter(),
    )
    .await
    .expect_err("no code source available");

    match err {
        ParleyError::SessionOpen(inner) => match *inner {
            ParleyError::LoginFailed { stage, .. } => {
                assert_eq!(stage, LoginStage::Verification)
            }
            other => panic!("expected LoginFailed, got {other}"),
        },
        other => panic!("expected SessionOpen, got {other}"),
    }
    assert_eq!(surface.lock().closes, 1);
}

#[tokio::test]
async fn overlay_dismissal_is_best_effort() {
    let with_overlay = FakeSurface::new(State {
        overlay: true,
        has_send_button: true,
        ..State::default()
    });
    let adapter = ProviderAdapter {
        login_steps: vec![LoginStep::Dismiss(css("#overlay"))],
        ..email_password_adapter()
    };

    let session = Session::open_with(
        with_overlay.clone(),
        adapter.clone(),
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();
    assert!(session.is_open());
    assert!(with_overlay
        .lock()
        .clicked
        .contains(&"css=#overlay".to_string()));

    // And when the overlay never shows up, the open still succeeds.
    let without_overlay = FakeSurface::new(State {
        has_send_button: true,
        ..State::default()
    });
    let session = Session::open_with(
        without_overlay,
        adapter,
        Credentials::anonymous(),
        test_waiter(),
    )
    .await
    .unwrap();
    assert!(session.is_open());
}
