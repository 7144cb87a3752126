use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parley_chat::{adapter, CodeSource, Credentials, Session};
use parley_common::observability::{init_logging, LogConfig};
use parley_config::{ParleyConfig, ParleyConfigLoader};
use parley_drivers::parley_browser::driver;
use parley_drivers::parley_browser::wait::Waiter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1) Load config (env wins)
    let cfg: ParleyConfig = ParleyConfigLoader::new().with_file("parley.yaml").load()?;

    init_logging(LogConfig::default())?;

    let mut provider_adapter = adapter(cfg.provider);
    apply_timing_overrides(&cfg, &mut provider_adapter.timing);

    let credentials = Credentials::new(
        cfg.credentials.email.clone().unwrap_or_default(),
        cfg.credentials.password.clone().unwrap_or_default(),
    )
    .with_code_source(Arc::new(TerminalCode));

    let surface = driver::launch(cfg.headless, cfg.stealth, &cfg.driver_args).await?;
    let waiter = Waiter::new(provider_adapter.timing.poll_interval);
    let mut session = Session::open_with(surface, provider_adapter, credentials, waiter).await?;

    eprintln!("session open; one prompt per line, ctrl-d to quit");
    prompt_marker()?;
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            prompt_marker()?;
            continue;
        }
        match session.send_prompt(text).await {
            Ok(reply) => println!("{reply}\n"),
            Err(err) => eprintln!("error: {err}"),
        }
        prompt_marker()?;
    }

    session.close().await;
    Ok(())
}

fn apply_timing_overrides(cfg: &ParleyConfig, timing: &mut parley_chat::providers::Timing) {
    let Some(spec) = &cfg.timing else {
        return;
    };
    if let Some(ms) = spec.poll_interval_ms {
        timing.poll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = spec.locate_timeout_secs {
        timing.locate_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = spec.response_grace_secs {
        timing.response_grace = Duration::from_secs(secs);
    }
    if let Some(secs) = spec.response_timeout_secs {
        timing.response_timeout = Duration::from_secs(secs);
    }
}

fn prompt_marker() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Reads a one-time login code from the terminal, for providers that email
/// one instead of taking a password.
struct TerminalCode;

#[async_trait]
impl CodeSource for TerminalCode {
    async fn fetch_code(&self) -> Result<String> {
        tokio::task::spawn_blocking(|| -> Result<String> {
            print!("verification code: ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await?
    }
}
