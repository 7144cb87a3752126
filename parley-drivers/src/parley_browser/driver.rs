use fantoccini::ClientBuilder;
use parley_common::{ParleyError, StealthLevel};
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;
use webdriver::capabilities::Capabilities;

use super::fingerprint::UserAgentManager;
use super::stealth::build_stealth_arguments;
use super::surface::WebDriverSurface;

/// Flags the engine injects itself; callers must not supply them again.
pub const RESERVED_FLAGS: [&str; 2] = ["--disable-gpu", "--window-size"];

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Returns the reserved flag a caller-supplied argument collides with, if
/// any. Matches both the bare flag and its `--flag=value` form.
pub fn reserved_flag_conflict(args: &[String]) -> Option<&'static str> {
    RESERVED_FLAGS.iter().copied().find(|flag| {
        args.iter()
            .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
    })
}

/// Launch a stealth browser surface against a running WebDriver service.
///
/// Connects to `http://localhost:9515` (Chromedriver) unless
/// `PARLEY_WEBDRIVER_URL` points elsewhere. Caller flags are forwarded
/// verbatim after the stealth set; the reserved pair is rejected up front.
pub async fn launch(
    headless: bool,
    stealth: StealthLevel,
    driver_config: &[String],
) -> parley_common::Result<WebDriverSurface> {
    if let Some(flag) = reserved_flag_conflict(driver_config) {
        return Err(ParleyError::Config(format!(
            "driver flag `{flag}` is managed by the engine and must not be supplied"
        )));
    }

    let mut manager = UserAgentManager::new();
    let profile = manager.session_profile().clone();

    let mut args = build_stealth_arguments(&stealth, &profile);
    args.extend(driver_config.iter().cloned());
    if headless {
        args.push("--headless=new".to_string());
    }

    let mut chrome_opts = HashMap::new();
    chrome_opts.insert("args".to_string(), json!(args));

    let mut caps = Capabilities::new();
    caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

    let endpoint = std::env::var("PARLEY_WEBDRIVER_URL")
        .unwrap_or_else(|_| DEFAULT_WEBDRIVER_URL.to_string());
    debug!(target: "browser.driver", %endpoint, headless, "connecting to webdriver");

    let client = ClientBuilder::native()
        .capabilities(caps)
        .connect(&endpoint)
        .await
        .map_err(|e| ParleyError::Driver(anyhow::Error::new(e)))?;

    Ok(WebDriverSurface::new(client, stealth, profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_flags_are_rejected_in_both_forms() {
        let bare = vec!["--disable-gpu".to_string()];
        assert_eq!(reserved_flag_conflict(&bare), Some("--disable-gpu"));

        let valued = vec!["--window-size=1920,1080".to_string()];
        assert_eq!(reserved_flag_conflict(&valued), Some("--window-size"));
    }

    #[test]
    fn ordinary_flags_pass_validation() {
        let args = vec![
            "--proxy-server=socks5://localhost:1080".to_string(),
            "--disable-notifications".to_string(),
        ];
        assert_eq!(reserved_flag_conflict(&args), None);
    }
}
