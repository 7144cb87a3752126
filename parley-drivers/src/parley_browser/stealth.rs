use parley_common::StealthLevel;

use super::fingerprint::UserAgentProfile;

/// Chrome command-line arguments for a stealth level and fingerprint
/// profile.
///
/// `--disable-gpu` and `--window-size` are injected here unconditionally;
/// both are reserved and rejected when they appear in caller-supplied
/// driver flags.
pub fn build_stealth_arguments(level: &StealthLevel, profile: &UserAgentProfile) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-plugins-discovery".to_string(),
        "--disable-gpu".to_string(),
        format!("--user-agent={}", profile.user_agent),
        format!(
            "--window-size={},{}",
            profile.viewport.0, profile.viewport.1
        ),
        format!("--lang={}", profile.languages.join(",")),
    ];
    if let StealthLevel::Maximum = level {
        args.push("--disable-site-isolation-trials".to_string());
    }
    args
}

/// JavaScript evasions applied after navigation to reduce automation
/// signals.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }

    pub fn canvas_evasions() -> &'static str {
        r#"
            const getContext = HTMLCanvasElement.prototype.getContext;
            HTMLCanvasElement.prototype.getContext = function(type, ...args) {
                const ctx = getContext.call(this, type, ...args);
                if (type === '2d' && ctx) {
                    const origToDataURL = this.toDataURL;
                    this.toDataURL = function(...a) {
                        const img = ctx.getImageData(0, 0, this.width, this.height);
                        for (let i = 0; i < img.data.length; i += 4) {
                            if (Math.random() < 0.001) img.data[i] += Math.random() < 0.5 ? -1 : 1;
                        }
                        ctx.putImageData(img, 0, 0);
                        return origToDataURL.call(this, ...a);
                    };
                }
                return ctx;
            };
        "#
    }

    pub fn webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parley_browser::fingerprint::UserAgentManager;

    #[test]
    fn reserved_pair_is_always_injected() {
        let mut manager = UserAgentManager::new();
        let profile = manager.session_profile().clone();
        for level in [
            StealthLevel::Lightweight,
            StealthLevel::Balanced,
            StealthLevel::Maximum,
        ] {
            let args = build_stealth_arguments(&level, &profile);
            assert!(args.iter().any(|a| a == "--disable-gpu"));
            assert!(args.iter().any(|a| a.starts_with("--window-size=")));
            assert!(args.iter().any(|a| a.starts_with("--user-agent=")));
        }
    }
}
