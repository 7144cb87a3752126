use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};

/// Snapshot of user agent, viewport, and locale characteristics presented
/// by a browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
    pub timezone: String,
}

/// Maintains a small pool of plausible desktop profiles. The selected
/// profile is sticky for the lifetime of the manager so a session never
/// changes identity mid-flight.
#[derive(Debug, Clone)]
pub struct UserAgentManager {
    desktop_profiles: Vec<UserAgentProfile>,
    session_profile: Option<UserAgentProfile>,
}

impl UserAgentManager {
    pub fn new() -> Self {
        Self {
            desktop_profiles: vec![
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1920, 1080),
                    platform: "Win32".to_string(),
                    languages: vec!["en-US".to_string(), "en".to_string()],
                    timezone: "America/New_York".to_string(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1440, 900),
                    platform: "MacIntel".to_string(),
                    languages: vec!["en-US".to_string(), "en".to_string()],
                    timezone: "America/Los_Angeles".to_string(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1920, 1080),
                    platform: "Linux x86_64".to_string(),
                    languages: vec!["en-US".to_string(), "en".to_string()],
                    timezone: "Europe/Berlin".to_string(),
                },
            ],
            session_profile: None,
        }
    }

    /// Get (or lazily select) the profile for this session.
    pub fn session_profile(&mut self) -> &UserAgentProfile {
        if self.session_profile.is_none() {
            let mut rng = rand::thread_rng();
            let picked = self
                .desktop_profiles
                .choose(&mut rng)
                .expect("profile pool is non-empty")
                .clone();
            self.session_profile = Some(picked);
        }
        self.session_profile.as_ref().expect("just selected")
    }
}

impl Default for UserAgentManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_sticky_within_a_session() {
        let mut manager = UserAgentManager::new();
        let first = manager.session_profile().user_agent.clone();
        for _ in 0..8 {
            assert_eq!(manager.session_profile().user_agent, first);
        }
    }
}
