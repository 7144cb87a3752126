//! Loader for Parley configuration with YAML + environment overlays.
//!
//! A `parley.yaml` file picks the provider and carries credentials and
//! driver flags; `PARLEY_`-prefixed environment variables override file
//! values, and `${VAR}` placeholders inside string values are expanded
//! recursively (bounded depth, cycles left unresolved).
use config::{Config, ConfigError, Environment, File};
use parley_common::{Provider, StealthLevel};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAX_ENV_EXPANSION_DEPTH: usize = 8;

/// Top-level configuration for a Parley run.
#[derive(Debug, Deserialize)]
pub struct ParleyConfig {
    /// Which chat front end to drive.
    pub provider: Provider,
    /// Run the browser without a visible window. Defaults to `true`.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Browser automation stealth level.
    #[serde(default)]
    pub stealth: StealthLevel,
    /// Account inputs; both optional, some providers need neither.
    #[serde(default)]
    pub credentials: CredentialSpec,
    /// Extra browser startup flags, forwarded verbatim. `--disable-gpu`
    /// and `--window-size` are injected by the engine and rejected here.
    #[serde(default)]
    pub driver_args: Vec<String>,
    /// Optional wait/poll overrides.
    #[serde(default)]
    pub timing: Option<TimingSpec>,
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct CredentialSpec {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Per-wait overrides; anything unset keeps the provider default.
#[derive(Debug, Default, Deserialize)]
pub struct TimingSpec {
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub locate_timeout_secs: Option<u64>,
    #[serde(default)]
    pub response_grace_secs: Option<u64>,
    #[serde(default)]
    pub response_timeout_secs: Option<u64>,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut current = std::mem::take(s);
                for _ in 0..MAX_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&current) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => current.clone(),
                    };
                    if expanded == current {
                        break;
                    }
                    current = expanded;
                }
                *s = current;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        Value::Object(fields) => fields.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML file + env overrides).
pub struct ParleyConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ParleyConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ParleyConfigLoader {
    /// Start with the defaults: `PARLEY_` env overrides, no file yet.
    ///
    /// ```
    /// use parley_config::ParleyConfigLoader;
    ///
    /// let config = ParleyConfigLoader::new()
    ///     .with_yaml_str("provider: perplexity")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert!(config.headless);
    /// assert!(config.driver_args.is_empty());
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("PARLEY").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers the format
    /// by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet; handy for tests and one-off runs.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use parley_config::ParleyConfigLoader;
    /// use parley_common::Provider;
    ///
    /// std::env::set_var("DOC_EXAMPLE_EMAIL", "me@example.com");
    ///
    /// let config = ParleyConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// provider: mistral
    /// credentials:
    ///   email: "${DOC_EXAMPLE_EMAIL}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.provider, Provider::Mistral);
    /// assert_eq!(config.credentials.email.as_deref(), Some("me@example.com"));
    ///
    /// std::env::remove_var("DOC_EXAMPLE_EMAIL");
    /// ```
    pub fn load(self) -> Result<ParleyConfig, ConfigError> {
        let merged = self.builder.build()?;

        // Round-trip through serde_json so `${VAR}` expansion can walk the
        // whole tree before the typed deserialize.
        let mut value: Value = merged.try_deserialize()?;
        expand_env_in_value(&mut value);

        serde_json::from_value(value).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
