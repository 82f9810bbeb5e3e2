//! Configuration types and loading.
//!
//! Settings come from an optional JSON file (e.g. `~/.tg-relay/config.json`), a `.env` file in
//! the working directory, and the process environment. Environment values override the file.
//! Everything is resolved once at startup into [`RelaySettings`] / [`TelegramSettings`] and passed
//! by reference from there on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::allowlist::{AllowList, AllowListError};
use crate::webhook::DEFAULT_TIMEOUT;

pub const ENV_API_ID: &str = "TELEGRAM_API_ID";
pub const ENV_API_HASH: &str = "TELEGRAM_API_HASH";
pub const ENV_PHONE: &str = "TELEGRAM_PHONE";
pub const ENV_WEBHOOK_URL: &str = "N8N_WEBHOOK_URL";
pub const ENV_ALLOW_LIST: &str = "TELEGRAM_WHITELIST_CHATS";
pub const ENV_SESSION_PATH: &str = "TELEGRAM_SESSION_PATH";
pub const ENV_WEBHOOK_TIMEOUT: &str = "WEBHOOK_TIMEOUT_SECS";
pub const ENV_CONFIG_PATH: &str = "TG_RELAY_CONFIG_PATH";

/// Optional on-disk config. Every field may also be given through the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Comma-separated chat ids. Overridden by TELEGRAM_WHITELIST_CHATS.
    #[serde(default)]
    pub allow_list: Option<String>,
}

/// Telegram account credentials and session storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,
    /// Session file path (default ~/.tg-relay/telegram.session).
    pub session_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: Option<String>,
    /// Request timeout in seconds (default 30).
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{name} must be an integer, got {value:?}")]
    InvalidInteger { name: &'static str, value: String },
    #[error("WEBHOOK_TIMEOUT_SECS must be greater than zero")]
    ZeroTimeout,
    #[error(transparent)]
    AllowList(#[from] AllowListError),
}

/// Resolved credentials for the Telegram session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_path: PathBuf,
}

/// Everything `tg-relay run` needs, validated.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub telegram: TelegramSettings,
    pub webhook_url: String,
    pub webhook_timeout: Duration,
    pub allow_list: AllowList,
}

/// Lookup function for environment values; lets tests resolve settings without touching the process env.
pub trait EnvSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<F: Fn(&str) -> Option<String>> EnvSource for F {
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Trimmed, non-empty env value, falling back to the trimmed, non-empty config value.
fn env_or(env: &dyn EnvSource, name: &str, fallback: Option<&str>) -> Option<String> {
    env.get(name)
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            fallback
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn parse_int<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidInteger {
        name,
        value: value.to_string(),
    })
}

impl TelegramSettings {
    pub fn resolve(config: &Config, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let settings = Self::resolve_collecting(config, env, &mut missing)?;
        match settings {
            Some(s) if missing.is_empty() => Ok(s),
            _ => Err(ConfigError::Missing(missing)),
        }
    }

    /// Pushes the names of absent settings onto `missing`; returns None if any were absent.
    fn resolve_collecting(
        config: &Config,
        env: &dyn EnvSource,
        missing: &mut Vec<&'static str>,
    ) -> Result<Option<Self>, ConfigError> {
        let api_id_config = config.telegram.api_id.map(|id| id.to_string());
        let api_id = env_or(env, ENV_API_ID, api_id_config.as_deref());
        let api_hash = env_or(env, ENV_API_HASH, config.telegram.api_hash.as_deref());
        let phone = env_or(env, ENV_PHONE, config.telegram.phone.as_deref());

        let api_id = match api_id {
            Some(v) => Some(parse_int::<i32>(ENV_API_ID, &v)?),
            None => {
                missing.push(ENV_API_ID);
                None
            }
        };
        if api_hash.is_none() {
            missing.push(ENV_API_HASH);
        }
        if phone.is_none() {
            missing.push(ENV_PHONE);
        }

        let session_path = env
            .get(ENV_SESSION_PATH)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(|| config.telegram.session_path.clone())
            .unwrap_or_else(default_session_path);

        Ok(match (api_id, api_hash, phone) {
            (Some(api_id), Some(api_hash), Some(phone)) => Some(Self {
                api_id,
                api_hash,
                phone,
                session_path,
            }),
            _ => None,
        })
    }
}

impl RelaySettings {
    /// Resolve and validate all settings. Every missing required setting is reported at once.
    pub fn resolve(config: &Config, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let telegram = TelegramSettings::resolve_collecting(config, env, &mut missing)?;
        let webhook_url = env_or(env, ENV_WEBHOOK_URL, config.webhook.url.as_deref());
        if webhook_url.is_none() {
            missing.push(ENV_WEBHOOK_URL);
        }

        let webhook_timeout = match env_or(env, ENV_WEBHOOK_TIMEOUT, None) {
            Some(v) => Duration::from_secs(parse_int::<u64>(ENV_WEBHOOK_TIMEOUT, &v)?),
            None => config
                .webhook
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        if webhook_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let allow_raw =
            env_or(env, ENV_ALLOW_LIST, config.allow_list.as_deref()).unwrap_or_default();
        let allow_list = AllowList::parse(&allow_raw)?;

        match (telegram, webhook_url) {
            (Some(telegram), Some(webhook_url)) if missing.is_empty() => Ok(Self {
                telegram,
                webhook_url,
                webhook_timeout,
                allow_list,
            }),
            _ => Err(ConfigError::Missing(missing)),
        }
    }
}

/// Base directory for tg-relay state (~/.tg-relay).
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".tg-relay"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_session_path() -> PathBuf {
    state_dir().join("telegram.session")
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join("config.json"))
}

/// Load a `.env` file into the process env: `path` when given, otherwise `.env` in the working
/// directory or its parents. Existing vars win. Call before initializing the logger so `RUST_LOG`
/// from the file takes effect; the outcome is returned for logging once the logger is up.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|_| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(p) => Ok(Some(p)),
        Err(e) if e.not_found() && path.is_none() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Load config from the given path (or TG_RELAY_CONFIG_PATH / default). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = read_config_file(&path)?;
    Ok((config, path))
}

fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_API_ID, "12345"),
            (ENV_API_HASH, "abcdef"),
            (ENV_PHONE, "+15551234567"),
            (ENV_WEBHOOK_URL, "https://n8n.example.com/webhook/x"),
        ]
    }

    #[test]
    fn resolves_from_env_with_defaults() {
        let s = RelaySettings::resolve(&Config::default(), &env(&full_env())).unwrap();
        assert_eq!(s.telegram.api_id, 12345);
        assert_eq!(s.telegram.api_hash, "abcdef");
        assert_eq!(s.telegram.phone, "+15551234567");
        assert_eq!(s.telegram.session_path, default_session_path());
        assert_eq!(s.webhook_url, "https://n8n.example.com/webhook/x");
        assert_eq!(s.webhook_timeout, Duration::from_secs(30));
        assert!(s.allow_list.is_empty());
    }

    #[test]
    fn reports_every_missing_setting() {
        let err = RelaySettings::resolve(&Config::default(), &env(&[(ENV_API_HASH, "  ")]))
            .unwrap_err();
        match err {
            ConfigError::Missing(names) => assert_eq!(
                names,
                vec![ENV_API_ID, ENV_API_HASH, ENV_PHONE, ENV_WEBHOOK_URL]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn telegram_settings_do_not_need_webhook() {
        let vars = [
            (ENV_API_ID, "1"),
            (ENV_API_HASH, "h"),
            (ENV_PHONE, "+1"),
            (ENV_SESSION_PATH, "/data/session"),
        ];
        let t = TelegramSettings::resolve(&Config::default(), &env(&vars)).unwrap();
        assert_eq!(t.session_path, PathBuf::from("/data/session"));
    }

    #[test]
    fn invalid_api_id_is_rejected() {
        let mut vars = full_env();
        vars[0] = (ENV_API_ID, "abc");
        let err = RelaySettings::resolve(&Config::default(), &env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInteger { name: ENV_API_ID, .. }));
    }

    #[test]
    fn invalid_allow_list_fails_startup() {
        let mut vars = full_env();
        vars.push((ENV_ALLOW_LIST, "123,oops"));
        let err = RelaySettings::resolve(&Config::default(), &env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::AllowList(_)));
    }

    #[test]
    fn blank_env_allow_list_keeps_config_file_list() {
        let config = Config {
            allow_list: Some("1,2".to_string()),
            ..Config::default()
        };
        let mut vars = full_env();
        vars.push((ENV_ALLOW_LIST, ""));
        let s = RelaySettings::resolve(&config, &env(&vars)).unwrap();
        assert_eq!(s.allow_list.ids_sorted(), vec![1, 2]);
        assert!(!s.allow_list.permits(999));

        vars.pop();
        vars.push((ENV_ALLOW_LIST, "   "));
        let s = RelaySettings::resolve(&config, &env(&vars)).unwrap();
        assert_eq!(s.allow_list.ids_sorted(), vec![1, 2]);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut vars = full_env();
        vars.push((ENV_WEBHOOK_TIMEOUT, "0"));
        assert!(matches!(
            RelaySettings::resolve(&Config::default(), &env(&vars)),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn env_overrides_config_file() {
        let config: Config = serde_json::from_str(
            r#"{
                "telegram": { "apiId": 7, "apiHash": "file-hash", "phone": "+1", "sessionPath": "/srv/tg.session" },
                "webhook": { "url": "http://file/hook", "timeoutSecs": 5 },
                "allowList": "1,2"
            }"#,
        )
        .unwrap();

        let from_file = RelaySettings::resolve(&config, &env(&[])).unwrap();
        assert_eq!(from_file.telegram.api_id, 7);
        assert_eq!(from_file.telegram.session_path, PathBuf::from("/srv/tg.session"));
        assert_eq!(from_file.webhook_timeout, Duration::from_secs(5));
        assert_eq!(from_file.allow_list.ids_sorted(), vec![1, 2]);

        let vars = [
            (ENV_API_HASH, "env-hash"),
            (ENV_WEBHOOK_URL, "http://env/hook"),
            (ENV_ALLOW_LIST, "3"),
        ];
        let merged = RelaySettings::resolve(&config, &env(&vars)).unwrap();
        assert_eq!(merged.telegram.api_hash, "env-hash");
        assert_eq!(merged.webhook_url, "http://env/hook");
        assert_eq!(merged.allow_list.ids_sorted(), vec![3]);
    }

    #[test]
    fn load_config_reads_json_file() {
        let dir = std::env::temp_dir().join(format!("tg-relay-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "webhook": { "url": "http://localhost:5678/webhook/t" } }"#)
            .expect("write config.json");

        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.webhook.url.as_deref(), Some("http://localhost:5678/webhook/t"));

        std::fs::write(&path, "{ not json").expect("write config.json");
        assert!(load_config(Some(path)).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn dotenv_file_populates_process_env_without_overriding() {
        let dir = std::env::temp_dir().join(format!("tg-relay-dotenv-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join(".env");
        std::fs::write(
            &path,
            "TG_RELAY_DOTENV_TEST_LOG=debug\nTG_RELAY_DOTENV_TEST_KEEP=from-file\n",
        )
        .expect("write .env");
        std::env::set_var("TG_RELAY_DOTENV_TEST_KEEP", "from-process");

        let loaded = load_dotenv(Some(&path)).unwrap();
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(std::env::var("TG_RELAY_DOTENV_TEST_LOG").as_deref(), Ok("debug"));
        assert_eq!(
            std::env::var("TG_RELAY_DOTENV_TEST_KEEP").as_deref(),
            Ok("from-process")
        );

        assert!(load_dotenv(Some(&dir.join("missing.env"))).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join("tg-relay-no-such-config.json");
        let config = read_config_file(&path).unwrap();
        assert!(config.webhook.url.is_none());
    }
}
