use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transfer::constants::{
    DEFAULT_ACCEPT_TIMEOUT, DEFAULT_HOST, DEFAULT_OPEN_PATH, DEFAULT_PORT, DEFAULT_RECEIVE_DIR,
    DEFAULT_SOUND_PATH,
};

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "drop";
const APP_NAME: &str = "dropd";
const CONFIG_FILE: &str = "config.json";

/// Overrides the directory searched for config.json
pub const CONFIG_DIR_ENV: &str = "DROP_CONFIG_DIR";

/// How the peer-supplied filename becomes a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenamePolicy {
    /// Keep only a cleaned-up leaf name
    #[default]
    Sanitize,
    /// Use the name as a relative path, refusing anything that leaves the receive dir
    Verbatim,
}

/// Receiver settings. Fixed once the listener starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Idle window for each accept
    pub accept_timeout: Duration,
    /// Per-read deadline once connected. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    pub receive_dir: PathBuf,
    pub filename_policy: FilenamePolicy,
    /// Sound asset played after a completed transfer
    pub sound_path: PathBuf,
    /// File handed to the platform opener after a completed transfer
    pub open_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            read_timeout: None,
            receive_dir: PathBuf::from(DEFAULT_RECEIVE_DIR),
            filename_policy: FilenamePolicy::default(),
            sound_path: PathBuf::from(DEFAULT_SOUND_PATH),
            open_path: PathBuf::from(DEFAULT_OPEN_PATH),
        }
    }
}

impl ServerConfig {
    /// `host:port` as given, before resolution
    pub fn bind_target(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Defaults, then config.json, then `.env` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_with_env_file(None)
    }

    /// Like [`ServerConfig::load`], reading `env_file` instead of the nearest `.env`.
    ///
    /// The env file is read first so it can also set [`CONFIG_DIR_ENV`].
    pub fn load_with_env_file(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }
            None => {
                let _ = dotenvy::dotenv();
            }
        }

        let mut config = Self::default();

        if let Some(path) = config_file_path() {
            if path.exists() {
                ConfigOverrides::from_file(&path)?.apply(&mut config);
            }
        }

        ConfigOverrides::from_vars(std::env::vars())?.apply(&mut config);

        Ok(config)
    }
}

/// A partial config layer; unset fields leave the lower layer alone
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub accept_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub receive_dir: Option<PathBuf>,
    pub filename_policy: Option<FilenamePolicy>,
    pub sound_path: Option<PathBuf>,
    pub open_path: Option<PathBuf>,
}

impl ConfigOverrides {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Pick the `DROP_*` variables out of an environment listing
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            match key.as_str() {
                "DROP_BIND" => layer.host = Some(value),
                "DROP_PORT" => {
                    layer.port = Some(value.parse().context("DROP_PORT must be 0-65535")?)
                }
                "DROP_ACCEPT_TIMEOUT" => {
                    layer.accept_timeout_secs = Some(
                        value
                            .parse()
                            .context("DROP_ACCEPT_TIMEOUT must be whole seconds")?,
                    )
                }
                "DROP_READ_TIMEOUT" => {
                    layer.read_timeout_secs = Some(
                        value
                            .parse()
                            .context("DROP_READ_TIMEOUT must be whole seconds")?,
                    )
                }
                "DROP_RECEIVE_DIR" => layer.receive_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(layer)
    }

    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.accept_timeout_secs {
            config.accept_timeout = Duration::from_secs(secs);
        }
        // 0 turns the read deadline off again
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(dir) = self.receive_dir {
            config.receive_dir = dir;
        }
        if let Some(policy) = self.filename_policy {
            config.filename_policy = policy;
        }
        if let Some(path) = self.sound_path {
            config.sound_path = path;
        }
        if let Some(path) = self.open_path {
            config.open_path = path;
        }
    }
}

/// Location of config.json, if the platform has a config directory
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir).join(CONFIG_FILE));
    }

    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 65432);
        assert_eq!(config.accept_timeout, Duration::from_secs(15));
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.receive_dir, PathBuf::from("files/received"));
        assert_eq!(config.filename_policy, FilenamePolicy::Sanitize);
    }

    #[test]
    fn test_bind_target_brackets_ipv6() {
        let mut config = ServerConfig::default();
        assert_eq!(config.bind_target(), "0.0.0.0:65432");
        config.host = "::1".to_string();
        assert_eq!(config.bind_target(), "[::1]:65432");
        config.host = "localhost".to_string();
        assert_eq!(config.bind_target(), "localhost:65432");
    }

    #[test]
    fn test_env_layer() {
        let layer = ConfigOverrides::from_vars(vars(&[
            ("DROP_BIND", "127.0.0.1"),
            ("DROP_PORT", "9100"),
            ("DROP_ACCEPT_TIMEOUT", "2"),
            ("DROP_READ_TIMEOUT", "30"),
            ("DROP_RECEIVE_DIR", "/tmp/inbox"),
            ("HOME", "/root"),
        ]))
        .unwrap();

        let mut config = ServerConfig::default();
        layer.apply(&mut config);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9100);
        assert_eq!(config.accept_timeout, Duration::from_secs(2));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.receive_dir, PathBuf::from("/tmp/inbox"));
        // untouched
        assert_eq!(config.sound_path, PathBuf::from(DEFAULT_SOUND_PATH));
    }

    #[test]
    fn test_env_layer_rejects_bad_numbers() {
        assert!(ConfigOverrides::from_vars(vars(&[("DROP_PORT", "70000")])).is_err());
        assert!(ConfigOverrides::from_vars(vars(&[("DROP_ACCEPT_TIMEOUT", "soon")])).is_err());
    }

    #[test]
    fn test_zero_read_timeout_disables_deadline() {
        let mut config = ServerConfig {
            read_timeout: Some(Duration::from_secs(5)),
            ..ServerConfig::default()
        };
        ConfigOverrides {
            read_timeout_secs: Some(0),
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn test_file_layer() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"port": 7000, "filename_policy": "verbatim", "open_path": "shots/latest.png"}"#,
        )
        .unwrap();

        let mut config = ServerConfig::default();
        ConfigOverrides::from_file(&path).unwrap().apply(&mut config);

        assert_eq!(config.port, 7000);
        assert_eq!(config.filename_policy, FilenamePolicy::Verbatim);
        assert_eq!(config.open_path, PathBuf::from("shots/latest.png"));
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_file_layer_rejects_unknown_keys() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"prot": 7000}"#).unwrap();
        assert!(ConfigOverrides::from_file(&path).is_err());
    }

    #[test]
    fn test_env_file_can_point_at_config_dir() {
        let config_dir = tempfile::TempDir::new().unwrap();
        fs::write(config_dir.path().join(CONFIG_FILE), r#"{"port": 7100}"#).unwrap();

        let env_dir = tempfile::TempDir::new().unwrap();
        let env_file = env_dir.path().join(".env");
        fs::write(
            &env_file,
            format!("{}={}\n", CONFIG_DIR_ENV, config_dir.path().display()),
        )
        .unwrap();

        let config = ServerConfig::load_with_env_file(Some(&env_file)).unwrap();
        assert_eq!(config.port, 7100);
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let err = ServerConfig::load_with_env_file(Some(Path::new("/definitely/not/here.env")))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"), "{}", err);
    }
}
