// Application configuration: TOML file, then environment overrides

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::downloader::lyrics::DEFAULT_LRCLIB_URL;
use crate::downloader::NetworkConfig;

pub const CONFIG_ENV: &str = "VISUALIZER_CONFIG";
const LOCAL_CONFIG: &str = "config/default.toml";
const APP_DIR: &str = "visualizer-downloader";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where downloads land; also served under `/downloads`
    pub download_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            download_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Explicit binary; looked up on the usual paths when unset
    pub path: Option<PathBuf>,
    pub proxy: Option<String>,
    pub cookies: Option<PathBuf>,
    pub socket_timeout: Option<u32>,
    /// Run `yt-dlp -U` once when a download fails like an outdated extractor
    pub auto_update: bool,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            path: None,
            proxy: None,
            cookies: None,
            socket_timeout: Some(30),
            auto_update: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    pub url: String,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LRCLIB_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ytdlp: YtDlpConfig,
    pub lyrics: LyricsConfig,
}

impl AppConfig {
    /// Load the first config file found, then apply environment overrides.
    ///
    /// `$VISUALIZER_CONFIG` must exist when set; the other locations are optional.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match Self::candidate_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_from(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR).join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("[Config] Loaded {}", path.display());
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `PORT`, `HOST`, `DOWNLOAD_DIR`, `YTDLP_*` and `LYRICS_URL`.
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var: "PORT", value: port })?;
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(dir) = get("DOWNLOAD_DIR") {
            self.server.download_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("YTDLP_PATH") {
            self.ytdlp.path = Some(PathBuf::from(path));
        }
        if let Some(proxy) = get("YTDLP_PROXY") {
            self.ytdlp.proxy = Some(proxy);
        }
        if let Some(cookies) = get("YTDLP_COOKIES") {
            self.ytdlp.cookies = Some(PathBuf::from(cookies));
        }
        if let Some(flag) = get("YTDLP_AUTO_UPDATE") {
            self.ytdlp.auto_update = parse_flag(&flag).ok_or(ConfigError::Env {
                var: "YTDLP_AUTO_UPDATE",
                value: flag,
            })?;
        }
        if let Some(url) = get("LYRICS_URL") {
            self.lyrics.url = url;
        }
        Ok(())
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            proxy: self.ytdlp.proxy.clone(),
            timeout: self.ytdlp.socket_timeout,
            cookies_path: self.ytdlp.cookies.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_serve_downloads_on_3001() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.lyrics.url, "https://lrclib.net/api/search");
        assert!(!config.ytdlp.auto_update);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [ytdlp]
            proxy = "socks5://127.0.0.1:1080"
            auto_update = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ytdlp.socket_timeout, Some(30));
        assert!(config.ytdlp.auto_update);

        let network = config.network();
        assert_eq!(network.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(network.timeout, Some(30));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[server]\nport = \"many\"").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "server = [").unwrap();
        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            AppConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(env(&[
                ("PORT", "4000"),
                ("DOWNLOAD_DIR", "/srv/media"),
                ("YTDLP_PATH", "/opt/bin/yt-dlp"),
                ("YTDLP_COOKIES", "/srv/cookies.txt"),
                ("YTDLP_AUTO_UPDATE", "yes"),
                ("LYRICS_URL", "http://localhost:9999/api/search"),
                ("HOST", ""),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.ytdlp.path, Some(PathBuf::from("/opt/bin/yt-dlp")));
        assert_eq!(config.network().cookies_path, Some(PathBuf::from("/srv/cookies.txt")));
        assert!(config.ytdlp.auto_update);
        assert_eq!(config.lyrics.url, "http://localhost:9999/api/search");
    }

    #[test]
    fn invalid_environment_values_are_rejected() {
        let mut config = AppConfig::default();
        let err = config.apply_env_from(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));

        let err = config
            .apply_env_from(env(&[("YTDLP_AUTO_UPDATE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "YTDLP_AUTO_UPDATE", .. }));
    }
}
