use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVER_ADDR: &str = ":8080";

/// Top-level config: `config.toml` (aliases + default route) plus a handful
/// of literally-named environment variables, layered the same way the
/// original SKYNET_*-prefixed config loader did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoatwayConfig {
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default = "bool_true")]
    pub enable_web_ui: bool,
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub encryption_key: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub models: Vec<ModelAlias>,
    pub default_route: Option<DefaultRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAlias {
    pub slug: String,
    pub provider: String,
    pub model: String,
    pub credential_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultRoute {
    pub provider: String,
    pub credential_name: String,
}

impl Default for GoatwayConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            enable_web_ui: true,
            data_dir: PathBuf::new(),
            encryption_key: None,
            admin_password: None,
            log_level: default_log_level(),
            log_format: default_log_format(),
            models: Vec::new(),
            default_route: None,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Resolves the data directory in the order documented in the external
/// interfaces: `$GOATWAY_DATA_DIR`, else `$XDG_DATA_HOME/goatway`, else
/// `~/.goatway` (`%APPDATA%\goatway` on Windows).
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GOATWAY_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("goatway");
    }
    if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("goatway");
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".goatway")
}

fn env_override(current: &mut String, var: &str) {
    if let Ok(v) = std::env::var(var) {
        *current = v;
    }
}

impl GoatwayConfig {
    /// Loads `config.toml` from the resolved data directory, then overlays
    /// the handful of environment variables the gateway recognizes. Never
    /// panics on a missing file or unset var — falls back to defaults.
    pub fn load() -> crate::error::Result<Self> {
        let data_dir = resolve_data_dir();
        if let Err(e) = ensure_data_dir(&data_dir) {
            tracing::warn!(error = %e, dir = %data_dir.display(), "failed to create data directory");
        }

        let toml_path = data_dir.join("config.toml");
        let mut config: GoatwayConfig = Figment::new()
            .merge(Toml::file(&toml_path))
            .extract()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "config.toml missing or invalid, using defaults");
                GoatwayConfig::default()
            });

        config.data_dir = data_dir;
        env_override(&mut config.server_addr, "SERVER_ADDR");
        env_override(&mut config.log_level, "LOG_LEVEL");
        env_override(&mut config.log_format, "LOG_FORMAT");
        if let Ok(v) = std::env::var("ENABLE_WEB_UI") {
            config.enable_web_ui = matches!(v.trim(), "1" | "true" | "TRUE" | "True");
        }
        if let Ok(v) = std::env::var("GOATWAY_ENCRYPTION_KEY") {
            config.encryption_key = Some(v);
        }
        if let Ok(v) = std::env::var("GOATWAY_ADMIN_PASSWORD") {
            config.admin_password = Some(v);
        }

        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("goatway.db")
    }
}

#[cfg(unix)]
fn ensure_data_dir(dir: &std::path::Path) -> std::io::Result<()> {
    use std::fs::DirBuilder;
    use std::os::unix::fs::DirBuilderExt;
    DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn ensure_data_dir(dir: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GoatwayConfig::default();
        assert_eq!(cfg.server_addr, ":8080");
        assert!(cfg.enable_web_ui);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.models.is_empty());
        assert!(cfg.default_route.is_none());
    }
}
