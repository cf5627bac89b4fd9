use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::panel::tabs::{DEFAULT_TAB, Tab};
use crate::stack::{DEFAULT_POD_SPEC, PortEncoding};

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Service origin used when the Settings base-URL field is blank
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional API key, used until one is saved from the Settings tab
    #[serde(default)]
    pub api_key: Option<String>,
    /// Wire shape of `target_port` in create requests ("list" or "integer")
    #[serde(default)]
    pub target_port_encoding: PortEncoding,
    /// Tab shown on first start, before any tab choice has been persisted
    #[serde(default = "default_tab_id")]
    pub default_tab: String,
    /// Optional YAML file preloaded into the create form
    #[serde(default)]
    pub pod_spec_template: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_tab_id() -> String {
    DEFAULT_TAB.id().to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            target_port_encoding: PortEncoding::default(),
            default_tab: default_tab_id(),
            pod_spec_template: None,
        }
    }
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    /// Key given on the command line or in the environment; beats the saved one
    pub api_key_override: Option<String>,
    /// Key from the config file; used only when nothing is saved
    pub file_api_key: Option<String>,
    pub encoding: PortEncoding,
    pub default_tab: Tab,
    /// Initial create-form pod spec
    pub pod_spec: String,
}

impl ResolvedConfig {
    /// Merge config file with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        base_url_override: Option<&str>,
        api_key_override: Option<&str>,
        encoding_override: Option<PortEncoding>,
    ) -> Result<Self> {
        let default_tab = Tab::from_id(&file.default_tab).unwrap_or_else(|| {
            warn!(tab = %file.default_tab, "unknown default_tab in config, using {}", DEFAULT_TAB.id());
            DEFAULT_TAB
        });

        let pod_spec = match &file.pod_spec_template {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read pod spec template at {}", path.display()))?,
            None => DEFAULT_POD_SPEC.to_string(),
        };

        Ok(Self {
            base_url: base_url_override
                .map(str::to_string)
                .unwrap_or_else(|| file.base_url.clone()),
            api_key_override: api_key_override.map(str::to_string),
            file_api_key: file.api_key.clone(),
            encoding: encoding_override.unwrap_or(file.target_port_encoding),
            default_tab,
            pod_spec,
        })
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_override: None,
            file_api_key: None,
            encoding: PortEncoding::default(),
            default_tab: DEFAULT_TAB,
            pod_spec: DEFAULT_POD_SPEC.to_string(),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cpdash")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written by --init ─────────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# cpdash configuration
# Run `cpdash --init` to regenerate this file.

# Service origin. The Settings tab can override it per session.
base_url = "http://localhost:8081"

# API key sent as X-API-KEY. A key saved from the Settings tab takes precedence.
# api_key = "..."

# Shape of target_port in POST /stacks:
#   "list"    → [{"container_port": 80, "protocol": "TCP"}]
#   "integer" → 80   (one TCP port only)
target_port_encoding = "list"

# Tab shown until another one has been selected: settings, stacks, create, inspect, service
default_tab = "settings"

# Optional pod spec preloaded into the create form
# pod_spec_template = "/path/to/pod.yaml"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(file.base_url, "http://localhost:8081");
        assert_eq!(file.target_port_encoding, PortEncoding::List);
    }

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_tab, "settings");
        assert_eq!(file.api_key, None);
    }

    #[test]
    fn test_cli_overrides_win() {
        let file: ConfigFile = toml::from_str(
            r#"
            base_url = "http://file:1"
            api_key = "file-key"
            target_port_encoding = "integer"
            default_tab = "stacks"
            "#,
        )
        .unwrap();
        let resolved = ResolvedConfig::resolve(&file, Some("http://cli:2"), Some("cli-key"), None).unwrap();
        assert_eq!(resolved.base_url, "http://cli:2");
        assert_eq!(resolved.api_key_override.as_deref(), Some("cli-key"));
        assert_eq!(resolved.file_api_key.as_deref(), Some("file-key"));
        assert_eq!(resolved.encoding, PortEncoding::Integer);
        assert_eq!(resolved.default_tab, Tab::Stacks);

        let resolved = ResolvedConfig::resolve(&file, None, None, Some(PortEncoding::List)).unwrap();
        assert_eq!(resolved.base_url, "http://file:1");
        assert_eq!(resolved.encoding, PortEncoding::List);
    }

    #[test]
    fn test_unknown_default_tab_falls_back() {
        let file = ConfigFile { default_tab: "nope".to_string(), ..Default::default() };
        let resolved = ResolvedConfig::resolve(&file, None, None, None).unwrap();
        assert_eq!(resolved.default_tab, DEFAULT_TAB);
    }

    #[test]
    fn test_pod_spec_template_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pod.yaml");
        fs::write(&path, "kind: Pod\n").unwrap();
        let file = ConfigFile { pod_spec_template: Some(path), ..Default::default() };
        let resolved = ResolvedConfig::resolve(&file, None, None, None).unwrap();
        assert_eq!(resolved.pod_spec, "kind: Pod\n");

        let missing = ConfigFile {
            pod_spec_template: Some(dir.path().join("missing.yaml")),
            ..Default::default()
        };
        assert!(ResolvedConfig::resolve(&missing, None, None, None).is_err());
    }
}
