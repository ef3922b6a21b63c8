//! Configuration management for herakles-freebsd-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use herakles_freebsd_exporter::collectors::{self, CollectorOptions, DevstatOptions};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9100;

/// Locations searched when no `--config` is given, in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/usr/local/etc/herakles/freebsd-exporter.yaml",
    "/usr/local/etc/herakles/freebsd-exporter.yml",
    "/usr/local/etc/herakles/freebsd-exporter.json",
    "/usr/local/etc/herakles/freebsd-exporter.toml",
    "./herakles-freebsd-exporter.yaml",
    "./herakles-freebsd-exporter.yml",
    "./herakles-freebsd-exporter.json",
    "./herakles-freebsd-exporter.toml",
];

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection
    pub collectors: Option<Vec<String>>,
    #[serde(alias = "devstat-ignored-devices")]
    pub devstat_ignored_devices: Option<String>,
    pub parallelism: Option<usize>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            collectors: Some(
                collectors::AVAILABLE
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            ),
            devstat_ignored_devices: None,
            parallelism: None,
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Effective log level, `info` when unset.
    pub fn log_level(&self) -> Result<LogLevel, String> {
        match self.log_level.as_deref() {
            None => Ok(LogLevel::Info),
            Some(level) => LogLevel::from_str(level, true)
                .map_err(|_| format!("Invalid log_level '{}'", level)),
        }
    }

    /// Collectors to build, falling back to all available ones.
    pub fn enabled_collectors(&self) -> Vec<String> {
        self.collectors.clone().unwrap_or_else(|| {
            collectors::AVAILABLE
                .iter()
                .map(|name| name.to_string())
                .collect()
        })
    }

    /// Collector options derived from this configuration.
    pub fn collector_options(&self) -> Result<CollectorOptions, regex::Error> {
        let ignored_devices = self
            .devstat_ignored_devices
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()?;
        Ok(CollectorOptions {
            devstat: DevstatOptions { ignored_devices },
        })
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let enabled = cfg.enabled_collectors();
    if enabled.is_empty() {
        return Err("At least one collector must be enabled".into());
    }
    for name in &enabled {
        if !collectors::AVAILABLE.contains(&name.as_str()) {
            return Err(format!(
                "Unknown collector '{}', expected one of: {}",
                name,
                collectors::AVAILABLE.join(", ")
            )
            .into());
        }
    }
    for (i, name) in enabled.iter().enumerate() {
        if enabled[..i].contains(name) {
            return Err(format!("Collector '{}' is listed more than once", name).into());
        }
    }

    cfg.log_level()?;

    if let Err(e) = cfg.collector_options() {
        return Err(format!("Invalid devstat_ignored_devices pattern: {}", e).into());
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Parse comma-separated collector names
    if let Some(list) = &args.collectors {
        config.collectors = Some(
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    if let Some(pattern) = &args.devstat_ignored_devices {
        config.devstat_ignored_devices = Some(pattern.clone());
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    if let Some(parallelism) = args.parallelism {
        config.parallelism = Some(parallelism);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// The config file that would be loaded: `path` if given, otherwise the
/// first default location that exists.
pub fn locate_config(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    }
}

/// Loads a configuration file, or the first default location that exists.
/// Without any file the built-in defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let Some(path) = locate_config(path) else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders a configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

/// Shows the user config file on its own: its full path and only the values
/// it sets, without defaults or CLI overrides merged in.
pub fn show_user_config(
    args: &Args,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_user_config(args, format)?);
    Ok(())
}

fn render_user_config(
    args: &Args,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let path = if args.no_config {
        None
    } else {
        locate_config(args.config.as_deref())
    };
    let Some(path) = path else {
        return Ok("No user config file loaded, built-in defaults apply".to_string());
    };

    let config = load_config(Some(&path))?;
    let full_path = fs::canonicalize(&path).unwrap_or(path);
    Ok(format!(
        "# User config file: {}\n{}",
        full_path.display(),
        render_config(&config, format)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn config_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.port, Some(DEFAULT_PORT));
        assert_eq!(config.enabled_collectors(), vec!["cpu", "devstat"]);
        validate_effective_config(&config).unwrap();
    }

    #[test]
    fn test_load_yaml() {
        let file = config_file(
            ".yaml",
            "port: 9200\ncollectors: [devstat]\ndevstat_ignored_devices: \"^cd\"\n",
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.port, Some(9200));
        assert_eq!(config.enabled_collectors(), vec!["devstat"]);
        assert!(config
            .collector_options()
            .unwrap()
            .devstat
            .ignored_devices
            .is_some_and(|re| re.is_match("cd0")));
    }

    #[test]
    fn test_load_json() {
        let file = config_file(".json", r#"{"bind": "127.0.0.1", "enable_tls": false}"#);
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, None);
        // Collectors missing from the file fall back to all of them.
        assert_eq!(config.enabled_collectors(), vec!["cpu", "devstat"]);
    }

    #[test]
    fn test_load_toml() {
        let file = config_file(".toml", "port = 9300\ncollectors = [\"cpu\"]\n");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.port, Some(9300));
        assert_eq!(config.enabled_collectors(), vec!["cpu"]);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = config_file(".yaml", "port: 9200\ncollectors: [cpu, devstat]\n");
        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "herakles-freebsd-exporter",
            "--config",
            &path,
            "--port",
            "9999",
            "--collectors",
            "devstat",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.enabled_collectors(), vec!["devstat"]);
    }

    #[test]
    fn test_validate_rejects_unknown_collector() {
        let config = Config {
            collectors: Some(vec!["cpu".into(), "zfs".into()]),
            ..Config::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("zfs"));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_empty() {
        let config = Config {
            collectors: Some(vec!["cpu".into(), "cpu".into()]),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());

        let config = Config {
            collectors: Some(Vec::new()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_log_level_from_file_and_cli() {
        let file = config_file(".yaml", "log_level: debug\n");
        let path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from(["herakles-freebsd-exporter", "--config", &path]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.log_level().unwrap(), LogLevel::Debug);

        let args = Args::parse_from([
            "herakles-freebsd-exporter",
            "--config",
            &path,
            "--log-level",
            "warn",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.log_level().unwrap(), LogLevel::Warn);

        let config = Config {
            log_level: Some("loud".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let config = Config {
            devstat_ignored_devices: Some("(".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("devstat_ignored_devices"));
    }

    #[test]
    fn test_validate_tls_requires_files() {
        let config = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/nonexistent/cert.pem".into()),
            tls_key_path: None,
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());

        let cert = config_file(".pem", "CERT");
        let key = config_file(".pem", "");
        let config = Config {
            enable_tls: Some(true),
            tls_cert_path: Some(cert.path().to_string_lossy().to_string()),
            tls_key_path: Some(key.path().to_string_lossy().to_string()),
            ..Config::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_user_config_shows_only_file_values() {
        let file = config_file(".yaml", "port: 9200\n");
        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "herakles-freebsd-exporter",
            "--config",
            &path,
            "--port",
            "9999",
        ]);

        let rendered = render_user_config(&args, ConfigFormat::Yaml).unwrap();
        let full_path = fs::canonicalize(file.path()).unwrap();
        assert!(rendered.starts_with(&format!("# User config file: {}", full_path.display())));
        assert!(rendered.contains("port: 9200"), "{}", rendered);
        assert!(!rendered.contains("port: 9999"), "{}", rendered);
        // Defaults are not merged into the file view.
        assert!(rendered.contains("collectors: null"), "{}", rendered);
    }

    #[test]
    fn test_user_config_without_file() {
        let args = Args::parse_from(["herakles-freebsd-exporter", "--no-config"]);
        let rendered = render_user_config(&args, ConfigFormat::Yaml).unwrap();
        assert!(rendered.starts_with("No user config file loaded"));
    }

    #[test]
    fn test_user_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let missing = missing.to_string_lossy().to_string();
        let args = Args::parse_from(["herakles-freebsd-exporter", "--config", &missing]);
        assert!(render_user_config(&args, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_locate_config_prefers_explicit_path() {
        let explicit = Path::new("/tmp/explicit.toml");
        assert_eq!(locate_config(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn test_render_round_trips_through_yaml() {
        let rendered = render_config(&Config::default(), ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(parsed.port, Some(DEFAULT_PORT));
    }
}
