use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::pdf::DEFAULT_FONT_DIRS;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub ledger_path: PathBuf,
    /// Issue registered certificates and record them in the ledger.
    pub ledger_enabled: bool,
    pub font_dirs: Vec<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?,
            None => 5001,
        };

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let ledger_path =
            base_dir.join(var("LEDGER_PATH").unwrap_or_else(|| "certificates.csv".to_string()));

        let ledger_enabled = match var("LEDGER_ENABLED") {
            Some(raw) => parse_bool(&raw).context("LEDGER_ENABLED must be true or false")?,
            None => true,
        };

        let font_dirs = match var("FONT_DIRS") {
            Some(raw) => std::env::split_paths(&raw).collect(),
            None => DEFAULT_FONT_DIRS.iter().map(PathBuf::from).collect(),
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {raw:?}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            host,
            port,
            ledger_path,
            ledger_enabled,
            font_dirs,
            max_upload_bytes,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 5001);
        assert!(c.ledger_enabled);
        assert!(c.ledger_path.ends_with("certificates.csv"));
        assert_eq!(c.font_dirs.len(), DEFAULT_FONT_DIRS.len());
        assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("PORT", "8080"),
            ("LEDGER_ENABLED", "off"),
            ("LEDGER_PATH", "/var/lib/certmint/ledger.csv"),
            ("FONT_DIRS", "/opt/fonts"),
            ("MAX_UPLOAD_BYTES", "2048"),
        ])
        .unwrap();
        assert_eq!(c.port, 8080);
        assert!(!c.ledger_enabled);
        assert_eq!(c.ledger_path, PathBuf::from("/var/lib/certmint/ledger.csv"));
        assert_eq!(c.font_dirs, vec![PathBuf::from("/opt/fonts")]);
        assert_eq!(c.max_upload_bytes, 2048);
    }

    #[test]
    fn test_bad_port_is_an_error() {
        assert!(config(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn test_bad_bool_is_an_error() {
        assert!(config(&[("LEDGER_ENABLED", "maybe")]).is_err());
    }
}
