use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

pub const DATA_DIR_ENV: &str = "FINPANEL_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default)]
    pub default_year: Option<i32>,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_revenue_marker")]
    pub revenue_marker: String,
    #[serde(default = "default_product_line_label")]
    pub product_line_label: String,
    #[serde(default)]
    pub infer_types_from_category: bool,
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

fn default_revenue_marker() -> String {
    "Medição".to_string()
}

fn default_product_line_label() -> String {
    "TH Parfum".to_string()
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            default_year: None,
            currency_symbol: default_currency_symbol(),
            revenue_marker: default_revenue_marker(),
            product_line_label: default_product_line_label(),
            infer_types_from_category: false,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("finpanel")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// Missing fields take their defaults. An unreadable file is ignored as a whole.
pub fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("ignoring unreadable settings file {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PanelError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Data directory resolution: explicit flag, then environment, then settings.
pub fn resolve_data_dir(flag: Option<&str>, settings: &Settings) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(shellexpand_path(dir));
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(shellexpand_path(&dir));
        }
    }
    PathBuf::from(shellexpand_path(&settings.data_dir))
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finpanel").join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/ledger".to_string(),
            default_year: Some(2024),
            infer_types_from_category: true,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.data_dir, "/tmp/ledger");
        assert_eq!(loaded.default_year, Some(2024));
        assert!(loaded.infer_types_from_category);
    }

    #[test]
    fn test_file_without_data_dir_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"default_year": 2024, "currency_symbol": "US$"}"#).unwrap();
        let s = load_settings_from(&path);
        assert_eq!(s.default_year, Some(2024));
        assert_eq!(s.currency_symbol, "US$");
        assert_eq!(s.data_dir, "data");
    }

    #[test]
    fn test_missing_or_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(load_settings_from(&path).data_dir, "data");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_settings_from(&path).default_year.is_none());
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.currency_symbol, "R$");
        assert_eq!(s.revenue_marker, "Medição");
        assert_eq!(s.product_line_label, "TH Parfum");
        assert!(s.default_year.is_none());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/srv/data"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/srv/data");
        assert_eq!(s.currency_symbol, "R$");
        assert!(!s.infer_types_from_category);
    }

    #[test]
    fn test_flag_wins_over_settings() {
        let s = Settings {
            data_dir: "/from/settings".into(),
            ..Settings::default()
        };
        assert_eq!(resolve_data_dir(Some("/from/flag"), &s), PathBuf::from("/from/flag"));
    }

    #[test]
    fn test_shellexpand_leaves_plain_paths() {
        assert_eq!(shellexpand_path("/abs/dir"), "/abs/dir");
        assert_eq!(shellexpand_path("rel/dir"), "rel/dir");
    }
}
