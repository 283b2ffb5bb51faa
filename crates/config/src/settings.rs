// User settings
// Loaded from ~/.config/labgrid/settings.json

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Field delimiter for CSV export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportDelimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
}

impl ExportDelimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            ExportDelimiter::Comma => b',',
            ExportDelimiter::Tab => b'\t',
            ExportDelimiter::Semicolon => b';',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Export
    #[serde(rename = "export.delimiter")]
    pub export_delimiter: ExportDelimiter,

    #[serde(rename = "export.includeCreatedAt")]
    pub include_created_at: bool,

    #[serde(rename = "export.filenamePrefix")]
    pub filename_prefix: String,

    // Grid: sheet name -> hidden column ids
    #[serde(rename = "grid.hiddenColumns")]
    pub hidden_columns: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_delimiter: ExportDelimiter::Comma,
            include_created_at: false,
            filename_prefix: "labgrid".to_string(),
            hidden_columns: BTreeMap::new(),
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // CSV export
    // Delimiter options: "comma", "tab", "semicolon"
    "export.delimiter": "comma",
    "export.includeCreatedAt": false,
    "export.filenamePrefix": "labgrid",

    // Columns hidden per sheet, by column id
    // e.g. "solutions": ["notes", "margin"]
    "grid.hiddenColumns": {}
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("labgrid")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::create_default_file(&path) {
                log::warn!("could not write default {}: {}", path.display(), e);
            }
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}: {}; using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse settings JSON, allowing `//` comment lines
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(serde_json::from_str(&cleaned)?)
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn create_default_file(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_FILE)?;
        Ok(())
    }

    /// Hidden column ids for a sheet (empty when never customised)
    pub fn hidden_columns_for(&self, sheet: &str) -> &[String] {
        self.saved_hidden_columns(sheet).unwrap_or(&[])
    }

    /// The sheet's saved layout as the complete hidden set, or `None` when
    /// it was never customised. `Some([])` means every column is shown.
    pub fn saved_hidden_columns(&self, sheet: &str) -> Option<&[String]> {
        self.hidden_columns.get(sheet).map(Vec::as_slice)
    }

    pub fn set_hidden_columns(&mut self, sheet: &str, columns: Vec<String>) {
        self.hidden_columns.insert(sheet.to_string(), columns);
    }

    /// Drop the saved layout so the sheet opens with its defaults again
    pub fn forget_hidden_columns(&mut self, sheet: &str) {
        self.hidden_columns.remove(sheet);
    }

    /// `<prefix>-<sheet>-<date>.<ext>`
    pub fn export_filename(&self, sheet: &str, date: impl Display, ext: &str) -> String {
        let prefix = self.filename_prefix.trim();
        if prefix.is_empty() {
            format!("{}-{}.{}", sheet, date, ext)
        } else {
            format!("{}-{}-{}.{}", prefix, sheet, date, ext)
        }
    }
}
