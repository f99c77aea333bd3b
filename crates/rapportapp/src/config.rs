//! # Configuration
//!
//! Rapport configuration is managed by [`confique`], layered in priority
//! order:
//!
//! 1. **Environment variables**: `RAPPORT_BACKEND`, `RAPPORT_DATA_DIR`, ...
//! 2. **Config file**: `rapport.toml`, when one is given.
//! 3. **Compiled defaults**: via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `backend` | `RAPPORT_BACKEND` | `local` |
//! | `data_dir` | `RAPPORT_DATA_DIR` | `data` |
//! | `drive_folder` | `RAPPORT_DRIVE_FOLDER` | none |
//! | `drive_token` | `RAPPORT_DRIVE_TOKEN` | none |
//! | `drive_api_base` | `RAPPORT_DRIVE_API` | `https://www.googleapis.com` |
//! | `db_folder` / `detail_folder` / `asset_folder` | | `DB` / `MELD` / `FOTOS` |
//! | `csv_mirror` | `RAPPORT_CSV_MIRROR` | on for `drive`, off for `local` |
//! | `photo_max_width` / `photo_max_height` | | `600` / `800` |
//! | `photo_quality` | | `82` |
//!
//! Photo bounds must be at least 1 and the JPEG quality lies in `1..=100`;
//! anything else fails [`RapportConfig::load`].

use crate::error::{RapportError, Result};
use crate::photo::PhotoLimits;
use crate::store::drive_backend::DEFAULT_API_BASE;
use crate::store::namespace::NamespaceNames;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Local,
    Drive,
}

/// Configuration for rapport, stored in `rapport.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RapportConfig {
    /// Where the data lives: "local" or "drive".
    #[config(env = "RAPPORT_BACKEND", default = "local")]
    pub backend: BackendChoice,

    /// Root directory of the local backend.
    #[config(env = "RAPPORT_DATA_DIR", default = "data")]
    pub data_dir: PathBuf,

    /// Drive folder id, or a folder share URL.
    #[config(env = "RAPPORT_DRIVE_FOLDER")]
    pub drive_folder: Option<String>,

    /// Bearer token for the Drive API.
    #[config(env = "RAPPORT_DRIVE_TOKEN")]
    pub drive_token: Option<String>,

    #[config(env = "RAPPORT_DRIVE_API", default = "https://www.googleapis.com")]
    pub drive_api_base: String,

    #[config(default = "DB")]
    pub db_folder: String,

    #[config(default = "MELD")]
    pub detail_folder: String,

    #[config(default = "FOTOS")]
    pub asset_folder: String,

    /// Write a CSV rendering next to every collection. When absent, only the
    /// drive backend mirrors.
    #[config(env = "RAPPORT_CSV_MIRROR")]
    pub csv_mirror: Option<bool>,

    #[config(default = 600)]
    pub photo_max_width: u32,

    #[config(default = 800)]
    pub photo_max_height: u32,

    #[config(default = 82)]
    pub photo_quality: u8,
}

impl Default for RapportConfig {
    fn default() -> Self {
        let names = NamespaceNames::default();
        let limits = PhotoLimits::default();
        Self {
            backend: BackendChoice::Local,
            data_dir: PathBuf::from("data"),
            drive_folder: None,
            drive_token: None,
            drive_api_base: DEFAULT_API_BASE.to_string(),
            db_folder: names.db,
            detail_folder: names.detail,
            asset_folder: names.asset,
            csv_mirror: None,
            photo_max_width: limits.max_width,
            photo_max_height: limits.max_height,
            photo_quality: limits.quality,
        }
    }
}

impl RapportConfig {
    /// Load from the environment and, when given, a TOML file. A missing
    /// file is skipped.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = file {
            builder = builder.file(path);
        }
        let config = builder
            .load()
            .map_err(|e| RapportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.photo_max_width == 0 || self.photo_max_height == 0 {
            return Err(RapportError::Config(format!(
                "photo bounds must be positive, got {}x{}",
                self.photo_max_width, self.photo_max_height
            )));
        }
        if !(1..=100).contains(&self.photo_quality) {
            return Err(RapportError::Config(format!(
                "photo_quality must be within 1..=100, got {}",
                self.photo_quality
            )));
        }
        Ok(())
    }

    pub fn csv_mirror(&self) -> bool {
        self.csv_mirror
            .unwrap_or(self.backend == BackendChoice::Drive)
    }

    pub fn namespace_names(&self) -> NamespaceNames {
        NamespaceNames {
            db: self.db_folder.clone(),
            detail: self.detail_folder.clone(),
            asset: self.asset_folder.clone(),
        }
    }

    pub fn photo_limits(&self) -> PhotoLimits {
        PhotoLimits {
            max_width: self.photo_max_width,
            max_height: self.photo_max_height,
            quality: self.photo_quality,
        }
    }
}
