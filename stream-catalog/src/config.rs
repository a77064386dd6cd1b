//! Catalog configuration.
//!
//! Stored as JSON in ~/.stream_catalog/config.json by default. A missing file
//! means defaults: Gaia DR3 source ids and the registered Gaia bands.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::schema::{SchemaRegistry, PHOTOMETRIC_BANDS};

/// Gaia data release assumed when nothing else is configured
pub const DEFAULT_SOURCE_ID_VERSION: u16 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Gaia data release the source ids refer to
    pub source_id_version: u16,
    /// Bands requested from the photometry source; each must be registered
    pub bands: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_id_version: DEFAULT_SOURCE_ID_VERSION,
            bands: PHOTOMETRIC_BANDS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl CatalogConfig {
    /// Default config location (~/.stream_catalog/config.json)
    pub fn default_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(PathBuf::from(home)
            .join(".stream_catalog")
            .join("config.json"))
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self, CatalogError> {
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a JSON config file
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to JSON file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check that every configured band has registered photometry arrays
    pub fn validate(&self) -> Result<(), CatalogError> {
        let registry = SchemaRegistry::global();
        for band in &self.bands {
            registry.field(&format!("mags.{band}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.source_id_version, 3);
        assert_eq!(config.bands, vec!["gaia_g", "gaia_rp"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = CatalogConfig {
            source_id_version: 2,
            bands: vec!["gaia_g".to_string()],
        };
        config.save_to_file(&path).unwrap();

        let loaded = CatalogConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"source_id_version": 2}"#).unwrap();

        let loaded = CatalogConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.source_id_version, 2);
        assert_eq!(loaded.bands, CatalogConfig::default().bands);
    }

    #[test]
    fn test_unregistered_band_rejected() {
        let config = CatalogConfig {
            bands: vec!["gaia_g".to_string(), "sdss_r".to_string()],
            ..Default::default()
        };
        match config.validate() {
            Err(CatalogError::UnknownField(name)) => assert_eq!(name, "mags.sdss_r"),
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }
}
