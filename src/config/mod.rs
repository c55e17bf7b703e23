//! Application Configuration
//!
//! Pipeline settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::advisor::AdvisorConfig;
use crate::batch::DEFAULT_MAX_CONCURRENT_JOBS;
use crate::error::ConfigError;
use crate::knowledge::thresholds::DEFAULT_REVIEW_THRESHOLD;
use crate::ocr::{default_pool_size, TesseractConfig};
use crate::vision::VisionConfig;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Segmentation and feature extraction tuning
    pub vision: VisionConfig,
    /// OCR pool settings
    pub ocr: OcrSettings,
    /// External advisor settings
    pub advisor: AdvisorConfig,
    /// Job scheduling settings
    pub scheduler: SchedulerSettings,
    /// Manual review routing
    pub review: ReviewSettings,
}

/// OCR pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Engine count; defaults to available parallelism, capped at 4
    pub workers: Option<usize>,
    /// Tesseract invocation
    pub tesseract: TesseractConfig,
}

impl OcrSettings {
    /// Effective pool size
    pub fn pool_size(&self) -> usize {
        self.workers.unwrap_or_else(default_pool_size)
    }
}

/// Job scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Jobs analysed at the same time
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

/// Manual review routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Results below this confidence are flagged for review
    pub confidence_threshold: f32,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_REVIEW_THRESHOLD,
        }
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ocr.workers == Some(0) {
            return Err(invalid("ocr.workers", "must be at least 1"));
        }
        if self.scheduler.max_concurrent_jobs == 0 {
            return Err(invalid("scheduler.max_concurrent_jobs", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.review.confidence_threshold) {
            return Err(invalid("review.confidence_threshold", "must be between 0 and 1"));
        }
        if self.vision.sample_stride == 0 {
            return Err(invalid("vision.sample_stride", "must be at least 1"));
        }
        if self.vision.max_dimension == 0 || self.vision.score_max_dimension == 0 {
            return Err(invalid("vision.max_dimension", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.vision.min_blob_area_fraction) {
            return Err(invalid("vision.min_blob_area_fraction", "must be between 0 and 1"));
        }
        if self.vision.max_pole_aspect <= 0.0 {
            return Err(invalid("vision.max_pole_aspect", "must be positive"));
        }
        if self.advisor.enabled && self.advisor.host.trim().is_empty() {
            return Err(invalid("advisor.host", "must not be empty when the advisor is enabled"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "lumiscan", "lumiscan").ok_or(ConfigError::NoConfigDir)?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load `path`, or the file in the platform config directory, writing
/// defaults there on first run
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => return load_config(path),
        None => config_dir()?.join(CONFIG_FILE_NAME),
    };

    if path.exists() {
        load_config(&path)
    } else {
        let config = AppConfig::default();
        save_config(&config, &path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!(config.ocr.workers.is_none());
        assert!(config.ocr.pool_size() >= 1 && config.ocr.pool_size() <= 4);
        assert_eq!(config.ocr.tesseract.page_seg_mode, 6);

        assert!(!config.advisor.enabled);
        assert_eq!(config.advisor.host, "http://localhost:11434");
        assert_eq!(config.advisor.timeout_secs, 20);

        assert_eq!(config.scheduler.max_concurrent_jobs, 2);
        assert!((config.review.confidence_threshold - 0.85).abs() < 0.001);
        assert_eq!(config.vision.sample_stride, 8);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.ocr.workers = Some(3);
        config.advisor.model = "llava:13b".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.ocr.workers, Some(3));
        assert_eq!(parsed.advisor.model, "llava:13b");
        assert_eq!(parsed.vision.max_dimension, config.vision.max_dimension);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[scheduler]\nmax_concurrent_jobs = 1\n").unwrap();
        assert_eq!(parsed.scheduler.max_concurrent_jobs, 1);
        assert_eq!(parsed.vision.min_crop_width, 150);
        assert_eq!(parsed.ocr.tesseract.binary, "tesseract");
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = AppConfig::default();
        config.ocr.workers = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "ocr.workers", .. })
        ));

        let mut config = AppConfig::default();
        config.scheduler.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.review.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.advisor.enabled = true;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(loaded.advisor.enabled);
        assert_eq!(loaded.scheduler.max_concurrent_jobs, config.scheduler.max_concurrent_jobs);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[ocr]\nworkers = 0").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_create_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lumiscan.toml");
        save_config(&AppConfig::default(), &path).unwrap();

        let loaded = load_or_create_config(Some(&path)).unwrap();
        assert_eq!(loaded.scheduler.max_concurrent_jobs, 2);
    }
}
