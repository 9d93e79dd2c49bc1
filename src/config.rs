use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

pub const DEFAULT_CONFIG_FILE: &str = "h5zarr.json";
pub const DEFAULT_WORKERS: usize = 8;

/// Contents of an optional JSON config file. Every field may be omitted.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub data_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub overwrite: Option<bool>,
}

/// Values given on the command line. They win over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub data_dir: Option<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub workers: Option<usize>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionConfig {
    pub data_dir: Utf8PathBuf,
    pub output_dir: Option<Utf8PathBuf>,
    pub workers: usize,
    pub overwrite: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config file at `path`, or `h5zarr.json` in the working
    /// directory when no path is given. A missing default file is not an
    /// error.
    pub fn load(path: Option<&str>) -> Result<FileConfig, ConvertError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(FileConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConvertError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| ConvertError::ConfigParse(err.to_string()))
    }

    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ConversionConfig, ConvertError> {
        let file = Self::load(path)?;
        let config = Self::merge(file, overrides)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Layers `overrides` over `file` over the defaults. Checks the values but
    /// not the filesystem.
    pub fn merge(
        file: FileConfig,
        overrides: ConfigOverrides,
    ) -> Result<ConversionConfig, ConvertError> {
        let data_dir = overrides
            .data_dir
            .or(file.data_dir)
            .ok_or(ConvertError::MissingDataDir)?;
        let workers = overrides
            .workers
            .or(file.workers)
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConvertError::InvalidWorkerCount(workers));
        }

        Ok(ConversionConfig {
            data_dir,
            output_dir: overrides.output_dir.or(file.output_dir),
            workers,
            overwrite: overrides.overwrite || file.overwrite.unwrap_or(false),
        })
    }

    pub fn validate(config: &ConversionConfig) -> Result<(), ConvertError> {
        if !is_dir(&config.data_dir) {
            return Err(ConvertError::DataDirNotFound(config.data_dir.clone()));
        }
        Ok(())
    }
}

fn is_dir(path: &Utf8Path) -> bool {
    path.as_std_path().is_dir()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_fill_the_gaps() {
        let overrides = ConfigOverrides {
            data_dir: Some("data".into()),
            ..Default::default()
        };
        let config = ConfigLoader::merge(FileConfig::default(), overrides).unwrap();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(!config.overwrite);
        assert_eq!(config.output_dir, None);
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig {
            data_dir: Some("from-file".into()),
            output_dir: Some("out-file".into()),
            workers: Some(2),
            overwrite: Some(false),
        };
        let overrides = ConfigOverrides {
            data_dir: Some("from-cli".into()),
            output_dir: None,
            workers: Some(16),
            overwrite: true,
        };
        let config = ConfigLoader::merge(file, overrides).unwrap();
        assert_eq!(config.data_dir, Utf8PathBuf::from("from-cli"));
        assert_eq!(config.output_dir, Some(Utf8PathBuf::from("out-file")));
        assert_eq!(config.workers, 16);
        assert!(config.overwrite);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let overrides = ConfigOverrides {
            data_dir: Some("data".into()),
            workers: Some(0),
            ..Default::default()
        };
        let err = ConfigLoader::merge(FileConfig::default(), overrides).unwrap_err();
        assert_matches!(err, ConvertError::InvalidWorkerCount(0));
    }

    #[test]
    fn data_dir_is_required() {
        let err = ConfigLoader::merge(FileConfig::default(), ConfigOverrides::default())
            .unwrap_err();
        assert_matches!(err, ConvertError::MissingDataDir);
    }
}
