use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::constants::{
    DATA_DIR_ENV, DOWNLOAD_DIR_ENV, EXPOSURE_TOOL, SELECT_TOOL, SPACECRAFT_FILE_NAME,
    TIME_FILTER_TOOL, WEEKLY_SUBDIR,
};
use super::error::ConfigError;

/// Executable names (or full paths) of the science tools run by the ScienceToolsAdapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub select: PathBuf,
    pub time_filter: PathBuf,
    pub exposure: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            select: PathBuf::from(SELECT_TOOL),
            time_filter: PathBuf::from(TIME_FILTER_TOOL),
            exposure: PathBuf::from(EXPOSURE_TOOL),
        }
    }
}

/// Structure representing the application configuration. Contains pathing and execution information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
///
/// A Config is built once before a batch starts and handed to the pipeline; nothing in the
/// pipeline reads the environment after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub download_path: PathBuf,
    pub data_path: PathBuf,
    pub weekly_path: Option<PathBuf>,
    pub spacecraft_path: Option<PathBuf>,
    pub selections: BTreeMap<String, u32>,
    pub tools: ToolPaths,
    pub stage_timeout_secs: Option<u64>,
    pub resume: bool,
    pub n_workers: i32,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("None"),
            data_path: PathBuf::from("None"),
            weekly_path: None,
            spacecraft_path: None,
            selections: BTreeMap::new(),
            tools: ToolPaths::default(),
            stage_timeout_secs: None,
            resume: false,
            n_workers: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Build a Config from the FERMI_DOWNLOAD_DIR and FERMI_DATA_DIR environment variables.
    /// Everything else takes its default value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let download_path =
            std::env::var_os(DOWNLOAD_DIR_ENV).ok_or(ConfigError::MissingEnv(DOWNLOAD_DIR_ENV))?;
        let data_path =
            std::env::var_os(DATA_DIR_ENV).ok_or(ConfigError::MissingEnv(DATA_DIR_ENV))?;
        Ok(Self {
            download_path: PathBuf::from(download_path),
            data_path: PathBuf::from(data_path),
            ..Default::default()
        })
    }

    /// Directory holding the weekly photon files
    pub fn get_weekly_directory(&self) -> PathBuf {
        match &self.weekly_path {
            Some(path) => path.clone(),
            None => self.download_path.join(WEEKLY_SUBDIR),
        }
    }

    /// The shared spacecraft (instrument-state) file
    pub fn get_spacecraft_file(&self) -> PathBuf {
        match &self.spacecraft_path {
            Some(path) => path.clone(),
            None => self.download_path.join(SPACECRAFT_FILE_NAME),
        }
    }

    /// Working directory of a selection. Provisioned externally.
    pub fn get_work_directory(&self, tag: &str) -> PathBuf {
        self.data_path.join(tag)
    }

    pub fn get_stage_timeout(&self) -> Option<std::time::Duration> {
        self.stage_timeout_secs.map(std::time::Duration::from_secs)
    }

    pub fn is_n_workers_valid(&self) -> bool {
        self.n_workers >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = Config {
            download_path: PathBuf::from("/fermi/download"),
            data_path: PathBuf::from("/fermi/data"),
            ..Default::default()
        };
        assert_eq!(
            config.get_weekly_directory(),
            PathBuf::from("/fermi/download/weekly/photon")
        );
        assert_eq!(
            config.get_spacecraft_file(),
            PathBuf::from("/fermi/download/lat_spacecraft_merged.fits")
        );
        assert_eq!(
            config.get_work_directory("month"),
            PathBuf::from("/fermi/data/month")
        );
    }

    #[test]
    fn test_overrides_win() {
        let config = Config {
            weekly_path: Some(PathBuf::from("/mirror/photon")),
            spacecraft_path: Some(PathBuf::from("/mirror/sc.fits")),
            ..Default::default()
        };
        assert_eq!(config.get_weekly_directory(), PathBuf::from("/mirror/photon"));
        assert_eq!(config.get_spacecraft_file(), PathBuf::from("/mirror/sc.fits"));
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "download_path: /dl\ndata_path: /data\nselections:\n  2week: 2\nn_workers: 3\n",
        )
        .unwrap();
        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.download_path, PathBuf::from("/dl"));
        assert_eq!(config.selections.get("2week"), Some(&2));
        assert_eq!(config.n_workers, 3);
        assert_eq!(config.tools, ToolPaths::default());
        assert!(!config.resume);
        assert!(config.is_n_workers_valid());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::read_config_file(Path::new("/does/not/exist.yaml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }
}
