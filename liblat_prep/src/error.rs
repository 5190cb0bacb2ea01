use std::path::PathBuf;
use thiserror::Error;

use super::adapter::ToolStage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Selection {0} doesn't exist in the selection catalog")]
    UnknownSelection(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Could not index weekly files because directory {0:?} does not exist")]
    BadSourcePath(PathBuf),
    #[error("WeeklyFileIndex failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} could not launch {program}: {source}")]
    Launch {
        stage: ToolStage,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} exited with {status} -- parameters: {params} -- stderr: {stderr}")]
    ToolFailed {
        stage: ToolStage,
        params: String,
        status: String,
        stderr: String,
    },
    #[error("{stage} did not finish within {timeout_secs} s and was killed -- parameters: {params}")]
    TimedOut {
        stage: ToolStage,
        params: String,
        timeout_secs: u64,
    },
    #[error("{stage} reported success but did not produce {path:?}")]
    MissingOutput { stage: ToolStage, path: PathBuf },
    #[error("{stage} failed due to IO error while waiting on the tool: {source}")]
    IOError {
        stage: ToolStage,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Checkpoint failed to convert to/from yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline skipped selection due to catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Pipeline could not find working directory {0:?}; it must be created before preparing data")]
    MissingWorkDir(PathBuf),
    #[error("Pipeline failed due to WeeklyFileIndex error: {0}")]
    Index(#[from] IndexError),
    #[error("Pipeline failed due to analysis stage error: {0}")]
    Stage(#[from] StageError),
    #[error("Pipeline failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
