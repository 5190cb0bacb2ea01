use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::constants::WEEKLY_FILE_EXTENSION;
use super::error::IndexError;

/// The ordered list of weekly files selected for one selection.
///
/// Written to the selection's working directory as a newline delimited list of absolute
/// paths, which the select tool reads with the `@file` syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyFileManifest {
    files: Vec<PathBuf>,
    total_size_bytes: u64,
}

impl WeeklyFileManifest {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get_total_data_size(&self) -> u64 {
        self.total_size_bytes
    }

    /// Write the manifest to disk, replacing whatever was there
    pub fn write(&self, path: &Path) -> Result<(), IndexError> {
        let mut contents = String::new();
        for file in self.files.iter() {
            contents.push_str(&file.to_string_lossy());
            contents.push('\n');
        }
        let mut manifest_file = File::create(path)?;
        manifest_file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Load a manifest written by a previous run
    pub fn read(path: &Path) -> Result<Self, IndexError> {
        let contents = std::fs::read_to_string(path)?;
        let files: Vec<PathBuf> = contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        let total_size_bytes = files
            .iter()
            .fold(0, |sum, path| sum + path.metadata().map(|m| m.len()).unwrap_or(0));
        Ok(Self {
            files,
            total_size_bytes,
        })
    }
}

/// WeeklyFileIndex picks the weekly photon files that go into a selection.
///
/// There is no date parsing here. The weekly files are named `lat_photon_weekly_wNNN_...`
/// with a zero padded week number, so ascending file name order is chronological order.
/// If the naming convention ever stops being date-monotonic, so does the manifest.
#[derive(Debug, Clone)]
pub struct WeeklyFileIndex {
    source_path: PathBuf,
}

impl WeeklyFileIndex {
    pub fn new(source_path: &Path) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
        }
    }

    /// Build the manifest of the first `limit` weekly files (chronologically)
    pub fn build(&self, limit: u32) -> Result<WeeklyFileManifest, IndexError> {
        if !self.source_path.is_dir() {
            return Err(IndexError::BadSourcePath(self.source_path.clone()));
        }
        let source_path = std::path::absolute(&self.source_path)?;

        let mut file_list: Vec<PathBuf> = Vec::new();
        for item in source_path.read_dir()? {
            let item_path = item?.path();
            if item_path.is_file() && Self::is_weekly_file(&item_path) {
                file_list.push(item_path);
            }
        }

        file_list.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        file_list.truncate(limit as usize);

        let total_size_bytes = file_list
            .iter()
            .fold(0, |sum, path| sum + path.metadata().map(|m| m.len()).unwrap_or(0));

        Ok(WeeklyFileManifest {
            files: file_list,
            total_size_bytes,
        })
    }

    fn is_weekly_file(path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == WEEKLY_FILE_EXTENSION)
    }
}
