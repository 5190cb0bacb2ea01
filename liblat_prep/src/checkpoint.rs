use serde::{Deserialize, Serialize};
use std::path::Path;

use super::catalog::SelectionTag;
use super::error::CheckpointError;
use super::stage::EnergyVariant;

/// A stage whose output is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletedStage {
    Manifest,
    Select(EnergyVariant),
    TimeFilter(EnergyVariant),
    Exposure,
}

impl CompletedStage {
    /// Position of the stage in a selection's preparation
    fn order(&self) -> usize {
        let variant_offset = |variant: &EnergyVariant| match variant {
            EnergyVariant::Base => 0,
            EnergyVariant::HighEnergy => 2,
        };
        match self {
            Self::Manifest => 0,
            Self::Select(variant) => 1 + variant_offset(variant),
            Self::TimeFilter(variant) => 2 + variant_offset(variant),
            Self::Exposure => 5,
        }
    }
}

/// Per-selection record of finished stages, kept in the working directory.
///
/// Livetime cubes take hours, so a rerun with resume enabled picks up after the last stage
/// recorded here instead of starting over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub selection: String,
    pub n_weeks: u32,
    pub manifest_len: usize,
    pub completed: Vec<CompletedStage>,
    pub updated_unix: i64,
}

impl Checkpoint {
    /// A fresh checkpoint with nothing completed
    pub fn new(selection: &SelectionTag) -> Self {
        Self {
            selection: selection.name.clone(),
            n_weeks: selection.n_weeks,
            manifest_len: 0,
            completed: Vec::new(),
            updated_unix: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    /// Load the checkpoint at path. Returns None if there isn't one.
    pub fn load(path: &Path) -> Result<Option<Self>, CheckpointError> {
        if !path.exists() {
            return Ok(None);
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(Some(serde_yaml::from_str::<Self>(&yaml_str)?))
    }

    /// Load the checkpoint at path if it belongs to this selection, otherwise start fresh
    pub fn load_for(path: &Path, selection: &SelectionTag) -> Result<Self, CheckpointError> {
        match Self::load(path)? {
            Some(checkpoint)
                if checkpoint.selection == selection.name
                    && checkpoint.n_weeks == selection.n_weeks =>
            {
                Ok(checkpoint)
            }
            Some(_) => {
                log::warn!(
                    "Checkpoint {} was written for a different selection, starting over",
                    path.display()
                );
                Ok(Self::new(selection))
            }
            None => Ok(Self::new(selection)),
        }
    }

    /// Write the checkpoint. Goes through a temporary file so a crash never leaves half a file.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let tmp_path = path.with_extension("yaml.tmp");
        std::fs::write(&tmp_path, yaml_str.as_bytes())?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn is_complete(&self, stage: CompletedStage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn mark(&mut self, stage: CompletedStage) {
        if !self.is_complete(stage) {
            self.completed.push(stage);
        }
        self.updated_unix = time::OffsetDateTime::now_utc().unix_timestamp();
    }

    /// Forget `stage` and every stage after it. Their outputs are about to be rewritten.
    pub fn invalidate_from(&mut self, stage: CompletedStage) {
        self.completed.retain(|done| done.order() < stage.order());
        self.updated_unix = time::OffsetDateTime::now_utc().unix_timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month() -> SelectionTag {
        SelectionTag {
            name: String::from("month"),
            n_weeks: 4,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prep_checkpoint.yaml");
        let mut checkpoint = Checkpoint::new(&month());
        checkpoint.manifest_len = 4;
        checkpoint.mark(CompletedStage::Manifest);
        checkpoint.mark(CompletedStage::Select(EnergyVariant::HighEnergy));
        checkpoint.mark(CompletedStage::Manifest);
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.completed.len(), 2);
        assert!(loaded.is_complete(CompletedStage::Select(EnergyVariant::HighEnergy)));
        assert!(!loaded.is_complete(CompletedStage::Select(EnergyVariant::Base)));
        assert!(!dir.path().join("prep_checkpoint.yaml.tmp").exists());
    }

    #[test]
    fn test_invalidate_from() {
        let mut checkpoint = Checkpoint::new(&month());
        checkpoint.mark(CompletedStage::Manifest);
        checkpoint.mark(CompletedStage::Select(EnergyVariant::Base));
        checkpoint.mark(CompletedStage::TimeFilter(EnergyVariant::Base));
        checkpoint.mark(CompletedStage::Select(EnergyVariant::HighEnergy));
        checkpoint.mark(CompletedStage::TimeFilter(EnergyVariant::HighEnergy));
        checkpoint.mark(CompletedStage::Exposure);

        checkpoint.invalidate_from(CompletedStage::Select(EnergyVariant::HighEnergy));
        assert_eq!(
            checkpoint.completed,
            vec![
                CompletedStage::Manifest,
                CompletedStage::Select(EnergyVariant::Base),
                CompletedStage::TimeFilter(EnergyVariant::Base),
            ]
        );

        checkpoint.invalidate_from(CompletedStage::Manifest);
        assert!(checkpoint.completed.is_empty());
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prep_checkpoint.yaml");
        assert!(Checkpoint::load(&path).unwrap().is_none());
        let fresh = Checkpoint::load_for(&path, &month()).unwrap();
        assert!(fresh.completed.is_empty());
    }

    #[test]
    fn test_other_selection_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prep_checkpoint.yaml");
        let mut old = Checkpoint::new(&SelectionTag {
            name: String::from("month"),
            n_weeks: 5,
        });
        old.mark(CompletedStage::Exposure);
        old.save(&path).unwrap();

        let checkpoint = Checkpoint::load_for(&path, &month()).unwrap();
        assert!(!checkpoint.is_complete(CompletedStage::Exposure));
        assert_eq!(checkpoint.n_weeks, 4);
    }
}
