//! Read-only demo dataset: fixed cases and batches shipped with the app.

use std::path::Path;

use ec_core::{BatchId, CaseId};
use serde::{Deserialize, Serialize};

use crate::StoreResult;
use crate::records::{SavedBatch, SavedCase};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoLibrary {
    #[serde(default)]
    pub cases: Vec<SavedCase>,
    #[serde(default)]
    pub batches: Vec<SavedBatch>,
}

impl DemoLibrary {
    pub fn from_yaml_str(content: &str) -> StoreResult<Self> {
        let mut library: DemoLibrary = serde_yaml::from_str(content)?;
        for case in &mut library.cases {
            case.is_demo = true;
        }
        for batch in &mut library.batches {
            batch.is_demo = true;
        }
        Ok(library)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn case(&self, id: CaseId) -> Option<&SavedCase> {
        self.cases.iter().find(|c| c.id == Some(id))
    }

    pub fn batch(&self, id: BatchId) -> Option<&SavedBatch> {
        self.batches.iter().find(|b| b.id == Some(id))
    }

    /// Cases for `ids` in request order; unknown ids are skipped.
    pub fn cases_for(&self, ids: &[CaseId]) -> Vec<SavedCase> {
        ids.iter().filter_map(|id| self.case(*id).cloned()).collect()
    }
}
