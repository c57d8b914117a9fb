//! Persisted record types and the collections they live in.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use ec_core::{BatchId, CaseId, ModuleType, SavedCaseData, SettingsId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    SavedCases,
    SavedBatches,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::SavedCases,
        Collection::SavedBatches,
        Collection::Settings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::SavedCases => "savedCases",
            Collection::SavedBatches => "savedBatches",
            Collection::Settings => "settings",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type stored in one of the named collections, keyed by a numeric id.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + 'static {
    type Key: Copy + Into<u32> + TryFrom<u32> + fmt::Debug + Send;

    const COLLECTION: Collection;

    fn key(&self) -> Option<Self::Key>;

    fn set_key(&mut self, key: Self::Key);
}

/// Records the user sees in ordered, named lists.
pub trait Listed: Record {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    fn sort_index(&self) -> u32;

    fn set_sort_index(&mut self, sort_index: u32);

    fn touch(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CaseId>,
    pub name: String,
    pub module_type: ModuleType,
    #[serde(default)]
    pub data: SavedCaseData,
    #[serde(default)]
    pub sort_index: u32,
    #[serde(default)]
    pub is_demo: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl SavedCase {
    pub fn new(name: impl Into<String>, module_type: ModuleType, data: SavedCaseData) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            module_type,
            data,
            sort_index: 0,
            is_demo: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for SavedCase {
    type Key = CaseId;
    const COLLECTION: Collection = Collection::SavedCases;

    fn key(&self) -> Option<CaseId> {
        self.id
    }

    fn set_key(&mut self, key: CaseId) {
        self.id = Some(key);
    }
}

impl Listed for SavedCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn sort_index(&self) -> u32 {
        self.sort_index
    }

    fn set_sort_index(&mut self, sort_index: u32) {
        self.sort_index = sort_index;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BatchId>,
    pub name: String,
    pub module_type: ModuleType,
    /// Ordered: the display order of the columns when loaded.
    #[serde(default)]
    pub case_ids: Vec<CaseId>,
    #[serde(default)]
    pub is_demo: bool,
    #[serde(default)]
    pub is_focus_link_active: bool,
    #[serde(default)]
    pub sort_index: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl SavedBatch {
    pub fn new(name: impl Into<String>, module_type: ModuleType, case_ids: Vec<CaseId>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            module_type,
            case_ids,
            is_demo: false,
            is_focus_link_active: false,
            sort_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn references(&self, case_id: CaseId) -> bool {
        self.case_ids.contains(&case_id)
    }
}

impl Record for SavedBatch {
    type Key = BatchId;
    const COLLECTION: Collection = Collection::SavedBatches;

    fn key(&self) -> Option<BatchId> {
        self.id
    }

    fn set_key(&mut self, key: BatchId) {
        self.id = Some(key);
    }
}

impl Listed for SavedBatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn sort_index(&self) -> u32 {
        self.sort_index
    }

    fn set_sort_index(&mut self, sort_index: u32) {
        self.sort_index = sort_index;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Single-row settings record (always stored under [`SettingsId::FIRST`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SettingsId>,
    #[serde(default)]
    pub lock_y_axes: bool,
    #[serde(default = "default_show_sidebar")]
    pub show_sidebar: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chart_cols: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_show_sidebar() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            id: None,
            lock_y_axes: false,
            show_sidebar: default_show_sidebar(),
            num_chart_cols: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Record for UserSettings {
    type Key = SettingsId;
    const COLLECTION: Collection = Collection::Settings;

    fn key(&self) -> Option<SettingsId> {
        self.id
    }

    fn set_key(&mut self, key: SettingsId) {
        self.id = Some(key);
    }
}
