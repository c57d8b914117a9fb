use ec_core::{
    CaseId, ChartControlAllocation, ComparisonCase, ModuleType, RunToken, SavedCaseData,
};
use ec_store::SavedBatch;
use serde_json::Value;

/// New persisted identity for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseIdAssignment {
    /// Detach from any saved case but keep the column's data.
    Unsaved,
    /// The column now mirrors this saved case (after a save).
    Saved(CaseId),
    /// Blank the column: fresh session id, no data.
    Clear,
}

/// Partial update of the loaded batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPatch {
    pub name: Option<String>,
    pub case_ids: Option<Vec<CaseId>>,
    pub is_focus_link_active: Option<bool>,
}

/// A case snapshot read from persistent or demo storage, ready to occupy
/// a column.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCase {
    pub saved_case_id: Option<CaseId>,
    pub name: String,
    pub module_type: ModuleType,
    pub data: SavedCaseData,
    pub is_demo: bool,
}

/// Every mutation of [`super::ModuleState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetColumnFullscreen(bool),
    SetNumChartCols(u8),
    AddComparisonCol,
    RemoveComparisonCaseAtIndex(usize),
    SetIsCaseLoadingAtIndex {
        index: usize,
        value: bool,
    },
    SetComparisonCaseIdAtIndex {
        index: usize,
        value: CaseIdAssignment,
    },
    /// Replace every column with the batch's members.
    LoadBatch {
        batch: SavedBatch,
        cases: Vec<LoadedCase>,
    },
    SetBatch(Option<SavedBatch>),
    SetBatchProps(BatchPatch),
    ResetComparisonCasesToOneEmptyCase,
    SetSubModuleType(Option<String>),
    EnableErroneousInputHighlightingAtIndex(usize),

    /// Replace the columns with loaded cases (no batch).
    LoadCasesIntoColumns(Vec<LoadedCase>),
    SetInputValueAtIndex {
        index: usize,
        name: String,
        value: String,
    },
    SetCaseNameAtIndex {
        index: usize,
        name: String,
    },
    SetCustomDataAtIndex {
        index: usize,
        custom_data: Value,
    },
    ToggleFocusedInputAtIndex {
        index: usize,
        name: String,
    },
    SetFocusModeActiveAtIndex {
        index: usize,
        value: bool,
    },
    SetChartControlAllocation(ChartControlAllocation),
    SetSidebarOpen(bool),
    SetYAxisLocked(bool),

    /// Mark the column as running and bump its run generation.
    RunStarted {
        index: usize,
    },
    /// A finished run, stamped with the version and sub-module it was
    /// started under.
    RunSucceeded {
        token: RunToken,
        result: Value,
        fingerprint: String,
        module_version: u32,
        sub_module_type: Option<String>,
    },
    RunFailed {
        token: RunToken,
        message: String,
    },
}

impl LoadedCase {
    pub(crate) fn into_case(self, session: ec_core::SessionId) -> ComparisonCase {
        ComparisonCase::from_saved(
            session,
            self.saved_case_id,
            self.name,
            self.data,
            self.is_demo,
        )
    }
}
