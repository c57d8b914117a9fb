//! Comparison state: the in-memory columns, loaded batch and screen flags
//! of one module screen.
//!
//! All mutation goes through [`ModuleState::reduce`] with an [`Action`];
//! [`ComparisonStore`] wraps the state behind a read API and a single
//! `dispatch` entry point.

mod action;
mod reducer;
mod store;

pub use action::{Action, BatchPatch, CaseIdAssignment, LoadedCase};
pub use store::{ComparisonStore, RunTicket};

use ec_core::{
    CaseId, ChartControlAllocation, ComparisonCase, InputValues, ModuleConfig, SavedCaseData,
    SessionId,
};
use ec_store::SavedBatch;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub comparison_cases: Vec<ComparisonCase>,
    pub max_comparison_cases: usize,
    pub allow_comparisons: bool,
    pub allow_case_duplication: bool,
    pub show_run_all_button: bool,
    pub allow_chart_tiling: bool,
    pub num_chart_cols: u8,
    pub chart_control_allocation: ChartControlAllocation,
    pub is_any_column_fullscreened: bool,
    pub is_sidebar_open: bool,
    pub is_y_axis_locked: bool,
    pub saved_batch: Option<SavedBatch>,
    pub sub_module_type: Option<String>,
    /// Version results must carry to be displayable.
    pub module_version: u32,
    next_session_id: SessionId,
    config: ModuleConfig,
}

impl ModuleState {
    /// Fresh state: one blank column.
    pub fn new(config: &ModuleConfig) -> Self {
        let mut state = Self {
            comparison_cases: Vec::new(),
            max_comparison_cases: config.effective_max_cases(),
            allow_comparisons: config.allow_comparisons,
            allow_case_duplication: config.allow_case_duplication,
            show_run_all_button: config.show_run_all_button,
            allow_chart_tiling: config.allow_chart_tiling,
            num_chart_cols: config.num_chart_cols.max(1),
            chart_control_allocation: config.chart_control_allocation,
            is_any_column_fullscreened: false,
            is_sidebar_open: true,
            is_y_axis_locked: false,
            saved_batch: None,
            sub_module_type: None,
            module_version: config.module_version,
            next_session_id: SessionId::FIRST,
            config: config.clone(),
        };
        let first = state.fresh_case();
        state.comparison_cases.push(first);
        state
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn cases(&self) -> &[ComparisonCase] {
        &self.comparison_cases
    }

    pub fn case(&self, index: usize) -> Option<&ComparisonCase> {
        self.comparison_cases.get(index)
    }

    pub fn index_of(&self, session: SessionId) -> Option<usize> {
        self.comparison_cases.iter().position(|c| c.id == session)
    }

    pub fn is_comparison_mode(&self) -> bool {
        self.comparison_cases.len() > 1
    }

    pub fn can_add_column(&self) -> bool {
        self.comparison_cases.len() < self.max_comparison_cases
    }

    /// Sidebar is hidden while any column is fullscreen.
    pub fn is_sidebar_visible(&self) -> bool {
        self.is_sidebar_open && !self.is_any_column_fullscreened
    }

    /// Saved case ids currently shown, in column order; `None` for columns
    /// without a saved case.
    pub fn saved_case_ids(&self) -> Vec<Option<CaseId>> {
        self.comparison_cases.iter().map(|c| c.saved_case_id).collect()
    }

    /// True when the columns no longer match the loaded batch's members,
    /// i.e. the batch needs an explicit update to reflect the screen.
    pub fn batch_membership_changed(&self) -> bool {
        let Some(batch) = &self.saved_batch else {
            return false;
        };
        let shown: Vec<Option<CaseId>> = self.saved_case_ids();
        shown.len() != batch.case_ids.len()
            || shown
                .iter()
                .zip(&batch.case_ids)
                .any(|(shown, member)| *shown != Some(*member))
    }

    /// Inputs the column would run with: its own, or the module defaults.
    pub fn effective_inputs(&self, index: usize) -> Option<InputValues> {
        self.case(index).map(|case| match &case.data {
            Some(data) => data.input_values.clone(),
            None => self.config.default_input_values(),
        })
    }

    fn next_session(&mut self) -> SessionId {
        let id = self.next_session_id;
        self.next_session_id = id.next();
        id
    }

    fn fresh_case(&mut self) -> ComparisonCase {
        ComparisonCase::new(self.next_session())
    }

    fn blank_data(&self) -> SavedCaseData {
        SavedCaseData {
            sub_module_type: self.sub_module_type.clone(),
            ..SavedCaseData::with_inputs(self.config.default_input_values(), self.module_version)
        }
    }
}
