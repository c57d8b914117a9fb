use ec_core::{ComparisonCase, RunToken};

use super::ModuleState;
use super::action::{Action, BatchPatch, CaseIdAssignment, LoadedCase};

impl ModuleState {
    /// Apply one action. Returns whether anything changed.
    ///
    /// Actions naming a column that does not exist, or editing a demo
    /// column, are logged and ignored.
    pub fn reduce(&mut self, action: Action) -> bool {
        match action {
            Action::SetColumnFullscreen(value) => {
                replace(&mut self.is_any_column_fullscreened, value)
            }
            Action::SetNumChartCols(value) => {
                if !self.allow_chart_tiling || value == 0 {
                    tracing::debug!(value, "chart tiling unavailable, ignoring column count");
                    return false;
                }
                replace(&mut self.num_chart_cols, value)
            }
            Action::AddComparisonCol => {
                if !self.can_add_column() {
                    tracing::debug!(max = self.max_comparison_cases, "comparison columns full");
                    return false;
                }
                let case = self.fresh_case();
                self.comparison_cases.push(case);
                true
            }
            Action::RemoveComparisonCaseAtIndex(index) => {
                if !self.has_column(index) {
                    return false;
                }
                self.comparison_cases.remove(index);
                if self.comparison_cases.is_empty() {
                    let case = self.fresh_case();
                    self.comparison_cases.push(case);
                }
                true
            }
            Action::SetIsCaseLoadingAtIndex { index, value } => match self.column(index) {
                Some(case) => replace(&mut case.is_loading, value),
                None => false,
            },
            Action::SetComparisonCaseIdAtIndex { index, value } => {
                self.assign_case_id(index, value)
            }
            Action::LoadBatch { batch, cases } => {
                let link = batch.is_focus_link_active;
                self.replace_columns(cases);
                for case in &mut self.comparison_cases {
                    case.is_focus_mode_active = link;
                }
                self.saved_batch = Some(batch);
                true
            }
            Action::SetBatch(batch) => replace(&mut self.saved_batch, batch),
            Action::SetBatchProps(patch) => self.patch_batch(patch),
            Action::ResetComparisonCasesToOneEmptyCase => {
                let already_blank = self.comparison_cases.len() == 1
                    && self.comparison_cases[0].is_pristine()
                    && self.saved_batch.is_none();
                if already_blank {
                    return false;
                }
                let case = self.fresh_case();
                self.comparison_cases = vec![case];
                self.saved_batch = None;
                true
            }
            Action::SetSubModuleType(value) => {
                if self.sub_module_type == value {
                    return false;
                }
                match self.config.version_for(value.as_deref()) {
                    Ok(version) => {
                        self.sub_module_type = value;
                        self.module_version = version;
                        true
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "ignoring sub-module switch");
                        false
                    }
                }
            }
            Action::EnableErroneousInputHighlightingAtIndex(index) => match self.column(index) {
                Some(case) => replace(&mut case.highlight_erroneous_inputs, true),
                None => false,
            },
            Action::LoadCasesIntoColumns(cases) => {
                self.replace_columns(cases);
                self.saved_batch = None;
                true
            }
            Action::SetInputValueAtIndex { index, name, value } => {
                self.set_input_value(index, &name, &value)
            }
            Action::SetCaseNameAtIndex { index, name } => {
                let Some(case) = self.editable_column(index) else {
                    return false;
                };
                case.name = Some(name);
                case.is_unsaved = true;
                true
            }
            Action::SetCustomDataAtIndex { index, custom_data } => {
                let blank = self.blank_data();
                let Some(case) = self.editable_column(index) else {
                    return false;
                };
                case.data.get_or_insert(blank).custom_data = custom_data;
                case.is_unsaved = true;
                true
            }
            Action::ToggleFocusedInputAtIndex { index, name } => {
                self.toggle_focused_input(index, &name)
            }
            Action::SetFocusModeActiveAtIndex { index, value } => match self.column(index) {
                Some(case) => replace(&mut case.is_focus_mode_active, value),
                None => false,
            },
            Action::SetChartControlAllocation(value) => {
                replace(&mut self.chart_control_allocation, value)
            }
            Action::SetSidebarOpen(value) => replace(&mut self.is_sidebar_open, value),
            Action::SetYAxisLocked(value) => replace(&mut self.is_y_axis_locked, value),
            Action::RunStarted { index } => {
                let blank = self.blank_data();
                let Some(case) = self.column(index) else {
                    return false;
                };
                case.run_generation = case.run_generation.wrapping_add(1);
                case.is_loading = true;
                case.error = None;
                case.data.get_or_insert(blank);
                true
            }
            Action::RunSucceeded {
                token,
                result,
                fingerprint,
                module_version,
                sub_module_type,
            } => {
                let blank = self.blank_data();
                let Some(case) = self.run_target(token) else {
                    return false;
                };
                let data = case.data.get_or_insert(blank);
                data.analysis_result = Some(result);
                data.module_version = module_version;
                data.sub_module_type = sub_module_type;
                case.last_run_fingerprint = Some(fingerprint);
                case.is_loading = false;
                case.error = None;
                case.highlight_erroneous_inputs = false;
                true
            }
            Action::RunFailed { token, message } => {
                let Some(case) = self.run_target(token) else {
                    return false;
                };
                if let Some(data) = case.data.as_mut() {
                    data.analysis_result = None;
                }
                case.is_loading = false;
                case.error = Some(message);
                true
            }
        }
    }

    fn has_column(&self, index: usize) -> bool {
        let ok = index < self.comparison_cases.len();
        if !ok {
            tracing::warn!(index, len = self.comparison_cases.len(), "no column at index");
        }
        ok
    }

    fn column(&mut self, index: usize) -> Option<&mut ComparisonCase> {
        if !self.has_column(index) {
            return None;
        }
        self.comparison_cases.get_mut(index)
    }

    fn editable_column(&mut self, index: usize) -> Option<&mut ComparisonCase> {
        let case = self.column(index)?;
        if case.is_demo {
            tracing::debug!(index, "demo columns are read-only");
            return None;
        }
        Some(case)
    }

    /// The column a run result belongs to, if it still exists and the run
    /// is its latest.
    fn run_target(&mut self, token: RunToken) -> Option<&mut ComparisonCase> {
        let Some(case) = self.comparison_cases.iter_mut().find(|c| c.id == token.session) else {
            tracing::debug!(session = %token.session, "discarding result for a column that no longer exists");
            return None;
        };
        if case.run_generation != token.generation || !case.is_loading {
            tracing::debug!(
                session = %token.session,
                generation = token.generation,
                current = case.run_generation,
                "discarding superseded result"
            );
            return None;
        }
        Some(case)
    }

    fn assign_case_id(&mut self, index: usize, value: CaseIdAssignment) -> bool {
        if !self.has_column(index) {
            return false;
        }
        match value {
            CaseIdAssignment::Saved(id) => {
                let case = &mut self.comparison_cases[index];
                case.saved_case_id = Some(id);
                case.is_unsaved = false;
                case.is_demo = false;
            }
            CaseIdAssignment::Unsaved => {
                let case = &mut self.comparison_cases[index];
                case.saved_case_id = None;
                case.is_demo = false;
                case.is_unsaved = case.data.is_some();
            }
            CaseIdAssignment::Clear => {
                // new session id: any in-flight run for the old one is dropped
                let fresh = self.fresh_case();
                self.comparison_cases[index] = fresh;
            }
        }
        true
    }

    fn replace_columns(&mut self, cases: Vec<LoadedCase>) {
        if cases.len() > self.max_comparison_cases {
            tracing::warn!(
                count = cases.len(),
                max = self.max_comparison_cases,
                "too many cases for this module, extra columns dropped"
            );
        }
        let mut columns = Vec::with_capacity(cases.len().min(self.max_comparison_cases));
        for loaded in cases.into_iter().take(self.max_comparison_cases) {
            let session = self.next_session();
            columns.push(loaded.into_case(session));
        }
        if columns.is_empty() {
            columns.push(self.fresh_case());
        }
        self.comparison_cases = columns;
    }

    fn patch_batch(&mut self, patch: BatchPatch) -> bool {
        let max = self.max_comparison_cases;
        let Some(batch) = self.saved_batch.as_mut() else {
            tracing::debug!("no batch loaded, ignoring batch patch");
            return false;
        };
        if let Some(case_ids) = &patch.case_ids {
            if case_ids.len() > max {
                tracing::warn!(
                    count = case_ids.len(),
                    max,
                    "batch patch has too many cases, ignoring"
                );
                return false;
            }
        }
        let mut changed = false;
        if let Some(name) = patch.name {
            changed |= replace(&mut batch.name, name);
        }
        if let Some(case_ids) = patch.case_ids {
            changed |= replace(&mut batch.case_ids, case_ids);
        }
        if let Some(link) = patch.is_focus_link_active {
            changed |= replace(&mut batch.is_focus_link_active, link);
        }
        changed
    }

    fn set_input_value(&mut self, index: usize, name: &str, value: &str) -> bool {
        let blank = self.blank_data();
        let Some(case) = self.editable_column(index) else {
            return false;
        };
        write_input(case, &blank, name, value);
        if !case.is_input_linked(name) {
            return true;
        }

        let linked_from = case.id;
        for other in self
            .comparison_cases
            .iter_mut()
            .filter(|c| c.id != linked_from && !c.is_demo && c.is_focus_mode_active)
        {
            write_input(other, &blank, name, value);
        }
        true
    }

    fn toggle_focused_input(&mut self, index: usize, name: &str) -> bool {
        let Some(case) = self.column(index) else {
            return false;
        };
        let focused = case.toggle_focused_input(name);
        if !case.is_focus_mode_active {
            return true;
        }

        // keep linked columns on the same focus set
        let source = case.id;
        for other in self
            .comparison_cases
            .iter_mut()
            .filter(|c| c.id != source && c.is_focus_mode_active)
        {
            let has = other.focused_inputs.iter().any(|n| n == name);
            if has != focused {
                other.toggle_focused_input(name);
            }
        }
        true
    }
}

fn write_input(
    case: &mut ComparisonCase,
    blank: &ec_core::SavedCaseData,
    name: &str,
    value: &str,
) {
    let data = case.data.get_or_insert_with(|| blank.clone());
    data.input_values.insert(name.to_string(), value.to_string());
    case.is_unsaved = true;
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
