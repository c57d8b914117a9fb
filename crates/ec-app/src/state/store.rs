use ec_core::{ComparisonCase, InputValues, ModuleConfig, RunToken};

use super::ModuleState;
use super::action::Action;

/// Everything a fetch needs, captured when the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTicket {
    pub index: usize,
    pub token: RunToken,
    pub input_values: InputValues,
    pub module_version: u32,
    pub sub_module_type: Option<String>,
}

/// Single-writer owner of a [`ModuleState`].
#[derive(Debug, Clone)]
pub struct ComparisonStore {
    state: ModuleState,
    revision: u64,
}

impl ComparisonStore {
    pub fn new(config: &ModuleConfig) -> Self {
        Self {
            state: ModuleState::new(config),
            revision: 0,
        }
    }

    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    pub fn cases(&self) -> &[ComparisonCase] {
        self.state.cases()
    }

    pub fn is_comparison_mode(&self) -> bool {
        self.state.is_comparison_mode()
    }

    /// Bumped on every effective change; lets readers skip unchanged state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dispatch(&mut self, action: Action) -> bool {
        let changed = self.state.reduce(action);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Mark column `index` as running and capture its run token.
    pub fn begin_run(&mut self, index: usize) -> Option<RunTicket> {
        if !self.dispatch(Action::RunStarted { index }) {
            return None;
        }
        let case = self.state.case(index)?;
        let input_values = case
            .data
            .as_ref()
            .map(|d| d.input_values.clone())
            .unwrap_or_default();
        Some(RunTicket {
            index,
            token: case.run_token(),
            input_values,
            module_version: self.state.module_version,
            sub_module_type: self.state.sub_module_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BatchPatch, CaseIdAssignment, LoadedCase};
    use ec_core::{CaseId, CaseStatus, InputDef, SavedCaseData, SessionId, SubModuleDef};
    use ec_store::SavedBatch;
    use serde_json::json;

    fn config() -> ModuleConfig {
        let mut config = ModuleConfig::new("solar", "/api/solar");
        config.inputs = vec![InputDef {
            name: "capacity_kw".to_string(),
            default_value: "100".to_string(),
            is_visible: true,
            required: true,
            min: None,
            max: None,
        }];
        config.sub_modules = vec![SubModuleDef {
            sub_module_type: "rooftop".to_string(),
            module_version: 7,
        }];
        config
    }

    fn loaded(id: u32, name: &str) -> LoadedCase {
        LoadedCase {
            saved_case_id: CaseId::new(id),
            name: name.to_string(),
            module_type: ec_core::ModuleType::new("solar"),
            data: SavedCaseData::with_inputs(InputValues::new(), 1),
            is_demo: false,
        }
    }

    fn session_ids(store: &ComparisonStore) -> Vec<u32> {
        store.cases().iter().map(|c| c.id.get()).collect()
    }

    #[test]
    fn starts_with_one_blank_column() {
        let store = ComparisonStore::new(&config());
        assert_eq!(session_ids(&store), vec![1]);
        assert!(store.cases()[0].is_pristine());
        assert!(!store.is_comparison_mode());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn add_and_remove_walkthrough() {
        let mut store = ComparisonStore::new(&config());
        assert!(store.dispatch(Action::AddComparisonCol));
        assert!(store.dispatch(Action::AddComparisonCol));
        assert_eq!(session_ids(&store), vec![1, 2, 3]);
        assert!(store.is_comparison_mode());

        // at the limit of 3
        assert!(!store.dispatch(Action::AddComparisonCol));

        assert!(store.dispatch(Action::RemoveComparisonCaseAtIndex(1)));
        assert_eq!(session_ids(&store), vec![1, 3]);

        assert!(store.dispatch(Action::RemoveComparisonCaseAtIndex(0)));
        assert_eq!(session_ids(&store), vec![3]);
        assert!(!store.is_comparison_mode());

        assert!(store.dispatch(Action::RemoveComparisonCaseAtIndex(0)));
        assert_eq!(store.cases().len(), 1);
        assert!(store.cases()[0].is_pristine());
        assert_eq!(session_ids(&store), vec![4]);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut store = ComparisonStore::new(&config());
        assert!(!store.dispatch(Action::RemoveComparisonCaseAtIndex(5)));
        assert!(!store.dispatch(Action::EnableErroneousInputHighlightingAtIndex(2)));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn comparisons_disabled_blocks_new_columns() {
        let mut cfg = config();
        cfg.allow_comparisons = false;
        let mut store = ComparisonStore::new(&cfg);
        assert!(!store.dispatch(Action::AddComparisonCol));
        assert_eq!(store.cases().len(), 1);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::AddComparisonCol);
        store.dispatch(Action::SetInputValueAtIndex {
            index: 0,
            name: "capacity_kw".to_string(),
            value: "5".to_string(),
        });

        assert!(store.dispatch(Action::ResetComparisonCasesToOneEmptyCase));
        let once = store.state().clone();
        assert!(!store.dispatch(Action::ResetComparisonCasesToOneEmptyCase));
        assert_eq!(store.state(), &once);
        assert_eq!(once.cases().len(), 1);
        assert!(once.cases()[0].is_pristine());
    }

    #[test]
    fn chart_tiling_gate() {
        let mut store = ComparisonStore::new(&config());
        assert!(!store.dispatch(Action::SetNumChartCols(2)));

        let mut cfg = config();
        cfg.allow_chart_tiling = true;
        let mut store = ComparisonStore::new(&cfg);
        assert!(store.dispatch(Action::SetNumChartCols(2)));
        assert!(!store.dispatch(Action::SetNumChartCols(0)));
        assert_eq!(store.state().num_chart_cols, 2);
    }

    #[test]
    fn fullscreen_hides_sidebar() {
        let mut store = ComparisonStore::new(&config());
        assert!(store.state().is_sidebar_visible());
        store.dispatch(Action::SetColumnFullscreen(true));
        assert!(!store.state().is_sidebar_visible());
        store.dispatch(Action::SetColumnFullscreen(false));
        store.dispatch(Action::SetSidebarOpen(false));
        assert!(!store.state().is_sidebar_visible());
    }

    #[test]
    fn case_id_assignment() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::SetInputValueAtIndex {
            index: 0,
            name: "capacity_kw".to_string(),
            value: "5".to_string(),
        });
        assert!(store.cases()[0].is_unsaved);

        store.dispatch(Action::SetComparisonCaseIdAtIndex {
            index: 0,
            value: CaseIdAssignment::Saved(CaseId::new(12).unwrap()),
        });
        assert_eq!(store.cases()[0].saved_case_id, CaseId::new(12));
        assert!(!store.cases()[0].is_unsaved);

        store.dispatch(Action::SetComparisonCaseIdAtIndex {
            index: 0,
            value: CaseIdAssignment::Unsaved,
        });
        assert!(store.cases()[0].saved_case_id.is_none());
        assert!(store.cases()[0].is_unsaved);

        let before = store.cases()[0].id;
        store.dispatch(Action::SetComparisonCaseIdAtIndex {
            index: 0,
            value: CaseIdAssignment::Clear,
        });
        assert_ne!(store.cases()[0].id, before);
        assert!(store.cases()[0].data.is_none());
    }

    #[test]
    fn stale_result_is_discarded_after_clear() {
        let mut store = ComparisonStore::new(&config());
        let ticket = store.begin_run(0).unwrap();
        assert!(store.cases()[0].is_loading);

        store.dispatch(Action::SetComparisonCaseIdAtIndex {
            index: 0,
            value: CaseIdAssignment::Clear,
        });

        let applied = store.dispatch(Action::RunSucceeded {
            token: ticket.token,
            result: json!({"npv": 1}),
            fingerprint: "f".to_string(),
            module_version: ticket.module_version,
            sub_module_type: ticket.sub_module_type.clone(),
        });
        assert!(!applied);
        assert!(store.cases()[0].data.is_none());
        assert!(!store.cases()[0].is_loading);
    }

    #[test]
    fn superseded_run_is_discarded() {
        let mut store = ComparisonStore::new(&config());
        let first = store.begin_run(0).unwrap();
        let second = store.begin_run(0).unwrap();
        assert_ne!(first.token, second.token);

        assert!(!store.dispatch(Action::RunSucceeded {
            token: first.token,
            result: json!(1),
            fingerprint: "a".to_string(),
            module_version: first.module_version,
            sub_module_type: first.sub_module_type.clone(),
        }));
        assert!(store.cases()[0].is_loading);

        assert!(store.dispatch(Action::RunSucceeded {
            token: second.token,
            result: json!(2),
            fingerprint: "b".to_string(),
            module_version: second.module_version,
            sub_module_type: second.sub_module_type.clone(),
        }));
        assert_eq!(store.cases()[0].analysis_result(), Some(&json!(2)));
        assert_eq!(store.cases()[0].status(1, None), CaseStatus::Ready);
    }

    #[test]
    fn result_follows_column_when_it_moves() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::AddComparisonCol);
        let ticket = store.begin_run(1).unwrap();
        store.dispatch(Action::RemoveComparisonCaseAtIndex(0));

        assert!(store.dispatch(Action::RunSucceeded {
            token: ticket.token,
            result: json!({"lcoe": 41.2}),
            fingerprint: "x".to_string(),
            module_version: ticket.module_version,
            sub_module_type: ticket.sub_module_type.clone(),
        }));
        assert_eq!(store.cases()[0].id, ticket.token.session);
        assert!(store.cases()[0].analysis_result().is_some());
    }

    #[test]
    fn failure_only_touches_its_column() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::AddComparisonCol);
        let a = store.begin_run(0).unwrap();
        let b = store.begin_run(1).unwrap();

        store.dispatch(Action::RunFailed {
            token: a.token,
            message: "502 Bad Gateway".to_string(),
        });
        assert_eq!(store.cases()[0].status(1, None), CaseStatus::Failed);
        assert!(store.cases()[1].is_loading);

        store.dispatch(Action::RunSucceeded {
            token: b.token,
            result: json!(true),
            fingerprint: "b".to_string(),
            module_version: b.module_version,
            sub_module_type: b.sub_module_type.clone(),
        });
        assert_eq!(store.cases()[1].status(1, None), CaseStatus::Ready);
        assert!(store.cases()[0].analysis_result().is_none());
    }

    #[test]
    fn sub_module_switch_makes_results_stale() {
        let mut store = ComparisonStore::new(&config());
        let ticket = store.begin_run(0).unwrap();
        store.dispatch(Action::RunSucceeded {
            token: ticket.token,
            result: json!(1),
            fingerprint: "a".to_string(),
            module_version: ticket.module_version,
            sub_module_type: ticket.sub_module_type.clone(),
        });

        assert!(store.dispatch(Action::SetSubModuleType(Some("rooftop".to_string()))));
        let state = store.state();
        assert_eq!(state.module_version, 7);
        assert_eq!(
            state.cases()[0].status(state.module_version, state.sub_module_type.as_deref()),
            CaseStatus::Stale
        );

        assert!(!store.dispatch(Action::SetSubModuleType(Some("utility".to_string()))));
    }

    #[test]
    fn load_batch_replaces_columns() {
        let mut store = ComparisonStore::new(&config());
        let mut batch = SavedBatch::new(
            "pair",
            ec_core::ModuleType::new("solar"),
            vec![CaseId::new(4).unwrap(), CaseId::new(5).unwrap()],
        );
        batch.is_focus_link_active = true;

        store.dispatch(Action::LoadBatch {
            batch,
            cases: vec![loaded(4, "a"), loaded(5, "b")],
        });
        let state = store.state();
        assert_eq!(state.cases().len(), 2);
        assert!(state.cases().iter().all(|c| !c.is_unsaved && c.is_focus_mode_active));
        assert!(!state.batch_membership_changed());

        store.dispatch(Action::RemoveComparisonCaseAtIndex(0));
        assert!(store.state().batch_membership_changed());
        assert_eq!(store.state().saved_batch.as_ref().unwrap().case_ids.len(), 2);

        store.dispatch(Action::SetBatchProps(BatchPatch {
            case_ids: Some(vec![CaseId::new(5).unwrap()]),
            ..Default::default()
        }));
        assert!(!store.state().batch_membership_changed());
    }

    #[test]
    fn loading_more_cases_than_allowed_truncates() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::LoadCasesIntoColumns(
            (1..=5).map(|i| loaded(i, "c")).collect(),
        ));
        assert_eq!(store.cases().len(), 3);

        store.dispatch(Action::LoadCasesIntoColumns(Vec::new()));
        assert_eq!(store.cases().len(), 1);
    }

    #[test]
    fn reset_clears_highlight_on_a_single_column() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::EnableErroneousInputHighlightingAtIndex(0));
        store.dispatch(Action::SetFocusModeActiveAtIndex {
            index: 0,
            value: true,
        });

        assert!(store.dispatch(Action::ResetComparisonCasesToOneEmptyCase));
        let case = &store.cases()[0];
        assert!(!case.highlight_erroneous_inputs);
        assert!(!case.is_focus_mode_active);
        assert!(case.is_pristine());
        assert!(!store.dispatch(Action::ResetComparisonCasesToOneEmptyCase));
    }

    #[test]
    fn oversize_batch_patch_is_rejected() {
        let mut store = ComparisonStore::new(&config());
        let batch = SavedBatch::new(
            "pair",
            ec_core::ModuleType::new("solar"),
            vec![CaseId::new(1).unwrap()],
        );
        store.dispatch(Action::LoadBatch {
            batch,
            cases: vec![loaded(1, "a")],
        });

        let too_many: Vec<CaseId> = (1..=4).filter_map(CaseId::new).collect();
        assert!(!store.dispatch(Action::SetBatchProps(BatchPatch {
            name: Some("renamed".to_string()),
            case_ids: Some(too_many),
            ..Default::default()
        })));
        let batch = store.state().saved_batch.as_ref().unwrap();
        assert_eq!(batch.name, "pair");
        assert_eq!(batch.case_ids, vec![CaseId::new(1).unwrap()]);
    }

    #[test]
    fn linked_inputs_propagate() {
        let mut store = ComparisonStore::new(&config());
        store.dispatch(Action::AddComparisonCol);
        store.dispatch(Action::AddComparisonCol);
        for index in [0, 1] {
            store.dispatch(Action::SetFocusModeActiveAtIndex { index, value: true });
        }
        store.dispatch(Action::ToggleFocusedInputAtIndex {
            index: 0,
            name: "capacity_kw".to_string(),
        });
        assert_eq!(store.cases()[1].focused_inputs, vec!["capacity_kw"]);
        assert!(store.cases()[2].focused_inputs.is_empty());

        store.dispatch(Action::SetInputValueAtIndex {
            index: 0,
            name: "capacity_kw".to_string(),
            value: "900".to_string(),
        });
        let value = |i: usize| {
            store.cases()[i]
                .data
                .as_ref()
                .and_then(|d| d.input_values.get("capacity_kw").cloned())
        };
        assert_eq!(value(1).as_deref(), Some("900"));
        assert_eq!(value(2), None);
    }

    #[test]
    fn demo_columns_are_read_only() {
        let mut store = ComparisonStore::new(&config());
        let mut demo = loaded(1, "demo");
        demo.is_demo = true;
        store.dispatch(Action::LoadCasesIntoColumns(vec![demo]));
        assert!(!store.dispatch(Action::SetInputValueAtIndex {
            index: 0,
            name: "capacity_kw".to_string(),
            value: "1".to_string(),
        }));
        assert!(!store.dispatch(Action::SetCaseNameAtIndex {
            index: 0,
            name: "mine".to_string(),
        }));
    }

    #[test]
    fn begin_run_uses_default_inputs_for_blank_column() {
        let mut store = ComparisonStore::new(&config());
        let ticket = store.begin_run(0).unwrap();
        assert_eq!(ticket.input_values["capacity_kw"], "100");
        assert_eq!(ticket.token.session, SessionId::FIRST);
        assert!(store.begin_run(3).is_none());
    }
}
