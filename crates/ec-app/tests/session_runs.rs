//! Module session end to end: hydration, runs through a controllable
//! analysis service, stale result discard and shared axis scaling.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use ec_app::{
    Action, AnalysisError, AnalysisRequest, AnalysisService, CaseIdAssignment, LoadInstructions,
    ModuleSession,
};
use ec_charts::{ChartRecord, Series};
use ec_core::{CaseStatus, InputDef, ModuleConfig, ModuleType, SavedCaseData, SubModuleDef};
use ec_store::{DemoLibrary, LocalStore, SavedBatch, SavedCase, UserSettings};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(10);

/// Holds every analysis until opened.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

/// Echoes the capacity input back as a one-series column chart.
fn echo(request: &AnalysisRequest) -> Result<Value, AnalysisError> {
    let capacity: f64 = request
        .input_values
        .get("capacity_kw")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AnalysisError::Malformed("capacity_kw".to_string()))?;
    Ok(json!({"series": [{"data": [capacity, capacity / 2.0]}]}))
}

fn gated_service(gate: Arc<Gate>) -> Arc<dyn AnalysisService> {
    Arc::new(move |_: &str, request: &AnalysisRequest| {
        gate.wait();
        echo(request)
    })
}

fn open_service() -> Arc<dyn AnalysisService> {
    Arc::new(|_: &str, request: &AnalysisRequest| echo(request))
}

fn config() -> ModuleConfig {
    let mut config = ModuleConfig::new("solar", "/api/solar");
    config.inputs = vec![InputDef {
        name: "capacity_kw".to_string(),
        default_value: "100".to_string(),
        is_visible: true,
        required: true,
        min: Some(0.0),
        max: Some(10_000.0),
    }];
    config
}

fn session(service: Arc<dyn AnalysisService>) -> ModuleSession {
    ModuleSession::new(
        config(),
        LocalStore::in_memory(),
        DemoLibrary::default(),
        service,
    )
    .unwrap()
}

fn set_capacity(session: &mut ModuleSession, index: usize, value: &str) {
    session.dispatch(Action::SetInputValueAtIndex {
        index,
        name: "capacity_kw".to_string(),
        value: value.to_string(),
    });
}

fn chart(result: &Value) -> Option<ChartRecord> {
    ChartRecord::from_options(result).ok()
}

#[test]
fn result_for_a_cleared_column_is_discarded() {
    let gate = Arc::new(Gate::default());
    let mut session = session(gated_service(Arc::clone(&gate)));

    assert!(session.run_case_at(0).unwrap());
    let old_session = session.state().cases()[0].id;
    assert!(session.state().cases()[0].is_running());

    session.dispatch(Action::SetComparisonCaseIdAtIndex {
        index: 0,
        value: CaseIdAssignment::Clear,
    });
    assert_ne!(session.state().cases()[0].id, old_session);

    gate.open();
    assert_eq!(session.wait_for_outcome(WAIT), Some(false));

    let case = &session.state().cases()[0];
    assert!(case.is_pristine());
    assert!(case.analysis_result().is_none());
}

#[test]
fn only_the_latest_run_of_a_column_lands() {
    let gate = Arc::new(Gate::default());
    let mut session = session(gated_service(Arc::clone(&gate)));

    set_capacity(&mut session, 0, "10");
    assert!(session.run_case_at(0).unwrap());
    set_capacity(&mut session, 0, "20");
    assert!(session.run_case_at(0).unwrap());
    assert_eq!(session.in_flight(), 2);

    gate.open();
    assert!(session.wait_idle(WAIT));

    let case = &session.state().cases()[0];
    assert!(!case.is_running());
    assert_eq!(
        case.analysis_result(),
        Some(&json!({"series": [{"data": [20.0, 10.0]}]}))
    );
}

#[test]
fn result_follows_a_column_that_moved() {
    let gate = Arc::new(Gate::default());
    let mut session = session(gated_service(Arc::clone(&gate)));
    session.dispatch(Action::AddComparisonCol);
    set_capacity(&mut session, 1, "42");

    assert!(session.run_case_at(1).unwrap());
    session.dispatch(Action::RemoveComparisonCaseAtIndex(0));

    gate.open();
    assert_eq!(session.wait_for_outcome(WAIT), Some(true));
    let case = &session.state().cases()[0];
    assert_eq!(case.status(1, None), CaseStatus::Ready);
}

#[test]
fn result_keeps_the_sub_module_it_was_started_under() {
    let mut config = config();
    config.sub_modules = vec![
        SubModuleDef {
            sub_module_type: "steel".to_string(),
            module_version: 2,
        },
        SubModuleDef {
            sub_module_type: "cement".to_string(),
            module_version: 3,
        },
    ];
    let gate = Arc::new(Gate::default());
    let mut session = ModuleSession::new(
        config,
        LocalStore::in_memory(),
        DemoLibrary::default(),
        gated_service(Arc::clone(&gate)),
    )
    .unwrap();

    session.dispatch(Action::SetSubModuleType(Some("steel".to_string())));
    assert!(session.run_case_at(0).unwrap());
    session.dispatch(Action::SetSubModuleType(Some("cement".to_string())));

    gate.open();
    assert_eq!(session.wait_for_outcome(WAIT), Some(true));

    let state = session.state();
    let case = &state.cases()[0];
    let data = case.data.as_ref().unwrap();
    assert_eq!(data.sub_module_type.as_deref(), Some("steel"));
    assert_eq!(data.module_version, 2);
    assert_eq!(case.status(3, Some("cement")), CaseStatus::Stale);
    assert!(case.displayable_result(3, Some("cement")).is_none());
    assert_eq!(case.status(2, Some("steel")), CaseStatus::Ready);
}

#[test]
fn failing_column_does_not_touch_siblings() {
    let mut session = session(open_service());
    session.dispatch(Action::AddComparisonCol);
    set_capacity(&mut session, 0, "50");
    set_capacity(&mut session, 1, "not a number");

    // validation stops the bad column before any request goes out
    assert_eq!(session.run_all().unwrap(), 1);
    assert!(session.state().cases()[1].highlight_erroneous_inputs);
    assert!(session.wait_idle(WAIT));

    let cases = session.state().cases();
    assert_eq!(cases[0].status(1, None), CaseStatus::Ready);
    assert!(cases[1].analysis_result().is_none());
    assert!(cases[1].error.is_none());
}

#[test]
fn service_errors_mark_only_that_column() {
    let service: Arc<dyn AnalysisService> = Arc::new(|_: &str, request: &AnalysisRequest| {
        if request.input_values.get("capacity_kw").map(String::as_str) == Some("13") {
            return Err(AnalysisError::Status {
                status: 500,
                message: "unlucky".to_string(),
            });
        }
        echo(request)
    });
    let mut session = session(service);
    session.dispatch(Action::AddComparisonCol);
    set_capacity(&mut session, 1, "13");

    assert_eq!(session.run_all().unwrap(), 2);
    assert!(session.wait_idle(WAIT));

    let cases = session.state().cases();
    assert_eq!(cases[0].status(1, None), CaseStatus::Ready);
    assert_eq!(cases[1].status(1, None), CaseStatus::Failed);
    assert_eq!(
        cases[1].error.as_deref(),
        Some("Analysis service returned 500: unlucky")
    );
}

#[test]
fn dirty_columns_rerun_only_after_edits() {
    let mut session = session(open_service());
    session.dispatch(Action::AddComparisonCol);

    assert_eq!(session.run_dirty().unwrap(), 2);
    assert!(session.wait_idle(WAIT));
    assert!(session.dirty_columns().is_empty());
    assert_eq!(session.run_dirty().unwrap(), 0);

    set_capacity(&mut session, 1, "7");
    assert_eq!(session.dirty_columns(), vec![1]);
    assert_eq!(session.run_dirty().unwrap(), 1);
    assert!(session.wait_idle(WAIT));
    assert!(session.dirty_columns().is_empty());
}

#[test]
fn locked_axes_share_the_largest_maximum() {
    let mut session = session(open_service());
    session.dispatch(Action::AddComparisonCol);
    set_capacity(&mut session, 0, "30");
    set_capacity(&mut session, 1, "80");
    session.run_all().unwrap();
    assert!(session.wait_idle(WAIT));

    assert_eq!(session.shared_axis_maxima(chart), [None, None]);

    session.set_y_axis_locked(true).unwrap();
    assert_eq!(session.shared_axis_maxima(chart), [Some(80.0), None]);

    let bounds = session.shared_axis_bounds(chart);
    assert_eq!(bounds.max, [Some(80.0), None]);
    assert_eq!(bounds.min, [Some(15.0), None]);

    // a column's chart builder may reject a result
    let none = session.shared_axis_maxima(|_| None::<ChartRecord>);
    assert_eq!(none, [None, None]);

    // sanity check of the builder against a hand-made chart
    let hand = ChartRecord::with_series(vec![Series::values(&[30.0, 15.0])]);
    assert_eq!(chart(&json!({"series": [{"data": [30.0, 15.0]}]})), Some(hand));
}

#[test]
fn lock_setting_survives_a_new_session() {
    let store = LocalStore::in_memory();
    let mut first = ModuleSession::new(
        config(),
        store.clone(),
        DemoLibrary::default(),
        open_service(),
    )
    .unwrap();
    assert!(!first.state().is_y_axis_locked);
    first.set_y_axis_locked(true).unwrap();
    first.set_sidebar_open(false).unwrap();

    let settings = store.all::<UserSettings>().unwrap();
    assert_eq!(settings.len(), 1);
    assert!(settings[0].lock_y_axes);

    let second =
        ModuleSession::new(config(), store, DemoLibrary::default(), open_service()).unwrap();
    assert!(second.state().is_y_axis_locked);
    assert!(!second.state().is_sidebar_open);
}

#[test]
fn hydrates_from_a_saved_batch_once() {
    let store = LocalStore::in_memory();
    let mut author = ModuleSession::new(
        config(),
        store.clone(),
        DemoLibrary::default(),
        open_service(),
    )
    .unwrap();
    author.dispatch(Action::AddComparisonCol);
    set_capacity(&mut author, 1, "75");
    author.save_case_at(0, Some("Small")).unwrap();
    author.save_case_at(1, Some("Large")).unwrap();
    let batch = author.save_batch("Sizes").unwrap();

    let query = format!("?moduleType=solar&loadBatchId={}", batch.id.unwrap());
    let instructions = LoadInstructions::from_query(&query).unwrap();

    let mut reader =
        ModuleSession::new(config(), store, DemoLibrary::default(), open_service()).unwrap();
    assert!(reader.hydrate(&instructions).unwrap());
    assert!(reader.is_hydrated());

    let state = reader.state();
    assert_eq!(state.cases().len(), 2);
    assert_eq!(state.saved_batch.as_ref().map(|b| b.name.as_str()), Some("Sizes"));
    let names: Vec<_> = state.cases().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec![Some("Small".to_string()), Some("Large".to_string())]);
    assert!(state.cases().iter().all(|c| !c.is_unsaved));

    // second mount-time call is ignored
    reader.dispatch(Action::ResetComparisonCasesToOneEmptyCase);
    assert!(!reader.hydrate(&instructions).unwrap());
    assert_eq!(reader.state().cases().len(), 1);
}

#[test]
fn hydration_rejects_another_modules_instructions() {
    let mut session = session(open_service());
    let instructions = LoadInstructions::from_query("moduleType=wind&loadCaseIds=1").unwrap();
    assert!(session.hydrate(&instructions).is_err());
}

#[test]
fn hydration_rejects_another_modules_batch_and_cases() {
    let store = LocalStore::in_memory();
    let wind = store
        .add(SavedCase::new(
            "Offshore",
            ModuleType::new("wind"),
            SavedCaseData::default(),
        ))
        .unwrap()
        .id
        .unwrap();
    let batch = store
        .add(SavedBatch::new("Turbines", ModuleType::new("wind"), vec![wind]))
        .unwrap()
        .id
        .unwrap();

    let mut session =
        ModuleSession::new(config(), store.clone(), DemoLibrary::default(), open_service())
            .unwrap();
    let instructions = LoadInstructions::from_query(&format!("loadBatchId={}", batch)).unwrap();
    assert!(session.hydrate(&instructions).is_err());
    assert!(session.state().saved_batch.is_none());
    assert_eq!(session.state().cases().len(), 1);

    let mut session =
        ModuleSession::new(config(), store, DemoLibrary::default(), open_service()).unwrap();
    let instructions = LoadInstructions::from_query(&format!("loadCaseIds={}", wind)).unwrap();
    assert!(session.hydrate(&instructions).is_err());
    assert!(session.state().cases()[0].saved_case_id.is_none());
}

#[test]
fn demo_batch_columns_are_read_only() {
    let demo = DemoLibrary::from_yaml_str(
        r#"
cases:
  - id: 1
    name: Demo rooftop
    module_type: solar
    data:
      input_values:
        capacity_kw: "12"
      module_version: 1
batches:
  - id: 1
    name: Demo set
    module_type: solar
    case_ids: [1]
"#,
    )
    .unwrap();
    let mut session =
        ModuleSession::new(config(), LocalStore::in_memory(), demo, open_service()).unwrap();
    let instructions = LoadInstructions::from_query("loadDemoBatchId=1").unwrap();
    assert!(session.hydrate(&instructions).unwrap());

    let case = &session.state().cases()[0];
    assert!(case.is_demo);
    assert!(case.saved_case_id.is_none());

    set_capacity(&mut session, 0, "99");
    assert_eq!(
        session.state().effective_inputs(0).unwrap()["capacity_kw"],
        "12"
    );

    // demos can still be run
    assert!(session.run_case_at(0).unwrap());
    assert!(session.wait_idle(WAIT));
    assert_eq!(session.state().cases()[0].status(1, None), CaseStatus::Ready);
}
