//! One mounted module screen: comparison state, result fetching, the
//! local store and the demo library wired together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ec_charts::{AxisMaxima, ChartRecord, SharedAxisBounds, biggest_y_max, shared_axis_bounds};
use ec_core::{ModuleConfig, ModuleType, SettingsId, validate_inputs};
use ec_store::{DemoLibrary, LocalStore, UserSettings};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::fetcher::{AnalysisService, CaseResultFetcher};
use crate::fingerprint::input_fingerprint;
use crate::hydrate::{LoadInstructions, LoadSource};
use crate::state::{Action, ComparisonStore, LoadedCase, ModuleState};
use crate::sync;

pub struct ModuleSession {
    config: ModuleConfig,
    comparison: ComparisonStore,
    fetcher: CaseResultFetcher,
    store: LocalStore,
    demo: DemoLibrary,
    hydrated: bool,
}

impl ModuleSession {
    /// Fresh screen for `config`, with persisted user settings applied.
    pub fn new(
        config: ModuleConfig,
        store: LocalStore,
        demo: DemoLibrary,
        service: Arc<dyn AnalysisService>,
    ) -> AppResult<Self> {
        let mut session = Self {
            comparison: ComparisonStore::new(&config),
            fetcher: CaseResultFetcher::new(service),
            config,
            store,
            demo,
            hydrated: false,
        };

        let settings = session.settings()?;
        session.comparison.dispatch(Action::SetYAxisLocked(settings.lock_y_axes));
        session.comparison.dispatch(Action::SetSidebarOpen(settings.show_sidebar));
        if let Some(cols) = settings.num_chart_cols {
            session.comparison.dispatch(Action::SetNumChartCols(cols));
        }
        Ok(session)
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn state(&self) -> &ModuleState {
        self.comparison.state()
    }

    pub fn comparison(&self) -> &ComparisonStore {
        &self.comparison
    }

    pub fn comparison_mut(&mut self) -> &mut ComparisonStore {
        &mut self.comparison
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn dispatch(&mut self, action: Action) -> bool {
        self.comparison.dispatch(action)
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Apply load instructions. Only the first call does anything; later
    /// calls return `Ok(false)`.
    pub fn hydrate(&mut self, instructions: &LoadInstructions) -> AppResult<bool> {
        if self.hydrated {
            tracing::debug!("already hydrated, ignoring load instructions");
            return Ok(false);
        }
        self.hydrated = true;

        if let Some(module_type) = &instructions.module_type {
            if module_type.as_str() != self.config.module_type.as_str() {
                return Err(AppError::InvalidInput(format!(
                    "load instructions are for module '{}', screen is '{}'",
                    module_type, self.config.module_type
                )));
            }
        }

        let Some(source) = instructions.source() else {
            return Ok(false);
        };
        tracing::info!(?source, module = %self.config.module_type, "hydrating");

        let action = match source {
            LoadSource::Batch(id) => {
                let (batch, cases) = sync::load_batch(&self.store, id)?;
                self.check_module("batch", &batch.module_type)?;
                self.check_cases(&cases)?;
                Action::LoadBatch { batch, cases }
            }
            LoadSource::DemoBatch(id) => {
                let (batch, cases) = sync::load_demo_batch(&self.demo, id)?;
                self.check_module("batch", &batch.module_type)?;
                self.check_cases(&cases)?;
                Action::LoadBatch { batch, cases }
            }
            LoadSource::Cases(ids) => {
                let cases = sync::load_cases(&self.store, &ids)?;
                self.check_cases(&cases)?;
                Action::LoadCasesIntoColumns(cases)
            }
            LoadSource::DemoCases(ids) => {
                let cases = sync::load_demo_cases(&self.demo, &ids);
                self.check_cases(&cases)?;
                Action::LoadCasesIntoColumns(cases)
            }
            LoadSource::Duplicate(ids) => {
                let sources = sync::load_cases(&self.store, &ids)?;
                self.check_cases(&sources)?;
                let copies = sync::duplicate_cases(&self.store, &self.config, &ids)?;
                Action::LoadCasesIntoColumns(copies.into_iter().map(Into::into).collect())
            }
        };
        Ok(self.comparison.dispatch(action))
    }

    fn check_module(&self, what: &str, module_type: &ModuleType) -> AppResult<()> {
        if module_type.as_str() == self.config.module_type.as_str() {
            return Ok(());
        }
        Err(AppError::InvalidInput(format!(
            "{} belongs to module '{}', screen is '{}'",
            what, module_type, self.config.module_type
        )))
    }

    fn check_cases(&self, cases: &[LoadedCase]) -> AppResult<()> {
        cases.iter().try_for_each(|case| {
            self.check_module(&format!("case '{}'", case.name), &case.module_type)
        })
    }

    /// Validate and start the analysis for one column. Invalid inputs turn
    /// on error highlighting for that column instead; returns whether a
    /// run was started.
    pub fn run_case_at(&mut self, index: usize) -> AppResult<bool> {
        let state = self.comparison.state();
        let inputs = state.effective_inputs(index).ok_or(AppError::NoSuchColumn {
            index,
            len: state.cases().len(),
        })?;

        let errors = validate_inputs(&self.config, &inputs);
        if !errors.is_empty() {
            tracing::warn!(index, errors = errors.len(), first = %errors[0], "not running, inputs invalid");
            self.comparison
                .dispatch(Action::EnableErroneousInputHighlightingAtIndex(index));
            return Ok(false);
        }

        let Some(ticket) = self.comparison.begin_run(index) else {
            return Ok(false);
        };
        self.fetcher.spawn(&self.config.api_path, &ticket);
        Ok(true)
    }

    /// Run every column. Returns how many runs started.
    pub fn run_all(&mut self) -> AppResult<usize> {
        let mut started = 0;
        for index in 0..self.comparison.cases().len() {
            if self.run_case_at(index)? {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Columns whose displayed result does not match their current inputs:
    /// never run, failed, edited since the last run, or computed for another
    /// module version. Running columns are never dirty.
    pub fn dirty_columns(&self) -> Vec<usize> {
        let state = self.comparison.state();
        let sub_module = state.sub_module_type.as_deref();
        state
            .cases()
            .iter()
            .enumerate()
            .filter(|(_, case)| !case.is_running())
            .filter(|(index, case)| {
                let inputs = state.effective_inputs(*index).unwrap_or_default();
                let fingerprint = input_fingerprint(&inputs, state.module_version, sub_module);
                case.last_run_fingerprint.as_deref() != Some(fingerprint.as_str())
                    || case
                        .displayable_result(state.module_version, sub_module)
                        .is_none()
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub fn run_dirty(&mut self) -> AppResult<usize> {
        let mut started = 0;
        for index in self.dirty_columns() {
            if self.run_case_at(index)? {
                started += 1;
            }
        }
        Ok(started)
    }

    pub fn in_flight(&self) -> usize {
        self.fetcher.in_flight()
    }

    /// Commit every outcome that has arrived. Returns how many were applied
    /// (stale outcomes are received but dropped).
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(outcome) = self.fetcher.try_recv() {
            if self.comparison.dispatch(outcome.into_action()) {
                applied += 1;
            }
        }
        applied
    }

    /// Block for the next outcome. `Some(applied)` when one arrived.
    pub fn wait_for_outcome(&mut self, timeout: Duration) -> Option<bool> {
        let outcome = self.fetcher.recv_timeout(timeout)?;
        Some(self.comparison.dispatch(outcome.into_action()))
    }

    /// Receive outcomes until nothing is in flight or `timeout` passes.
    /// Returns whether everything arrived.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.fetcher.in_flight() > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || self.wait_for_outcome(left).is_none() {
                return false;
            }
        }
        true
    }

    fn charts<F>(&self, mut chart_for: F) -> Vec<Option<ChartRecord>>
    where
        F: FnMut(&Value) -> Option<ChartRecord>,
    {
        let state = self.comparison.state();
        state
            .cases()
            .iter()
            .map(|case| {
                case.displayable_result(state.module_version, state.sub_module_type.as_deref())
                    .and_then(&mut chart_for)
            })
            .collect()
    }

    /// Shared per-axis maxima across the columns' charts; `chart_for`
    /// turns a column's result into its chart. All `None` while unlocked.
    pub fn shared_axis_maxima<F>(&self, chart_for: F) -> AxisMaxima
    where
        F: FnMut(&Value) -> Option<ChartRecord>,
    {
        biggest_y_max(&self.charts(chart_for), self.state().is_y_axis_locked)
    }

    pub fn shared_axis_bounds<F>(&self, chart_for: F) -> SharedAxisBounds
    where
        F: FnMut(&Value) -> Option<ChartRecord>,
    {
        shared_axis_bounds(&self.charts(chart_for), self.state().is_y_axis_locked)
    }

    pub fn settings(&self) -> AppResult<UserSettings> {
        Ok(self
            .store
            .get::<UserSettings>(SettingsId::FIRST)?
            .unwrap_or_default())
    }

    fn save_settings(&self, patch: impl FnOnce(&mut UserSettings)) -> AppResult<()> {
        let mut settings = self.settings()?;
        patch(&mut settings);
        settings.id = Some(SettingsId::FIRST);
        self.store.put(settings)?;
        Ok(())
    }

    pub fn set_y_axis_locked(&mut self, locked: bool) -> AppResult<()> {
        self.comparison.dispatch(Action::SetYAxisLocked(locked));
        self.save_settings(|s| s.lock_y_axes = locked)
    }

    pub fn set_sidebar_open(&mut self, open: bool) -> AppResult<()> {
        self.comparison.dispatch(Action::SetSidebarOpen(open));
        self.save_settings(|s| s.show_sidebar = open)
    }

    pub fn set_num_chart_cols(&mut self, cols: u8) -> AppResult<bool> {
        if !self.comparison.dispatch(Action::SetNumChartCols(cols)) {
            return Ok(false);
        }
        self.save_settings(|s| s.num_chart_cols = Some(cols))?;
        Ok(true)
    }

    pub fn save_case_at(&mut self, index: usize, name: Option<&str>) -> AppResult<ec_core::CaseId> {
        sync::save_case_at(&self.store, &mut self.comparison, index, name)
    }

    pub fn save_batch(&mut self, name: &str) -> AppResult<ec_store::SavedBatch> {
        sync::save_batch(&self.store, &mut self.comparison, name)
    }
}
