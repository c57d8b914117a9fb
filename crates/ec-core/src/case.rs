//! Comparison cases: one column of inputs and, once run, its result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CaseId, SessionId};
use crate::module::InputValues;

/// Payload persisted with a saved case.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedCaseData {
    #[serde(default)]
    pub input_values: InputValues,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub custom_data: Value,
    /// Opaque payload returned by the remote analysis service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<Value>,
    #[serde(default)]
    pub module_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_module_type: Option<String>,
}

impl SavedCaseData {
    pub fn with_inputs(input_values: InputValues, module_version: u32) -> Self {
        Self {
            input_values,
            module_version,
            ..Default::default()
        }
    }

    /// True when the stored result was computed under the given module
    /// version and sub-module selection.
    pub fn is_current(&self, module_version: u32, sub_module_type: Option<&str>) -> bool {
        self.module_version == module_version && self.sub_module_type.as_deref() == sub_module_type
    }
}

/// Tag captured when a run starts; a result is committed only if the
/// column still has this session id and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken {
    pub session: SessionId,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    /// No inputs touched and nothing run.
    New,
    Editing,
    Running,
    Ready,
    Failed,
    /// Has a result, but from another module version or sub-module.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCase {
    pub id: SessionId,
    pub saved_case_id: Option<CaseId>,
    pub name: Option<String>,
    pub data: Option<SavedCaseData>,
    /// In flight: also reported by [`ComparisonCase::is_running`].
    pub is_loading: bool,
    pub is_unsaved: bool,
    pub is_demo: bool,
    pub focused_inputs: Vec<String>,
    pub is_focus_mode_active: bool,
    pub highlight_erroneous_inputs: bool,
    pub error: Option<String>,
    pub run_generation: u32,
    /// Input fingerprint of the last committed run.
    pub last_run_fingerprint: Option<String>,
}

impl ComparisonCase {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            saved_case_id: None,
            name: None,
            data: None,
            is_loading: false,
            is_unsaved: false,
            is_demo: false,
            focused_inputs: Vec::new(),
            is_focus_mode_active: false,
            highlight_erroneous_inputs: false,
            error: None,
            run_generation: 0,
            last_run_fingerprint: None,
        }
    }

    /// A case loaded from a persisted snapshot: nothing is unsaved yet.
    pub fn from_saved(
        id: SessionId,
        saved_case_id: Option<CaseId>,
        name: impl Into<String>,
        data: SavedCaseData,
        is_demo: bool,
    ) -> Self {
        Self {
            saved_case_id,
            name: Some(name.into()),
            data: Some(data),
            is_demo,
            ..Self::new(id)
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_loading
    }

    pub fn is_saved(&self) -> bool {
        self.saved_case_id.is_some()
    }

    /// Blank column: no persisted identity, no data, nothing in flight and
    /// no focus or error-highlight state.
    pub fn is_pristine(&self) -> bool {
        self.saved_case_id.is_none()
            && self.data.is_none()
            && self.name.is_none()
            && !self.is_loading
            && !self.is_unsaved
            && !self.is_demo
            && self.error.is_none()
            && !self.highlight_erroneous_inputs
            && self.focused_inputs.is_empty()
            && !self.is_focus_mode_active
    }

    pub fn analysis_result(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.analysis_result.as_ref())
    }

    /// The result, but only if it was computed for the active version.
    pub fn displayable_result(
        &self,
        module_version: u32,
        sub_module_type: Option<&str>,
    ) -> Option<&Value> {
        self.data
            .as_ref()
            .filter(|d| d.is_current(module_version, sub_module_type))
            .and_then(|d| d.analysis_result.as_ref())
    }

    pub fn run_token(&self) -> RunToken {
        RunToken {
            session: self.id,
            generation: self.run_generation,
        }
    }

    pub fn status(&self, module_version: u32, sub_module_type: Option<&str>) -> CaseStatus {
        if self.is_loading {
            return CaseStatus::Running;
        }
        if self.error.is_some() {
            return CaseStatus::Failed;
        }
        match &self.data {
            None => CaseStatus::New,
            Some(data) => match &data.analysis_result {
                None => CaseStatus::Editing,
                Some(_) if !data.is_current(module_version, sub_module_type) => CaseStatus::Stale,
                Some(_) => CaseStatus::Ready,
            },
        }
    }

    /// Insert into or remove from the ordered set of linked inputs.
    /// Returns true if the input is now focused.
    pub fn toggle_focused_input(&mut self, name: &str) -> bool {
        if let Some(pos) = self.focused_inputs.iter().position(|n| n == name) {
            self.focused_inputs.remove(pos);
            false
        } else {
            self.focused_inputs.push(name.to_string());
            true
        }
    }

    pub fn is_input_linked(&self, name: &str) -> bool {
        self.is_focus_mode_active && self.focused_inputs.iter().any(|n| n == name)
    }
}
