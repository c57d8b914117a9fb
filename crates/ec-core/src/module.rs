//! Module metadata: what an analysis module accepts and how many columns
//! it may show side by side.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_MAX_COMPARISON_CASES: usize = 3;

/// Input name to raw (string) input value.
pub type InputValues = BTreeMap<String, String>;

/// Identifier of an analysis module, e.g. `"battery-storage"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleType(pub String);

impl ModuleType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether each comparison column renders its own chart controls or one
/// set of controls drives every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartControlAllocation {
    #[default]
    Individual,
    Group,
}

/// Projection of a module input: enough to seed a case and validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubModuleDef {
    pub sub_module_type: String,
    pub module_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module_type: ModuleType,
    pub api_path: String,
    #[serde(default = "default_version")]
    pub module_version: u32,
    #[serde(default = "default_max_cases")]
    pub max_comparison_cases: usize,
    #[serde(default = "default_true")]
    pub allow_comparisons: bool,
    #[serde(default = "default_true")]
    pub allow_case_duplication: bool,
    #[serde(default)]
    pub show_run_all_button: bool,
    #[serde(default)]
    pub allow_chart_tiling: bool,
    #[serde(default = "default_chart_cols")]
    pub num_chart_cols: u8,
    #[serde(default)]
    pub chart_control_allocation: ChartControlAllocation,
    #[serde(default)]
    pub sub_modules: Vec<SubModuleDef>,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

fn default_max_cases() -> usize {
    DEFAULT_MAX_COMPARISON_CASES
}

fn default_chart_cols() -> u8 {
    1
}

impl ModuleConfig {
    pub fn new(module_type: impl Into<String>, api_path: impl Into<String>) -> Self {
        Self {
            module_type: ModuleType::new(module_type),
            api_path: api_path.into(),
            module_version: default_version(),
            max_comparison_cases: DEFAULT_MAX_COMPARISON_CASES,
            allow_comparisons: true,
            allow_case_duplication: true,
            show_run_all_button: false,
            allow_chart_tiling: false,
            num_chart_cols: default_chart_cols(),
            chart_control_allocation: ChartControlAllocation::default(),
            sub_modules: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Column limit actually enforced: at least one, and exactly one when
    /// comparisons are disabled.
    pub fn effective_max_cases(&self) -> usize {
        if self.allow_comparisons {
            self.max_comparison_cases.max(1)
        } else {
            1
        }
    }

    /// Module version that results must carry to be displayable under the
    /// given sub-module selection.
    pub fn version_for(&self, sub_module_type: Option<&str>) -> CoreResult<u32> {
        match sub_module_type {
            None => Ok(self.module_version),
            Some(sub) => self
                .sub_modules
                .iter()
                .find(|s| s.sub_module_type == sub)
                .map(|s| s.module_version)
                .ok_or_else(|| CoreError::UnknownSubModule {
                    module: self.module_type.to_string(),
                    sub_module: sub.to_string(),
                }),
        }
    }

    pub fn default_input_values(&self) -> InputValues {
        self.inputs
            .iter()
            .map(|i| (i.name.clone(), i.default_value.clone()))
            .collect()
    }

    pub fn input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

/// Why a single input value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum InputErrorKind {
    Missing,
    NotANumber,
    BelowMin(f64),
    AboveMax(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputError {
    pub input: String,
    pub kind: InputErrorKind,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InputErrorKind::Missing => write!(f, "{} is required", self.input),
            InputErrorKind::NotANumber => write!(f, "{} must be a number", self.input),
            InputErrorKind::BelowMin(min) => write!(f, "{} must be at least {}", self.input, min),
            InputErrorKind::AboveMax(max) => write!(f, "{} must be at most {}", self.input, max),
        }
    }
}

/// Check inputs against the module's rules. Hidden inputs are not checked.
pub fn validate_inputs(config: &ModuleConfig, values: &InputValues) -> Vec<InputError> {
    let mut errors = Vec::new();

    for def in config.inputs.iter().filter(|d| d.is_visible) {
        let raw = values.get(&def.name).map(|v| v.trim()).unwrap_or("");
        if raw.is_empty() {
            if def.required {
                errors.push(InputError {
                    input: def.name.clone(),
                    kind: InputErrorKind::Missing,
                });
            }
            continue;
        }

        if def.min.is_none() && def.max.is_none() {
            continue;
        }

        let value = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                errors.push(InputError {
                    input: def.name.clone(),
                    kind: InputErrorKind::NotANumber,
                });
                continue;
            }
        };

        if let Some(min) = def.min.filter(|min| value < *min) {
            errors.push(InputError {
                input: def.name.clone(),
                kind: InputErrorKind::BelowMin(min),
            });
        } else if let Some(max) = def.max.filter(|max| value > *max) {
            errors.push(InputError {
                input: def.name.clone(),
                kind: InputErrorKind::AboveMax(max),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solar() -> ModuleConfig {
        let mut config = ModuleConfig::new("solar", "/api/solar");
        config.inputs = vec![
            InputDef {
                name: "capacity_kw".to_string(),
                default_value: "100".to_string(),
                is_visible: true,
                required: true,
                min: Some(0.0),
                max: Some(5000.0),
            },
            InputDef {
                name: "region".to_string(),
                default_value: "west".to_string(),
                is_visible: true,
                required: false,
                min: None,
                max: None,
            },
            InputDef {
                name: "internal_flag".to_string(),
                default_value: String::new(),
                is_visible: false,
                required: true,
                min: None,
                max: None,
            },
        ];
        config.sub_modules = vec![SubModuleDef {
            sub_module_type: "rooftop".to_string(),
            module_version: 4,
        }];
        config
    }

    #[test]
    fn defaults_cover_every_input() {
        let values = solar().default_input_values();
        assert_eq!(values.len(), 3);
        assert_eq!(values["capacity_kw"], "100");
    }

    #[test]
    fn defaults_validate() {
        let config = solar();
        assert!(validate_inputs(&config, &config.default_input_values()).is_empty());
    }

    #[test]
    fn validation_reports_each_rule() {
        let config = solar();
        let mut values = config.default_input_values();

        values.insert("capacity_kw".to_string(), " ".to_string());
        assert_eq!(validate_inputs(&config, &values)[0].kind, InputErrorKind::Missing);

        values.insert("capacity_kw".to_string(), "lots".to_string());
        assert_eq!(validate_inputs(&config, &values)[0].kind, InputErrorKind::NotANumber);

        values.insert("capacity_kw".to_string(), "-1".to_string());
        assert_eq!(validate_inputs(&config, &values)[0].kind, InputErrorKind::BelowMin(0.0));

        values.insert("capacity_kw".to_string(), "9000".to_string());
        let errors = validate_inputs(&config, &values);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "capacity_kw must be at most 5000");
    }

    #[test]
    fn sub_module_versions() {
        let config = solar();
        assert_eq!(config.version_for(None).unwrap(), 1);
        assert_eq!(config.version_for(Some("rooftop")).unwrap(), 4);
        assert!(config.version_for(Some("utility")).is_err());
    }

    #[test]
    fn comparisons_disabled_caps_to_one() {
        let mut config = solar();
        config.max_comparison_cases = 5;
        assert_eq!(config.effective_max_cases(), 5);
        config.allow_comparisons = false;
        assert_eq!(config.effective_max_cases(), 1);
        config.allow_comparisons = true;
        config.max_comparison_cases = 0;
        assert_eq!(config.effective_max_cases(), 1);
    }
}
