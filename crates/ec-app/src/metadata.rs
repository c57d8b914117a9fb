//! Module catalog loading and lookup.

use std::path::Path;

use ec_core::{ModuleConfig, ModuleType};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Every analysis module the front-end knows about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCatalog {
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Summary of a module for listing.
#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub module_type: ModuleType,
    pub api_path: String,
    pub input_count: usize,
    pub max_comparison_cases: usize,
}

impl ModuleCatalog {
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let catalog: ModuleCatalog = serde_yaml::from_str(content)
            .map_err(|e| AppError::Catalog(format!("Failed to parse module catalog YAML: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::CatalogRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> AppResult<()> {
        for (i, module) in self.modules.iter().enumerate() {
            if self.modules[..i]
                .iter()
                .any(|m| m.module_type == module.module_type)
            {
                return Err(AppError::Catalog(format!(
                    "Module '{}' is defined twice",
                    module.module_type
                )));
            }
            if module.api_path.trim().is_empty() {
                return Err(AppError::Catalog(format!(
                    "Module '{}' has no api_path",
                    module.module_type
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, module_type: &str) -> AppResult<&ModuleConfig> {
        self.modules
            .iter()
            .find(|m| m.module_type.as_str() == module_type)
            .ok_or_else(|| ec_core::CoreError::UnknownModule(module_type.to_string()).into())
    }

    pub fn summaries(&self) -> Vec<ModuleSummary> {
        self.modules
            .iter()
            .map(|m| ModuleSummary {
                module_type: m.module_type.clone(),
                api_path: m.api_path.clone(),
                input_count: m.inputs.len(),
                max_comparison_cases: m.effective_max_cases(),
            })
            .collect()
    }
}
