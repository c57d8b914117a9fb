//! Content-based hashing of run inputs.

use ec_core::InputValues;
use sha2::{Digest, Sha256};

/// Hash of everything that determines a run's result. Columns whose
/// current fingerprint differs from the last committed one are dirty.
pub fn input_fingerprint(
    input_values: &InputValues,
    module_version: u32,
    sub_module_type: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();

    // BTreeMap serializes in key order, so equal inputs hash equally
    let inputs_json = serde_json::to_string(input_values).unwrap_or_default();
    hasher.update(inputs_json.as_bytes());

    hasher.update(module_version.to_le_bytes());
    hasher.update(sub_module_type.unwrap_or("").as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
