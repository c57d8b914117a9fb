//! Recursive structural merge of JSON option trees.
//!
//! Objects merge key by key, scalars and `null` from the overlay replace the
//! base, and arrays follow the chosen [`ArrayMerge`] policy.

use serde_json::{Map, Value, json};

use crate::axis::AxisMaxima;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
    /// Overlay array replaces the base array.
    #[default]
    Replace,
    /// Overlay elements are appended to the base array.
    Concat,
    /// Elements at the same index merge recursively; extra overlay
    /// elements are appended.
    ByIndex,
}

pub fn deep_merge(base: &mut Value, overlay: &Value, arrays: ArrayMerge) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_objects(base, overlay, arrays),
        (Value::Array(base), Value::Array(overlay)) => match arrays {
            ArrayMerge::Replace => base.clone_from(overlay),
            ArrayMerge::Concat => base.extend(overlay.iter().cloned()),
            ArrayMerge::ByIndex => {
                for (i, item) in overlay.iter().enumerate() {
                    match base.get_mut(i) {
                        Some(existing) => deep_merge(existing, item, arrays),
                        None => base.push(item.clone()),
                    }
                }
            }
        },
        (base, overlay) => *base = overlay.clone(),
    }
}

fn merge_objects(base: &mut Map<String, Value>, overlay: &Map<String, Value>, arrays: ArrayMerge) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => deep_merge(existing, value, arrays),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Non-mutating form of [`deep_merge`].
pub fn merged(base: &Value, overlay: &Value, arrays: ArrayMerge) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay, arrays);
    out
}

/// Option patch pinning each locked axis to its shared maximum. Merge it
/// with [`ArrayMerge::ByIndex`] so the other axis settings survive.
pub fn axis_override_patch(maxima: &AxisMaxima) -> Value {
    let axes: Vec<Value> = maxima
        .iter()
        .map(|max| match max {
            Some(max) => json!({ "max": max }),
            None => json!({}),
        })
        .collect();
    json!({ "yAxis": axes })
}
