//! Moving cases and batches between the comparison screen and the local
//! store, and keeping batch membership consistent with deletions.

use std::collections::BTreeSet;

use ec_core::{BatchId, CaseId, ModuleConfig, SavedCaseData};
use ec_store::{DemoLibrary, Listed, LocalStore, SavedBatch, SavedCase};

use crate::error::{AppError, AppResult};
use crate::state::{Action, CaseIdAssignment, ComparisonStore, LoadedCase};

impl From<SavedCase> for LoadedCase {
    fn from(saved: SavedCase) -> Self {
        LoadedCase {
            saved_case_id: saved.id,
            name: saved.name,
            module_type: saved.module_type,
            data: saved.data,
            is_demo: saved.is_demo,
        }
    }
}

/// Demo cases are not in the local store, so they carry no saved id.
fn demo_case(case: &SavedCase) -> LoadedCase {
    LoadedCase {
        saved_case_id: None,
        name: case.name.clone(),
        module_type: case.module_type.clone(),
        data: case.data.clone(),
        is_demo: true,
    }
}

/// Saved cases for `ids` in request order. Ids that no longer exist are
/// skipped with a warning.
pub fn load_cases(store: &LocalStore, ids: &[CaseId]) -> AppResult<Vec<LoadedCase>> {
    let found = store.bulk_get::<SavedCase>(ids)?;
    Ok(ids
        .iter()
        .zip(found)
        .filter_map(|(id, case)| {
            if case.is_none() {
                tracing::warn!(case_id = %id, "saved case not found, skipping");
            }
            case.map(LoadedCase::from)
        })
        .collect())
}

pub fn load_batch(store: &LocalStore, id: BatchId) -> AppResult<(SavedBatch, Vec<LoadedCase>)> {
    let batch = store
        .get::<SavedBatch>(id)?
        .ok_or(AppError::BatchNotFound(id))?;
    let cases = load_cases(store, &batch.case_ids)?;
    Ok((batch, cases))
}

/// Read a batch and replace the comparison columns with its members.
pub fn load_batch_into(
    store: &LocalStore,
    comparison: &mut ComparisonStore,
    id: BatchId,
) -> AppResult<()> {
    let (batch, cases) = load_batch(store, id)?;
    comparison.dispatch(Action::LoadBatch { batch, cases });
    Ok(())
}

pub fn load_demo_cases(demo: &DemoLibrary, ids: &[CaseId]) -> Vec<LoadedCase> {
    demo.cases_for(ids).iter().map(demo_case).collect()
}

pub fn load_demo_batch(
    demo: &DemoLibrary,
    id: BatchId,
) -> AppResult<(SavedBatch, Vec<LoadedCase>)> {
    let batch = demo.batch(id).cloned().ok_or(AppError::BatchNotFound(id))?;
    let cases = load_demo_cases(demo, &batch.case_ids);
    Ok((batch, cases))
}

/// Records of one kind in display order (sort index, then id).
pub fn sorted<T: Listed>(store: &LocalStore) -> AppResult<Vec<T>> {
    let mut records = store.all::<T>()?;
    records.sort_by_key(|r| (r.sort_index(), r.key().map(Into::<u32>::into)));
    Ok(records)
}

fn next_sort_index<T: Listed>(store: &LocalStore) -> AppResult<u32> {
    Ok(store
        .all::<T>()?
        .iter()
        .map(|r| r.sort_index().saturating_add(1))
        .max()
        .unwrap_or(0))
}

/// Persist column `index`: updates its saved case if it has one, otherwise
/// creates a new one. The column then mirrors the saved record.
pub fn save_case_at(
    store: &LocalStore,
    comparison: &mut ComparisonStore,
    index: usize,
    name: Option<&str>,
) -> AppResult<CaseId> {
    let state = comparison.state();
    let case = state.case(index).ok_or(AppError::NoSuchColumn {
        index,
        len: state.cases().len(),
    })?;
    let config = state.config();

    let data = match &case.data {
        Some(data) => data.clone(),
        None => SavedCaseData {
            sub_module_type: state.sub_module_type.clone(),
            ..SavedCaseData::with_inputs(config.default_input_values(), state.module_version)
        },
    };
    let name = name
        .map(str::to_string)
        .or_else(|| case.name.clone())
        .unwrap_or_else(|| format!("{} case {}", config.module_type, index + 1));

    let existing = match case.saved_case_id {
        Some(id) if !case.is_demo => store.get::<SavedCase>(id)?,
        _ => None,
    };

    let saved = match existing {
        Some(mut record) => {
            record.name = name.clone();
            record.data = data;
            record.touch();
            store.put(record)?
        }
        None => {
            let mut record = SavedCase::new(name.clone(), config.module_type.clone(), data);
            record.sort_index = next_sort_index::<SavedCase>(store)?;
            store.add(record)?
        }
    };
    let id = saved.id.ok_or(AppError::Store("saved case has no id".to_string()))?;

    comparison.dispatch(Action::SetCaseNameAtIndex { index, name });
    comparison.dispatch(Action::SetComparisonCaseIdAtIndex {
        index,
        value: CaseIdAssignment::Saved(id),
    });
    tracing::info!(case_id = %id, index, "saved case");
    Ok(id)
}

/// Persist a new batch from the current columns. Every column must already
/// be saved. The new batch becomes the loaded batch.
pub fn save_batch(
    store: &LocalStore,
    comparison: &mut ComparisonStore,
    name: &str,
) -> AppResult<SavedBatch> {
    let batch = batch_from_columns(store, comparison, name)?;
    let saved = store.add(batch)?;
    comparison.dispatch(Action::SetBatch(Some(saved.clone())));
    tracing::info!(batch_id = ?saved.id, cases = saved.case_ids.len(), "saved batch");
    Ok(saved)
}

/// Write the current column membership into the loaded batch.
pub fn update_loaded_batch(
    store: &LocalStore,
    comparison: &mut ComparisonStore,
) -> AppResult<SavedBatch> {
    let Some(loaded) = comparison.state().saved_batch.clone() else {
        return Err(AppError::InvalidInput("no batch is loaded".to_string()));
    };
    if loaded.is_demo {
        return Err(AppError::ReadOnlyDemo);
    }
    let id = loaded.id.ok_or(AppError::InvalidInput("loaded batch has no id".to_string()))?;

    let fresh = batch_from_columns(store, comparison, &loaded.name)?;
    let mut record = store.get::<SavedBatch>(id)?.ok_or(AppError::BatchNotFound(id))?;
    record.case_ids = fresh.case_ids;
    record.is_focus_link_active = fresh.is_focus_link_active;
    record.touch();
    let saved = store.put(record)?;
    comparison.dispatch(Action::SetBatch(Some(saved.clone())));
    Ok(saved)
}

fn batch_from_columns(
    store: &LocalStore,
    comparison: &ComparisonStore,
    name: &str,
) -> AppResult<SavedBatch> {
    let state = comparison.state();
    let case_ids = state
        .saved_case_ids()
        .into_iter()
        .enumerate()
        .map(|(index, id)| id.ok_or(AppError::UnsavedCase { index }))
        .collect::<AppResult<Vec<_>>>()?;

    let max = state.max_comparison_cases;
    if case_ids.len() > max {
        return Err(AppError::TooManyCases {
            count: case_ids.len(),
            max,
        });
    }

    let mut batch = SavedBatch::new(name, state.config().module_type.clone(), case_ids);
    batch.is_focus_link_active = state.cases().iter().all(|c| c.is_focus_mode_active);
    batch.sort_index = next_sort_index::<SavedBatch>(store)?;
    Ok(batch)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub deleted: usize,
    /// Batches that lost members.
    pub pruned_batches: Vec<BatchId>,
    /// Pruned batches that are now empty (they are kept).
    pub emptied_batches: Vec<BatchId>,
}

/// Delete saved cases and remove them from every batch that lists them.
///
/// Batches are pruned before the cases go, so a failed write never leaves
/// a batch pointing at a deleted case.
pub fn delete_saved_case_ids(store: &LocalStore, ids: &[CaseId]) -> AppResult<DeleteReport> {
    let doomed: BTreeSet<CaseId> = ids.iter().copied().collect();

    let mut report = DeleteReport::default();
    let mut changed = Vec::new();
    for mut batch in store.filter(|b: &SavedBatch| b.case_ids.iter().any(|id| doomed.contains(id)))? {
        batch.case_ids.retain(|id| !doomed.contains(id));
        batch.touch();
        if let Some(id) = batch.id {
            report.pruned_batches.push(id);
            if batch.case_ids.is_empty() {
                report.emptied_batches.push(id);
            }
        }
        changed.push(batch);
    }
    if !changed.is_empty() {
        store.bulk_put(changed)?;
    }

    report.deleted = store.bulk_delete::<SavedCase>(ids)?;

    tracing::info!(
        deleted = report.deleted,
        pruned = report.pruned_batches.len(),
        "deleted saved cases"
    );
    Ok(report)
}

/// Members of a batch split by whether any other batch still lists them.
#[derive(Debug, Clone, PartialEq)]
pub struct DanglingReport {
    pub batch_id: BatchId,
    /// Referenced by no other batch: candidates for cascade delete.
    pub dangling: Vec<CaseId>,
    /// Still referenced elsewhere: never cascade-deleted.
    pub shared: Vec<CaseId>,
}

pub fn dangling_cases_for_batch(store: &LocalStore, batch_id: BatchId) -> AppResult<DanglingReport> {
    let batch = store
        .get::<SavedBatch>(batch_id)?
        .ok_or(AppError::BatchNotFound(batch_id))?;
    let others = store.filter(|b: &SavedBatch| b.id != Some(batch_id))?;

    let mut report = DanglingReport {
        batch_id,
        dangling: Vec::new(),
        shared: Vec::new(),
    };
    let mut seen = BTreeSet::new();
    for case_id in batch.case_ids {
        if !seen.insert(case_id) {
            continue;
        }
        let references = others.iter().filter(|b| b.references(case_id)).count();
        if references == 0 {
            report.dangling.push(case_id);
        } else {
            report.shared.push(case_id);
        }
    }
    Ok(report)
}

/// Delete a batch. With `cascade`, its dangling members are deleted too;
/// shared members always survive.
pub fn delete_batch(
    store: &LocalStore,
    batch_id: BatchId,
    cascade: bool,
) -> AppResult<DanglingReport> {
    let report = dangling_cases_for_batch(store, batch_id)?;
    store.delete::<SavedBatch>(batch_id)?;
    if cascade && !report.dangling.is_empty() {
        let deleted = store.bulk_delete::<SavedCase>(&report.dangling)?;
        tracing::info!(batch_id = %batch_id, deleted, "cascade-deleted dangling cases");
    }
    Ok(report)
}

/// `"Solar Case (copy 3)"` → `"Solar Case"`; other names are unchanged.
pub fn strip_copy_suffix(name: &str) -> &str {
    let Some(rest) = name.strip_suffix(')') else {
        return name;
    };
    match rest.rfind(" (copy ") {
        Some(pos) => {
            let digits = &rest[pos + " (copy ".len()..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                &name[..pos]
            } else {
                name
            }
        }
        None => name,
    }
}

/// Name for a duplicate of `name`: `"<base> (copy N)"`, N being one more
/// than the number of existing copies of the base, moved past any name
/// already taken.
pub fn copy_name<'a>(name: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let base = strip_copy_suffix(name);
    let existing: Vec<&str> = existing.into_iter().collect();
    let copies = existing
        .iter()
        .filter(|n| **n != base && strip_copy_suffix(n) == base)
        .count();

    let mut n = copies + 1;
    loop {
        let candidate = format!("{} (copy {})", base, n);
        if !existing.contains(&candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Clone saved cases under fresh ids and copy names, appended to the end
/// of the list.
pub fn duplicate_cases(
    store: &LocalStore,
    config: &ModuleConfig,
    ids: &[CaseId],
) -> AppResult<Vec<SavedCase>> {
    if !config.allow_case_duplication {
        return Err(AppError::DuplicationDisabled(config.module_type.to_string()));
    }

    let mut copies = Vec::with_capacity(ids.len());
    for id in ids {
        let source = store
            .get::<SavedCase>(*id)?
            .ok_or(AppError::CaseNotFound(*id))?;
        let names = store
            .filter(|c: &SavedCase| c.module_type == source.module_type)?
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();

        let mut copy = SavedCase::new(
            copy_name(&source.name, names.iter().map(String::as_str)),
            source.module_type.clone(),
            source.data.clone(),
        );
        copy.sort_index = next_sort_index::<SavedCase>(store)?;
        copies.push(store.add(copy)?);
    }
    Ok(copies)
}

/// Clone a batch record. Members are shared with the original, not copied.
pub fn duplicate_batch(store: &LocalStore, batch_id: BatchId) -> AppResult<SavedBatch> {
    let source = store
        .get::<SavedBatch>(batch_id)?
        .ok_or(AppError::BatchNotFound(batch_id))?;
    let names = store
        .all::<SavedBatch>()?
        .into_iter()
        .map(|b| b.name)
        .collect::<Vec<_>>();

    let mut copy = SavedBatch::new(
        copy_name(&source.name, names.iter().map(String::as_str)),
        source.module_type.clone(),
        source.case_ids.clone(),
    );
    copy.is_focus_link_active = source.is_focus_link_active;
    copy.sort_index = next_sort_index::<SavedBatch>(store)?;
    Ok(store.add(copy)?)
}

/// Persist a new display order: `ordered` first, in that order, then every
/// other record in its previous order. Every record is reindexed 0..n.
pub fn reorder<T>(store: &LocalStore, ordered: &[T::Key]) -> AppResult<()>
where
    T: Listed,
    T::Key: PartialEq,
{
    let current = sorted::<T>(store)?;
    let mut reordered: Vec<T> = Vec::with_capacity(current.len());
    for key in ordered {
        if let Some(record) = current.iter().find(|r| r.key() == Some(*key)) {
            if !reordered.iter().any(|r| r.key() == Some(*key)) {
                reordered.push(record.clone());
            }
        }
    }
    for record in &current {
        if !reordered.iter().any(|r| r.key() == record.key()) {
            reordered.push(record.clone());
        }
    }

    for (index, record) in reordered.iter_mut().enumerate() {
        record.set_sort_index(u32::try_from(index).unwrap_or(u32::MAX));
    }
    store.bulk_put(reordered)?;
    Ok(())
}

pub fn reorder_cases(store: &LocalStore, ordered: &[CaseId]) -> AppResult<()> {
    reorder::<SavedCase>(store, ordered)
}

pub fn reorder_batches(store: &LocalStore, ordered: &[BatchId]) -> AppResult<()> {
    reorder::<SavedBatch>(store, ordered)
}

pub fn rename<T: Listed>(store: &LocalStore, id: T::Key, name: &str) -> AppResult<bool> {
    Ok(store.update::<T>(id, |record| {
        record.set_name(name.to_string());
        record.touch();
    })?)
}
