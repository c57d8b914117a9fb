//! Initial load instructions for a module screen, as carried in the page
//! query string.

use ec_core::{BatchId, CaseId, parse_id_list};

use crate::error::{AppError, AppResult};

/// What to put on screen when a module screen opens. At most one source
/// is applied; see [`LoadInstructions::source`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadInstructions {
    pub module_type: Option<String>,
    pub load_case_ids: Vec<CaseId>,
    pub load_batch_id: Option<BatchId>,
    pub load_demo_case_ids: Vec<CaseId>,
    pub load_demo_batch_id: Option<BatchId>,
    pub duplicate_case_ids: Vec<CaseId>,
}

/// The single source hydration will read from.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    Batch(BatchId),
    DemoBatch(BatchId),
    Cases(Vec<CaseId>),
    DemoCases(Vec<CaseId>),
    Duplicate(Vec<CaseId>),
}

impl LoadInstructions {
    /// Parse `a=1&b=2` style parameters; a leading `?` is allowed. Unknown
    /// keys are ignored, malformed ids are an error.
    pub fn from_query(query: &str) -> AppResult<Self> {
        let mut out = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(raw);
            match key {
                "moduleType" => {
                    if !value.is_empty() {
                        out.module_type = Some(value);
                    }
                }
                "loadCaseIds" => out.load_case_ids = ids(key, &value)?,
                "loadBatchId" => out.load_batch_id = single(key, &value)?,
                "loadDemoCaseIds" => out.load_demo_case_ids = ids(key, &value)?,
                "loadDemoBatchId" => out.load_demo_batch_id = single(key, &value)?,
                "duplicateCaseIds" => out.duplicate_case_ids = ids(key, &value)?,
                _ => tracing::debug!(key, "ignoring unknown load parameter"),
            }
        }
        Ok(out)
    }

    /// Batches win over loose cases, saved items over demos, and
    /// duplication comes last.
    pub fn source(&self) -> Option<LoadSource> {
        let source = if let Some(id) = self.load_batch_id {
            LoadSource::Batch(id)
        } else if let Some(id) = self.load_demo_batch_id {
            LoadSource::DemoBatch(id)
        } else if !self.load_case_ids.is_empty() {
            LoadSource::Cases(self.load_case_ids.clone())
        } else if !self.load_demo_case_ids.is_empty() {
            LoadSource::DemoCases(self.load_demo_case_ids.clone())
        } else if !self.duplicate_case_ids.is_empty() {
            LoadSource::Duplicate(self.duplicate_case_ids.clone())
        } else {
            return None;
        };

        let given = [
            self.load_batch_id.is_some(),
            self.load_demo_batch_id.is_some(),
            !self.load_case_ids.is_empty(),
            !self.load_demo_case_ids.is_empty(),
            !self.duplicate_case_ids.is_empty(),
        ]
        .into_iter()
        .filter(|given| *given)
        .count();
        if given > 1 {
            tracing::warn!(?source, given, "several load sources given, using one");
        }
        Some(source)
    }

    pub fn is_empty(&self) -> bool {
        self.source().is_none()
    }
}

fn ids<I>(key: &str, value: &str) -> AppResult<Vec<I>>
where
    I: TryFrom<u32, Error = ec_core::CoreError>,
{
    parse_id_list(value).map_err(|err| AppError::InvalidInput(format!("{}: {}", key, err)))
}

fn single<I>(key: &str, value: &str) -> AppResult<Option<I>>
where
    I: TryFrom<u32, Error = ec_core::CoreError>,
{
    let mut list: Vec<I> = ids(key, value)?;
    match list.len() {
        0 => Ok(None),
        1 => Ok(list.pop()),
        n => Err(AppError::InvalidInput(format!(
            "{} takes one id, got {}",
            key, n
        ))),
    }
}

/// Minimal percent-decoding: `+` and `%XX` escapes. Invalid escapes are
/// kept literally.
fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
