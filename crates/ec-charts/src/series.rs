//! Minimal projection of a chart option tree: the parts axis scaling needs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ChartResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Line,
    Spline,
    Area,
    AreaSpline,
    #[default]
    Column,
    Bar,
    Scatter,
    #[serde(other)]
    Other,
}

impl SeriesKind {
    /// Kinds summed together when no series on the axis says otherwise.
    pub fn stacks_by_default(self) -> bool {
        matches!(
            self,
            SeriesKind::Area | SeriesKind::AreaSpline | SeriesKind::Column | SeriesKind::Bar
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stacking {
    Normal,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Vec<Option<f64>>,
    #[serde(default)]
    pub y_axis: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SeriesKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking: Option<Stacking>,
}

impl Series {
    pub fn new(data: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            data: data.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn values(data: &[f64]) -> Self {
        Self::new(data.iter().copied().map(Some))
    }

    pub fn on_axis(mut self, y_axis: usize) -> Self {
        self.y_axis = y_axis;
        self
    }

    pub fn kind(mut self, kind: SeriesKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn stacking(mut self, stacking: Stacking) -> Self {
        self.stacking = Some(stacking);
        self
    }

    /// Finite, present points.
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().filter_map(|v| v.filter(|v| v.is_finite()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartMeta {
    #[serde(rename = "type", default)]
    pub kind: SeriesKind,
}

/// Explicit bounds set by upstream formatting; used verbatim when present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    #[serde(default)]
    pub chart: ChartMeta,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub y_axis: Vec<AxisOptions>,
}

impl ChartRecord {
    pub fn with_series(series: Vec<Series>) -> Self {
        Self {
            series,
            ..Default::default()
        }
    }

    /// Project a full option tree; unknown keys are ignored.
    pub fn from_options(options: &Value) -> ChartResult<Self> {
        Ok(Self::deserialize(options)?)
    }

    pub fn load(path: &Path) -> ChartResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Effective kind of a series: its own, else the chart's.
    pub fn kind_of(&self, series: &Series) -> SeriesKind {
        series.kind.unwrap_or(self.chart.kind)
    }
}
