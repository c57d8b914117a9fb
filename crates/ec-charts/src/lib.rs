//! ec-charts: shared y-axis scaling across comparison columns, and
//! structural merging of chart option trees.

pub mod axis;
pub mod merge;
pub mod series;

pub use axis::{
    AxisMaxima, Extreme, MAX_AXES, SharedAxisBounds, axis_extreme, biggest_y_max,
    shared_axis_bounds, smallest_y_min,
};
pub use merge::{ArrayMerge, axis_override_patch, deep_merge, merged};
pub use series::{AxisOptions, ChartMeta, ChartRecord, Series, SeriesKind, Stacking};

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
