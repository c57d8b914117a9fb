//! Shared y-axis extremes across comparison columns.
//!
//! Each column contributes one optional [`ChartRecord`]. For every axis the
//! column's extreme is computed from its series (stacked series summed per
//! x position, overlaid series taken individually) unless the axis already
//! carries an explicit bound. Columns are then folded together so every
//! chart can be drawn on the same scale.

use crate::series::{ChartRecord, Series, Stacking};

/// Primary and secondary axis only.
pub const MAX_AXES: usize = 2;

/// Per-axis shared bound; `None` means "let the chart auto-scale".
pub type AxisMaxima = [Option<f64>; MAX_AXES];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

impl Extreme {
    fn pick(self, a: f64, b: f64) -> f64 {
        match self {
            Extreme::Max => a.max(b),
            Extreme::Min => a.min(b),
        }
    }

    fn fold(self, a: Option<f64>, b: Option<f64>) -> Option<f64> {
        match (a, b) {
            (Some(a), Some(b)) => Some(self.pick(a, b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    fn of(self, values: impl Iterator<Item = f64>) -> Option<f64> {
        values
            .filter(|v| v.is_finite())
            .reduce(|a, b| self.pick(a, b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SharedAxisBounds {
    pub max: AxisMaxima,
    pub min: AxisMaxima,
}

/// Split the series on one axis into (stacked, overlaid).
///
/// If any series names a stacking mode, exactly those series stack and the
/// rest overlay. If none does, series whose kind stacks by default
/// (area, column, bar) stack together and the rest overlay.
fn partition<'a>(chart: &ChartRecord, on_axis: &[&'a Series]) -> (Vec<&'a Series>, Vec<&'a Series>) {
    let any_explicit = on_axis.iter().any(|s| s.stacking.is_some());
    on_axis.iter().copied().partition(|s| {
        if any_explicit {
            s.stacking.is_some()
        } else {
            chart.kind_of(s).stacks_by_default()
        }
    })
}

fn stacked_extreme(stacked: &[&Series], which: Extreme) -> Option<f64> {
    if stacked.is_empty() {
        return None;
    }

    let has_points = stacked.iter().any(|s| s.points().next().is_some());
    if stacked.iter().all(|s| s.stacking == Some(Stacking::Percent)) {
        return has_points.then_some(match which {
            Extreme::Max => 100.0,
            Extreme::Min => 0.0,
        });
    }

    let len = stacked.iter().map(|s| s.data.len()).max().unwrap_or(0);
    let sums = (0..len).filter_map(|x| {
        let mut present = false;
        let mut sum = 0.0;
        for series in stacked {
            if let Some(v) = series.data.get(x).copied().flatten().filter(|v| v.is_finite()) {
                present = true;
                sum += v;
            }
        }
        present.then_some(sum)
    });
    which.of(sums)
}

/// Extreme of one axis of one chart, or `None` if nothing is drawn on it.
pub fn axis_extreme(chart: &ChartRecord, axis: usize, which: Extreme) -> Option<f64> {
    let explicit = chart.y_axis.get(axis).and_then(|opts| match which {
        Extreme::Max => opts.max,
        Extreme::Min => opts.min,
    });
    if let Some(value) = explicit.filter(|v| v.is_finite()) {
        return Some(value);
    }

    let on_axis: Vec<&Series> = chart.series.iter().filter(|s| s.y_axis == axis).collect();
    if on_axis.is_empty() {
        return None;
    }

    let (stacked, overlaid) = partition(chart, &on_axis);
    let stacked = stacked_extreme(&stacked, which);
    let overlaid = overlaid
        .iter()
        .filter_map(|s| which.of(s.points()))
        .reduce(|a, b| which.pick(a, b));

    // an axis whose series are all empty still exists; it scales from 0
    Some(which.fold(stacked, overlaid).unwrap_or(0.0))
}

fn shared_extremes(charts: &[Option<ChartRecord>], locked: bool, which: Extreme) -> AxisMaxima {
    let mut out: AxisMaxima = [None; MAX_AXES];
    if !locked {
        return out;
    }

    for chart in charts.iter().flatten() {
        if chart.series.iter().any(|s| s.y_axis >= MAX_AXES) {
            tracing::debug!("ignoring series assigned beyond the secondary axis");
        }
        for (axis, slot) in out.iter_mut().enumerate() {
            *slot = which.fold(*slot, axis_extreme(chart, axis, which));
        }
    }
    out
}

/// Largest value per axis across all columns (max of maxes). All `None`
/// when axis locking is off.
pub fn biggest_y_max(charts: &[Option<ChartRecord>], locked: bool) -> AxisMaxima {
    shared_extremes(charts, locked, Extreme::Max)
}

/// Smallest value per axis across all columns.
pub fn smallest_y_min(charts: &[Option<ChartRecord>], locked: bool) -> AxisMaxima {
    shared_extremes(charts, locked, Extreme::Min)
}

pub fn shared_axis_bounds(charts: &[Option<ChartRecord>], locked: bool) -> SharedAxisBounds {
    SharedAxisBounds {
        max: biggest_y_max(charts, locked),
        min: smallest_y_min(charts, locked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{AxisOptions, SeriesKind};

    fn chart(series: Vec<Series>) -> Option<ChartRecord> {
        Some(ChartRecord::with_series(series))
    }

    #[test]
    fn default_series_stack() {
        let charts = [chart(vec![Series::values(&[3.0, 5.0]), Series::values(&[2.0, 1.0])])];
        // x0: 3+2=5, x1: 5+1=6
        assert_eq!(biggest_y_max(&charts, true), [Some(6.0), None]);
    }

    #[test]
    fn overlaid_series_are_not_summed() {
        let charts = [chart(vec![
            Series::values(&[4.0, 4.0]).stacking(Stacking::Normal),
            Series::values(&[10.0, 10.0]),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(10.0));

        let charts = [chart(vec![
            Series::values(&[4.0, 4.0]).stacking(Stacking::Normal),
            Series::values(&[5.0, 1.0]).stacking(Stacking::Normal),
            Series::values(&[7.0, 7.0]),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(9.0));
    }

    #[test]
    fn line_series_overlay_by_default() {
        let charts = [chart(vec![
            Series::values(&[3.0, 5.0]).kind(SeriesKind::Line),
            Series::values(&[2.0, 1.0]).kind(SeriesKind::Line),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(5.0));
    }

    #[test]
    fn mixed_kinds_without_stacking_stack_only_stackable_kinds() {
        let charts = [chart(vec![
            Series::values(&[3.0, 3.0]),
            Series::values(&[3.0, 3.0]).kind(SeriesKind::Area),
            Series::values(&[5.0, 2.0]).kind(SeriesKind::Line),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(6.0));
    }

    #[test]
    fn max_of_maxes_across_columns_per_axis() {
        let charts = [
            chart(vec![Series::values(&[1.0, 2.0]), Series::values(&[50.0]).on_axis(1)]),
            None,
            chart(vec![Series::values(&[9.0])]),
        ];
        assert_eq!(biggest_y_max(&charts, true), [Some(9.0), Some(50.0)]);
    }

    #[test]
    fn explicit_axis_max_is_used_verbatim() {
        let mut record = ChartRecord::with_series(vec![Series::values(&[100.0])]);
        record.y_axis = vec![AxisOptions {
            max: Some(40.0),
            min: None,
        }];
        let charts = [Some(record), chart(vec![Series::values(&[30.0])])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(40.0));
    }

    #[test]
    fn unlocked_reports_nothing() {
        let charts = [chart(vec![Series::values(&[3.0])])];
        assert_eq!(biggest_y_max(&charts, false), [None, None]);
        assert_eq!(smallest_y_min(&charts, false), [None, None]);
    }

    #[test]
    fn nulls_count_as_zero_in_sums_but_do_not_pull_extremes() {
        let charts = [chart(vec![
            Series::new([Some(-4.0), None]),
            Series::new([Some(-1.0), Some(-2.0)]),
        ])];
        // x0: -5, x1: -2
        assert_eq!(biggest_y_max(&charts, true)[0], Some(-2.0));
        assert_eq!(smallest_y_min(&charts, true)[0], Some(-5.0));
    }

    #[test]
    fn empty_series_do_not_drag_max_to_zero() {
        let charts = [chart(vec![
            Series::values(&[-3.0]).kind(SeriesKind::Line),
            Series::new([None, None]).kind(SeriesKind::Line),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(-3.0));
    }

    #[test]
    fn all_empty_axis_is_zero_not_infinite() {
        let charts = [chart(vec![Series::new([None]), Series::default()])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(0.0));
        assert_eq!(smallest_y_min(&charts, true)[0], Some(0.0));
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let charts = [chart(vec![
            Series::new([Some(f64::INFINITY), Some(2.0), Some(f64::NAN)]).kind(SeriesKind::Line),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(2.0));
        assert_eq!(smallest_y_min(&charts, true)[0], Some(2.0));
    }

    #[test]
    fn percent_stacks_scale_to_hundred() {
        let charts = [chart(vec![
            Series::values(&[3.0]).stacking(Stacking::Percent),
            Series::values(&[1.0]).stacking(Stacking::Percent),
        ])];
        assert_eq!(biggest_y_max(&charts, true)[0], Some(100.0));
    }

    #[test]
    fn series_beyond_secondary_axis_are_ignored() {
        let charts = [chart(vec![Series::values(&[1.0]), Series::values(&[99.0]).on_axis(2)])];
        assert_eq!(biggest_y_max(&charts, true), [Some(1.0), None]);
    }
}
