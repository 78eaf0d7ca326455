// Series alignment: merge per-variable series onto shared time buckets, then forward-fill.
// Pure and synchronous; callers fetch the per-variable arrays beforehand.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::AlignError;
use crate::models::{AlignedRow, RawSeriesPoint, SeriesPoint, Variable, VariableMap};

/// Bucket tolerance and synthesis step used by the chart views.
pub const DEFAULT_TOLERANCE_MS: i64 = 7_000_000;

/// Upper bound on rows (real plus synthesized) one alignment may produce.
pub const DEFAULT_MAX_ROWS: usize = 100_000;

/// How points are assigned to buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketOrder {
    /// Series by series, points in received order, first matching bucket in creation order.
    /// Output follows bucket creation order, which is only chronological for interleaved input.
    #[default]
    Insertion,
    /// All points stably sorted by time first; output is strictly chronological.
    Chronological,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOptions {
    /// Max distance between a point and a bucket's key; also the synthesis step.
    pub tolerance_ms: i64,
    pub order: BucketOrder,
    pub max_rows: usize,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            order: BucketOrder::default(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Merge then forward-fill.
pub fn align(
    series: &[Vec<SeriesPoint>],
    options: &AlignOptions,
) -> Result<Vec<AlignedRow>, AlignError> {
    let rows = merge_buckets(series, options.tolerance_ms, options.order);
    forward_fill(rows, options.tolerance_ms, options.max_rows)
}

/// Boundary entry point for untyped input (HTTP bodies). Rejects anything that is not an array of arrays.
pub fn align_json(
    input: &Value,
    options: &AlignOptions,
    variables: &VariableMap,
) -> Result<Vec<AlignedRow>, AlignError> {
    if options.tolerance_ms <= 0 {
        return Err(AlignError::InvalidTolerance(options.tolerance_ms));
    }
    let series = parse_series(input, variables)?;
    align(&series, options)
}

pub fn parse_series(
    input: &Value,
    variables: &VariableMap,
) -> Result<Vec<Vec<SeriesPoint>>, AlignError> {
    let Value::Array(outer) = input else {
        return Err(AlignError::NotArrayOfArrays(json_type(input)));
    };
    if outer.iter().any(|s| !s.is_array()) {
        return Err(AlignError::NotArrayOfArrays(
            "an array with non-array elements",
        ));
    }

    let mut series = Vec::with_capacity(outer.len());
    for (series_idx, points) in outer.iter().enumerate() {
        let points = points.as_array().map(Vec::as_slice).unwrap_or_default();
        let mut parsed = Vec::with_capacity(points.len());
        for (index, point) in points.iter().enumerate() {
            let invalid = |reason: String| AlignError::InvalidPoint {
                series: series_idx,
                index,
                reason,
            };
            let raw: RawSeriesPoint =
                serde_json::from_value(point.clone()).map_err(|e| invalid(e.to_string()))?;
            parsed.push(raw.resolve(variables).map_err(invalid)?);
        }
        series.push(parsed);
    }
    Ok(series)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Assign every point to a bucket keyed by the time of the first point that opened it.
/// A later value for the same variable in the same bucket overwrites the earlier one.
pub fn merge_buckets(
    series: &[Vec<SeriesPoint>],
    tolerance_ms: i64,
    order: BucketOrder,
) -> Vec<AlignedRow> {
    match order {
        BucketOrder::Insertion => merge_in_insertion_order(series, tolerance_ms),
        BucketOrder::Chronological => merge_chronologically(series, tolerance_ms),
    }
}

fn merge_in_insertion_order(series: &[Vec<SeriesPoint>], tolerance_ms: i64) -> Vec<AlignedRow> {
    let mut buckets: Vec<AlignedRow> = Vec::new();
    for point in series.iter().flatten() {
        match buckets
            .iter_mut()
            .find(|b| b.time.abs_diff(point.time) <= tolerance_ms.unsigned_abs())
        {
            Some(bucket) => bucket.set(point.variable.clone(), point.value),
            None => {
                let mut bucket = AlignedRow::new(point.time);
                bucket.set(point.variable.clone(), point.value);
                buckets.push(bucket);
            }
        }
    }
    buckets
}

fn merge_chronologically(series: &[Vec<SeriesPoint>], tolerance_ms: i64) -> Vec<AlignedRow> {
    let mut points: Vec<&SeriesPoint> = series.iter().flatten().collect();
    points.sort_by_key(|p| p.time);

    let mut buckets: Vec<AlignedRow> = Vec::new();
    for point in points {
        if let Some(bucket) = buckets.last_mut()
            && point.time.abs_diff(bucket.time) <= tolerance_ms.unsigned_abs()
        {
            bucket.set(point.variable.clone(), point.value);
            continue;
        }
        let mut bucket = AlignedRow::new(point.time);
        bucket.set(point.variable.clone(), point.value);
        buckets.push(bucket);
    }
    buckets
}

/// Carry `light` into rows that lack it, then insert rows every `step_ms` between consecutive
/// rows holding all last-known values. Nothing is synthesized after the final row.
/// Fails with `TooManyRows` before allocating if the output would exceed `max_rows`.
pub fn forward_fill(
    rows: Vec<AlignedRow>,
    step_ms: i64,
    max_rows: usize,
) -> Result<Vec<AlignedRow>, AlignError> {
    if rows.len() > max_rows {
        return Err(AlignError::TooManyRows { limit: max_rows });
    }
    let total = rows.len();
    let mut out = Vec::with_capacity(total);
    let mut last_known: BTreeMap<Variable, f64> = BTreeMap::new();
    let mut synthesized: u128 = 0;
    let mut rows = rows.into_iter().peekable();

    while let Some(mut row) = rows.next() {
        if !row.fields.contains_key(&Variable::Light)
            && let Some(&light) = last_known.get(&Variable::Light)
        {
            row.set(Variable::Light, light);
        }
        last_known.extend(row.fields.iter().map(|(k, v)| (k.clone(), *v)));

        let time = row.time;
        out.push(row);

        if step_ms > 0
            && let Some(next) = rows.peek()
        {
            synthesized += synthetic_count(time, next.time, step_ms);
            if total as u128 + synthesized > max_rows as u128 {
                return Err(AlignError::TooManyRows { limit: max_rows });
            }
            let mut t = time.saturating_add(step_ms);
            while t < next.time {
                out.push(AlignedRow {
                    time: t,
                    fields: last_known.clone(),
                });
                t = t.saturating_add(step_ms);
            }
        }
    }
    Ok(out)
}

/// Rows at `from + k*step` (k >= 1) strictly before `to`.
fn synthetic_count(from: i64, to: i64, step_ms: i64) -> u128 {
    let gap = i128::from(to) - i128::from(from);
    if gap <= 0 {
        return 0;
    }
    ((gap - 1) / i128::from(step_ms)) as u128
}
