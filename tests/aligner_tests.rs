// Series aligner tests: bucketing tolerance, light forward-fill, synthesis, input checks

mod common;

use common::point;
use growdash::aligner::{
    AlignOptions, BucketOrder, DEFAULT_MAX_ROWS, align, align_json, forward_fill, merge_buckets,
};
use growdash::error::AlignError;
use growdash::models::{AlignedRow, TEMP_CODE, Variable, VariableMap};
use serde_json::json;

fn row(time: i64, fields: &[(Variable, f64)]) -> AlignedRow {
    let mut r = AlignedRow::new(time);
    for (k, v) in fields {
        r.set(k.clone(), *v);
    }
    r
}

#[test]
fn test_three_series_at_same_time_become_one_row() {
    let series = vec![
        vec![point(1000, Variable::Temp, 20.0)],
        vec![point(1000, Variable::Hum, 55.0)],
        vec![point(1000, Variable::Light, 1.0)],
    ];
    let rows = align(&series, &AlignOptions::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        serde_json::to_value(&rows[0]).unwrap(),
        json!({"time": 1000, "temp": 20.0, "hum": 55.0, "light": 1.0})
    );
}

#[test]
fn test_points_within_tolerance_share_a_row() {
    let series = vec![
        vec![point(0, Variable::Temp, 20.0)],
        vec![point(6_999_999, Variable::Hum, 55.0)],
    ];
    let rows = merge_buckets(&series, 7_000_000, BucketOrder::Insertion);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time, 0);
    assert_eq!(rows[0].get(&Variable::Hum), Some(55.0));
}

#[test]
fn test_points_beyond_tolerance_get_separate_rows() {
    let series = vec![
        vec![point(0, Variable::Temp, 20.0)],
        vec![point(7_000_001, Variable::Hum, 55.0)],
    ];
    let rows = merge_buckets(&series, 7_000_000, BucketOrder::Insertion);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(&Variable::Hum), None);
    assert_eq!(rows[1].time, 7_000_001);
}

#[test]
fn test_tolerance_boundary_is_inclusive() {
    let series = vec![
        vec![point(1_000, Variable::Temp, 20.0)],
        vec![point(4_000, Variable::Hum, 55.0)],
    ];
    assert_eq!(merge_buckets(&series, 3_000, BucketOrder::Insertion).len(), 1);
}

#[test]
fn test_point_joins_first_matching_bucket_in_creation_order() {
    // Buckets at 0 and 5000; a point at 2600 is within 3000 of both and goes to the first.
    let series = vec![
        vec![point(0, Variable::Temp, 1.0), point(5_000, Variable::Temp, 2.0)],
        vec![point(2_600, Variable::Hum, 3.0)],
    ];
    let rows = merge_buckets(&series, 3_000, BucketOrder::Insertion);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(&Variable::Hum), Some(3.0));
    assert_eq!(rows[1].get(&Variable::Hum), None);
}

#[test]
fn test_insertion_order_output_follows_bucket_creation() {
    let series = vec![
        vec![point(20_000_000, Variable::Temp, 21.0)],
        vec![point(0, Variable::Hum, 50.0)],
    ];
    let rows = merge_buckets(&series, 1_000, BucketOrder::Insertion);
    let times: Vec<i64> = rows.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![20_000_000, 0]);
}

#[test]
fn test_chronological_order_sorts_points_before_bucketing() {
    let series = vec![
        vec![point(20_000_000, Variable::Temp, 21.0)],
        vec![point(0, Variable::Hum, 50.0), point(500, Variable::Light, 1.0)],
    ];
    let rows = merge_buckets(&series, 1_000, BucketOrder::Chronological);
    let times: Vec<i64> = rows.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![0, 20_000_000]);
    assert_eq!(rows[0].get(&Variable::Light), Some(1.0));
}

#[test]
fn test_later_value_overwrites_within_bucket() {
    let series = vec![vec![
        point(0, Variable::Temp, 20.0),
        point(10, Variable::Temp, 22.0),
    ]];
    let rows = merge_buckets(&series, 1_000, BucketOrder::Insertion);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time, 0);
    assert_eq!(rows[0].get(&Variable::Temp), Some(22.0));
}

#[test]
fn test_light_is_carried_forward_into_rows_missing_it() {
    let rows = vec![
        row(0, &[(Variable::Temp, 20.0), (Variable::Light, 1.0)]),
        row(10, &[(Variable::Temp, 21.0)]),
        row(20, &[(Variable::Temp, 22.0)]),
    ];
    let out = forward_fill(rows, 100, DEFAULT_MAX_ROWS).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[2].get(&Variable::Light), Some(1.0));
    assert_eq!(out[2].get(&Variable::Temp), Some(22.0));
}

#[test]
fn test_only_light_is_filled_on_real_rows() {
    let rows = vec![
        row(0, &[(Variable::Hum, 50.0)]),
        row(10, &[(Variable::Temp, 21.0)]),
    ];
    let out = forward_fill(rows, 100, DEFAULT_MAX_ROWS).unwrap();
    assert_eq!(out[1].get(&Variable::Hum), None);
    assert_eq!(out[1].get(&Variable::Light), None);
}

#[test]
fn test_synthesis_inserts_rows_at_each_step_before_next_row() {
    let rows = vec![
        row(0, &[(Variable::Temp, 20.0), (Variable::Light, 1.0)]),
        row(21_000_000, &[(Variable::Temp, 25.0)]),
    ];
    let out = forward_fill(rows, 7_000_000, DEFAULT_MAX_ROWS).unwrap();
    let times: Vec<i64> = out.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![0, 7_000_000, 14_000_000, 21_000_000]);
    for synthetic in &out[1..3] {
        assert_eq!(synthetic.get(&Variable::Temp), Some(20.0));
        assert_eq!(synthetic.get(&Variable::Light), Some(1.0));
    }
    assert_eq!(out[3].get(&Variable::Temp), Some(25.0));
    assert_eq!(out[3].get(&Variable::Light), Some(1.0));
}

#[test]
fn test_synthetic_rows_carry_merged_snapshot() {
    let rows = vec![
        row(0, &[(Variable::Temp, 20.0)]),
        row(10, &[(Variable::Hum, 60.0)]),
        row(35, &[(Variable::Temp, 23.0)]),
    ];
    let out = forward_fill(rows, 10, DEFAULT_MAX_ROWS).unwrap();
    let synthetic: Vec<&AlignedRow> = out.iter().filter(|r| r.time == 20 || r.time == 30).collect();
    assert_eq!(synthetic.len(), 2);
    for r in synthetic {
        assert_eq!(r.get(&Variable::Temp), Some(20.0));
        assert_eq!(r.get(&Variable::Hum), Some(60.0));
    }
}

#[test]
fn test_no_trailing_extrapolation_after_last_row() {
    let rows = vec![row(0, &[(Variable::Temp, 20.0)])];
    let out = forward_fill(rows, 1_000, DEFAULT_MAX_ROWS).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn test_backwards_rows_get_no_synthesis() {
    let rows = vec![
        row(10_000, &[(Variable::Temp, 1.0)]),
        row(0, &[(Variable::Temp, 2.0)]),
    ];
    assert_eq!(forward_fill(rows, 1_000, DEFAULT_MAX_ROWS).unwrap().len(), 2);
}

#[test]
fn test_flat_array_is_rejected() {
    let input = json!([{"time": 1000, "value": 20, "variable": "temp"}]);
    let err = align_json(&input, &AlignOptions::default(), &VariableMap::default()).unwrap_err();
    assert!(matches!(err, AlignError::NotArrayOfArrays(_)));
}

#[test]
fn test_non_array_input_is_rejected() {
    for input in [json!({"data": []}), json!(null), json!("x"), json!(3)] {
        let err =
            align_json(&input, &AlignOptions::default(), &VariableMap::default()).unwrap_err();
        assert!(matches!(err, AlignError::NotArrayOfArrays(_)), "{input}");
    }
}

#[test]
fn test_empty_outer_array_yields_no_rows() {
    let rows = align_json(&json!([]), &AlignOptions::default(), &VariableMap::default()).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_malformed_point_reports_position() {
    let input = json!([[{"time": 0, "value": 1, "variable": "temp"}], [{"value": 1}]]);
    let err = align_json(&input, &AlignOptions::default(), &VariableMap::default()).unwrap_err();
    match err {
        AlignError::InvalidPoint { series, index, .. } => {
            assert_eq!(series, 1);
            assert_eq!(index, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_non_positive_tolerance_is_rejected() {
    let options = AlignOptions {
        tolerance_ms: 0,
        ..AlignOptions::default()
    };
    let err = align_json(&json!([]), &options, &VariableMap::default()).unwrap_err();
    assert_eq!(err, AlignError::InvalidTolerance(0));
}

#[test]
fn test_json_input_resolves_codes_and_rfc3339_times() {
    let input = json!([
        [{"time": "1970-01-01T00:00:01Z", "value": 20.5, "variable": TEMP_CODE}],
        [{"time": 1000, "value": true, "variable": "light"}],
        [{"time": 1500, "value": 7, "variable": "co2"}]
    ]);
    let rows = align_json(&input, &AlignOptions::default(), &VariableMap::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        serde_json::to_value(&rows[0]).unwrap(),
        json!({"time": 1000, "temp": 20.5, "light": 1.0, "co2": 7.0})
    );
}

#[test]
fn test_synthesis_past_row_limit_is_rejected_before_allocating() {
    let input = json!([[
        {"time": 0, "value": 1, "variable": "temp"},
        {"time": 20_000_000_000_000_i64, "value": 2, "variable": "temp"}
    ]]);
    let options = AlignOptions {
        tolerance_ms: 1,
        ..AlignOptions::default()
    };
    let err = align_json(&input, &options, &VariableMap::default()).unwrap_err();
    assert_eq!(err, AlignError::TooManyRows { limit: DEFAULT_MAX_ROWS });
}

#[test]
fn test_row_limit_counts_real_and_synthetic_rows() {
    let rows = vec![row(0, &[(Variable::Temp, 1.0)]), row(40, &[(Variable::Temp, 2.0)])];
    // 2 real rows + 3 synthetic (10, 20, 30)
    assert_eq!(forward_fill(rows.clone(), 10, 5).unwrap().len(), 5);
    assert_eq!(
        forward_fill(rows, 10, 4).unwrap_err(),
        AlignError::TooManyRows { limit: 4 }
    );
}

#[test]
fn test_extreme_timestamps_do_not_overflow_bucketing() {
    let series = vec![vec![
        point(i64::MIN, Variable::Temp, 1.0),
        point(i64::MAX, Variable::Temp, 2.0),
    ]];
    for order in [BucketOrder::Insertion, BucketOrder::Chronological] {
        let rows = merge_buckets(&series, 7_000_000, order);
        let times: Vec<i64> = rows.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![i64::MIN, i64::MAX], "{order:?}");
    }
}

#[test]
fn test_extreme_timestamps_hit_the_row_limit_instead_of_overflowing() {
    let series = vec![vec![
        point(i64::MIN, Variable::Temp, 1.0),
        point(i64::MAX, Variable::Temp, 2.0),
    ]];
    let err = align(&series, &AlignOptions::default()).unwrap_err();
    assert_eq!(err, AlignError::TooManyRows { limit: DEFAULT_MAX_ROWS });
}

#[test]
fn test_variable_named_time_is_rejected() {
    let input = json!([[{"time": 1000, "value": 5, "variable": "time"}]]);
    let err = align_json(&input, &AlignOptions::default(), &VariableMap::default()).unwrap_err();
    match err {
        AlignError::InvalidPoint { series, index, reason } => {
            assert_eq!((series, index), (0, 0));
            assert!(reason.contains("time"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
