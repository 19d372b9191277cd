// Operator tests - behaviors that span operators and compute kernels

mod common;

use common::{chunk, float_column, int_column, schema, string_column, Cell};
use columnar_engine::compute::fill::{drop_null_selection, fill_null, FillStrategy};
use columnar_engine::compute::unique::{unique_selection, Keep};
use columnar_engine::compute::{cast, concat, strings};
use columnar_engine::expr::{col, lit, sum};
use columnar_engine::operator::{
    FilterOperator, GroupByOperator, LimitOperator, Operator,
    ProjectOperator, SortKey, SortOperator, TransformOperator,
};
use columnar_engine::{DType, Scalar};

// ============================================================================
// Filter + Transform interplay
// ============================================================================

#[test]
fn test_transform_after_filter_materializes() {
    let schema = schema(vec![("v", DType::int64())]);
    let data = chunk(
        &schema,
        &[
            vec![Cell::I(1)],
            vec![Cell::I(10)],
            vec![Cell::I(3)],
            vec![Cell::I(20)],
        ],
    );

    let mut filter =
        FilterOperator::new(&col("v").gte(lit(10)), schema.clone()).unwrap();
    let filtered = filter.process(data).unwrap().chunk.unwrap();
    assert!(filtered.selection().is_some());

    let mut transform = TransformOperator::new(
        vec![("doubled".to_string(), col("v").mul(lit(2)))],
        &schema,
    )
    .unwrap();
    let out = transform.process(filtered).unwrap().chunk.unwrap();
    assert!(out.selection().is_none(), "transform materializes");
    assert_eq!(int_column(&out, 0), vec![Some(10), Some(20)]);
    assert_eq!(int_column(&out, 1), vec![Some(20), Some(40)]);
}

#[test]
fn test_filter_and_decomposition_law() {
    // filter(A and B) == filter(A) then filter(B)
    let schema = schema(vec![("v", DType::int64())]);
    let rows: Vec<Vec<Cell>> =
        (0..50).map(|i| vec![Cell::I(i * 7 % 23)]).collect();

    let a = col("v").gt(lit(5));
    let b = col("v").lt(lit(18));

    let mut combined =
        FilterOperator::new(&a.clone().and(b.clone()), schema.clone())
            .unwrap();
    let combined_out = combined
        .process(chunk(&schema, &rows))
        .unwrap()
        .chunk
        .map(|c| int_column(&c, 0))
        .unwrap_or_default();

    let mut first = FilterOperator::new(&a, schema.clone()).unwrap();
    let mut second = FilterOperator::new(&b, schema.clone()).unwrap();
    let staged = first.process(chunk(&schema, &rows)).unwrap().chunk;
    let staged_out = match staged {
        Some(c) => second
            .process(c)
            .unwrap()
            .chunk
            .map(|c| int_column(&c, 0))
            .unwrap_or_default(),
        None => Vec::new(),
    };

    assert_eq!(combined_out, staged_out);
}

// ============================================================================
// Sort
// ============================================================================

#[test]
fn test_sort_idempotence() {
    let schema = schema(vec![("v", DType::int64().nullable())]);
    let rows = vec![
        vec![Cell::I(3)],
        vec![Cell::Null],
        vec![Cell::I(1)],
        vec![Cell::I(2)],
    ];
    let keys = || vec![SortKey::asc("v").nulls_first()];

    let mut sort = SortOperator::new(keys(), schema.clone()).unwrap();
    sort.process(chunk(&schema, &rows)).unwrap();
    let once = sort.finish().unwrap().chunk.unwrap();

    let mut sort2 = SortOperator::new(keys(), schema.clone()).unwrap();
    sort2.process(once.clone()).unwrap();
    let twice = sort2.finish().unwrap().chunk.unwrap();

    assert_eq!(int_column(&once, 0), int_column(&twice, 0));
    assert_eq!(int_column(&once, 0), vec![None, Some(1), Some(2), Some(3)]);
}

#[test]
fn test_sort_strings_byte_lexicographic() {
    let schema = schema(vec![("s", DType::string())]);
    let data = chunk(
        &schema,
        &[
            vec![Cell::S("banana")],
            vec![Cell::S("Apple")],
            vec![Cell::S("apple")],
        ],
    );
    let mut sort =
        SortOperator::new(vec![SortKey::asc("s")], schema.clone()).unwrap();
    sort.process(data).unwrap();
    let out = sort.finish().unwrap().chunk.unwrap();
    // Uppercase bytes sort before lowercase.
    assert_eq!(
        string_column(&out, 0),
        vec![
            Some("Apple".to_string()),
            Some("apple".to_string()),
            Some("banana".to_string())
        ]
    );
}

// ============================================================================
// GroupBy invariants
// ============================================================================

#[test]
fn test_group_by_one_row_per_distinct_key() {
    let schema = schema(vec![
        ("k", DType::int64()),
        ("v", DType::int64()),
    ]);
    let rows: Vec<Vec<Cell>> = (0..100)
        .map(|i| vec![Cell::I(i % 7), Cell::I(i)])
        .collect();

    let mut group_by = GroupByOperator::new(
        vec!["k".to_string()],
        vec![("s".to_string(), sum(col("v")))],
        &schema,
    )
    .unwrap();
    group_by.process(chunk(&schema, &rows)).unwrap();
    let out = group_by.finish().unwrap().chunk.unwrap();

    assert_eq!(out.row_count(), 7);
    // Per-group sum equals the linear sum over the same rows.
    for group in 0..7 {
        let key = match out.get_value(0, group) {
            Scalar::Int(k) => k,
            other => panic!("unexpected {other:?}"),
        };
        let expected: i64 = (0..100).filter(|i| i % 7 == key).sum();
        assert_eq!(
            out.get_value(1, group),
            Scalar::Float(expected as f64)
        );
    }
}

// ============================================================================
// Compute kernels through chunk-level flows
// ============================================================================

#[test]
fn test_cast_column_within_chunk() {
    let schema = schema(vec![("raw", DType::string())]);
    let data = chunk(
        &schema,
        &[vec![Cell::S("10")], vec![Cell::S("oops")], vec![Cell::S("30")]],
    );
    let out = cast::cast_column(
        data.column(0),
        DType::int32(),
        data.dictionary(),
    )
    .unwrap();
    assert_eq!(out.value(0), Scalar::Int(10));
    assert_eq!(out.value(1), Scalar::Null);
    assert_eq!(out.value(2), Scalar::Int(30));
}

#[test]
fn test_fill_then_drop_null() {
    let schema = schema(vec![
        ("a", DType::int64().nullable()),
        ("b", DType::int64().nullable()),
    ]);
    let mut data = chunk(
        &schema,
        &[
            vec![Cell::I(1), Cell::Null],
            vec![Cell::Null, Cell::I(2)],
            vec![Cell::I(3), Cell::I(4)],
        ],
    );

    // Drop rows null in column a, then fill the rest of b with zero.
    let keep = drop_null_selection(&data, &["a"]).unwrap();
    assert_eq!(keep, vec![0, 2]);
    data.set_selection(keep).unwrap();
    let dense = data.materialize().unwrap();
    assert_eq!(dense.row_count(), 2);

    let mut column = dense.column(1).clone();
    fill_null(&mut column, &FillStrategy::Constant(Scalar::Int(0)), None)
        .unwrap();
    assert_eq!(column.value(0), Scalar::Int(0));
    assert_eq!(column.value(1), Scalar::Int(4));
}

#[test]
fn test_unique_idempotence_via_selection() {
    let schema = schema(vec![("k", DType::string())]);
    let mut data = chunk(
        &schema,
        &[
            vec![Cell::S("a")],
            vec![Cell::S("b")],
            vec![Cell::S("a")],
            vec![Cell::S("c")],
            vec![Cell::S("b")],
        ],
    );
    let first = unique_selection(&data, &[], Keep::First).unwrap();
    data.set_selection(first.clone()).unwrap();
    let second = unique_selection(&data, &[], Keep::First).unwrap();
    assert_eq!(first, second);
    assert_eq!(string_column(&data, 0).len(), 3);
}

#[test]
fn test_string_kernels_remap_dictionary() {
    let schema = schema(vec![("s", DType::string())]);
    let data = chunk(
        &schema,
        &[vec![Cell::S(" Widget ")], vec![Cell::S(" Widget ")]],
    );
    let dict = data.dictionary().unwrap();

    let trimmed = strings::trim(data.column(0), dict).unwrap();
    let upper = strings::upper(&trimmed, dict).unwrap();
    let guard = dict.read().unwrap();
    assert_eq!(guard.get(upper.str_index(0).unwrap()), Some("WIDGET"));
    assert_eq!(upper.str_index(0), upper.str_index(1));
}

#[test]
fn test_concat_then_project() {
    let schema = schema(vec![
        ("v", DType::int64()),
        ("s", DType::string()),
    ]);
    let a = chunk(
        &schema,
        &[vec![Cell::I(1), Cell::S("x")], vec![Cell::I(2), Cell::S("y")]],
    );
    let b = chunk(&schema, &[vec![Cell::I(3), Cell::S("x")]]);
    let merged = concat::concat_chunks(&[a, b]).unwrap();
    assert_eq!(merged.row_count(), 3);

    let mut project = ProjectOperator::new(
        vec![("s".to_string(), None)],
        &schema,
    )
    .unwrap();
    let out = project.process(merged).unwrap().chunk.unwrap();
    assert_eq!(
        string_column(&out, 0),
        vec![
            Some("x".to_string()),
            Some("y".to_string()),
            Some("x".to_string())
        ]
    );
}

// ============================================================================
// Limit across chunk boundaries
// ============================================================================

#[test]
fn test_limit_offset_spanning_chunks() {
    let schema = schema(vec![("v", DType::int64())]);
    let mut limit = LimitOperator::new(3, 2, schema.clone());

    let r1 = limit
        .process(chunk(&schema, &[vec![Cell::I(0)], vec![Cell::I(1)]]))
        .unwrap();
    assert!(r1.chunk.is_none());

    let r2 = limit
        .process(chunk(
            &schema,
            &[vec![Cell::I(2)], vec![Cell::I(3)], vec![Cell::I(4)]],
        ))
        .unwrap();
    // The three remaining rows exactly fill the quota.
    assert!(r2.done);
    assert_eq!(
        int_column(&r2.chunk.unwrap(), 0),
        vec![Some(2), Some(3), Some(4)]
    );

    let r3 = limit
        .process(chunk(&schema, &[vec![Cell::I(5)], vec![Cell::I(6)]]))
        .unwrap();
    assert!(r3.done);
    // Quota already reached: nothing more passes.
    assert!(r3.chunk.is_none());
}

// ============================================================================
// Aggregate output dtype checks
// ============================================================================

#[test]
fn test_group_by_avg_emits_float() {
    let schema = schema(vec![
        ("k", DType::int64()),
        ("v", DType::int64()),
    ]);
    let data = chunk(
        &schema,
        &[
            vec![Cell::I(1), Cell::I(1)],
            vec![Cell::I(1), Cell::I(2)],
        ],
    );
    let mut group_by = GroupByOperator::new(
        vec!["k".to_string()],
        vec![("m".to_string(), columnar_engine::expr::avg(col("v")))],
        &schema,
    )
    .unwrap();
    group_by.process(data).unwrap();
    let out = group_by.finish().unwrap().chunk.unwrap();
    assert_eq!(float_column(&out, 1), vec![Some(1.5)]);
}
