// Round-trip and algebraic law tests (property-based)

mod common;

use common::{chunk, int_column, schema, Cell};
use columnar_engine::compute::cast::cast_column;
use columnar_engine::compute::unique::{unique_selection, Keep};
use columnar_engine::expr::{col, lit};
use columnar_engine::operator::{
    FilterOperator, Operator, SortKey, SortOperator,
};
use columnar_engine::{
    ColumnBuffer, DType, Dictionary, Scalar,
};
use proptest::prelude::*;

// ============================================================================
// Cast round-trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_int32_float64_int32_roundtrip(values in prop::collection::vec(any::<i32>(), 1..200)) {
        let mut column = ColumnBuffer::new(DType::int32(), values.len()).unwrap();
        for &v in &values {
            column.append(Scalar::Int(v as i64)).unwrap();
        }
        let wide = cast_column(&column, DType::float64(), None).unwrap();
        let back = cast_column(&wide, DType::int32(), None).unwrap();
        for (row, &v) in values.iter().enumerate() {
            prop_assert_eq!(back.value(row), Scalar::Int(v as i64));
        }
    }

    #[test]
    fn test_intern_get_byte_identity(strings in prop::collection::vec(".*", 1..100)) {
        let mut dict = Dictionary::new();
        let indices: Vec<u32> = strings
            .iter()
            .map(|s| dict.intern(s.as_bytes()))
            .collect();
        for (s, index) in strings.iter().zip(indices) {
            prop_assert_eq!(dict.get_bytes(index), Some(s.as_bytes()));
        }
    }

    // ========================================================================
    // Operator laws
    // ========================================================================

    #[test]
    fn test_sort_idempotence(values in prop::collection::vec(any::<i32>(), 0..100)) {
        let input = schema(vec![("v", DType::int64())]);
        let rows: Vec<Vec<Cell>> =
            values.iter().map(|&v| vec![Cell::I(v as i64)]).collect();

        let run_sort = |data: columnar_engine::Chunk| {
            let mut sort =
                SortOperator::new(vec![SortKey::asc("v")], input.clone())
                    .unwrap();
            sort.process(data).unwrap();
            sort.finish().unwrap().chunk
        };

        if let Some(once) = run_sort(chunk(&input, &rows)) {
            let twice = run_sort(once.clone()).unwrap();
            prop_assert_eq!(int_column(&once, 0), int_column(&twice, 0));
        } else {
            prop_assert!(rows.is_empty());
        }
    }

    #[test]
    fn test_unique_idempotence(values in prop::collection::vec(0i64..10, 0..100)) {
        let input = schema(vec![("v", DType::int64())]);
        let rows: Vec<Vec<Cell>> =
            values.iter().map(|&v| vec![Cell::I(v)]).collect();
        let mut data = chunk(&input, &rows);

        let first = unique_selection(&data, &[], Keep::First).unwrap();
        data.set_selection(first.clone()).unwrap();
        let second = unique_selection(&data, &[], Keep::First).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_filter_conjunction_law(
        values in prop::collection::vec(any::<i16>(), 0..200),
        low in -100i64..0,
        high in 0i64..100,
    ) {
        let input = schema(vec![("v", DType::int64())]);
        let rows: Vec<Vec<Cell>> =
            values.iter().map(|&v| vec![Cell::I(v as i64)]).collect();

        let a = col("v").gt(lit(low));
        let b = col("v").lt(lit(high));

        let combined = {
            let mut op = FilterOperator::new(
                &a.clone().and(b.clone()),
                input.clone(),
            )
            .unwrap();
            op.process(chunk(&input, &rows))
                .unwrap()
                .chunk
                .map(|c| int_column(&c, 0))
                .unwrap_or_default()
        };

        let staged = {
            let mut first = FilterOperator::new(&a, input.clone()).unwrap();
            let mut second = FilterOperator::new(&b, input.clone()).unwrap();
            match first.process(chunk(&input, &rows)).unwrap().chunk {
                Some(c) => second
                    .process(c)
                    .unwrap()
                    .chunk
                    .map(|c| int_column(&c, 0))
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        };

        prop_assert_eq!(combined, staged);
    }

    #[test]
    fn test_filter_never_grows_rows(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let input = schema(vec![("v", DType::int64())]);
        let rows: Vec<Vec<Cell>> =
            values.iter().map(|&v| vec![Cell::I(v as i64)]).collect();
        let mut op = FilterOperator::new(
            &col("v").rem(lit(2)).eq(lit(0)),
            input.clone(),
        )
        .unwrap();
        let result = op.process(chunk(&input, &rows)).unwrap();
        let rows_out = result.chunk.map(|c| c.row_count()).unwrap_or(0);
        prop_assert!(rows_out <= values.len());
    }
}
