//! Vectorized hash group-by operator.
//!
//! Each input chunk runs three phases:
//!
//! 1. **Key hashing** — per logical row, the key tuple is serialized
//!    into a stable byte string and looked up (or inserted) in the
//!    group map, producing a dense `group_id` recorded in a per-chunk
//!    `chunk_group_ids` array. String keys are normalized first: the
//!    input dictionary index is converted to a byte-equal index in the
//!    operator's own dictionary, interning each distinct value once
//!    through a cached mapping.
//! 2. **Resize** — every batch aggregator grows its dense arrays to the
//!    current group count (doubling growth, sentinel re-initialization).
//! 3. **Accumulation** — aggregations whose input is a bare column take
//!    the fast path: the aggregator loops directly over the column's
//!    typed array with `chunk_group_ids`, one specialized loop with a
//!    selection vector and one without. Other inputs evaluate a
//!    compiled expression per row. `CountAll` needs only the group ids.
//!
//! `finish` emits one chunk: key columns in first-seen insertion order
//! followed by the finalized aggregate columns, with `done = true`.

use super::aggregate::{aggregate_output_dtype, split_aggregation};
use super::{Operator, OperatorResult};
use crate::buffer::{ColumnBuffer, ColumnData};
use crate::chunk::Chunk;
use crate::compute::append_scalar;
use crate::dictionary::{new_dictionary, DictionaryRef};
use crate::expr::{compile_value, AggOp, CompiledValue, Expr};
use crate::schema::{Schema, SchemaRef};
use crate::types::{DType, DTypeKind, Scalar};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

// Tags keeping serialized key tuples unambiguous across kinds.
const KEY_NULL: u8 = 0xFE;
const KEY_STR: u8 = 1;
const KEY_INT: u8 = 2;
const KEY_UINT: u8 = 3;
const KEY_FLOAT: u8 = 4;
const KEY_BOOL: u8 = 5;

/// Column-level dispatch: match the typed storage once, then run a tight
/// loop calling `f(logical_row, value_as_f64)` for non-null slots.
fn for_each_numeric<F: FnMut(usize, f64)>(
    column: &ColumnBuffer,
    rows: usize,
    selection: Option<&[u32]>,
    mut f: F,
) {
    macro_rules! run {
        ($values:expr) => {
            match selection {
                Some(selection) => {
                    for (i, &physical) in selection.iter().enumerate() {
                        let row = physical as usize;
                        if !column.is_null(row) {
                            f(i, $values[row] as f64);
                        }
                    }
                }
                None => {
                    for row in 0..rows {
                        if !column.is_null(row) {
                            f(row, $values[row] as f64);
                        }
                    }
                }
            }
        };
    }
    match column.data() {
        ColumnData::Int8(v) => run!(v),
        ColumnData::Int16(v) => run!(v),
        ColumnData::Int32(v) => run!(v),
        ColumnData::Int64(v) => run!(v),
        ColumnData::UInt8(v) => run!(v),
        ColumnData::UInt16(v) => run!(v),
        ColumnData::UInt32(v) => run!(v),
        ColumnData::UInt64(v) => run!(v),
        ColumnData::Float32(v) => run!(v),
        ColumnData::Float64(v) => run!(v),
        ColumnData::Bool(v) => run!(v),
        ColumnData::Date(v) => run!(v),
        ColumnData::Timestamp(v) => run!(v),
        ColumnData::Str(_) => {}
    }
}

fn for_each_non_null<F: FnMut(usize)>(
    column: &ColumnBuffer,
    rows: usize,
    selection: Option<&[u32]>,
    mut f: F,
) {
    match selection {
        Some(selection) => {
            for (i, &physical) in selection.iter().enumerate() {
                if !column.is_null(physical as usize) {
                    f(i);
                }
            }
        }
        None => {
            for row in 0..rows {
                if !column.is_null(row) {
                    f(row);
                }
            }
        }
    }
}

fn grow_to(len: usize, current: usize) -> usize {
    len.max(current * 2)
}

/// Dense float accumulator shared by Sum-like aggregators.
struct VectorSum {
    values: Vec<f64>,
    has_value: Vec<u8>,
}

impl VectorSum {
    fn new() -> Self {
        Self { values: Vec::new(), has_value: Vec::new() }
    }

    fn resize(&mut self, groups: usize) {
        if groups > self.values.len() {
            let target = grow_to(groups, self.values.len());
            self.values.resize(target, 0.0);
            self.has_value.resize(target, 0);
        }
    }

    fn add(&mut self, group: usize, value: f64) {
        self.values[group] += value;
        self.has_value[group] = 1;
    }
}

struct VectorCount {
    counts: Vec<i64>,
}

impl VectorCount {
    fn new() -> Self {
        Self { counts: Vec::new() }
    }

    fn resize(&mut self, groups: usize) {
        if groups > self.counts.len() {
            let target = grow_to(groups, self.counts.len());
            self.counts.resize(target, 0);
        }
    }
}

struct VectorMinMax {
    values: Vec<f64>,
    has_value: Vec<u8>,
    is_min: bool,
}

impl VectorMinMax {
    fn new(is_min: bool) -> Self {
        Self { values: Vec::new(), has_value: Vec::new(), is_min }
    }

    fn sentinel(&self) -> f64 {
        if self.is_min {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    }

    fn resize(&mut self, groups: usize) {
        if groups > self.values.len() {
            let target = grow_to(groups, self.values.len());
            self.values.resize(target, self.sentinel());
            self.has_value.resize(target, 0);
        }
    }

    fn add(&mut self, group: usize, value: f64) {
        let current = &mut self.values[group];
        if (self.is_min && value < *current)
            || (!self.is_min && value > *current)
        {
            *current = value;
        }
        self.has_value[group] = 1;
    }
}

struct VectorCapture {
    values: Vec<Scalar>,
    take_first: bool,
}

impl VectorCapture {
    fn new(take_first: bool) -> Self {
        Self { values: Vec::new(), take_first }
    }

    fn resize(&mut self, groups: usize) {
        if groups > self.values.len() {
            let target = grow_to(groups, self.values.len());
            self.values.resize(target, Scalar::Null);
        }
    }

    fn add(&mut self, group: usize, value: Scalar) {
        if value.is_null() {
            return;
        }
        if self.take_first && !self.values[group].is_null() {
            return;
        }
        self.values[group] = value;
    }
}

enum BatchAggregator {
    Sum(VectorSum),
    Avg { sums: VectorSum, counts: VectorCount },
    Count(VectorCount),
    CountAll(VectorCount),
    Min(VectorMinMax),
    Max(VectorMinMax),
    Capture(VectorCapture),
}

impl BatchAggregator {
    fn for_op(op: AggOp) -> Self {
        match op {
            AggOp::Sum => BatchAggregator::Sum(VectorSum::new()),
            AggOp::Avg => BatchAggregator::Avg {
                sums: VectorSum::new(),
                counts: VectorCount::new(),
            },
            AggOp::Count => BatchAggregator::Count(VectorCount::new()),
            AggOp::CountAll => BatchAggregator::CountAll(VectorCount::new()),
            AggOp::Min => BatchAggregator::Min(VectorMinMax::new(true)),
            AggOp::Max => BatchAggregator::Max(VectorMinMax::new(false)),
            AggOp::First => {
                BatchAggregator::Capture(VectorCapture::new(true))
            }
            AggOp::Last => {
                BatchAggregator::Capture(VectorCapture::new(false))
            }
        }
    }

    fn resize(&mut self, groups: usize) {
        match self {
            BatchAggregator::Sum(sum) => sum.resize(groups),
            BatchAggregator::Avg { sums, counts } => {
                sums.resize(groups);
                counts.resize(groups);
            }
            BatchAggregator::Count(counts)
            | BatchAggregator::CountAll(counts) => counts.resize(groups),
            BatchAggregator::Min(m) | BatchAggregator::Max(m) => {
                m.resize(groups)
            }
            BatchAggregator::Capture(capture) => capture.resize(groups),
        }
    }

    /// Fast path: accumulate straight from a column's typed array.
    fn accumulate_batch(
        &mut self,
        column: &ColumnBuffer,
        group_ids: &[i32],
        selection: Option<&[u32]>,
    ) {
        let rows = group_ids.len();
        match self {
            BatchAggregator::Sum(sum) => {
                for_each_numeric(column, rows, selection, |i, v| {
                    sum.add(group_ids[i] as usize, v)
                });
            }
            BatchAggregator::Avg { sums, counts } => {
                for_each_numeric(column, rows, selection, |i, v| {
                    let group = group_ids[i] as usize;
                    sums.add(group, v);
                    counts.counts[group] += 1;
                });
            }
            BatchAggregator::Count(counts) => {
                for_each_non_null(column, rows, selection, |i| {
                    counts.counts[group_ids[i] as usize] += 1;
                });
            }
            BatchAggregator::Min(m) | BatchAggregator::Max(m) => {
                for_each_numeric(column, rows, selection, |i, v| {
                    m.add(group_ids[i] as usize, v)
                });
            }
            BatchAggregator::CountAll(_) | BatchAggregator::Capture(_) => {
                // Handled by the caller (group ids only / per-row values).
            }
        }
    }

    /// Slow path: one evaluated value for one row.
    fn accumulate_value(&mut self, group: usize, value: &Scalar) {
        match self {
            BatchAggregator::Sum(sum) => {
                if let Some(v) = value.as_f64() {
                    sum.add(group, v);
                }
            }
            BatchAggregator::Avg { sums, counts } => {
                if let Some(v) = value.as_f64() {
                    sums.add(group, v);
                    counts.counts[group] += 1;
                }
            }
            BatchAggregator::Count(counts) => {
                if !value.is_null() {
                    counts.counts[group] += 1;
                }
            }
            BatchAggregator::CountAll(counts) => counts.counts[group] += 1,
            BatchAggregator::Min(m) | BatchAggregator::Max(m) => {
                if let Some(v) = value.as_f64() {
                    m.add(group, v);
                }
            }
            BatchAggregator::Capture(capture) => {
                capture.add(group, value.clone())
            }
        }
    }

    fn count_rows(&mut self, group_ids: &[i32]) {
        if let BatchAggregator::CountAll(counts) = self {
            for &group in group_ids {
                counts.counts[group as usize] += 1;
            }
        }
    }

    fn finish(
        &self,
        groups: usize,
        dtype: DType,
        dict: Option<&DictionaryRef>,
    ) -> Result<ColumnBuffer> {
        let mut out = ColumnBuffer::new(dtype, groups.max(1))?;
        match self {
            BatchAggregator::Sum(sum) => {
                for group in 0..groups {
                    if sum.has_value[group] != 0 {
                        out.append(Scalar::Float(sum.values[group]))?;
                    } else {
                        out.append_null()?;
                    }
                }
            }
            BatchAggregator::Avg { sums, counts } => {
                for group in 0..groups {
                    let count = counts.counts[group];
                    if count > 0 {
                        out.append(Scalar::Float(
                            sums.values[group] / count as f64,
                        ))?;
                    } else {
                        out.append_null()?;
                    }
                }
            }
            BatchAggregator::Count(counts)
            | BatchAggregator::CountAll(counts) => {
                for group in 0..groups {
                    out.append(Scalar::Int(counts.counts[group]))?;
                }
            }
            BatchAggregator::Min(m) | BatchAggregator::Max(m) => {
                for group in 0..groups {
                    if m.has_value[group] != 0 {
                        out.append(Scalar::Float(m.values[group]))?;
                    } else {
                        out.append_null()?;
                    }
                }
            }
            BatchAggregator::Capture(capture) => {
                for group in 0..groups {
                    append_scalar(&mut out, &capture.values[group], dict)?;
                }
            }
        }
        Ok(out)
    }

    fn reset(&mut self) {
        *self = match self {
            BatchAggregator::Sum(_) => BatchAggregator::Sum(VectorSum::new()),
            BatchAggregator::Avg { .. } => BatchAggregator::Avg {
                sums: VectorSum::new(),
                counts: VectorCount::new(),
            },
            BatchAggregator::Count(_) => {
                BatchAggregator::Count(VectorCount::new())
            }
            BatchAggregator::CountAll(_) => {
                BatchAggregator::CountAll(VectorCount::new())
            }
            BatchAggregator::Min(_) => {
                BatchAggregator::Min(VectorMinMax::new(true))
            }
            BatchAggregator::Max(_) => {
                BatchAggregator::Max(VectorMinMax::new(false))
            }
            BatchAggregator::Capture(capture) => BatchAggregator::Capture(
                VectorCapture::new(capture.take_first),
            ),
        };
    }
}

struct GroupAgg {
    op: AggOp,
    out_dtype: DType,
    fast_column: Option<usize>,
    compiled: Option<CompiledValue>,
    acc: BatchAggregator,
}

/// Hash-based grouping with vectorized accumulators.
pub struct GroupByOperator {
    key_indices: Vec<usize>,
    key_dtypes: Vec<DType>,
    aggs: Vec<GroupAgg>,
    input_schema: SchemaRef,
    schema: SchemaRef,
    dictionary: DictionaryRef,
    groups: HashMap<Vec<u8>, u32>,
    group_keys: Vec<Vec<Scalar>>,
    str_remap: HashMap<u32, u32>,
    remap_dict: usize,
    chunk_group_ids: Vec<i32>,
}

impl GroupByOperator {
    /// Validate key columns and compile the aggregation specs.
    pub fn new(
        keys: Vec<String>,
        aggregations: Vec<(String, Expr)>,
        input_schema: &SchemaRef,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::InvalidAggregation(
                "group-by requires at least one key column".to_string(),
            ));
        }
        let mut key_indices = Vec::with_capacity(keys.len());
        let mut key_dtypes = Vec::with_capacity(keys.len());
        let mut defs = Vec::with_capacity(keys.len() + aggregations.len());
        for key in &keys {
            let index = input_schema.resolve(key)?;
            let dtype = input_schema.columns()[index].dtype;
            key_indices.push(index);
            key_dtypes.push(dtype);
            defs.push((key.clone(), dtype));
        }

        let mut aggs = Vec::with_capacity(aggregations.len());
        for (name, expr) in &aggregations {
            let (op, inner) = split_aggregation(expr)?;
            let (fast_column, compiled, input_dtype) = match inner {
                Some(inner) => {
                    let compiled = compile_value(inner, input_schema)?;
                    let input_dtype = compiled.dtype();
                    match inner.unaliased() {
                        Expr::Column(name) => {
                            (Some(input_schema.resolve(name)?), None, Some(input_dtype))
                        }
                        _ => (None, Some(compiled), Some(input_dtype)),
                    }
                }
                None => (None, None, None),
            };
            if matches!(op, AggOp::Min | AggOp::Max) {
                match input_dtype {
                    Some(dtype) if dtype.kind.is_numeric() => {}
                    _ => {
                        return Err(Error::InvalidAggregation(format!(
                            "{op:?} requires a numeric input"
                        )))
                    }
                }
            }
            let out_dtype = aggregate_output_dtype(op, input_dtype);
            defs.push((name.clone(), out_dtype));
            aggs.push(GroupAgg {
                op,
                out_dtype,
                fast_column,
                compiled,
                acc: BatchAggregator::for_op(op),
            });
        }

        Ok(Self {
            key_indices,
            key_dtypes,
            aggs,
            input_schema: Arc::clone(input_schema),
            schema: Arc::new(Schema::new(defs)?),
            dictionary: new_dictionary(),
            groups: HashMap::new(),
            group_keys: Vec::new(),
            str_remap: HashMap::new(),
            remap_dict: 0,
            chunk_group_ids: Vec::new(),
        })
    }

    /// Normalize an input-dictionary index into this operator's own
    /// dictionary, interning each distinct value once.
    fn normalize_str_index(
        &mut self,
        chunk: &Chunk,
        input_index: u32,
    ) -> Result<u32> {
        if let Some(&own) = self.str_remap.get(&input_index) {
            return Ok(own);
        }
        let dict = chunk.dictionary().ok_or_else(|| {
            Error::SchemaMismatch(
                "string key column without dictionary".to_string(),
            )
        })?;
        let payload = {
            let guard = dict.read().expect("dictionary lock poisoned");
            guard
                .get_bytes(input_index)
                .map(<[u8]>::to_vec)
                .ok_or(Error::InvalidOffset {
                    index: input_index as usize,
                    len: guard.len(),
                })?
        };
        let own = self
            .dictionary
            .write()
            .expect("dictionary lock poisoned")
            .intern(&payload);
        self.str_remap.insert(input_index, own);
        Ok(own)
    }
}

impl Operator for GroupByOperator {
    fn name(&self) -> &str {
        "group_by"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.input_schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        let rows = chunk.row_count();
        if rows == 0 {
            return Ok(OperatorResult::empty());
        }

        // The string remap cache is valid for one input dictionary.
        let dict_id = chunk
            .dictionary()
            .map(|dict| Arc::as_ptr(dict) as usize)
            .unwrap_or(0);
        if dict_id != self.remap_dict {
            self.str_remap.clear();
            self.remap_dict = dict_id;
        }

        // Phase 1: key hashing.
        self.chunk_group_ids.clear();
        self.chunk_group_ids.reserve(rows);
        let mut key_buf: Vec<u8> = Vec::new();
        for row in 0..rows {
            key_buf.clear();
            let mut normalized: Vec<Scalar> =
                Vec::with_capacity(self.key_indices.len());
            for k in 0..self.key_indices.len() {
                let column = self.key_indices[k];
                if chunk.is_null(column, row) {
                    key_buf.push(KEY_NULL);
                    normalized.push(Scalar::Null);
                    continue;
                }
                if self.key_dtypes[k].kind == DTypeKind::Str {
                    let physical = chunk.resolve_row(row);
                    let input_index = chunk
                        .column(column)
                        .str_index(physical)
                        .ok_or(Error::InvalidOffset {
                            index: physical,
                            len: chunk.physical_rows(),
                        })?;
                    let own = self.normalize_str_index(&chunk, input_index)?;
                    key_buf.push(KEY_STR);
                    key_buf.extend_from_slice(&own.to_le_bytes());
                    normalized.push(Scalar::UInt(own as u64));
                } else {
                    let value = chunk.get_value(column, row);
                    match &value {
                        Scalar::Int(v) => {
                            key_buf.push(KEY_INT);
                            key_buf.extend_from_slice(&v.to_le_bytes());
                        }
                        Scalar::UInt(v) => {
                            key_buf.push(KEY_UINT);
                            key_buf.extend_from_slice(&v.to_le_bytes());
                        }
                        Scalar::Float(v) => {
                            key_buf.push(KEY_FLOAT);
                            key_buf.extend_from_slice(
                                &v.to_bits().to_le_bytes(),
                            );
                        }
                        Scalar::Bool(v) => {
                            key_buf.push(KEY_BOOL);
                            key_buf.push(*v as u8);
                        }
                        _ => key_buf.push(KEY_NULL),
                    }
                    normalized.push(value);
                }
            }

            let group = match self.groups.get(key_buf.as_slice()) {
                Some(&group) => group,
                None => {
                    let group = self.group_keys.len() as u32;
                    self.groups.insert(key_buf.clone(), group);
                    self.group_keys.push(normalized);
                    group
                }
            };
            self.chunk_group_ids.push(group as i32);
        }

        // Phase 2: grow the aggregators.
        let num_groups = self.group_keys.len();
        for agg in &mut self.aggs {
            agg.acc.resize(num_groups);
        }

        // Phase 3: accumulate.
        let selection = chunk.selection().map(<[u32]>::to_vec);
        for agg in &mut self.aggs {
            match agg.op {
                AggOp::CountAll => {
                    agg.acc.count_rows(&self.chunk_group_ids);
                }
                AggOp::First | AggOp::Last => {
                    for row in 0..rows {
                        let value = match (&agg.fast_column, &agg.compiled) {
                            (Some(column), _) => {
                                let column = *column;
                                chunk.get_scalar(column, row)
                            }
                            (None, Some(compiled)) => {
                                compiled.eval(&chunk, row)
                            }
                            (None, None) => Scalar::Null,
                        };
                        agg.acc.accumulate_value(
                            self.chunk_group_ids[row] as usize,
                            &value,
                        );
                    }
                }
                _ => match (&agg.fast_column, &agg.compiled) {
                    (Some(column), _) => {
                        let column = *column;
                        agg.acc.accumulate_batch(
                            chunk.column(column),
                            &self.chunk_group_ids,
                            selection.as_deref(),
                        );
                    }
                    (None, Some(compiled)) => {
                        for row in 0..rows {
                            let value = compiled.eval(&chunk, row);
                            agg.acc.accumulate_value(
                                self.chunk_group_ids[row] as usize,
                                &value,
                            );
                        }
                    }
                    (None, None) => {}
                },
            }
        }

        Ok(OperatorResult::empty())
    }

    fn finish(&mut self) -> Result<OperatorResult> {
        let num_groups = self.group_keys.len();

        let mut columns = Vec::with_capacity(self.schema.len());
        for (k, dtype) in self.key_dtypes.iter().enumerate() {
            let out_dtype = *dtype;
            let mut out = ColumnBuffer::new(out_dtype, num_groups.max(1))?;
            for group in 0..num_groups {
                match &self.group_keys[group][k] {
                    Scalar::Null => out.append_null()?,
                    Scalar::UInt(index)
                        if out_dtype.kind == DTypeKind::Str =>
                    {
                        out.append_str_index(*index as u32)?
                    }
                    other => out.append(other.clone())?,
                }
            }
            columns.push(out);
        }
        for agg in &self.aggs {
            columns.push(agg.acc.finish(
                num_groups,
                agg.out_dtype,
                Some(&self.dictionary),
            )?);
        }

        let chunk = Chunk::new(
            Arc::clone(&self.schema),
            columns,
            Some(self.dictionary.clone()),
        )?;
        Ok(OperatorResult::finished(Some(chunk)))
    }

    fn reset(&mut self) {
        self.groups.clear();
        self.group_keys.clear();
        self.str_remap.clear();
        self.remap_dict = 0;
        self.chunk_group_ids.clear();
        self.dictionary = new_dictionary();
        for agg in &mut self.aggs {
            agg.acc.reset();
        }
    }
}
