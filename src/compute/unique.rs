//! Row deduplication.
//!
//! [`unique_selection`] builds a selection vector containing only the
//! first (or last) occurrence of each distinct row-tuple over the chosen
//! columns. Rows are hashed with FNV-1a over their serialized values; a
//! `hash → representative rows` map handles collisions with a full
//! row-equality recheck across the specified columns. Null values hash
//! as a distinguished byte and compare equal to each other.

use crate::chunk::Chunk;
use crate::dictionary::fnv1a;
use crate::types::Scalar;
use crate::Result;
use std::collections::HashMap;

/// Which occurrence of a duplicated row-tuple survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Keep the first occurrence.
    First,
    /// Keep the last occurrence.
    Last,
}

const NULL_MARKER: u8 = 0xFE;

fn serialize_row(
    chunk: &Chunk,
    columns: &[usize],
    row: usize,
    out: &mut Vec<u8>,
) {
    out.clear();
    for &column in columns {
        if chunk.is_null(column, row) {
            out.push(NULL_MARKER);
            continue;
        }
        out.push(0x01);
        match chunk.get_value(column, row) {
            Scalar::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Scalar::UInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Scalar::Float(v) => {
                out.extend_from_slice(&v.to_bits().to_le_bytes())
            }
            Scalar::Bool(v) => out.push(v as u8),
            Scalar::Str(_) | Scalar::Null => {}
        }
    }
}

fn rows_equal(
    chunk: &Chunk,
    columns: &[usize],
    a: usize,
    b: usize,
) -> bool {
    for &column in columns {
        let a_null = chunk.is_null(column, a);
        let b_null = chunk.is_null(column, b);
        if a_null != b_null {
            return false;
        }
        if a_null {
            continue;
        }
        // Values within one chunk share a dictionary, so string equality
        // is index equality through get_value.
        if chunk.get_value(column, a) != chunk.get_value(column, b) {
            return false;
        }
    }
    true
}

/// Build a selection vector of distinct row-tuples over `columns`
/// (empty list = all columns).
///
/// Returned indices are physical and strictly increasing.
pub fn unique_selection(
    chunk: &Chunk,
    columns: &[&str],
    keep: Keep,
) -> Result<Vec<u32>> {
    let schema = chunk.schema();
    let targets: Vec<usize> = if columns.is_empty() {
        (0..schema.len()).collect()
    } else {
        columns
            .iter()
            .map(|name| schema.resolve(name))
            .collect::<Result<_>>()?
    };

    // group id -> (representative logical row, kept logical row)
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut scratch = Vec::new();

    for row in 0..chunk.row_count() {
        serialize_row(chunk, &targets, row, &mut scratch);
        let hash = fnv1a(&scratch);
        let candidates = by_hash.entry(hash).or_default();
        let mut found = false;
        for &group in candidates.iter() {
            if rows_equal(chunk, &targets, groups[group].0, row) {
                if keep == Keep::Last {
                    groups[group].1 = row;
                }
                found = true;
                break;
            }
        }
        if !found {
            candidates.push(groups.len());
            groups.push((row, row));
        }
    }

    let mut selection: Vec<u32> = groups
        .iter()
        .map(|&(_, kept)| chunk.resolve_row(kept) as u32)
        .collect();
    selection.sort_unstable();
    Ok(selection)
}
