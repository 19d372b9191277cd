// Column buffer tests - fixed capacity, null bitmaps, pooling

use columnar_engine::{
    BufferPool, ColumnBuffer, DType, DTypeKind, Error, Scalar,
};

// ============================================================================
// Capacity and length
// ============================================================================

#[test]
fn test_length_advances_monotonically() {
    let mut buffer = ColumnBuffer::new(DType::int32(), 8).unwrap();
    assert_eq!(buffer.len(), 0);
    for i in 0..8 {
        buffer.append(Scalar::Int(i)).unwrap();
        assert_eq!(buffer.len(), i as usize + 1);
    }
    assert!(matches!(
        buffer.append(Scalar::Int(9)).unwrap_err(),
        Error::BufferFull { .. }
    ));
}

#[test]
fn test_set_len_bounds() {
    let mut buffer = ColumnBuffer::new(DType::int64(), 4).unwrap();
    buffer.set_len(4).unwrap();
    assert_eq!(buffer.len(), 4);
    assert!(buffer.set_len(5).is_err());
    buffer.set_len(1).unwrap();
    assert_eq!(buffer.len(), 1);
}

#[test]
fn test_every_kind_allocates() {
    for kind in [
        DTypeKind::Int8,
        DTypeKind::Int16,
        DTypeKind::Int32,
        DTypeKind::Int64,
        DTypeKind::UInt8,
        DTypeKind::UInt16,
        DTypeKind::UInt32,
        DTypeKind::UInt64,
        DTypeKind::Float32,
        DTypeKind::Float64,
        DTypeKind::Bool,
        DTypeKind::Str,
        DTypeKind::Date,
        DTypeKind::Timestamp,
    ] {
        let buffer = ColumnBuffer::new(DType::new(kind), 16).unwrap();
        assert_eq!(buffer.kind(), kind);
        assert_eq!(buffer.capacity(), 16);
    }
}

// ============================================================================
// Null bitmap behavior
// ============================================================================

#[test]
fn test_non_nullable_is_never_null() {
    let mut buffer = ColumnBuffer::new(DType::float64(), 16).unwrap();
    for i in 0..16 {
        buffer.append(Scalar::Float(i as f64)).unwrap();
    }
    for i in 0..16 {
        assert!(!buffer.is_null(i));
    }
}

#[test]
fn test_null_bits_across_byte_boundaries() {
    let mut buffer =
        ColumnBuffer::new(DType::int32().nullable(), 20).unwrap();
    for i in 0..20 {
        if i % 3 == 0 {
            buffer.append_null().unwrap();
        } else {
            buffer.append(Scalar::Int(i)).unwrap();
        }
    }
    for i in 0..20 {
        assert_eq!(buffer.is_null(i as usize), i % 3 == 0, "row {i}");
    }
}

#[test]
fn test_set_value_clears_null_bit() {
    let mut buffer =
        ColumnBuffer::new(DType::int32().nullable(), 4).unwrap();
    buffer.append_null().unwrap();
    assert!(buffer.is_null(0));
    buffer.set_value(0, &Scalar::Int(5)).unwrap();
    assert!(!buffer.is_null(0));
    assert_eq!(buffer.value(0), Scalar::Int(5));
}

// ============================================================================
// Bulk copy via selection
// ============================================================================

#[test]
fn test_copy_from_with_selection_vector() {
    let mut source =
        ColumnBuffer::new(DType::int64().nullable(), 10).unwrap();
    for i in 0..10 {
        if i == 4 {
            source.append_null().unwrap();
        } else {
            source.append(Scalar::Int(i * 10)).unwrap();
        }
    }

    let mut dest = ColumnBuffer::new(DType::int64().nullable(), 10).unwrap();
    dest.copy_from(&source, &[1, 4, 9]).unwrap();
    assert_eq!(dest.len(), 3);
    assert_eq!(dest.value(0), Scalar::Int(10));
    assert_eq!(dest.value(1), Scalar::Null);
    assert_eq!(dest.value(2), Scalar::Int(90));
}

#[test]
fn test_copy_from_kind_mismatch() {
    let source = ColumnBuffer::new(DType::int32(), 4).unwrap();
    let mut dest = ColumnBuffer::new(DType::int64(), 4).unwrap();
    assert!(matches!(
        dest.copy_from(&source, &[]).unwrap_err(),
        Error::TypeMismatch { .. }
    ));
}

#[test]
fn test_copy_from_out_of_range() {
    let mut source = ColumnBuffer::new(DType::int32(), 4).unwrap();
    source.append(Scalar::Int(1)).unwrap();
    let mut dest = ColumnBuffer::new(DType::int32(), 4).unwrap();
    assert!(dest.copy_from(&source, &[3]).is_err());
}

// ============================================================================
// Pooling
// ============================================================================

#[test]
fn test_pool_recycles_by_key() {
    let mut pool = BufferPool::new();
    let mut buffer = pool.acquire(DType::int32().nullable(), 64).unwrap();
    for i in 0..10 {
        if i % 2 == 0 {
            buffer.append(Scalar::Int(i)).unwrap();
        } else {
            buffer.append_null().unwrap();
        }
    }
    pool.release(buffer);

    // Recycled buffer: zero length, clean bitmap.
    let mut buffer = pool.acquire(DType::int32().nullable(), 64).unwrap();
    assert_eq!(buffer.len(), 0);
    buffer.append(Scalar::Int(1)).unwrap();
    assert!(!buffer.is_null(0));
}

#[test]
fn test_pool_does_not_cross_capacities() {
    let mut pool = BufferPool::new();
    pool.release(ColumnBuffer::new(DType::int32(), 32).unwrap());
    let buffer = pool.acquire(DType::int32(), 64).unwrap();
    assert_eq!(buffer.capacity(), 64);
    assert_eq!(pool.pooled_count(), 1, "the 32-cap buffer stays pooled");
}
