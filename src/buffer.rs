//! Columnar buffers: typed fixed-capacity vectors with null bitmaps.
//!
//! A [`ColumnBuffer`] stores elements of one [`DType`] contiguously in a
//! tagged [`ColumnData`] vector. The buffer has a fixed capacity; its
//! length advances monotonically via `append*` calls or an explicit
//! [`ColumnBuffer::set_len`]. Nullable buffers carry a parallel bit-packed
//! [`NullBitmap`] sized `⌈capacity/8⌉` bytes, bit 1 = null. String
//! columns store `u32` dictionary indices; [`NULL_INDEX`] is reserved as
//! the absent sentinel when no bitmap is present.
//!
//! Dispatch happens at the column level: hot loops match once on the
//! [`ColumnData`] variant and then iterate a typed slice, never
//! re-dispatching per row.

use crate::types::{DType, DTypeKind, Scalar};
use crate::{Error, Result};

/// Reserved `u32` dictionary index marking an absent string slot.
pub const NULL_INDEX: u32 = u32::MAX;

/// Bit-packed null bitmap, one bit per slot, bit 1 = null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullBitmap {
    bits: Vec<u8>,
}

impl NullBitmap {
    /// Create an all-clear bitmap covering `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self { bits: vec![0u8; capacity.div_ceil(8)] }
    }

    /// Whether the bit at `index` is set.
    pub fn get(&self, index: usize) -> bool {
        (self.bits[index / 8] >> (index % 8)) & 1 != 0
    }

    /// Set or clear the bit at `index`.
    pub fn set(&mut self, index: usize, null: bool) {
        let byte = &mut self.bits[index / 8];
        if null {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.bits.fill(0);
    }

    /// Count of set bits in the first `len` slots.
    pub fn count_nulls(&self, len: usize) -> usize {
        (0..len).filter(|&i| self.get(i)).count()
    }
}

/// Typed element storage, one variant per [`DTypeKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// `Int8` elements.
    Int8(Vec<i8>),
    /// `Int16` elements.
    Int16(Vec<i16>),
    /// `Int32` elements.
    Int32(Vec<i32>),
    /// `Int64` elements.
    Int64(Vec<i64>),
    /// `UInt8` elements.
    UInt8(Vec<u8>),
    /// `UInt16` elements.
    UInt16(Vec<u16>),
    /// `UInt32` elements.
    UInt32(Vec<u32>),
    /// `UInt64` elements.
    UInt64(Vec<u64>),
    /// `Float32` elements.
    Float32(Vec<f32>),
    /// `Float64` elements.
    Float64(Vec<f64>),
    /// `Bool` elements stored as 0/1 bytes.
    Bool(Vec<u8>),
    /// Dictionary indices for string elements.
    Str(Vec<u32>),
    /// `Date` elements (days since epoch).
    Date(Vec<i32>),
    /// `Timestamp` elements (milliseconds since epoch).
    Timestamp(Vec<i64>),
}

macro_rules! for_each_variant {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            ColumnData::Int8($v) => $body,
            ColumnData::Int16($v) => $body,
            ColumnData::Int32($v) => $body,
            ColumnData::Int64($v) => $body,
            ColumnData::UInt8($v) => $body,
            ColumnData::UInt16($v) => $body,
            ColumnData::UInt32($v) => $body,
            ColumnData::UInt64($v) => $body,
            ColumnData::Float32($v) => $body,
            ColumnData::Float64($v) => $body,
            ColumnData::Bool($v) => $body,
            ColumnData::Str($v) => $body,
            ColumnData::Date($v) => $body,
            ColumnData::Timestamp($v) => $body,
        }
    };
}

impl ColumnData {
    /// Allocate storage of the given kind with the given capacity.
    pub fn with_capacity(kind: DTypeKind, capacity: usize) -> Self {
        match kind {
            DTypeKind::Int8 => ColumnData::Int8(Vec::with_capacity(capacity)),
            DTypeKind::Int16 => {
                ColumnData::Int16(Vec::with_capacity(capacity))
            }
            DTypeKind::Int32 => {
                ColumnData::Int32(Vec::with_capacity(capacity))
            }
            DTypeKind::Int64 => {
                ColumnData::Int64(Vec::with_capacity(capacity))
            }
            DTypeKind::UInt8 => {
                ColumnData::UInt8(Vec::with_capacity(capacity))
            }
            DTypeKind::UInt16 => {
                ColumnData::UInt16(Vec::with_capacity(capacity))
            }
            DTypeKind::UInt32 => {
                ColumnData::UInt32(Vec::with_capacity(capacity))
            }
            DTypeKind::UInt64 => {
                ColumnData::UInt64(Vec::with_capacity(capacity))
            }
            DTypeKind::Float32 => {
                ColumnData::Float32(Vec::with_capacity(capacity))
            }
            DTypeKind::Float64 => {
                ColumnData::Float64(Vec::with_capacity(capacity))
            }
            DTypeKind::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            DTypeKind::Str => ColumnData::Str(Vec::with_capacity(capacity)),
            DTypeKind::Date => ColumnData::Date(Vec::with_capacity(capacity)),
            DTypeKind::Timestamp => {
                ColumnData::Timestamp(Vec::with_capacity(capacity))
            }
        }
    }

    /// The kind this storage holds.
    pub fn kind(&self) -> DTypeKind {
        match self {
            ColumnData::Int8(_) => DTypeKind::Int8,
            ColumnData::Int16(_) => DTypeKind::Int16,
            ColumnData::Int32(_) => DTypeKind::Int32,
            ColumnData::Int64(_) => DTypeKind::Int64,
            ColumnData::UInt8(_) => DTypeKind::UInt8,
            ColumnData::UInt16(_) => DTypeKind::UInt16,
            ColumnData::UInt32(_) => DTypeKind::UInt32,
            ColumnData::UInt64(_) => DTypeKind::UInt64,
            ColumnData::Float32(_) => DTypeKind::Float32,
            ColumnData::Float64(_) => DTypeKind::Float64,
            ColumnData::Bool(_) => DTypeKind::Bool,
            ColumnData::Str(_) => DTypeKind::Str,
            ColumnData::Date(_) => DTypeKind::Date,
            ColumnData::Timestamp(_) => DTypeKind::Timestamp,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    /// True when no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn truncate(&mut self, len: usize) {
        for_each_variant!(self, v => v.truncate(len))
    }

    fn push_default(&mut self) {
        for_each_variant!(self, v => v.push(Default::default()))
    }

    /// Resize to `len`, filling new slots with the default element.
    fn resize_default(&mut self, len: usize) {
        for_each_variant!(self, v => v.resize(len, Default::default()))
    }

    fn value_at(&self, index: usize) -> Scalar {
        match self {
            ColumnData::Int8(v) => Scalar::Int(v[index] as i64),
            ColumnData::Int16(v) => Scalar::Int(v[index] as i64),
            ColumnData::Int32(v) => Scalar::Int(v[index] as i64),
            ColumnData::Int64(v) => Scalar::Int(v[index]),
            ColumnData::UInt8(v) => Scalar::UInt(v[index] as u64),
            ColumnData::UInt16(v) => Scalar::UInt(v[index] as u64),
            ColumnData::UInt32(v) => Scalar::UInt(v[index] as u64),
            ColumnData::UInt64(v) => Scalar::UInt(v[index]),
            ColumnData::Float32(v) => Scalar::Float(v[index] as f64),
            ColumnData::Float64(v) => Scalar::Float(v[index]),
            ColumnData::Bool(v) => Scalar::Bool(v[index] != 0),
            ColumnData::Str(v) => Scalar::UInt(v[index] as u64),
            ColumnData::Date(v) => Scalar::Int(v[index] as i64),
            ColumnData::Timestamp(v) => Scalar::Int(v[index]),
        }
    }

    fn store_at(&mut self, index: usize, value: &Scalar) -> Result<()> {
        let kind = self.kind();
        macro_rules! need {
            ($opt:expr) => {
                $opt.ok_or_else(|| Error::TypeMismatch {
                    expected: kind.name().to_string(),
                    actual: format!("{:?}", value),
                })?
            };
        }
        match self {
            ColumnData::Int8(v) => v[index] = need!(value.as_i64()) as i8,
            ColumnData::Int16(v) => v[index] = need!(value.as_i64()) as i16,
            ColumnData::Int32(v) => v[index] = need!(value.as_i64()) as i32,
            ColumnData::Int64(v) => v[index] = need!(value.as_i64()),
            ColumnData::UInt8(v) => v[index] = need!(value.as_i64()) as u8,
            ColumnData::UInt16(v) => v[index] = need!(value.as_i64()) as u16,
            ColumnData::UInt32(v) => v[index] = need!(value.as_i64()) as u32,
            ColumnData::UInt64(v) => v[index] = need!(value.as_i64()) as u64,
            ColumnData::Float32(v) => v[index] = need!(value.as_f64()) as f32,
            ColumnData::Float64(v) => v[index] = need!(value.as_f64()),
            ColumnData::Bool(v) => match value {
                Scalar::Bool(b) => v[index] = *b as u8,
                other => v[index] = (need!(other.as_i64()) != 0) as u8,
            },
            ColumnData::Str(v) => match value {
                Scalar::UInt(idx) => v[index] = *idx as u32,
                _ => {
                    return Err(Error::TypeMismatch {
                        expected: "String (dictionary index)".to_string(),
                        actual: format!("{:?}", value),
                    })
                }
            },
            ColumnData::Date(v) => v[index] = need!(value.as_i64()) as i32,
            ColumnData::Timestamp(v) => v[index] = need!(value.as_i64()),
        }
        Ok(())
    }

    /// Typed `Str` slice of dictionary indices.
    pub fn as_str_indices(&self) -> Option<&[u32]> {
        match self {
            ColumnData::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Element at `index` widened to `f64` (`None` for string storage).
    pub fn f64_at(&self, index: usize) -> Option<f64> {
        match self {
            ColumnData::Str(_) => None,
            other => other.value_at(index).as_f64(),
        }
    }
}

/// A typed, fixed-capacity column vector with an optional null bitmap.
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    dtype: DType,
    capacity: usize,
    data: ColumnData,
    nulls: Option<NullBitmap>,
}

impl ColumnBuffer {
    /// Allocate a buffer of the given dtype and fixed capacity.
    pub fn new(dtype: DType, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        let nulls = dtype.nullable.then(|| NullBitmap::new(capacity));
        Ok(Self {
            dtype,
            capacity,
            data: ColumnData::with_capacity(dtype.kind, capacity),
            nulls,
        })
    }

    /// The buffer's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The buffer's element kind.
    pub fn kind(&self) -> DTypeKind {
        self.dtype.kind
    }

    /// The fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the typed storage for vectorized loops.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Explicitly set the length, extending with default elements or
    /// truncating. The new length must not exceed the capacity.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity {
            return Err(Error::InvalidOffset { index: len, len: self.capacity });
        }
        if len < self.data.len() {
            self.data.truncate(len);
        } else {
            self.data.resize_default(len);
        }
        Ok(())
    }

    fn check_capacity(&self) -> Result<()> {
        if self.data.len() >= self.capacity {
            return Err(Error::BufferFull { capacity: self.capacity });
        }
        Ok(())
    }

    /// Append a non-null value, coercing the scalar into the storage kind.
    ///
    /// String buffers do not accept scalars here; intern first and use
    /// [`ColumnBuffer::append_str_index`].
    pub fn append(&mut self, value: Scalar) -> Result<()> {
        if value.is_null() {
            return self.append_null();
        }
        if self.dtype.kind == DTypeKind::Str {
            return Err(Error::InvalidOperand(
                "string buffers take dictionary indices, not scalars"
                    .to_string(),
            ));
        }
        self.check_capacity()?;
        self.data.push_default();
        let index = self.data.len() - 1;
        if let Err(e) = self.data.store_at(index, &value) {
            self.data.truncate(index);
            return Err(e);
        }
        Ok(())
    }

    /// Append a dictionary index into a string buffer.
    pub fn append_str_index(&mut self, index: u32) -> Result<()> {
        self.check_capacity()?;
        match &mut self.data {
            ColumnData::Str(v) => {
                v.push(index);
                Ok(())
            }
            other => Err(Error::TypeMismatch {
                expected: "String".to_string(),
                actual: other.kind().name().to_string(),
            }),
        }
    }

    /// Append a null slot.
    ///
    /// Requires a nullable buffer; string buffers without a bitmap fall
    /// back to the [`NULL_INDEX`] sentinel.
    pub fn append_null(&mut self) -> Result<()> {
        self.check_capacity()?;
        if self.nulls.is_none() {
            if let ColumnData::Str(v) = &mut self.data {
                v.push(NULL_INDEX);
                return Ok(());
            }
            return Err(Error::TypeMismatch {
                expected: format!("Nullable({})", self.dtype.kind.name()),
                actual: self.dtype.kind.name().to_string(),
            });
        }
        self.data.push_default();
        let index = self.data.len() - 1;
        if let ColumnData::Str(v) = &mut self.data {
            v[index] = NULL_INDEX;
        }
        if let Some(bitmap) = &mut self.nulls {
            bitmap.set(index, true);
        }
        Ok(())
    }

    /// Whether the slot at `index` is null.
    ///
    /// Always false for non-nullable buffers.
    pub fn is_null(&self, index: usize) -> bool {
        if let Some(bitmap) = &self.nulls {
            bitmap.get(index)
        } else if let ColumnData::Str(v) = &self.data {
            v[index] == NULL_INDEX
        } else {
            false
        }
    }

    /// Mark the slot at `index` null or non-null.
    pub fn set_null(&mut self, index: usize, null: bool) -> Result<()> {
        if index >= self.data.len() {
            return Err(Error::InvalidOffset { index, len: self.data.len() });
        }
        match &mut self.nulls {
            Some(bitmap) => {
                bitmap.set(index, null);
                Ok(())
            }
            None => match &mut self.data {
                ColumnData::Str(v) if null => {
                    v[index] = NULL_INDEX;
                    Ok(())
                }
                ColumnData::Str(_) => Ok(()),
                _ => Err(Error::TypeMismatch {
                    expected: format!(
                        "Nullable({})",
                        self.dtype.kind.name()
                    ),
                    actual: self.dtype.kind.name().to_string(),
                }),
            },
        }
    }

    /// Value at `index`, honoring nulls.
    ///
    /// String buffers yield the dictionary index as `Scalar::UInt`; the
    /// chunk-level accessor materializes the string.
    pub fn value(&self, index: usize) -> Scalar {
        if self.is_null(index) {
            return Scalar::Null;
        }
        self.data.value_at(index)
    }

    /// Overwrite the value at `index` (clearing its null bit).
    pub fn set_value(&mut self, index: usize, value: &Scalar) -> Result<()> {
        if index >= self.data.len() {
            return Err(Error::InvalidOffset { index, len: self.data.len() });
        }
        if value.is_null() {
            return self.set_null(index, true);
        }
        self.data.store_at(index, value)?;
        if let Some(bitmap) = &mut self.nulls {
            bitmap.set(index, false);
        }
        Ok(())
    }

    /// Dictionary index of the string at `index`, `None` when null.
    pub fn str_index(&self, index: usize) -> Option<u32> {
        if self.is_null(index) {
            return None;
        }
        match &self.data {
            ColumnData::Str(v) => Some(v[index]),
            _ => None,
        }
    }

    /// Bulk-copy the rows of `other` named by `selection` onto the end of
    /// this buffer. Both buffers must share a kind.
    pub fn copy_from(
        &mut self,
        other: &ColumnBuffer,
        selection: &[u32],
    ) -> Result<()> {
        if other.kind() != self.kind() {
            return Err(Error::TypeMismatch {
                expected: self.kind().name().to_string(),
                actual: other.kind().name().to_string(),
            });
        }
        if self.data.len() + selection.len() > self.capacity {
            return Err(Error::BufferFull { capacity: self.capacity });
        }
        for &row in selection {
            let row = row as usize;
            if row >= other.len() {
                return Err(Error::InvalidOffset {
                    index: row,
                    len: other.len(),
                });
            }
            if other.is_null(row) {
                self.append_null()?;
            } else {
                match (&mut self.data, &other.data) {
                    (ColumnData::Str(dst), ColumnData::Str(src)) => {
                        dst.push(src[row]);
                    }
                    _ => {
                        self.data.push_default();
                        let index = self.data.len() - 1;
                        self.data
                            .store_at(index, &other.data.value_at(row))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Reset for pool reuse: zero the null bitmap and drop the length to
    /// zero without clearing element storage.
    pub fn recycle(&mut self) {
        self.data.truncate(0);
        if let Some(bitmap) = &mut self.nulls {
            bitmap.clear_all();
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_bits() {
        let mut bitmap = NullBitmap::new(20);
        assert!(!bitmap.get(0));
        bitmap.set(0, true);
        bitmap.set(9, true);
        bitmap.set(19, true);
        assert!(bitmap.get(0));
        assert!(bitmap.get(9));
        assert!(bitmap.get(19));
        assert!(!bitmap.get(1));
        assert_eq!(bitmap.count_nulls(20), 3);
        bitmap.set(9, false);
        assert!(!bitmap.get(9));
        bitmap.clear_all();
        assert_eq!(bitmap.count_nulls(20), 0);
    }

    #[test]
    fn test_append_and_read() {
        let mut buf = ColumnBuffer::new(DType::int32(), 4).unwrap();
        buf.append(Scalar::Int(7)).unwrap();
        buf.append(Scalar::Int(-3)).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.value(0), Scalar::Int(7));
        assert_eq!(buf.value(1), Scalar::Int(-3));
        assert!(!buf.is_null(0));
    }

    #[test]
    fn test_capacity_enforced() {
        let mut buf = ColumnBuffer::new(DType::int8(), 2).unwrap();
        buf.append(Scalar::Int(1)).unwrap();
        buf.append(Scalar::Int(2)).unwrap();
        let err = buf.append(Scalar::Int(3)).unwrap_err();
        assert!(matches!(err, Error::BufferFull { capacity: 2 }));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ColumnBuffer::new(DType::int32(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidCapacity(0)));
    }

    #[test]
    fn test_nullable_roundtrip() {
        let mut buf =
            ColumnBuffer::new(DType::float64().nullable(), 8).unwrap();
        buf.append(Scalar::Float(1.5)).unwrap();
        buf.append_null().unwrap();
        buf.append(Scalar::Float(2.5)).unwrap();

        assert!(!buf.is_null(0));
        assert!(buf.is_null(1));
        assert_eq!(buf.value(1), Scalar::Null);
        assert_eq!(buf.value(2), Scalar::Float(2.5));
    }

    #[test]
    fn test_non_nullable_never_null() {
        let mut buf = ColumnBuffer::new(DType::int32(), 4).unwrap();
        buf.append(Scalar::Int(1)).unwrap();
        assert!(!buf.is_null(0));
        assert!(buf.append_null().is_err());
    }

    #[test]
    fn test_string_sentinel_without_bitmap() {
        let mut buf = ColumnBuffer::new(DType::string(), 4).unwrap();
        buf.append_str_index(0).unwrap();
        buf.append_null().unwrap();
        assert!(!buf.is_null(0));
        assert!(buf.is_null(1));
        assert_eq!(buf.str_index(1), None);
        assert_eq!(buf.str_index(0), Some(0));
    }

    #[test]
    fn test_scalar_coercion_on_append() {
        let mut buf = ColumnBuffer::new(DType::float64(), 4).unwrap();
        buf.append(Scalar::Int(3)).unwrap();
        assert_eq!(buf.value(0), Scalar::Float(3.0));

        let mut buf = ColumnBuffer::new(DType::int16(), 4).unwrap();
        buf.append(Scalar::Float(3.9)).unwrap();
        assert_eq!(buf.value(0), Scalar::Int(3));
    }

    #[test]
    fn test_copy_from_selection() {
        let mut src =
            ColumnBuffer::new(DType::int32().nullable(), 8).unwrap();
        for i in 0..5 {
            if i == 2 {
                src.append_null().unwrap();
            } else {
                src.append(Scalar::Int(i)).unwrap();
            }
        }

        let mut dst =
            ColumnBuffer::new(DType::int32().nullable(), 8).unwrap();
        dst.copy_from(&src, &[0, 2, 4]).unwrap();
        assert_eq!(dst.len(), 3);
        assert_eq!(dst.value(0), Scalar::Int(0));
        assert_eq!(dst.value(1), Scalar::Null);
        assert_eq!(dst.value(2), Scalar::Int(4));
    }

    #[test]
    fn test_recycle_resets_without_shrink() {
        let mut buf =
            ColumnBuffer::new(DType::int32().nullable(), 8).unwrap();
        buf.append(Scalar::Int(1)).unwrap();
        buf.append_null().unwrap();
        buf.recycle();
        assert_eq!(buf.len(), 0);
        buf.append(Scalar::Int(9)).unwrap();
        assert!(!buf.is_null(0));
        assert_eq!(buf.value(0), Scalar::Int(9));
    }

    #[test]
    fn test_set_len_and_set_value() {
        let mut buf =
            ColumnBuffer::new(DType::int32().nullable(), 8).unwrap();
        buf.set_len(3).unwrap();
        assert_eq!(buf.len(), 3);
        buf.set_value(1, &Scalar::Int(42)).unwrap();
        assert_eq!(buf.value(1), Scalar::Int(42));
        assert!(buf.set_len(9).is_err());
    }
}
