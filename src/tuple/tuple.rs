use std::sync::Arc;

use super::{Schema, Value};

/// A single row. Values are kept in schema order; serialization produces:
///
/// ```text
/// +----------------+------------------+------------------+
/// | Null Bitmap    | Fixed-Size Data  | Variable-Size    |
/// | (N bytes)      | (F bytes)        | Data (V bytes)   |
/// +----------------+------------------+------------------+
/// ```
///
/// Null columns occupy their full width in the fixed section (zeroed) and a
/// zero-length prefix in the variable section, so offsets stay computable
/// from the schema alone.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Tuple {
    /// # Panics
    /// Panics if the number of values doesn't match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "Value count must match schema column count"
        );
        Self { schema, values }
    }

    /// Decodes a tuple from its serialized form.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let values = Self::deserialize_values(&schema, data)?;
        Some(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serializes the tuple for storage. None if any value is incompatible
    /// with its column type.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&self.null_bitmap());

        for (i, col) in self.schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                let value = &self.values[i];
                if value.is_null() {
                    bytes.extend(vec![0u8; col.data_type().fixed_size().unwrap()]);
                } else {
                    bytes.extend(value.serialize(col.data_type())?);
                }
            }
        }

        for (i, col) in self.schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                let value = &self.values[i];
                if value.is_null() {
                    bytes.extend_from_slice(&0u16.to_le_bytes());
                } else {
                    bytes.extend(value.serialize(col.data_type())?);
                }
            }
        }

        Some(bytes)
    }

    /// Projects the key columns out of this tuple, producing the key tuple
    /// an index stores. `key_attrs[i]` names the column of this tuple that
    /// becomes column `i` of the key schema.
    pub fn key_from_tuple(&self, key_schema: Arc<Schema>, key_attrs: &[usize]) -> Tuple {
        let values = key_attrs
            .iter()
            .map(|&i| self.values[i].clone())
            .collect();
        Tuple::new(key_schema, values)
    }

    fn null_bitmap(&self) -> Vec<u8> {
        let mut bitmap = vec![0u8; self.schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        bitmap
    }

    fn deserialize_values(schema: &Schema, data: &[u8]) -> Option<Vec<Value>> {
        let null_bitmap_size = schema.null_bitmap_size();
        let null_bitmap = data.get(..null_bitmap_size)?;
        let mut offset = null_bitmap_size;

        let is_null =
            |col_index: usize| -> bool { (null_bitmap[col_index / 8] & (1 << (col_index % 8))) != 0 };

        let mut values = vec![Value::Null; schema.column_count()];

        for (i, col) in schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                let size = col.data_type().fixed_size().unwrap();
                if !is_null(i) {
                    let (value, consumed) =
                        Value::deserialize(data.get(offset..)?, col.data_type())?;
                    debug_assert_eq!(consumed, size);
                    values[i] = value;
                }
                offset += size;
            }
        }

        for (i, col) in schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                if is_null(i) {
                    // Null variable columns carry a zero-length prefix
                    let len_bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
                    if u16::from_le_bytes(len_bytes) != 0 {
                        return None;
                    }
                    offset += 2;
                } else {
                    let (value, consumed) =
                        Value::deserialize(data.get(offset..)?, col.data_type())?;
                    values[i] = value;
                    offset += consumed;
                }
            }
        }

        Some(values)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

/// Fluent tuple construction against a schema.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
    current_index: usize,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: vec![Value::Null; count],
            current_index: 0,
        }
    }

    /// Sets the value at the current position and advances.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        if self.current_index < self.values.len() {
            self.values[self.current_index] = value.into();
            self.current_index += 1;
        }
        self
    }

    /// Leaves the current position null and advances.
    pub fn null(mut self) -> Self {
        if self.current_index < self.values.len() {
            self.current_index += 1;
        }
        self
    }

    pub fn build(self) -> Tuple {
        Tuple::new(self.schema, self.values)
    }
}
