use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::common::{PageId, RecordId, SlotId};
use crate::tuple::{Schema, Tuple};

/// A fixed-width value that can live inside a B+Tree page. Keys and leaf
/// values both implement this; `SIZE` fixes the entry stride at compile
/// time for each monomorphization.
pub trait Storable: Copy + Send + Sync + 'static {
    const SIZE: usize;

    /// Writes exactly `SIZE` bytes into `buf`.
    fn encode(&self, buf: &mut [u8]);

    /// Reads back a value from exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Self;
}

impl Storable for i32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        i32::from_le_bytes(buf[..4].try_into().unwrap())
    }
}

impl Storable for i64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        i64::from_le_bytes(buf[..8].try_into().unwrap())
    }
}

impl Storable for u32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        u32::from_le_bytes(buf[..4].try_into().unwrap())
    }
}

impl Storable for u64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        u64::from_le_bytes(buf[..8].try_into().unwrap())
    }
}

impl Storable for PageId {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.as_u32().to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        PageId::new(u32::from_le_bytes(buf[..4].try_into().unwrap()))
    }
}

impl Storable for RecordId {
    const SIZE: usize = 6;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.as_u32().to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot_id.as_u16().to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        RecordId::new(
            PageId::new(u32::from_le_bytes(buf[..4].try_into().unwrap())),
            SlotId::new(u16::from_le_bytes(buf[4..6].try_into().unwrap())),
        )
    }
}

/// Orders keys for a B+Tree. Comparator objects are cloned into every tree
/// and iterator, so they should stay cheap.
pub trait KeyComparator<K>: Send + Sync + Clone {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Comparator for keys with a native total order.
pub struct OrdComparator<K> {
    _marker: PhantomData<fn(K)>,
}

impl<K> OrdComparator<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for OrdComparator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for OrdComparator<K> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<K: Ord + Send + Sync> KeyComparator<K> for OrdComparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// A fixed-width index key built from a tuple's key columns. The tuple's
/// serialized form is packed into `N` bytes, zero-padded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        let bytes = tuple.to_bytes()?;
        if bytes.len() > N {
            return None;
        }
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(&bytes);
        Some(Self { data })
    }

    pub fn to_tuple(&self, key_schema: Arc<Schema>) -> Option<Tuple> {
        Tuple::from_bytes(key_schema, &self.data)
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> Storable for GenericKey<N> {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(&buf[..N]);
        Self { data }
    }
}

/// Compares [`GenericKey`]s by decoding them against the key schema and
/// comparing column by column.
pub struct GenericComparator<const N: usize> {
    key_schema: Arc<Schema>,
}

impl<const N: usize> GenericComparator<N> {
    pub fn new(key_schema: Arc<Schema>) -> Self {
        Self { key_schema }
    }
}

impl<const N: usize> Clone for GenericComparator<N> {
    fn clone(&self) -> Self {
        Self {
            key_schema: Arc::clone(&self.key_schema),
        }
    }
}

impl<const N: usize> KeyComparator<GenericKey<N>> for GenericComparator<N> {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        let lhs = a.to_tuple(Arc::clone(&self.key_schema));
        let rhs = b.to_tuple(Arc::clone(&self.key_schema));
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Ordering::Equal;
        };

        for i in 0..self.key_schema.column_count() {
            let ord = lhs.value(i).and_then(|l| {
                rhs.value(i).and_then(|r| l.compare(r))
            });
            match ord {
                Some(Ordering::Equal) | None => continue,
                Some(other) => return other,
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{DataType, TupleBuilder};

    #[test]
    fn test_storable_round_trips() {
        let mut buf = [0u8; 8];

        42i64.encode(&mut buf);
        assert_eq!(i64::decode(&buf), 42);

        let rid = RecordId::new(PageId::new(3), SlotId::new(9));
        rid.encode(&mut buf);
        assert_eq!(RecordId::decode(&buf), rid);
    }

    #[test]
    fn test_ord_comparator() {
        let cmp = OrdComparator::<i64>::new();
        assert_eq!(cmp.compare(&1, &2), Ordering::Less);
        assert_eq!(cmp.compare(&2, &2), Ordering::Equal);
        assert_eq!(cmp.compare(&3, &2), Ordering::Greater);
    }

    #[test]
    fn test_generic_key_comparator() {
        let key_schema = Schema::builder()
            .column("id", DataType::Integer)
            .build_arc();
        let cmp = GenericComparator::<8>::new(key_schema.clone());

        let k1 = GenericKey::<8>::from_tuple(
            &TupleBuilder::new(key_schema.clone()).value(10).build(),
        )
        .unwrap();
        let k2 = GenericKey::<8>::from_tuple(
            &TupleBuilder::new(key_schema.clone()).value(20).build(),
        )
        .unwrap();

        assert_eq!(cmp.compare(&k1, &k2), Ordering::Less);
        assert_eq!(cmp.compare(&k2, &k1), Ordering::Greater);
        assert_eq!(cmp.compare(&k1, &k1), Ordering::Equal);
    }

    #[test]
    fn test_generic_key_too_wide() {
        let key_schema = Schema::builder()
            .column("name", DataType::VarChar(64))
            .build_arc();
        let tuple = TupleBuilder::new(key_schema)
            .value("a very long key that cannot fit in eight bytes")
            .build();
        assert!(GenericKey::<8>::from_tuple(&tuple).is_none());
    }
}
