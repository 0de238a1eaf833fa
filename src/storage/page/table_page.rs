use crate::common::{PageId, RecordId, Result, SlotId, StrataError, PAGE_SIZE};

/// Slotted table page layout:
///
/// +------------------+
/// | Page Header      |  (HEADER_SIZE bytes)
/// +------------------+
/// | Slot Array       |  (grows downward)
/// +------------------+
/// | Free Space       |
/// +------------------+
/// | Tuple Data       |  (grows upward from the bottom)
/// +------------------+
///
/// Each slot entry is (offset: u16, length: u16); a length of 0 marks a
/// deleted slot. Pages of one table form a singly-linked chain through
/// `next_page_id`.
const HEADER_SIZE: usize = 16;
const SLOT_SIZE: usize = 4;

const PAGE_ID_OFFSET: usize = 0;
const NEXT_PAGE_ID_OFFSET: usize = 4;
const NUM_SLOTS_OFFSET: usize = 8;
const FREE_SPACE_END_OFFSET: usize = 10;

const INVALID_PAGE: u32 = u32::MAX;

pub struct TablePage<'a> {
    data: &'a mut [u8],
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh table page.
    pub fn init(&mut self, page_id: PageId) {
        self.data.fill(0);
        self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .copy_from_slice(&page_id.as_u32().to_le_bytes());
        self.set_next_page_id(None);
        self.set_num_slots(0);
        self.set_free_space_end(PAGE_SIZE as u16);
    }

    pub fn page_id(&self) -> PageId {
        TablePageRef::new(self.data).page_id()
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        TablePageRef::new(self.data).next_page_id()
    }

    pub fn set_next_page_id(&mut self, page_id: Option<PageId>) {
        let value = page_id.map(|p| p.as_u32()).unwrap_or(INVALID_PAGE);
        self.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&value.to_le_bytes());
    }

    pub fn num_slots(&self) -> u16 {
        TablePageRef::new(self.data).num_slots()
    }

    fn set_num_slots(&mut self, num: u16) {
        self.data[NUM_SLOTS_OFFSET..NUM_SLOTS_OFFSET + 2].copy_from_slice(&num.to_le_bytes());
    }

    fn free_space_end(&self) -> u16 {
        let bytes: [u8; 2] = self.data[FREE_SPACE_END_OFFSET..FREE_SPACE_END_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    fn set_free_space_end(&mut self, end: u16) {
        self.data[FREE_SPACE_END_OFFSET..FREE_SPACE_END_OFFSET + 2]
            .copy_from_slice(&end.to_le_bytes());
    }

    /// Bytes left between the slot array and the tuple data, accounting for
    /// the slot entry a new tuple would need.
    pub fn free_space(&self) -> usize {
        let slots_end = HEADER_SIZE + self.num_slots() as usize * SLOT_SIZE;
        let data_start = self.free_space_end() as usize;
        data_start.saturating_sub(slots_end)
    }

    pub fn has_room_for(&self, tuple_len: usize) -> bool {
        self.free_space() >= tuple_len + SLOT_SIZE
    }

    /// Inserts a tuple, returning its record id.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<RecordId> {
        if !self.has_room_for(tuple.len()) {
            return Err(StrataError::PageOverflow {
                tuple_size: tuple.len(),
                available: self.free_space(),
            });
        }

        let num_slots = self.num_slots();
        let data_end = self.free_space_end() as usize;
        let data_start = data_end - tuple.len();

        self.data[data_start..data_end].copy_from_slice(tuple);
        self.set_free_space_end(data_start as u16);

        let slot_offset = HEADER_SIZE + num_slots as usize * SLOT_SIZE;
        self.data[slot_offset..slot_offset + 2]
            .copy_from_slice(&(data_start as u16).to_le_bytes());
        self.data[slot_offset + 2..slot_offset + 4]
            .copy_from_slice(&(tuple.len() as u16).to_le_bytes());
        self.set_num_slots(num_slots + 1);

        Ok(RecordId::new(self.page_id(), SlotId::new(num_slots)))
    }

    /// Marks a slot deleted. The tuple bytes stay in place; the space is
    /// not reclaimed. Returns false if the slot was already empty.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<bool> {
        let num_slots = self.num_slots();
        if slot_id.as_u16() >= num_slots {
            return Err(StrataError::InvalidSlotId(slot_id.as_u16()));
        }

        let slot_offset = HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
        let length_bytes: [u8; 2] = self.data[slot_offset + 2..slot_offset + 4]
            .try_into()
            .unwrap();
        if u16::from_le_bytes(length_bytes) == 0 {
            return Ok(false);
        }

        self.data[slot_offset + 2..slot_offset + 4].copy_from_slice(&0u16.to_le_bytes());
        Ok(true)
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<Option<&[u8]>> {
        TablePageRef::new(self.data).tuple_at(slot_id)
    }
}

/// Read-only view of a table page.
pub struct TablePageRef<'a> {
    data: &'a [u8],
}

impl<'a> TablePageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::new(u32::from_le_bytes(bytes))
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let bytes: [u8; 4] = self.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        let value = u32::from_le_bytes(bytes);
        if value == INVALID_PAGE {
            None
        } else {
            Some(PageId::new(value))
        }
    }

    pub fn num_slots(&self) -> u16 {
        let bytes: [u8; 2] = self.data[NUM_SLOTS_OFFSET..NUM_SLOTS_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    /// Returns the tuple bytes at `slot_id`, or None for a deleted slot.
    pub fn tuple_at(&self, slot_id: SlotId) -> Result<Option<&'a [u8]>> {
        if slot_id.as_u16() >= self.num_slots() {
            return Err(StrataError::InvalidSlotId(slot_id.as_u16()));
        }

        let slot_offset = HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
        let offset_bytes: [u8; 2] = self.data[slot_offset..slot_offset + 2].try_into().unwrap();
        let length_bytes: [u8; 2] = self.data[slot_offset + 2..slot_offset + 4]
            .try_into()
            .unwrap();

        let offset = u16::from_le_bytes(offset_bytes) as usize;
        let length = u16::from_le_bytes(length_bytes) as usize;

        if length == 0 {
            return Ok(None);
        }
        Ok(Some(&self.data[offset..offset + length]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_page_insert_get() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(1));

        let rid = page.insert_tuple(b"hello").unwrap();
        assert_eq!(rid, RecordId::new(PageId::new(1), SlotId::new(0)));

        let rid2 = page.insert_tuple(b"world!").unwrap();
        assert_eq!(rid2.slot_id, SlotId::new(1));

        assert_eq!(page.get_tuple(SlotId::new(0)).unwrap(), Some(&b"hello"[..]));
        assert_eq!(
            page.get_tuple(SlotId::new(1)).unwrap(),
            Some(&b"world!"[..])
        );
    }

    #[test]
    fn test_table_page_delete() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(1));

        page.insert_tuple(b"doomed").unwrap();
        assert!(page.delete_tuple(SlotId::new(0)).unwrap());
        assert_eq!(page.get_tuple(SlotId::new(0)).unwrap(), None);
        // Double delete reports false.
        assert!(!page.delete_tuple(SlotId::new(0)).unwrap());
    }

    #[test]
    fn test_table_page_overflow() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(1));

        let big = vec![0u8; PAGE_SIZE];
        assert!(page.insert_tuple(&big).is_err());

        // Fill the page with small tuples until it refuses.
        let tuple = [7u8; 64];
        let mut count = 0;
        while page.has_room_for(tuple.len()) {
            page.insert_tuple(&tuple).unwrap();
            count += 1;
        }
        assert!(count > 0);
        assert!(page.insert_tuple(&tuple).is_err());
    }

    #[test]
    fn test_table_page_chain() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(1));

        assert_eq!(page.next_page_id(), None);
        page.set_next_page_id(Some(PageId::new(2)));
        assert_eq!(page.next_page_id(), Some(PageId::new(2)));
    }

    #[test]
    fn test_table_page_bad_slot() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(1));

        assert!(page.get_tuple(SlotId::new(3)).is_err());
    }
}
