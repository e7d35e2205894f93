//! Slotted heap page for fixed-width tuples.
//!
//! Layout (`page_size` bytes):
//!
//! ```text
//! +----------------------+-----------+-----------+-----+--------------+
//! | occupancy bitmap     | slot 0    | slot 1    | ... | zero padding |
//! | ceil(slots/8) bytes  | tuple_size| tuple_size|     |              |
//! +----------------------+-----------+-----------+-----+--------------+
//! ```
//!
//! Bit `i % 8` of header byte `i / 8` is set when slot `i` holds a tuple.
//! The slot count is `floor(page_size * 8 / (tuple_size * 8 + 1))`: each tuple
//! costs its bytes plus one header bit.

use crate::access::{RecordId, Schema, Tuple};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Most slots a page may have: every slot must be nameable by a `u16` slot id.
pub const MAX_SLOTS_PER_PAGE: usize = u16::MAX as usize + 1;

/// Number of tuple slots a page of `page_size` bytes holds.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Number of bitmap bytes needed for `num_slots` slots.
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    data: Vec<u8>,
    num_slots: usize,
    tuple_size: usize,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Create an empty page.
    pub fn new(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Self {
        let tuple_size = schema.byte_size();
        Self {
            page_id,
            num_slots: slots_per_page(page_size, tuple_size),
            tuple_size,
            schema,
            data: vec![0u8; page_size],
            dirtied_by: None,
        }
    }

    /// Wrap bytes read from disk. Every occupied slot must decode under `schema`.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: Vec<u8>) -> StorageResult<Self> {
        let tuple_size = schema.byte_size();
        let page = Self {
            page_id,
            num_slots: slots_per_page(data.len(), tuple_size),
            tuple_size,
            schema,
            data,
            dirtied_by: None,
        };

        for slot in 0..page.num_slots {
            if page.is_slot_used(slot) {
                page.read_slot(slot).map_err(|e| StorageError::CorruptPage {
                    page_id,
                    reason: format!("slot {}: {}", slot, e),
                })?;
            }
        }
        // bits past the last slot must be clear
        for slot in page.num_slots..header_size(page.num_slots) * 8 {
            if page.is_slot_used(slot) {
                return Err(StorageError::CorruptPage {
                    page_id,
                    reason: format!("header bit {} set beyond slot count", slot),
                });
            }
        }

        Ok(page)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Raw page bytes, exactly as they are stored on disk.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        let byte = self.data[slot / 8];
        (byte >> (slot % 8)) & 1 == 1
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.data[slot / 8] |= mask;
        } else {
            self.data[slot / 8] &= !mask;
        }
    }

    fn record_id(&self, slot: usize) -> StorageResult<RecordId> {
        let slot_id = u16::try_from(slot).map_err(|_| StorageError::UnaddressableSlot {
            page_id: self.page_id,
            slot,
        })?;
        Ok(RecordId::new(self.page_id, slot_id))
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = header_size(self.num_slots) + slot * self.tuple_size;
        start..start + self.tuple_size
    }

    fn read_slot(&self, slot: usize) -> StorageResult<Tuple> {
        let range = self.slot_range(slot);
        let mut tuple = Tuple::decode(self.schema.clone(), &mut &self.data[range])?;
        tuple.set_record_id(Some(self.record_id(slot)?));
        Ok(tuple)
    }

    /// Store `tuple` in the first free slot and point its record id there.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(StorageError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        let slot = (0..self.num_slots)
            .find(|&i| !self.is_slot_used(i))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = self.record_id(slot)?;

        let range = self.slot_range(slot);
        let mut encoded = Vec::with_capacity(self.tuple_size);
        tuple.encode(&mut encoded)?;
        self.data[range].copy_from_slice(&encoded);
        self.set_slot_used(slot, true);

        tuple.set_record_id(Some(record_id));
        Ok(record_id)
    }

    /// Free the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> StorageResult<()> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let slot = record_id.slot_id;

        if record_id.page_id != self.page_id {
            return Err(StorageError::InvalidSlot {
                page_id: self.page_id,
                slot,
                reason: "record id points at another page",
            });
        }
        if slot as usize >= self.num_slots {
            return Err(StorageError::InvalidSlot {
                page_id: self.page_id,
                slot,
                reason: "slot out of range",
            });
        }
        if !self.is_slot_used(slot as usize) {
            return Err(StorageError::InvalidSlot {
                page_id: self.page_id,
                slot,
                reason: "slot is empty",
            });
        }

        self.set_slot_used(slot as usize, false);
        let range = self.slot_range(slot as usize);
        self.data[range].fill(0);
        Ok(())
    }

    /// Tuple in `slot`, or `None` if the slot is empty.
    pub fn tuple(&self, slot: usize) -> StorageResult<Option<Tuple>> {
        if slot >= self.num_slots {
            return Err(StorageError::InvalidSlot {
                page_id: self.page_id,
                slot: u16::try_from(slot).unwrap_or(u16::MAX),
                reason: "slot out of range",
            });
        }
        if !self.is_slot_used(slot) {
            return Ok(None);
        }
        self.read_slot(slot).map(Some)
    }

    /// Occupied-slot tuples in increasing slot order.
    pub fn iter(&self) -> impl Iterator<Item = StorageResult<Tuple>> + '_ {
        (0..self.num_slots)
            .filter(|&i| self.is_slot_used(i))
            .map(|i| self.read_slot(i))
    }

    /// Set or clear the dirty flag. Clearing forgets the writer.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = if dirty { Some(tid) } else { None };
    }

    pub fn mark_clean(&mut self) {
        self.dirtied_by = None;
    }

    /// The transaction that last dirtied this page, if it is dirty.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }
}

impl std::fmt::Debug for HeapPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapPage")
            .field("page_id", &self.page_id)
            .field("num_slots", &self.num_slots)
            .field("dirtied_by", &self.dirtied_by)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{DataType, Value};
    use crate::catalog::TableId;
    use rand::seq::SliceRandom;
    use rand::Rng;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::from_pairs([
            ("a", DataType::Int32),
            ("b", DataType::Int32),
        ]))
    }

    fn tuple(a: i32, b: i32) -> Tuple {
        Tuple::from_values(schema(), vec![Value::Int32(a), Value::Int32(b)]).unwrap()
    }

    fn page_id() -> PageId {
        PageId::new(TableId(1), 0)
    }

    #[test]
    fn test_slot_math() {
        // 4096 * 8 / (8 * 8 + 1) = 504 slots, 63 header bytes
        assert_eq!(slots_per_page(4096, 8), 504);
        assert_eq!(header_size(504), 63);
        assert!(header_size(504) + 504 * 8 <= 4096);

        // 17 bytes hold exactly two 8-byte tuples
        assert_eq!(slots_per_page(17, 8), 2);
        assert_eq!(header_size(2), 1);
        assert_eq!(header_size(9), 2);
    }

    #[test]
    fn test_heap_page_initialization() {
        let page = HeapPage::new(page_id(), schema(), 4096);
        assert_eq!(page.page_id(), page_id());
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.num_empty_slots(), 504);
        assert_eq!(page.data().len(), 4096);
        assert!(page.data().iter().all(|&b| b == 0));
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn test_insert_and_get_tuple() -> StorageResult<()> {
        let mut page = HeapPage::new(page_id(), schema(), 4096);

        let mut t1 = tuple(1, 10);
        let rid1 = page.insert_tuple(&mut t1)?;
        assert_eq!(rid1, RecordId::new(page_id(), 0));
        assert_eq!(t1.record_id(), Some(rid1));

        let mut t2 = tuple(2, 20);
        let rid2 = page.insert_tuple(&mut t2)?;
        assert_eq!(rid2.slot_id, 1);

        assert_eq!(page.tuple(0)?, Some(t1));
        assert_eq!(page.tuple(1)?, Some(t2));
        assert_eq!(page.tuple(2)?, None);
        assert_eq!(page.num_empty_slots(), 502);
        assert_eq!(page.data()[0], 0b0000_0011);
        Ok(())
    }

    #[test]
    fn test_delete_tuple_frees_slot() -> StorageResult<()> {
        let mut page = HeapPage::new(page_id(), schema(), 4096);
        let mut t1 = tuple(1, 1);
        let mut t2 = tuple(2, 2);
        page.insert_tuple(&mut t1)?;
        page.insert_tuple(&mut t2)?;

        page.delete_tuple(&t1)?;
        assert_eq!(page.tuple(0)?, None);

        // deleting twice fails
        assert!(matches!(
            page.delete_tuple(&t1),
            Err(StorageError::InvalidSlot { .. })
        ));

        // the freed slot is reused first
        let mut t3 = tuple(3, 3);
        assert_eq!(page.insert_tuple(&mut t3)?.slot_id, 0);
        Ok(())
    }

    #[test]
    fn test_delete_validates_record_id() -> StorageResult<()> {
        let mut page = HeapPage::new(page_id(), schema(), 4096);

        let unplaced = tuple(1, 1);
        assert!(matches!(
            page.delete_tuple(&unplaced),
            Err(StorageError::MissingRecordId)
        ));

        let mut elsewhere = tuple(1, 1);
        elsewhere.set_record_id(Some(RecordId::new(PageId::new(TableId(1), 7), 0)));
        assert!(matches!(
            page.delete_tuple(&elsewhere),
            Err(StorageError::InvalidSlot { .. })
        ));

        let mut out_of_range = tuple(1, 1);
        out_of_range.set_record_id(Some(RecordId::new(page_id(), 9999)));
        assert!(page.delete_tuple(&out_of_range).is_err());
        Ok(())
    }

    #[test]
    fn test_page_full() -> StorageResult<()> {
        let mut page = HeapPage::new(page_id(), schema(), 17);
        page.insert_tuple(&mut tuple(1, 1))?;
        page.insert_tuple(&mut tuple(2, 2))?;
        assert_eq!(page.num_empty_slots(), 0);

        let before = page.data().to_vec();
        let result = page.insert_tuple(&mut tuple(3, 3));
        assert!(matches!(result, Err(StorageError::PageFull(_))));
        // nothing was overwritten
        assert_eq!(page.data(), before.as_slice());
        Ok(())
    }

    #[test]
    fn test_insert_rejects_other_schema() {
        let mut page = HeapPage::new(page_id(), schema(), 4096);
        let other = Arc::new(Schema::from_types(&[DataType::Int32]));
        let mut t = Tuple::from_values(other, vec![Value::Int32(1)]).unwrap();
        assert!(matches!(
            page.insert_tuple(&mut t),
            Err(StorageError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_round_trip_random_slots() -> StorageResult<()> {
        let mut rng = rand::thread_rng();
        let mut page = HeapPage::new(page_id(), schema(), 4096);
        let capacity = page.num_slots();

        for i in 0..capacity {
            page.insert_tuple(&mut tuple(i as i32, rng.gen()))?;
        }

        // free a random subset of slots
        let mut slots: Vec<usize> = (0..capacity).collect();
        slots.shuffle(&mut rng);
        let removed = rng.gen_range(0..capacity);
        for &slot in &slots[..removed] {
            let t = page.tuple(slot)?.unwrap();
            page.delete_tuple(&t)?;
        }

        let expected: Vec<Tuple> = page.iter().collect::<StorageResult<_>>()?;
        assert_eq!(expected.len(), capacity - removed);

        let decoded = HeapPage::from_bytes(page_id(), schema(), page.data().to_vec())?;
        let actual: Vec<Tuple> = decoded.iter().collect::<StorageResult<_>>()?;
        assert_eq!(actual, expected);
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_eq!(a.record_id(), e.record_id());
        }
        assert_eq!(decoded.data(), page.data());
        Ok(())
    }

    #[test]
    fn test_from_bytes_rejects_stray_header_bits() {
        // two slots on a 17 byte page; bit 5 has no slot behind it
        let mut data = vec![0u8; 17];
        data[0] = 0b0010_0000;
        let result = HeapPage::from_bytes(page_id(), schema(), data);
        assert!(matches!(result, Err(StorageError::CorruptPage { .. })));
    }

    #[test]
    fn test_slots_past_u16_are_never_handed_out() -> StorageResult<()> {
        let flags = Arc::new(Schema::from_types(&[DataType::Boolean]));
        // 128 KiB of one-byte tuples: 116508 slots, the first 65536 occupied
        let mut data = vec![0u8; 128 * 1024];
        data[..MAX_SLOTS_PER_PAGE / 8].fill(0xff);
        let mut page = HeapPage::from_bytes(page_id(), flags.clone(), data)?;
        assert!(page.num_slots() > MAX_SLOTS_PER_PAGE);

        let last = page.tuple(MAX_SLOTS_PER_PAGE - 1)?.unwrap();
        assert_eq!(last.record_id().unwrap().slot_id, u16::MAX);

        let before = page.data().to_vec();
        let mut extra = Tuple::from_values(flags, vec![Value::Boolean(true)])?;
        let result = page.insert_tuple(&mut extra);
        assert!(matches!(
            result,
            Err(StorageError::UnaddressableSlot { slot, .. }) if slot == MAX_SLOTS_PER_PAGE
        ));
        assert_eq!(extra.record_id(), None);
        assert_eq!(page.data(), before.as_slice());

        // slot 0 is still the one a delete of slot 0 frees
        let first = page.tuple(0)?.unwrap();
        page.delete_tuple(&first)?;
        assert!(!page.is_slot_used(0));
        assert!(page.is_slot_used(MAX_SLOTS_PER_PAGE - 1));
        Ok(())
    }

    #[test]
    fn test_dirty_tracking() {
        let mut page = HeapPage::new(page_id(), schema(), 4096);
        assert_eq!(page.is_dirty(), None);

        page.mark_dirty(true, TransactionId(7));
        assert_eq!(page.is_dirty(), Some(TransactionId(7)));

        page.mark_dirty(false, TransactionId(7));
        assert_eq!(page.is_dirty(), None);

        page.mark_dirty(true, TransactionId(8));
        page.mark_clean();
        assert_eq!(page.is_dirty(), None);
    }
}
