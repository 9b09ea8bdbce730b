use std::{
    io,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicI32, AtomicU64, Ordering},
    },
};

use log::{debug, trace};

use crate::file::{
    page::PAGE_SIZE,
    page_id::PageId,
    store::{
        PageStore, StoreError, StoreResult, check_buffer_len, first_free_id, page_offset,
        take_next_id,
    },
};

/// A [`PageStore`] kept entirely in memory.
///
/// Same layout and semantics as [`FileManager`](crate::file::FileManager),
/// minus durability. Useful for tests and scratch space.
#[derive(Debug)]
pub struct MemoryStore {
    /// `None` once shut down.
    image: Mutex<Option<Vec<u8>>>,
    next_page_id: AtomicI32,
    num_writes: AtomicU64,
    size: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_image(Vec::new(), 0)
    }

    /// Starts from an existing image, seeding allocation past its whole pages.
    /// Fails like [`FileManager::open`](crate::file::FileManager::open) when the
    /// image holds more pages than there are page ids.
    pub fn with_bytes(image: Vec<u8>) -> StoreResult<Self> {
        let next_page_id = first_free_id(image.len() as u64)?;
        Ok(Self::from_image(image, next_page_id))
    }

    fn from_image(image: Vec<u8>, next_page_id: i32) -> Self {
        debug!(
            "Memory store created with {} bytes, next page id {}",
            image.len(),
            next_page_id
        );
        Self {
            size: AtomicU64::new(image.len() as u64),
            image: Mutex::new(Some(image)),
            next_page_id: AtomicI32::new(next_page_id),
            num_writes: AtomicU64::new(0),
        }
    }

    fn image(&self) -> StoreResult<MutexGuard<'_, Option<Vec<u8>>>> {
        self.image
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire memory store lock").into())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for MemoryStore {
    fn read_page(&self, id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        let guard = self.image()?;
        let image = guard.as_ref().ok_or(StoreError::Closed)?;
        check_buffer_len(buf)?;
        let offset = page_offset(id)?;

        let len = image.len() as u64;
        if offset >= len {
            return Err(StoreError::OutOfRange {
                page_id: id,
                offset,
                len,
            });
        }

        let start = offset as usize;
        match image.get(start..start + PAGE_SIZE) {
            Some(src) => buf.copy_from_slice(src),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, id: PageId, buf: &[u8]) -> StoreResult<()> {
        let mut guard = self.image()?;
        let image = guard.as_mut().ok_or(StoreError::Closed)?;
        check_buffer_len(buf)?;
        let offset = page_offset(id)?;

        trace!("Writing {} to memory store", id);
        let start = usize::try_from(offset).map_err(|_| StoreError::InvalidPageId(id))?;
        let end = start + PAGE_SIZE;
        if image.len() < end {
            image.try_reserve(end - image.len()).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("Cannot grow memory store to {end} bytes for {id}: {e}"),
                )
            })?;
            image.resize(end, 0);
        }
        image[start..end].copy_from_slice(buf);
        self.size.fetch_max(end as u64, Ordering::SeqCst);
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn allocate_page(&self) -> StoreResult<PageId> {
        self.image()?.as_ref().ok_or(StoreError::Closed)?;
        take_next_id(&self.next_page_id)
    }

    fn deallocate_page(&self, _id: PageId) {}

    fn write_count(&self) -> u64 {
        self.num_writes.load(Ordering::SeqCst)
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    fn shutdown(&self) -> StoreResult<()> {
        let mut guard = self.image()?;
        if guard.take().is_some() {
            debug!("Memory store closed after {} writes", self.write_count());
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.image.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::file::store::conformance::{self, page_filled_with};

    #[test]
    fn seeded_image_sets_next_id_and_size() {
        let store = MemoryStore::with_bytes(vec![4u8; 2 * PAGE_SIZE + 1])
            .expect("Failed to create MemoryStore");
        assert_eq!(store.size(), 2 * PAGE_SIZE as u64 + 1);
        assert_eq!(store.allocate_page().ok(), Some(PageId::new(2)));
    }

    #[test]
    fn short_read_zeroes_whole_buffer() {
        let store = MemoryStore::with_bytes(vec![4u8; PAGE_SIZE + 1])
            .expect("Failed to create MemoryStore");
        let mut buf = page_filled_with(0xFF);
        store
            .read_page(PageId::new(1), &mut buf)
            .expect("Failed to read partial page");
        assert_eq!(buf, page_filled_with(0));
    }

    #[test]
    fn write_too_large_for_memory_is_an_error() {
        let store = MemoryStore::new();
        let res = store.write_page(PageId::new(i32::MAX), &page_filled_with(1));
        assert!(matches!(
            res,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::OutOfMemory
        ));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.size(), 0);

        // the store is still usable afterwards
        store
            .write_page(PageId::new(0), &page_filled_with(1))
            .expect("Failed to write page 0");
        assert_eq!(store.size(), PAGE_SIZE as u64);
    }

    #[test]
    fn roundtrip() {
        conformance::write_then_read_roundtrip(&MemoryStore::new());
    }

    #[test]
    fn out_of_range_read() {
        conformance::read_past_end_is_out_of_range(&MemoryStore::new());
    }

    #[test]
    fn buffer_size_checked() {
        conformance::buffer_size_is_checked(&MemoryStore::new());
    }

    #[test]
    fn invalid_ids_rejected() {
        conformance::invalid_ids_are_rejected(&MemoryStore::new());
    }

    #[test]
    fn allocation_monotonic() {
        conformance::allocation_is_monotonic(&MemoryStore::new());
    }

    #[test]
    fn deallocate_is_inert() {
        conformance::deallocate_does_not_recycle(&MemoryStore::new());
    }

    #[test]
    fn write_accounting() {
        conformance::writes_are_counted_and_extend_size(&MemoryStore::new());
    }

    #[test]
    fn load_and_flush() {
        conformance::load_and_flush_pages(&MemoryStore::new());
    }

    #[test]
    fn closed_store() {
        conformance::closed_store_refuses_io(&MemoryStore::new());
    }
}
