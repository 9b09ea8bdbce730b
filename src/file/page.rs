use crate::file::page_id::PageId;

/// Size of every page, on disk and in memory.
pub const PAGE_SIZE: usize = 4096;

/// A Page is the in-memory copy of one fixed-size block of the backing file.
///
/// The page owns its buffer and never interprets it. Pin count and dirty flag
/// are bookkeeping for whoever caches pages; the page itself never writes
/// itself back to disk.
#[derive(Debug)]
pub struct Page {
    id: PageId,

    /// Number of holders currently referencing this page.
    pin_count: u32,

    /// Modified in memory but not yet written through a store.
    dirty: bool,

    data: Box<[u8; PAGE_SIZE]>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("Attempted to access data outside the bounds of the page")]
    OutOfBounds { offset: usize, len: usize },

    #[error("Page data must be {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type PageResult<T> = Result<T, PageError>;

impl Page {
    /// Wraps bytes already read from storage. The creator holds the first pin.
    pub fn with_bytes(id: PageId, dirty: bool, data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self {
            id,
            pin_count: 1,
            dirty,
            data,
        }
    }

    pub fn from_slice(id: PageId, bytes: &[u8]) -> PageResult<Self> {
        let data: Box<[u8; PAGE_SIZE]> = bytes
            .to_vec()
            .into_boxed_slice()
            .try_into()
            .map_err(|_| PageError::SizeMismatch {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::with_bytes(id, false, data))
    }

    /// A zero-filled, clean page for a freshly allocated id.
    pub fn empty(id: PageId) -> Self {
        Self::with_bytes(id, false, Box::new([0; PAGE_SIZE]))
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub fn unpin(&mut self) {
        if self.pin_count > 0 {
            self.pin_count -= 1;
        }
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn mark_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Copies `bytes` into the page starting at `offset`. Does not touch the
    /// dirty flag.
    pub fn copy_into(&mut self, offset: usize, bytes: &[u8]) -> PageResult<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= PAGE_SIZE)
            .ok_or(PageError::OutOfBounds {
                offset,
                len: bytes.len(),
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}
