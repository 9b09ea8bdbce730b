use std::{
    io,
    path::PathBuf,
    sync::atomic::{AtomicI32, Ordering},
};

use crate::file::{
    page::{PAGE_SIZE, Page},
    page_id::PageId,
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to open page file {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to read page file metadata: {0}")]
    Metadata(#[source] io::Error),

    #[error("Read of {page_id} at offset {offset} is past the end of the file ({len} bytes)")]
    OutOfRange { page_id: PageId, offset: u64, len: u64 },

    #[error("Short write on {page_id}: only {written} bytes reached the file")]
    ShortWrite { page_id: PageId, written: usize },

    #[error("Buffer must be {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("{0} does not address a page")]
    InvalidPageId(PageId),

    /// Every id up to and including `i32::MAX` has been allocated.
    #[error("No page ids left to allocate")]
    IdsExhausted,

    #[error("Page store has been shut down")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-page persistent storage keyed by [`PageId`].
///
/// Page `n` occupies bytes `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)` of the
/// backing storage. Every operation takes `&self`; implementations make each
/// read and write a single positioned operation so callers on different
/// threads cannot disturb one another's offsets.
pub trait PageStore: Send + Sync {
    /// Reads page `id` into `buf`, which must be exactly `PAGE_SIZE` bytes.
    ///
    /// Fails with [`StoreError::OutOfRange`] when the page starts at or past
    /// the end of storage. When fewer than `PAGE_SIZE` bytes are available the
    /// whole of `buf` is zeroed.
    fn read_page(&self, id: PageId, buf: &mut [u8]) -> StoreResult<()>;

    /// Writes `buf` as page `id`. Returns once the data is durable.
    fn write_page(&self, id: PageId, buf: &[u8]) -> StoreResult<()>;

    /// Hands out the next identifier. Identifiers are never reused.
    fn allocate_page(&self) -> StoreResult<PageId>;

    /// Accepted and ignored: space is never reclaimed.
    fn deallocate_page(&self, id: PageId);

    /// Successful writes since the store was opened.
    fn write_count(&self) -> u64;

    /// Logical size of the storage in bytes.
    fn size(&self) -> u64;

    /// Releases the backing storage. Later calls are no-ops.
    fn shutdown(&self) -> StoreResult<()>;

    fn is_closed(&self) -> bool;

    fn load_page(&self, id: PageId) -> StoreResult<Page> {
        let mut page = Page::empty(id);
        self.read_page(id, page.data_mut())?;
        Ok(page)
    }

    /// Writes the page's buffer and marks it clean.
    fn flush_page(&self, page: &mut Page) -> StoreResult<()> {
        self.write_page(page.id(), page.data())?;
        page.mark_dirty(false);
        Ok(())
    }
}

pub(crate) fn check_buffer_len(buf: &[u8]) -> StoreResult<()> {
    if buf.len() != PAGE_SIZE {
        return Err(StoreError::SizeMismatch {
            expected: PAGE_SIZE,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Advances an allocation counter. Once `i32::MAX` has been handed out the
/// counter parks at `i32::MIN` and every later call is refused.
pub(crate) fn take_next_id(counter: &AtomicI32) -> StoreResult<PageId> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
            (id >= 0).then(|| id.checked_add(1).unwrap_or(i32::MIN))
        })
        .map(PageId::new)
        .map_err(|_| StoreError::IdsExhausted)
}

/// First id to allocate in storage that is `len` bytes long: one past the
/// last whole page.
pub(crate) fn first_free_id(len: u64) -> io::Result<i32> {
    let page_count = len / PAGE_SIZE as u64;
    i32::try_from(page_count).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{page_count} pages exceed the page id range"),
        )
    })
}

pub(crate) fn page_offset(id: PageId) -> StoreResult<u64> {
    id.offset().ok_or(StoreError::InvalidPageId(id))
}
