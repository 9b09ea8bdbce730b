use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::{FileExt, OpenOptionsExt},
    path::{Path, PathBuf},
    sync::{
        RwLock, RwLockReadGuard,
        atomic::{AtomicI32, AtomicU64, Ordering},
    },
};

use log::{debug, trace, warn};

use crate::file::{
    page::PAGE_SIZE,
    page_id::PageId,
    store::{
        PageStore, StoreError, StoreResult, check_buffer_len, first_free_id, page_offset,
        take_next_id,
    },
};

/// How a write is made durable before `write_page` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Open the file with `O_SYNC`; every write reaches the device before it
    /// returns.
    #[default]
    OSync,

    /// Plain open, followed by `fdatasync` after each page write.
    SyncData,
}

#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    sync: SyncMode,
}

impl FileOptions {
    pub fn sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync
    }
}

/// A [`PageStore`] backed by one flat file with no header.
pub struct FileManager {
    path: PathBuf,
    options: FileOptions,

    /// `None` once the store has been shut down.
    file: RwLock<Option<File>>,

    next_page_id: AtomicI32,
    num_writes: AtomicU64,

    /// Logical length of the file in bytes.
    size: AtomicU64,
}

impl FileManager {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, FileOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: FileOptions) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening page file {:?} with {:?}", path, options);

        let mut open_options = OpenOptions::new();
        open_options
            .read(true)
            .write(true)
            .create(true)
            .truncate(false);
        if options.sync == SyncMode::OSync {
            open_options.custom_flags(libc::O_SYNC);
        }

        let open_error = |source: io::Error| StoreError::Open {
            path: path.clone(),
            source,
        };
        let file = open_options.open(&path).map_err(open_error)?;
        let size = file.metadata().map_err(open_error)?.len();

        let next_page_id = first_free_id(size).map_err(open_error)?;
        if size % PAGE_SIZE as u64 != 0 {
            warn!(
                "Page file {:?} ends with a partial page ({} trailing bytes)",
                path,
                size % PAGE_SIZE as u64
            );
        }

        debug!(
            "Page file {:?} opened: {} bytes, next page id {}",
            path, size, next_page_id
        );
        Ok(Self {
            path,
            options,
            file: RwLock::new(Some(file)),
            next_page_id: AtomicI32::new(next_page_id),
            num_writes: AtomicU64::new(0),
            size: AtomicU64::new(size),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The id the next `allocate_page` call will return. Negative once every
    /// id has been handed out.
    pub fn next_page_id(&self) -> PageId {
        PageId::new(self.next_page_id.load(Ordering::SeqCst))
    }

    fn handle(&self) -> StoreResult<RwLockReadGuard<'_, Option<File>>> {
        let guard = self
            .file
            .read()
            .map_err(|_| io::Error::other("Failed to acquire page file lock"))?;
        Ok(guard)
    }
}

/// Reads until `buf` is full or the file ends; returns the bytes read.
fn read_fully_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match file.read_at(&mut buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

fn write_fully_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match file.write_at(&buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

impl PageStore for FileManager {
    fn read_page(&self, id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        let guard = self.handle()?;
        let file = guard.as_ref().ok_or(StoreError::Closed)?;
        check_buffer_len(buf)?;
        let offset = page_offset(id)?;

        let len = file.metadata().map_err(StoreError::Metadata)?.len();
        if offset >= len {
            return Err(StoreError::OutOfRange {
                page_id: id,
                offset,
                len,
            });
        }

        trace!("Reading {} at offset {} from {:?}", id, offset, self.path);
        let read = read_fully_at(file, buf, offset)?;
        if read < PAGE_SIZE {
            warn!(
                "Short read of {} from {:?}: {} of {} bytes, returning a zeroed page",
                id, self.path, read, PAGE_SIZE
            );
            buf.fill(0);
        }
        Ok(())
    }

    fn write_page(&self, id: PageId, buf: &[u8]) -> StoreResult<()> {
        let guard = self.handle()?;
        let file = guard.as_ref().ok_or(StoreError::Closed)?;
        check_buffer_len(buf)?;
        let offset = page_offset(id)?;

        trace!("Writing {} at offset {} to {:?}", id, offset, self.path);
        let written = write_fully_at(file, buf, offset)?;
        if written != PAGE_SIZE {
            return Err(StoreError::ShortWrite {
                page_id: id,
                written,
            });
        }
        if self.options.sync == SyncMode::SyncData {
            file.sync_data()?;
        }

        self.size
            .fetch_max(offset + PAGE_SIZE as u64, Ordering::SeqCst);
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn allocate_page(&self) -> StoreResult<PageId> {
        self.handle()?.as_ref().ok_or(StoreError::Closed)?;
        let id = take_next_id(&self.next_page_id)?;
        trace!("Allocated {} in {:?}", id, self.path);
        Ok(id)
    }

    fn deallocate_page(&self, id: PageId) {
        trace!("Ignoring deallocation of {} in {:?}", id, self.path);
    }

    fn write_count(&self) -> u64 {
        self.num_writes.load(Ordering::SeqCst)
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    fn shutdown(&self) -> StoreResult<()> {
        let mut guard = self
            .file
            .write()
            .map_err(|_| io::Error::other("Failed to acquire page file lock"))?;
        match guard.take() {
            Some(file) => {
                file.sync_all()?;
                debug!(
                    "Page file {:?} closed after {} writes",
                    self.path,
                    self.write_count()
                );
            }
            None => debug!("Page file {:?} was already closed", self.path),
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.file.read().map(|guard| guard.is_none()).unwrap_or(true)
    }
}
