//! Page-based storage over a flat file.
//!
//! This module provides the storage foundation of the engine:
//! - Page identification and its 4-byte wire form
//! - The in-memory page with pin count and dirty flag
//! - The `PageStore` contract with file-backed and in-memory implementations

// Private modules - not exposed in public API
mod manager;
mod memory;
mod page;
mod page_id;
mod store;

// Public re-exports with inlined documentation
#[doc(inline)]
pub use self::manager::{FileManager, FileOptions, SyncMode};
#[doc(inline)]
pub use self::memory::MemoryStore;
#[doc(inline)]
pub use self::page::{PAGE_SIZE, Page, PageError, PageResult};
#[doc(inline)]
pub use self::page_id::{PageId, PageIdError};
#[doc(inline)]
pub use self::store::{PageStore, StoreError, StoreResult};
