//! Holdings store and trade journal backends.
//!
//! - [`MemoryStore`]: process memory, with injectable failures
//! - [`JsonFileStore`]: a single JSON document on disk

mod book;
mod file;
mod memory;

pub use book::{AccountBook, StoreState};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
