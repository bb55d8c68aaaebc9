use std::fmt;
use std::io::Read;

pub mod blob;
pub mod folder;
pub mod memory;

pub use blob::PackedBlobSource;
pub use folder::FolderSource;
pub use memory::MemorySource;

/// Where an entry's stored bytes live.
///
/// Implementations hand out an independent reader per call so several
/// workers can read from the same source at once.
pub trait PackSource: Send + Sync + fmt::Debug {
    /// Opens `size` bytes starting at `offset` for the entry recorded as `raw_path`.
    ///
    /// The returned reader may end early if the source is shorter than
    /// requested; callers that need exactly `size` bytes enforce that themselves.
    fn open_range(
        &self,
        raw_path: &str,
        offset: u64,
        size: u64,
    ) -> std::io::Result<Box<dyn Read + Send + '_>>;
}
