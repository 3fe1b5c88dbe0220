//! Error types for the storage engine.

use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An insert targeted a key that already exists in the table.
    #[error("Duplicate key.")]
    DuplicateKey,

    /// An insert would overflow an interior node's cell capacity.
    ///
    /// Splitting interior nodes is out of scope for this engine; once a
    /// tree would need one, further inserts along that path fail instead
    /// of silently growing the tree past two levels.
    #[error("Need to implement splitting internal node.")]
    InternalSplitUnsupported,

    /// The pager has no room left to allocate a new page.
    #[error("Pager is full: page {page_num} exceeds the maximum of {max} pages.")]
    PagerFull { page_num: u32, max: usize },

    /// Requested page number lies outside the file's current extent.
    #[error("Page {page_num} does not exist in this file.")]
    NullPage { page_num: u32 },

    /// The backing file's length isn't a whole number of `PAGE_SIZE`
    /// pages.
    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    /// A page's on-disk bytes don't decode to a recognized node: an
    /// unexpected node-type byte.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// A page or cell index was addressed outside the bounds the node's
    /// own header says it has (e.g. an internal node child index beyond
    /// `num_keys`).
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// The caller supplied a payload that doesn't match the payload width
    /// the database was opened with.
    #[error("Payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },
}
