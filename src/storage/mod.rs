//! Storage layer: disk I/O and page caching.

mod pager;

pub use pager::Pager;
