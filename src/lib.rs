//! # tinydb
//!
//! A single-file, single-process B+ tree storage engine, modeled on the
//! classic `db_tutorial` C project: fixed 4096-byte pages, a sorted leaf
//! chain for ordered scans, and insert-only tables (no update, no
//! delete). Concurrency, transactions and secondary indexes are all out
//! of scope — see `Database` for the supported surface.
//!
//! ## Architecture
//!
//! - **Types** (`types`): page size and other format constants, and the
//!   per-database `Layout` derived from the caller's row width.
//! - **Page layer** (`page`): byte-offset codecs for the common header
//!   and the leaf/interior node bodies. No behavior, just get/set.
//! - **Storage layer** (`storage`): the `Pager`, a page-number-indexed
//!   cache over the backing file with lazy loads and explicit flush.
//! - **B+ tree** (`btree`): find, insert, leaf split, root promotion.
//! - **Cursor** (`cursor`): a position within a leaf, used by scans and
//!   inserts alike.
//! - **Database** (`db`): the public facade tying the above together.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tinydb::{Database, OpenOptions};
//!
//! # fn main() -> tinydb::Result<()> {
//! let mut db = Database::open(OpenOptions::new("my.db", 8))?;
//! db.insert(1, b"payload1")?;
//! db.insert(2, b"payload2")?;
//! for (key, value) in db.select()? {
//!     println!("{key} -> {value:?}");
//! }
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod cursor;
pub mod db;
pub mod error;
pub mod page;
pub mod storage;
pub mod types;

pub use cursor::Cursor;
pub use db::{Constants, Database, OpenOptions, TreeNode};
pub use error::{Result, StorageError};
pub use types::{Layout, PAGE_SIZE};
