//! Database facade: the public entry point wrapping the pager and tree.

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::btree;
use crate::error::Result;
use crate::page::header::{self, NodeType};
use crate::page::{internal, leaf};
use crate::storage::Pager;
use crate::types::{Layout, INTERNAL_MAX_CELLS, ROOT_PAGE_NUM};

/// Options controlling how a database file is opened.
///
/// `payload_size` fixes the row schema for the lifetime of the file: the
/// row layout itself is out of scope for this engine, so the caller picks
/// a width and every `insert` payload must match it exactly.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub path: PathBuf,
    pub payload_size: usize,
    pub sync_on_write: bool,
}

impl OpenOptions {
    pub fn new<P: Into<PathBuf>>(path: P, payload_size: usize) -> Self {
        Self {
            path: path.into(),
            payload_size,
            sync_on_write: false,
        }
    }

    /// Fsync the file on every flush rather than just at `close`.
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }
}

/// Diagnostic dump of the size constants this database was opened with,
/// mirroring the `.constants` command from the tutorial this engine is
/// modeled on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constants {
    pub row_size: usize,
    pub common_node_header_size: usize,
    pub leaf_node_header_size: usize,
    pub leaf_node_cell_size: usize,
    pub leaf_node_max_cells: usize,
    pub internal_node_max_cells: usize,
}

/// A node in the tree, exported (recursively, with all of its children)
/// for the `.btree` diagnostic command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub page_num: u32,
    pub is_leaf: bool,
    pub keys: Vec<u32>,
    pub children: Vec<TreeNode>,
}

/// The storage engine's public facade: open a file, insert rows, scan
/// them back in key order, close.
///
/// A `Database` owns its pager exclusively; it is not `Sync` and has no
/// internal locking, matching this engine's single-owner, single-thread
/// resource model.
pub struct Database {
    pager: Pager,
    layout: Layout,
}

impl Database {
    /// Open or create a database file.
    pub fn open(options: OpenOptions) -> Result<Self> {
        let mut pager = Pager::open(&options.path, options.sync_on_write)?;
        let layout = Layout::new(options.payload_size);

        if pager.num_pages() == 0 {
            let root = pager.get_page_mut(ROOT_PAGE_NUM)?;
            leaf::initialize(root);
            header::set_is_root(root, true);
        }

        info!(
            "opened {} ({} pages, {}-byte rows)",
            options.path.display(),
            pager.num_pages(),
            layout.payload_size
        );

        Ok(Self { pager, layout })
    }

    /// Insert a row. Fails with [`crate::error::StorageError::DuplicateKey`]
    /// if `key` already exists.
    pub fn insert(&mut self, key: u32, payload: &[u8]) -> Result<()> {
        btree::insert(&mut self.pager, &self.layout, key, payload)
    }

    /// Scan every row in ascending key order.
    pub fn select(&mut self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut rows = Vec::new();
        let mut cursor = btree::start(&mut self.pager)?;

        loop {
            let page = self.pager.get_page(cursor.page_num)?;
            let key = leaf::key(page, &self.layout, cursor.cell_num);
            let value = leaf::value(page, &self.layout, cursor.cell_num).to_vec();
            rows.push((key, value));

            if cursor.end_of_table {
                break;
            }
            btree::advance(&mut self.pager, &mut cursor)?;
        }

        Ok(rows)
    }

    /// Dump the size constants this database was opened with.
    pub fn constants(&self) -> Constants {
        Constants {
            row_size: self.layout.payload_size,
            common_node_header_size: Layout::COMMON_HEADER_SIZE,
            leaf_node_header_size: Layout::LEAF_HEADER_SIZE,
            leaf_node_cell_size: self.layout.leaf_cell_size,
            leaf_node_max_cells: self.layout.leaf_max_cells,
            internal_node_max_cells: INTERNAL_MAX_CELLS,
        }
    }

    /// Export the whole tree, rooted at page 0, for the `.btree` command.
    pub fn export_tree(&mut self) -> Result<TreeNode> {
        self.export_node(ROOT_PAGE_NUM)
    }

    fn export_node(&mut self, page_num: u32) -> Result<TreeNode> {
        let (is_leaf, keys, child_pages) = {
            let page = self.pager.get_page(page_num)?;
            match header::node_type(page)? {
                NodeType::Leaf => {
                    let num_cells = leaf::num_cells(page);
                    let keys = (0..num_cells)
                        .map(|i| leaf::key(page, &self.layout, i))
                        .collect();
                    (true, keys, Vec::new())
                }
                NodeType::Internal => {
                    let num_keys = internal::num_keys(page);
                    let keys: Vec<u32> = (0..num_keys).map(|i| internal::key(page, i)).collect();
                    let child_pages: Vec<u32> = (0..=num_keys)
                        .map(|i| internal::child_at(page, i))
                        .collect::<Result<_>>()?;
                    (false, keys, child_pages)
                }
            }
        };

        let mut children = Vec::with_capacity(child_pages.len());
        for child_page in child_pages {
            children.push(self.export_node(child_page)?);
        }

        Ok(TreeNode {
            page_num,
            is_leaf,
            keys,
            children,
        })
    }

    /// Flush every loaded page to disk and sync the file.
    ///
    /// This is the only durability point this engine offers beyond an
    /// explicit `sync_on_write`; there is no WAL and no crash recovery.
    pub fn close(mut self) -> Result<()> {
        self.pager.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(id: u32, username: &str, email: &str) -> Vec<u8> {
        let mut buf = vec![0u8; 293];
        buf[0..4].copy_from_slice(&id.to_le_bytes());
        let username = username.as_bytes();
        buf[4..4 + username.len()].copy_from_slice(username);
        let email = email.as_bytes();
        buf[37..37 + email.len()].copy_from_slice(email);
        buf
    }

    #[test]
    fn persists_rows_across_close_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut db = Database::open(OpenOptions::new(&path, 293)).unwrap();
            db.insert(1, &row(1, "user1", "user1@example.com")).unwrap();
            db.insert(2, &row(2, "user2", "user2@example.com")).unwrap();
            db.close().unwrap();
        }

        {
            let mut db = Database::open(OpenOptions::new(&path, 293)).unwrap();
            let rows = db.select().unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].0, 1);
            assert_eq!(rows[1].0, 2);
        }
    }

    #[test]
    fn rejects_duplicate_insert_with_engine_error_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut db = Database::open(OpenOptions::new(&path, 293)).unwrap();
        db.insert(1, &row(1, "a", "a@example.com")).unwrap();
        let err = db.insert(1, &row(1, "b", "b@example.com")).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate key.");
    }

    #[test]
    fn constants_reflect_the_worked_example_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(OpenOptions::new(&path, 293)).unwrap();
        let c = db.constants();
        assert_eq!(c.row_size, 293);
        assert_eq!(c.leaf_node_max_cells, 13);
    }

    #[test]
    fn export_tree_reaches_every_leaf_after_a_split() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut db = Database::open(OpenOptions::new(&path, 293)).unwrap();
        for id in 1..=14u32 {
            db.insert(id, &row(id, "user", "user@example.com")).unwrap();
        }
        let tree = db.export_tree().unwrap();
        assert!(!tree.is_leaf);
        assert_eq!(tree.children.len(), 2);
    }
}
