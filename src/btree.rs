//! B+ tree operations: find, insert, leaf split, root promotion.
//!
//! The tree is at most two levels deep. Internal node splitting is not
//! implemented, so once an internal node would overflow, inserts that
//! need a new separator in it fail with
//! [`StorageError::InternalSplitUnsupported`] instead of growing a third
//! level. The root always lives at [`ROOT_PAGE_NUM`]; a split of the root
//! leaf rewrites page 0 in place as a fresh internal node rather than
//! moving it elsewhere.

use log::{debug, trace};

use crate::cursor::Cursor;
use crate::error::{Result, StorageError};
use crate::page::header::{self, NodeType};
use crate::page::{internal, leaf};
use crate::storage::Pager;
use crate::types::{Layout, ROOT_PAGE_NUM};

/// Locate the cursor position for `key`: the cell at or after which it
/// would sort, in the leaf that would hold it.
pub fn find(pager: &mut Pager, layout: &Layout, key: u32) -> Result<Cursor> {
    let mut page_num = ROOT_PAGE_NUM;
    loop {
        let page = pager.get_page(page_num)?;
        match header::node_type(page)? {
            NodeType::Leaf => return leaf_find(pager, layout, page_num, key),
            NodeType::Internal => {
                let idx = internal::find_child_index(page, key);
                page_num = internal::child_at(page, idx)?;
            }
        }
    }
}

fn leaf_find(pager: &mut Pager, layout: &Layout, page_num: u32, key: u32) -> Result<Cursor> {
    let page = pager.get_page(page_num)?;
    let num_cells = leaf::num_cells(page);

    let mut lo = 0u32;
    let mut hi = num_cells;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if leaf::key(page, layout, mid) >= key {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok(Cursor {
        page_num,
        cell_num: lo,
        end_of_table: lo >= num_cells,
    })
}

/// Position a cursor at the first cell of the leftmost leaf.
pub fn start(pager: &mut Pager) -> Result<Cursor> {
    let mut page_num = ROOT_PAGE_NUM;
    loop {
        let page = pager.get_page(page_num)?;
        match header::node_type(page)? {
            NodeType::Leaf => {
                let num_cells = leaf::num_cells(page);
                return Ok(Cursor {
                    page_num,
                    cell_num: 0,
                    end_of_table: num_cells == 0,
                });
            }
            NodeType::Internal => {
                page_num = internal::child_at(page, 0)?;
            }
        }
    }
}

/// Move the cursor to the next cell, following the leaf sibling chain
/// when the current leaf is exhausted.
pub fn advance(pager: &mut Pager, cursor: &mut Cursor) -> Result<()> {
    let page = pager.get_page(cursor.page_num)?;
    let num_cells = leaf::num_cells(page);
    cursor.cell_num += 1;

    if cursor.cell_num >= num_cells {
        let next = leaf::next_leaf(page);
        if next == 0 {
            cursor.end_of_table = true;
        } else {
            cursor.page_num = next;
            cursor.cell_num = 0;
        }
    }

    Ok(())
}

/// Borrow the payload the cursor currently points at.
pub fn value<'a>(pager: &'a mut Pager, layout: &Layout, cursor: &Cursor) -> Result<&'a [u8]> {
    let page = pager.get_page(cursor.page_num)?;
    Ok(leaf::value(page, layout, cursor.cell_num))
}

/// Insert `key`/`payload` into the tree, rejecting duplicates.
pub fn insert(pager: &mut Pager, layout: &Layout, key: u32, payload: &[u8]) -> Result<()> {
    if payload.len() != layout.payload_size {
        return Err(StorageError::PayloadSizeMismatch {
            expected: layout.payload_size,
            actual: payload.len(),
        });
    }

    let cursor = find(pager, layout, key)?;

    let page = pager.get_page(cursor.page_num)?;
    let num_cells = leaf::num_cells(page);
    if cursor.cell_num < num_cells && leaf::key(page, layout, cursor.cell_num) == key {
        return Err(StorageError::DuplicateKey);
    }

    leaf_insert(pager, layout, &cursor, key, payload)
}

fn leaf_insert(
    pager: &mut Pager,
    layout: &Layout,
    cursor: &Cursor,
    key: u32,
    payload: &[u8],
) -> Result<()> {
    let page_num = cursor.page_num;
    let page = pager.get_page(page_num)?;
    let num_cells = leaf::num_cells(page);

    if num_cells as usize >= layout.leaf_max_cells {
        return leaf_split_and_insert(pager, layout, cursor, key, payload);
    }

    let old_max = (num_cells > 0).then(|| leaf::max_key(page, layout));
    let is_root = header::is_root(page);
    let parent_page_num = header::parent(page);

    let page = pager.get_page_mut(page_num)?;
    if cursor.cell_num < num_cells {
        leaf::shift_cells_right(page, layout, cursor.cell_num, num_cells);
    }
    leaf::set_num_cells(page, num_cells + 1);
    leaf::set_cell(page, layout, cursor.cell_num, key, payload);

    if !is_root && cursor.cell_num == num_cells {
        if let Some(old_max) = old_max {
            update_internal_node_key(pager, parent_page_num, old_max, key)?;
        }
    }

    Ok(())
}

/// Split a full leaf in two, insert the new cell into whichever half it
/// belongs in, and wire the new leaf into the tree (root promotion, or
/// a new separator in the parent).
fn leaf_split_and_insert(
    pager: &mut Pager,
    layout: &Layout,
    cursor: &Cursor,
    key: u32,
    payload: &[u8],
) -> Result<()> {
    let old_page_num = cursor.page_num;
    let new_page_num = pager.num_pages();

    let old_snapshot = pager.get_page(old_page_num)?.to_vec();
    let old_is_root = header::is_root(&old_snapshot);
    let old_parent = header::parent(&old_snapshot);
    let old_pre_split_max = leaf::max_key(&old_snapshot, layout);
    let old_next_leaf = leaf::next_leaf(&old_snapshot);

    {
        let new_page = pager.get_page_mut(new_page_num)?;
        leaf::initialize(new_page);
        header::set_parent(new_page, old_parent);
        leaf::set_next_leaf(new_page, old_next_leaf);
    }

    let total = layout.leaf_max_cells as u32 + 1;
    let left_count = layout.leaf_left_split_count as u32;

    for i in (0..total).rev() {
        let goes_right = i >= left_count;
        let dest_page_num = if goes_right { new_page_num } else { old_page_num };
        let dest_index = if goes_right { i - left_count } else { i };

        let dest = pager.get_page_mut(dest_page_num)?;
        match i.cmp(&cursor.cell_num) {
            std::cmp::Ordering::Equal => leaf::set_cell(dest, layout, dest_index, key, payload),
            std::cmp::Ordering::Greater => {
                leaf::copy_cell(dest, &old_snapshot, layout, dest_index, i - 1)
            }
            std::cmp::Ordering::Less => {
                leaf::copy_cell(dest, &old_snapshot, layout, dest_index, i)
            }
        }
    }

    leaf::set_num_cells(pager.get_page_mut(old_page_num)?, layout.leaf_left_split_count as u32);
    leaf::set_num_cells(
        pager.get_page_mut(new_page_num)?,
        layout.leaf_right_split_count as u32,
    );
    leaf::set_next_leaf(pager.get_page_mut(old_page_num)?, new_page_num);

    debug!("split leaf {old_page_num} -> {old_page_num}, {new_page_num}");

    if old_is_root {
        create_new_root(pager, layout, new_page_num)
    } else {
        internal_insert(
            pager,
            layout,
            old_parent,
            old_page_num,
            old_pre_split_max,
            new_page_num,
        )
    }
}

/// Rewrite the (always page 0) root in place as a fresh internal node
/// with two children: the old root's contents, relocated to a new page,
/// and the page produced by the split that triggered this promotion.
fn create_new_root(pager: &mut Pager, layout: &Layout, right_child_page_num: u32) -> Result<()> {
    let left_child_page_num = pager.num_pages();

    let root_snapshot = pager.get_page(ROOT_PAGE_NUM)?.to_vec();

    let left_child = pager.get_page_mut(left_child_page_num)?;
    left_child.copy_from_slice(&root_snapshot);
    header::set_is_root(left_child, false);

    let left_max = leaf::max_key(&root_snapshot, layout);

    let root = pager.get_page_mut(ROOT_PAGE_NUM)?;
    internal::initialize(root);
    header::set_is_root(root, true);
    internal::set_num_keys(root, 1);
    internal::set_child(root, 0, left_child_page_num);
    internal::set_key(root, 0, left_max);
    internal::set_right_child(root, right_child_page_num);

    header::set_parent(pager.get_page_mut(left_child_page_num)?, ROOT_PAGE_NUM);
    header::set_parent(pager.get_page_mut(right_child_page_num)?, ROOT_PAGE_NUM);

    debug!("promoted root: left child {left_child_page_num}, right child {right_child_page_num}");

    Ok(())
}

/// After a non-root leaf splits, wire the new leaf into its parent:
/// the old leaf's separator key shrinks to its new (post-split) max, and
/// a new separator/child pair for the new leaf is inserted right after it.
fn internal_insert(
    pager: &mut Pager,
    layout: &Layout,
    parent_page_num: u32,
    old_child_page_num: u32,
    old_child_max_key_before_split: u32,
    new_child_page_num: u32,
) -> Result<()> {
    let parent = pager.get_page(parent_page_num)?;
    let num_keys = internal::num_keys(parent);
    if num_keys as usize >= crate::types::INTERNAL_MAX_CELLS {
        return Err(StorageError::InternalSplitUnsupported);
    }
    let right_child = internal::right_child(parent);

    let updated_old_child_max_key = leaf::max_key(pager.get_page(old_child_page_num)?, layout);
    let new_child_max_key = leaf::max_key(pager.get_page(new_child_page_num)?, layout);

    if right_child == old_child_page_num {
        let parent = pager.get_page_mut(parent_page_num)?;
        let n = internal::num_keys(parent);
        internal::set_child(parent, n, old_child_page_num);
        internal::set_key(parent, n, updated_old_child_max_key);
        internal::set_num_keys(parent, n + 1);
        internal::set_right_child(parent, new_child_page_num);
    } else {
        let idx = internal::find_child_index(
            pager.get_page(parent_page_num)?,
            old_child_max_key_before_split,
        );
        let parent = pager.get_page_mut(parent_page_num)?;
        let n = internal::num_keys(parent);
        internal::shift_cells_right(parent, idx + 1, n);
        internal::set_num_keys(parent, n + 1);
        internal::set_key(parent, idx, updated_old_child_max_key);
        internal::set_child(parent, idx + 1, new_child_page_num);
        internal::set_key(parent, idx + 1, new_child_max_key);
    }

    header::set_parent(pager.get_page_mut(new_child_page_num)?, parent_page_num);

    trace!("internal_insert: parent {parent_page_num} gained child {new_child_page_num}");

    Ok(())
}

/// Rewrite the separator key that currently reads `old_key` to `new_key`.
///
/// Called when an insert appends a new largest key to a non-root leaf,
/// which changes that leaf's contribution to its parent's separators.
/// If `old_key` belongs to the parent's rightmost child, there is no
/// separator cell to rewrite — the rightmost child has no stored key,
/// so this is a no-op rather than an out-of-bounds write.
fn update_internal_node_key(
    pager: &mut Pager,
    parent_page_num: u32,
    old_key: u32,
    new_key: u32,
) -> Result<()> {
    let parent = pager.get_page(parent_page_num)?;
    let idx = internal::find_child_index(parent, old_key);
    let num_keys = internal::num_keys(parent);

    if idx < num_keys {
        let parent = pager.get_page_mut(parent_page_num)?;
        internal::set_key(parent, idx, new_key);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(id: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        buf[0..4].copy_from_slice(&id.to_le_bytes());
        buf
    }

    fn new_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = Pager::open(&path, false).unwrap();
        let root = pager.get_page_mut(ROOT_PAGE_NUM).unwrap();
        leaf::initialize(root);
        header::set_is_root(root, true);
        (dir, pager)
    }

    #[test]
    fn inserts_and_finds_in_sorted_order() {
        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);

        for id in [5u32, 1, 3, 2, 4] {
            insert(&mut pager, &layout, id, &payload(id)).unwrap();
        }

        let mut cursor = start(&mut pager).unwrap();
        let mut seen = Vec::new();
        loop {
            let v = value(&mut pager, &layout, &cursor).unwrap().to_vec();
            seen.push(u32::from_le_bytes(v[0..4].try_into().unwrap()));
            if cursor.end_of_table {
                break;
            }
            advance(&mut pager, &mut cursor).unwrap();
        }

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);
        insert(&mut pager, &layout, 1, &payload(1)).unwrap();
        let err = insert(&mut pager, &layout, 1, &payload(1)).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey));
    }

    #[test]
    fn splits_the_root_leaf_once_it_overflows() {
        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);

        for id in 1..=(layout.leaf_max_cells as u32 + 1) {
            insert(&mut pager, &layout, id, &payload(id)).unwrap();
        }

        let root = pager.get_page(ROOT_PAGE_NUM).unwrap();
        assert_eq!(header::node_type(root).unwrap(), NodeType::Internal);
        assert!(header::is_root(root));

        let mut cursor = start(&mut pager).unwrap();
        let mut seen = Vec::new();
        loop {
            let v = value(&mut pager, &layout, &cursor).unwrap().to_vec();
            seen.push(u32::from_le_bytes(v[0..4].try_into().unwrap()));
            if cursor.end_of_table {
                break;
            }
            advance(&mut pager, &mut cursor).unwrap();
        }
        let expected: Vec<u32> = (1..=(layout.leaf_max_cells as u32 + 1)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn rejects_inserts_once_the_root_interior_node_is_full() {
        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);

        // Insert enough strictly increasing keys to force repeated
        // right-edge leaf splits until the root's interior cell capacity
        // is exhausted.
        let mut id = 1u32;
        let result = loop {
            match insert(&mut pager, &layout, id, &payload(id)) {
                Ok(()) => id += 1,
                Err(e) => break e,
            }
            if id > 10_000 {
                panic!("expected InternalSplitUnsupported before {id} inserts");
            }
        };

        assert!(matches!(result, StorageError::InternalSplitUnsupported));
    }

    #[test]
    fn payload_size_mismatch_is_rejected() {
        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);
        let err = insert(&mut pager, &layout, 1, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, StorageError::PayloadSizeMismatch { .. }));
    }

    #[test]
    fn scan_order_does_not_depend_on_insert_order() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let (_dir, mut pager) = new_pager();
        let layout = Layout::new(8);

        let mut ids: Vec<u32> = (1..=(layout.leaf_max_cells as u32 * 2)).collect();
        ids.shuffle(&mut StdRng::seed_from_u64(42));

        for &id in &ids {
            insert(&mut pager, &layout, id, &payload(id)).unwrap();
        }

        let mut cursor = start(&mut pager).unwrap();
        let mut seen = Vec::new();
        loop {
            let v = value(&mut pager, &layout, &cursor).unwrap().to_vec();
            seen.push(u32::from_le_bytes(v[0..4].try_into().unwrap()));
            if cursor.end_of_table {
                break;
            }
            advance(&mut pager, &mut cursor).unwrap();
        }

        let mut expected = ids;
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
