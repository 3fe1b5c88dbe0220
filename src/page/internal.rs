//! Interior node codec.
//!
//! Layout, following the common 6-byte header (`super::header`):
//! ```text
//! Offset                      Size  Description
//! COMMON_HEADER_SIZE (6)      4     Number of separator keys
//! + 4  (10)                   4     Rightmost child's page number
//! + 4  (14)                   ...   Cells, packed back-to-back
//! ```
//! Cell `i` is `{ child_page_num: u32 LE, key: u32 LE }`: `child_page_num`
//! is the page of the subtree holding all keys <= `key`, and `key` is the
//! maximum key in that subtree. There is always one more child than there
//! are keys; the final child is `right_child`, not a cell.

use crate::error::{Result, StorageError};
use crate::types::Layout;

use super::header::{self, NodeType};

const NUM_KEYS_OFFSET: usize = Layout::COMMON_HEADER_SIZE;
const RIGHT_CHILD_OFFSET: usize = NUM_KEYS_OFFSET + 4;
pub const INTERNAL_HEADER_SIZE: usize = RIGHT_CHILD_OFFSET + 4;

const CELL_SIZE: usize = Layout::INTERNAL_CELL_SIZE;

pub fn initialize(page: &mut [u8]) {
    header::set_node_type(page, NodeType::Internal);
    header::set_is_root(page, false);
    set_num_keys(page, 0);
    set_right_child(page, 0);
}

pub fn num_keys(page: &[u8]) -> u32 {
    u32::from_le_bytes(page[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 4].try_into().unwrap())
}

pub fn set_num_keys(page: &mut [u8], n: u32) {
    page[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 4].copy_from_slice(&n.to_le_bytes());
}

pub fn right_child(page: &[u8]) -> u32 {
    u32::from_le_bytes(page[RIGHT_CHILD_OFFSET..RIGHT_CHILD_OFFSET + 4].try_into().unwrap())
}

pub fn set_right_child(page: &mut [u8], page_num: u32) {
    page[RIGHT_CHILD_OFFSET..RIGHT_CHILD_OFFSET + 4].copy_from_slice(&page_num.to_le_bytes());
}

fn cell_offset(cell_num: u32) -> usize {
    INTERNAL_HEADER_SIZE + cell_num as usize * CELL_SIZE
}

pub fn child(page: &[u8], cell_num: u32) -> u32 {
    let start = cell_offset(cell_num);
    u32::from_le_bytes(page[start..start + 4].try_into().unwrap())
}

pub fn set_child(page: &mut [u8], cell_num: u32, page_num: u32) {
    let start = cell_offset(cell_num);
    page[start..start + 4].copy_from_slice(&page_num.to_le_bytes());
}

pub fn key(page: &[u8], cell_num: u32) -> u32 {
    let start = cell_offset(cell_num) + 4;
    u32::from_le_bytes(page[start..start + 4].try_into().unwrap())
}

pub fn set_key(page: &mut [u8], cell_num: u32, key: u32) {
    let start = cell_offset(cell_num) + 4;
    page[start..start + 4].copy_from_slice(&key.to_le_bytes());
}

/// Child page at logical index `i`, where `i == num_keys` means the
/// rightmost child.
pub fn child_at(page: &[u8], i: u32) -> Result<u32> {
    let n = num_keys(page);
    if i < n {
        Ok(child(page, i))
    } else if i == n {
        Ok(right_child(page))
    } else {
        Err(StorageError::InvalidPage(format!(
            "internal node child index {i} out of range (num_keys={n})"
        )))
    }
}

/// The largest key reachable from this subtree: the key of the rightmost
/// child, found by following right children down to a leaf.
pub fn max_key(page: &[u8]) -> u32 {
    let n = num_keys(page);
    key(page, n - 1)
}

/// Shift cells `[from, num_keys)` right by one cell, to make room for an
/// insert at `from`. Caller must bump `num_keys` separately.
pub fn shift_cells_right(page: &mut [u8], from: u32, num_keys: u32) {
    let mut i = num_keys;
    while i > from {
        let c = child(page, i - 1);
        let k = key(page, i - 1);
        set_child(page, i, c);
        set_key(page, i, k);
        i -= 1;
    }
}

/// Find the index of the first cell whose key is >= `search_key`
/// (i.e. the child that should hold `search_key`), via binary search
/// over the sorted separator keys.
pub fn find_child_index(page: &[u8], search_key: u32) -> u32 {
    let mut lo = 0u32;
    let mut hi = num_keys(page);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if key(page, mid) >= search_key {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_at_covers_cells_and_right_child() {
        let mut page = vec![0u8; crate::types::PAGE_SIZE];
        initialize(&mut page);
        set_num_keys(&mut page, 2);
        set_child(&mut page, 0, 10);
        set_key(&mut page, 0, 5);
        set_child(&mut page, 1, 11);
        set_key(&mut page, 1, 9);
        set_right_child(&mut page, 12);

        assert_eq!(child_at(&page, 0).unwrap(), 10);
        assert_eq!(child_at(&page, 1).unwrap(), 11);
        assert_eq!(child_at(&page, 2).unwrap(), 12);
        assert!(child_at(&page, 3).is_err());
        assert_eq!(max_key(&page), 9);
    }

    #[test]
    fn find_child_index_binary_searches_separators() {
        let mut page = vec![0u8; crate::types::PAGE_SIZE];
        initialize(&mut page);
        set_num_keys(&mut page, 3);
        set_key(&mut page, 0, 5);
        set_key(&mut page, 1, 10);
        set_key(&mut page, 2, 15);

        assert_eq!(find_child_index(&page, 3), 0);
        assert_eq!(find_child_index(&page, 5), 0);
        assert_eq!(find_child_index(&page, 6), 1);
        assert_eq!(find_child_index(&page, 15), 2);
        assert_eq!(find_child_index(&page, 16), 3);
    }
}
