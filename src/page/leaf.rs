//! Leaf node codec.
//!
//! Layout, following the common 6-byte header (`super::header`):
//! ```text
//! Offset                      Size  Description
//! COMMON_HEADER_SIZE (6)      4     Number of cells on this page
//! + 4  (10)                   4     Next leaf's page number (0 if none)
//! + 4  (14)                   ...   Cells, packed back-to-back in key order
//! ```
//! Each cell is `key: u32 LE` followed by `payload_size` opaque bytes.

use crate::types::Layout;

use super::header::{self, NodeType};

const NUM_CELLS_OFFSET: usize = Layout::COMMON_HEADER_SIZE;
const NEXT_LEAF_OFFSET: usize = NUM_CELLS_OFFSET + 4;
pub const LEAF_HEADER_SIZE: usize = NEXT_LEAF_OFFSET + 4;

/// Zero a page and write a fresh, empty leaf header into it.
pub fn initialize(page: &mut [u8]) {
    header::set_node_type(page, NodeType::Leaf);
    header::set_is_root(page, false);
    set_num_cells(page, 0);
    set_next_leaf(page, 0);
}

pub fn num_cells(page: &[u8]) -> u32 {
    u32::from_le_bytes(page[NUM_CELLS_OFFSET..NUM_CELLS_OFFSET + 4].try_into().unwrap())
}

pub fn set_num_cells(page: &mut [u8], n: u32) {
    page[NUM_CELLS_OFFSET..NUM_CELLS_OFFSET + 4].copy_from_slice(&n.to_le_bytes());
}

/// Page number of the next leaf in key order, or 0 if this is the last leaf.
pub fn next_leaf(page: &[u8]) -> u32 {
    u32::from_le_bytes(page[NEXT_LEAF_OFFSET..NEXT_LEAF_OFFSET + 4].try_into().unwrap())
}

pub fn set_next_leaf(page: &mut [u8], page_num: u32) {
    page[NEXT_LEAF_OFFSET..NEXT_LEAF_OFFSET + 4].copy_from_slice(&page_num.to_le_bytes());
}

fn cell_offset(layout: &Layout, cell_num: u32) -> usize {
    LEAF_HEADER_SIZE + cell_num as usize * layout.leaf_cell_size
}

/// Byte range of the whole cell (key + payload) at `cell_num`.
fn cell_range(layout: &Layout, cell_num: u32) -> std::ops::Range<usize> {
    let start = cell_offset(layout, cell_num);
    start..start + layout.leaf_cell_size
}

pub fn key(page: &[u8], layout: &Layout, cell_num: u32) -> u32 {
    let start = cell_offset(layout, cell_num);
    u32::from_le_bytes(page[start..start + 4].try_into().unwrap())
}

pub fn set_key(page: &mut [u8], layout: &Layout, cell_num: u32, key: u32) {
    let start = cell_offset(layout, cell_num);
    page[start..start + 4].copy_from_slice(&key.to_le_bytes());
}

pub fn value(page: &[u8], layout: &Layout, cell_num: u32) -> &[u8] {
    let start = cell_offset(layout, cell_num) + 4;
    &page[start..start + layout.payload_size]
}

pub fn value_mut<'a>(page: &'a mut [u8], layout: &Layout, cell_num: u32) -> &'a mut [u8] {
    let start = cell_offset(layout, cell_num) + 4;
    &mut page[start..start + layout.payload_size]
}

/// Write a whole cell (key + payload) at `cell_num`.
pub fn set_cell(page: &mut [u8], layout: &Layout, cell_num: u32, key_val: u32, payload: &[u8]) {
    debug_assert_eq!(payload.len(), layout.payload_size);
    set_key(page, layout, cell_num, key_val);
    value_mut(page, layout, cell_num).copy_from_slice(payload);
}

/// Copy one full cell from `src[src_cell]` into `dst[dst_cell]`.
pub fn copy_cell(
    dst: &mut [u8],
    src: &[u8],
    layout: &Layout,
    dst_cell: u32,
    src_cell: u32,
) {
    let src_range = cell_range(layout, src_cell);
    let mut buf = vec![0u8; layout.leaf_cell_size];
    buf.copy_from_slice(&src[src_range]);
    let dst_range = cell_range(layout, dst_cell);
    dst[dst_range].copy_from_slice(&buf);
}

/// Shift cells `[from, num_cells)` right by one cell's width, to make room
/// for an insert at `from`. Caller must bump `num_cells` separately.
pub fn shift_cells_right(page: &mut [u8], layout: &Layout, from: u32, num_cells: u32) {
    let snapshot = page.to_vec();
    let mut i = num_cells;
    while i > from {
        copy_cell(page, &snapshot, layout, i, i - 1);
        i -= 1;
    }
}

/// The largest key stored in this leaf (the last cell, since cells are
/// kept in sorted order).
pub fn max_key(page: &[u8], layout: &Layout) -> u32 {
    let n = num_cells(page);
    key(page, layout, n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_cells_roundtrip() {
        let layout = Layout::new(8);
        let mut page = vec![0u8; crate::types::PAGE_SIZE];
        initialize(&mut page);
        set_num_cells(&mut page, 2);
        set_cell(&mut page, &layout, 0, 10, b"aaaaaaaa");
        set_cell(&mut page, &layout, 1, 20, b"bbbbbbbb");

        assert_eq!(key(&page, &layout, 0), 10);
        assert_eq!(value(&page, &layout, 0), b"aaaaaaaa");
        assert_eq!(key(&page, &layout, 1), 20);
        assert_eq!(max_key(&page, &layout), 20);
    }

    #[test]
    fn shift_cells_right_preserves_order() {
        let layout = Layout::new(4);
        let mut page = vec![0u8; crate::types::PAGE_SIZE];
        initialize(&mut page);
        set_num_cells(&mut page, 2);
        set_cell(&mut page, &layout, 0, 1, b"AAAA");
        set_cell(&mut page, &layout, 1, 3, b"CCCC");

        shift_cells_right(&mut page, &layout, 1, 2);
        set_num_cells(&mut page, 3);
        set_cell(&mut page, &layout, 1, 2, b"BBBB");

        assert_eq!(key(&page, &layout, 0), 1);
        assert_eq!(key(&page, &layout, 1), 2);
        assert_eq!(key(&page, &layout, 2), 3);
        assert_eq!(value(&page, &layout, 2), b"CCCC");
    }
}
