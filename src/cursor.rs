//! Cursor: a position within the tree, used for both scans and inserts.

/// Points at a single cell of a leaf node.
///
/// A `Cursor` is always positioned on a leaf: interior nodes are only ever
/// walked through, never stopped on. `end_of_table` is set once a scan has
/// advanced past the last cell of the last leaf in the sibling chain.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: u32,
    pub end_of_table: bool,
}
