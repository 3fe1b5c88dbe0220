//! Pager: a page-number-indexed cache over the backing file.
//!
//! Pages are loaded lazily from disk on first access and kept in memory
//! until explicitly flushed. There is no eviction and no free list: the
//! file only ever grows, and the next page number to allocate is simply
//! the current page count (`num_pages`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::{PAGE_SIZE, TABLE_MAX_PAGES};

pub struct Pager {
    file: File,
    num_pages: u32,
    pages: Vec<Option<Box<PageBuf>>>,
    sync_on_write: bool,
}

impl Pager {
    /// Open or create the backing file. The file's length must be an
    /// exact multiple of `PAGE_SIZE`; anything else means the file was
    /// truncated or written by something else.
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::CorruptFile(format!(
                "file length {file_length} is not a whole number of {PAGE_SIZE}-byte pages"
            )));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!("opened {} with {num_pages} existing pages", path.display());

        Ok(Self {
            file,
            num_pages,
            pages: (0..TABLE_MAX_PAGES).map(|_| None).collect(),
            sync_on_write,
        })
    }

    /// Number of pages currently known to exist, on disk or in memory.
    /// The next page allocated (by asking for `get_page_mut(num_pages())`)
    /// gets this number.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    fn ensure_loaded(&mut self, page_num: u32) -> Result<()> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(StorageError::PagerFull {
                page_num,
                max: TABLE_MAX_PAGES,
            });
        }

        if self.pages[page_num as usize].is_none() {
            let mut buf = Box::new(PageBuf::new());
            if page_num < self.num_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(buf.as_bytes_mut())?;
                trace!("loaded page {page_num} from disk");
            } else {
                trace!("allocated in-memory page {page_num}");
            }
            self.pages[page_num as usize] = Some(buf);
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        Ok(())
    }

    /// Borrow a page's bytes, loading it from disk first if needed.
    /// Asking for page `num_pages()` allocates a fresh zeroed page.
    pub fn get_page(&mut self, page_num: u32) -> Result<&[u8]> {
        self.ensure_loaded(page_num)?;
        Ok(self.pages[page_num as usize].as_ref().unwrap().as_bytes())
    }

    /// Mutably borrow a page's bytes, loading or allocating it first.
    pub fn get_page_mut(&mut self, page_num: u32) -> Result<&mut [u8]> {
        self.ensure_loaded(page_num)?;
        Ok(self.pages[page_num as usize]
            .as_mut()
            .unwrap()
            .as_bytes_mut())
    }

    /// Write one page's in-memory contents back to disk.
    pub fn flush(&mut self, page_num: u32) -> Result<()> {
        let page = self.pages[page_num as usize]
            .as_ref()
            .ok_or(StorageError::NullPage { page_num })?;

        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(page.as_bytes())?;
        if self.sync_on_write {
            self.file.sync_data()?;
        }
        debug!("flushed page {page_num}");
        Ok(())
    }

    /// Flush every loaded page and sync the file. Called once when the
    /// database is closed; this is the only durability guarantee this
    /// engine makes (no WAL, no per-write fsync unless `sync_on_write`).
    pub fn flush_all(&mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            if self.pages[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocates_pages_in_order_and_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path, false).unwrap();
            assert_eq!(pager.num_pages(), 0);

            let page = pager.get_page_mut(0).unwrap();
            page[0..5].copy_from_slice(b"hello");
            assert_eq!(pager.num_pages(), 1);

            pager.flush_all().unwrap();
        }

        {
            let mut pager = Pager::open(&path, false).unwrap();
            assert_eq!(pager.num_pages(), 1);
            let page = pager.get_page(0).unwrap();
            assert_eq!(&page[0..5], b"hello");
        }
    }

    #[test]
    fn rejects_page_numbers_beyond_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = Pager::open(&path, false).unwrap();
        assert!(pager.get_page_mut(TABLE_MAX_PAGES as u32).is_err());
    }

    #[test]
    fn rejects_file_whose_length_is_not_a_page_multiple() {
        use std::io::Write as _;
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0u8; 100])
            .unwrap();
        assert!(Pager::open(&path, false).is_err());
    }
}
