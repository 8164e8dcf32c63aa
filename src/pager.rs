//! Page I/O (spec §6's Pager contract).
//!
//! Grounded on the teacher's file-seek idioms in `database.rs`/`btree.rs`
//! and on `erictune-diydb/src/pager.rs`'s `PageNum` alias and on-demand page
//! cache, generalized to support allocation and writes — both teachers only
//! ever read a file opened read-only.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::error::{BtreeError, Result};
use crate::header::FILE_HEADER_SIZE;

/// Page numbers are 1-based, matching how chidb numbers pages.
pub type PageNum = u32;

/// An in-memory copy of one on-disk page, along with the page number it was
/// read from. Mutated in place by the node codec, then handed back to
/// `Pager::write_page` to persist.
#[derive(Debug, Clone)]
pub struct MemPage {
    pub npage: PageNum,
    pub data: Vec<u8>,
}

/// Owns the file descriptor and the page cache for one open database file.
/// Concurrent access by a second `Pager` to the same file is undefined
/// (spec §5) — there is no locking here.
pub struct Pager {
    file: File,
    page_size: u16,
    n_pages: u32,
    cache: Vec<Option<Vec<u8>>>,
}

impl Pager {
    /// Opens (or creates) the database file. Does not interpret its
    /// contents; callers decide page size and initial layout afterward.
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Pager {
            file,
            page_size: crate::header::DEFAULT_PAGE_SIZE,
            n_pages: 0,
            cache: vec![None; Self::page_count(file_len, crate::header::DEFAULT_PAGE_SIZE)],
        })
    }

    fn page_count(file_len: u64, page_size: u16) -> usize {
        if page_size == 0 {
            0
        } else {
            (file_len / page_size as u64) as usize
        }
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }

    pub fn get_page_size(&self) -> u16 {
        self.page_size
    }

    /// Sets the page size the pager will use for all subsequent reads and
    /// writes, and re-derives how many pages the existing file holds.
    pub fn set_page_size(&mut self, page_size: u16) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        self.page_size = page_size;
        let n_pages = Self::page_count(file_len, page_size);
        self.cache = vec![None; n_pages];
        self.n_pages = n_pages as u32;
        Ok(())
    }

    /// Extends the file by one page and returns its 1-based page number.
    pub fn allocate_page(&mut self) -> Result<PageNum> {
        self.n_pages += 1;
        let npage = self.n_pages;
        self.cache
            .resize(npage as usize, Some(vec![0u8; self.page_size as usize]));
        let offset = (npage as u64 - 1) * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&vec![0u8; self.page_size as usize])?;
        debug!("allocated page {npage}");
        Ok(npage)
    }

    /// Reads `npage` into a fresh in-memory buffer, reading through to disk
    /// on first access and caching thereafter.
    pub fn read_page(&mut self, npage: PageNum) -> Result<MemPage> {
        if npage == 0 || npage > self.n_pages {
            return Err(BtreeError::BadPageNo { page: npage });
        }
        let idx = (npage - 1) as usize;
        if self.cache.len() <= idx {
            self.cache.resize(idx + 1, None);
        }
        if self.cache[idx].is_none() {
            let mut buf = vec![0u8; self.page_size as usize];
            let offset = idx as u64 * self.page_size as u64;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut buf)?;
            self.cache[idx] = Some(buf);
        }
        Ok(MemPage {
            npage,
            data: self.cache[idx].clone().expect("just populated"),
        })
    }

    /// Writes a page buffer back to disk and refreshes the cache entry.
    pub fn write_page(&mut self, page: &MemPage) -> Result<()> {
        let idx = (page.npage - 1) as usize;
        let offset = idx as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.data)?;
        if self.cache.len() <= idx {
            self.cache.resize(idx + 1, None);
        }
        self.cache[idx] = Some(page.data.clone());
        Ok(())
    }

    /// Releases an in-memory page. The single-owner model of spec §5 means
    /// there is no refcounting to do; this exists so call sites mirror the
    /// load/use/free discipline of the original C pager.
    pub fn release_mem_page(&mut self, _page: MemPage) -> Result<()> {
        Ok(())
    }

    /// Reads the raw 100-byte file header from page 1.
    pub fn read_header_bytes(&mut self) -> Result<[u8; FILE_HEADER_SIZE]> {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn is_empty_file(&self) -> Result<bool> {
        Ok(self.file.metadata()?.len() == 0)
    }
}
