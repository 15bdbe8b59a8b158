//! NAND device model: enforces page-program and block-erase hardware
//! semantics on an in-memory backing store.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, trace};

use crate::{FtlError, PAGES_PER_BLOCK, PAGE_SIZE, TOTAL_BLOCKS, TOTAL_PAGES, UNMAPPED};

/// A page's state within the program/erase lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageState {
    Free,
    Valid,
    Invalid,
}

/// Out-of-band metadata co-located with a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Oob {
    pub state: PageState,
    /// LBA bound to this page. Meaningful only while `state == Valid`.
    pub lba: u32,
    /// Program count since the page's block was last erased.
    pub write_count: u32,
    /// Wall-clock seconds at the time of the last program.
    pub timestamp: u64,
}

impl Oob {
    fn fresh() -> Self {
        Oob {
            state: PageState::Free,
            lba: UNMAPPED,
            write_count: 0,
            timestamp: 0,
        }
    }
}

/// A single NAND page: payload plus OOB record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<u8>,
    pub oob: Oob,
}

impl Page {
    fn fresh() -> Self {
        Page {
            data: vec![0xFFu8; PAGE_SIZE],
            oob: Oob::fresh(),
        }
    }
}

/// An erase block: an ordered array of pages plus erase bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub pages: Vec<Page>,
    pub erase_count: u32,
    pub invalid_page_count: u32,
}

impl Block {
    fn fresh() -> Self {
        Block {
            pages: (0..PAGES_PER_BLOCK).map(|_| Page::fresh()).collect(),
            erase_count: 0,
            invalid_page_count: 0,
        }
    }
}

/// The NAND device: an ordered array of blocks plus lifetime counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NandDevice {
    pub blocks: Vec<Block>,
    pub total_page_writes: u64,
    pub total_block_erases: u64,
}

fn split_pba(pba: u32) -> Option<(usize, usize)> {
    if pba >= TOTAL_PAGES {
        return None;
    }
    let block = (pba / PAGES_PER_BLOCK) as usize;
    let page = (pba % PAGES_PER_BLOCK) as usize;
    Some((block, page))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl NandDevice {
    /// A freshly erased device: every page Free.
    pub fn new() -> Self {
        NandDevice {
            blocks: (0..TOTAL_BLOCKS).map(|_| Block::fresh()).collect(),
            total_page_writes: 0,
            total_block_erases: 0,
        }
    }

    /// Program `payload` into `pba`, binding it to `lba` in the OOB record.
    ///
    /// Requires the target page be `Free`; this is the load-bearing
    /// no-overwrite check that forces the FTL to allocate-then-invalidate.
    pub fn program_page(&mut self, pba: u32, payload: &[u8], lba: u32) -> Result<(), FtlError> {
        let (b, p) = split_pba(pba).ok_or(FtlError::OutOfRange(pba))?;
        let page = &mut self.blocks[b].pages[p];
        if page.oob.state != PageState::Free {
            error!(pba, block = b, "overwrite refused: page not free");
            return Err(FtlError::OverwriteRefused(pba));
        }
        let len = payload.len().min(PAGE_SIZE);
        page.data[..len].copy_from_slice(&payload[..len]);
        for byte in &mut page.data[len..] {
            *byte = 0;
        }
        page.oob.state = PageState::Valid;
        page.oob.lba = lba;
        page.oob.write_count += 1;
        page.oob.timestamp = now_secs();
        self.total_page_writes += 1;
        trace!(pba, lba, "programmed page");
        Ok(())
    }

    /// Read the payload at `pba`. Requires `state == Valid`.
    pub fn read_page(&self, pba: u32) -> Result<Vec<u8>, FtlError> {
        let (b, p) = split_pba(pba).ok_or(FtlError::OutOfRange(pba))?;
        let page = &self.blocks[b].pages[p];
        if page.oob.state != PageState::Valid {
            return Err(FtlError::NotValid(pba));
        }
        Ok(page.data.clone())
    }

    /// Erase an entire block: every page becomes Free, payload is scrubbed
    /// to 0xFF, OOB is reset, and the erase counter advances.
    pub fn erase_block(&mut self, block_idx: u32) -> Result<(), FtlError> {
        if block_idx >= TOTAL_BLOCKS {
            return Err(FtlError::OutOfRange(block_idx));
        }
        let block = &mut self.blocks[block_idx as usize];
        for page in &mut block.pages {
            page.data.iter_mut().for_each(|b| *b = 0xFF);
            page.oob = Oob::fresh();
        }
        block.erase_count += 1;
        block.invalid_page_count = 0;
        self.total_block_erases += 1;
        trace!(block_idx, erase_count = block.erase_count, "erased block");
        Ok(())
    }

    /// Query the state of `pba`.
    pub fn get_state(&self, pba: u32) -> Option<PageState> {
        let (b, p) = split_pba(pba)?;
        Some(self.blocks[b].pages[p].oob.state)
    }

    /// Force the state of `pba`. The only sanctioned way to move a page
    /// `Valid -> Invalid` without reprogramming it. Keeps the owning
    /// block's `invalid_page_count` coherent. Silent no-op on an
    /// out-of-range PBA.
    pub fn set_state(&mut self, pba: u32, state: PageState) {
        let Some((b, p)) = split_pba(pba) else {
            return;
        };
        let block = &mut self.blocks[b];
        let page = &mut block.pages[p];
        let was_invalid = page.oob.state == PageState::Invalid;
        let becomes_invalid = state == PageState::Invalid;
        page.oob.state = state;
        if becomes_invalid && !was_invalid {
            block.invalid_page_count += 1;
        } else if was_invalid && !becomes_invalid {
            block.invalid_page_count -= 1;
        }
    }

    /// Total count of Free pages across the device.
    pub fn count_free_pages(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.pages.iter())
            .filter(|p| p.oob.state == PageState::Free)
            .count()
    }

    /// The cached invalid-page count for a block.
    pub fn count_invalid_in_block(&self, block_idx: u32) -> u32 {
        self.blocks
            .get(block_idx as usize)
            .map(|b| b.invalid_page_count)
            .unwrap_or(0)
    }

    /// The OOB back-pointer stored at `pba`, regardless of that page's
    /// current state (used by map-rebuild and invariant checks).
    pub fn lba_of(&self, pba: u32) -> Option<u32> {
        let (b, p) = split_pba(pba)?;
        Some(self.blocks[b].pages[p].oob.lba)
    }
}

impl Default for NandDevice {
    fn default() -> Self {
        Self::new()
    }
}
