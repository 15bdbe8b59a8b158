//! The Flash Translation Layer: owns the NAND device, the logical-to-physical
//! map, the sequential allocator, and aggregate counters.

use tracing::{info, warn};

use crate::nand::{NandDevice, PageState};
use crate::{persist, FtlError, PAGE_SIZE, TOTAL_BLOCKS, TOTAL_LOGICAL_PAGES, TOTAL_PAGES, UNMAPPED};

/// Per-device statistics, suitable for printing from the host shell.
#[derive(Debug)]
pub struct FtlStats {
    pub total_host_writes: u64,
    pub total_page_writes: u64,
    pub total_block_erases: u64,
    pub total_gc_count: u64,
    pub free_pages: usize,
    pub waf: f64,
}

/// Owns a [`NandDevice`], the L2P table, and the allocation cursor.
pub struct Ftl {
    nand: NandDevice,
    l2p: Vec<u32>,
    next_free_page: u32,
    total_host_writes: u64,
    total_gc_count: u64,
}

impl Ftl {
    /// A fresh FTL over a fresh (all-Free) NAND device.
    pub fn fresh() -> Self {
        Ftl {
            nand: NandDevice::new(),
            l2p: vec![UNMAPPED; TOTAL_LOGICAL_PAGES as usize],
            next_free_page: 0,
            total_host_writes: 0,
            total_gc_count: 0,
        }
    }

    /// Load an FTL from a persisted image at `path`, or start fresh if the
    /// file is absent or unreadable. The L2P map is rebuilt from OOB
    /// back-pointers, never read from the image directly.
    pub fn load_or_fresh(path: &std::path::Path) -> Self {
        let nand = match persist::load_image(path) {
            Ok(Some(nand)) => nand,
            Ok(None) => {
                return Self::fresh();
            }
            Err(e) => {
                warn!(error = %e, "failed to load persisted image, starting fresh");
                NandDevice::new()
            }
        };
        let l2p = rebuild_l2p(&nand);
        Ftl {
            nand,
            l2p,
            next_free_page: 0,
            total_host_writes: 0,
            total_gc_count: 0,
        }
    }

    /// Persist the NAND device to `path`.
    pub fn shutdown(&self, path: &std::path::Path) -> Result<(), FtlError> {
        persist::save_image(path, &self.nand)
    }

    /// Host write path (§4.3).
    pub fn write(&mut self, lba: u32, payload: &[u8]) -> Result<(), FtlError> {
        if lba >= TOTAL_LOGICAL_PAGES {
            return Err(FtlError::OutOfRange(lba));
        }
        self.total_host_writes += 1;

        let old_pba = self.l2p[lba as usize];
        if old_pba != UNMAPPED {
            self.nand.set_state(old_pba, PageState::Invalid);
        }

        let pba = match self.allocate() {
            Ok(pba) => pba,
            Err(FtlError::NoFreePage) => {
                let _ = self.run_gc();
                match self.allocate() {
                    Ok(pba) => pba,
                    Err(_) => return Err(FtlError::DeviceFull),
                }
            }
            Err(e) => return Err(e),
        };

        self.nand
            .program_page(pba, payload, lba)
            .map_err(|_| FtlError::ProgramFailed(pba))?;

        self.l2p[lba as usize] = pba;
        Ok(())
    }

    /// Host read path (§4.3).
    pub fn read(&self, lba: u32) -> Result<Vec<u8>, FtlError> {
        if lba >= TOTAL_LOGICAL_PAGES {
            return Err(FtlError::OutOfRange(lba));
        }
        let pba = self.l2p[lba as usize];
        if pba == UNMAPPED {
            return Err(FtlError::NotMapped(lba));
        }
        self.nand.read_page(pba)
    }

    /// Cursor-hinted linear scan for the next Free page (§4.2).
    pub(crate) fn allocate(&mut self) -> Result<u32, FtlError> {
        for i in 0..TOTAL_PAGES {
            let candidate = (self.next_free_page + i) % TOTAL_PAGES;
            if self.nand.get_state(candidate) == Some(PageState::Free) {
                self.next_free_page = (candidate + 1) % TOTAL_PAGES;
                return Ok(candidate);
            }
        }
        Err(FtlError::NoFreePage)
    }

    /// Invoke the garbage collector directly (exposed for the force-GC host
    /// entry point as well as internal allocator-exhaustion recovery).
    pub fn run_gc(&mut self) -> Result<(), FtlError> {
        crate::gc::collect(self)
    }

    pub(crate) fn nand_mut(&mut self) -> &mut NandDevice {
        &mut self.nand
    }

    pub(crate) fn nand(&self) -> &NandDevice {
        &self.nand
    }

    pub(crate) fn l2p_mut(&mut self) -> &mut [u32] {
        &mut self.l2p
    }

    pub(crate) fn bump_gc_count(&mut self) {
        self.total_gc_count += 1;
        info!(total_gc_count = self.total_gc_count, "garbage collection pass complete");
    }

    /// Write amplification factor: `total_page_writes / total_host_writes`,
    /// or 1.0 when no host writes have occurred yet.
    pub fn waf(&self) -> f64 {
        if self.total_host_writes == 0 {
            1.0
        } else {
            self.nand.total_page_writes as f64 / self.total_host_writes as f64
        }
    }

    /// Snapshot of current statistics.
    pub fn stats(&self) -> FtlStats {
        FtlStats {
            total_host_writes: self.total_host_writes,
            total_page_writes: self.nand.total_page_writes,
            total_block_erases: self.nand.total_block_erases,
            total_gc_count: self.total_gc_count,
            free_pages: self.nand.count_free_pages(),
            waf: self.waf(),
        }
    }

    /// Every currently-bound `(lba, pba)` pair, in LBA order.
    pub fn l2p_table(&self) -> Vec<(u32, u32)> {
        self.l2p
            .iter()
            .enumerate()
            .filter(|(_, &pba)| pba != UNMAPPED)
            .map(|(lba, &pba)| (lba as u32, pba))
            .collect()
    }

    /// The cached invalid-page count for a block (invariant 3, §3).
    pub fn invalid_page_count(&self, block_idx: u32) -> u32 {
        self.nand.count_invalid_in_block(block_idx)
    }

    /// The erase count for a block (monotonic for the device's lifetime).
    pub fn block_erase_count(&self, block_idx: u32) -> u32 {
        self.nand.blocks[block_idx as usize].erase_count
    }

    pub fn total_blocks(&self) -> u32 {
        TOTAL_BLOCKS
    }

    pub fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    /// The state of `pba` (invariant checking / diagnostics).
    pub fn page_state(&self, pba: u32) -> Option<PageState> {
        self.nand.get_state(pba)
    }

    /// The OOB back-pointer stored at `pba` (invariant checking).
    pub fn page_lba(&self, pba: u32) -> Option<u32> {
        self.nand.lba_of(pba)
    }
}

/// Rebuild the L2P map by scanning every page for `Valid` state and an
/// in-range OOB back-pointer. A corrupt image (out-of-range `lba`) is
/// skipped rather than panicking.
fn rebuild_l2p(nand: &NandDevice) -> Vec<u32> {
    let mut l2p = vec![UNMAPPED; TOTAL_LOGICAL_PAGES as usize];
    for (block_idx, block) in nand.blocks.iter().enumerate() {
        for (page_idx, page) in block.pages.iter().enumerate() {
            if page.oob.state != PageState::Valid {
                continue;
            }
            let lba = page.oob.lba;
            if lba >= TOTAL_LOGICAL_PAGES {
                continue;
            }
            let pba = block_idx as u32 * crate::PAGES_PER_BLOCK + page_idx as u32;
            l2p[lba as usize] = pba;
        }
    }
    l2p
}
