//! Greedy garbage collector (§4.4): picks the block with the most Invalid
//! pages, migrates its Valid pages elsewhere, and erases it.

use tracing::info;

use crate::ftl::Ftl;
use crate::nand::PageState;
use crate::{FtlError, TOTAL_BLOCKS, TOTAL_LOGICAL_PAGES};

/// Outcome of one reclamation attempt against a single block.
enum Reclaimed {
    /// Every valid page was migrated and the block was erased.
    Completed { migrated: usize },
    /// Allocation ran out mid-block; some pages migrated, block left as-is.
    Aborted { migrated: usize },
}

/// Run one GC pass against `ftl`. Invoked either by the allocator on
/// exhaustion or directly via the force-GC host entry point.
pub fn collect(ftl: &mut Ftl) -> Result<(), FtlError> {
    let victim = select_victim(ftl)?;
    info!(
        victim,
        invalid = ftl.nand().count_invalid_in_block(victim),
        "garbage collection selected victim block"
    );

    match reclaim_block(ftl, victim)? {
        Reclaimed::Completed { migrated } => {
            info!(victim, migrated, "garbage collection pass erased victim block");
            ftl.bump_gc_count();
        }
        Reclaimed::Aborted { migrated } => {
            info!(
                victim,
                migrated,
                "garbage collection pass aborted mid-block: allocator exhausted"
            );
        }
    }
    Ok(())
}

/// Greedy victim selection: maximum `invalid_page_count` strictly greater
/// than zero; ties broken by lowest block index (first encountered).
fn select_victim(ftl: &Ftl) -> Result<u32, FtlError> {
    let mut best: Option<(u32, u32)> = None; // (block_idx, invalid_count)
    for block_idx in 0..TOTAL_BLOCKS {
        let invalid = ftl.nand().count_invalid_in_block(block_idx);
        if invalid == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if invalid <= best_count => {}
            _ => best = Some((block_idx, invalid)),
        }
    }
    best.map(|(idx, _)| idx).ok_or(FtlError::NoVictim)
}

/// Migrate every Valid page out of `block_idx`, then erase it. If
/// allocation fails mid-reclamation, the pass aborts with the block left
/// partially migrated but map-consistent for everything already moved.
fn reclaim_block(ftl: &mut Ftl, block_idx: u32) -> Result<Reclaimed, FtlError> {
    let pages_per_block = crate::PAGES_PER_BLOCK;
    let mut migrated = 0usize;

    for page_offset in 0..pages_per_block {
        let pba = block_idx * pages_per_block + page_offset;
        if ftl.nand().get_state(pba) != Some(PageState::Valid) {
            continue;
        }

        let lba = ftl.nand().blocks[block_idx as usize].pages[page_offset as usize]
            .oob
            .lba;
        if lba >= TOTAL_LOGICAL_PAGES {
            // Defensive: a corrupt OOB back-pointer must not strand GC.
            continue;
        }

        let payload = ftl.nand().read_page(pba)?;

        let new_pba = match ftl.allocate() {
            Ok(p) => p,
            Err(FtlError::NoFreePage) => {
                // Partial progress preserved; do not erase the block.
                return Ok(Reclaimed::Aborted { migrated });
            }
            Err(e) => return Err(e),
        };

        ftl.nand_mut()
            .program_page(new_pba, &payload, lba)
            .map_err(|_| FtlError::ProgramFailed(new_pba))?;
        ftl.l2p_mut()[lba as usize] = new_pba;
        ftl.nand_mut().set_state(pba, PageState::Invalid);
        migrated += 1;
    }

    ftl.nand_mut().erase_block(block_idx)?;
    Ok(Reclaimed::Completed { migrated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAGE_SIZE;

    fn payload(byte: u8) -> Vec<u8> {
        vec![byte; PAGE_SIZE]
    }

    #[test]
    fn no_victim_when_nothing_invalid() {
        let mut ftl = Ftl::fresh();
        assert!(matches!(ftl.run_gc(), Err(FtlError::NoVictim)));
    }

    #[test]
    fn reclaims_invalidated_pages_and_preserves_data() {
        let mut ftl = Ftl::fresh();
        for round in 0..10u8 {
            for lba in 0..TOTAL_LOGICAL_PAGES {
                ftl.write(lba, &payload(round)).unwrap();
            }
        }
        for lba in 0..TOTAL_LOGICAL_PAGES {
            assert_eq!(ftl.read(lba).unwrap(), payload(9));
        }
        let before_free = ftl.nand().count_free_pages();
        ftl.run_gc().unwrap();
        assert!(ftl.nand().count_free_pages() >= before_free);
        for lba in 0..TOTAL_LOGICAL_PAGES {
            assert_eq!(ftl.read(lba).unwrap(), payload(9));
        }
    }

    #[test]
    fn forced_gc_with_reclamation_across_many_writes() {
        let mut ftl = Ftl::fresh();
        for lba in 0..TOTAL_LOGICAL_PAGES {
            ftl.write(lba, &payload(lba as u8)).unwrap();
        }
        for _ in 0..10 {
            for lba in 0..TOTAL_LOGICAL_PAGES {
                ftl.write(lba, &payload((lba + 1) as u8)).unwrap();
            }
        }
        // 1100 host writes never exhaust a 12 800-page device on their own;
        // force the pass explicitly rather than relying on allocation to
        // trip it (see tests/scenarios.rs for the allocator-driven path).
        ftl.run_gc().unwrap();
        for lba in 0..TOTAL_LOGICAL_PAGES {
            assert_eq!(ftl.read(lba).unwrap(), payload((lba + 1) as u8));
        }
        assert!(ftl.stats().total_gc_count >= 1);
        assert!(ftl.nand().blocks.iter().any(|b| b.erase_count >= 1));
    }
}
