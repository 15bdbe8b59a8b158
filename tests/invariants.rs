//! Property-based invariant checks (§8): map consistency, invalid-count
//! coherence, monotonicity, and the WAF lower bound, across randomized
//! sequences of host operations.

use proptest::prelude::*;

use ssd_ftl_sim::ftl::Ftl;
use ssd_ftl_sim::nand::PageState;
use ssd_ftl_sim::{PAGES_PER_BLOCK, PAGE_SIZE, TOTAL_LOGICAL_PAGES, TOTAL_PAGES, UNMAPPED};

#[derive(Debug, Clone)]
enum Op {
    Write { lba: u32, value: u32 },
    Read { lba: u32 },
    ForceGc,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..TOTAL_LOGICAL_PAGES, any::<u32>()).prop_map(|(lba, value)| Op::Write { lba, value }),
        2 => (0..TOTAL_LOGICAL_PAGES).prop_map(|lba| Op::Read { lba }),
        1 => Just(Op::ForceGc),
    ]
}

fn payload(value: u32) -> Vec<u8> {
    let mut buf = vec![0u8; PAGE_SIZE];
    buf[0..4].copy_from_slice(&value.to_le_bytes());
    buf
}

/// Check every invariant of §3 against the current device state.
fn assert_invariants(ftl: &Ftl) {
    // Invariant 1 & 2: L2P <-> OOB back-pointer agreement.
    for (lba, pba) in ftl.l2p_table() {
        assert_eq!(ftl.page_state(pba), Some(PageState::Valid));
        assert_eq!(ftl.page_lba(pba), Some(lba));
    }
    for pba in 0..TOTAL_PAGES {
        if ftl.page_state(pba) == Some(PageState::Valid) {
            let lba = ftl.page_lba(pba).unwrap();
            assert!(lba < TOTAL_LOGICAL_PAGES, "valid page with OOR lba");
            assert_eq!(
                ftl.l2p_table().iter().find(|(l, _)| *l == lba).map(|(_, p)| *p),
                Some(pba),
                "valid page not reachable from its own lba"
            );
        }
    }

    // Invariant 3: invalid_page_count matches the real tally per block.
    for block in 0..ftl.total_blocks() {
        let counted = (0..PAGES_PER_BLOCK)
            .filter(|&offset| ftl.page_state(block * PAGES_PER_BLOCK + offset) == Some(PageState::Invalid))
            .count() as u32;
        assert_eq!(ftl.invalid_page_count(block), counted);
    }

    // WAF lower bound.
    assert!(ftl.waf() >= 1.0);
    assert!(ftl.stats().total_page_writes >= ftl.stats().total_host_writes);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Monotonicity is cheap to check after every single operation; full
    /// map-consistency scanning (O(TOTAL_PAGES)) is checked once at the end
    /// of each randomly generated sequence, which still exercises it at
    /// many distinct, arbitrary device states across cases.
    #[test]
    fn invariants_hold_after_a_random_operation_sequence(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut ftl = Ftl::fresh();
        let mut prev_host_writes = 0u64;
        let mut prev_page_writes = 0u64;
        let mut prev_erases = 0u64;
        let mut prev_gc = 0u64;

        for op in ops {
            match op {
                Op::Write { lba, value } => {
                    let _ = ftl.write(lba, &payload(value));
                }
                Op::Read { lba } => {
                    let _ = ftl.read(lba);
                }
                Op::ForceGc => {
                    let _ = ftl.run_gc();
                }
            }

            let stats = ftl.stats();
            prop_assert!(stats.total_host_writes >= prev_host_writes);
            prop_assert!(stats.total_page_writes >= prev_page_writes);
            prop_assert!(stats.total_block_erases >= prev_erases);
            prop_assert!(stats.total_gc_count >= prev_gc);
            prev_host_writes = stats.total_host_writes;
            prev_page_writes = stats.total_page_writes;
            prev_erases = stats.total_block_erases;
            prev_gc = stats.total_gc_count;
        }

        assert_invariants(&ftl);
    }

    #[test]
    fn round_trip_holds_for_non_overlapping_writes(
        values in prop::collection::vec(any::<u32>(), TOTAL_LOGICAL_PAGES as usize)
    ) {
        let mut ftl = Ftl::fresh();
        for (lba, value) in values.iter().enumerate() {
            ftl.write(lba as u32, &payload(*value)).unwrap();
        }
        for (lba, value) in values.iter().enumerate() {
            let read_back = ftl.read(lba as u32).unwrap();
            let got = u32::from_le_bytes(read_back[0..4].try_into().unwrap());
            prop_assert_eq!(got, *value);
        }
    }
}

#[test]
fn unmapped_lba_sentinel_is_never_a_valid_pba() {
    assert!(UNMAPPED >= TOTAL_PAGES);
}
