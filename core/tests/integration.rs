//! End-to-end scenarios covering chip identification, alloc/erase/program/
//! read, erase-failure demotion, write-buffer flush boundaries and
//! allocator persistence, plus property tests that span more than one
//! module's own `#[cfg(test)]` block (block manager + command layer, or
//! block manager + persistence).

use proptest::prelude::*;

use tc58_core::block_manager::BlockManager;
use tc58_core::command::NandChip;
use tc58_core::config::{BlockManagerConfig, CodecConfig, EmulatorConfig};
use tc58_core::emulator::Emulator;
use tc58_core::ftl::Ftl;
use tc58_core::geometry::{PAGE_ALL_BYTES, PAGE_USABLE_BYTES, READ_ID_EXPECT, SECTOR_BYTES, SECTORS_PER_PAGE};
use tc58_core::persist::PersistedState;

fn emulator(num_chip: u8) -> Emulator {
    Emulator::new(&EmulatorConfig { base_dir: None, ram_cache: false, num_chip }).unwrap()
}

fn block_manager(num_chip: u8, persist_path: &str) -> BlockManager<Emulator> {
    BlockManager::init(
        emulator(num_chip),
        &BlockManagerConfig { num_chip_override: num_chip, persist_path: persist_path.to_string() },
    )
    .unwrap()
}

/// READ ID against the emulator with `num_chip=1`.
#[test]
fn read_id_matches_expected_for_each_chip() {
    let mut e = emulator(1);
    assert_eq!(e.read_id(0).unwrap(), READ_ID_EXPECT);
    assert_eq!(e.read_id(1).unwrap(), [0u8; 5]);
}

/// Codec identity round trip with the default scramble seed.
#[test]
fn codec_identity_round_trip_default_seed() {
    let cfg = CodecConfig::default();
    assert_eq!(cfg.scramble_seed, 0xA5);
    let payload: Vec<u8> = (0..PAGE_USABLE_BYTES).map(|i| ((2 * i) & 0xFF) as u8).collect();
    let encoded = tc58_core::codec::encode(&payload, &cfg);
    let decoded = tc58_core::codec::decode(&encoded, &cfg).unwrap();
    assert_eq!(decoded, payload);
}

/// Alloc / erase / program / read round trip.
#[test]
fn alloc_erase_program_read_round_trip() {
    let mut mgr = block_manager(1, "/tmp/tc58-test-scenario-c.json");
    let (chip, block) = mgr.alloc().unwrap();
    assert_eq!(chip, 0);

    let erased = mgr.read(chip, block, 0).unwrap().unwrap();
    assert_eq!(erased.len(), PAGE_ALL_BYTES);
    assert!(erased.iter().all(|&b| b == 0xFF));

    let data: Vec<u8> = (0..PAGE_ALL_BYTES).map(|i| (i & 0xFF) as u8).collect();
    assert!(mgr.program(chip, block, 0, &data).unwrap());

    let read_back = mgr.read(chip, block, 0).unwrap().unwrap();
    assert_eq!(&read_back[..], &data[..]);
}

/// A block whose erase fails is marked bad and never revisited;
/// `alloc` moves on to the next free block.
#[test]
fn erase_failure_demotes_block_and_alloc_skips_it() {
    let mut emu = emulator(1);
    emu.inject_erase_failure(0, 7);
    let mut mgr = BlockManager::init(
        emu,
        &BlockManagerConfig { num_chip_override: 1, persist_path: "/tmp/tc58-test-scenario-d.json".into() },
    )
    .unwrap();

    // Consume blocks 0..6 normally.
    for i in 0..7 {
        let (chip, block) = mgr.alloc().unwrap();
        assert_eq!((chip, block), (0, i));
    }

    // The 8th alloc attempt reaches block 7, whose erase fails once: it
    // must be marked bad and the scan must continue to block 8.
    let (chip, block) = mgr.alloc().unwrap();
    assert_eq!((chip, block), (0, 8));
    assert!(mgr.badblock_bitmap(0).get(7));
    assert!(mgr.allocated_bitmap(0).get(7));

    // Block 7 is never handed out again, even after freeing everything
    // allocated so far.
    for b in [0, 1, 2, 3, 4, 5, 6, 8] {
        mgr.free(0, b).unwrap();
    }
    for _ in 0..8 {
        let (_, b) = mgr.alloc().unwrap();
        assert_ne!(b, 7);
    }
}

/// Write buffer flush boundary — writes to LBAs 0..3 stay in
/// the buffer until the fourth sector fills the page, after which reads
/// hit the flushed physical page and still return the original bytes.
#[test]
fn write_buffer_flushes_at_page_boundary() {
    let mgr = block_manager(1, "/tmp/tc58-test-scenario-e.json");
    let mut ftl = Ftl::new(mgr, CodecConfig::default());

    let sectors: Vec<[u8; SECTOR_BYTES]> =
        (0..SECTORS_PER_PAGE as u64).map(|i| [i as u8; SECTOR_BYTES]).collect();

    for (i, sector) in sectors.iter().enumerate().take(3) {
        ftl.write_logical(i as u64, sector).unwrap();
        // Still inside the open write buffer: every previously-written
        // LBA in this page must still read back correctly.
        for (j, s) in sectors.iter().enumerate().take(i + 1) {
            assert_eq!(&ftl.read_logical(j as u64).unwrap().unwrap(), s);
        }
    }

    // Fourth sector triggers the flush.
    ftl.write_logical(3, &sectors[3]).unwrap();
    for (i, sector) in sectors.iter().enumerate() {
        assert_eq!(&ftl.read_logical(i as u64).unwrap().unwrap(), sector);
    }
}

/// Persisted allocator state survives a drop/reload cycle and
/// the reloaded manager never re-allocates blocks already handed out.
#[test]
fn persisted_allocator_state_survives_reload() {
    let path = "/tmp/tc58-test-scenario-f.json";
    let _ = std::fs::remove_file(path);

    let mut first_blocks = Vec::new();
    {
        let mut mgr = block_manager(2, path);
        for _ in 0..5 {
            first_blocks.push(mgr.alloc().unwrap());
        }
        // mgr dropped here: in-memory state goes away, persisted state
        // on disk does not.
    }

    let state = PersistedState::load(path).unwrap();
    assert_eq!(state.num_chip, 2);

    let emu = emulator(2);
    let reloaded = BlockManager::init(
        emu,
        &BlockManagerConfig { num_chip_override: 0, persist_path: path.to_string() },
    )
    .unwrap();
    assert_eq!(reloaded.num_chip(), 2);
    for (chip, block) in &first_blocks {
        assert!(reloaded.allocated_bitmap(*chip).get(*block));
    }
}

proptest! {
    /// At all times bad blocks are a subset of allocated blocks, for any
    /// sequence of allocations.
    #[test]
    fn allocator_bad_is_subset_of_allocated(num_allocs in 1usize..50) {
        let mut mgr = block_manager(1, "/tmp/tc58-test-prop-subset.json");
        for _ in 0..num_allocs {
            if mgr.alloc().is_err() {
                break;
            }
        }
        prop_assert!(mgr.badblock_bitmap(0).is_subset_of(&mgr.allocated_bitmap(0)));
    }

    /// Read-after-write holds across an arbitrary sequence of distinct
    /// LBAs, whether or not a flush happens in between.
    #[test]
    fn ftl_read_after_write(lbas in prop::collection::vec(0u64..1000, 1..20)) {
        let mgr = block_manager(1, "/tmp/tc58-test-prop-raw.json");
        let mut ftl = Ftl::new(mgr, CodecConfig::default());
        let mut expected = std::collections::HashMap::new();
        for (i, lba) in lbas.iter().enumerate() {
            let data = [(i as u8).wrapping_add(1); SECTOR_BYTES];
            ftl.write_logical(*lba, &data).unwrap();
            expected.insert(*lba, data);
        }
        for (lba, data) in &expected {
            prop_assert_eq!(&ftl.read_logical(*lba).unwrap().unwrap(), data);
        }
    }

    /// An LBA that was never written reads back as the all-zero unmap
    /// sector.
    #[test]
    fn unmapped_lba_reads_as_zero(lba in 0u64..1_000_000) {
        let mgr = block_manager(1, "/tmp/tc58-test-prop-unmap.json");
        let mut ftl = Ftl::new(mgr, CodecConfig::default());
        prop_assert_eq!(ftl.read_logical(lba).unwrap().unwrap(), [0u8; SECTOR_BYTES]);
    }
}
