//! Block manager: per-chip bad-block and allocated bitmaps, persisted
//! across reboots, with erase-fail-to-bad demotion on allocate.

use crate::command::NandChip;
use crate::config::BlockManagerConfig;
use crate::error::BlockManagerError;
use crate::geometry::{BLOCKS_PER_CHIP, PAGE_ALL_BYTES};
use crate::persist::PersistedState;

/// Number of `u64` words needed to cover [`BLOCKS_PER_CHIP`] bits (1024 / 64
/// = 16). Fixed-size: arbitrary precision is not required at this block
/// count.
pub const BITMAP_WORDS: usize = (BLOCKS_PER_CHIP as usize) / 64;

/// A fixed 1024-bit bitmap, one bit per block, bit 0 of word 0 = block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitmap1024 {
    pub words: [u64; BITMAP_WORDS],
}

impl Bitmap1024 {
    pub fn zero() -> Self {
        Self { words: [0; BITMAP_WORDS] }
    }

    pub fn get(&self, block: u16) -> bool {
        let block = block as usize;
        (self.words[block / 64] >> (block % 64)) & 1 != 0
    }

    pub fn set(&mut self, block: u16) {
        let block = block as usize;
        self.words[block / 64] |= 1 << (block % 64);
    }

    pub fn clear(&mut self, block: u16) {
        let block = block as usize;
        self.words[block / 64] &= !(1u64 << (block % 64));
    }

    /// `true` iff every bit set in `self` is also set in `other` (used to
    /// check `allocated ⊇ bad`).
    pub fn is_subset_of(&self, other: &Bitmap1024) -> bool {
        self.words.iter().zip(other.words.iter()).all(|(a, b)| a & !b == 0)
    }
}

/// Tracks bad-block and allocation bitmaps across every chip and sequences
/// erase-on-allocate through any [`NandChip`] — a [`crate::command::CommandLayer`]
/// driving a real bus, or [`crate::emulator::Emulator`] faking the same five
/// operations. The block manager never knows which.
pub struct BlockManager<N: NandChip> {
    chip: N,
    num_chip: u8,
    badblock_bitmaps: Vec<Bitmap1024>,
    allocated_bitmaps: Vec<Bitmap1024>,
    persist_path: String,
}

impl<N: NandChip> BlockManager<N> {
    /// Runs the full initialization protocol: try to load persisted state;
    /// on failure, auto-detect chip count, scan bad blocks, seed the
    /// allocated bitmap, and persist.
    pub fn init(chip: N, cfg: &BlockManagerConfig) -> Result<Self, InitError<N::Error>> {
        let mut mgr = Self {
            chip,
            num_chip: 0,
            badblock_bitmaps: Vec::new(),
            allocated_bitmaps: Vec::new(),
            persist_path: cfg.persist_path.clone(),
        };

        match PersistedState::load(&cfg.persist_path) {
            Ok(state) => {
                log::trace!("BLKMNG\tinit\tload\tpath={}", cfg.persist_path);
                mgr.num_chip = state.num_chip;
                mgr.badblock_bitmaps =
                    state.badblock_bitmaps.into_iter().map(|w| Bitmap1024 { words: w }).collect();
                mgr.allocated_bitmaps =
                    state.allocated_bitmaps.into_iter().map(|w| Bitmap1024 { words: w }).collect();
            }
            Err(e) => {
                log::trace!("BLKMNG\tinit\tload error={e}");
                mgr.initialize_fresh(cfg.num_chip_override)?;
                if let Err(e) = mgr.save() {
                    log::warn!("BLKMNG\tinit\tsave failed (non-fatal): {e}");
                }
            }
        }
        Ok(mgr)
    }

    fn initialize_fresh(&mut self, num_chip_override: u8) -> Result<(), InitError<N::Error>> {
        self.num_chip = if num_chip_override != 0 {
            num_chip_override
        } else {
            self.detect_chip_count().map_err(InitError::Command)?
        };
        if self.num_chip == 0 {
            return Err(InitError::BlockManager(BlockManagerError::NoActiveChip));
        }
        log::trace!("BLKMNG\tinit\tnum_chip={}", self.num_chip);

        self.badblock_bitmaps = Vec::with_capacity(self.num_chip as usize);
        for chip in 0..self.num_chip {
            let bitmap = self.scan_bad_blocks(chip)?;
            self.badblock_bitmaps.push(bitmap);
        }
        self.allocated_bitmaps = self.badblock_bitmaps.clone();
        Ok(())
    }

    fn detect_chip_count(&mut self) -> Result<u8, N::Error> {
        let mut count = 0u8;
        for chip in 0..crate::geometry::MAX_CHIPS {
            let id = self.chip.read_id(chip)?;
            let is_ok = id == crate::geometry::READ_ID_EXPECT;
            log::trace!("BLKMNG\tdetect_chip_count\tchip={chip}\tis_ok={is_ok}");
            if !is_ok {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn scan_bad_blocks(&mut self, chip: u8) -> Result<Bitmap1024, InitError<N::Error>> {
        let mut bitmap = Bitmap1024::zero();
        for block in 0..BLOCKS_PER_CHIP as u16 {
            let mut byte = [0xFFu8; 1];
            let ok = self.chip.read_page(chip, block, 0, 0, &mut byte).map_err(InitError::Command)?;
            if !ok {
                return Err(InitError::BlockManager(BlockManagerError::BadBlockCheckFailed {
                    chip,
                    block,
                }));
            }
            let is_bad = byte[0] != 0xFF;
            if is_bad {
                bitmap.set(block);
            }
            log::trace!("BLKMNG\tscan_bad_blocks\tchip={chip}\tblock={block}\tis_bad={is_bad}");
        }
        Ok(bitmap)
    }

    pub fn save(&self) -> std::io::Result<()> {
        let state = PersistedState::from_bitmaps(&self.badblock_bitmaps, &self.allocated_bitmaps);
        state.save(&self.persist_path)
    }

    pub fn num_chip(&self) -> u8 {
        self.num_chip
    }

    pub fn badblock_bitmap(&self, chip: u8) -> Bitmap1024 {
        self.badblock_bitmaps[chip as usize]
    }

    pub fn allocated_bitmap(&self, chip: u8) -> Bitmap1024 {
        self.allocated_bitmaps[chip as usize]
    }

    /// Linear scan of chips then blocks, erase-on-allocate with fail→bad
    /// demotion.
    pub fn alloc(&mut self) -> Result<(u8, u16), AllocError<N::Error>> {
        loop {
            let found = self.pick_free();
            let (chip, block) = match found {
                Some(cb) => cb,
                None => return Err(AllocError::BlockManager(BlockManagerError::NoFreeBlock)),
            };
            let erase_ok = self.chip.erase_block(chip, block).map_err(AllocError::Command)?;
            if erase_ok {
                self.mark_allocated(chip, block)?;
                if let Err(e) = self.save() {
                    log::warn!("BLKMNG\talloc\tsave failed (non-fatal): {e}");
                }
                log::trace!("BLKMNG\talloc\tchip={chip}\tblock={block}");
                return Ok((chip, block));
            } else {
                self.mark_bad(chip, block);
                if let Err(e) = self.save() {
                    log::warn!("BLKMNG\talloc\tsave failed (non-fatal): {e}");
                }
                log::trace!("BLKMNG\talloc\tchip={chip}\tblock={block}\terase failed, marked bad");
            }
        }
    }

    fn pick_free(&self) -> Option<(u8, u16)> {
        for chip in 0..self.num_chip {
            for block in 0..BLOCKS_PER_CHIP as u16 {
                let allocated = self.allocated_bitmaps[chip as usize].get(block);
                let bad = self.badblock_bitmaps[chip as usize].get(block);
                if !allocated && !bad {
                    return Some((chip, block));
                }
            }
        }
        None
    }

    fn mark_allocated(&mut self, chip: u8, block: u16) -> Result<(), AllocError<N::Error>> {
        if self.allocated_bitmaps[chip as usize].get(block) {
            return Err(AllocError::BlockManager(BlockManagerError::AlreadyAllocated { chip, block }));
        }
        self.allocated_bitmaps[chip as usize].set(block);
        Ok(())
    }

    fn mark_bad(&mut self, chip: u8, block: u16) {
        self.badblock_bitmaps[chip as usize].set(block);
        // Bad blocks stay allocated for life; alloc() never clears the
        // allocated bit on an erase failure.
        self.allocated_bitmaps[chip as usize].set(block);
    }

    /// Clears the allocated bit. Fatal if the block was not allocated or is
    /// marked bad (bad blocks stay allocated for life).
    pub fn free(&mut self, chip: u8, block: u16) -> Result<(), BlockManagerError> {
        if self.badblock_bitmaps[chip as usize].get(block) {
            return Err(BlockManagerError::FreeingBadBlock { chip, block });
        }
        if !self.allocated_bitmaps[chip as usize].get(block) {
            return Err(BlockManagerError::AlreadyFree { chip, block });
        }
        self.allocated_bitmaps[chip as usize].clear(block);
        log::trace!("BLKMNG\tfree\tchip={chip}\tblock={block}");
        if let Err(e) = self.save() {
            log::warn!("BLKMNG\tfree\tsave failed (non-fatal): {e}");
        }
        Ok(())
    }

    /// Passthrough to the command layer: reads the full physical page.
    pub fn read(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
    ) -> Result<Option<[u8; PAGE_ALL_BYTES]>, N::Error> {
        log::trace!("BLKMNG\tread\tchip={chip}\tblock={block}\tpage={page}");
        let mut buf = [0u8; PAGE_ALL_BYTES];
        let ok = self.chip.read_page(chip, block, page, 0, &mut buf)?;
        Ok(ok.then_some(buf))
    }

    /// Passthrough to the command layer: programs a full physical page.
    pub fn program(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
    ) -> Result<bool, N::Error> {
        log::trace!("BLKMNG\tprogram\tchip={chip}\tblock={block}\tpage={page}");
        self.chip.program_page(chip, block, page, data, 0)
    }
}

/// Fatal init failures: either the block-manager's own taxonomy, or a
/// command-layer fault surfaced unchanged.
#[derive(Debug)]
pub enum InitError<E> {
    BlockManager(BlockManagerError),
    Command(E),
}

impl<E: core::fmt::Display> core::fmt::Display for InitError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::BlockManager(e) => write!(f, "{e}"),
            InitError::Command(e) => write!(f, "{e}"),
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for InitError<E> {}

#[derive(Debug)]
pub enum AllocError<E> {
    BlockManager(BlockManagerError),
    Command(E),
}

impl<E: core::fmt::Display> core::fmt::Display for AllocError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::BlockManager(e) => write!(f, "{e}"),
            AllocError::Command(e) => write!(f, "{e}"),
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for AllocError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_set_clear_get() {
        let mut b = Bitmap1024::zero();
        assert!(!b.get(7));
        b.set(7);
        assert!(b.get(7));
        b.clear(7);
        assert!(!b.get(7));
    }

    #[test]
    fn bitmap_subset() {
        let mut bad = Bitmap1024::zero();
        bad.set(3);
        let mut alloc = Bitmap1024::zero();
        alloc.set(3);
        alloc.set(9);
        assert!(bad.is_subset_of(&alloc));
        alloc.clear(3);
        assert!(!bad.is_subset_of(&alloc));
    }
}
