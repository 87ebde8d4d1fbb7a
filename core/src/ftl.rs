//! Flash translation layer: logical block address → physical page/sector,
//! write-buffered so a full usable page is only ever programmed once all
//! four of its sectors are known. Shaped after the block manager's own
//! synchronous, no-background-thread style.

use std::collections::HashMap;

use crate::block_manager::BlockManager;
use crate::codec;
use crate::command::NandChip;
use crate::config::CodecConfig;
use crate::geometry::{PhysAddr, SECTOR_BYTES, SECTORS_PER_PAGE};

/// Logical block address. Caller-defined numbering; the FTL only ever uses
/// it as an opaque map key.
pub type Lba = u64;

/// A page currently being assembled: which (chip, block, page) it will land
/// on, the sectors written into it so far, and which LBA maps to which
/// sector slot.
struct WriteCursor {
    chip: u8,
    block: u16,
    page: u8,
    sector: u8,
    buffer: Vec<u8>,
    lbas: Vec<Option<Lba>>,
}

impl WriteCursor {
    fn new(chip: u8, block: u16, page: u8) -> Self {
        Self {
            chip,
            block,
            page,
            sector: 0,
            buffer: vec![0u8; crate::geometry::PAGE_USABLE_BYTES],
            lbas: vec![None; SECTORS_PER_PAGE as usize],
        }
    }
}

/// Translates logical reads/writes into physical block-manager operations,
/// buffering partial pages until a full page's worth of sectors has
/// accumulated.
pub struct Ftl<N: NandChip> {
    block_manager: BlockManager<N>,
    codec_cfg: CodecConfig,
    l2p: HashMap<Lba, u32>,
    cursor: Option<WriteCursor>,
}

/// Errors the FTL cannot absorb itself. An uncorrectable codec error is
/// *not* one of these — it is locally recoverable into a `None` read
/// result, not a propagated error (see [`Ftl::read_logical`]).
#[derive(Debug)]
pub enum FtlError<E> {
    BlockManager(crate::block_manager::AllocError<E>),
    Command(E),
}

impl<E: core::fmt::Display> core::fmt::Display for FtlError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FtlError::BlockManager(e) => write!(f, "{e}"),
            FtlError::Command(e) => write!(f, "{e}"),
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for FtlError<E> {}

impl<N: NandChip> Ftl<N> {
    pub fn new(block_manager: BlockManager<N>, codec_cfg: CodecConfig) -> Self {
        Self { block_manager, codec_cfg, l2p: HashMap::new(), cursor: None }
    }

    pub fn into_block_manager(self) -> BlockManager<N> {
        self.block_manager
    }

    /// Read path: if the LBA is sitting in the open write cursor's buffer
    /// (not yet flushed to the NAND), serve it from there; otherwise
    /// resolve through the L2P map, read the physical page, and
    /// decode+slice out the addressed sector.
    ///
    /// `None` and "unmapped" are *not* the same thing: an LBA absent from
    /// L2P reads back as `Some` of the all-zero unmap sector, while `None`
    /// is reserved for a physical read that timed out or an uncorrectable
    /// codec error on a page that *is* mapped — the "mapped but corrupt"
    /// case the FTL absorbs rather than propagating as a hard error.
    pub fn read_logical(&mut self, lba: Lba) -> Result<Option<[u8; SECTOR_BYTES]>, FtlError<N::Error>> {
        if let Some(cursor) = &self.cursor {
            if let Some(slot) = cursor.lbas.iter().position(|l| *l == Some(lba)) {
                let start = slot * SECTOR_BYTES;
                let mut out = [0u8; SECTOR_BYTES];
                out.copy_from_slice(&cursor.buffer[start..start + SECTOR_BYTES]);
                log::trace!("FTL\tread_logical\tlba={lba}\tfrom=write_buffer");
                return Ok(Some(out));
            }
        }

        let Some(&packed) = self.l2p.get(&lba) else {
            log::trace!("FTL\tread_logical\tlba={lba}\tunmapped");
            return Ok(Some([0u8; SECTOR_BYTES]));
        };
        let addr = PhysAddr::decode(packed);
        let physical = self
            .block_manager
            .read(addr.chip, addr.block, addr.page)
            .map_err(FtlError::Command)?;
        let Some(codeword) = physical else {
            log::trace!("FTL\tread_logical\tlba={lba}\tphysical read timed out");
            return Ok(None);
        };
        let payload = match codec::decode(&codeword, &self.codec_cfg) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("FTL\tread_logical\tlba={lba}\tuncorrectable codec error: {e}");
                return Ok(None);
            }
        };
        let start = addr.sector as usize * SECTOR_BYTES;
        let mut out = [0u8; SECTOR_BYTES];
        out.copy_from_slice(&payload[start..start + SECTOR_BYTES]);
        log::trace!("FTL\tread_logical\tlba={lba}\tfrom=chip={}\tblock={}\tpage={}\tsector={}",
            addr.chip, addr.block, addr.page, addr.sector);
        Ok(Some(out))
    }

    /// Write path: accumulate the sector into the open write cursor
    /// (allocating a fresh block/page if none is open), update the L2P map
    /// immediately so a same-page read-after-write is visible before the
    /// page is ever flushed, and flush once all [`SECTORS_PER_PAGE`] slots
    /// are filled.
    pub fn write_logical(&mut self, lba: Lba, data: &[u8; SECTOR_BYTES]) -> Result<(), FtlError<N::Error>> {
        if self.cursor.is_none() {
            self.open_new_cursor()?;
        }

        let cursor = self.cursor.as_mut().expect("cursor opened above");
        let sector = cursor.sector as usize;
        let start = sector * SECTOR_BYTES;
        cursor.buffer[start..start + SECTOR_BYTES].copy_from_slice(data);
        cursor.lbas[sector] = Some(lba);

        let addr = PhysAddr::new(cursor.chip, cursor.block, cursor.page, cursor.sector)
            .expect("cursor fields are always in range");
        self.l2p.insert(lba, addr.encode());
        log::trace!("FTL\twrite_logical\tlba={lba}\tchip={}\tblock={}\tpage={}\tsector={}",
            cursor.chip, cursor.block, cursor.page, cursor.sector);

        cursor.sector += 1;
        if cursor.sector as u32 == SECTORS_PER_PAGE {
            self.flush_cursor()?;
        }
        Ok(())
    }

    /// Clears an LBA's mapping. Unmap is metadata-only: it never touches
    /// the NAND or the write buffer's physical layout, it just makes the
    /// LBA read back as unmapped.
    pub fn unmap(&mut self, lba: Lba) {
        self.l2p.remove(&lba);
        if let Some(cursor) = &mut self.cursor {
            if let Some(slot) = cursor.lbas.iter().position(|l| *l == Some(lba)) {
                cursor.lbas[slot] = None;
            }
        }
        log::trace!("FTL\tunmap\tlba={lba}");
    }

    fn open_new_cursor(&mut self) -> Result<(), FtlError<N::Error>> {
        let (chip, block) = self.block_manager.alloc().map_err(FtlError::BlockManager)?;
        self.cursor = Some(WriteCursor::new(chip, block, 0));
        Ok(())
    }

    fn flush_cursor(&mut self) -> Result<(), FtlError<N::Error>> {
        let cursor = self.cursor.take().expect("flush_cursor called with an open cursor");
        let codeword = codec::encode(&cursor.buffer, &self.codec_cfg);
        self.block_manager
            .program(cursor.chip, cursor.block, cursor.page, &codeword)
            .map_err(FtlError::Command)?;
        log::trace!("FTL\tflush_cursor\tchip={}\tblock={}\tpage={}", cursor.chip, cursor.block, cursor.page);

        let next_page = cursor.page + 1;
        if (next_page as u32) < crate::geometry::PAGES_PER_BLOCK {
            self.cursor = Some(WriteCursor::new(cursor.chip, cursor.block, next_page));
        } else {
            // Block is full; the next write_logical call allocates a fresh one.
            self.cursor = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockManagerConfig, EmulatorConfig};
    use crate::emulator::Emulator;

    fn ftl() -> Ftl<Emulator> {
        let emu = Emulator::new(&EmulatorConfig { base_dir: None, ram_cache: false, num_chip: 2 }).unwrap();
        let bm = BlockManager::init(emu, &BlockManagerConfig { num_chip_override: 2, persist_path: "/tmp/nonexistent-ftl-test.json".into() }).unwrap();
        Ftl::new(bm, CodecConfig::default())
    }

    #[test]
    fn read_before_write_is_zero_filled() {
        let mut f = ftl();
        assert_eq!(f.read_logical(42).unwrap().unwrap(), [0u8; SECTOR_BYTES]);
    }

    #[test]
    fn write_then_read_same_page_before_flush() {
        let mut f = ftl();
        let data = [0xABu8; SECTOR_BYTES];
        f.write_logical(7, &data).unwrap();
        let back = f.read_logical(7).unwrap().unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn write_full_page_flushes_and_reads_back() {
        let mut f = ftl();
        for i in 0..SECTORS_PER_PAGE as u64 {
            let data = [i as u8; SECTOR_BYTES];
            f.write_logical(100 + i, &data).unwrap();
        }
        for i in 0..SECTORS_PER_PAGE as u64 {
            let back = f.read_logical(100 + i).unwrap().unwrap();
            assert_eq!(back, [i as u8; SECTOR_BYTES]);
        }
    }

    #[test]
    fn unmap_makes_lba_read_as_zero_filled() {
        let mut f = ftl();
        let data = [0x11u8; SECTOR_BYTES];
        f.write_logical(3, &data).unwrap();
        f.unmap(3);
        assert_eq!(f.read_logical(3).unwrap().unwrap(), [0u8; SECTOR_BYTES]);
    }
}
