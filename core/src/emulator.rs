//! File-backed (or RAM-backed) flash emulator for host-side test runs:
//! same operations as the real driver but backed by a directory of
//! `cs{CC}_block{BBBB}_page{PP}.bin` files. Missing files read as all-0xFF,
//! erase writes an all-0xFF page-0 only, programs overwrite the addressed
//! file verbatim, and IDs are synthesized to pass validation for
//! `chip < num_chip`. [`EmulatorConfig::ram_cache`] lets tests avoid
//! touching the filesystem entirely.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::command::NandChip;
use crate::config::EmulatorConfig;
use crate::geometry::{BLOCKS_PER_CHIP, PAGE_ALL_BYTES, PAGES_PER_BLOCK, READ_ID_EXPECT};

#[derive(Debug)]
pub enum EmulatorError {
    Io(std::io::Error),
    InvalidChip(u8),
    InvalidBlock(u16),
    InvalidPage(u8),
}

impl fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorError::Io(e) => write!(f, "emulator I/O error: {e}"),
            EmulatorError::InvalidChip(c) => write!(f, "invalid chip index: {c}"),
            EmulatorError::InvalidBlock(b) => write!(f, "invalid block: {b}"),
            EmulatorError::InvalidPage(p) => write!(f, "invalid page: {p}"),
        }
    }
}

impl std::error::Error for EmulatorError {}

type PageKey = (u8, u16, u8);

/// The emulator's whole job is producing or consuming [`PAGE_ALL_BYTES`]
/// buffers for a `(chip, block, page)` triple; it never wiggles a pin.
pub struct Emulator {
    base_dir: Option<PathBuf>,
    ram_cache: bool,
    cache: HashMap<PageKey, Vec<u8>>,
    num_chip: u8,
    /// Test hook: blocks in this set fail their *next* `erase_block` call
    /// once, then are removed from the set. Not part of the emulator's
    /// external interface — set directly by tests.
    fail_erase_once: std::collections::HashSet<(u8, u16)>,
}

impl Emulator {
    pub fn new(cfg: &EmulatorConfig) -> Result<Self, EmulatorError> {
        let base_dir = match &cfg.base_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(EmulatorError::Io)?;
                Some(PathBuf::from(dir))
            }
            None => None,
        };
        Ok(Self {
            base_dir,
            ram_cache: cfg.ram_cache,
            cache: HashMap::new(),
            num_chip: cfg.num_chip,
            fail_erase_once: std::collections::HashSet::new(),
        })
    }

    /// Test hook: the next `erase_block(chip, block)` call returns `false`
    /// once, then behaves normally. Used to exercise erase-failure
    /// demotion without needing a second emulator implementation.
    pub fn inject_erase_failure(&mut self, chip: u8, block: u16) {
        self.fail_erase_once.insert((chip, block));
    }

    fn validate(&self, chip: u8, block: u16, page: u8) -> Result<(), EmulatorError> {
        if chip >= self.num_chip {
            return Err(EmulatorError::InvalidChip(chip));
        }
        if block as u32 >= BLOCKS_PER_CHIP {
            return Err(EmulatorError::InvalidBlock(block));
        }
        if page as u32 >= PAGES_PER_BLOCK {
            return Err(EmulatorError::InvalidPage(page));
        }
        Ok(())
    }

    fn path(&self, chip: u8, block: u16, page: u8) -> Option<PathBuf> {
        self.base_dir.as_ref().map(|dir| {
            dir.join(format!("cs{chip:02}_block{block:04}_page{page:02}.bin"))
        })
    }

    fn read_data(&mut self, chip: u8, block: u16, page: u8) -> Result<Vec<u8>, EmulatorError> {
        let key = (chip, block, page);
        // RAM is the backing store whenever there is no file backing at all,
        // not only when the caller opted into caching on top of one.
        let use_ram = self.ram_cache || self.base_dir.is_none();
        if use_ram {
            if let Some(data) = self.cache.get(&key) {
                return Ok(data.clone());
            }
        }
        let data = match self.path(chip, block, page) {
            None => vec![0xFFu8; PAGE_ALL_BYTES],
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(_) => vec![0xFFu8; PAGE_ALL_BYTES],
            },
        };
        if use_ram {
            self.cache.insert(key, data.clone());
        }
        Ok(data)
    }

    fn write_data(&mut self, chip: u8, block: u16, page: u8, data: &[u8]) -> Result<(), EmulatorError> {
        let key = (chip, block, page);
        let use_ram = self.ram_cache || self.base_dir.is_none();
        if use_ram {
            self.cache.insert(key, data.to_vec());
        }
        if let Some(path) = self.path(chip, block, page) {
            std::fs::write(path, data).map_err(EmulatorError::Io)?;
        }
        Ok(())
    }
}

impl NandChip for Emulator {
    type Error = EmulatorError;

    fn read_id(&mut self, chip: u8) -> Result<[u8; 5], Self::Error> {
        if chip < self.num_chip {
            Ok(READ_ID_EXPECT)
        } else {
            Ok([0u8; 5])
        }
    }

    fn read_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        col: u16,
        buf: &mut [u8],
    ) -> Result<bool, Self::Error> {
        self.validate(chip, block, page)?;
        let data = self.read_data(chip, block, page)?;
        let start = col as usize;
        let end = (start + buf.len()).min(data.len());
        let n = end.saturating_sub(start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        for b in &mut buf[n..] {
            *b = 0xFF;
        }
        Ok(true)
    }

    fn read_status(&mut self, _chip: u8) -> Result<u8, Self::Error> {
        Ok(0x00)
    }

    fn erase_block(&mut self, chip: u8, block: u16) -> Result<bool, Self::Error> {
        self.validate(chip, block, 0)?;
        if self.fail_erase_once.remove(&(chip, block)) {
            log::trace!("CMD\terase_block\tchip={chip}\tblock={block}\tis_ok=false (injected)");
            return Ok(false);
        }
        self.write_data(chip, block, 0, &vec![0xFFu8; PAGE_ALL_BYTES])?;
        log::trace!("CMD\terase_block\tchip={chip}\tblock={block}\tis_ok=true");
        Ok(true)
    }

    fn program_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
        _col: u16,
    ) -> Result<bool, Self::Error> {
        self.validate(chip, block, page)?;
        self.write_data(chip, block, page, data)?;
        log::trace!("CMD\tprogram_page\tchip={chip}\tblock={block}\tpage={page}\tis_ok=true");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emu(num_chip: u8) -> Emulator {
        Emulator::new(&EmulatorConfig { base_dir: None, ram_cache: false, num_chip }).unwrap()
    }

    #[test]
    fn read_id_matches_expected_for_each_chip() {
        let mut e = emu(1);
        assert_eq!(e.read_id(0).unwrap(), READ_ID_EXPECT);
        assert_eq!(e.read_id(1).unwrap(), [0u8; 5]);
    }

    #[test]
    fn missing_page_reads_as_0xff() {
        let mut e = emu(2);
        let mut buf = [0u8; PAGE_ALL_BYTES];
        assert!(e.read_page(0, 5, 0, 0, &mut buf).unwrap());
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn program_then_read_round_trips() {
        let mut e = emu(1);
        let data: Vec<u8> = (0..PAGE_ALL_BYTES).map(|i| (i & 0xFF) as u8).collect();
        assert!(e.program_page(0, 3, 0, &data, 0).unwrap());
        let mut buf = [0u8; PAGE_ALL_BYTES];
        assert!(e.read_page(0, 3, 0, 0, &mut buf).unwrap());
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn erase_failure_injection_fires_once() {
        let mut e = emu(1);
        e.inject_erase_failure(0, 7);
        assert!(!e.erase_block(0, 7).unwrap());
        assert!(e.erase_block(0, 7).unwrap());
    }
}
