//! Persisted allocator state: a stable key/value record at a
//! caller-supplied path (default `"nand_block_allocator.json"`). The three
//! field names (`num_chip`, `badblock_bitmaps`, `allocated_bitmaps`) are
//! kept stable for host tooling to inspect; each chip's 1024-bit bitmap is
//! represented as 16 `u64` words (LSB word first, bit 0 of the first word
//! = block 0) rather than a single arbitrary-precision integer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::block_manager::{Bitmap1024, BITMAP_WORDS};

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedState {
    pub num_chip: u8,
    pub badblock_bitmaps: Vec<[u64; BITMAP_WORDS]>,
    pub allocated_bitmaps: Vec<[u64; BITMAP_WORDS]>,
}

impl PersistedState {
    pub fn from_bitmaps(bad: &[Bitmap1024], alloc: &[Bitmap1024]) -> Self {
        Self {
            num_chip: bad.len() as u8,
            badblock_bitmaps: bad.iter().map(|b| b.words).collect(),
            allocated_bitmaps: alloc.iter().map(|b| b.words).collect(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
