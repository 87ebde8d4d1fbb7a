//! Configuration knobs, gathered in one place so the CLI/firmware harnesses
//! can load them from a file instead of the core reaching for environment
//! variables or globals itself.

use serde::{Deserialize, Serialize};

/// Bus-driver and command-layer timing/policy knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusConfig {
    /// Configurable per-cycle hold. Zero by default; real drivers may
    /// substitute timed waveforms from the part's datasheet instead.
    pub delay_us: u32,
    /// `wait_ready` deadline for every command.
    pub timeout_ms: u32,
    /// `true` asserts WP# (write-protected) whenever the driver is idle.
    pub keep_write_protect: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { delay_us: 0, timeout_ms: 1000, keep_write_protect: true }
    }
}

/// Page-codec transform toggles plus the scrambler seed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CodecConfig {
    pub scramble_seed: u8,
    pub use_scramble: bool,
    pub use_ecc: bool,
    pub use_crc: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { scramble_seed: 0xA5, use_scramble: true, use_ecc: true, use_crc: true }
    }
}

/// Block-manager init and persistence knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockManagerConfig {
    /// `0` means auto-detect by probing READ ID on each candidate chip.
    pub num_chip_override: u8,
    /// Path of the persisted allocator state file.
    pub persist_path: String,
}

impl Default for BlockManagerConfig {
    fn default() -> Self {
        Self { num_chip_override: 0, persist_path: "nand_block_allocator.json".to_string() }
    }
}

/// Emulator-only knobs, not part of the real bus driver's surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Directory holding `cs{CC}_block{BBBB}_page{PP}.bin` files. `None`
    /// means an ephemeral all-in-RAM backing store.
    pub base_dir: Option<String>,
    /// Caches page reads/writes in RAM in addition to (or instead of) the
    /// file backing store.
    pub ram_cache: bool,
    /// Number of chips that answer READ ID with the expected ID.
    pub num_chip: u8,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self { base_dir: Some("nand_datas".to_string()), ram_cache: false, num_chip: 2 }
    }
}

/// Top-level configuration bundle a harness loads (e.g. from TOML) and
/// threads through to the components it builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NandConfig {
    pub bus: BusConfig,
    pub codec: CodecConfig,
    pub block_manager: BlockManagerConfig,
    pub emulator: EmulatorConfig,
}
