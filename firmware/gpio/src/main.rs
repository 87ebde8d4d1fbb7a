//! Diagnostic harness for the Banana Pi GPIO bus driver: detects the
//! board, brings up the TC58 bus over memory-mapped GPIO, and runs the
//! block manager's init protocol (chip detection + bad-block scan) so a
//! board bring-up can be sanity-checked without going through `tc58-cli`.
//!
//! Board detection sniffs `/proc/device-tree` for the model strings of
//! the three supported Banana Pi variants; everything past that point
//! (bus bring-up, chip detection, bad-block scan) runs the TC58 stack
//! from `tc58-core`.

use log::{error, info};

use tc58_core::block_manager::BlockManager;
use tc58_core::command::CommandLayer;
use tc58_core::config::{BlockManagerConfig, BusConfig};
use tc58_firmware_gpio::{NandBus, NandPins};

struct BoardInfo {
    name: &'static str,
    soc: &'static str,
    gpio_base: u32,
}

fn detect_board() -> Option<BoardInfo> {
    let model = std::fs::read_to_string("/proc/device-tree/model").ok()?;
    let compatible =
        std::fs::read_to_string("/proc/device-tree/compatible").ok().unwrap_or_default();

    if model.contains("M2 Zero") || model.contains("BPI-M2-Zero") || compatible.contains("sun8i-h3") {
        return Some(BoardInfo { name: "Banana Pi M2 Zero", soc: "Allwinner H3", gpio_base: 0x01C2_0800 });
    }
    if model.contains("M4 Berry") || model.contains("BPI-M4-Berry") || compatible.contains("sun50i-h618") {
        return Some(BoardInfo { name: "Banana Pi M4 Berry", soc: "Allwinner H618", gpio_base: 0x0300_B000 });
    }
    if model.contains("BPI-F3") || compatible.contains("spacemit") || compatible.contains("k1") {
        return Some(BoardInfo {
            name: "Banana Pi BPI-F3",
            soc: "SpacemiT K1 (RISC-V)",
            gpio_base: 0xD401_E000,
        });
    }
    if model.contains("Banana") || model.contains("BPI") {
        return Some(BoardInfo { name: "Banana Pi (unrecognized variant)", soc: "unknown", gpio_base: 0 });
    }
    None
}

fn main() {
    env_logger::init();

    let board = match detect_board() {
        Some(b) => {
            info!("detected {} ({})", b.name, b.soc);
            b
        }
        None => {
            error!("failed to detect a Banana Pi board from /proc/device-tree");
            std::process::exit(1);
        }
    };

    let bus_cfg = BusConfig::default();
    let bus = NandBus::new(board.gpio_base, NandPins::default(), bus_cfg.delay_us);
    let chip = CommandLayer::new(bus, bus_cfg.timeout_ms);

    let bm_cfg = BlockManagerConfig::default();
    match BlockManager::init(chip, &bm_cfg) {
        Ok(mgr) => info!("block manager ready: num_chip={}", mgr.num_chip()),
        Err(e) => {
            error!("block manager init failed: {e}");
            std::process::exit(1);
        }
    }
}
