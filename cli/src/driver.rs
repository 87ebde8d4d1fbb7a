//! Runtime driver selection: picks the emulator or the real GPIO bus at
//! startup from a CLI flag, never a compile-time-only `cfg!` switch. Both
//! arms are folded into one concrete type so the rest of the binary can
//! stay generic over a single `NandChip` implementation instead of
//! threading a type parameter through every subcommand.

use tc58_core::command::{CommandLayer, NandChip};
use tc58_core::config::NandConfig;
use tc58_core::emulator::Emulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DriverKind {
    Emulator,
    Gpio,
}

pub enum AnyChip {
    Emulator(Emulator),
    #[cfg(feature = "hardware")]
    Gpio(CommandLayer<tc58_firmware_gpio::NandBus>),
}

impl NandChip for AnyChip {
    type Error = String;

    fn read_id(&mut self, chip: u8) -> Result<[u8; 5], Self::Error> {
        match self {
            AnyChip::Emulator(e) => e.read_id(chip).map_err(|e| e.to_string()),
            #[cfg(feature = "hardware")]
            AnyChip::Gpio(g) => g.read_id(chip).map_err(|e| e.to_string()),
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
        match self {
            AnyChip::Emulator(e) => e.read_page(chip, block, page, col, buf).map_err(|e| e.to_string()),
            #[cfg(feature = "hardware")]
            AnyChip::Gpio(g) => g.read_page(chip, block, page, col, buf).map_err(|e| e.to_string()),
        }
    }

    fn read_status(&mut self, chip: u8) -> Result<u8, Self::Error> {
        match self {
            AnyChip::Emulator(e) => e.read_status(chip).map_err(|e| e.to_string()),
            #[cfg(feature = "hardware")]
            AnyChip::Gpio(g) => g.read_status(chip).map_err(|e| e.to_string()),
        }
    }

    fn erase_block(&mut self, chip: u8, block: u16) -> Result<bool, Self::Error> {
        match self {
            AnyChip::Emulator(e) => e.erase_block(chip, block).map_err(|e| e.to_string()),
            #[cfg(feature = "hardware")]
            AnyChip::Gpio(g) => g.erase_block(chip, block).map_err(|e| e.to_string()),
        }
    }

    fn program_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
        col: u16,
    ) -> Result<bool, Self::Error> {
        match self {
            AnyChip::Emulator(e) => e.program_page(chip, block, page, data, col).map_err(|e| e.to_string()),
            #[cfg(feature = "hardware")]
            AnyChip::Gpio(g) => g.program_page(chip, block, page, data, col).map_err(|e| e.to_string()),
        }
    }
}

/// Builds the selected [`AnyChip`] from the loaded configuration.
pub fn build(kind: DriverKind, cfg: &NandConfig) -> anyhow::Result<AnyChip> {
    match kind {
        DriverKind::Emulator => Ok(AnyChip::Emulator(Emulator::new(&cfg.emulator)?)),
        DriverKind::Gpio => {
            #[cfg(feature = "hardware")]
            {
                let bus = tc58_firmware_gpio::NandBus::new(
                    0, // board GPIO base: real deployments pass this via NandConfig extension
                    tc58_firmware_gpio::NandPins::default(),
                    cfg.bus.delay_us,
                );
                Ok(AnyChip::Gpio(CommandLayer::new(bus, cfg.bus.timeout_ms)))
            }
            #[cfg(not(feature = "hardware"))]
            {
                anyhow::bail!(
                    "this build was compiled without the `hardware` feature; rebuild tc58-cli with \
                     `--features hardware` to select --driver gpio"
                )
            }
        }
    }
}
