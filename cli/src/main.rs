//! `tc58ctl`: a thin harness binary wiring the emulator or the GPIO bus
//! driver to a small interactive command set, for manual testing of the
//! core crate outside a full host transport. The core library has no
//! command-line surface of its own; this binary is the only place that
//! surface is defined.

mod driver;

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use tc58_core::block_manager::BlockManager;
use tc58_core::command::NandChip;
use tc58_core::config::NandConfig;
use tc58_core::ftl::Ftl;
use tc58_core::geometry::{PAGE_ALL_BYTES, SECTOR_BYTES};

use driver::DriverKind;

#[derive(Parser)]
#[command(name = "tc58ctl", version, about = "TC58NVG0S3HTA00 controller core harness")]
struct Cli {
    /// Which bus implementation to drive.
    #[arg(long, value_enum, default_value = "emulator")]
    driver: DriverKind,

    /// Optional TOML config file (falls back to `NandConfig::default()`).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// READ ID against a chip select.
    ReadId { chip: u8 },
    /// Run (or re-run) block manager initialization and report its state.
    Init,
    /// Allocate a free block.
    Alloc,
    /// Free a previously allocated block.
    Free { chip: u8, block: u16 },
    /// Read a full physical page and hex-dump its first bytes.
    ReadPage { chip: u8, block: u16, page: u8 },
    /// Read one logical sector through the FTL.
    Read { lba: u64 },
    /// Write one 512-byte logical sector, read from a file.
    Write { lba: u64, file: PathBuf },
    /// Drop an LBA's mapping.
    Unmap { lba: u64 },
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<NandConfig> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(NandConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let chip = driver::build(cli.driver, &cfg)?;

    match cli.command {
        Command::ReadId { chip: cs } => {
            let mut chip = chip;
            let id = chip.read_id(cs).map_err(anyhow::Error::msg)?;
            println!("{}: {:02x?}", "READ ID".bold(), id);
        }
        Command::Init => {
            let mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{} num_chip={}", "block manager ready".green(), mgr.num_chip());
        }
        Command::Alloc => {
            let mut mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            let (c, b) = mgr.alloc().map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}: chip={c} block={b}", "allocated".green());
        }
        Command::Free { chip: cs, block } => {
            let mut mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            mgr.free(cs, block).map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}: chip={cs} block={block}", "freed".green());
        }
        Command::ReadPage { chip: cs, block, page } => {
            let mut mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            match mgr.read(cs, block, page).map_err(|e| anyhow::anyhow!("{e}"))? {
                Some(buf) => {
                    let preview: Vec<String> =
                        buf[..32.min(PAGE_ALL_BYTES)].iter().map(|b| format!("{b:02x}")).collect();
                    println!("{}: {}", "page".bold(), preview.join(" "));
                }
                None => println!("{}", "read timed out".red()),
            }
        }
        Command::Read { lba } => {
            let mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            let mut ftl = Ftl::new(mgr, cfg.codec);
            match ftl.read_logical(lba).map_err(|e| anyhow::anyhow!("{e}"))? {
                Some(sector) => {
                    let preview: Vec<String> =
                        sector[..32.min(SECTOR_BYTES)].iter().map(|b| format!("{b:02x}")).collect();
                    println!("{}: {}", "sector".bold(), preview.join(" "));
                }
                None => println!("{}", "read failed (timeout or uncorrectable codec error)".red()),
            }
        }
        Command::Write { lba, file } => {
            let data = fs::read(&file)?;
            anyhow::ensure!(data.len() == SECTOR_BYTES, "input file must be exactly {SECTOR_BYTES} bytes");
            let mut sector = [0u8; SECTOR_BYTES];
            sector.copy_from_slice(&data);

            let mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            let mut ftl = Ftl::new(mgr, cfg.codec);
            ftl.write_logical(lba, &sector).map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}: lba={lba}", "written".green());
        }
        Command::Unmap { lba } => {
            let mgr = BlockManager::init(chip, &cfg.block_manager).map_err(|e| anyhow::anyhow!("{e}"))?;
            let mut ftl = Ftl::new(mgr, cfg.codec);
            ftl.unmap(lba);
            println!("{}: lba={lba}", "unmapped".green());
        }
    }

    Ok(())
}
