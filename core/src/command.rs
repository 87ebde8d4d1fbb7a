//! NAND command layer: turns bus-driver primitives into the five standard
//! operations (READ ID, PAGE READ, PAGE PROGRAM, BLOCK ERASE, STATUS READ).
//! This is a pure wire layer — it never retries, and timeouts or failing
//! status bytes are reported through the ordinary return value of each
//! command, not as an error.

use crate::bus::BusDriver;
use crate::error::{BusError, CommandError};
use crate::geometry::{block_addr_bytes, nand_addr_bytes, PAGE_ALL_BYTES};

/// Command opcodes, as issued on the IO lines with CLE asserted.
pub mod cmd {
    pub const READ_ID: u8 = 0x90;
    pub const READ_1ST: u8 = 0x00;
    pub const READ_2ND: u8 = 0x30;
    pub const ERASE_1ST: u8 = 0x60;
    pub const ERASE_2ND: u8 = 0xD0;
    pub const STATUS_READ: u8 = 0x70;
    pub const PROGRAM_1ST: u8 = 0x80;
    pub const PROGRAM_2ND: u8 = 0x10;
}

/// Status-byte bit masks, as returned by [`CommandLayer::read_status`].
pub mod status {
    pub const PROGRAM_ERASE_FAIL: u8 = 0x01;
    pub const CACHE_PROGRAM_FAIL: u8 = 0x02;
    pub const PAGE_BUFFER_READY: u8 = 0x20;
    pub const DATA_CACHE_READY: u8 = 0x40;
    pub const WRITE_PROTECT_DISABLE: u8 = 0x80;
}

/// Sequences a [`BusDriver`] into the five standard NAND commands.
pub struct CommandLayer<B: BusDriver> {
    bus: B,
    timeout_ms: u32,
}

impl<B: BusDriver> CommandLayer<B> {
    pub fn new(bus: B, timeout_ms: u32) -> Self {
        Self { bus, timeout_ms }
    }

    /// Releases the underlying bus driver back to the caller.
    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Runs `body` with `chip` selected, then always deasserts CE# before
    /// returning — including when `body` propagates a hard bus error. A
    /// fault partway through a command must never leave the shared bus
    /// permanently selected.
    fn with_chip_selected<T>(
        &mut self,
        chip: u8,
        body: impl FnOnce(&mut Self) -> Result<T, CommandError<B::Error>>,
    ) -> Result<T, CommandError<B::Error>> {
        self.bus.select_chip(Some(chip))?;
        let result = body(self);
        let deselect = self.bus.select_chip(None);
        match result {
            Ok(v) => deselect.map(|()| v).map_err(CommandError::from),
            Err(e) => Err(e),
        }
    }

    /// `init_pins -> select_chip(c) -> 0x90 + addr(0x00) -> read 5 bytes ->
    /// select_chip(None)`.
    pub fn read_id(&mut self, chip: u8) -> Result<[u8; 5], CommandError<B::Error>> {
        log::trace!("CMD\tread_id\tchip={chip}");
        self.bus.init_pins()?;
        let out = self.with_chip_selected(chip, |this| {
            this.bus.input_command(cmd::READ_ID)?;
            this.bus.input_addresses(&[0x00])?;
            let mut out = [0u8; 5];
            this.bus.output_data(&mut out)?;
            Ok(out)
        })?;
        log::trace!("CMD\tread_id\tchip={chip}\tid={out:02x?}");
        Ok(out)
    }

    /// `0x00 + 4 addr bytes + 0x30; wait_ready; read n bytes`. Returns
    /// `Ok(false)` on a `wait_ready` timeout without filling `buf`.
    pub fn read_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        col: u16,
        buf: &mut [u8],
    ) -> Result<bool, CommandError<B::Error>> {
        log::trace!("CMD\tread_page\tchip={chip}\tblock={block}\tpage={page}\tcol={col}");
        self.bus.init_pins()?;
        let timeout_ms = self.timeout_ms;
        let ready = self.with_chip_selected(chip, |this| {
            this.bus.input_command(cmd::READ_1ST)?;
            this.bus.input_addresses(&nand_addr_bytes(block, page, col))?;
            this.bus.input_command(cmd::READ_2ND)?;
            let ready = this.bus.wait_ready(timeout_ms)?;
            if ready {
                this.bus.output_data(buf)?;
            }
            Ok(ready)
        })?;
        log::trace!("CMD\tread_page\tchip={chip}\tblock={block}\tpage={page}\tis_ok={ready}");
        Ok(ready)
    }

    /// `0x70 + 1-byte read`.
    pub fn read_status(&mut self, chip: u8) -> Result<u8, CommandError<B::Error>> {
        self.bus.init_pins()?;
        self.with_chip_selected(chip, |this| {
            this.bus.input_command(cmd::STATUS_READ)?;
            let mut out = [0u8; 1];
            this.bus.output_data(&mut out)?;
            Ok(out[0])
        })
    }

    /// `0x60 + 2 addr bytes + 0xD0; wait_ready; read_status; check bit 0`.
    /// A `wait_ready` timeout and a failing status both collapse to
    /// `Ok(false)` — the block manager is the only caller that needs to
    /// tell them apart from a hard bus fault, and it does not: both mean
    /// "mark this block bad".
    pub fn erase_block(&mut self, chip: u8, block: u16) -> Result<bool, CommandError<B::Error>> {
        log::trace!("CMD\terase_block\tchip={chip}\tblock={block}");
        self.bus.init_pins()?;
        let timeout_ms = self.timeout_ms;
        let ok = self.with_chip_selected(chip, |this| {
            this.bus.input_command(cmd::ERASE_1ST)?;
            this.bus.input_addresses(&block_addr_bytes(block))?;
            this.bus.input_command(cmd::ERASE_2ND)?;
            let ready = this.bus.wait_ready(timeout_ms)?;
            if !ready {
                return Ok(false);
            }
            let st = this.read_status_inner(chip)?;
            Ok(st & status::PROGRAM_ERASE_FAIL == 0)
        })?;
        log::trace!("CMD\terase_block\tchip={chip}\tblock={block}\tis_ok={ok}");
        Ok(ok)
    }

    /// `0x80 + 4 addr bytes + data bytes + 0x10; wait_ready; check status`.
    pub fn program_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
        col: u16,
    ) -> Result<bool, CommandError<B::Error>> {
        log::trace!("CMD\tprogram_page\tchip={chip}\tblock={block}\tpage={page}");
        self.bus.init_pins()?;
        let timeout_ms = self.timeout_ms;
        let ok = self.with_chip_selected(chip, |this| {
            this.bus.input_command(cmd::PROGRAM_1ST)?;
            this.bus.input_addresses(&nand_addr_bytes(block, page, col))?;
            this.bus.input_data(data)?;
            this.bus.input_command(cmd::PROGRAM_2ND)?;
            let ready = this.bus.wait_ready(timeout_ms)?;
            if !ready {
                return Ok(false);
            }
            let st = this.read_status_inner(chip)?;
            Ok(st & status::PROGRAM_ERASE_FAIL == 0)
        })?;
        log::trace!("CMD\tprogram_page\tchip={chip}\tblock={block}\tpage={page}\tis_ok={ok}");
        Ok(ok)
    }

    /// Reads status without its own chip-select bracket, for use inside a
    /// command that is already selected (erase/program's post-op check).
    fn read_status_inner(&mut self, _chip: u8) -> Result<u8, BusError<B::Error>> {
        self.bus.input_command(cmd::STATUS_READ)?;
        let mut out = [0u8; 1];
        self.bus.output_data(&mut out)?;
        Ok(out[0])
    }
}

/// Convenience constant re-export so callers sizing read buffers do not
/// need to import `geometry` separately.
pub const FULL_PAGE_BYTES: usize = PAGE_ALL_BYTES;

/// The capability set a concrete chip implementation provides:
/// `{read_id, read_page, read_status, erase_block, program_page}`,
/// implemented either by a [`CommandLayer`] driving a real [`BusDriver`]
/// or directly by [`crate::emulator::Emulator`], which fakes the same five
/// operations against files/RAM without ever touching a bus. The block
/// manager is generic over this trait, not over `BusDriver`, so it never
/// knows or cares which one it got.
pub trait NandChip {
    type Error: core::fmt::Debug + core::fmt::Display;

    fn read_id(&mut self, chip: u8) -> Result<[u8; 5], Self::Error>;
    fn read_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        col: u16,
        buf: &mut [u8],
    ) -> Result<bool, Self::Error>;
    fn read_status(&mut self, chip: u8) -> Result<u8, Self::Error>;
    fn erase_block(&mut self, chip: u8, block: u16) -> Result<bool, Self::Error>;
    fn program_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
        col: u16,
    ) -> Result<bool, Self::Error>;
}

impl<B: BusDriver> NandChip for CommandLayer<B> {
    type Error = CommandError<B::Error>;

    fn read_id(&mut self, chip: u8) -> Result<[u8; 5], Self::Error> {
        CommandLayer::read_id(self, chip)
    }

    fn read_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        col: u16,
        buf: &mut [u8],
    ) -> Result<bool, Self::Error> {
        CommandLayer::read_page(self, chip, block, page, col, buf)
    }

    fn read_status(&mut self, chip: u8) -> Result<u8, Self::Error> {
        CommandLayer::read_status(self, chip)
    }

    fn erase_block(&mut self, chip: u8, block: u16) -> Result<bool, Self::Error> {
        CommandLayer::erase_block(self, chip, block)
    }

    fn program_page(
        &mut self,
        chip: u8,
        block: u16,
        page: u8,
        data: &[u8],
        col: u16,
    ) -> Result<bool, Self::Error> {
        CommandLayer::program_page(self, chip, block, page, data, col)
    }
}
