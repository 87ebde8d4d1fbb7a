//! The bus driver seam: everything below the command layer that actually
//! wiggles pins. Two implementations exist in this workspace — the
//! file-backed [`crate::emulator`] for host-side testing and the
//! memory-mapped GPIO driver in the `tc58-firmware-gpio` crate — chosen at
//! boot by a factory, never by a compile-time `cfg!` switch, per the
//! driver-selection design note.

use crate::error::BusError;

/// Capability set a concrete bus implementation must provide. Each method
/// corresponds to one primitive bus cycle; the command layer composes these
/// into full NAND operations. Implementations must respect the ordering
/// in the component design: setup IO, raise the strobe-enabling signal,
/// drop WE#/RE#, delay, raise WE#/RE#, drop CLE/ALE. Reordering corrupts
/// the protocol.
pub trait BusDriver {
    /// Driver-specific failure (GPIO register fault, file I/O error, ...).
    type Error: core::fmt::Debug + core::fmt::Display;

    /// Drives the idle state: IO pins output-low, both CE# high, CLE/ALE
    /// low, WE#/RE# high, WP# per the write-protect policy.
    fn init_pins(&mut self) -> Result<(), BusError<Self::Error>>;

    /// Switches the 8 data lines between output (`true`) and input
    /// (`false`).
    fn set_io_dir(&mut self, output: bool) -> Result<(), BusError<Self::Error>>;

    /// Asserts exactly one CE# low, or deasserts both when `None`.
    fn select_chip(&mut self, chip: Option<u8>) -> Result<(), BusError<Self::Error>>;

    /// Drives WP#. `true` asserts write-protect (WP# low); the caller must
    /// allow a settle of at least 100 microseconds afterwards.
    fn set_write_protect(&mut self, enabled: bool) -> Result<(), BusError<Self::Error>>;

    /// Places `byte` on the IO lines and pulses WE# low with CLE high.
    fn input_command(&mut self, byte: u8) -> Result<(), BusError<Self::Error>>;

    /// Places each byte of `bytes` on the IO lines in turn, pulsing WE#
    /// low with ALE high.
    fn input_addresses(&mut self, bytes: &[u8]) -> Result<(), BusError<Self::Error>>;

    /// Switches IO to input, pulses RE# low once per byte of `buf`
    /// sampling IO on each low phase, and restores IO to output.
    fn output_data(&mut self, buf: &mut [u8]) -> Result<(), BusError<Self::Error>>;

    /// Places each byte of `data` on the IO lines in turn, pulsing WE# low
    /// once per byte (caller must already be in output IO direction).
    fn input_data(&mut self, data: &[u8]) -> Result<(), BusError<Self::Error>>;

    /// Polls R/B# until it reads high (ready) or `timeout_ms` elapses.
    /// Returns `true` if the chip became ready within the deadline.
    fn wait_ready(&mut self, timeout_ms: u32) -> Result<bool, BusError<Self::Error>>;

    /// Configurable per-cycle hold, in whatever unit the implementation's
    /// timing model uses. Real drivers spend this waiting out datasheet
    /// setup/hold times; the emulator is a no-op.
    fn delay(&mut self);
}
