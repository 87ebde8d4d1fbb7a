//! Memory-mapped GPIO [`tc58_core::bus::BusDriver`] for Allwinner-based
//! boards (Banana Pi M2 Zero / M4 Berry / BPI-F3). Exposes the driver as a
//! library so `tc58-cli` can select it at runtime instead of only via this
//! crate's own diagnostic binary.

pub mod gpio;
pub mod nand_bus;

pub use gpio::AllwinnerPort;
pub use nand_bus::{GpioBusError, NandBus, NandPins};
