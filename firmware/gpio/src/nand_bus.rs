//! [`tc58_core::bus::BusDriver`] implementation over memory-mapped GPIO
//! registers, for boards exposing `/dev/mem`-style register access.
//! Pinout shape follows a classic `NandPins` layout (8 data lines,
//! CE/WE/RE/ALE/CLE/R-B/WP), adapted to the Allwinner register layout in
//! [`crate::gpio::AllwinnerGpio`] and to two chip-selects instead of one.
//!
//! Every cycle helper follows a strict ordering: setup IO, raise the
//! strobe-enabling signal, drop WE#/RE#, delay, raise WE#/RE#, drop
//! CLE/ALE. Reordering these steps corrupts the NAND protocol, so none of
//! the methods below are allowed to early-return mid-sequence.

use std::time::{Duration, Instant};

use tc58_core::bus::BusDriver;
use tc58_core::error::BusError;

use crate::gpio::{AllwinnerGpio, Pin};

/// GPIO line assignment for the TC58 parallel bus. Defaults mirror a
/// 40-pin header layout; boards with a different wiring pass their own
/// [`NandPins`] to [`NandBus::new`].
pub struct NandPins {
    /// D0-D7, directly connected.
    pub data: [Pin; 8],
    /// One CE# line per chip select.
    pub ce: [Pin; tc58_core::geometry::MAX_CHIPS as usize],
    pub we: Pin,
    pub re: Pin,
    pub ale: Pin,
    pub cle: Pin,
    /// Ready/Busy#, input only.
    pub rb: Pin,
    /// Write-protect, active low.
    pub wp: Pin,
}

impl Default for NandPins {
    /// Default pinout for a Banana Pi M2 Zero 40-pin header, PG bank.
    fn default() -> Self {
        use crate::gpio::AllwinnerPort::PG;
        Self {
            data: [(PG, 0), (PG, 1), (PG, 2), (PG, 3), (PG, 4), (PG, 5), (PG, 6), (PG, 7)],
            ce: [(PG, 8), (PG, 9)],
            we: (PG, 10),
            re: (PG, 11),
            ale: (PG, 12),
            cle: (PG, 13),
            rb: (PG, 14),
            wp: (PG, 15),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GpioBusError {
    #[error("GPIO register map error: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives [`NandPins`] through an [`AllwinnerGpio`] register map. Owns the
/// bus exclusively; no other code may touch these registers concurrently.
pub struct NandBus {
    gpio: AllwinnerGpio,
    pins: NandPins,
    delay_us: u32,
    io_output: bool,
}

impl NandBus {
    pub fn new(gpio_base: u32, pins: NandPins, delay_us: u32) -> Self {
        Self { gpio: AllwinnerGpio::new(gpio_base), pins, delay_us, io_output: true }
    }

    fn hold(&self) {
        if self.delay_us > 0 {
            std::thread::sleep(Duration::from_micros(self.delay_us as u64));
        }
    }

    fn set_data_bus(&mut self, byte: u8) {
        for (i, &(port, pin)) in self.pins.data.iter().enumerate() {
            self.gpio.write(port as u8, pin, (byte >> i) & 1 != 0);
        }
    }

    fn get_data_bus(&self) -> u8 {
        let mut byte = 0u8;
        for (i, &(port, pin)) in self.pins.data.iter().enumerate() {
            if self.gpio.read(port as u8, pin) {
                byte |= 1 << i;
            }
        }
        byte
    }

    /// One WE#-strobed byte: data already on the bus, CLE/ALE already set
    /// by the caller. `drop WE# -> delay -> raise WE#`.
    fn strobe_we(&mut self) {
        let (port, pin) = self.pins.we;
        self.gpio.write(port as u8, pin, false);
        self.hold();
        self.gpio.write(port as u8, pin, true);
    }
}

impl BusDriver for NandBus {
    type Error = GpioBusError;

    fn init_pins(&mut self) -> Result<(), BusError<Self::Error>> {
        self.gpio.init().map_err(|e| BusError(GpioBusError::Io(e)))?;

        for &(port, pin) in &self.pins.data {
            self.gpio.set_output(port as u8, pin);
            self.gpio.write(port as u8, pin, false);
        }
        self.io_output = true;

        for &(port, pin) in &self.pins.ce {
            self.gpio.set_output(port as u8, pin);
            self.gpio.write(port as u8, pin, true); // CE# deasserted (high)
        }

        let (cle_p, cle_pin) = self.pins.cle;
        self.gpio.set_output(cle_p as u8, cle_pin);
        self.gpio.write(cle_p as u8, cle_pin, false);

        let (ale_p, ale_pin) = self.pins.ale;
        self.gpio.set_output(ale_p as u8, ale_pin);
        self.gpio.write(ale_p as u8, ale_pin, false);

        let (we_p, we_pin) = self.pins.we;
        self.gpio.set_output(we_p as u8, we_pin);
        self.gpio.write(we_p as u8, we_pin, true);

        let (re_p, re_pin) = self.pins.re;
        self.gpio.set_output(re_p as u8, re_pin);
        self.gpio.write(re_p as u8, re_pin, true);

        let (rb_p, rb_pin) = self.pins.rb;
        self.gpio.set_input(rb_p as u8, rb_pin);

        let (wp_p, wp_pin) = self.pins.wp;
        self.gpio.set_output(wp_p as u8, wp_pin);
        self.gpio.write(wp_p as u8, wp_pin, true); // WP# deasserted by default

        Ok(())
    }

    fn set_io_dir(&mut self, output: bool) -> Result<(), BusError<Self::Error>> {
        for &(port, pin) in &self.pins.data {
            if output {
                self.gpio.set_output(port as u8, pin);
            } else {
                self.gpio.set_input(port as u8, pin);
            }
        }
        self.io_output = output;
        Ok(())
    }

    fn select_chip(&mut self, chip: Option<u8>) -> Result<(), BusError<Self::Error>> {
        for (i, &(port, pin)) in self.pins.ce.iter().enumerate() {
            let asserted = chip == Some(i as u8);
            self.gpio.write(port as u8, pin, !asserted); // active low
        }
        Ok(())
    }

    fn set_write_protect(&mut self, enabled: bool) -> Result<(), BusError<Self::Error>> {
        let (port, pin) = self.pins.wp;
        self.gpio.write(port as u8, pin, !enabled); // WP# asserted (low) when enabled
        std::thread::sleep(Duration::from_micros(100));
        Ok(())
    }

    fn input_command(&mut self, byte: u8) -> Result<(), BusError<Self::Error>> {
        if !self.io_output {
            self.set_io_dir(true)?;
        }
        let (cle_p, cle_pin) = self.pins.cle;
        self.set_data_bus(byte);
        self.gpio.write(cle_p as u8, cle_pin, true);
        self.strobe_we();
        self.gpio.write(cle_p as u8, cle_pin, false);
        Ok(())
    }

    fn input_addresses(&mut self, bytes: &[u8]) -> Result<(), BusError<Self::Error>> {
        if !self.io_output {
            self.set_io_dir(true)?;
        }
        let (ale_p, ale_pin) = self.pins.ale;
        self.gpio.write(ale_p as u8, ale_pin, true);
        for &byte in bytes {
            self.set_data_bus(byte);
            self.strobe_we();
        }
        self.gpio.write(ale_p as u8, ale_pin, false);
        Ok(())
    }

    fn input_data(&mut self, data: &[u8]) -> Result<(), BusError<Self::Error>> {
        if !self.io_output {
            self.set_io_dir(true)?;
        }
        for &byte in data {
            self.set_data_bus(byte);
            self.strobe_we();
        }
        Ok(())
    }

    fn output_data(&mut self, buf: &mut [u8]) -> Result<(), BusError<Self::Error>> {
        self.set_io_dir(false)?;
        let (re_p, re_pin) = self.pins.re;
        for slot in buf.iter_mut() {
            self.gpio.write(re_p as u8, re_pin, false);
            self.hold();
            *slot = self.get_data_bus();
            self.gpio.write(re_p as u8, re_pin, true);
        }
        self.set_io_dir(true)?;
        Ok(())
    }

    fn wait_ready(&mut self, timeout_ms: u32) -> Result<bool, BusError<Self::Error>> {
        let (rb_p, rb_pin) = self.pins.rb;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        loop {
            if self.gpio.read(rb_p as u8, rb_pin) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    fn delay(&mut self) {
        self.hold();
    }
}
