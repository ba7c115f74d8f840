//! mikroBUS socket helpers
//!
//! A Click board plugs into a mikroBUS socket: SPI (SCK/MISO/MOSI + CS),
//! I2C, UART, and five single-purpose lines (AN, RST, PWM, INT, CS). This
//! module names those lines and assembles the per-socket SPI device, so
//! application code only picks a socket and never deals with CS handling.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use embedded_hal_bus::spi::ExclusiveDevice;

/// SPI device of one socket: shared SCK/MISO/MOSI plus that socket's CS.
pub type ClickSpi<BUS, CS, D> = ExclusiveDevice<BUS, CS, D>;

/// Single-purpose lines of a socket. Clicks that leave a line unused
/// accept `()` in its place.
pub struct Socket<AN, RST, PWM, INT> {
    pub an: AN,
    pub rst: RST,
    pub pwm: PWM,
    pub int: INT,
}

impl<AN, RST, PWM, INT> Socket<AN, RST, PWM, INT> {
    pub fn new(an: AN, rst: RST, pwm: PWM, int: INT) -> Self {
        Self { an, rst, pwm, int }
    }

    pub fn into_parts(self) -> (AN, RST, PWM, INT) {
        (self.an, self.rst, self.pwm, self.int)
    }
}

/// Build the SPI device for a socket. CS is driven high (deselected) before
/// the device is returned.
pub fn spi_device<BUS, CS, D>(bus: BUS, cs: CS, delay: D) -> Result<ClickSpi<BUS, CS, D>, CS::Error>
where
    BUS: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    ExclusiveDevice::new(bus, cs, delay)
}

/// Default 7-bit I2C addresses of the I2C clicks (address jumper at its
/// factory position).
pub mod i2c_address {
    pub const WEATHER: u8 = crate::drivers::bme280::ADDR_PRIMARY;
    pub const SHT: u8 = crate::drivers::sht3x::ADDR_PRIMARY;
    pub const IMU_6DOF: u8 = crate::drivers::lsm6dsl::ADDR_PRIMARY;
    pub const EEPROM: u8 = crate::drivers::eeprom24::BASE_ADDR;
}
