// Bit-banged 1-Wire master on one open-drain GPIO
//
// Standard-speed slot timings (Maxim AN126, recommended values):
//   reset:  low 480us, release, sample at +70us, recover 410us
//   write1: low 6us, release 64us
//   write0: low 60us, release 10us
//   read:   low 6us, release, sample at +9us, recover 55us
// The pin must be configured open-drain with a pull-up: set_high() releases
// the line, is_high() samples it.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::crc::crc8_maxim;

pub mod rom_cmd {
    pub const READ_ROM: u8 = 0x33;
    pub const MATCH_ROM: u8 = 0x55;
    pub const SKIP_ROM: u8 = 0xCC;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OneWireError {
    Pin,
    /// No device pulled the line low after reset.
    NoPresence,
    /// ROM code CRC mismatch.
    Crc,
}

/// 64-bit registration number: family code, 48-bit serial, CRC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rom(pub [u8; 8]);

impl Rom {
    pub fn from_bytes(bytes: [u8; 8]) -> Result<Self, OneWireError> {
        if crc8_maxim(&bytes[..7]) != bytes[7] {
            return Err(OneWireError::Crc);
        }
        Ok(Rom(bytes))
    }

    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> u64 {
        let mut s = [0u8; 8];
        s[..6].copy_from_slice(&self.0[1..7]);
        u64::from_le_bytes(s)
    }
}

pub struct OneWire<PIN> {
    pin: PIN,
}

impl<PIN> OneWire<PIN>
where
    PIN: InputPin + OutputPin,
{
    pub fn new(mut pin: PIN) -> Result<Self, OneWireError> {
        pin.set_high().map_err(|_| OneWireError::Pin)?;
        Ok(Self { pin })
    }

    fn low(&mut self) -> Result<(), OneWireError> {
        self.pin.set_low().map_err(|_| OneWireError::Pin)
    }

    fn release(&mut self) -> Result<(), OneWireError> {
        self.pin.set_high().map_err(|_| OneWireError::Pin)
    }

    fn sample(&mut self) -> Result<bool, OneWireError> {
        self.pin.is_high().map_err(|_| OneWireError::Pin)
    }

    /// Reset pulse; `Ok(true)` if at least one device answered with presence.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<bool, OneWireError> {
        self.low()?;
        delay.delay_us(480);
        self.release()?;
        delay.delay_us(70);
        let present = !self.sample()?;
        delay.delay_us(410);
        Ok(present)
    }

    /// Reset and fail unless a device is present.
    pub fn reset_expect_presence(&mut self, delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        if self.reset(delay)? {
            Ok(())
        } else {
            Err(OneWireError::NoPresence)
        }
    }

    pub fn write_bit(&mut self, bit: bool, delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        self.low()?;
        if bit {
            delay.delay_us(6);
            self.release()?;
            delay.delay_us(64);
        } else {
            delay.delay_us(60);
            self.release()?;
            delay.delay_us(10);
        }
        Ok(())
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, OneWireError> {
        self.low()?;
        delay.delay_us(6);
        self.release()?;
        delay.delay_us(9);
        let bit = self.sample()?;
        delay.delay_us(55);
        Ok(bit)
    }

    /// LSB first.
    pub fn write_byte(&mut self, byte: u8, delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0, delay)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, OneWireError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    pub fn write_bytes(&mut self, bytes: &[u8], delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        for &b in bytes {
            self.write_byte(b, delay)?;
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, buf: &mut [u8], delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        for b in buf.iter_mut() {
            *b = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// READ ROM; only valid with a single device on the bus.
    pub fn read_rom(&mut self, delay: &mut impl DelayNs) -> Result<Rom, OneWireError> {
        self.reset_expect_presence(delay)?;
        self.write_byte(rom_cmd::READ_ROM, delay)?;
        let mut bytes = [0u8; 8];
        self.read_bytes(&mut bytes, delay)?;
        Rom::from_bytes(bytes)
    }

    /// Reset and address one device (`Some`) or every device (`None`).
    pub fn select(&mut self, rom: Option<&Rom>, delay: &mut impl DelayNs) -> Result<(), OneWireError> {
        self.reset_expect_presence(delay)?;
        match rom {
            Some(rom) => {
                self.write_byte(rom_cmd::MATCH_ROM, delay)?;
                self.write_bytes(&rom.0, delay)
            }
            None => self.write_byte(rom_cmd::SKIP_ROM, delay),
        }
    }

    pub fn release_pin(self) -> PIN {
        self.pin
    }
}
