// DIGI POT click: Microchip MCP4161 8-bit (257-step) SPI potentiometer
//
// Command byte: AD3..AD0 | C1 C0 | D9 D8
//   C = 00 write data (16-bit frame), 01 increment, 10 decrement,
//       11 read data (16-bit frame, device returns D8..D0 in the low bits)
// Wiper positions are 0..=256; 256 connects the wiper straight to terminal A.
// R_WB = R_AB * N / 256 + R_W.

use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::Error;

pub const MAX_POSITION: u16 = 256;

/// MCP4161-103 on the click: 10 kOhm end to end.
pub const DEFAULT_R_AB_OHM: u32 = 10_000;
/// Typical wiper resistance (datasheet RW, 5 V).
pub const DEFAULT_R_W_OHM: u32 = 75;

mod addr {
    pub const WIPER0: u8 = 0x00;
    pub const NV_WIPER0: u8 = 0x02;
    pub const TCON: u8 = 0x04;
    pub const STATUS: u8 = 0x05;
}

mod op {
    pub const WRITE: u8 = 0b00;
    pub const INCREMENT: u8 = 0b01;
    pub const DECREMENT: u8 = 0b10;
    pub const READ: u8 = 0b11;
}

// CMDERR: the device pulls SDO low for the rest of an invalid command
const CMDERR_MASK: u8 = 0x02;

// NV writes need tWC before the next command
const EEPROM_WRITE_MS: u32 = 5;

fn command(address: u8, operation: u8, data_hi: u8) -> u8 {
    (address << 4) | (operation << 2) | (data_hi & 0x03)
}

pub struct Mcp4161<SPI> {
    spi: SPI,
    r_ab_ohm: u32,
    r_w_ohm: u32,
}

impl<SPI, E> Mcp4161<SPI>
where
    SPI: SpiDevice<Error = E>,
{
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            r_ab_ohm: DEFAULT_R_AB_OHM,
            r_w_ohm: DEFAULT_R_W_OHM,
        }
    }

    /// Other resistance grades (-502, -503, -104). `r_ab_ohm` must be
    /// non-zero.
    pub fn with_resistance(mut self, r_ab_ohm: u32, r_w_ohm: u32) -> Result<Self, Error<E>> {
        if r_ab_ohm == 0 {
            return Err(Error::InvalidArgument);
        }
        self.r_ab_ohm = r_ab_ohm;
        self.r_w_ohm = r_w_ohm;
        Ok(self)
    }

    fn write_word(&mut self, address: u8, value: u16) -> Result<(), Error<E>> {
        let mut frame = [
            command(address, op::WRITE, (value >> 8) as u8),
            (value & 0xFF) as u8,
        ];
        self.spi.transfer_in_place(&mut frame).map_err(Error::Bus)?;
        if frame[0] & CMDERR_MASK == 0 {
            warn!("MCP4161: write to 0x{:X} rejected", address);
            return Err(Error::InvalidResponse);
        }
        Ok(())
    }

    fn read_word(&mut self, address: u8) -> Result<u16, Error<E>> {
        let mut frame = [command(address, op::READ, 0x03), 0xFF];
        self.spi.transfer_in_place(&mut frame).map_err(Error::Bus)?;
        if frame[0] & CMDERR_MASK == 0 {
            return Err(Error::InvalidResponse);
        }
        Ok((((frame[0] & 0x01) as u16) << 8) | frame[1] as u16)
    }

    pub fn set_position(&mut self, position: u16) -> Result<(), Error<E>> {
        if position > MAX_POSITION {
            return Err(Error::InvalidArgument);
        }
        self.write_word(addr::WIPER0, position)
    }

    pub fn position(&mut self) -> Result<u16, Error<E>> {
        self.read_word(addr::WIPER0)
    }

    /// Store the power-up wiper position in EEPROM.
    pub fn store_position(
        &mut self,
        position: u16,
        delay: &mut impl embedded_hal::delay::DelayNs,
    ) -> Result<(), Error<E>> {
        if position > MAX_POSITION {
            return Err(Error::InvalidArgument);
        }
        self.write_word(addr::NV_WIPER0, position)?;
        delay.delay_ms(EEPROM_WRITE_MS);
        Ok(())
    }

    pub fn stored_position(&mut self) -> Result<u16, Error<E>> {
        self.read_word(addr::NV_WIPER0)
    }

    /// Single-step the wiper; saturates at 0 and 256 in hardware.
    pub fn increment(&mut self) -> Result<(), Error<E>> {
        self.spi
            .write(&[command(addr::WIPER0, op::INCREMENT, 0)])
            .map_err(Error::Bus)
    }

    pub fn decrement(&mut self) -> Result<(), Error<E>> {
        self.spi
            .write(&[command(addr::WIPER0, op::DECREMENT, 0)])
            .map_err(Error::Bus)
    }

    /// Terminal control register: bit 3 R0HW, 2 R0A, 1 R0W, 0 R0B.
    pub fn tcon(&mut self) -> Result<u16, Error<E>> {
        self.read_word(addr::TCON)
    }

    pub fn set_tcon(&mut self, value: u16) -> Result<(), Error<E>> {
        self.write_word(addr::TCON, value & 0x1FF)
    }

    /// Shut the resistor network down (R0HW cleared) or bring it back.
    pub fn set_shutdown(&mut self, shutdown: bool) -> Result<(), Error<E>> {
        let tcon = self.tcon()?;
        let tcon = if shutdown { tcon & !0x08 } else { tcon | 0x08 };
        self.set_tcon(tcon)
    }

    /// STATUS register; bit 4 (EEWA) is set while an EEPROM write is in progress.
    pub fn status(&mut self) -> Result<u16, Error<E>> {
        self.read_word(addr::STATUS)
    }

    /// Wiper-to-B resistance for the current position.
    pub fn resistance_ohm(&mut self) -> Result<u32, Error<E>> {
        let position = self.position()?;
        Ok(position_to_ohm(position, self.r_ab_ohm, self.r_w_ohm))
    }

    /// Move the wiper to the position closest to `ohm` (clamped to range).
    pub fn set_resistance_ohm(&mut self, ohm: u32) -> Result<u16, Error<E>> {
        let position = ohm_to_position(ohm, self.r_ab_ohm, self.r_w_ohm);
        self.set_position(position)?;
        Ok(position)
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

/// Saturates at `u32::MAX`.
pub fn position_to_ohm(position: u16, r_ab_ohm: u32, r_w_ohm: u32) -> u32 {
    let rwb = r_ab_ohm as u64 * position.min(MAX_POSITION) as u64 / MAX_POSITION as u64 + r_w_ohm as u64;
    rwb.min(u32::MAX as u64) as u32
}

/// Nearest position, clamped to 0..=256. A zero `r_ab_ohm` maps to 0.
pub fn ohm_to_position(ohm: u32, r_ab_ohm: u32, r_w_ohm: u32) -> u16 {
    if r_ab_ohm == 0 {
        return 0;
    }
    let net = ohm.saturating_sub(r_w_ohm) as u64;
    let r_ab = r_ab_ohm as u64;
    let steps = (net * MAX_POSITION as u64 + r_ab / 2) / r_ab;
    steps.min(MAX_POSITION as u64) as u16
}
