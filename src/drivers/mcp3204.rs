// ADC click: MCP3204, 4-channel 12-bit SAR ADC over SPI
//
// One conversion per 3-byte transfer (MCP3204 datasheet, fig. 6-1):
//   tx: 0000 01 SGL D2 | D1 D0 xxxxxx | xxxxxxxx
//   rx: ???????? | ???0 B11..B8 | B7..B0
// Raw counts scale linearly against VREF: mV = raw * vref / 4096.

use embedded_hal::spi::SpiDevice;

use crate::Error;

pub const RESOLUTION_BITS: u32 = 12;
pub const FULL_SCALE: u16 = 1 << RESOLUTION_BITS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// CHn against AGND, n in 0..=3
    Single(u8),
    /// IN+/IN- pair: 0 = CH0-CH1, 1 = CH1-CH0, 2 = CH2-CH3, 3 = CH3-CH2
    Differential(u8),
}

impl Channel {
    fn command(self) -> Option<[u8; 3]> {
        let (single, sel) = match self {
            Channel::Single(ch) => (1u8, ch),
            Channel::Differential(pair) => (0u8, pair),
        };
        if sel > 3 {
            return None;
        }
        // D2 is always 0 on the 4-channel part
        Some([0x04 | (single << 1), (sel & 0x03) << 6, 0x00])
    }
}

pub struct Mcp3204<SPI> {
    spi: SPI,
    vref_mv: u16,
}

impl<SPI, E> Mcp3204<SPI>
where
    SPI: SpiDevice<Error = E>,
{
    pub fn new(spi: SPI, vref_mv: u16) -> Self {
        Self { spi, vref_mv }
    }

    pub fn set_vref_mv(&mut self, vref_mv: u16) {
        self.vref_mv = vref_mv;
    }

    pub fn read_raw(&mut self, channel: Channel) -> Result<u16, Error<E>> {
        let mut buf = channel.command().ok_or(Error::InvalidArgument)?;
        self.spi.transfer_in_place(&mut buf).map_err(Error::Bus)?;
        Ok((((buf[1] & 0x0F) as u16) << 8) | buf[2] as u16)
    }

    pub fn read_mv(&mut self, channel: Channel) -> Result<u16, Error<E>> {
        let raw = self.read_raw(channel)?;
        Ok(raw_to_mv(raw, self.vref_mv))
    }

    /// Average of `samples` conversions (at least one).
    pub fn read_averaged(&mut self, channel: Channel, samples: u8) -> Result<u16, Error<E>> {
        let n = samples.max(1) as u32;
        let mut acc = 0u32;
        for _ in 0..n {
            acc += self.read_raw(channel)? as u32;
        }
        Ok((acc / n) as u16)
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

pub fn raw_to_mv(raw: u16, vref_mv: u16) -> u16 {
    (raw as u32 * vref_mv as u32 / FULL_SCALE as u32) as u16
}
