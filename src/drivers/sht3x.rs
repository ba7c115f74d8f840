// SHT click: Sensirion SHT3x-DIS humidity and temperature sensor (I2C)
//
// Command-word protocol: every command is 16 bits big-endian, every 16-bit
// word read back is followed by its CRC-8 (poly 0x31, init 0xFF).
// Single-shot mode without clock stretching: send the measurement
// command, wait out the conversion, then read 6 bytes
//   T[15:8] T[7:0] CRC  RH[15:8] RH[7:0] CRC
// T  = -45 + 175 * raw / 65535   (degC)
// RH = 100 * raw / 65535          (%)

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::Error;
use crate::crc::crc8_sensirion;

pub const ADDR_PRIMARY: u8 = 0x44;
pub const ADDR_SECONDARY: u8 = 0x45;

mod cmd {
    pub const MEASURE_HIGH: u16 = 0x2400;
    pub const MEASURE_MEDIUM: u16 = 0x240B;
    pub const MEASURE_LOW: u16 = 0x2416;
    pub const SOFT_RESET: u16 = 0x30A2;
    pub const HEATER_ON: u16 = 0x306D;
    pub const HEATER_OFF: u16 = 0x3066;
    pub const READ_STATUS: u16 = 0xF32D;
    pub const CLEAR_STATUS: u16 = 0x3041;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeatability {
    #[default]
    High,
    Medium,
    Low,
}

impl Repeatability {
    fn command(self) -> u16 {
        match self {
            Repeatability::High => cmd::MEASURE_HIGH,
            Repeatability::Medium => cmd::MEASURE_MEDIUM,
            Repeatability::Low => cmd::MEASURE_LOW,
        }
    }

    // datasheet table 4, max durations
    fn duration_ms(self) -> u32 {
        match self {
            Repeatability::High => 16,
            Repeatability::Medium => 7,
            Repeatability::Low => 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    /// 0.01 degC
    pub temperature: i32,
    /// 0.01 %RH
    pub humidity: u32,
}

impl Measurement {
    pub fn from_raw(raw_t: u16, raw_rh: u16) -> Self {
        Self {
            temperature: -4500 + (17_500 * raw_t as i32) / 65_535,
            humidity: (10_000 * raw_rh as u32) / 65_535,
        }
    }

    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn humidity_percent(&self) -> f32 {
        self.humidity as f32 / 100.0
    }
}

/// Status register bits (datasheet table 17).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status(pub u16);

impl Status {
    pub fn alert_pending(&self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub fn heater_on(&self) -> bool {
        self.0 & (1 << 13) != 0
    }

    pub fn reset_detected(&self) -> bool {
        self.0 & (1 << 4) != 0
    }

    pub fn last_command_failed(&self) -> bool {
        self.0 & (1 << 1) != 0
    }

    pub fn write_checksum_failed(&self) -> bool {
        self.0 & 1 != 0
    }
}

pub struct Sht3x<I2C> {
    i2c: I2C,
    address: u8,
    repeatability: Repeatability,
}

impl<I2C, E> Sht3x<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            repeatability: Repeatability::default(),
        }
    }

    pub fn with_repeatability(mut self, repeatability: Repeatability) -> Self {
        self.repeatability = repeatability;
        self
    }

    fn command(&mut self, command: u16) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &command.to_be_bytes())
            .map_err(Error::Bus)
    }

    /// Read `N` CRC-protected words.
    fn read_words<const N: usize>(&mut self, buf: &mut [u8]) -> Result<[u16; N], Error<E>> {
        self.i2c.read(self.address, buf).map_err(Error::Bus)?;
        let mut words = [0u16; N];
        for (i, chunk) in buf.chunks_exact(3).take(N).enumerate() {
            if crc8_sensirion(&chunk[..2]) != chunk[2] {
                warn!("SHT3x: CRC mismatch on word {}", i);
                return Err(Error::Crc);
            }
            words[i] = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(words)
    }

    pub fn soft_reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.command(cmd::SOFT_RESET)?;
        delay.delay_ms(2);
        Ok(())
    }

    pub fn measure(&mut self, delay: &mut impl DelayNs) -> Result<Measurement, Error<E>> {
        let (t, rh) = self.measure_raw(delay)?;
        Ok(Measurement::from_raw(t, rh))
    }

    pub fn measure_raw(&mut self, delay: &mut impl DelayNs) -> Result<(u16, u16), Error<E>> {
        self.command(self.repeatability.command())?;
        delay.delay_ms(self.repeatability.duration_ms());
        let mut buf = [0u8; 6];
        let [t, rh] = self.read_words::<2>(&mut buf)?;
        Ok((t, rh))
    }

    pub fn set_heater(&mut self, on: bool) -> Result<(), Error<E>> {
        self.command(if on { cmd::HEATER_ON } else { cmd::HEATER_OFF })
    }

    pub fn status(&mut self) -> Result<Status, Error<E>> {
        self.command(cmd::READ_STATUS)?;
        let mut buf = [0u8; 3];
        let [word] = self.read_words::<1>(&mut buf)?;
        Ok(Status(word))
    }

    pub fn clear_status(&mut self) -> Result<(), Error<E>> {
        self.command(cmd::CLEAR_STATUS)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
