// Thermo click (1-Wire): Maxim DS18B20 digital thermometer
//
// Conversion flow: select -> CONVERT T (0x44) -> poll read slots until the
// device returns 1 -> select -> READ SCRATCHPAD (0xBE) -> 9 bytes, the
// last being CRC-8/Maxim over the first eight.
//
// Busy polling through read slots only works with the sensor on external
// VDD; in parasite-power mode wait `Resolution::conversion_time_ms` instead.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use super::onewire::{OneWire, OneWireError, Rom};
use crate::Error;
use crate::crc::crc8_maxim;

pub const FAMILY_CODE: u8 = 0x28;

mod cmd {
    pub const CONVERT_T: u8 = 0x44;
    pub const WRITE_SCRATCHPAD: u8 = 0x4E;
    pub const READ_SCRATCHPAD: u8 = 0xBE;
    pub const COPY_SCRATCHPAD: u8 = 0x48;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    #[default]
    Bits12,
}

impl Resolution {
    fn config_byte(self) -> u8 {
        match self {
            Resolution::Bits9 => 0x1F,
            Resolution::Bits10 => 0x3F,
            Resolution::Bits11 => 0x5F,
            Resolution::Bits12 => 0x7F,
        }
    }

    fn from_config(config: u8) -> Self {
        match (config >> 5) & 0x03 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Undefined low bits of the temperature word at this resolution.
    fn undefined_bits(self) -> i16 {
        match self {
            Resolution::Bits9 => 0x07,
            Resolution::Bits10 => 0x03,
            Resolution::Bits11 => 0x01,
            Resolution::Bits12 => 0x00,
        }
    }

    pub fn conversion_time_ms(self) -> u32 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scratchpad {
    /// 1/16 degC, two's complement
    pub raw_temperature: i16,
    pub alarm_high: i8,
    pub alarm_low: i8,
    pub resolution: Resolution,
}

impl Scratchpad {
    pub fn from_bytes(b: &[u8; 9]) -> Result<Self, OneWireError> {
        if crc8_maxim(&b[..8]) != b[8] {
            return Err(OneWireError::Crc);
        }
        Ok(Self {
            raw_temperature: i16::from_le_bytes([b[0], b[1]]),
            alarm_high: b[2] as i8,
            alarm_low: b[3] as i8,
            resolution: Resolution::from_config(b[4]),
        })
    }

    /// Temperature in milli-degC with the undefined low bits cleared.
    pub fn millicelsius(&self) -> i32 {
        let raw = self.raw_temperature & !self.resolution.undefined_bits();
        raw as i32 * 1000 / 16
    }
}

fn map_bus(e: OneWireError) -> Error<OneWireError> {
    match e {
        OneWireError::Pin => Error::Pin,
        OneWireError::Crc => Error::Crc,
        OneWireError::NoPresence => Error::Bus(e),
    }
}

pub struct Ds18b20<PIN> {
    bus: OneWire<PIN>,
    rom: Option<Rom>,
    converting: bool,
}

impl<PIN> Ds18b20<PIN>
where
    PIN: InputPin + OutputPin,
{
    /// `rom = None` addresses the sensor with SKIP ROM (single drop bus).
    pub fn new(bus: OneWire<PIN>, rom: Option<Rom>) -> Self {
        Self {
            bus,
            rom,
            converting: false,
        }
    }

    /// Address the sensor by the ROM code read from the bus (single drop).
    pub fn discover(mut bus: OneWire<PIN>, delay: &mut impl DelayNs) -> Result<Self, Error<OneWireError>> {
        let rom = bus.read_rom(delay).map_err(map_bus)?;
        if rom.family() != FAMILY_CODE {
            return Err(Error::InvalidDeviceId(rom.family()));
        }
        Ok(Self::new(bus, Some(rom)))
    }

    pub fn rom(&self) -> Option<&Rom> {
        self.rom.as_ref()
    }

    fn select(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<OneWireError>> {
        self.bus.select(self.rom.as_ref(), delay).map_err(map_bus)
    }

    pub fn start_conversion(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<OneWireError>> {
        self.select(delay)?;
        self.bus.write_byte(cmd::CONVERT_T, delay).map_err(map_bus)?;
        self.converting = true;
        Ok(())
    }

    /// Temperature in milli-degC. Starts a conversion if none is running and
    /// returns `WouldBlock` until the sensor reports completion.
    pub fn read_temperature(&mut self, delay: &mut impl DelayNs) -> nb::Result<i32, Error<OneWireError>> {
        if !self.converting {
            self.start_conversion(delay)?;
            return Err(nb::Error::WouldBlock);
        }
        if !self.bus.read_bit(delay).map_err(map_bus)? {
            return Err(nb::Error::WouldBlock);
        }
        self.converting = false;
        Ok(self.read_scratchpad(delay)?.millicelsius())
    }

    pub fn read_scratchpad(&mut self, delay: &mut impl DelayNs) -> Result<Scratchpad, Error<OneWireError>> {
        self.select(delay)?;
        self.bus
            .write_byte(cmd::READ_SCRATCHPAD, delay)
            .map_err(map_bus)?;
        let mut bytes = [0u8; 9];
        self.bus.read_bytes(&mut bytes, delay).map_err(map_bus)?;
        Scratchpad::from_bytes(&bytes).map_err(|e| {
            warn!("DS18B20: scratchpad CRC mismatch");
            map_bus(e)
        })
    }

    /// Write alarm thresholds and resolution; `persist` copies them to EEPROM.
    pub fn configure(
        &mut self,
        alarm_high: i8,
        alarm_low: i8,
        resolution: Resolution,
        persist: bool,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<OneWireError>> {
        self.select(delay)?;
        self.bus
            .write_bytes(
                &[
                    cmd::WRITE_SCRATCHPAD,
                    alarm_high as u8,
                    alarm_low as u8,
                    resolution.config_byte(),
                ],
                delay,
            )
            .map_err(map_bus)?;

        if persist {
            self.select(delay)?;
            self.bus
                .write_byte(cmd::COPY_SCRATCHPAD, delay)
                .map_err(map_bus)?;
            // EEPROM write, datasheet tWR max
            delay.delay_ms(10);
        }
        Ok(())
    }

    /// Change resolution, keeping the alarm thresholds.
    pub fn set_resolution(&mut self, resolution: Resolution, delay: &mut impl DelayNs) -> Result<(), Error<OneWireError>> {
        let sp = self.read_scratchpad(delay)?;
        self.configure(sp.alarm_high, sp.alarm_low, resolution, false, delay)
    }

    pub fn release(self) -> OneWire<PIN> {
        self.bus
    }
}
