//! Weather click: Bosch BME280 humidity / pressure / temperature sensor
//!
//! I2C only (SDO strapped to GND on the click, address 0x76; 0x77 with the
//! jumper moved). Compensation uses the integer reference formulas from
//! the BME280 datasheet, section 4.2.3, so results match Bosch's own
//! driver bit for bit:
//!
//! - temperature: 0.01 degC, plus `t_fine` carried into the other two
//! - pressure: unsigned Q24.8 Pa, 64-bit intermediate
//! - humidity: unsigned Q22.10 %RH, clamped to 0..=100 %

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::Error;
use crate::bus::I2cRegisters;

pub const ADDR_PRIMARY: u8 = 0x76;
pub const ADDR_SECONDARY: u8 = 0x77;

pub const CHIP_ID: u8 = 0x60;

mod reg {
    pub const CALIB_00: u8 = 0x88; // 0x88..=0xA1, T1..P9 + H1
    pub const CHIP_ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const CALIB_26: u8 = 0xE1; // 0xE1..=0xE7, H2..H6
    pub const CTRL_HUM: u8 = 0xF2;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const PRESS_MSB: u8 = 0xF7; // 0xF7..=0xFE, P[19:0] T[19:0] H[15:0]
}

const RESET_WORD: u8 = 0xB6;
const STATUS_MEASURING: u8 = 1 << 3;
const STATUS_IM_UPDATE: u8 = 1 << 0;

const NVM_COPY_POLLS: u32 = 10;
// worst case for 16x oversampling on all three channels is ~113 ms
const MEASURE_POLLS: u32 = 50;
const POLL_INTERVAL_MS: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    Skip = 0,
    #[default]
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    #[default]
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Standby {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    #[default]
    Ms1000 = 5,
    Ms10 = 6,
    Ms20 = 7,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Sleep = 0,
    /// One measurement per `measure()` call, then back to sleep.
    #[default]
    Forced = 1,
    Normal = 3,
}

/// Weather-monitoring defaults (datasheet 3.5.1): 1x everywhere, no filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub humidity: Oversampling,
    pub pressure: Oversampling,
    pub temperature: Oversampling,
    pub filter: Filter,
    pub standby: Standby,
    pub mode: Mode,
}

impl Config {
    pub fn with_oversampling(
        mut self,
        humidity: Oversampling,
        pressure: Oversampling,
        temperature: Oversampling,
    ) -> Self {
        self.humidity = humidity;
        self.pressure = pressure;
        self.temperature = temperature;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_standby(mut self, standby: Standby) -> Self {
        self.standby = standby;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    fn ctrl_meas(&self, mode: Mode) -> u8 {
        ((self.temperature as u8) << 5) | ((self.pressure as u8) << 2) | mode as u8
    }

    fn config_reg(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }
}

/// Factory trimming parameters (NVM), read once at init.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// `tp` = 0x88..=0xA1 (26 bytes), `h` = 0xE1..=0xE7 (7 bytes).
    pub fn from_registers(tp: &[u8; 26], h: &[u8; 7]) -> Self {
        let u16le = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16le = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        // H4 = E4[7:0] << 4 | E5[3:0], H5 = E6[7:0] << 4 | E5[7:4], both signed 12-bit
        let h4 = ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16;
        let h5 = ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16;

        Self {
            t1: u16le(0),
            t2: i16le(2),
            t3: i16le(4),
            p1: u16le(6),
            p2: i16le(8),
            p3: i16le(10),
            p4: i16le(12),
            p5: i16le(14),
            p6: i16le(16),
            p7: i16le(18),
            p8: i16le(20),
            p9: i16le(22),
            // tp[24] (0xA0) is reserved
            h1: tp[25],
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            h4,
            h5,
            h6: h[6] as i8,
        }
    }

    /// Returns (temperature in 0.01 degC, t_fine).
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        // i64 so caller-supplied trim values cannot overflow
        let adc_t = adc_t as i64;
        let t1 = self.t1 as i64;
        let var1 = (((adc_t >> 3) - (t1 << 1)) * self.t2 as i64) >> 11;
        let d = (adc_t >> 4) - t1;
        let var2 = (((d * d) >> 12) * self.t3 as i64) >> 14;
        let t_fine = (var1 + var2).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        (((t_fine as i64 * 5 + 128) >> 8) as i32, t_fine)
    }

    /// Pressure in Pa as unsigned Q24.8; 0 if the calibration is degenerate.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> u32 {
        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1 * var1 * self.p6 as i64;
        var2 += (var1 * self.p5 as i64) << 17;
        var2 += (self.p4 as i64) << 35;
        var1 = ((var1 * var1 * self.p3 as i64) >> 8) + ((var1 * self.p2 as i64) << 12);
        var1 = (((1i64 << 47) + var1) * self.p1 as i64) >> 33;
        if var1 == 0 {
            return 0;
        }

        let mut p = 1_048_576 - adc_p as i64;
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (self.p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
        var2 = (self.p8 as i64 * p) >> 19;
        p = ((p + var1 + var2) >> 8) + ((self.p7 as i64) << 4);
        p as u32
    }

    /// Relative humidity as unsigned Q22.10 %RH.
    pub fn compensate_humidity(&self, adc_h: i32, t_fine: i32) -> u32 {
        let mut v = t_fine - 76_800;
        v = (((adc_h << 14) - ((self.h4 as i32) << 20) - (self.h5 as i32 * v) + 16_384) >> 15)
            * (((((((v * self.h6 as i32) >> 10) * (((v * self.h3 as i32) >> 11) + 32_768))
                >> 10)
                + 2_097_152)
                * self.h2 as i32
                + 8192)
                >> 14);
        v -= ((((v >> 15) * (v >> 15)) >> 7) * self.h1 as i32) >> 4;
        v = v.clamp(0, 419_430_400);
        (v >> 12) as u32
    }
}

/// One compensated sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    /// 0.01 degC
    pub temperature: i32,
    /// Pa, Q24.8
    pub pressure: u32,
    /// %RH, Q22.10
    pub humidity: u32,
}

impl Measurement {
    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn pressure_pa(&self) -> f32 {
        self.pressure as f32 / 256.0
    }

    pub fn pressure_hpa(&self) -> f32 {
        self.pressure_pa() / 100.0
    }

    pub fn humidity_percent(&self) -> f32 {
        self.humidity as f32 / 1024.0
    }
}

/// Raw 20/20/16-bit ADC words from one burst read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
    pub humidity: i32,
}

impl RawSample {
    pub fn from_registers(b: &[u8; 8]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            ((msb as i32) << 12) | ((lsb as i32) << 4) | ((xlsb as i32) >> 4)
        };
        Self {
            pressure: adc20(b[0], b[1], b[2]),
            temperature: adc20(b[3], b[4], b[5]),
            humidity: ((b[6] as i32) << 8) | b[7] as i32,
        }
    }
}

pub struct Bme280<I2C> {
    regs: I2cRegisters<I2C>,
    config: Config,
    calibration: Option<Calibration>,
}

impl<I2C, E> Bme280<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8, config: Config) -> Self {
        Self {
            regs: I2cRegisters::new(i2c, address),
            config,
            calibration: None,
        }
    }

    pub fn chip_id(&mut self) -> Result<u8, Error<E>> {
        self.regs.read_reg(reg::CHIP_ID)
    }

    pub fn soft_reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.regs.write_reg(reg::RESET, RESET_WORD)?;
        delay.delay_ms(2);
        Ok(())
    }

    /// Verify the id, reset, load trimming parameters, apply `config`.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let id = self.chip_id()?;
        if id != CHIP_ID {
            return Err(Error::InvalidDeviceId(id));
        }

        self.soft_reset(delay)?;
        self.wait_status_clear(STATUS_IM_UPDATE, NVM_COPY_POLLS, delay)?;

        let mut tp = [0u8; 26];
        let mut h = [0u8; 7];
        self.regs.read_regs(reg::CALIB_00, &mut tp)?;
        self.regs.read_regs(reg::CALIB_26, &mut h)?;
        let calibration = Calibration::from_registers(&tp, &h);
        debug!("BME280 calibration: {:?}", calibration);
        self.calibration = Some(calibration);

        self.apply_config()?;
        info!("BME280 ready at 0x{:02X}", self.regs.address());
        Ok(())
    }

    pub fn set_config(&mut self, config: Config) -> Result<(), Error<E>> {
        self.config = config;
        self.apply_config()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    // ctrl_hum only latches on the following ctrl_meas write (datasheet 5.4.3);
    // config is ignored in normal mode, so write it while asleep
    fn apply_config(&mut self) -> Result<(), Error<E>> {
        self.regs
            .write_reg(reg::CTRL_MEAS, self.config.ctrl_meas(Mode::Sleep))?;
        self.regs.write_reg(reg::CONFIG, self.config.config_reg())?;
        self.regs
            .write_reg(reg::CTRL_HUM, self.config.humidity as u8 & 0x07)?;
        let mode = match self.config.mode {
            Mode::Normal => Mode::Normal,
            _ => Mode::Sleep,
        };
        self.regs
            .write_reg(reg::CTRL_MEAS, self.config.ctrl_meas(mode))
    }

    pub fn read_raw(&mut self) -> Result<RawSample, Error<E>> {
        let mut buf = [0u8; 8];
        self.regs.read_regs(reg::PRESS_MSB, &mut buf)?;
        Ok(RawSample::from_registers(&buf))
    }

    /// Take one compensated sample. In forced mode this starts a conversion
    /// and waits for it; in normal mode it reads the latest result.
    pub fn measure(&mut self, delay: &mut impl DelayNs) -> Result<Measurement, Error<E>> {
        let calibration = self.calibration.ok_or(Error::NotInitialized)?;

        if self.config.mode == Mode::Forced {
            self.regs
                .write_reg(reg::CTRL_MEAS, self.config.ctrl_meas(Mode::Forced))?;
            delay.delay_ms(POLL_INTERVAL_MS);
            self.wait_status_clear(STATUS_MEASURING, MEASURE_POLLS, delay)?;
        }

        let raw = self.read_raw()?;
        let (temperature, t_fine) = calibration.compensate_temperature(raw.temperature);
        let pressure = if self.config.pressure == Oversampling::Skip {
            0
        } else {
            calibration.compensate_pressure(raw.pressure, t_fine)
        };
        let humidity = if self.config.humidity == Oversampling::Skip {
            0
        } else {
            calibration.compensate_humidity(raw.humidity, t_fine)
        };

        Ok(Measurement {
            temperature,
            pressure,
            humidity,
        })
    }

    fn wait_status_clear(
        &mut self,
        mask: u8,
        polls: u32,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>> {
        for _ in 0..polls {
            if self.regs.read_reg(reg::STATUS)? & mask == 0 {
                return Ok(());
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }
        Err(Error::Timeout)
    }

    pub fn release(self) -> I2C {
        self.regs.release()
    }
}
