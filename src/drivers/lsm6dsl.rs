//! 6DOF IMU click: ST LSM6DSL accelerometer + gyroscope
//!
//! Driven over I2C (SDO/SA0 selects 0x6A or 0x6B). Block data update and
//! register auto-increment are enabled at init so a single burst read
//! returns a coherent gyro+accel sample.
//!
//! Sensitivities (datasheet table 3) are kept in micro-units per LSB so the
//! conversions stay in integer math.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use crate::Error;
use crate::bus::I2cRegisters;

pub const ADDR_PRIMARY: u8 = 0x6B;
pub const ADDR_SECONDARY: u8 = 0x6A;

pub const WHO_AM_I_VALUE: u8 = 0x6A;

mod reg {
    pub const WHO_AM_I: u8 = 0x0F;
    pub const CTRL1_XL: u8 = 0x10;
    pub const CTRL2_G: u8 = 0x11;
    pub const CTRL3_C: u8 = 0x12;
    pub const STATUS: u8 = 0x1E;
    pub const OUT_TEMP_L: u8 = 0x20;
    pub const OUTX_L_G: u8 = 0x22;
    pub const OUTX_L_XL: u8 = 0x28;
}

const CTRL3_SW_RESET: u8 = 1 << 0;
const CTRL3_IF_INC: u8 = 1 << 2;
const CTRL3_BDU: u8 = 1 << 6;

const STATUS_XLDA: u8 = 1 << 0;
const STATUS_GDA: u8 = 1 << 1;
const STATUS_TDA: u8 = 1 << 2;

/// Output data rate shared by accel and gyro (ODR_XL / ODR_G field).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DataRate {
    PowerDown = 0x0,
    Hz12_5 = 0x1,
    Hz26 = 0x2,
    Hz52 = 0x3,
    #[default]
    Hz104 = 0x4,
    Hz208 = 0x5,
    Hz416 = 0x6,
    Hz833 = 0x7,
    Hz1660 = 0x8,
    Hz3330 = 0x9,
    Hz6660 = 0xA,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccelRange {
    #[default]
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    // FS_XL encoding is not monotonic: 00=2g 01=16g 10=4g 11=8g
    fn bits(self) -> u8 {
        match self {
            AccelRange::G2 => 0b00,
            AccelRange::G16 => 0b01,
            AccelRange::G4 => 0b10,
            AccelRange::G8 => 0b11,
        }
    }

    /// micro-g per LSB
    pub fn sensitivity_ug(self) -> i32 {
        match self {
            AccelRange::G2 => 61,
            AccelRange::G4 => 122,
            AccelRange::G8 => 244,
            AccelRange::G16 => 488,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GyroRange {
    Dps125,
    #[default]
    Dps250,
    Dps500,
    Dps1000,
    Dps2000,
}

impl GyroRange {
    // FS_G[3:2] plus FS_125 at bit 1
    fn bits(self) -> u8 {
        match self {
            GyroRange::Dps125 => 0b001,
            GyroRange::Dps250 => 0b000,
            GyroRange::Dps500 => 0b010,
            GyroRange::Dps1000 => 0b100,
            GyroRange::Dps2000 => 0b110,
        }
    }

    /// micro-dps per LSB
    pub fn sensitivity_udps(self) -> i32 {
        match self {
            GyroRange::Dps125 => 4_375,
            GyroRange::Dps250 => 8_750,
            GyroRange::Dps500 => 17_500,
            GyroRange::Dps1000 => 35_000,
            GyroRange::Dps2000 => 70_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub accel_rate: DataRate,
    pub accel_range: AccelRange,
    pub gyro_rate: DataRate,
    pub gyro_range: GyroRange,
}

impl Config {
    pub fn with_accel(mut self, rate: DataRate, range: AccelRange) -> Self {
        self.accel_rate = rate;
        self.accel_range = range;
        self
    }

    pub fn with_gyro(mut self, rate: DataRate, range: GyroRange) -> Self {
        self.gyro_rate = rate;
        self.gyro_range = range;
        self
    }

    fn ctrl1_xl(&self) -> u8 {
        ((self.accel_rate as u8) << 4) | (self.accel_range.bits() << 2)
    }

    fn ctrl2_g(&self) -> u8 {
        ((self.gyro_rate as u8) << 4) | (self.gyro_range.bits() << 1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vector {
    fn from_le(b: &[u8]) -> Self {
        Self {
            x: i16::from_le_bytes([b[0], b[1]]) as i32,
            y: i16::from_le_bytes([b[2], b[3]]) as i32,
            z: i16::from_le_bytes([b[4], b[5]]) as i32,
        }
    }

    fn scaled(self, micro_per_lsb: i32) -> Self {
        Self {
            x: self.x * micro_per_lsb / 1000,
            y: self.y * micro_per_lsb / 1000,
            z: self.z * micro_per_lsb / 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataReady {
    pub accel: bool,
    pub gyro: bool,
    pub temperature: bool,
}

pub struct Lsm6dsl<I2C> {
    regs: I2cRegisters<I2C>,
    config: Config,
}

impl<I2C, E> Lsm6dsl<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8, config: Config) -> Self {
        Self {
            regs: I2cRegisters::new(i2c, address),
            config,
        }
    }

    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let id = self.regs.read_reg(reg::WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            return Err(Error::InvalidDeviceId(id));
        }

        // SW_RESET self-clears within 50us
        self.regs.write_reg(reg::CTRL3_C, CTRL3_SW_RESET)?;
        delay.delay_us(100);

        self.regs.write_reg(reg::CTRL3_C, CTRL3_BDU | CTRL3_IF_INC)?;
        self.apply_config()?;
        info!("LSM6DSL ready at 0x{:02X}", self.regs.address());
        Ok(())
    }

    pub fn set_config(&mut self, config: Config) -> Result<(), Error<E>> {
        self.config = config;
        self.apply_config()
    }

    fn apply_config(&mut self) -> Result<(), Error<E>> {
        self.regs.write_reg(reg::CTRL1_XL, self.config.ctrl1_xl())?;
        self.regs.write_reg(reg::CTRL2_G, self.config.ctrl2_g())
    }

    pub fn data_ready(&mut self) -> Result<DataReady, Error<E>> {
        let s = self.regs.read_reg(reg::STATUS)?;
        Ok(DataReady {
            accel: s & STATUS_XLDA != 0,
            gyro: s & STATUS_GDA != 0,
            temperature: s & STATUS_TDA != 0,
        })
    }

    pub fn accel_raw(&mut self) -> Result<Vector, Error<E>> {
        let mut b = [0u8; 6];
        self.regs.read_regs(reg::OUTX_L_XL, &mut b)?;
        Ok(Vector::from_le(&b))
    }

    pub fn gyro_raw(&mut self) -> Result<Vector, Error<E>> {
        let mut b = [0u8; 6];
        self.regs.read_regs(reg::OUTX_L_G, &mut b)?;
        Ok(Vector::from_le(&b))
    }

    /// Acceleration in milli-g.
    pub fn accel_mg(&mut self) -> Result<Vector, Error<E>> {
        Ok(self.accel_raw()?.scaled(self.config.accel_range.sensitivity_ug()))
    }

    /// Angular rate in milli-dps.
    pub fn gyro_mdps(&mut self) -> Result<Vector, Error<E>> {
        Ok(self.gyro_raw()?.scaled(self.config.gyro_range.sensitivity_udps()))
    }

    /// Gyro then accel (milli-dps, milli-g) from one burst.
    pub fn motion(&mut self) -> Result<(Vector, Vector), Error<E>> {
        let mut b = [0u8; 12];
        self.regs.read_regs(reg::OUTX_L_G, &mut b)?;
        let gyro = Vector::from_le(&b[..6]).scaled(self.config.gyro_range.sensitivity_udps());
        let accel = Vector::from_le(&b[6..]).scaled(self.config.accel_range.sensitivity_ug());
        Ok((gyro, accel))
    }

    /// Die temperature in milli-degC: 256 LSB/degC, 0 = 25 degC.
    pub fn temperature_mc(&mut self) -> Result<i32, Error<E>> {
        let mut b = [0u8; 2];
        self.regs.read_regs(reg::OUT_TEMP_L, &mut b)?;
        let raw = i16::from_le_bytes(b) as i32;
        Ok(25_000 + raw * 1000 / 256)
    }

    pub fn release(self) -> I2C {
        self.regs.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockI2c, NoopDelay};

    fn imu() -> MockI2c {
        let mut i2c = MockI2c::new().with_device(ADDR_PRIMARY);
        i2c.set_reg(ADDR_PRIMARY, reg::WHO_AM_I, WHO_AM_I_VALUE);
        i2c
    }

    #[test]
    fn init_programs_control_registers() {
        let config = Config::default()
            .with_accel(DataRate::Hz416, AccelRange::G4)
            .with_gyro(DataRate::Hz208, GyroRange::Dps2000);
        let mut dev = Lsm6dsl::new(imu(), ADDR_PRIMARY, config);
        dev.init(&mut NoopDelay::new()).unwrap();

        let i2c = dev.release();
        assert_eq!(i2c.reg(ADDR_PRIMARY, reg::CTRL1_XL), 0x68);
        assert_eq!(i2c.reg(ADDR_PRIMARY, reg::CTRL2_G), 0x5C);
        assert_eq!(i2c.reg(ADDR_PRIMARY, reg::CTRL3_C), CTRL3_BDU | CTRL3_IF_INC);
    }

    #[test]
    fn gyro_125_dps_uses_fs125_bit() {
        let config = Config::default().with_gyro(DataRate::Hz104, GyroRange::Dps125);
        assert_eq!(config.ctrl2_g(), 0x42);
    }

    #[test]
    fn init_rejects_wrong_id() {
        let mut i2c = imu();
        i2c.set_reg(ADDR_PRIMARY, reg::WHO_AM_I, 0x69);
        let mut dev = Lsm6dsl::new(i2c, ADDR_PRIMARY, Config::default());
        assert_eq!(
            dev.init(&mut NoopDelay::new()),
            Err(Error::InvalidDeviceId(0x69))
        );
    }

    #[test]
    fn accel_one_g_on_z() {
        let mut i2c = imu();
        // +1 g at 2 g full scale = 16393 LSB
        let z = 16_393i16.to_le_bytes();
        i2c.set_regs(ADDR_PRIMARY, reg::OUTX_L_XL, &[0, 0, 0, 0, z[0], z[1]]);
        let mut dev = Lsm6dsl::new(i2c, ADDR_PRIMARY, Config::default());

        let a = dev.accel_mg().unwrap();
        assert_eq!(a, Vector { x: 0, y: 0, z: 999 });
    }

    #[test]
    fn motion_burst_splits_gyro_and_accel() {
        let mut i2c = imu();
        let g = (-1000i16).to_le_bytes();
        let a = 8_196i16.to_le_bytes();
        i2c.set_regs(
            ADDR_PRIMARY,
            reg::OUTX_L_G,
            &[g[0], g[1], 0, 0, 0, 0, a[0], a[1], 0, 0, 0, 0],
        );
        let mut dev = Lsm6dsl::new(i2c, ADDR_PRIMARY, Config::default());

        let (gyro, accel) = dev.motion().unwrap();
        assert_eq!(gyro.x, -8750);
        assert_eq!(accel.x, 499);
    }

    #[test]
    fn temperature_offset() {
        let mut i2c = imu();
        let t = 512i16.to_le_bytes();
        i2c.set_regs(ADDR_PRIMARY, reg::OUT_TEMP_L, &t);
        let mut dev = Lsm6dsl::new(i2c, ADDR_PRIMARY, Config::default());
        assert_eq!(dev.temperature_mc().unwrap(), 27_000);
    }

    #[test]
    fn status_flags() {
        let mut i2c = imu();
        i2c.set_reg(ADDR_PRIMARY, reg::STATUS, STATUS_XLDA | STATUS_TDA);
        let mut dev = Lsm6dsl::new(i2c, ADDR_PRIMARY, Config::default());
        assert_eq!(
            dev.data_ready().unwrap(),
            DataReady {
                accel: true,
                gyro: false,
                temperature: true
            }
        );
    }
}
