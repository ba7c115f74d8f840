// Register access over I2C
//
// Most I2C clicks expose a flat 8-bit register map with address
// auto-increment on burst reads; this covers all of them. Chips with
// command-word protocols (SHT3x, EEPROM word addresses) talk to the bus
// directly instead.

use embedded_hal::i2c::I2c;

use crate::Error;

pub struct I2cRegisters<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> I2cRegisters<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8, Error<E>> {
        let mut buf = [0u8; 1];
        self.read_regs(reg, &mut buf)?;
        Ok(buf[0])
    }

    /// Burst read starting at `reg`; the chip must auto-increment.
    pub fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(self.address, &[reg], buf)
            .map_err(Error::Bus)
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(Error::Bus)
    }

    /// Read-modify-write: bits set in `mask` take their value from `value`.
    pub fn modify_reg(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), Error<E>> {
        let old = self.read_reg(reg)?;
        let new = (old & !mask) | (value & mask);
        if new != old {
            self.write_reg(reg, new)?;
        }
        Ok(())
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}
