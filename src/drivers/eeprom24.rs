// EEPROM click: 24C08 serial EEPROM (1 KiB, I2C)
//
// The 10-bit memory address is split: bits 9..8 select one of four 256-byte
// blocks through the low bits of the device address (0x50..0x53), bits 7..0
// travel as the word address. Writes go in 16-byte pages; the chip wraps
// inside a page, so longer writes are split on page boundaries. After each
// page the chip ignores its address until the internal write cycle ends
// (tWR = 5 ms max); we poll for the acknowledge instead of sleeping blindly.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::debug;

use crate::Error;

/// Device address of block 0 with A2 tied low.
pub const BASE_ADDR: u8 = 0x50;
pub const CAPACITY: usize = 1024;
pub const PAGE_SIZE: usize = 16;
const BLOCK_SIZE: usize = 256;

const POLL_INTERVAL_US: u32 = 100;
// 10 ms, twice the datasheet tWR
const MAX_POLLS: u32 = 100;

pub struct Eeprom24<I2C> {
    i2c: I2C,
    base: u8,
}

impl<I2C, E> Eeprom24<I2C>
where
    I2C: I2c<Error = E>,
{
    /// `a2` is the level of the A2 address pin (jumper on the click).
    pub fn new(i2c: I2C, a2: bool) -> Self {
        Self {
            i2c,
            base: BASE_ADDR | ((a2 as u8) << 2),
        }
    }

    fn device_address(&self, address: usize) -> u8 {
        self.base | ((address / BLOCK_SIZE) as u8 & 0x03)
    }

    fn check_range(address: usize, len: usize) -> Result<(), Error<E>> {
        match address.checked_add(len) {
            Some(end) if end <= CAPACITY => Ok(()),
            _ => Err(Error::InvalidArgument),
        }
    }

    pub fn read_byte(&mut self, address: usize) -> Result<u8, Error<E>> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    /// Sequential read; split per block since each block is its own device address.
    pub fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Error<E>> {
        Self::check_range(address, buf.len())?;

        let mut address = address;
        let mut done = 0;
        while done < buf.len() {
            let in_block = BLOCK_SIZE - address % BLOCK_SIZE;
            let n = in_block.min(buf.len() - done);
            self.i2c
                .write_read(
                    self.device_address(address),
                    &[(address % BLOCK_SIZE) as u8],
                    &mut buf[done..done + n],
                )
                .map_err(Error::Bus)?;
            address += n;
            done += n;
        }
        Ok(())
    }

    pub fn write_byte(&mut self, address: usize, value: u8, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.write(address, &[value], delay)
    }

    /// Write `data`, one page at a time, waiting out each write cycle.
    pub fn write(&mut self, address: usize, data: &[u8], delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        Self::check_range(address, data.len())?;

        let mut address = address;
        let mut rest = data;
        while !rest.is_empty() {
            let in_page = PAGE_SIZE - address % PAGE_SIZE;
            let (chunk, tail) = rest.split_at(in_page.min(rest.len()));

            let mut frame = [0u8; 1 + PAGE_SIZE];
            frame[0] = (address % BLOCK_SIZE) as u8;
            frame[1..=chunk.len()].copy_from_slice(chunk);
            let device = self.device_address(address);
            self.i2c
                .write(device, &frame[..=chunk.len()])
                .map_err(Error::Bus)?;
            self.wait_ready(device, delay)?;

            address += chunk.len();
            rest = tail;
        }
        Ok(())
    }

    /// Set every byte to `value`.
    pub fn fill(&mut self, value: u8, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let page = [value; PAGE_SIZE];
        for address in (0..CAPACITY).step_by(PAGE_SIZE) {
            self.write(address, &page, delay)?;
        }
        Ok(())
    }

    // acknowledge polling: the chip NAKs its address while programming
    fn wait_ready(&mut self, device: u8, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        for poll in 0..MAX_POLLS {
            if self.i2c.write(device, &[]).is_ok() {
                debug!("24C08: write cycle done after {} polls", poll);
                return Ok(());
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
        Err(Error::Timeout)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
