// microSD click: SD/SDHC card in SPI mode
//
// Command frame (6 bytes): 0x40 | index, 32-bit argument BE, CRC7 << 1 | 1.
// The card answers after 0..8 filler bytes with R1 (bit 7 clear); R3/R7
// carry four more bytes. Data blocks are preceded by the 0xFE start token
// and followed by a 16-bit CRC we neither check nor send (CRC is off in SPI
// mode except for CMD0/CMD8).
//
// Bring-up (Physical Layer Simplified Spec, 7.2.1):
//   >= 74 clocks with CS high, CMD0 -> idle, CMD8 (v2 probe), repeat
//   CMD55 + ACMD41 until idle clears, CMD58 for CCS, CMD16 on byte-addressed
//   cards. Run it at 100..400 kHz; the bus can be sped up afterwards.
//
// CS stays low across a command and its data phase, so this drives the raw
// bus plus its own chip select rather than an `SpiDevice`.

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use embedded_sdmmc::{Block, BlockCount, BlockDevice, BlockIdx};
use log::{debug, info, warn};

use crate::Error;
use crate::crc::crc7_sd;

pub const BLOCK_LEN: usize = 512;

mod cmd {
    pub const GO_IDLE_STATE: u8 = 0;
    pub const SEND_IF_COND: u8 = 8;
    pub const SEND_CSD: u8 = 9;
    pub const SET_BLOCKLEN: u8 = 16;
    pub const READ_SINGLE_BLOCK: u8 = 17;
    pub const WRITE_BLOCK: u8 = 24;
    pub const APP_CMD: u8 = 55;
    pub const READ_OCR: u8 = 58;
    pub const SD_SEND_OP_COND: u8 = 41;
}

const R1_IDLE: u8 = 0x01;
const R1_ILLEGAL_COMMAND: u8 = 0x04;

const DATA_START_TOKEN: u8 = 0xFE;
const DATA_ACCEPTED: u8 = 0x05;
const DATA_CRC_ERROR: u8 = 0x0B;

// CMD8 argument: 2.7-3.6 V, check pattern 0xAA
const IF_COND_ARG: u32 = 0x1AA;
const ACMD41_HCS: u32 = 1 << 30;
const OCR_CCS: u8 = 0x40;

const CMD0_RETRIES: u32 = 10;
// ACMD41 can take up to 1 s
const INIT_POLLS: u32 = 1_000;
const INIT_POLL_MS: u32 = 1;
// read access (100 ms) and write busy (250 ms) budgets, in 10 us polls
const READ_POLLS: u32 = 10_000;
const BUSY_POLLS: u32 = 25_000;
const POLL_US: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardType {
    /// Version 1.x standard capacity
    Sd1,
    /// Version 2.0+ standard capacity
    Sd2,
    /// SDHC/SDXC, block addressed
    Sdhc,
}

impl CardType {
    fn block_address(self, block: u32) -> u32 {
        match self {
            CardType::Sdhc => block,
            CardType::Sd1 | CardType::Sd2 => block * BLOCK_LEN as u32,
        }
    }
}

/// Number of 512-byte blocks described by a CSD register.
pub fn csd_block_count(csd: &[u8; 16]) -> Option<u32> {
    match csd[0] >> 6 {
        0 => {
            let read_bl_len = (csd[5] & 0x0F) as u32;
            let c_size = ((csd[6] as u32 & 0x03) << 10) | ((csd[7] as u32) << 2) | (csd[8] as u32 >> 6);
            let c_size_mult = ((csd[9] as u32 & 0x03) << 1) | (csd[10] as u32 >> 7);
            let bytes = ((c_size as u64) + 1) << (c_size_mult + 2 + read_bl_len);
            u32::try_from(bytes / BLOCK_LEN as u64).ok()
        }
        1 => {
            let c_size = ((csd[7] as u32 & 0x3F) << 16) | ((csd[8] as u32) << 8) | csd[9] as u32;
            Some((c_size + 1) * 1024)
        }
        _ => None,
    }
}

struct Inner<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    card: Option<CardType>,
}

impl<SPI, CS, D, E> Inner<SPI, CS, D>
where
    SPI: SpiBus<Error = E>,
    CS: OutputPin,
    D: DelayNs,
{
    fn select(&mut self) -> Result<(), Error<E>> {
        self.cs.set_low().map_err(Error::pin)
    }

    // one extra byte after CS goes high lets the card release MISO
    fn deselect(&mut self) -> Result<(), Error<E>> {
        self.spi.flush().map_err(Error::Bus)?;
        self.cs.set_high().map_err(Error::pin)?;
        self.read_byte()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Error<E>> {
        let mut b = [0xFF];
        self.spi.transfer_in_place(&mut b).map_err(Error::Bus)?;
        Ok(b[0])
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error<E>> {
        buf.fill(0xFF);
        self.spi.transfer_in_place(buf).map_err(Error::Bus)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        self.spi.write(bytes).map_err(Error::Bus)
    }

    /// Send one command frame with CS already low; returns R1.
    fn command(&mut self, index: u8, arg: u32) -> Result<u8, Error<E>> {
        let a = arg.to_be_bytes();
        let mut frame = [0x40 | index, a[0], a[1], a[2], a[3], 0];
        frame[5] = crc7_sd(&frame[..5]);
        self.write(&frame)?;

        for _ in 0..8 {
            let r1 = self.read_byte()?;
            if r1 & 0x80 == 0 {
                return Ok(r1);
            }
        }
        Err(Error::Timeout)
    }

    /// Select, send, and deselect again for commands without a data phase.
    fn command_only(&mut self, index: u8, arg: u32, extra: &mut [u8]) -> Result<u8, Error<E>> {
        self.select()?;
        let result = self.command(index, arg).and_then(|r1| {
            self.read_into(extra)?;
            Ok(r1)
        });
        self.deselect()?;
        result
    }

    fn wait_token(&mut self) -> Result<(), Error<E>> {
        for _ in 0..READ_POLLS {
            match self.read_byte()? {
                DATA_START_TOKEN => return Ok(()),
                0xFF => self.delay.delay_us(POLL_US),
                // data error token
                token => {
                    warn!("SD: read error token 0x{:02X}", token);
                    return Err(Error::InvalidResponse);
                }
            }
        }
        Err(Error::Timeout)
    }

    fn wait_not_busy(&mut self) -> Result<(), Error<E>> {
        for _ in 0..BUSY_POLLS {
            if self.read_byte()? == 0xFF {
                return Ok(());
            }
            self.delay.delay_us(POLL_US);
        }
        Err(Error::Timeout)
    }

    fn init(&mut self) -> Result<CardType, Error<E>> {
        self.card = None;
        self.cs.set_high().map_err(Error::pin)?;
        self.write(&[0xFF; 10])?;

        let mut idle = false;
        for _ in 0..CMD0_RETRIES {
            match self.command_only(cmd::GO_IDLE_STATE, 0, &mut []) {
                Ok(R1_IDLE) => {
                    idle = true;
                    break;
                }
                Ok(_) | Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
            self.delay.delay_ms(INIT_POLL_MS);
        }
        if !idle {
            warn!("SD: no card answered CMD0");
            return Err(Error::Timeout);
        }

        let mut r7 = [0u8; 4];
        let r1 = self.command_only(cmd::SEND_IF_COND, IF_COND_ARG, &mut r7)?;
        let v2 = if r1 & R1_ILLEGAL_COMMAND != 0 {
            false
        } else if r7[3] == (IF_COND_ARG & 0xFF) as u8 {
            true
        } else {
            return Err(Error::InvalidResponse);
        };

        let hcs = if v2 { ACMD41_HCS } else { 0 };
        let mut ready = false;
        for _ in 0..INIT_POLLS {
            self.command_only(cmd::APP_CMD, 0, &mut [])?;
            if self.command_only(cmd::SD_SEND_OP_COND, hcs, &mut [])? == 0 {
                ready = true;
                break;
            }
            self.delay.delay_ms(INIT_POLL_MS);
        }
        if !ready {
            return Err(Error::Timeout);
        }

        let card = if v2 {
            let mut ocr = [0u8; 4];
            if self.command_only(cmd::READ_OCR, 0, &mut ocr)? != 0 {
                return Err(Error::InvalidResponse);
            }
            if ocr[0] & OCR_CCS != 0 {
                CardType::Sdhc
            } else {
                CardType::Sd2
            }
        } else {
            CardType::Sd1
        };

        if card != CardType::Sdhc
            && self.command_only(cmd::SET_BLOCKLEN, BLOCK_LEN as u32, &mut [])? != 0
        {
            return Err(Error::InvalidResponse);
        }

        self.card = Some(card);
        Ok(card)
    }

    fn card(&self) -> Result<CardType, Error<E>> {
        self.card.ok_or(Error::NotInitialized)
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8; BLOCK_LEN]) -> Result<(), Error<E>> {
        let address = self.card()?.block_address(block);
        self.select()?;
        let result = self.read_data(cmd::READ_SINGLE_BLOCK, address, buf);
        self.deselect()?;
        result
    }

    fn read_data(&mut self, index: u8, arg: u32, buf: &mut [u8]) -> Result<(), Error<E>> {
        if self.command(index, arg)? != 0 {
            return Err(Error::InvalidResponse);
        }
        self.wait_token()?;
        self.read_into(buf)?;
        // CRC16, unchecked
        self.read_into(&mut [0u8; 2])
    }

    fn write_block(&mut self, block: u32, data: &[u8; BLOCK_LEN]) -> Result<(), Error<E>> {
        let address = self.card()?.block_address(block);
        self.select()?;
        let result = self.write_data(address, data);
        self.deselect()?;
        result
    }

    fn write_data(&mut self, address: u32, data: &[u8; BLOCK_LEN]) -> Result<(), Error<E>> {
        if self.command(cmd::WRITE_BLOCK, address)? != 0 {
            return Err(Error::InvalidResponse);
        }
        self.write(&[0xFF, DATA_START_TOKEN])?;
        self.write(data)?;
        self.write(&[0xFF, 0xFF])?;

        match self.read_byte()? & 0x1F {
            DATA_ACCEPTED => self.wait_not_busy(),
            DATA_CRC_ERROR => Err(Error::Crc),
            other => {
                warn!("SD: write rejected, data response 0x{:02X}", other);
                Err(Error::InvalidResponse)
            }
        }
    }

    fn read_csd(&mut self) -> Result<[u8; 16], Error<E>> {
        self.card()?;
        let mut csd = [0u8; 16];
        self.select()?;
        let result = self.read_data(cmd::SEND_CSD, 0, &mut csd);
        self.deselect()?;
        result?;
        if crc7_sd(&csd[..15]) != csd[15] {
            return Err(Error::Crc);
        }
        Ok(csd)
    }
}

/// SD card on a raw SPI bus with its own chip select.
///
/// Methods take `&self` so the card can serve as an
/// [`embedded_sdmmc::BlockDevice`].
pub struct MicroSd<SPI, CS, D> {
    inner: RefCell<Inner<SPI, CS, D>>,
}

impl<SPI, CS, D, E> MicroSd<SPI, CS, D>
where
    SPI: SpiBus<Error = E>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self {
            inner: RefCell::new(Inner {
                spi,
                cs,
                delay,
                card: None,
            }),
        }
    }

    pub fn init(&self) -> Result<CardType, Error<E>> {
        let card = self.inner.borrow_mut().init()?;
        info!("SD: {:?} card ready", card);
        Ok(card)
    }

    pub fn card_type(&self) -> Option<CardType> {
        self.inner.borrow().card
    }

    pub fn read_block(&self, block: u32, buf: &mut [u8; BLOCK_LEN]) -> Result<(), Error<E>> {
        self.inner.borrow_mut().read_block(block, buf)
    }

    pub fn write_block(&self, block: u32, data: &[u8; BLOCK_LEN]) -> Result<(), Error<E>> {
        self.inner.borrow_mut().write_block(block, data)
    }

    pub fn csd(&self) -> Result<[u8; 16], Error<E>> {
        self.inner.borrow_mut().read_csd()
    }

    pub fn num_blocks(&self) -> Result<u32, Error<E>> {
        let csd = self.csd()?;
        csd_block_count(&csd).ok_or(Error::InvalidResponse)
    }

    pub fn num_bytes(&self) -> Result<u64, Error<E>> {
        Ok(self.num_blocks()? as u64 * BLOCK_LEN as u64)
    }

    pub fn release(self) -> (SPI, CS, D) {
        let inner = self.inner.into_inner();
        (inner.spi, inner.cs, inner.delay)
    }
}

impl<SPI, CS, D, E> BlockDevice for MicroSd<SPI, CS, D>
where
    SPI: SpiBus<Error = E>,
    CS: OutputPin,
    D: DelayNs,
    E: core::fmt::Debug,
{
    type Error = Error<E>;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        debug!("SD: read {} block(s) at {}", blocks.len(), start_block_idx.0);
        let mut inner = self.inner.borrow_mut();
        for (i, block) in blocks.iter_mut().enumerate() {
            inner.read_block(start_block_idx.0 + i as u32, &mut block.contents)?;
        }
        Ok(())
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        debug!("SD: write {} block(s) at {}", blocks.len(), start_block_idx.0);
        let mut inner = self.inner.borrow_mut();
        for (i, block) in blocks.iter().enumerate() {
            inner.write_block(start_block_idx.0 + i as u32, &block.contents)?;
        }
        Ok(())
    }

    fn num_blocks(&self) -> Result<BlockCount, Self::Error> {
        MicroSd::num_blocks(self).map(BlockCount)
    }
}
